//! Upload session layouts.
//!
//! Both endpoint variants run the same pipeline; they differ only in the
//! file fields they expect and where the session timestamp comes from.

use orb_relay_data_channel::FrameHeader;
use serde::Deserialize;

use crate::error::{ErrorToken, IngressError};
use crate::form::UploadForm;

/// Endpoint variant served by an ingress router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// One image plus a caller-supplied timestamp.
    #[default]
    Single,
    /// A depth image followed by an RGB image.
    Dual,
}

impl Variant {
    pub fn layout(self) -> SessionLayout {
        match self {
            Variant::Single => SessionLayout::single(),
            Variant::Dual => SessionLayout::dual(),
        }
    }
}

/// A required file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    pub name: &'static str,
    /// Reported when the part is absent.
    pub missing_token: ErrorToken,
    /// Reported when the content is not an accepted image. `None` means the
    /// generic `INVALID_FILE_TYPE`.
    pub rejected_token: Option<ErrorToken>,
}

/// Where the session timestamp comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TimePolicy {
    /// Parsed from a required text field.
    FromField(&'static str),
    Fixed(f64),
}

/// Ordered file fields and timestamp policy for one upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLayout {
    /// Files in relay order.
    pub fields: Vec<FileField>,
    pub time: TimePolicy,
    /// Text fields that are only logged.
    pub advisory: Vec<&'static str>,
}

impl SessionLayout {
    pub fn single() -> Self {
        Self {
            fields: vec![FileField {
                name: "uploadFile",
                missing_token: ErrorToken::InvalidFile,
                rejected_token: None,
            }],
            time: TimePolicy::FromField("time"),
            advisory: vec!["type"],
        }
    }

    pub fn dual() -> Self {
        Self {
            fields: vec![
                FileField {
                    name: "depthFile",
                    missing_token: ErrorToken::InvalidFile,
                    rejected_token: Some(ErrorToken::InvalidDepthFile),
                },
                FileField {
                    name: "rgbFile",
                    missing_token: ErrorToken::InvalidRgbFile,
                    rejected_token: Some(ErrorToken::InvalidRgbFile),
                },
            ],
            time: TimePolicy::Fixed(0.0),
            advisory: Vec::new(),
        }
    }

    /// Resolves the session timestamp.
    ///
    /// A field-supplied value must parse as a finite float that fits the
    /// timestamp header; it never falls back to a default.
    pub fn resolve_time(&self, form: &UploadForm) -> Result<f64, IngressError> {
        let name = match self.time {
            TimePolicy::Fixed(value) => return Ok(value),
            TimePolicy::FromField(name) => name,
        };

        let raw = form
            .text(name)
            .ok_or_else(|| IngressError::InvalidTime(format!("missing `{name}` field")))?;

        let value: f64 = raw
            .parse()
            .map_err(|_| IngressError::InvalidTime(format!("`{raw}` is not a number")))?;

        FrameHeader::timestamp(value).map_err(|e| IngressError::InvalidTime(e.to_string()))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with_time(value: &str) -> UploadForm {
        let mut form = UploadForm::default();
        form.insert("time", value.as_bytes().to_vec().into());
        form
    }

    #[test]
    fn variants_map_to_layouts() {
        assert_eq!(Variant::Single.layout(), SessionLayout::single());
        assert_eq!(Variant::Dual.layout(), SessionLayout::dual());
        assert_eq!(Variant::default(), Variant::Single);
    }

    #[test]
    fn dual_fields_are_ordered_depth_then_rgb() {
        let names: Vec<_> = SessionLayout::dual().fields.iter().map(|f| f.name).collect();
        assert_eq!(names, ["depthFile", "rgbFile"]);
    }

    #[test]
    fn missing_dual_fields_report_distinct_tokens() {
        let tokens: Vec<_> = SessionLayout::dual()
            .fields
            .iter()
            .map(|f| f.missing_token)
            .collect();
        assert_eq!(tokens, [ErrorToken::InvalidFile, ErrorToken::InvalidRgbFile]);
    }

    #[test]
    fn single_time_is_parsed() {
        let layout = SessionLayout::single();
        assert_eq!(layout.resolve_time(&form_with_time("1.5")).unwrap(), 1.5);
        assert_eq!(layout.resolve_time(&form_with_time("-2.5e-7")).unwrap(), -2.5e-7);
    }

    #[test]
    fn single_time_is_required() {
        let err = SessionLayout::single()
            .resolve_time(&UploadForm::default())
            .unwrap_err();
        assert_eq!(err.token(), ErrorToken::InvalidTime);
    }

    #[test]
    fn unusable_times_are_rejected() {
        let layout = SessionLayout::single();
        for raw in ["", "abc", "1.5s", "NaN", "inf", "1e300"] {
            let err = layout.resolve_time(&form_with_time(raw)).unwrap_err();
            assert_eq!(err.token(), ErrorToken::InvalidTime, "{raw:?}");
        }
    }

    #[test]
    fn dual_time_is_fixed() {
        let layout = SessionLayout::dual();
        assert_eq!(layout.resolve_time(&form_with_time("abc")).unwrap(), 0.0);
        assert_eq!(layout.resolve_time(&UploadForm::default()).unwrap(), 0.0);
    }
}
