//! Multipart form collection.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::Bytes;
use tracing::debug;

use crate::error::IngressError;

/// Named parts of an upload request, fully buffered.
///
/// The body cap bounds the total size. Parts without a name are skipped and
/// the first part wins when a name repeats.
#[derive(Debug, Default, Clone)]
pub struct UploadForm {
    parts: HashMap<String, Bytes>,
}

impl UploadForm {
    /// Reads every part of `multipart`.
    ///
    /// Overrunning the body limit maps to [`IngressError::TooLarge`]; any
    /// other parse failure is a malformed upload.
    pub async fn collect(mut multipart: Multipart, limit: usize) -> Result<Self, IngressError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            debug!(field = %name, size = data.len(), "upload: part received");
            form.insert(&name, data);
        }

        Ok(form)
    }

    pub(crate) fn insert(&mut self, name: &str, data: Bytes) {
        self.parts.entry(name.to_owned()).or_insert(data);
    }

    /// Raw bytes of the part called `name`.
    pub fn file(&self, name: &str) -> Option<&Bytes> {
        self.parts.get(name)
    }

    /// Part `name` as UTF-8 text.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts
            .get(name)
            .and_then(|data| std::str::from_utf8(data).ok())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> IngressError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IngressError::TooLarge { limit }
    } else {
        IngressError::Malformed(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_part_wins() {
        let mut form = UploadForm::default();
        form.insert("time", Bytes::from_static(b"1.5"));
        form.insert("time", Bytes::from_static(b"9"));
        assert_eq!(form.text("time"), Some("1.5"));
        assert_eq!(form.len(), 1);
    }

    #[test]
    fn binary_part_is_not_text() {
        let mut form = UploadForm::default();
        form.insert("uploadFile", Bytes::from_static(b"\x89PNG\r\n\x1a\n"));
        assert!(form.file("uploadFile").is_some());
        assert_eq!(form.text("uploadFile"), None);
        assert!(form.file("rgbFile").is_none());
    }
}
