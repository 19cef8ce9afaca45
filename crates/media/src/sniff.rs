//! Content sniffing.

use crate::MediaError;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const GIF_SIGNATURES: [&[u8]; 2] = [b"GIF87a", b"GIF89a"];

/// Media classes accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Jpeg,
    Png,
    Gif,
}

impl MediaKind {
    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(MediaKind::Jpeg),
            "image/png" => Some(MediaKind::Png),
            "image/gif" => Some(MediaKind::Gif),
            _ => None,
        }
    }

    /// `infer` only checks a short prefix for GIF and PNG.
    fn has_full_signature(self, bytes: &[u8]) -> bool {
        match self {
            MediaKind::Jpeg => true,
            MediaKind::Png => bytes.starts_with(PNG_SIGNATURE),
            MediaKind::Gif => GIF_SIGNATURES.iter().any(|sig| bytes.starts_with(sig)),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Png => "image/png",
            MediaKind::Gif => "image/gif",
        }
    }
}

/// Result of a successful sniff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffedType {
    pub kind: MediaKind,
    /// Canonical extension including the leading dot (`.png`).
    pub extension: String,
}

/// Classifies `bytes` by magic-byte inspection.
///
/// Only the leading bytes matter; client-supplied names and content types
/// are never consulted.
pub fn sniff(bytes: &[u8]) -> Result<SniffedType, MediaError> {
    let detected = infer::get(bytes)
        .ok_or_else(|| MediaError::InvalidFileType("unrecognized content".into()))?;

    let kind = MediaKind::from_mime(detected.mime_type())
        .ok_or_else(|| MediaError::InvalidFileType(detected.mime_type().to_string()))?;

    if !kind.has_full_signature(bytes) {
        return Err(MediaError::InvalidFileType(format!(
            "truncated {} signature",
            kind.mime_type()
        )));
    }

    let extension = canonical_extension(kind.mime_type(), detected.extension())?;
    Ok(SniffedType { kind, extension })
}

/// Turns the extension registered for `mime` into a dotted file suffix.
pub fn canonical_extension(mime: &str, registered: &str) -> Result<String, MediaError> {
    let registered = registered.trim_start_matches('.');
    if registered.is_empty() {
        return Err(MediaError::CantReadFileType(mime.to_string()));
    }
    Ok(format!(".{registered}"))
}
