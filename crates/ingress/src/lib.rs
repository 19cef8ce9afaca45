//! HTTP ingress for the media relay.
//!
//! Accepts multipart uploads, validates and stores each file, then hands the
//! stored files to the relay client as one downstream session. Every outcome
//! is reported to the caller as a plain-text token.

mod error;
mod form;
mod handler;
mod layout;
mod router;

pub use error::{ErrorToken, IngressError, SUCCESS};
pub use form::UploadForm;
pub use layout::{FileField, SessionLayout, TimePolicy, Variant};
pub use router::{IngressConfig, IngressRouter};

/// Default request body cap (2 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Default storage directory.
pub const DEFAULT_UPLOAD_DIR: &str = "./tmp";
