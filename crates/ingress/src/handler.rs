//! `POST /upload` pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, header};
use bytes::Bytes;
use orb_relay_data_channel::RelayClient;
use orb_relay_media::Storage;
use tracing::info;

use crate::error::{IngressError, SUCCESS};
use crate::form::UploadForm;
use crate::layout::SessionLayout;

/// Shared, read-only state behind every request.
#[derive(Debug)]
pub(crate) struct IngressState {
    pub(crate) layout: SessionLayout,
    pub(crate) storage: Storage,
    pub(crate) relay: RelayClient,
    pub(crate) max_upload_bytes: usize,
}

/// Validates, stores and relays one upload session.
///
/// Order: body cap, form, presence of every file field, timestamp, then
/// sniff and store each file, then one relay session.
pub(crate) async fn upload(
    State(state): State<Arc<IngressState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, IngressError> {
    let limit = state.max_upload_bytes;
    check_declared_length(&headers, limit)?;

    let multipart = multipart.map_err(|e| IngressError::Malformed(e.body_text()))?;
    let form = UploadForm::collect(multipart, limit).await?;

    let files = state
        .layout
        .fields
        .iter()
        .map(|field| {
            form.file(field.name)
                .map(|data| (field, data))
                .ok_or(IngressError::MissingField {
                    field: field.name,
                    token: field.missing_token,
                })
        })
        .collect::<Result<Vec<(_, &Bytes)>, _>>()?;

    let timestamp = state.layout.resolve_time(&form)?;

    let mut paths: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (field, data) in files {
        let stored = state
            .storage
            .accept(data)
            .await
            .map_err(|source| IngressError::Media {
                field: field.name,
                rejected_token: field.rejected_token,
                source,
            })?;

        info!(
            field = field.name,
            token = %stored.token,
            path = %stored.path.display(),
            size = stored.size_bytes,
            "upload: file stored"
        );
        paths.push(stored.path);
    }

    for name in &state.layout.advisory {
        if let Some(value) = form.text(name) {
            info!(field = *name, value, "upload: advisory field");
        }
    }

    state.relay.send_session(&paths, timestamp).await?;
    Ok(SUCCESS)
}

/// Rejects a declared `Content-Length` above the cap before reading the body.
fn check_declared_length(headers: &HeaderMap, limit: usize) -> Result<(), IngressError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(len) if len > limit as u64 => Err(IngressError::TooLarge { limit }),
        _ => Ok(()),
    }
}

pub(crate) async fn health() -> &'static str {
    "OK"
}
