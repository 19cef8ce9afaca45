//! Router construction and serving.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use orb_relay_data_channel::{RelayClient, RelayConfig};
use orb_relay_media::{MediaError, Storage};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::IngressError;
use crate::handler::{self, IngressState};
use crate::layout::Variant;
use crate::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_UPLOAD_DIR};

const FILES_PREFIX: &str = "/files";

/// Ingress settings.
#[derive(Debug, Clone)]
pub struct IngressConfig {
    pub variant: Variant,
    /// Storage root, also served under `/files`.
    pub upload_dir: PathBuf,
    pub relay: RelayConfig,
    /// Cap on the whole request body.
    pub max_upload_bytes: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            relay: RelayConfig::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// One upload endpoint bound to its own storage root and downstream.
///
/// Instances share nothing, so several variants can run in one process.
#[derive(Debug, Clone)]
pub struct IngressRouter {
    state: Arc<IngressState>,
}

impl IngressRouter {
    pub fn new(config: IngressConfig) -> Self {
        Self {
            state: Arc::new(IngressState {
                layout: config.variant.layout(),
                storage: Storage::new(config.upload_dir),
                relay: RelayClient::new(config.relay),
                max_upload_bytes: config.max_upload_bytes,
            }),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.state.storage
    }

    /// Creates the storage root.
    pub async fn prepare(&self) -> Result<(), MediaError> {
        self.state.storage.ensure_root().await
    }

    /// Builds the axum router: `POST /upload`, `GET /health` and
    /// `GET /files/<name>`.
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/upload",
                post(handler::upload).layer(DefaultBodyLimit::max(self.state.max_upload_bytes)),
            )
            .route("/health", get(handler::health))
            .nest_service(FILES_PREFIX, ServeDir::new(self.state.storage.root()))
            .layer(middleware::from_fn(hide_dotfiles))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Serves on `listener` until `cancel` fires.
    pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<(), IngressError> {
        let local_addr = listener.local_addr()?;
        info!(
            %local_addr,
            fields = ?self.state.layout.fields.iter().map(|f| f.name).collect::<Vec<_>>(),
            downstream = %self.state.relay.config().addr,
            "ingress listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("ingress shutting down gracefully");
            })
            .await?;

        Ok(())
    }
}

/// Answers 404 for dot-prefixed entries under `/files`, which covers
/// in-progress staging files in the storage root.
async fn hide_dotfiles(request: Request, next: Next) -> Response {
    let hidden = request
        .uri()
        .path()
        .strip_prefix(FILES_PREFIX)
        .is_some_and(|rest| rest.split('/').any(is_hidden_segment));

    if hidden {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

fn is_hidden_segment(segment: &str) -> bool {
    segment.starts_with('.')
        || segment
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("%2e"))
}
