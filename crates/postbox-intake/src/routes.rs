use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{Method, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{MethodRouter, get, post},
};
use bytes::Bytes;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use postbox_types::decode_form;

use crate::config::IntakeConfig;
use crate::relay::{RelayClient, TransportError};

/// Static files served by name; anything else gets the error page.
pub const ASSETS: &[&str] = &["index.html", "message.html", "style.css", "logo.png"];

const ERROR_PAGE: &str = "error.html";

pub struct AppStateInner {
    pub relay: RelayClient,
    pub static_dir: PathBuf,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn from_config(config: &IntakeConfig) -> AppState {
        Arc::new(Self {
            relay: RelayClient::from_config(config),
            static_dir: config.static_dir.clone(),
        })
    }
}

/// Build the intake router: asset allow-list, `POST /message`, and 404s for
/// everything else.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let mut app = Router::new()
        .route("/", get(root).fallback(not_found))
        .route("/message", post(submit).fallback(not_found));

    for name in ASSETS {
        app = app.route(&format!("/{}", name), asset(&state, name));
    }

    app.fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve one allow-listed file. A file missing from disk gets the error page
/// like any other unknown path.
fn asset(state: &AppState, name: &str) -> MethodRouter<AppState> {
    let path = state.static_dir.join(name);
    let file = ServeFile::new(&path);
    get(move |State(state): State<AppState>, req: Request| {
        let file = file.clone();
        let path = path.clone();
        async move {
            match file.oneshot(req).await {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    warn!("Asset {} is allow-listed but missing", path.display());
                    error_page(&state, StatusCode::NOT_FOUND).await
                }
                Ok(resp) => resp.into_response(),
                Err(never) => match never {},
            }
        }
    })
    .fallback(not_found)
}

// ── Handlers ────────────────────────────────────────────────────────────

/// GET / — the entry page lives at /index.html.
async fn root() -> Response {
    found("/index.html")
}

/// POST /message — decode the form, relay it, redirect back.
///
/// Only a failed connection attempt, or a message too large for the sink's
/// frame limit, is reported to the submitter; once the sink accepted the
/// connection the submission counts as sent.
pub async fn submit(State(state): State<AppState>, body: Bytes) -> Response {
    let message = match decode_form(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Rejected submission: {}", e);
            return error_page(&state, StatusCode::BAD_REQUEST).await;
        }
    };

    match state.relay.send(&message).await {
        Ok(()) => {
            info!("Relayed message from {} to {}", message.username, state.relay.addr());
        }
        Err(e @ TransportError::Oversized { .. }) => {
            warn!("Rejected submission from {}: {}", message.username, e);
            return error_page(&state, StatusCode::PAYLOAD_TOO_LARGE).await;
        }
        Err(e) if e.is_connect() => {
            error!("Relay unavailable, message from {} lost: {}", message.username, e);
            return error_page(&state, StatusCode::BAD_GATEWAY).await;
        }
        Err(e) => {
            warn!("Relay send from {} may be incomplete: {}", message.username, e);
        }
    }

    found("/")
}

/// Unknown paths and methods. GETs get the error page, anything else an empty 404.
async fn not_found(State(state): State<AppState>, method: Method) -> Response {
    if method == Method::GET || method == Method::HEAD {
        error_page(&state, StatusCode::NOT_FOUND).await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn error_page(state: &AppStateInner, status: StatusCode) -> Response {
    let path = state.static_dir.join(ERROR_PAGE);
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            warn!("Error page {} unavailable: {}", path.display(), e);
            (status, status.canonical_reason().unwrap_or("Error")).into_response()
        }
    }
}
