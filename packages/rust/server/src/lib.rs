//! HTTP shim around the generation pipeline.
//!
//! One route, `POST /generate`, answering with a JSON envelope:
//! `{"status": "success", "content": ...}` or
//! `{"status": "error", "message": ...}`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Instrument, error, info, info_span, warn};

use scribe_shared::{RequestId, Result, RuntimeConfig, ScribeError, ServerConfig, Session};

/// Message returned for any request lacking a usable session.
pub const SESSION_REQUIRED: &str = "Session data with messages is required";

/// Shared, read-only handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<RuntimeConfig>,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse {
    Success { content: String },
    Error { message: String },
}

/// Pipeline error mapped onto HTTP.
#[derive(Debug)]
pub struct ApiError(ScribeError);

impl From<ScribeError> for ApiError {
    fn from(err: ScribeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_validation() {
            (StatusCode::BAD_REQUEST, SESSION_REQUIRED.to_string())
        } else {
            error!(error = %self.0, "generation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
        };
        (status, Json(ApiResponse::Error { message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Build the router. An empty `cors_allowed_origins` allows any origin.
pub fn build_app(state: AppState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(create_cors_layer(cors_allowed_origins))
}

async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<ApiResponse>, ApiError> {
    let request_id = RequestId::new();
    let span = info_span!("generate", %request_id);

    async move {
        let session = parse_session(&body)?
            .ok_or_else(|| ScribeError::validation("missing session or messages"))?;

        info!(
            "Received request with {} messages in history.",
            session.messages.len()
        );

        let content = scribe_core::generate_content(&session, &state.config).await?;

        info!("Content generation successful.");
        Ok::<_, ApiError>(Json(ApiResponse::Success { content }))
    }
    .instrument(span)
    .await
}

/// Extract the session from a request body.
///
/// `Ok(None)` when `session` or its `messages` is absent or empty (400).
/// A body that is not a JSON object, or a session whose messages do not
/// decode, is an error (500).
fn parse_session(body: &[u8]) -> Result<Option<Session>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ScribeError::parse(format!("invalid JSON body: {e}")))?;
    let Value::Object(mut request) = value else {
        return Err(ScribeError::parse("request body must be a JSON object"));
    };

    let session = request.remove("session");
    if is_empty_value(session.as_ref()) {
        return Ok(None);
    }
    let Some(Value::Object(session)) = session else {
        return Err(ScribeError::parse("session must be a JSON object"));
    };
    if is_empty_value(session.get("messages")) {
        return Ok(None);
    }

    serde_json::from_value(Value::Object(session))
        .map(Some)
        .map_err(|e| ScribeError::parse(format!("invalid session: {e}")))
}

/// Absent, null, false, zero, or an empty string, array, or object.
fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

fn create_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(%origin, error = %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    cors.max_age(Duration::from_secs(3600))
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: RuntimeConfig, server: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ScribeError::Network(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, search = config.search.is_some(), "listening");

    let app = build_app(AppState::new(config), &server.cors_allowed_origins);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ScribeError::Network(format!("server error: {e}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
