use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

use agentproto::{AgentOp, AgentRequest, LogLine, TerminalEnvelope};

use crate::config::AgentConfig;
use crate::ops::{dispatch_json, dispatch_streaming};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/v1/dispatch", post(dispatch))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

async fn dispatch(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> Result<Response, ApiError> {
    let AgentRequest { op, args } = request;

    if op.is_streaming() {
        return Ok(dispatch_stream_response(state, op, args).into_response());
    }

    match dispatch_json(op, args, &state.config).await {
        Ok(body) => Ok(Json(body).into_response()),
        Err(err) => {
            tracing::warn!(?op, error = %err, "op failed");
            Err(ApiError(StatusCode::CONFLICT, err.to_string()))
        }
    }
}

/// Builds an NDJSON streaming body: one `LogLine` JSON object per line of
/// output, terminated by a single `TerminalEnvelope` JSON object.
fn dispatch_stream_response(state: AppState, op: AgentOp, args: serde_json::Value) -> Response {
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let body_stream = async_stream::stream! {
        let config = state.config.clone();
        let run = tokio::spawn(async move { dispatch_streaming(op, args, &config, tx).await });

        while let Some(line) = rx.recv().await {
            let encoded = serde_json::to_string(&LogLine { line }).unwrap_or_default();
            yield Ok::<_, std::io::Error>(bytes::Bytes::from(format!("{encoded}\n")));
        }

        let envelope = match run.await {
            Ok(Ok(code)) if code == 0 => TerminalEnvelope::ok(),
            Ok(Ok(code)) => TerminalEnvelope::failed(code, format!("exited with status {code}")),
            Ok(Err(err)) => TerminalEnvelope::failed(-1, err.to_string()),
            Err(join_err) => TerminalEnvelope::failed(-1, join_err.to_string()),
        };
        let encoded = serde_json::to_string(&envelope).unwrap_or_default();
        yield Ok::<_, std::io::Error>(bytes::Bytes::from(format!("{encoded}\n")));
    };

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("valid streaming response")
}

/// Binds the Unix socket, restricts its permission bits to `socket_mode`
/// (0660 by default, group-readable by whichever group owns the nosd<->agent
/// relationship), and serves the router until `shutdown` resolves.
pub async fn run_server(config: AgentConfig, foreground: bool) -> Result<()> {
    let _ = foreground;
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path).with_context(|| {
            format!("removing stale socket {}", config.socket_path.display())
        })?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating socket directory {}", parent.display()))?;
    }

    let listener = UnixListener::bind(&config.socket_path)
        .with_context(|| format!("binding unix socket {}", config.socket_path.display()))?;

    let mut perms = std::fs::metadata(&config.socket_path)?.permissions();
    perms.set_mode(config.socket_mode);
    std::fs::set_permissions(&config.socket_path, perms)
        .with_context(|| format!("setting socket permissions on {}", config.socket_path.display()))?;

    tracing::info!(socket = %config.socket_path.display(), "agent listening");

    let state = AppState { config: Arc::new(config) };
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving agent api")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
