//! HTTP tool server.
//!
//! Exposes the query API over a JSON HTTP API. All tools, built-in
//! (resolve, related, traverse, validate, reindex) and custom Rust trait
//! implementations, are registered in a unified [`ToolRegistry`] and
//! dispatched through the same `POST /tools/{name}` handler.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (version and snapshot fingerprint) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "resolve: document not found: x" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use knowledge_harness_core::{IndexError, NotFound};

use crate::config::Config;
use crate::index::build_index_interruptible;
use crate::progress::ProgressReporter;
use crate::snapshot::SnapshotHandle;
use crate::traits::{validate_params, ToolContext, ToolInfo, ToolRegistry};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl AppState {
    pub fn new(tools: ToolRegistry, ctx: ToolContext) -> Self {
        Self {
            tools: Arc::new(tools),
            ctx,
        }
    }
}

/// Build the router without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the tool server with the built-in tools.
///
/// Indexes `root` once, publishes the snapshot, and serves until Ctrl-C.
pub async fn run_server(
    config: &Config,
    root: &FsPath,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    run_server_with_extensions(config, root, ToolRegistry::new(), progress).await
}

/// Starts the tool server with custom Rust tools served alongside the
/// built-ins.
///
/// # Example
///
/// ```rust,no_run
/// use knowledge_harness::progress::NoProgress;
/// use knowledge_harness::server::run_server_with_extensions;
/// use knowledge_harness::traits::ToolRegistry;
/// use std::path::Path;
///
/// # async fn example(config: &knowledge_harness::config::Config) -> anyhow::Result<()> {
/// let mut tools = ToolRegistry::new();
/// // tools.register(Box::new(MyTool::new()));
/// run_server_with_extensions(config, Path::new("./docs"), tools, &NoProgress).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_extensions(
    config: &Config,
    root: &FsPath,
    extra_tools: ToolRegistry,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let outcome = build_index_interruptible(root, config, progress).await?;
    let handle = Arc::new(SnapshotHandle::new(outcome.snapshot));
    let ctx = ToolContext::new(Arc::new(config.clone()), root.to_path_buf(), handle);

    let mut registry = ToolRegistry::with_builtins();
    for tool in extra_tools.into_tools() {
        registry.register(tool);
    }

    println!("Registered {} tools:", registry.len());
    for t in registry.tools() {
        let tag = if t.is_builtin() { "builtin" } else { "rust" };
        println!("  POST /tools/{} ({}): {}", t.name(), tag, t.description());
    }

    let snapshot = ctx.snapshot();
    println!(
        "Serving {} documents (fingerprint {})",
        snapshot.documents.len(),
        snapshot.fingerprint
    );
    let app = build_router(AppState::new(registry, ctx));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Tool server listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
    }
}

/// Map a tool failure to an HTTP status. Lookups that match nothing are
/// 404, input problems are 400, everything else is 500.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);
    if err.downcast_ref::<NotFound>().is_some() {
        return not_found(message);
    }
    // Rebuild failures are server errors.
    if err.downcast_ref::<IndexError>().is_some() {
        return tool_error(message);
    }

    let msg = err.to_string();
    if msg.contains("not found") {
        not_found(message)
    } else if msg.contains("must not be empty") || msg.contains("invalid") {
        bad_request(message)
    } else {
        tool_error(message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    fingerprint: String,
    documents: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.ctx.snapshot();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        fingerprint: snapshot.fingerprint.clone(),
        documents: snapshot.documents.len(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Unified tool dispatch: look up, validate parameters, execute.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated_params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    tracing::debug!(tool = %name, "tool call");
    let result = tool
        .execute(validated_params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found_by_type() {
        let err = anyhow::Error::new(NotFound::new("x"));
        let app = classify_tool_error("resolve", err);
        assert_eq!(app.status, StatusCode::NOT_FOUND);
        assert_eq!(app.message, "resolve: document not found: x");
    }

    #[test]
    fn test_classify_by_message() {
        let app = classify_tool_error("related", anyhow::anyhow!("id must not be empty"));
        assert_eq!(app.code, "bad_request");
        let app = classify_tool_error("reindex", anyhow::anyhow!("disk on fire"));
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_classify_index_error_by_type() {
        let err = anyhow::Error::new(IndexError::InvalidGlob {
            pattern: "[".to_string(),
            message: "unclosed character class".to_string(),
        });
        let app = classify_tool_error("reindex", err);
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.code, "tool_error");
        assert!(app.message.starts_with("reindex: invalid glob pattern `[`"));

        let err = anyhow::Error::new(IndexError::RootNotFound("/gone".into()));
        assert_eq!(classify_tool_error("reindex", err).code, "tool_error");
    }
}
