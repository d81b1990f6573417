//! HTTP server for `doc-rag serve`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/mcp` | MCP Streamable HTTP endpoint (JSON-RPC) |
//! | `GET`  | `/tools/list` | List tools with their parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name, returns `{ "result": "<text>" }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query_docs: question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `provider_disabled` (400),
//! `tool_error` (500).
//!
//! # MCP client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "doc-rag": { "url": "http://127.0.0.1:8080/mcp" }
//!   }
//! }
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::mcp::{find_tool, tool_specs, DocTools, McpBridge, ToolSpec};
use crate::pipeline;

#[derive(Clone)]
struct AppState {
    tools: Arc<DocTools>,
}

/// Starts the server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let store = pipeline::open_store(config).await?;
    let tools = Arc::new(DocTools::new(config.clone(), store.clone())?);

    let app = router(tools);

    println!("MCP server listening on http://{}/mcp", bind_addr);
    for spec in tool_specs() {
        println!("  POST /tools/{} - {}", spec.name, spec.description);
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    Ok(())
}

fn router(tools: Arc<DocTools>) -> Router {
    let bridge = McpBridge::new(tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { tools })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Maps a tool failure to a status code by its message.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);
    let message = format!("{}: {}", tool_name, msg);

    if msg.contains("disabled") || msg.contains("requires an embedding provider") {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "provider_disabled",
            message,
        }
    } else if msg.contains("must not be empty") || msg.contains("invalid parameters") {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message,
        }
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "tool_error",
            message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolSpec>,
}

async fn handle_list_tools() -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: tool_specs(),
    })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    if find_tool(&name).is_none() {
        return Err(not_found(format!("no tool registered with name: {}", name)));
    }

    let result = state
        .tools
        .call(&name, params)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
