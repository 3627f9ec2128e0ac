//! HTTP surface: the RPC endpoint, the websocket upgrade, and health.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::rpc::errors::RpcError;
use crate::rpc::registry::ToolRegistry;
use crate::rpc::types::{RpcRequest, RpcResponse, ToolCallParams, capabilities, tool_result};
use crate::state::ServerState;
use crate::websocket;

/// Shared axum state.
#[derive(Clone)]
pub struct AppState {
    /// Server state.
    pub state: Arc<ServerState>,
    /// Tool registry, built once at startup.
    pub registry: Arc<ToolRegistry>,
}

/// Build the router over the given state.
#[must_use]
pub fn router(state: Arc<ServerState>) -> Router {
    let app = AppState {
        state,
        registry: Arc::new(ToolRegistry::with_default_tools()),
    };
    Router::new()
        .route("/rpc", post(rpc_endpoint))
        .route("/ws", get(websocket::ws_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// Push-only router for the dedicated websocket listener.
#[must_use]
pub fn ws_router(state: Arc<ServerState>) -> Router {
    let app = AppState {
        state,
        registry: Arc::new(ToolRegistry::with_default_tools()),
    };
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn rpc_endpoint(State(app): State<AppState>, body: String) -> Json<RpcResponse> {
    Json(handle_rpc(&app, &body).await)
}

/// Process one raw envelope. Parse failures answer with `-32700` and a
/// null id; everything else echoes the request id.
pub async fn handle_rpc(app: &AppState, raw: &str) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(raw) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "unparsable rpc body");
            return RpcResponse::err(Value::Null, RpcError::ParseError.to_error_object());
        }
    };
    let id = request.id.clone();

    let outcome = dispatch_method(app, request).await;
    match outcome {
        Ok(result) => RpcResponse::ok(id, result),
        Err(e) => {
            metrics::counter!("recall_rpc_errors_total").increment(1);
            RpcResponse::err(id, e.to_error_object())
        }
    }
}

async fn dispatch_method(app: &AppState, request: RpcRequest) -> Result<Value, RpcError> {
    match request.method.as_str() {
        "initialize" => Ok(capabilities()),
        "tools/list" => Ok(app.registry.list_tools()),
        "tools/call" => {
            let params: ToolCallParams = serde_json::from_value(
                request
                    .params
                    .ok_or_else(|| RpcError::InvalidRequest("tools/call needs params".into()))?,
            )
            .map_err(|e| RpcError::invalid_params(e.to_string()))?;
            metrics::counter!("recall_tool_calls_total", "tool" => params.name.clone())
                .increment(1);
            let payload = app
                .registry
                .dispatch(&app.state, &params.name, params.arguments)
                .await?;
            Ok(tool_result(&payload))
        }
        other => Err(RpcError::MethodNotFound(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testutil::test_state;
    use serde_json::json;

    fn app() -> AppState {
        AppState {
            state: Arc::new(test_state()),
            registry: Arc::new(ToolRegistry::with_default_tools()),
        }
    }

    fn tool_payload(response: &RpcResponse) -> Value {
        let text = response.result.as_ref().unwrap()["content"][0]["text"]
            .as_str()
            .unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let app = app();
        let out = handle_rpc(
            &app,
            &json!({"id": 1, "method": "initialize"}).to_string(),
        )
        .await;
        let result = out.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "recall");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
    }

    #[tokio::test]
    async fn tools_list_enumerates_tools() {
        let app = app();
        let out = handle_rpc(&app, &json!({"id": 2, "method": "tools/list"}).to_string()).await;
        let tools = out.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 10);
    }

    #[tokio::test]
    async fn parse_error_is_minus_32700_with_null_id() {
        let app = app();
        let out = handle_rpc(&app, "{not json").await;
        assert_eq!(out.error.unwrap()["code"], -32700);
        assert_eq!(out.id, Value::Null);
    }

    #[tokio::test]
    async fn unknown_method_is_minus_32601() {
        let app = app();
        let out = handle_rpc(
            &app,
            &json!({"id": 3, "method": "tools/destroy"}).to_string(),
        )
        .await;
        assert_eq!(out.error.unwrap()["code"], -32601);
        assert_eq!(out.id, json!(3));
    }

    #[tokio::test]
    async fn unknown_tool_is_minus_32601() {
        let app = app();
        let out = handle_rpc(
            &app,
            &json!({
                "id": 4,
                "method": "tools/call",
                "params": {"name": "mystery_tool", "arguments": {}},
            })
            .to_string(),
        )
        .await;
        assert_eq!(out.error.unwrap()["code"], -32601);
    }

    #[tokio::test]
    async fn tools_call_without_params_is_invalid_request() {
        let app = app();
        let out = handle_rpc(&app, &json!({"id": 5, "method": "tools/call"}).to_string()).await;
        assert_eq!(out.error.unwrap()["code"], -32600);
    }

    #[tokio::test]
    async fn session_management_end_to_end_through_the_envelope() {
        let app = app();
        let out = handle_rpc(
            &app,
            &json!({
                "id": 6,
                "method": "tools/call",
                "params": {
                    "name": "session_management",
                    "arguments": {"userId": "U", "workspaceRoot": "/p/app"},
                },
            })
            .to_string(),
        )
        .await;
        let payload = tool_payload(&out);
        assert_eq!(payload["isNewSession"], true);
        assert!(payload["sessionId"].as_str().unwrap().starts_with("sess_"));
        // The payload rides as a JSON string inside one text content block.
        assert_eq!(out.result.unwrap()["content"][0]["type"], "text");
    }

    #[tokio::test]
    async fn tool_level_app_error_keeps_request_id() {
        let app = app();
        let out = handle_rpc(
            &app,
            &json!({
                "id": 7,
                "method": "tools/call",
                "params": {
                    "name": "retrieve_context",
                    "arguments": {"sessionId": "sess_ghost", "query": "q"},
                },
            })
            .to_string(),
        )
        .await;
        assert_eq!(out.id, json!(7));
        assert_eq!(out.error.unwrap()["code"], -32000);
    }
}
