//! The tool-invocation envelope.
//!
//! Language-neutral JSON-RPC-like frames: `{id, method, params}` in,
//! `{id, result}` or `{id, error}` out. Tool results wrap their payload as
//! one text content block carrying a JSON string, so heterogeneous clients
//! decode a single shape.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Incoming envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct RpcRequest {
    /// Correlation id echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// `initialize`, `tools/list`, or `tools/call`.
    pub method: String,
    /// Method parameters; for `tools/call` this is `{name, arguments}`.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Parameters of a `tools/call`.
#[derive(Clone, Debug, Deserialize)]
pub struct ToolCallParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Outgoing envelope.
#[derive(Clone, Debug, Serialize)]
pub struct RpcResponse {
    /// Correlation id from the request.
    pub id: Value,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Success envelope.
    #[must_use]
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error envelope.
    #[must_use]
    pub fn err(id: Value, error: Value) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Wrap a tool payload as the single-text-block result shape.
#[must_use]
pub fn tool_result(payload: &Value) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": payload.to_string(),
        }]
    })
}

/// Capabilities object emitted on `initialize`.
#[must_use]
pub fn capabilities() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {
            "name": "recall",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {"listChanged": true},
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_tool_call() {
        let raw = json!({
            "id": 1,
            "method": "tools/call",
            "params": {"name": "retrieve_context", "arguments": {"query": "x"}}
        });
        let req: RpcRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(req.method, "tools/call");
        let params: ToolCallParams = serde_json::from_value(req.params.unwrap()).unwrap();
        assert_eq!(params.name, "retrieve_context");
        assert_eq!(params.arguments.unwrap()["query"], "x");
    }

    #[test]
    fn tool_result_wraps_payload_as_json_string() {
        let payload = json!({"sessionId": "sess_a"});
        let result = tool_result(&payload);
        let text = result["content"][0]["text"].as_str().unwrap();
        let back: Value = serde_json::from_str(text).unwrap();
        assert_eq!(back, payload);
        assert_eq!(result["content"][0]["type"], "text");
    }

    #[test]
    fn response_serializes_one_of_result_or_error() {
        let ok = RpcResponse::ok(json!(1), json!({"x": 1}));
        let v = serde_json::to_value(&ok).unwrap();
        assert!(v.get("error").is_none());

        let err = RpcResponse::err(json!(2), json!({"code": -32601}));
        let v = serde_json::to_value(&err).unwrap();
        assert!(v.get("result").is_none());
        assert_eq!(v["error"]["code"], -32601);
    }

    #[test]
    fn capabilities_shape() {
        let caps = capabilities();
        assert_eq!(caps["serverInfo"]["name"], "recall");
        assert_eq!(caps["capabilities"]["tools"]["listChanged"], true);
        assert!(caps["protocolVersion"].as_str().is_some());
    }
}
