//! JSON-RPC 2.0 framing: one JSON object per line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RpcError};

pub const JSONRPC_VERSION: &str = "2.0";

/// Named parameters of a request.
pub type Params = Map<String, Value>;

/// Outbound request. Field order matches the wire layout.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub method: &'a str,
    pub params: &'a Params,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: i64, method: &'a str, params: &'a Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }

    /// Serialize to a single line (no trailing newline).
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RpcError::Protocol(format!("cannot encode request: {}", e)))
    }
}

/// The `error` member of a response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A parsed response line.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// `None` when the server sent `"id": null` (parse errors).
    pub id: Option<i64>,
    pub outcome: std::result::Result<Value, RpcErrorObject>,
}

impl RpcResponse {
    /// Parse one stdout line.
    ///
    /// A line that is not a JSON object, or an object carrying neither
    /// `result` nor `error`, is a protocol error.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line.trim()).map_err(|e| {
            RpcError::Protocol(format!("invalid JSON ({}): {}", e, preview(line)))
        })?;

        let Value::Object(mut object) = value else {
            return Err(RpcError::Protocol(format!(
                "expected a JSON object: {}",
                preview(line)
            )));
        };

        let id = object.get("id").and_then(Value::as_i64);

        if let Some(error) = object.remove("error").filter(|e| !e.is_null()) {
            let error: RpcErrorObject = serde_json::from_value(error)
                .map_err(|e| RpcError::Protocol(format!("malformed error object: {}", e)))?;
            return Ok(Self {
                id,
                outcome: Err(error),
            });
        }

        match object.remove("result") {
            Some(result) => Ok(Self {
                id,
                outcome: Ok(result),
            }),
            None => Err(RpcError::Protocol(format!(
                "neither result nor error in response: {}",
                preview(line)
            ))),
        }
    }

    /// Collapse into the call result, mapping an error object onto
    /// `RpcError::Application`.
    pub fn into_result(self) -> Result<Value> {
        self.outcome.map_err(|e| RpcError::Application {
            code: e.code,
            message: e.message,
        })
    }
}

fn preview(line: &str) -> String {
    const MAX: usize = 120;
    let line = line.trim();
    match line.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}
