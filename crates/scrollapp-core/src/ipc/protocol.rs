//! IPC Protocol definitions for daemon-client communication
//!
//! Uses JSON-RPC style request/response format over Unix socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::controller::StatusSnapshot;

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Uuid, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Uuid, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

// Error codes
pub const ERR_PARSE: i32 = -32700;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INVALID_PARAMS: i32 = -32602;
pub const ERR_INTERNAL: i32 = -32603;

// Method names
pub mod methods {
    pub const PING: &str = "ping";
    pub const STATUS: &str = "status";

    // Session methods
    pub const SESSION_TOGGLE: &str = "session.toggle";
    pub const SESSION_RESTART: &str = "session.restart";

    // Runtime configuration (not persisted)
    pub const CONFIG_SET_METHOD: &str = "config.set_method";
    pub const CONFIG_SET_INVERTED: &str = "config.set_inverted";
    pub const CONFIG_SET_SENSITIVITY: &str = "config.set_sensitivity";
}

// Parameter structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMethodParams {
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetInvertedParams {
    /// Omitted flips the current value
    #[serde(default)]
    pub inverted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSensitivityParams {
    pub sensitivity: f64,
}

// Response structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub engine: StatusSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationMethod;
    use crate::session::SessionState;

    #[test]
    fn test_request_serialization() {
        let req = Request::new(methods::CONFIG_SET_METHOD)
            .with_params(serde_json::json!({"method": "double_middle_click"}));

        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.method, methods::CONFIG_SET_METHOD);
        let params: SetMethodParams = serde_json::from_value(parsed.params).unwrap();
        assert_eq!(params.method, "double_middle_click");
    }

    #[test]
    fn test_response_error() {
        let id = Uuid::new_v4();
        let resp = Response::error(id, ERR_METHOD_NOT_FOUND, "Method not found");
        assert!(!resp.is_success());
        assert_eq!(resp.error.unwrap().code, ERR_METHOD_NOT_FOUND);
    }

    #[test]
    fn test_inverted_params_default_to_flip() {
        let params: SetInvertedParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(params.inverted, None);
    }

    #[test]
    fn test_status_response_is_flat() {
        let status = StatusResponse {
            running: true,
            uptime_secs: 12,
            engine: StatusSnapshot {
                state: SessionState::Active,
                anchor: None,
                method: ActivationMethod::OptionScroll,
                sensitivity: 1.5,
                inverted: false,
                input_armed: true,
                gesture_pending: false,
                scrolls_emitted: 3,
            },
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "active");
        assert_eq!(value["method"], "option_scroll");
        assert_eq!(value["uptime_secs"], 12);
    }
}
