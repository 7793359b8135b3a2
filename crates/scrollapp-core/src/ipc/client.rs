//! IPC Client for connecting to daemon
//!
//! Provides a type-safe interface for communicating with the daemon.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::*;
use crate::controller::StatusSnapshot;
use crate::{Error, Result};

/// Client for communicating with the daemon
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Create a new daemon client
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Check if daemon is running by sending a ping
    pub async fn ping(&self) -> Result<bool> {
        match self.call(methods::PING, serde_json::Value::Null).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<StatusResponse> {
        let result = self.call(methods::STATUS, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Start or stop auto-scroll at the current pointer
    pub async fn toggle(&self) -> Result<StatusSnapshot> {
        self.snapshot_call(methods::SESSION_TOGGLE, serde_json::Value::Null)
            .await
    }

    /// Re-anchor the session at the current pointer
    pub async fn restart(&self) -> Result<StatusSnapshot> {
        self.snapshot_call(methods::SESSION_RESTART, serde_json::Value::Null)
            .await
    }

    /// Switch activation method by config name
    pub async fn set_method(&self, method: &str) -> Result<StatusSnapshot> {
        let params = serde_json::json!({ "method": method });
        self.snapshot_call(methods::CONFIG_SET_METHOD, params).await
    }

    /// Set inversion, or flip it with `None`
    pub async fn set_inverted(&self, inverted: Option<bool>) -> Result<StatusSnapshot> {
        let params = serde_json::json!({ "inverted": inverted });
        self.snapshot_call(methods::CONFIG_SET_INVERTED, params).await
    }

    pub async fn set_sensitivity(&self, sensitivity: f64) -> Result<StatusSnapshot> {
        let params = serde_json::json!({ "sensitivity": sensitivity });
        self.snapshot_call(methods::CONFIG_SET_SENSITIVITY, params)
            .await
    }

    async fn snapshot_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<StatusSnapshot> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a request and receive a response
    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Ipc(format!(
                "Failed to connect to daemon at {}: {}. Is the daemon running?",
                self.socket_path.display(),
                e
            ))
        })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        // Build request
        let request = Request::new(method).with_params(params);
        let request_json = serde_json::to_string(&request)?;

        // Send request
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        // Read response
        let mut response_line = String::new();
        reader.read_line(&mut response_line).await?;
        if response_line.is_empty() {
            return Err(Error::Ipc("Daemon closed the connection".to_string()));
        }

        let response: Response = serde_json::from_str(&response_line)?;

        if let Some(error) = response.error {
            return Err(Error::Ipc(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        response
            .result
            .ok_or_else(|| Error::Ipc("Empty response".to_string()))
    }
}

/// Check if daemon is reachable
pub async fn is_daemon_running(socket_path: &std::path::Path) -> bool {
    let client = DaemonClient::new(socket_path.to_path_buf());
    client.ping().await.unwrap_or(false)
}
