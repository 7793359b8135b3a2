//! IPC Server for daemon
//!
//! Listens on Unix socket and forwards client requests to the controller.

use std::path::PathBuf;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::*;
use crate::activation::ActivationMethod;
use crate::controller::{ControlHandle, ControlRequest};
use crate::Result;

/// IPC Server that handles client connections
pub struct DaemonServer {
    controller: ControlHandle,
    socket_path: PathBuf,
    start_time: Instant,
}

impl DaemonServer {
    pub fn new(controller: ControlHandle, socket_path: PathBuf) -> Self {
        Self {
            controller,
            socket_path,
            start_time: Instant::now(),
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Run the IPC server
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        // Remove old socket file if exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on: {}", self.socket_path.display());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let controller = self.controller.clone();
                            let start_time = self.start_time;
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, controller, start_time).await {
                                    warn!("Error handling connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("IPC server shutting down");
                        break;
                    }
                }
            }
        }

        // Cleanup socket file
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    controller: ControlHandle,
    start_time: Instant,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!("Received request: {} (id: {})", request.method, request.id);
                handle_request(request, &controller, start_time).await
            }
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Response::error(Uuid::nil(), ERR_PARSE, format!("Parse error: {}", e))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Map an RPC method and its params to a controller request
fn parse_command(method: &str, params: serde_json::Value) -> std::result::Result<ControlRequest, (i32, String)> {
    let invalid = |e: String| (ERR_INVALID_PARAMS, e);

    match method {
        methods::STATUS => Ok(ControlRequest::Status),
        methods::SESSION_TOGGLE => Ok(ControlRequest::Toggle),
        methods::SESSION_RESTART => Ok(ControlRequest::Restart),
        methods::CONFIG_SET_METHOD => {
            let params: SetMethodParams =
                serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;
            let method = params
                .method
                .parse::<ActivationMethod>()
                .map_err(|e| invalid(e.to_string()))?;
            Ok(ControlRequest::SetMethod(method))
        }
        methods::CONFIG_SET_INVERTED => {
            // A bare call flips the flag
            let params: SetInvertedParams = if params.is_null() {
                SetInvertedParams { inverted: None }
            } else {
                serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?
            };
            Ok(ControlRequest::SetInverted(params.inverted))
        }
        methods::CONFIG_SET_SENSITIVITY => {
            let params: SetSensitivityParams =
                serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;
            if !params.sensitivity.is_finite() {
                return Err(invalid("Sensitivity must be a finite number".to_string()));
            }
            Ok(ControlRequest::SetSensitivity(params.sensitivity))
        }
        _ => Err((ERR_METHOD_NOT_FOUND, format!("Method not found: {}", method))),
    }
}

async fn handle_request(request: Request, controller: &ControlHandle, start_time: Instant) -> Response {
    let id = request.id;

    if request.method == methods::PING {
        return Response::success(id, serde_json::json!({"ok": true}));
    }

    let command = match parse_command(&request.method, request.params) {
        Ok(command) => command,
        Err((code, message)) => return Response::error(id, code, message),
    };

    let is_status = command == ControlRequest::Status;
    let snapshot = match controller.request(command).await {
        Ok(snapshot) => snapshot,
        Err(e) => return Response::error(id, ERR_INTERNAL, e.to_string()),
    };

    let result = if is_status {
        serde_json::to_value(StatusResponse {
            running: true,
            uptime_secs: start_time.elapsed().as_secs(),
            engine: snapshot,
        })
    } else {
        serde_json::to_value(snapshot)
    };

    match result {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::error(id, ERR_INTERNAL, e.to_string()),
    }
}
