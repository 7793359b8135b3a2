use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use scrollapp_core::ipc::{is_daemon_running as is_socket_live, DaemonClient};
use scrollapp_core::{AppConfig, Controller, DaemonServer, SessionEvent};

use crate::platform;

/// Get the PID file path
fn pid_file_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("scrollapp")
        .join("scrollapp.pid")
}

/// Check if the engine is running
fn running_pid() -> Option<u32> {
    let pid_path = pid_file_path();
    if !pid_path.exists() {
        return None;
    }

    let mut file = fs::File::open(&pid_path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;

    // Check if process is still running
    #[cfg(unix)]
    {
        use std::process::Command;
        let output = Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .ok()?;
        if output.status.success() {
            return Some(pid);
        }
    }

    // Process not running, clean up stale PID file
    let _ = fs::remove_file(&pid_path);
    None
}

/// Write PID file
fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(&pid_path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

/// Remove PID file
fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Resolve when Ctrl+C or SIGTERM arrives
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

/// Run the engine in the foreground
pub async fn run(config: AppConfig) -> Result<()> {
    // Check if already running
    if let Some(pid) = running_pid() {
        println!("scrollapp is already running (PID: {})", pid);
        return Ok(());
    }

    let capabilities = platform::capabilities()?;
    let method = config.activation_method();
    let settings = config.motion_settings();

    write_pid_file()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Setup signal handlers for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx_clone.send(true);
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (controller, handle) = Controller::new(&config, capabilities);
    let controller = controller.with_event_sender(event_tx);

    tokio::spawn(async move {
        while let Some(SessionEvent::StateChanged(state)) = event_rx.recv().await {
            info!("Session is now {}", state);
        }
    });

    let server = DaemonServer::new(handle, config.socket_path());
    let server_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(async move { server.run(server_shutdown).await });

    println!(
        "scrollapp started (PID: {}). Press Ctrl+C or run 'scrollapp stop' to stop.",
        std::process::id()
    );
    println!("  Activation: {} ({})", method, method.description());
    println!("  Sensitivity: {:.2}", settings.sensitivity);
    println!("  Inverted: {}", settings.inverted);

    // Blocks until shutdown; restores the cursor on the way out
    controller.run(shutdown_rx).await;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("IPC server failed: {}", e),
        Err(e) => error!("IPC server task panicked: {}", e),
    }

    remove_pid_file();
    println!("scrollapp stopped.");

    Ok(())
}

/// Stop the running engine
pub async fn stop() -> Result<()> {
    match running_pid() {
        Some(pid) => {
            println!("Stopping scrollapp (PID: {})...", pid);

            #[cfg(unix)]
            {
                use std::process::Command;
                let output = Command::new("kill")
                    .arg("-TERM")
                    .arg(pid.to_string())
                    .output()?;

                if output.status.success() {
                    // Wait a moment for graceful shutdown
                    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

                    // Check if still running
                    if running_pid().is_none() {
                        println!("scrollapp stopped successfully.");
                    } else {
                        // Force kill
                        let _ = Command::new("kill")
                            .arg("-9")
                            .arg(pid.to_string())
                            .output();
                        remove_pid_file();
                        println!("scrollapp forcefully terminated.");
                    }
                } else {
                    println!("Failed to stop scrollapp. You may need to kill it manually: kill {}", pid);
                }
            }

            #[cfg(not(unix))]
            {
                println!("Please stop scrollapp manually (PID: {})", pid);
            }
        }
        None => {
            println!("scrollapp is not running.");
        }
    }

    Ok(())
}

/// Show engine status
pub async fn status(config: &AppConfig) -> Result<()> {
    let Some(pid) = running_pid() else {
        println!("scrollapp is not running.");
        return Ok(());
    };

    println!("scrollapp is running (PID: {})", pid);

    let socket_path = config.socket_path();
    if !is_socket_live(&socket_path).await {
        return Err(anyhow!(
            "No response on {}; the engine may still be starting",
            socket_path.display()
        ));
    }

    let status = DaemonClient::new(socket_path).status().await?;
    let engine = status.engine;
    println!("  State: {}", engine.state);
    if let Some(anchor) = engine.anchor {
        println!("  Anchor: ({:.0}, {:.0})", anchor.x, anchor.y);
    }
    println!("  Activation: {}", engine.method);
    println!("  Sensitivity: {:.2}", engine.sensitivity);
    println!("  Inverted: {}", engine.inverted);
    println!(
        "  Input: {}",
        if engine.input_armed { "armed" } else { "unavailable" }
    );
    println!("  Scroll events: {}", engine.scrolls_emitted);
    println!("  Uptime: {}s", status.uptime_secs);

    Ok(())
}
