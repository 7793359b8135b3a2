//! Commands that drive a running engine over IPC

use anyhow::{anyhow, Result};

use scrollapp_core::ipc::DaemonClient;
use scrollapp_core::{ActivationMethod, AppConfig, StatusSnapshot};

async fn client(config: &AppConfig) -> Result<DaemonClient> {
    let client = DaemonClient::new(config.socket_path());
    if !client.ping().await? {
        return Err(anyhow!(
            "scrollapp is not running.\nStart it first with:\n  scrollapp run"
        ));
    }
    Ok(client)
}

fn print_state(snapshot: &StatusSnapshot) {
    match snapshot.anchor {
        Some(anchor) => println!(
            "Auto-scroll {} at ({:.0}, {:.0})",
            snapshot.state, anchor.x, anchor.y
        ),
        None => println!("Auto-scroll {}", snapshot.state),
    }
}

pub async fn toggle(config: &AppConfig) -> Result<()> {
    let snapshot = client(config).await?.toggle().await?;
    print_state(&snapshot);
    Ok(())
}

pub async fn recenter(config: &AppConfig) -> Result<()> {
    let snapshot = client(config).await?.restart().await?;
    print_state(&snapshot);
    Ok(())
}

pub async fn set_method(config: &AppConfig, name: &str) -> Result<()> {
    // Validate locally for a friendlier message
    let method: ActivationMethod = name.parse()?;
    let snapshot = client(config).await?.set_method(method.name()).await?;
    println!(
        "Activation method: {} ({})",
        snapshot.method,
        snapshot.method.description()
    );
    if !snapshot.input_armed {
        println!("Warning: input capture is not available");
    }
    Ok(())
}

pub async fn set_inverted(config: &AppConfig, inverted: Option<bool>) -> Result<()> {
    let snapshot = client(config).await?.set_inverted(inverted).await?;
    println!(
        "Scroll direction: {}",
        if snapshot.inverted { "inverted" } else { "natural" }
    );
    Ok(())
}

pub async fn set_sensitivity(config: &AppConfig, value: f64) -> Result<()> {
    let snapshot = client(config).await?.set_sensitivity(value).await?;
    println!("Sensitivity: {:.2}", snapshot.sensitivity);
    Ok(())
}
