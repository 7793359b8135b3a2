use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrollapp_core::AppConfig;

mod commands;
mod platform;

#[derive(Parser)]
#[command(name = "scrollapp")]
#[command(author, version, about = "Middle-click auto-scroll for macOS")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the auto-scroll engine in the foreground
    Run,
    /// Stop the running engine
    Stop,
    /// Show engine status
    Status,
    /// Start or stop auto-scroll at the current pointer position
    Toggle,
    /// Re-anchor the active session at the current pointer position
    Recenter,
    /// Switch the activation method (not saved to the config file)
    Method {
        /// Method name, see `scrollapp methods`
        name: String,
    },
    /// Set or flip scroll direction inversion
    Invert {
        /// Omit to flip the current setting
        state: Option<Switch>,
    },
    /// Set the scroll sensitivity (0.2 - 3.0)
    Sensitivity { value: f64 },
    /// Print the scroll speed for a vertical displacement
    Curve {
        /// Pointer displacement from the anchor (negative is above)
        #[arg(allow_hyphen_values = true)]
        delta: f64,
        #[arg(short = 's', long, default_value_t = 1.0)]
        sensitivity: f64,
        #[arg(long)]
        inverted: bool,
    },
    /// List activation methods
    Methods,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so the file can set the level
    let config = AppConfig::load();
    let default_level = config
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_else(|_| "info".into());

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or(default_level),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = config?;

    match cli.command {
        Some(Commands::Run) | None => commands::daemon::run(config).await,
        Some(Commands::Stop) => commands::daemon::stop().await,
        Some(Commands::Status) => commands::daemon::status(&config).await,
        Some(Commands::Toggle) => commands::control::toggle(&config).await,
        Some(Commands::Recenter) => commands::control::recenter(&config).await,
        Some(Commands::Method { name }) => commands::control::set_method(&config, &name).await,
        Some(Commands::Invert { state }) => {
            let inverted = state.map(|s| matches!(s, Switch::On));
            commands::control::set_inverted(&config, inverted).await
        }
        Some(Commands::Sensitivity { value }) => {
            commands::control::set_sensitivity(&config, value).await
        }
        Some(Commands::Curve {
            delta,
            sensitivity,
            inverted,
        }) => commands::curve::run(delta, sensitivity, inverted),
        Some(Commands::Methods) => commands::methods::run(&config),
    }
}
