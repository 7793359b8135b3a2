use anyhow::Result;

use scrollapp_core::{ActivationMethod, AppConfig};

pub fn run(config: &AppConfig) -> Result<()> {
    let current = config.activation_method();

    println!("Activation methods:\n");
    for method in ActivationMethod::ALL {
        let marker = if method == current { "*" } else { " " };
        println!("{} {:<22} {}", marker, method.name(), method.description());
    }
    println!("\n* configured in {}", AppConfig::config_path().display());

    Ok(())
}
