use anyhow::Result;

use scrollapp_core::config::clamp_sensitivity;
use scrollapp_core::motion::{self, DEAD_ZONE};

/// Print the curve output for one displacement
pub fn run(delta: f64, sensitivity: f64, inverted: bool) -> Result<()> {
    let sensitivity = clamp_sensitivity(sensitivity);

    println!("Displacement: {:.1}", delta);
    println!(
        "Sensitivity: {:.2} (adjusted {:.3})",
        sensitivity,
        motion::adjusted_sensitivity(sensitivity)
    );
    println!("Raw speed: {:.3}", motion::raw_speed(delta));

    match motion::scroll_vector(delta, sensitivity, inverted) {
        Some(vector) => {
            let direction = if vector > 0.0 { "up" } else { "down" };
            println!("Scroll: {:.3} per tick ({})", vector, direction);
        }
        None if delta.abs() <= DEAD_ZONE => println!("Scroll: none (inside dead zone)"),
        None => println!("Scroll: none (below threshold)"),
    }

    Ok(())
}
