//! Host capabilities for the engine

#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(target_os = "macos"))]
mod unsupported;

use scrollapp_core::Capabilities;

/// Capabilities for the platform this binary was built for
pub fn capabilities() -> anyhow::Result<Capabilities> {
    #[cfg(target_os = "macos")]
    {
        macos::capabilities()
    }

    #[cfg(not(target_os = "macos"))]
    {
        Ok(unsupported::capabilities())
    }
}
