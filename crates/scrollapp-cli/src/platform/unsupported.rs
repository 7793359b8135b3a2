use scrollapp_core::backend::{InputSubscription, ScrollEmitter};
use scrollapp_core::input::EventInterest;
use scrollapp_core::{
    Capabilities, CursorControl, Error, InputBackend, InputSink, PointerSource, Position, Result,
};
use tracing::warn;

const MESSAGE: &str = "auto-scroll is only supported on macOS";

/// Stand-in for every capability: nothing can be read or emitted
struct Unsupported;

impl ScrollEmitter for Unsupported {
    fn emit_scroll(&mut self, _amount: f64) -> Result<()> {
        Err(Error::Platform(MESSAGE.to_string()))
    }
}

impl CursorControl for Unsupported {
    fn set_cursor_override(&mut self, _enabled: bool) {}
}

impl PointerSource for Unsupported {
    fn position(&self) -> Result<Position> {
        Err(Error::Platform(MESSAGE.to_string()))
    }
}

impl InputBackend for Unsupported {
    fn subscribe(
        &mut self,
        _interest: EventInterest,
        _sink: InputSink,
    ) -> Result<Box<dyn InputSubscription>> {
        Err(Error::Platform(MESSAGE.to_string()))
    }
}

pub fn capabilities() -> Capabilities {
    warn!("Running on an unsupported platform: {}", MESSAGE);
    Capabilities {
        emitter: Box::new(Unsupported),
        cursor: Box::new(Unsupported),
        pointer: Box::new(Unsupported),
        input: Box::new(Unsupported),
    }
}
