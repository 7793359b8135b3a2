//! Capabilities the engine needs from the host platform
//!
//! The session and controller never touch the OS directly. Cursor swapping,
//! synthetic scroll events, pointer reads and raw input capture all go
//! through these traits so the state machine can be driven by fakes.

use tokio::sync::mpsc;

use crate::controller::ControlMessage;
use crate::input::{EventInterest, InputEvent, Position};
use crate::motion::ScrollVector;
use crate::Result;

/// Synthesizes platform scroll events
pub trait ScrollEmitter: Send {
    /// Emit one scroll step. Only the sign and relative magnitude matter.
    fn emit_scroll(&mut self, amount: ScrollVector) -> Result<()>;
}

/// Hides and restores the pointer while a session is active
pub trait CursorControl: Send {
    fn set_cursor_override(&mut self, enabled: bool);
}

/// Reads the current pointer position
pub trait PointerSource: Send {
    fn position(&self) -> Result<Position>;
}

/// A live registration with the platform's input stream.
///
/// Dropping the subscription must tear it down before returning, so that a
/// replacement can be armed without two registrations overlapping.
pub trait InputSubscription: Send {
    fn interest(&self) -> EventInterest;
}

/// Creates input subscriptions
pub trait InputBackend: Send {
    fn subscribe(
        &mut self,
        interest: EventInterest,
        sink: InputSink,
    ) -> Result<Box<dyn InputSubscription>>;
}

/// Handle a subscription uses to push events into the controller queue.
///
/// Each sink is stamped with the generation of the subscription it was
/// created for; the controller drops events from older generations.
#[derive(Debug, Clone)]
pub struct InputSink {
    tx: mpsc::UnboundedSender<ControlMessage>,
    generation: u64,
    interest: EventInterest,
}

impl InputSink {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<ControlMessage>,
        generation: u64,
        interest: EventInterest,
    ) -> Self {
        Self {
            tx,
            generation,
            interest,
        }
    }

    /// Forward an event. Returns false once the controller has gone away.
    pub fn send(&self, event: InputEvent) -> bool {
        if !self.interest.wants(&event) {
            return true;
        }
        self.tx
            .send(ControlMessage::Input {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn interest(&self) -> EventInterest {
        self.interest
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything the controller needs from the host, bundled
pub struct Capabilities {
    pub emitter: Box<dyn ScrollEmitter>,
    pub cursor: Box<dyn CursorControl>,
    pub pointer: Box<dyn PointerSource>,
    pub input: Box<dyn InputBackend>,
}
