pub mod activation;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod ipc;
pub mod motion;
pub mod session;

pub use activation::{ActivationDetector, ActivationMethod, Command, GestureTimings, GestureWindow};
pub use backend::{
    Capabilities, CursorControl, InputBackend, InputSink, InputSubscription, PointerSource,
    ScrollEmitter,
};
pub use config::AppConfig;
pub use controller::{ControlHandle, ControlMessage, ControlRequest, Controller, StatusSnapshot};
pub use error::{Error, Result};
pub use input::{EventInterest, InputEvent, Modifier, ModifierSet, MouseButton, Position};
pub use ipc::{DaemonClient, DaemonServer};
pub use motion::{MotionSettings, ScrollQuantizer, ScrollVector};
pub use session::{ScrollSession, SessionEvent, SessionState};
