//! Activation detection
//!
//! Turns raw input events into session commands according to the configured
//! [`ActivationMethod`]. The detector reads the session state but never
//! changes it; it only returns [`Command`]s for the controller to apply.
//!
//! Compound gestures (double press, modifier then scroll) are correlated
//! through one [`GestureWindow`] per gesture kind. A window that runs out
//! before the second half arrives is dropped without producing anything.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::input::{EventInterest, InputEvent, Modifier, ModifierSet, MouseButton};
use crate::session::SessionState;
use crate::{Error, Result};

/// Scroll deltas at or below this are treated as noise by the trackpad gesture
pub const SCROLL_DELTA_THRESHOLD: f64 = 0.1;

/// Request for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Activate,
    Deactivate,
    Restart,
}

/// Configured rule that starts and stops a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMethod {
    #[default]
    MiddleClick,
    Button4Click,
    Button5Click,
    OptionMiddleClick,
    CommandMiddleClick,
    ControlMiddleClick,
    DoubleMiddleClick,
    OptionScroll,
}

/// Behavioral attributes of an activation method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodAttributes {
    /// Button whose press triggers the method
    pub button: Option<MouseButton>,
    /// Modifier that must be held during the button press
    pub button_modifier: Option<Modifier>,
    /// Presses needed within the double-press window
    pub presses: u8,
    /// Modifier that opens the modifier-then-scroll gesture
    pub gesture_modifier: Option<Modifier>,
}

impl ActivationMethod {
    pub const ALL: [ActivationMethod; 8] = [
        ActivationMethod::MiddleClick,
        ActivationMethod::Button4Click,
        ActivationMethod::Button5Click,
        ActivationMethod::OptionMiddleClick,
        ActivationMethod::CommandMiddleClick,
        ActivationMethod::ControlMiddleClick,
        ActivationMethod::DoubleMiddleClick,
        ActivationMethod::OptionScroll,
    ];

    pub fn attributes(self) -> MethodAttributes {
        const fn press(button: MouseButton, modifier: Option<Modifier>, presses: u8) -> MethodAttributes {
            MethodAttributes {
                button: Some(button),
                button_modifier: modifier,
                presses,
                gesture_modifier: None,
            }
        }

        match self {
            ActivationMethod::MiddleClick => press(MouseButton::Middle, None, 1),
            ActivationMethod::Button4Click => press(MouseButton::Button4, None, 1),
            ActivationMethod::Button5Click => press(MouseButton::Button5, None, 1),
            ActivationMethod::OptionMiddleClick => press(MouseButton::Middle, Some(Modifier::Option), 1),
            ActivationMethod::CommandMiddleClick => press(MouseButton::Middle, Some(Modifier::Command), 1),
            ActivationMethod::ControlMiddleClick => press(MouseButton::Middle, Some(Modifier::Control), 1),
            ActivationMethod::DoubleMiddleClick => press(MouseButton::Middle, None, 2),
            ActivationMethod::OptionScroll => MethodAttributes {
                button: None,
                button_modifier: None,
                presses: 0,
                gesture_modifier: Some(Modifier::Option),
            },
        }
    }

    /// Config-file name
    pub fn name(self) -> &'static str {
        match self {
            ActivationMethod::MiddleClick => "middle_click",
            ActivationMethod::Button4Click => "button4_click",
            ActivationMethod::Button5Click => "button5_click",
            ActivationMethod::OptionMiddleClick => "option_middle_click",
            ActivationMethod::CommandMiddleClick => "command_middle_click",
            ActivationMethod::ControlMiddleClick => "control_middle_click",
            ActivationMethod::DoubleMiddleClick => "double_middle_click",
            ActivationMethod::OptionScroll => "option_scroll",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActivationMethod::MiddleClick => "Middle-click toggles auto-scroll",
            ActivationMethod::Button4Click => "Mouse button 4 toggles auto-scroll",
            ActivationMethod::Button5Click => "Mouse button 5 toggles auto-scroll",
            ActivationMethod::OptionMiddleClick => "Option + middle-click toggles auto-scroll",
            ActivationMethod::CommandMiddleClick => "Command + middle-click toggles auto-scroll",
            ActivationMethod::ControlMiddleClick => "Control + middle-click toggles auto-scroll",
            ActivationMethod::DoubleMiddleClick => "Double middle-click toggles auto-scroll",
            ActivationMethod::OptionScroll => "Hold Option and scroll to start auto-scroll (trackpad)",
        }
    }

    /// Raw events a subscription must deliver for this method.
    ///
    /// Button presses are always needed for click-to-exit.
    pub fn interest(self) -> EventInterest {
        let gesture = self.attributes().gesture_modifier.is_some();
        EventInterest {
            buttons: true,
            modifiers: gesture,
            scroll: gesture,
        }
    }
}

impl fmt::Display for ActivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ActivationMethod::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::UnknownMethod(s.to_string()))
    }
}

/// Gesture window lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTimings {
    pub double_press: Duration,
    pub modifier_scroll: Duration,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            double_press: Duration::from_millis(500),
            modifier_scroll: Duration::from_millis(1000),
        }
    }
}

/// Interval in which the second half of a compound gesture must arrive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureWindow {
    pub started_at: Instant,
    pub expires_at: Instant,
}

impl GestureWindow {
    pub fn open(started_at: Instant, length: Duration) -> Self {
        Self {
            started_at,
            expires_at: started_at + length,
        }
    }

    #[inline]
    pub fn contains(&self, at: Instant) -> bool {
        at >= self.started_at && at < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct ActivationDetector {
    method: ActivationMethod,
    timings: GestureTimings,
    double_press: Option<GestureWindow>,
    modifier_scroll: Option<GestureWindow>,
    modifier_held: bool,
}

impl ActivationDetector {
    pub fn new(method: ActivationMethod, timings: GestureTimings) -> Self {
        Self {
            method,
            timings,
            double_press: None,
            modifier_scroll: None,
            modifier_held: false,
        }
    }

    pub fn method(&self) -> ActivationMethod {
        self.method
    }

    pub fn timings(&self) -> GestureTimings {
        self.timings
    }

    pub fn double_press_window(&self) -> Option<GestureWindow> {
        self.double_press
    }

    pub fn modifier_scroll_window(&self) -> Option<GestureWindow> {
        self.modifier_scroll
    }

    /// Switch methods, discarding any half-finished gesture
    pub fn reconfigure(&mut self, method: ActivationMethod) {
        self.method = method;
        self.double_press = None;
        self.modifier_scroll = None;
        self.modifier_held = false;
    }

    /// Earliest moment an open window runs out
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.double_press, self.modifier_scroll) {
            (Some(a), Some(b)) => Some(a.expires_at.min(b.expires_at)),
            (a, b) => a.or(b).map(|w| w.expires_at),
        }
    }

    /// Drop windows that have run out by `now`
    pub fn expire(&mut self, now: Instant) {
        if self.double_press.is_some_and(|w| w.expires_at <= now) {
            debug!("Double-press window expired");
            self.double_press = None;
        }
        if self.modifier_scroll.is_some_and(|w| w.expires_at <= now) {
            debug!("Modifier-scroll window expired");
            self.modifier_scroll = None;
        }
    }

    /// Feed one event; returns the command it produces, if any
    pub fn handle(&mut self, event: &InputEvent, state: SessionState) -> Option<Command> {
        self.expire(event.at());

        match *event {
            InputEvent::ButtonDown {
                button,
                modifiers,
                at,
            } => self.on_button(button, modifiers, at, state),
            InputEvent::ModifiersChanged { modifiers, at } => {
                self.on_modifiers(modifiers, at, state);
                None
            }
            InputEvent::ScrollWheel { delta_y, at } => self.on_scroll(delta_y, at, state),
        }
    }

    fn on_button(
        &mut self,
        button: MouseButton,
        modifiers: ModifierSet,
        at: Instant,
        state: SessionState,
    ) -> Option<Command> {
        let attrs = self.method.attributes();
        let qualifies = attrs.button == Some(button)
            && attrs.button_modifier.map_or(true, |m| modifiers.contains(m));

        if qualifies {
            if attrs.presses >= 2 {
                return match self.double_press.take() {
                    Some(window) if window.contains(at) => Some(toggle(state)),
                    _ => {
                        // First half of the sequence
                        self.double_press = Some(GestureWindow::open(at, self.timings.double_press));
                        None
                    }
                };
            }
            return Some(toggle(state));
        }

        // Any other press breaks a pending double press
        self.double_press = None;

        // Click anywhere to exit
        match state {
            SessionState::Active => {
                debug!("Click-to-exit on {} button", button);
                Some(Command::Deactivate)
            }
            SessionState::Idle => None,
        }
    }

    fn on_modifiers(&mut self, modifiers: ModifierSet, at: Instant, state: SessionState) {
        let Some(gesture_modifier) = self.method.attributes().gesture_modifier else {
            return;
        };

        let held = modifiers.contains(gesture_modifier);
        if held && !self.modifier_held && state == SessionState::Idle {
            self.modifier_scroll = Some(GestureWindow::open(at, self.timings.modifier_scroll));
        } else if !held {
            self.modifier_scroll = None;
        }
        self.modifier_held = held;
    }

    fn on_scroll(&mut self, delta_y: f64, at: Instant, state: SessionState) -> Option<Command> {
        if state == SessionState::Active || delta_y.abs() <= SCROLL_DELTA_THRESHOLD {
            return None;
        }

        match self.modifier_scroll {
            Some(window) if window.contains(at) => {
                self.modifier_scroll = None;
                Some(Command::Activate)
            }
            _ => None,
        }
    }
}

#[inline]
fn toggle(state: SessionState) -> Command {
    match state {
        SessionState::Idle => Command::Activate,
        SessionState::Active => Command::Deactivate,
    }
}
