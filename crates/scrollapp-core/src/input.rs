//! Raw input vocabulary shared by the detector, the controller and the
//! platform backends.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Pointer position in global screen coordinates.
///
/// The vertical axis grows downward, so moving the pointer up produces a
/// negative vertical delta relative to an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Physical mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Button4,
    Button5,
    Other(u32),
}

impl MouseButton {
    /// Map a zero-based platform button number (0 = left, 2 = middle)
    pub fn from_number(number: u32) -> Self {
        match number {
            0 => MouseButton::Left,
            1 => MouseButton::Right,
            2 => MouseButton::Middle,
            3 => MouseButton::Button4,
            4 => MouseButton::Button5,
            n => MouseButton::Other(n),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MouseButton::Left => write!(f, "left"),
            MouseButton::Right => write!(f, "right"),
            MouseButton::Middle => write!(f, "middle"),
            MouseButton::Button4 => write!(f, "button 4"),
            MouseButton::Button5 => write!(f, "button 5"),
            MouseButton::Other(n) => write!(f, "button {}", n + 1),
        }
    }
}

/// Keyboard modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Shift,
    Control,
    Option,
    Command,
}

impl Modifier {
    const ALL: [Modifier; 4] = [
        Modifier::Shift,
        Modifier::Control,
        Modifier::Option,
        Modifier::Command,
    ];

    #[inline]
    fn bit(self) -> u8 {
        match self {
            Modifier::Shift => 1 << 0,
            Modifier::Control => 1 << 1,
            Modifier::Option => 1 << 2,
            Modifier::Command => 1 << 3,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Shift => write!(f, "shift"),
            Modifier::Control => write!(f, "control"),
            Modifier::Option => write!(f, "option"),
            Modifier::Command => write!(f, "command"),
        }
    }
}

/// Set of modifiers held at the time of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub const NONE: ModifierSet = ModifierSet(0);

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.insert(modifier);
        self
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    #[inline]
    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModifierSet::NONE;
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

/// A raw input event as delivered by a platform subscription
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// A mouse button went down
    ButtonDown {
        button: MouseButton,
        modifiers: ModifierSet,
        at: Instant,
    },
    /// The set of held modifier keys changed
    ModifiersChanged { modifiers: ModifierSet, at: Instant },
    /// A scroll wheel or two-finger trackpad scroll
    ScrollWheel { delta_y: f64, at: Instant },
}

impl InputEvent {
    pub fn at(&self) -> Instant {
        match self {
            InputEvent::ButtonDown { at, .. }
            | InputEvent::ModifiersChanged { at, .. }
            | InputEvent::ScrollWheel { at, .. } => *at,
        }
    }
}

/// Which raw event kinds a subscription must deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventInterest {
    pub buttons: bool,
    pub modifiers: bool,
    pub scroll: bool,
}

impl EventInterest {
    pub fn wants(&self, event: &InputEvent) -> bool {
        match event {
            InputEvent::ButtonDown { .. } => self.buttons,
            InputEvent::ModifiersChanged { .. } => self.modifiers,
            InputEvent::ScrollWheel { .. } => self.scroll,
        }
    }
}
