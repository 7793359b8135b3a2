//! Motion curve: vertical pointer displacement to scroll speed
//!
//! Pure functions only. The curve has a dead zone around the anchor,
//! quadratic growth past it, a hard speed cap, and a sensitivity stage that
//! compresses low settings sub-linearly.

use serde::{Deserialize, Serialize};

use crate::input::Position;

/// Displacement band around the anchor that never scrolls
pub const DEAD_ZONE: f64 = 5.0;

/// Displacement past the dead zone at which acceleration reaches 1.0
pub const ACCELERATION_SCALE: f64 = 50.0;

/// Multiplier applied to the squared acceleration
pub const SPEED_FACTOR: f64 = 2.5;

/// Upper bound on raw speed before sensitivity scaling
pub const MAX_SCROLL_SPEED: f64 = 30.0;

/// Absolute floor of the suppression threshold
pub const SUPPRESSION_FLOOR: f64 = 0.1;

/// Signed scroll magnitude for one tick (positive scrolls up)
pub type ScrollVector = f64;

/// Per-session curve settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Expected in [0.2, 3.0]; the config layer clamps before this point
    pub sensitivity: f64,
    pub inverted: bool,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            inverted: false,
        }
    }
}

/// Sensitivity after compression: `s^1.5` below 1.0, linear otherwise
#[inline]
pub fn adjusted_sensitivity(sensitivity: f64) -> f64 {
    if sensitivity < 1.0 {
        sensitivity.powf(1.5)
    } else {
        sensitivity
    }
}

/// Raw speed before direction and sensitivity, in [0, MAX_SCROLL_SPEED]
#[inline]
pub fn raw_speed(vertical_delta: f64) -> f64 {
    let distance = (vertical_delta.abs() - DEAD_ZONE).max(0.0);
    let acceleration = (distance / ACCELERATION_SCALE).powi(2);
    (acceleration * SPEED_FACTOR).min(MAX_SCROLL_SPEED)
}

/// Unsuppressed curve output.
///
/// The sensitivity is not clamped here; values outside [0.2, 3.0]
/// extrapolate.
pub fn curve(vertical_delta: f64, sensitivity: f64, inverted: bool) -> f64 {
    // Pointer above the anchor (negative delta) scrolls up
    let mut direction = if vertical_delta > 0.0 { -1.0 } else { 1.0 };
    if inverted {
        direction = -direction;
    }

    direction * raw_speed(vertical_delta) * adjusted_sensitivity(sensitivity)
}

/// Smallest magnitude that is worth emitting at this sensitivity
#[inline]
pub fn suppression_threshold(sensitivity: f64) -> f64 {
    SUPPRESSION_FLOOR.min(adjusted_sensitivity(sensitivity) * 0.5)
}

/// Curve output, or `None` when it is below perceptible motion
pub fn scroll_vector(vertical_delta: f64, sensitivity: f64, inverted: bool) -> Option<ScrollVector> {
    let result = curve(vertical_delta, sensitivity, inverted);
    if result.abs() < suppression_threshold(sensitivity) {
        None
    } else {
        Some(result)
    }
}

/// One tick's worth of motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub vertical_delta: f64,
    pub scroll_vector: Option<ScrollVector>,
}

impl MotionSample {
    pub fn measure(anchor: Position, current: Position, settings: MotionSettings) -> Self {
        let vertical_delta = current.y - anchor.y;
        Self {
            vertical_delta,
            scroll_vector: scroll_vector(vertical_delta, settings.sensitivity, settings.inverted),
        }
    }
}

/// Converts fractional scroll amounts into whole pixel steps.
///
/// The fractional part is carried to the next push so that slow, low
/// sensitivity motion still scrolls. A change of direction drops the carry.
#[derive(Debug, Clone, Default)]
pub struct ScrollQuantizer {
    remainder: f64,
}

impl ScrollQuantizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount and return the whole pixels ready to emit
    pub fn push(&mut self, amount: f64) -> i32 {
        if self.remainder != 0.0 && amount.signum() != self.remainder.signum() {
            self.remainder = 0.0;
        }
        let total = self.remainder + amount;
        let whole = total.trunc();
        self.remainder = total - whole;
        whole as i32
    }

    pub fn reset(&mut self) {
        self.remainder = 0.0;
    }
}
