//! Decoded movement input of a remote character
//!
//! The compact byte encoding lives in `net::protocol`; everything past the
//! transport boundary works with these tagged values.

use serde::{Deserialize, Serialize};

/// State of one input axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisInput {
    #[default]
    None,
    Positive,
    Negative,
}

impl AxisInput {
    /// Axis value in {-1, 0, 1}
    #[inline]
    pub fn value(self) -> f32 {
        match self {
            AxisInput::None => 0.0,
            AxisInput::Positive => 1.0,
            AxisInput::Negative => -1.0,
        }
    }

    #[inline]
    pub fn is_active(self) -> bool {
        self != AxisInput::None
    }
}

/// Last known movement input of a character
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementInput {
    pub vertical: AxisInput,
    pub horizontal: AxisInput,
}

impl MovementInput {
    pub const IDLE: MovementInput = MovementInput {
        vertical: AxisInput::None,
        horizontal: AxisInput::None,
    };

    pub fn new(vertical: AxisInput, horizontal: AxisInput) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    /// True if either axis is held
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.vertical.is_active() || self.horizontal.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_values() {
        assert_eq!(AxisInput::None.value(), 0.0);
        assert_eq!(AxisInput::Positive.value(), 1.0);
        assert_eq!(AxisInput::Negative.value(), -1.0);
    }

    #[test]
    fn test_is_moving() {
        assert!(!MovementInput::IDLE.is_moving());
        assert!(MovementInput::new(AxisInput::Positive, AxisInput::None).is_moving());
        assert!(MovementInput::new(AxisInput::None, AxisInput::Negative).is_moving());
        assert!(!MovementInput::default().is_moving());
    }
}
