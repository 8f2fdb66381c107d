//! Per-invocation actuator wishes.
//!
//! A behavior expresses what it wants from the motors by writing into a
//! [`WishChannel`]: either an absolute speed per side, a multiplicative factor
//! per side, or both.  The channel is reset before every invocation, so a
//! behavior that writes nothing has no opinion.
//!
//! [`FactorAccumulator`] carries the product of all factor wishes seen so far
//! in the current cycle; the first absolute wish is scaled by it and becomes
//! the cycle's command.

use behave_types::{MotorCommand, Speed};

/// What one behavior asked for during one invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WishChannel {
    pub speed_left: Option<Speed>,
    pub speed_right: Option<Speed>,
    pub factor_left: f32,
    pub factor_right: f32,
}

impl Default for WishChannel {
    fn default() -> Self {
        Self {
            speed_left: None,
            speed_right: None,
            factor_left: 1.0,
            factor_right: 1.0,
        }
    }
}

impl WishChannel {
    /// Back to "no opinion".
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// `true` if either side carries an absolute speed.
    pub fn has_speed(&self) -> bool {
        self.speed_left.is_some() || self.speed_right.is_some()
    }
}

/// Running product of factor wishes within one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorAccumulator {
    left: f32,
    right: f32,
}

impl Default for FactorAccumulator {
    fn default() -> Self {
        Self {
            left: 1.0,
            right: 1.0,
        }
    }
}

impl FactorAccumulator {
    /// Fold the factors of `wish` into the running product.
    pub fn absorb(&mut self, wish: &WishChannel) {
        self.left *= wish.factor_left;
        self.right *= wish.factor_right;
    }

    pub fn left(&self) -> f32 {
        self.left
    }

    pub fn right(&self) -> f32 {
        self.right
    }

    /// Scale the absolute speeds of `wish`; sides without an opinion stay
    /// `None`.
    pub fn scale(&self, wish: &WishChannel) -> MotorCommand {
        MotorCommand {
            left: wish.speed_left.map(|s| scale_speed(s, self.left)),
            right: wish.speed_right.map(|s| scale_speed(s, self.right)),
        }
    }
}

fn scale_speed(speed: Speed, factor: f32) -> Speed {
    // `as` saturates on overflow and maps NaN to 0.
    (f32::from(speed) * factor) as Speed
}
