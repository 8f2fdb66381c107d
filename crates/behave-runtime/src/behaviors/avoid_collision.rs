use behave_kernel::{Behavior, BehaviorContext};
use behave_types::{BehaviorError, SPEED_MAX};

pub const COL_CLOSEST_MM: i16 = 100;
pub const COL_NEAR_MM: i16 = 200;
pub const COL_FAR_MM: i16 = 400;

pub const BRAKE_CLOSEST: f32 = -1.0;
pub const BRAKE_NEAR: f32 = 0.6;
pub const BRAKE_FAR: f32 = 0.8;

/// Distance band a front sensor currently sits in.  Ordered from nearest to
/// farthest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Zone {
    Closest,
    Near,
    Far,
    #[default]
    Clear,
}

impl Zone {
    /// Next zone for a reading of `dist_mm`.  Zones are entered at their
    /// nominal thresholds; a sensor backing out of `Closest` reports `Far`
    /// until the reading passes half the far threshold.
    pub fn next(self, dist_mm: i16) -> Zone {
        if dist_mm < COL_CLOSEST_MM {
            Zone::Closest
        } else if dist_mm < COL_NEAR_MM && self > Zone::Closest {
            Zone::Near
        } else if dist_mm < COL_FAR_MM && self > Zone::Near {
            Zone::Far
        } else if dist_mm < COL_NEAR_MM / 2 {
            Zone::Near
        } else if dist_mm < COL_FAR_MM / 2 {
            Zone::Far
        } else {
            Zone::Clear
        }
    }

    /// Speed factor applied to the wheel on the other side.
    pub fn brake(self) -> f32 {
        match self {
            Zone::Closest => BRAKE_CLOSEST,
            Zone::Near => BRAKE_NEAR,
            Zone::Far => BRAKE_FAR,
            Zone::Clear => 1.0,
        }
    }
}

/// Slows the wheel opposite an approaching obstacle and turns on the spot
/// when both sides are blocked.
#[derive(Debug, Default)]
pub struct AvoidCollision {
    left: Zone,
    right: Zone,
}

impl AvoidCollision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current `(left, right)` zones.
    pub fn zones(&self) -> (Zone, Zone) {
        (self.left, self.right)
    }
}

impl Behavior for AvoidCollision {
    fn name(&self) -> &str {
        "avoid_collision"
    }

    fn on_enter(&mut self) {
        self.left = Zone::Clear;
        self.right = Zone::Clear;
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let frame = *ctx.sensors();
        self.left = self.left.next(frame.dist_left_mm);
        self.right = self.right.next(frame.dist_right_mm);

        // An obstacle on the left slows the right wheel, steering away.
        ctx.set_factor(self.right.brake(), self.left.brake());

        if self.left == Zone::Closest && self.right == Zone::Closest {
            ctx.set_speed(
                SPEED_MAX.saturating_sub(frame.target_left),
                (-SPEED_MAX).saturating_sub(frame.target_right),
            );
        }
        Ok(())
    }
}
