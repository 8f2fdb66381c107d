//! [`StallGuard`] – detects a robot that is told to drive but does not move.
//!
//! The guard is fed once per control cycle with the command that was emitted
//! and the sensor frame that followed.  Every cycle in which the wheels were
//! commanded to turn but neither encoder advanced extends a streak; any
//! encoder progress, or a cycle that commands no motion, ends it.  Once the
//! streak reaches `threshold` the robot is considered stuck.
//!
//! # Example
//!
//! ```rust
//! use behave_runtime::stall_guard::StallGuard;
//! use behave_types::{MotorCommand, SensorFrame};
//!
//! let mut guard = StallGuard::new(3);
//! let frozen = SensorFrame::default();
//! let forward = MotorCommand::new(100, 100);
//!
//! assert!(!guard.record(forward, &frozen));
//! assert!(!guard.record(forward, &frozen));
//! assert!(guard.record(forward, &frozen)); // third cycle without progress
//!
//! guard.reset();
//! assert!(!guard.record(forward, &frozen));
//! ```

use behave_types::{MotorCommand, SensorFrame};
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// StallGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Counts consecutive cycles of commanded motion without odometry progress.
#[derive(Debug, Clone)]
pub struct StallGuard {
    threshold: u32,
    streak: u32,
    last_encoders: Option<(i32, i32)>,
}

impl StallGuard {
    /// `threshold` is the number of motionless cycles that counts as a stall.
    /// Values below 1 are raised to 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            streak: 0,
            last_encoders: None,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current streak length.
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Feed one cycle.  Returns `true` while the robot is considered stuck.
    pub fn record(&mut self, command: MotorCommand, frame: &SensorFrame) -> bool {
        let encoders = (frame.encoder_left, frame.encoder_right);
        let progressed = self.last_encoders.is_some_and(|last| last != encoders);
        self.last_encoders = Some(encoders);

        if commands_motion(command) && !progressed {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
        }

        let stuck = self.is_stuck();
        if stuck && self.streak == self.threshold {
            warn!(
                cycles = self.streak,
                left = frame.encoder_left,
                right = frame.encoder_right,
                "wheels commanded but encoders frozen"
            );
        }
        stuck
    }

    pub fn is_stuck(&self) -> bool {
        self.streak >= self.threshold
    }

    /// Forget the streak and the last encoder reading.
    pub fn reset(&mut self) {
        self.streak = 0;
        self.last_encoders = None;
    }
}

fn commands_motion(command: MotorCommand) -> bool {
    command.left.is_some_and(|s| s != 0) || command.right.is_some_and(|s| s != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(left: i32, right: i32) -> SensorFrame {
        SensorFrame {
            encoder_left: left,
            encoder_right: right,
            ..SensorFrame::default()
        }
    }

    #[test]
    fn progress_breaks_the_streak() {
        let mut guard = StallGuard::new(3);
        let go = MotorCommand::new(100, 100);
        assert!(!guard.record(go, &frame(0, 0)));
        assert!(!guard.record(go, &frame(0, 0)));
        assert!(!guard.record(go, &frame(1, 0)));
        assert_eq!(guard.streak(), 0);
    }

    #[test]
    fn standing_still_is_not_a_stall() {
        let mut guard = StallGuard::new(2);
        for _ in 0..10 {
            assert!(!guard.record(MotorCommand::IGNORE, &frame(0, 0)));
            assert!(!guard.record(MotorCommand::new(0, 0), &frame(0, 0)));
        }
    }

    #[test]
    fn one_sided_command_counts_as_motion() {
        let mut guard = StallGuard::new(2);
        let pivot = MotorCommand {
            left: Some(-80),
            right: None,
        };
        assert!(!guard.record(pivot, &frame(5, 5)));
        assert!(guard.record(pivot, &frame(5, 5)));
    }

    #[test]
    fn stays_stuck_until_progress() {
        let mut guard = StallGuard::new(2);
        let go = MotorCommand::new(100, 100);
        guard.record(go, &frame(0, 0));
        assert!(guard.record(go, &frame(0, 0)));
        assert!(guard.record(go, &frame(0, 0)));
        assert!(!guard.record(go, &frame(0, 3)));
    }

    #[test]
    fn zero_threshold_is_raised() {
        let guard = StallGuard::new(0);
        assert_eq!(guard.threshold(), 1);
    }

    #[test]
    fn reset_forgets_encoders() {
        let mut guard = StallGuard::new(5);
        let go = MotorCommand::new(100, 100);
        guard.record(go, &frame(0, 0));
        guard.record(go, &frame(0, 0));
        guard.reset();
        assert_eq!(guard.streak(), 0);
        // First reading after a reset has nothing to compare with.
        guard.record(go, &frame(9, 9));
        assert_eq!(guard.streak(), 1);
    }
}
