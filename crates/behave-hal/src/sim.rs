//! In-process differential-drive simulation for running the behavior engine
//! without a robot.
//!
//! [`SimDrive`] is both the actuator sink and the sensor source: commands
//! received through [`MotorSink::emit`] are shaped the way the real motor
//! path shapes them, and [`SimDrive::advance`] integrates the resulting wheel
//! speeds into encoder ticks.  Distance and border readings are set by the
//! test or operator.
//!
//! # Example
//!
//! ```rust
//! use behave_hal::actuator::MotorSink;
//! use behave_hal::sim::SimDrive;
//! use behave_types::MotorCommand;
//!
//! let mut drive = SimDrive::new().with_distances(1000, 1000);
//! drive.emit(MotorCommand::new(150, 150)).expect("sim emit must succeed");
//! drive.advance(1.0);
//!
//! assert!(drive.frame().encoder_left > 0);
//! ```

use behave_types::{
    BehaviorError, MotorCommand, SPEED_MAX, SPEED_SLOW, SPEED_STOP, SensorFrame, Speed,
};
use tracing::trace;

use crate::actuator::MotorSink;

/// Encoder marks per wheel revolution.
pub const ENCODER_MARKS: f32 = 60.0;
/// Wheel circumference in mm.
pub const WHEEL_PERIMETER_MM: f32 = 178.0;

/// Reading reported by a distance sensor that sees nothing.
pub const DIST_CLEAR_MM: i16 = 999;

// ────────────────────────────────────────────────────────────────────────────
// Speed shaping
// ────────────────────────────────────────────────────────────────────────────

/// Map a wish onto a speed the motors can actually run.
///
/// No opinion stops the wheel, zero stays zero, magnitudes are clamped into
/// `[SPEED_SLOW, max]` and the sign is preserved.
pub fn shape_speed(wish: Option<Speed>, max: Speed) -> Speed {
    let raw = i32::from(wish.unwrap_or(SPEED_STOP));
    if raw == 0 {
        return SPEED_STOP;
    }
    let magnitude = raw.abs().clamp(i32::from(SPEED_SLOW), i32::from(max.max(SPEED_SLOW)));
    (magnitude * raw.signum()) as Speed
}

// ────────────────────────────────────────────────────────────────────────────
// SimDrive
// ────────────────────────────────────────────────────────────────────────────

/// Simulated two-wheel base with front distance and floor border sensors.
#[derive(Debug, Clone)]
pub struct SimDrive {
    max_speed: Speed,
    speed_left: Speed,
    speed_right: Speed,
    /// Sub-tick encoder remainders.
    odo_left: f32,
    odo_right: f32,
    /// When set the wheels spin against an obstacle and encoders freeze.
    blocked: bool,
    frame: SensorFrame,
}

impl Default for SimDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDrive {
    /// Create a stopped base facing open space.
    pub fn new() -> Self {
        Self {
            max_speed: SPEED_MAX,
            speed_left: SPEED_STOP,
            speed_right: SPEED_STOP,
            odo_left: 0.0,
            odo_right: 0.0,
            blocked: false,
            frame: SensorFrame {
                dist_left_mm: DIST_CLEAR_MM,
                dist_right_mm: DIST_CLEAR_MM,
                ..SensorFrame::default()
            },
        }
    }

    /// Limit wheel speed magnitude to `max_speed`.
    pub fn with_max_speed(mut self, max_speed: Speed) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn with_distances(mut self, left_mm: i16, right_mm: i16) -> Self {
        self.set_distances(left_mm, right_mm);
        self
    }

    pub fn set_distances(&mut self, left_mm: i16, right_mm: i16) {
        self.frame.dist_left_mm = left_mm;
        self.frame.dist_right_mm = right_mm;
    }

    pub fn set_border(&mut self, left: i16, right: i16) {
        self.frame.border_left = left;
        self.frame.border_right = right;
    }

    /// Operator base speed, read by the base-drive behavior.
    pub fn set_target(&mut self, left: Speed, right: Speed) {
        self.frame.target_left = left;
        self.frame.target_right = right;
    }

    /// Freeze (or release) the encoders regardless of commanded speed.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Current shaped wheel speeds `(left, right)`.
    pub fn wheel_speeds(&self) -> (Speed, Speed) {
        (self.speed_left, self.speed_right)
    }

    /// Snapshot of every sensor for the next control cycle.
    pub fn frame(&self) -> SensorFrame {
        self.frame
    }

    /// Integrate the current wheel speeds over `dt_secs` and bump the tick
    /// counter.
    pub fn advance(&mut self, dt_secs: f32) {
        self.frame.tick += 1;
        if self.blocked || dt_secs <= 0.0 {
            return;
        }
        let marks_per_mm = ENCODER_MARKS / WHEEL_PERIMETER_MM;
        self.odo_left += f32::from(self.speed_left) * dt_secs * marks_per_mm;
        self.odo_right += f32::from(self.speed_right) * dt_secs * marks_per_mm;

        let whole_left = self.odo_left.trunc();
        let whole_right = self.odo_right.trunc();
        self.frame.encoder_left += whole_left as i32;
        self.frame.encoder_right += whole_right as i32;
        self.odo_left -= whole_left;
        self.odo_right -= whole_right;
    }
}

impl MotorSink for SimDrive {
    fn emit(&mut self, command: MotorCommand) -> Result<(), BehaviorError> {
        self.speed_left = shape_speed(command.left, self.max_speed);
        self.speed_right = shape_speed(command.right, self.max_speed);
        trace!(left = self.speed_left, right = self.speed_right, "sim motors set");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_stops_the_wheels() {
        assert_eq!(shape_speed(None, SPEED_MAX), SPEED_STOP);

        let mut drive = SimDrive::new();
        drive.emit(MotorCommand::new(200, 200)).unwrap();
        drive.emit(MotorCommand::IGNORE).unwrap();
        assert_eq!(drive.wheel_speeds(), (0, 0));
    }

    #[test]
    fn speeds_are_clamped_to_max() {
        assert_eq!(shape_speed(Some(1000), SPEED_MAX), SPEED_MAX);
        assert_eq!(shape_speed(Some(-1000), SPEED_MAX), -SPEED_MAX);
    }

    #[test]
    fn small_speeds_are_raised_to_slow() {
        assert_eq!(shape_speed(Some(10), SPEED_MAX), SPEED_SLOW);
        assert_eq!(shape_speed(Some(-10), SPEED_MAX), -SPEED_SLOW);
        assert_eq!(shape_speed(Some(0), SPEED_MAX), 0);
    }

    #[test]
    fn extreme_negative_speed_does_not_overflow() {
        assert_eq!(shape_speed(Some(i16::MIN), SPEED_MAX), -SPEED_MAX);
    }

    #[test]
    fn max_speed_setting_is_respected() {
        let mut drive = SimDrive::new().with_max_speed(200);
        drive.emit(MotorCommand::new(450, -450)).unwrap();
        assert_eq!(drive.wheel_speeds(), (200, -200));
    }

    #[test]
    fn advance_integrates_encoder_ticks() {
        let mut drive = SimDrive::new();
        drive.emit(MotorCommand::new(178, -178)).unwrap();
        drive.advance(1.0);

        let frame = drive.frame();
        // 178 mm/s for one second is exactly one wheel revolution.
        assert_eq!(frame.encoder_left, 60);
        assert_eq!(frame.encoder_right, -60);
        assert_eq!(frame.tick, 1);
    }

    #[test]
    fn fractional_progress_accumulates() {
        let mut drive = SimDrive::new();
        drive.emit(MotorCommand::new(SPEED_SLOW, SPEED_SLOW)).unwrap();
        // 50 mm/s * 0.01 s = 0.5 mm ≈ 0.17 marks per step.
        for _ in 0..100 {
            drive.advance(0.01);
        }
        let frame = drive.frame();
        assert!(frame.encoder_left >= 16 && frame.encoder_left <= 17);
        assert_eq!(frame.tick, 100);
    }

    #[test]
    fn blocked_wheels_do_not_move_encoders() {
        let mut drive = SimDrive::new();
        drive.set_blocked(true);
        drive.emit(MotorCommand::new(SPEED_MAX, SPEED_MAX)).unwrap();
        drive.advance(1.0);
        assert_eq!(drive.frame().encoder_left, 0);
        assert_eq!(drive.frame().tick, 1);
    }

    #[test]
    fn sensor_setters_show_up_in_frame() {
        let mut drive = SimDrive::new().with_distances(120, 80);
        drive.set_border(600, 0);
        drive.set_target(100, 90);

        let frame = drive.frame();
        assert_eq!((frame.dist_left_mm, frame.dist_right_mm), (120, 80));
        assert_eq!((frame.border_left, frame.border_right), (600, 0));
        assert_eq!((frame.target_left, frame.target_right), (100, 90));
    }

    #[test]
    fn fresh_drive_sees_open_space() {
        let frame = SimDrive::new().frame();
        assert_eq!(frame.dist_left_mm, DIST_CLEAR_MM);
        assert_eq!(frame.dist_right_mm, DIST_CLEAR_MM);
    }
}
