use behave_kernel::{Behavior, BehaviorContext};
use behave_types::{BehaviorError, SPEED_NORMAL, Speed, SubResult};
use tracing::{debug, warn};

pub const DEFAULT_DRIVE_TICKS: u32 = 100;
/// Cycles of driving without a single encoder mark before giving up.
pub const DEFAULT_PROGRESS_WINDOW: u32 = 25;

/// Callee that drives straight for a fixed number of cycles.
///
/// Returns `Success` when the cycles are used up, or `Fail` if the encoders
/// have not moved after the progress window.
#[derive(Debug)]
pub struct DriveFor {
    speed: Speed,
    ticks: u32,
    progress_window: u32,
    elapsed: u32,
    start: Option<(i32, i32)>,
}

impl Default for DriveFor {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveFor {
    pub fn new() -> Self {
        Self {
            speed: SPEED_NORMAL,
            ticks: DEFAULT_DRIVE_TICKS,
            progress_window: DEFAULT_PROGRESS_WINDOW,
            elapsed: 0,
            start: None,
        }
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_progress_window(mut self, window: u32) -> Self {
        self.progress_window = window.max(1);
        self
    }
}

impl Behavior for DriveFor {
    fn name(&self) -> &str {
        "drive_for"
    }

    fn on_enter(&mut self) {
        self.elapsed = 0;
        self.start = None;
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let frame = *ctx.sensors();
        let encoders = (frame.encoder_left, frame.encoder_right);
        let start = *self.start.get_or_insert(encoders);

        if self.elapsed >= self.progress_window && encoders == start {
            warn!(elapsed = self.elapsed, "no odometry progress, giving up");
            return ctx.exit(SubResult::Fail);
        }
        if self.elapsed >= self.ticks {
            debug!(elapsed = self.elapsed, "drive finished");
            return ctx.return_from();
        }

        self.elapsed += 1;
        ctx.set_speed(self.speed, self.speed);
        Ok(())
    }
}
