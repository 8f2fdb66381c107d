use behave_kernel::{Behavior, BehaviorContext};
use behave_types::{BehaviorError, SPEED_STOP};

/// Default pause length in control cycles.
pub const DEFAULT_DELAY_TICKS: u32 = 50;

/// Callee that holds the robot still for a number of cycles, then returns
/// `Success` to whoever delegated to it.
#[derive(Debug)]
pub struct Delay {
    ticks: u32,
    remaining: u32,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay {
    pub fn new() -> Self {
        Self::with_ticks(DEFAULT_DELAY_TICKS)
    }

    pub fn with_ticks(ticks: u32) -> Self {
        Self {
            ticks,
            remaining: ticks,
        }
    }
}

impl Behavior for Delay {
    fn name(&self) -> &str {
        "delay"
    }

    fn on_enter(&mut self) {
        self.remaining = self.ticks;
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        if self.remaining == 0 {
            return ctx.return_from();
        }
        self.remaining -= 1;
        ctx.set_speed(SPEED_STOP, SPEED_STOP);
        Ok(())
    }
}
