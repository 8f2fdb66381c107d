use behave_kernel::{Behavior, BehaviorContext};
use behave_types::BehaviorError;

/// Lowest layer: drives at whatever base speed the operator requested.
#[derive(Debug, Default)]
pub struct BaseDrive;

impl BaseDrive {
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for BaseDrive {
    fn name(&self) -> &str {
        "base_drive"
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let frame = *ctx.sensors();
        ctx.set_speed(frame.target_left, frame.target_right);
        Ok(())
    }
}
