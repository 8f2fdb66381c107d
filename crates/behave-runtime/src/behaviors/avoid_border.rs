use behave_kernel::{Behavior, BehaviorContext};
use behave_types::{BehaviorError, SPEED_NORMAL};

/// Border sensor reading above which the floor is considered to end.
pub const BORDER_DANGEROUS: i16 = 500;

/// Backs a wheel away from a floor edge.  Sides over safe ground keep no
/// opinion.
#[derive(Debug, Default)]
pub struct AvoidBorder;

impl AvoidBorder {
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for AvoidBorder {
    fn name(&self) -> &str {
        "avoid_border"
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        let frame = *ctx.sensors();
        if frame.border_left > BORDER_DANGEROUS {
            ctx.set_speed_left(-SPEED_NORMAL);
        }
        if frame.border_right > BORDER_DANGEROUS {
            ctx.set_speed_right(-SPEED_NORMAL);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use behave_hal::RecordingSink;
    use behave_kernel::EngineBuilder;
    use behave_types::{MotorCommand, SensorFrame};

    use super::*;

    fn run(frame: SensorFrame) -> MotorCommand {
        let mut builder = EngineBuilder::new();
        builder.register(250, AvoidBorder::new(), true);
        let mut engine = builder.build();
        let mut sink = RecordingSink::new();
        engine.tick(&frame, &mut sink).unwrap().command
    }

    #[test]
    fn safe_floor_has_no_opinion() {
        assert!(run(SensorFrame::default()).is_ignore());
        let at_threshold = SensorFrame {
            border_left: BORDER_DANGEROUS,
            ..SensorFrame::default()
        };
        assert!(run(at_threshold).is_ignore());
    }

    #[test]
    fn edge_reverses_only_that_side() {
        let frame = SensorFrame {
            border_right: 700,
            ..SensorFrame::default()
        };
        let cmd = run(frame);
        assert_eq!(cmd.left, None);
        assert_eq!(cmd.right, Some(-SPEED_NORMAL));
    }
}
