//! [`MotorSink`] – the single output port of the arbitration loop.
//!
//! The engine never talks to motor drivers directly.  Once per control cycle
//! it hands exactly one [`MotorCommand`] to whatever implements this trait:
//! a PWM driver on the robot, the [`SimDrive`][crate::sim::SimDrive] in tests
//! and on the desktop, or a plain [`RecordingSink`] in unit tests.

use behave_types::{BehaviorError, MotorCommand};

/// Receiver for the per-cycle differential-drive command.
pub trait MotorSink: Send {
    /// Apply `command` to the wheels.
    ///
    /// A side left at `None` carries no opinion; the sink decides how to
    /// interpret that (the simulated drive stops the wheel).
    ///
    /// # Errors
    ///
    /// Returns [`BehaviorError::Actuator`] when the command cannot be applied.
    fn emit(&mut self, command: MotorCommand) -> Result<(), BehaviorError>;
}

/// Sink that keeps every command it receives, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    commands: Vec<MotorCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands received so far.
    pub fn commands(&self) -> &[MotorCommand] {
        &self.commands
    }

    /// The most recently received command.
    pub fn last(&self) -> Option<MotorCommand> {
        self.commands.last().copied()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl MotorSink for RecordingSink {
    fn emit(&mut self, command: MotorCommand) -> Result<(), BehaviorError> {
        self.commands.push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.emit(MotorCommand::new(10, 20)).unwrap();
        sink.emit(MotorCommand::IGNORE).unwrap();

        assert_eq!(sink.commands().len(), 2);
        assert_eq!(sink.commands()[0], MotorCommand::new(10, 20));
        assert_eq!(sink.last(), Some(MotorCommand::IGNORE));

        sink.clear();
        assert!(sink.last().is_none());
    }
}
