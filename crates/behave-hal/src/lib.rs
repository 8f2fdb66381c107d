//! `behave-hal` – Motor output boundary
//!
//! The arbitration loop produces one [`MotorCommand`][behave_types::MotorCommand]
//! per control cycle and hands it to a [`MotorSink`].  This crate owns that
//! port and the desktop simulation behind it.
//!
//! # Modules
//!
//! - [`actuator`] – [`MotorSink`][actuator::MotorSink]: the output trait, and
//!   [`RecordingSink`][actuator::RecordingSink] for tests.
//! - [`sim`] – [`SimDrive`][sim::SimDrive]: a simulated two-wheel base that
//!   shapes speeds like the real motor path and integrates encoder ticks.

pub mod actuator;
pub mod sim;

pub use actuator::{MotorSink, RecordingSink};
pub use sim::SimDrive;
