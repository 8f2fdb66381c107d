//! `behave-kernel` – Arbitration & Control Transfer
//!
//! The core of the robot's behavior layer.  It decides, once per control
//! cycle, which registered behavior drives the motors, and keeps track of
//! which behavior is running on behalf of which.
//!
//! # Modules
//!
//! - [`registry`] – [`BehaviorTable`][registry::BehaviorTable]: the arena of
//!   behavior records kept in descending priority order.
//! - [`wish`] – [`WishChannel`][wish::WishChannel] and
//!   [`FactorAccumulator`][wish::FactorAccumulator]: per-invocation speed and
//!   factor wishes and how they combine within one cycle.
//! - [`transfer`] – delegate / exit / return: the caller-chain protocol that
//!   lets one behavior suspend itself while another works for it.
//! - [`cancel`] – tearing down every delegate of a root behavior.
//! - [`activation`] – switching single records, the visible band, and the
//!   operator toggle.
//! - [`emergency`] – [`EmergencyProcedures`][emergency::EmergencyProcedures]:
//!   handlers run when the robot must drop what it is doing.
//! - [`engine`] – [`Engine`][engine::Engine], its builder, the
//!   [`Behavior`][engine::Behavior] trait and the arbitration loop.

pub mod activation;
pub mod cancel;
pub mod emergency;
pub mod engine;
pub mod registry;
pub mod transfer;
pub mod wish;

pub use emergency::EmergencyProcedures;
pub use engine::{Behavior, BehaviorContext, CycleReport, Engine, EngineBuilder, from_fn};
pub use registry::{BehaviorRecord, BehaviorTable};
pub use transfer::Delegation;
pub use wish::{FactorAccumulator, WishChannel};
