//! `behave-runtime` – Behaviors, Tick Driver & Telemetry
//!
//! Everything needed to actually run the arbitration engine from
//! `behave-kernel` on a (simulated) robot.
//!
//! # Modules
//!
//! - [`behaviors`] – the demonstration behavior set: border and collision
//!   reflexes, a base drive, two callees ([`DriveFor`][behaviors::DriveFor],
//!   [`Delay`][behaviors::Delay]) and the [`Patrol`][behaviors::Patrol]
//!   caller that delegates to them.
//! - [`stall_guard`] – [`StallGuard`][stall_guard::StallGuard]: notices when
//!   the wheels are commanded but the encoders do not move.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: owns the
//!   engine and the [`SimDrive`][behave_hal::SimDrive] and steps them, either
//!   as fast as possible or paced on a `tokio` interval.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber from a
//!   [`TelemetryConfig`][telemetry::TelemetryConfig], with an optional OTLP
//!   span exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to export the
//!   per-cycle spans to any OTLP-compatible collector.

pub mod behaviors;
pub mod control_loop;
pub mod stall_guard;
pub mod telemetry;

pub use behaviors::{BehaviorOverride, DemoHandles, register_demo};
pub use control_loop::{ControlLoop, ControlLoopConfig, RunSummary, StepReport};
pub use stall_guard::StallGuard;
pub use telemetry::{LogFormat, TelemetryConfig, TracerProviderGuard, init_tracing, init_with};
