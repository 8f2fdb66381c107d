//! [`ControlLoop`] – drives the behavior engine against the simulated base.
//!
//! Each step:
//!
//! 1. **Sense** – take a [`SensorFrame`] snapshot from the [`SimDrive`].
//! 2. **Arbitrate** – run one [`Engine::tick`]; the winning command goes
//!    straight into the drive.
//! 3. **Move** – advance the simulation by one tick period.
//! 4. **Guard** – feed the command and the new odometry to the
//!    [`StallGuard`]; a stall triggers the emergency procedures.
//!
//! [`ControlLoop::run`] steps as fast as possible (simulated time), while
//! [`ControlLoop::run_until`] paces steps on a `tokio` interval until a
//! shutdown flag is raised.
//!
//! # Example
//!
//! ```rust
//! use behave_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//!
//! let mut control = ControlLoop::new(ControlLoopConfig::default());
//! control.drive_mut().set_target(150, 150);
//!
//! let summary = control.run(100).expect("demo behaviors never fail");
//! assert_eq!(summary.ticks, 100);
//! assert!(control.drive().frame().encoder_left > 0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use behave_hal::SimDrive;
use behave_kernel::{BehaviorTable, CycleReport, Engine, EngineBuilder};
use behave_types::{BehaviorError, PriorityBand, SPEED_MAX, SPEED_STOP, SensorFrame, Speed};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::behaviors::{BehaviorOverride, DemoHandles, register_demo};
use crate::stall_guard::StallGuard;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default control period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(10);
/// Default number of motionless cycles before a stall is declared.
pub const DEFAULT_STALL_THRESHOLD: u32 = 50;

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    /// Wall-clock period between two steps, also the simulated time step.
    pub tick_period: Duration,
    /// Motionless cycles that count as a stall.
    pub stall_threshold: u32,
    /// Priority range the operator may switch and `/reset` clears.
    pub visible_band: PriorityBand,
    /// Speed limit of the simulated motors.
    pub max_speed: Speed,
    /// Start-up overrides keyed by behavior name.
    pub overrides: HashMap<String, BehaviorOverride>,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            visible_band: PriorityBand::default(),
            max_speed: SPEED_MAX,
            overrides: HashMap::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single [`ControlLoop::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub cycle: CycleReport,
    /// Sensor frame after the simulation advanced.
    pub frame: SensorFrame,
    /// Whether this step tripped the stall guard.
    pub stalled: bool,
}

/// Totals over several steps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub stalls: u64,
    pub last: Option<StepReport>,
}

impl RunSummary {
    fn absorb(&mut self, report: StepReport) {
        self.ticks += 1;
        if report.stalled {
            self.stalls += 1;
        }
        self.last = Some(report);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the engine, the simulated drive and the stall guard.
pub struct ControlLoop {
    engine: Engine,
    drive: SimDrive,
    guard: StallGuard,
    handles: DemoHandles,
    tick_period: Duration,
}

impl ControlLoop {
    /// Build the demo engine described by `config`.
    pub fn new(config: ControlLoopConfig) -> Self {
        let mut builder = EngineBuilder::new().with_visible_band(config.visible_band);
        let handles = register_demo(&mut builder, &config.overrides);
        builder.on_emergency("stop visible behaviors", |table: &mut BehaviorTable| {
            let stopped = table.deactivate_all();
            info!(stopped, "visible behaviors stopped");
        });
        let engine = builder.build();

        info!(
            tick_ms = config.tick_period.as_millis() as u64,
            stall_threshold = config.stall_threshold,
            max_speed = config.max_speed,
            "control loop ready"
        );

        Self {
            engine,
            drive: SimDrive::new().with_max_speed(config.max_speed),
            guard: StallGuard::new(config.stall_threshold),
            handles,
            tick_period: config.tick_period,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn drive(&self) -> &SimDrive {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut SimDrive {
        &mut self.drive
    }

    pub fn handles(&self) -> DemoHandles {
        self.handles
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Run the emergency procedures and zero the operator target.
    pub fn emergency(&mut self) -> usize {
        let ran = self.engine.trigger_emergency();
        self.drive.set_target(SPEED_STOP, SPEED_STOP);
        self.guard.reset();
        ran
    }

    /// One sense / arbitrate / move / guard cycle.
    ///
    /// # Errors
    ///
    /// Propagates the first [`BehaviorError`] raised during arbitration.
    pub fn step(&mut self) -> Result<StepReport, BehaviorError> {
        let before = self.drive.frame();
        let cycle = self.engine.tick(&before, &mut self.drive)?;
        self.drive.advance(self.tick_period.as_secs_f32());

        let frame = self.drive.frame();
        let stalled = self.guard.record(cycle.command, &frame);
        if stalled {
            warn!(tick = frame.tick, "stall detected, triggering emergency procedures");
            self.emergency();
        }
        Ok(StepReport {
            cycle,
            frame,
            stalled,
        })
    }

    /// Step `ticks` times without waiting.
    pub fn run(&mut self, ticks: u64) -> Result<RunSummary, BehaviorError> {
        let mut summary = RunSummary::default();
        for _ in 0..ticks {
            summary.absorb(self.step()?);
        }
        Ok(summary)
    }

    /// Step once per tick period until `shutdown` is set.
    pub async fn run_until(
        &mut self,
        shutdown: Arc<AtomicBool>,
    ) -> Result<RunSummary, BehaviorError> {
        // A zero period would make `interval` panic.
        let period = self.tick_period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = RunSummary::default();

        loop {
            interval.tick().await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match self.step() {
                Ok(report) => summary.absorb(report),
                Err(e) => {
                    error!(error = %e, "control loop stopped");
                    return Err(e);
                }
            }
        }
        info!(ticks = summary.ticks, stalls = summary.stalls, "control loop shut down");
        Ok(summary)
    }
}

impl std::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("engine", &self.engine)
            .field("drive", &self.drive)
            .field("tick_period", &self.tick_period)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use behave_types::{SPEED_NORMAL, SubResult};

    fn demo() -> ControlLoop {
        ControlLoop::new(ControlLoopConfig::default())
    }

    #[test]
    fn idle_loop_keeps_wheels_stopped() {
        let mut control = ControlLoop::new(ControlLoopConfig::default());
        let summary = control.run(10).unwrap();
        assert_eq!(summary.ticks, 10);
        assert_eq!(control.drive().wheel_speeds(), (0, 0));
        assert_eq!(control.drive().frame().tick, 10);
    }

    #[test]
    fn base_drive_follows_target() {
        let mut control = ControlLoop::new(ControlLoopConfig::default());
        control.drive_mut().set_target(SPEED_NORMAL, SPEED_NORMAL);
        let report = control.step().unwrap();
        assert_eq!(report.cycle.winner, Some(control.handles().base));
        assert_eq!(control.drive().wheel_speeds(), (SPEED_NORMAL, SPEED_NORMAL));
    }

    #[test]
    fn stall_triggers_emergency() {
        let mut control = ControlLoop::new(ControlLoopConfig {
            stall_threshold: 5,
            ..ControlLoopConfig::default()
        });
        let patrol = control.handles().patrol;
        control.engine_mut().activate(patrol).unwrap();
        control.drive_mut().set_target(SPEED_NORMAL, SPEED_NORMAL);
        control.drive_mut().set_blocked(true);

        let summary = control.run(20).unwrap();
        // The target is cleared on the first stall, so the guard stays quiet after.
        assert_eq!(summary.stalls, 1);
        assert!(!control.engine().is_active(patrol).unwrap());
        assert_eq!(control.drive().frame().target_left, SPEED_STOP);
        // Reflexes and base survive.
        assert!(control.engine().is_active(control.handles().base).unwrap());
        assert!(control.engine().is_active(control.handles().avoid_collision).unwrap());
    }

    #[test]
    fn overrides_reach_the_engine() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "patrol".to_string(),
            BehaviorOverride {
                priority: None,
                active: Some(true),
            },
        );
        let control = ControlLoop::new(ControlLoopConfig {
            overrides,
            ..ControlLoopConfig::default()
        });
        assert!(control.engine().is_active(control.handles().patrol).unwrap());
    }

    #[test]
    fn reflex_factor_scales_base_drive() {
        let mut control = demo();
        control.drive_mut().set_target(200, 200);
        control.drive_mut().set_distances(150, 999);

        let report = control.step().unwrap();
        assert_eq!(report.cycle.winner, Some(control.handles().base));
        // Obstacle on the left: right wheel braked to 0.6.
        assert_eq!(control.drive().wheel_speeds(), (200, 120));
        assert_eq!(report.cycle.invoked, 3);
    }

    #[test]
    fn border_reflex_overrides_everything_below() {
        let mut control = demo();
        control.drive_mut().set_target(200, 200);
        control.drive_mut().set_border(800, 0);

        let report = control.step().unwrap();
        assert_eq!(report.cycle.winner, Some(control.handles().avoid_border));
        assert_eq!(report.cycle.invoked, 1);
        // Right side had no opinion, which stops that wheel.
        assert_eq!(control.drive().wheel_speeds(), (-SPEED_NORMAL, 0));
    }

    #[test]
    fn no_target_means_standing_still() {
        let mut control = demo();
        let summary = control.run(5).unwrap();
        assert_eq!(summary.stalls, 0);
        assert_eq!(control.drive().frame().encoder_left, 0);
        assert_eq!(control.drive().wheel_speeds(), (0, 0));
    }

    #[test]
    fn patrol_alternates_drive_and_pause() {
        let mut control = demo();
        let h = control.handles();
        control.engine_mut().activate(h.patrol).unwrap();

        control.step().unwrap();
        assert!(control.engine().is_active(h.drive_for).unwrap());
        assert!(!control.engine().is_active(h.patrol).unwrap());

        // Drive leg: 100 cycles plus the return.
        control.run(101).unwrap();
        assert!(!control.engine().is_active(h.drive_for).unwrap());
        assert!(control.drive().frame().encoder_left > 0);

        control.step().unwrap();
        assert!(control.engine().is_active(h.delay).unwrap());
        assert_eq!(
            control.engine().table().record(h.delay).unwrap().caller(),
            Some(h.patrol)
        );
    }

    #[test]
    fn reset_stops_the_patrol_chain_only() {
        let mut control = demo();
        let h = control.handles();
        control.engine_mut().activate(h.patrol).unwrap();
        control.run(10).unwrap();

        let stopped = control.engine_mut().deactivate_all();
        assert_eq!(stopped, 1, "only the running drive leg was active");
        for id in [h.patrol, h.drive_for, h.delay] {
            let record = control.engine().table().record(id).unwrap();
            assert!(!record.is_active());
            assert_eq!(record.caller(), None);
        }
        for id in [h.avoid_border, h.avoid_collision, h.base] {
            assert!(control.engine().is_active(id).unwrap());
        }
    }

    #[test]
    fn cancelling_the_patrol_tears_down_its_leg() {
        let mut control = demo();
        let h = control.handles();
        control.engine_mut().activate(h.patrol).unwrap();
        control.run(10).unwrap();

        let cancelled = control.engine_mut().cancel_chain(h.patrol).unwrap();
        assert_eq!(cancelled, 1);
        let patrol = control.engine().table().record(h.patrol).unwrap();
        assert!(patrol.is_active());
        assert_eq!(patrol.result(), SubResult::Cancel);
        assert!(!control.engine().is_active(h.drive_for).unwrap());

        // The patrol sees the cancellation and stops itself.
        control.step().unwrap();
        assert!(!control.engine().is_active(h.patrol).unwrap());
    }

    #[test]
    fn operator_cannot_toggle_reflexes() {
        let mut control = demo();
        let h = control.handles();
        assert_eq!(
            control.engine_mut().toggle(h.avoid_border),
            Err(BehaviorError::NotVisible(h.avoid_border))
        );
        assert_eq!(control.engine_mut().toggle(h.patrol), Ok(true));
    }

    #[test]
    fn snapshot_lists_every_behavior_in_order() {
        let control = demo();
        let rows = control.engine().snapshot();
        let priorities: Vec<_> = rows.iter().map(|r| r.priority).collect();
        assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(rows.len(), 6);
        let visible: Vec<_> = rows
            .iter()
            .filter(|r| r.visible)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(visible, vec!["drive_for", "delay", "patrol"]);
    }

    #[tokio::test]
    async fn run_until_returns_when_shutdown_is_already_set() {
        let mut control = ControlLoop::new(ControlLoopConfig::default());
        let shutdown = Arc::new(AtomicBool::new(true));
        let summary = control.run_until(shutdown).await.unwrap();
        assert_eq!(summary.ticks, 0);
    }

    #[tokio::test]
    async fn run_until_steps_until_shutdown() {
        let mut control = ControlLoop::new(ControlLoopConfig {
            tick_period: Duration::from_millis(1),
            ..ControlLoopConfig::default()
        });
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let summary = control.run_until(shutdown).await.unwrap();
        assert!(summary.ticks > 0);
        assert_eq!(control.drive().frame().tick, summary.ticks);
    }
}
