//! [`Engine`] – the per-cycle arbitration loop.
//!
//! Each call to [`Engine::tick`] walks the behavior table from the highest
//! priority down.  Every active behavior gets a fresh [`WishChannel`] and runs
//! once.  Factor wishes accumulate; the first absolute speed wish is scaled by
//! the factors collected so far, emitted, and ends the cycle.  Lower-priority
//! behaviors do not run in that cycle.  If nobody asks for a speed, the "no
//! opinion" command is emitted instead.
//!
//! # Example
//!
//! ```rust
//! use behave_hal::RecordingSink;
//! use behave_kernel::engine::{EngineBuilder, from_fn};
//! use behave_types::{MotorCommand, SensorFrame};
//!
//! # fn main() -> Result<(), behave_types::BehaviorError> {
//! let mut builder = EngineBuilder::new();
//! builder.register(
//!     150,
//!     from_fn("slow_left", |ctx| {
//!         ctx.set_factor_left(0.5);
//!         Ok(())
//!     }),
//!     true,
//! );
//! builder.register(
//!     2,
//!     from_fn("cruise", |ctx| {
//!         ctx.set_speed(200, 200);
//!         Ok(())
//!     }),
//!     true,
//! );
//! let mut engine = builder.build();
//!
//! let mut sink = RecordingSink::new();
//! let report = engine.tick(&SensorFrame::default(), &mut sink)?;
//! assert_eq!(report.command, MotorCommand::new(100, 200));
//! assert_eq!(sink.commands().len(), 1);
//! # Ok(())
//! # }
//! ```

use behave_hal::MotorSink;
use behave_types::{
    BehaviorError, BehaviorId, BehaviorStatus, DelegateMode, MotorCommand, Priority, PriorityBand,
    SensorFrame, Speed, SubResult,
};
use tracing::{debug, error, info, instrument, warn};

use crate::emergency::EmergencyProcedures;
use crate::registry::BehaviorTable;
use crate::transfer::Delegation;
use crate::wish::{FactorAccumulator, WishChannel};

// ────────────────────────────────────────────────────────────────────────────
// Behavior trait
// ────────────────────────────────────────────────────────────────────────────

/// Per-cycle control logic registered with the engine.
///
/// A behavior must never block: it looks at the sensors, writes its wishes,
/// possibly hands control elsewhere, and returns.  State that spans cycles
/// lives in the implementing struct.
pub trait Behavior: Send {
    fn name(&self) -> &str;

    /// Called before the first `update` after the behavior was (re)started by
    /// activation or delegation.  Reset state machines here.
    fn on_enter(&mut self) {}

    /// Run one step.
    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError>;
}

/// A [`Behavior`] backed by a closure.  Built with [`from_fn`].
pub struct FnBehavior<F> {
    name: String,
    step: F,
}

/// Wrap a closure as a stateless [`Behavior`].
pub fn from_fn<F>(name: impl Into<String>, step: F) -> FnBehavior<F>
where
    F: FnMut(&mut BehaviorContext<'_>) -> Result<(), BehaviorError> + Send,
{
    FnBehavior {
        name: name.into(),
        step,
    }
}

impl<F> Behavior for FnBehavior<F>
where
    F: FnMut(&mut BehaviorContext<'_>) -> Result<(), BehaviorError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        (self.step)(ctx)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BehaviorContext
// ────────────────────────────────────────────────────────────────────────────

/// Everything a behavior may touch while it runs.
pub struct BehaviorContext<'a> {
    id: BehaviorId,
    table: &'a mut BehaviorTable,
    wish: &'a mut WishChannel,
    sensors: &'a SensorFrame,
}

impl<'a> BehaviorContext<'a> {
    /// The running behavior's own handle.
    pub fn id(&self) -> BehaviorId {
        self.id
    }

    pub fn sensors(&self) -> &SensorFrame {
        self.sensors
    }

    /// Outcome of this behavior's last delegation.
    pub fn result(&self) -> SubResult {
        self.table
            .record(self.id)
            .map(|r| r.result())
            .unwrap_or_default()
    }

    /// Who delegated to this behavior, if anyone.
    pub fn caller(&self) -> Option<BehaviorId> {
        self.table.record(self.id).ok().and_then(|r| r.caller())
    }

    pub fn set_speed(&mut self, left: Speed, right: Speed) {
        self.wish.speed_left = Some(left);
        self.wish.speed_right = Some(right);
    }

    pub fn set_speed_left(&mut self, speed: Speed) {
        self.wish.speed_left = Some(speed);
    }

    pub fn set_speed_right(&mut self, speed: Speed) {
        self.wish.speed_right = Some(speed);
    }

    pub fn set_factor(&mut self, left: f32, right: f32) {
        self.wish.factor_left = left;
        self.wish.factor_right = right;
    }

    pub fn set_factor_left(&mut self, factor: f32) {
        self.wish.factor_left = factor;
    }

    pub fn set_factor_right(&mut self, factor: f32) {
        self.wish.factor_right = factor;
    }

    /// Suspend this behavior and hand control to `to`.
    pub fn delegate(
        &mut self,
        to: BehaviorId,
        mode: DelegateMode,
    ) -> Result<Delegation, BehaviorError> {
        self.table.delegate(Some(self.id), to, mode)
    }

    /// Finish and report `outcome` to the caller.
    pub fn exit(&mut self, outcome: SubResult) -> Result<(), BehaviorError> {
        self.table.exit(self.id, outcome)
    }

    pub fn return_from(&mut self) -> Result<(), BehaviorError> {
        self.table.return_from(self.id)
    }

    pub fn activate(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        self.table.activate(id)
    }

    pub fn deactivate(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        self.table.deactivate(id)
    }

    pub fn is_active(&self, id: BehaviorId) -> Result<bool, BehaviorError> {
        self.table.is_active(id)
    }

    pub fn cancel_chain(&mut self, root: BehaviorId) -> Result<usize, BehaviorError> {
        self.table.cancel_chain(root)
    }

    pub fn deactivate_all(&mut self) -> usize {
        self.table.deactivate_all()
    }

    pub fn find(&self, name: &str) -> Option<BehaviorId> {
        self.table.find(name)
    }

    pub fn visible_band(&self) -> PriorityBand {
        self.table.visible_band()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EngineBuilder
// ────────────────────────────────────────────────────────────────────────────

/// Start-up phase: register behaviors and emergency procedures, then
/// [`build`](Self::build) the engine.
#[derive(Default)]
pub struct EngineBuilder {
    table: BehaviorTable,
    logic: Vec<Box<dyn Behavior>>,
    emergency: EmergencyProcedures,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `band` as the operator-visible priority range.
    pub fn with_visible_band(mut self, band: PriorityBand) -> Self {
        self.table.set_visible_band(band);
        self
    }

    /// Register `behavior` at `priority`; returns its handle.
    pub fn register<B>(&mut self, priority: Priority, behavior: B, active: bool) -> BehaviorId
    where
        B: Behavior + 'static,
    {
        self.register_boxed(priority, Box::new(behavior), active)
    }

    pub fn register_boxed(
        &mut self,
        priority: Priority,
        behavior: Box<dyn Behavior>,
        active: bool,
    ) -> BehaviorId {
        let id = self.table.register(behavior.name(), priority, active);
        self.logic.push(behavior);
        id
    }

    /// Add a procedure run by [`Engine::trigger_emergency`].
    pub fn on_emergency<F>(&mut self, name: impl Into<String>, procedure: F)
    where
        F: FnMut(&mut BehaviorTable) + Send + 'static,
    {
        self.emergency.register(name, procedure);
    }

    pub fn build(self) -> Engine {
        info!(
            behaviors = self.table.len(),
            emergency_procedures = self.emergency.len(),
            "behavior engine ready"
        );
        Engine {
            table: self.table,
            logic: self.logic,
            emergency: self.emergency,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Result of one arbitration cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// The command handed to the sink.
    pub command: MotorCommand,
    /// The behavior whose absolute wish ended the cycle.
    pub winner: Option<BehaviorId>,
    /// How many behaviors ran.
    pub invoked: usize,
}

/// The running arbitration engine.  Owns the behavior table and the logic of
/// every registered behavior.
pub struct Engine {
    table: BehaviorTable,
    logic: Vec<Box<dyn Behavior>>,
    emergency: EmergencyProcedures,
}

impl Engine {
    /// Run one arbitration cycle and emit exactly one command to `sink`.
    ///
    /// # Errors
    ///
    /// A behavior returning an error aborts the cycle: the "no opinion"
    /// command is emitted and the error is returned.  Sink failures are
    /// returned as-is.
    #[instrument(skip_all, fields(tick = sensors.tick))]
    pub fn tick(
        &mut self,
        sensors: &SensorFrame,
        sink: &mut dyn MotorSink,
    ) -> Result<CycleReport, BehaviorError> {
        let mut factors = FactorAccumulator::default();
        let mut wish = WishChannel::default();
        let mut invoked = 0;

        for position in 0..self.table.len() {
            let id = self.table.id_at(position);
            let record = self.table.record_mut(id)?;
            if !record.active {
                continue;
            }
            let entered = std::mem::take(&mut record.entered);

            let logic = self
                .logic
                .get_mut(id.index())
                .ok_or(BehaviorError::UnknownBehavior(id))?;
            if entered {
                debug!(behavior = logic.name(), "entering");
                logic.on_enter();
            }

            wish.reset();
            let mut ctx = BehaviorContext {
                id,
                table: &mut self.table,
                wish: &mut wish,
                sensors,
            };
            invoked += 1;
            if let Err(err) = logic.update(&mut ctx) {
                error!(behavior = logic.name(), error = %err, "behavior failed");
                if let Err(sink_err) = sink.emit(MotorCommand::IGNORE) {
                    warn!(error = %sink_err, "could not release motors");
                }
                return Err(err);
            }

            factors.absorb(&wish);
            if wish.has_speed() {
                let command = factors.scale(&wish);
                sink.emit(command)?;
                return Ok(CycleReport {
                    command,
                    winner: Some(id),
                    invoked,
                });
            }
        }

        sink.emit(MotorCommand::IGNORE)?;
        Ok(CycleReport {
            command: MotorCommand::IGNORE,
            winner: None,
            invoked,
        })
    }

    /// Read-only view of the behavior table.
    pub fn table(&self) -> &BehaviorTable {
        &self.table
    }

    pub fn delegate(
        &mut self,
        from: Option<BehaviorId>,
        to: BehaviorId,
        mode: DelegateMode,
    ) -> Result<Delegation, BehaviorError> {
        self.table.delegate(from, to, mode)
    }

    pub fn exit(&mut self, id: BehaviorId, outcome: SubResult) -> Result<(), BehaviorError> {
        self.table.exit(id, outcome)
    }

    pub fn return_from(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        self.table.return_from(id)
    }

    pub fn activate(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        self.table.activate(id)
    }

    pub fn deactivate(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        self.table.deactivate(id)
    }

    pub fn is_active(&self, id: BehaviorId) -> Result<bool, BehaviorError> {
        self.table.is_active(id)
    }

    pub fn cancel_chain(&mut self, root: BehaviorId) -> Result<usize, BehaviorError> {
        self.table.cancel_chain(root)
    }

    pub fn deactivate_all(&mut self) -> usize {
        self.table.deactivate_all()
    }

    pub fn toggle(&mut self, id: BehaviorId) -> Result<bool, BehaviorError> {
        self.table.toggle(id)
    }

    pub fn find(&self, name: &str) -> Option<BehaviorId> {
        self.table.find(name)
    }

    pub fn snapshot(&self) -> Vec<BehaviorStatus> {
        self.table.snapshot()
    }

    /// Run every registered emergency procedure; returns how many ran.
    pub fn trigger_emergency(&mut self) -> usize {
        warn!("emergency triggered");
        self.emergency.run(&mut self.table)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("table", &self.table)
            .field("emergency", &self.emergency)
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
