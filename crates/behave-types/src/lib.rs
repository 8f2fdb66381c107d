use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signed wheel speed in mm/s.
pub type Speed = i16;

/// Behavior priority: higher values are arbitrated first.
pub type Priority = u8;

pub const SPEED_STOP: Speed = 0;
pub const SPEED_SLOW: Speed = 50;
pub const SPEED_FOLLOW: Speed = 70;
pub const SPEED_MEDIUM: Speed = 100;
pub const SPEED_NORMAL: Speed = 150;
pub const SPEED_FAST: Speed = 300;
pub const SPEED_MAX: Speed = 450;

/// Stable handle issued by the registry when a behavior is registered.
///
/// The handle doubles as the behavior's identity: every lookup in the
/// control-transfer API is by `BehaviorId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BehaviorId(usize);

impl BehaviorId {
    /// Wrap a raw arena index.  Only registries should mint ids.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Raw arena index of this handle.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome a delegating behavior reads back from its own record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubResult {
    /// The delegate finished normally.
    #[default]
    Success,
    /// The delegation was refused, or the delegate was taken over by someone else.
    Fail,
    /// A delegation is outstanding.
    Running,
    /// The delegation chain was torn down from outside.
    Cancel,
}

/// How a delegation treats a target that is already busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegateMode {
    /// Pre-empt the target's current caller, which is woken up with `Fail`.
    Override,
    /// Refuse the delegation if the target is busy.
    NoOverride,
}

/// Inclusive priority range holding the operator-visible behaviors.
///
/// Records outside the band (safety reflexes above it, base motion below it)
/// survive a bulk reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBand {
    pub min: Priority,
    pub max: Priority,
}

impl PriorityBand {
    pub const fn new(min: Priority, max: Priority) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, priority: Priority) -> bool {
        (self.min..=self.max).contains(&priority)
    }
}

impl Default for PriorityBand {
    fn default() -> Self {
        Self::new(3, 200)
    }
}

/// One actuator command, emitted at most once per control cycle.
///
/// `None` on a side means "no opinion": the motor path holds or stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: Option<Speed>,
    pub right: Option<Speed>,
}

impl MotorCommand {
    /// The no-opinion pair emitted when no behavior claimed the motors.
    pub const IGNORE: MotorCommand = MotorCommand {
        left: None,
        right: None,
    };

    pub fn new(left: Speed, right: Speed) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    pub fn is_ignore(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Read-only sensor snapshot handed to every behavior during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Control cycle counter.
    pub tick: u64,
    /// Front distance sensors, mm.
    pub dist_left_mm: i16,
    pub dist_right_mm: i16,
    /// Floor reflectivity; high readings mean an edge.
    pub border_left: i16,
    pub border_right: i16,
    /// Accumulated wheel encoder ticks.
    pub encoder_left: i32,
    pub encoder_right: i32,
    /// Operator-requested base speed (remote control / CLI).
    pub target_left: Speed,
    pub target_right: Speed,
}

/// Display row for one registered behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorStatus {
    pub id: BehaviorId,
    pub name: String,
    pub priority: Priority,
    pub active: bool,
    pub result: SubResult,
    /// Name of the behavior that delegated to this one, if any.
    pub caller: Option<String>,
    /// Whether the record lies in the operator-visible band.
    pub visible: bool,
}

/// Errors raised by the behavior engine and its collaborators.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BehaviorError {
    #[error("Unknown behavior {0}: not registered with this engine")]
    UnknownBehavior(BehaviorId),

    #[error("Delegation cycle: {to} is already in the caller chain of {from}")]
    DelegationCycle { from: BehaviorId, to: BehaviorId },

    #[error("Invalid exit outcome {0:?}: only success or fail may be returned")]
    InvalidOutcome(SubResult),

    #[error("Behavior {0} lies outside the visible priority band")]
    NotVisible(BehaviorId),

    #[error("Actuator fault: {details}")]
    Actuator { details: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
