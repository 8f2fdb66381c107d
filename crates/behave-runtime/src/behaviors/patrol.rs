use behave_kernel::{Behavior, BehaviorContext, Delegation};
use behave_types::{BehaviorError, BehaviorId, DelegateMode, SubResult};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Drive,
    AwaitDrive,
    Pause,
    AwaitPause,
}

/// Caller that alternates a straight drive leg with a pause, by delegating
/// to a [`DriveFor`](super::DriveFor) and a [`Delay`](super::Delay).
///
/// A failed leg (refused or stalled) is followed by a pause and retried.  A
/// cancelled chain stops the patrol.
#[derive(Debug)]
pub struct Patrol {
    drive: BehaviorId,
    pause: BehaviorId,
    legs: Option<u32>,
    step: Step,
    completed: u32,
    failures: u32,
}

impl Patrol {
    pub fn new(drive: BehaviorId, pause: BehaviorId) -> Self {
        Self {
            drive,
            pause,
            legs: None,
            step: Step::Drive,
            completed: 0,
            failures: 0,
        }
    }

    /// Stop with `Success` after `legs` completed legs.
    pub fn with_legs(mut self, legs: u32) -> Self {
        self.legs = Some(legs);
        self
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn start(
        &mut self,
        ctx: &mut BehaviorContext<'_>,
        to: BehaviorId,
        next: Step,
    ) -> Result<(), BehaviorError> {
        match ctx.delegate(to, DelegateMode::NoOverride)? {
            Delegation::Refused => {
                self.failures += 1;
                debug!(failures = self.failures, "patrol step refused, retrying");
            }
            Delegation::Started | Delegation::Preempted { .. } => self.step = next,
        }
        Ok(())
    }
}

impl Behavior for Patrol {
    fn name(&self) -> &str {
        "patrol"
    }

    fn on_enter(&mut self) {
        self.step = Step::Drive;
        self.completed = 0;
        self.failures = 0;
    }

    fn update(&mut self, ctx: &mut BehaviorContext<'_>) -> Result<(), BehaviorError> {
        match (self.step, ctx.result()) {
            (Step::Drive, _) => self.start(ctx, self.drive, Step::AwaitDrive),
            (Step::Pause, _) => self.start(ctx, self.pause, Step::AwaitPause),

            (Step::AwaitDrive | Step::AwaitPause, SubResult::Cancel) => {
                info!(completed = self.completed, "patrol cancelled");
                self.step = Step::Drive;
                let id = ctx.id();
                ctx.deactivate(id)
            }
            // Woken by someone else while a step is still out.
            (_, SubResult::Running) => Ok(()),

            (Step::AwaitDrive, SubResult::Success) => {
                self.completed += 1;
                if self.legs.is_some_and(|legs| self.completed >= legs) {
                    info!(completed = self.completed, "patrol finished");
                    self.step = Step::Drive;
                    return ctx.return_from();
                }
                self.step = Step::Pause;
                Ok(())
            }
            (Step::AwaitDrive, SubResult::Fail) => {
                self.failures += 1;
                self.step = Step::Pause;
                Ok(())
            }
            (Step::AwaitPause, SubResult::Success | SubResult::Fail) => {
                self.step = Step::Drive;
                Ok(())
            }
        }
    }
}
