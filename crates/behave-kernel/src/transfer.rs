//! Control transfer between behaviors.
//!
//! A behavior hands control to another by *delegating*: the requester is
//! suspended with `result = Running`, the target is activated and remembers
//! the requester as its `caller`.  When the target finishes it *exits* with
//! `Success` or `Fail`, which reactivates the caller and writes the outcome
//! into the caller's `result`.
//!
//! Every record has at most one caller.  A target that is already serving a
//! caller is either left alone ([`DelegateMode::NoOverride`]) or taken over
//! ([`DelegateMode::Override`]), in which case the previous caller is woken up
//! with `Fail`.
//!
//! # Example
//!
//! ```rust
//! use behave_kernel::engine::{EngineBuilder, from_fn};
//! use behave_kernel::transfer::Delegation;
//! use behave_types::{DelegateMode, SubResult};
//!
//! # fn main() -> Result<(), behave_types::BehaviorError> {
//! let mut builder = EngineBuilder::new();
//! let patrol = builder.register(60, from_fn("patrol", |_| Ok(())), true);
//! let turn = builder.register(150, from_fn("turn", |_| Ok(())), false);
//! let mut engine = builder.build();
//!
//! assert_eq!(engine.delegate(Some(patrol), turn, DelegateMode::NoOverride)?, Delegation::Started);
//! assert!(!engine.is_active(patrol)?);
//!
//! engine.exit(turn, SubResult::Success)?;
//! assert!(engine.is_active(patrol)?);
//! assert_eq!(engine.table().record(patrol)?.result(), SubResult::Success);
//! # Ok(())
//! # }
//! ```

use behave_types::{BehaviorError, BehaviorId, DelegateMode, SubResult};
use tracing::{debug, error, warn};

use crate::registry::BehaviorTable;

/// What a call to [`BehaviorTable::delegate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delegation {
    /// The target was free and now runs on behalf of the requester.
    Started,
    /// The target was busy and has been taken over; `previous` got `Fail`.
    Preempted { previous: BehaviorId },
    /// The target was busy and the requester asked not to override.
    Refused,
}

impl BehaviorTable {
    /// Hand control from `from` (or from outside the engine when `None`) to
    /// `to`.
    ///
    /// # Errors
    ///
    /// - [`BehaviorError::UnknownBehavior`] if either id is foreign.
    /// - [`BehaviorError::DelegationCycle`] if `to` is `from` itself or sits
    ///   anywhere in `from`'s caller chain.  Nothing is changed in that case.
    pub fn delegate(
        &mut self,
        from: Option<BehaviorId>,
        to: BehaviorId,
        mode: DelegateMode,
    ) -> Result<Delegation, BehaviorError> {
        let previous = self.record(to)?.caller;
        if let Some(from) = from {
            self.record(from)?;
            if from == to || self.call_depth(Some(from), to) > 0 {
                error!(from = %from, to = %to, "delegation would close a caller cycle");
                return Err(BehaviorError::DelegationCycle { from, to });
            }
        }

        let outcome = match (previous, mode) {
            (Some(_), DelegateMode::NoOverride) => {
                if let Some(from) = from {
                    self.record_mut(from)?.result = SubResult::Fail;
                }
                warn!(
                    behavior = %self.record(to)?.name,
                    "delegation refused, target busy"
                );
                return Ok(Delegation::Refused);
            }
            (Some(previous), DelegateMode::Override) => {
                let old = self.record_mut(previous)?;
                old.active = true;
                old.result = SubResult::Fail;
                debug!(behavior = %old.name, "caller pre-empted");
                Delegation::Preempted { previous }
            }
            (None, _) => Delegation::Started,
        };

        if let Some(from) = from {
            let requester = self.record_mut(from)?;
            requester.active = false;
            requester.result = SubResult::Running;
        }

        let target = self.record_mut(to)?;
        target.active = true;
        target.caller = from;
        target.entered = true;
        debug!(behavior = %target.name, caller = ?from, "delegated");
        Ok(outcome)
    }

    /// Finish `id` and report `outcome` to its caller, if it has one.
    ///
    /// # Errors
    ///
    /// - [`BehaviorError::InvalidOutcome`] unless `outcome` is `Success` or
    ///   `Fail`.
    /// - [`BehaviorError::UnknownBehavior`] if `id` is foreign.
    pub fn exit(&mut self, id: BehaviorId, outcome: SubResult) -> Result<(), BehaviorError> {
        if !matches!(outcome, SubResult::Success | SubResult::Fail) {
            return Err(BehaviorError::InvalidOutcome(outcome));
        }

        let record = self.record_mut(id)?;
        record.active = false;
        let caller = record.caller.take();
        debug!(behavior = %record.name, ?outcome, "exited");

        if let Some(caller) = caller {
            let parent = self.record_mut(caller)?;
            parent.active = true;
            parent.result = outcome;
        }
        Ok(())
    }

    /// [`exit`](Self::exit) with `Success`.
    pub fn return_from(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        self.exit(id, SubResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use behave_types::PriorityBand;

    fn table() -> (BehaviorTable, BehaviorId, BehaviorId, BehaviorId) {
        let mut table = BehaviorTable::new(PriorityBand::default());
        let a = table.register("a", 60, true);
        let b = table.register("b", 61, true);
        let t = table.register("target", 150, false);
        (table, a, b, t)
    }

    #[test]
    fn delegate_suspends_requester() {
        let (mut table, a, _, t) = table();
        let outcome = table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();
        assert_eq!(outcome, Delegation::Started);

        let requester = table.record(a).unwrap();
        assert!(!requester.is_active());
        assert_eq!(requester.result(), SubResult::Running);

        let target = table.record(t).unwrap();
        assert!(target.is_active());
        assert_eq!(target.caller(), Some(a));
    }

    #[test]
    fn no_override_refusal_leaves_target_untouched() {
        let (mut table, a, b, t) = table();
        table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();
        let before = table.record(t).unwrap().clone();

        let outcome = table.delegate(Some(b), t, DelegateMode::NoOverride).unwrap();
        assert_eq!(outcome, Delegation::Refused);
        assert_eq!(table.record(t).unwrap(), &before);

        let requester = table.record(b).unwrap();
        assert_eq!(requester.result(), SubResult::Fail);
        // Refusal does not suspend the requester.
        assert!(requester.is_active());
    }

    #[test]
    fn override_preempts_previous_caller() {
        let (mut table, a, b, t) = table();
        table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();

        let outcome = table.delegate(Some(b), t, DelegateMode::Override).unwrap();
        assert_eq!(outcome, Delegation::Preempted { previous: a });

        let old = table.record(a).unwrap();
        assert!(old.is_active());
        assert_eq!(old.result(), SubResult::Fail);
        assert_eq!(table.record(t).unwrap().caller(), Some(b));
        assert_eq!(table.record(b).unwrap().result(), SubResult::Running);
    }

    #[test]
    fn exit_reports_outcome_and_clears_caller() {
        let (mut table, a, _, t) = table();
        table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();
        table.exit(t, SubResult::Fail).unwrap();

        let target = table.record(t).unwrap();
        assert!(!target.is_active());
        assert_eq!(target.caller(), None);

        let caller = table.record(a).unwrap();
        assert!(caller.is_active());
        assert_eq!(caller.result(), SubResult::Fail);
    }

    #[test]
    fn return_from_reports_success() {
        let (mut table, a, _, t) = table();
        table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();
        table.return_from(t).unwrap();
        assert_eq!(table.record(a).unwrap().result(), SubResult::Success);
    }

    #[test]
    fn exit_without_caller_only_deactivates() {
        let (mut table, a, _, _) = table();
        table.exit(a, SubResult::Success).unwrap();
        assert!(!table.record(a).unwrap().is_active());
    }

    #[test]
    fn exit_rejects_running_and_cancel() {
        let (mut table, a, _, _) = table();
        assert_eq!(
            table.exit(a, SubResult::Running),
            Err(BehaviorError::InvalidOutcome(SubResult::Running))
        );
        assert_eq!(
            table.exit(a, SubResult::Cancel),
            Err(BehaviorError::InvalidOutcome(SubResult::Cancel))
        );
        assert!(table.record(a).unwrap().is_active());
    }

    #[test]
    fn delegation_without_requester() {
        let (mut table, _, _, t) = table();
        table.delegate(None, t, DelegateMode::NoOverride).unwrap();
        let target = table.record(t).unwrap();
        assert!(target.is_active());
        assert_eq!(target.caller(), None);
    }

    #[test]
    fn delegating_to_self_is_a_cycle() {
        let (mut table, a, _, _) = table();
        let err = table.delegate(Some(a), a, DelegateMode::Override).unwrap_err();
        assert_eq!(err, BehaviorError::DelegationCycle { from: a, to: a });
        assert!(table.record(a).unwrap().is_active());
    }

    #[test]
    fn delegating_back_up_the_chain_is_refused() {
        let (mut table, a, _, t) = table();
        let leaf = table.register("leaf", 40, false);
        table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();
        table.delegate(Some(t), leaf, DelegateMode::NoOverride).unwrap();
        let before = table.snapshot();

        let err = table.delegate(Some(leaf), a, DelegateMode::Override).unwrap_err();
        assert_eq!(err, BehaviorError::DelegationCycle { from: leaf, to: a });
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let (mut table, a, _, _) = table();
        let ghost = BehaviorId::from_index(99);
        assert_eq!(
            table.delegate(Some(a), ghost, DelegateMode::Override),
            Err(BehaviorError::UnknownBehavior(ghost))
        );
        assert_eq!(
            table.delegate(Some(ghost), a, DelegateMode::Override),
            Err(BehaviorError::UnknownBehavior(ghost))
        );
    }

    #[test]
    fn each_record_has_at_most_one_caller() {
        let (mut table, a, b, t) = table();
        table.delegate(Some(a), t, DelegateMode::NoOverride).unwrap();
        table.delegate(Some(b), t, DelegateMode::Override).unwrap();
        let callers: Vec<_> = table
            .iter()
            .filter_map(|(_, r)| r.caller())
            .filter(|c| *c == a || *c == b)
            .collect();
        assert_eq!(callers, vec![b]);
    }
}
