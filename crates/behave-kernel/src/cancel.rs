//! Tearing down a delegation chain from its root.
//!
//! [`BehaviorTable::cancel_chain`] stops every behavior that is (transitively)
//! running on behalf of `root`, without stopping `root` itself.  The root is
//! woken up with `result = Cancel` so its state machine can tell a torn-down
//! delegation apart from a normal return.

use behave_types::{BehaviorError, BehaviorId, SubResult};
use tracing::{debug, instrument};

use crate::registry::BehaviorTable;

impl BehaviorTable {
    /// Number of `caller` hops from `job` up to `root`, or 0 if `root` is not
    /// in `job`'s caller chain.
    ///
    /// The walk is bounded by the table size, so a corrupted chain cannot hang
    /// the caller.
    pub fn call_depth(&self, job: Option<BehaviorId>, root: BehaviorId) -> usize {
        let mut current = job.and_then(|id| self.record(id).ok()).and_then(|r| r.caller);
        let mut depth = 1;
        while let Some(id) = current {
            if id == root {
                return depth;
            }
            if depth >= self.len() {
                break;
            }
            depth += 1;
            current = self.record(id).ok().and_then(|r| r.caller);
        }
        0
    }

    /// Deactivate every transitive delegate of `root` and clear their
    /// callers, then wake `root` with `Cancel`.
    ///
    /// Returns how many records were deactivated.
    ///
    /// # Errors
    ///
    /// Returns [`BehaviorError::UnknownBehavior`] if `root` is foreign.
    #[instrument(skip_all, fields(root = %root))]
    pub fn cancel_chain(&mut self, root: BehaviorId) -> Result<usize, BehaviorError> {
        self.record(root)?;

        // Depths are taken before any unwinding: clearing a shared caller
        // would otherwise hide its sibling delegates from the walk.
        let mut chains = Vec::new();
        for position in 0..self.len() {
            let job = self.id_at(position);
            if !self.record(job)?.active {
                continue;
            }
            let depth = self.call_depth(Some(job), root);
            if depth > 0 {
                chains.push((job, depth));
            }
        }

        let mut cancelled = 0;
        for (job, depth) in chains {
            let mut current = Some(job);
            for _ in 0..depth {
                let Some(id) = current else { break };
                let record = self.record_mut(id)?;
                if record.active {
                    cancelled += 1;
                }
                record.active = false;
                current = record.caller.take();
                debug!(behavior = %record.name, "cancelled");
            }
        }

        let root_record = self.record_mut(root)?;
        root_record.active = true;
        root_record.result = SubResult::Cancel;
        debug!(behavior = %root_record.name, cancelled, "chain cancelled");
        Ok(cancelled)
    }
}
