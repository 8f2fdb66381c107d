//! Direct activation control: single records and the operator-visible band.

use behave_types::{BehaviorError, BehaviorId};
use tracing::debug;

use crate::registry::BehaviorTable;

impl BehaviorTable {
    /// Switch `id` on.  A record that was off is flagged for entry
    /// notification before its next invocation.
    pub fn activate(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        let record = self.record_mut(id)?;
        if !record.active {
            record.entered = true;
            debug!(behavior = %record.name, "activated");
        }
        record.active = true;
        Ok(())
    }

    /// Switch `id` off and forget its caller.  Calling this on an inactive
    /// record is a no-op.
    pub fn deactivate(&mut self, id: BehaviorId) -> Result<(), BehaviorError> {
        let record = self.record_mut(id)?;
        if record.active || record.caller.is_some() {
            debug!(behavior = %record.name, "deactivated");
        }
        record.active = false;
        record.caller = None;
        Ok(())
    }

    pub fn is_active(&self, id: BehaviorId) -> Result<bool, BehaviorError> {
        Ok(self.record(id)?.active)
    }

    /// Deactivate every record inside the visible band; records above it
    /// (safety reflexes) and below it (base motion) keep running.
    ///
    /// Returns how many records were switched off.
    pub fn deactivate_all(&mut self) -> usize {
        let band = self.visible_band();
        let mut count = 0;
        for position in 0..self.len() {
            let id = self.id_at(position);
            let Ok(record) = self.record_mut(id) else {
                continue;
            };
            if !band.contains(record.priority) {
                continue;
            }
            if record.active {
                count += 1;
            }
            record.active = false;
            record.caller = None;
        }
        debug!(count, min = band.min, max = band.max, "visible behaviors deactivated");
        count
    }

    /// Flip a visible record on or off.
    ///
    /// # Errors
    ///
    /// Returns [`BehaviorError::NotVisible`] for records outside the visible
    /// band, which the operator may not switch.
    pub fn toggle(&mut self, id: BehaviorId) -> Result<bool, BehaviorError> {
        let record = self.record(id)?;
        if !self.visible_band().contains(record.priority) {
            return Err(BehaviorError::NotVisible(id));
        }
        if record.active {
            self.deactivate(id)?;
            Ok(false)
        } else {
            self.activate(id)?;
            Ok(true)
        }
    }
}
