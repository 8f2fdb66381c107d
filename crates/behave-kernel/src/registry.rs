//! [`BehaviorTable`] – the priority-ordered behavior registry.
//!
//! Records live in an arena indexed by [`BehaviorId`] and never move; a
//! separate ordering list keeps them sorted by descending priority.  Ties keep
//! registration order, so a record registered later with the same priority is
//! arbitrated after the existing ones.
//!
//! The table is populated once, at start-up, through
//! [`EngineBuilder`][crate::engine::EngineBuilder].  Afterwards only the
//! `active`, `result` and `caller` fields of a record change; see the
//! [`transfer`][crate::transfer], [`cancel`][crate::cancel] and
//! [`activation`][crate::activation] modules for the operations that touch
//! them.

use behave_types::{BehaviorError, BehaviorId, BehaviorStatus, Priority, PriorityBand, SubResult};
use tracing::{debug, warn};

// ────────────────────────────────────────────────────────────────────────────
// BehaviorRecord
// ────────────────────────────────────────────────────────────────────────────

/// Engine-side bookkeeping for one registered behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorRecord {
    pub(crate) name: String,
    pub(crate) priority: Priority,
    pub(crate) active: bool,
    pub(crate) result: SubResult,
    pub(crate) caller: Option<BehaviorId>,
    /// Set when the record is (re)started; cleared by the loop once the
    /// behavior has been told.
    pub(crate) entered: bool,
}

impl BehaviorRecord {
    pub(crate) fn new(name: impl Into<String>, priority: Priority, active: bool) -> Self {
        Self {
            name: name.into(),
            priority,
            active,
            result: SubResult::Success,
            caller: None,
            entered: active,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Outcome of the last delegation this behavior issued.
    pub fn result(&self) -> SubResult {
        self.result
    }

    /// The behavior that delegated to this one, if it is mid-delegation.
    pub fn caller(&self) -> Option<BehaviorId> {
        self.caller
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BehaviorTable
// ────────────────────────────────────────────────────────────────────────────

/// Arena of [`BehaviorRecord`]s plus their arbitration order.
#[derive(Debug, Clone, Default)]
pub struct BehaviorTable {
    records: Vec<BehaviorRecord>,
    order: Vec<BehaviorId>,
    visible: PriorityBand,
}

impl BehaviorTable {
    /// Create an empty table whose operator-visible band is `visible`.
    pub fn new(visible: PriorityBand) -> Self {
        Self {
            records: Vec::new(),
            order: Vec::new(),
            visible,
        }
    }

    /// Allocate a record and insert it in priority order.
    pub(crate) fn register(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
        active: bool,
    ) -> BehaviorId {
        let record = BehaviorRecord::new(name, priority, active);
        if self.find(&record.name).is_some() {
            warn!(
                behavior = %record.name,
                "duplicate behavior name; lookups by name return the first"
            );
        }
        self.insert(record)
    }

    /// Insert `record` after every record whose priority is greater than or
    /// equal to its own.
    pub(crate) fn insert(&mut self, record: BehaviorRecord) -> BehaviorId {
        let id = BehaviorId::from_index(self.records.len());
        let priority = record.priority;
        let position = self
            .order
            .iter()
            .position(|other| self.records[other.index()].priority < priority)
            .unwrap_or(self.order.len());

        debug!(behavior = %record.name, priority, position, "behavior registered");
        self.records.push(record);
        self.order.insert(position, id);
        id
    }

    /// Number of registered behaviors.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Operator-visible priority band this table was built with.
    pub fn visible_band(&self) -> PriorityBand {
        self.visible
    }

    pub(crate) fn set_visible_band(&mut self, band: PriorityBand) {
        self.visible = band;
    }

    /// Look up a record.
    ///
    /// # Errors
    ///
    /// Returns [`BehaviorError::UnknownBehavior`] if `id` was not issued by
    /// this table.
    pub fn record(&self, id: BehaviorId) -> Result<&BehaviorRecord, BehaviorError> {
        self.records
            .get(id.index())
            .ok_or(BehaviorError::UnknownBehavior(id))
    }

    pub(crate) fn record_mut(
        &mut self,
        id: BehaviorId,
    ) -> Result<&mut BehaviorRecord, BehaviorError> {
        self.records
            .get_mut(id.index())
            .ok_or(BehaviorError::UnknownBehavior(id))
    }

    /// Id of the record at arbitration position `position`.
    pub(crate) fn id_at(&self, position: usize) -> BehaviorId {
        self.order[position]
    }

    /// Ids in arbitration order, highest priority first.
    pub fn ids(&self) -> impl Iterator<Item = BehaviorId> + '_ {
        self.order.iter().copied()
    }

    /// Records in arbitration order, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = (BehaviorId, &BehaviorRecord)> + '_ {
        self.order
            .iter()
            .map(move |id| (*id, &self.records[id.index()]))
    }

    /// First behavior registered under `name`.
    pub fn find(&self, name: &str) -> Option<BehaviorId> {
        self.records
            .iter()
            .position(|r| r.name == name)
            .map(BehaviorId::from_index)
    }

    /// Display rows for every record, in arbitration order.
    pub fn snapshot(&self) -> Vec<BehaviorStatus> {
        self.iter()
            .map(|(id, record)| BehaviorStatus {
                id,
                name: record.name.clone(),
                priority: record.priority,
                active: record.active,
                result: record.result,
                caller: record
                    .caller
                    .and_then(|c| self.records.get(c.index()))
                    .map(|c| c.name.clone()),
                visible: self.visible.contains(record.priority),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(table: &BehaviorTable) -> Vec<Priority> {
        table.iter().map(|(_, r)| r.priority).collect()
    }

    #[test]
    fn registration_keeps_descending_order() {
        let mut table = BehaviorTable::default();
        for (i, p) in [2u8, 250, 150, 149, 0, 254, 44].into_iter().enumerate() {
            table.register(format!("b{i}"), p, false);
            let ps = priorities(&table);
            assert!(ps.windows(2).all(|w| w[0] >= w[1]), "unsorted after insert: {ps:?}");
        }
        assert_eq!(priorities(&table), vec![254, 250, 150, 149, 44, 2, 0]);
    }

    #[test]
    fn equal_priorities_keep_registration_order() {
        let mut table = BehaviorTable::default();
        let first = table.register("first", 100, false);
        let high = table.register("high", 200, false);
        let second = table.register("second", 100, false);
        let third = table.register("third", 100, false);

        let order: Vec<BehaviorId> = table.ids().collect();
        assert_eq!(order, vec![high, first, second, third]);
    }

    #[test]
    fn new_record_defaults() {
        let mut table = BehaviorTable::default();
        let idle = table.register("idle", 10, false);
        let running = table.register("running", 10, true);

        let record = table.record(idle).unwrap();
        assert!(!record.is_active());
        assert_eq!(record.result(), SubResult::Success);
        assert_eq!(record.caller(), None);
        assert!(table.record(running).unwrap().is_active());
    }

    #[test]
    fn ids_are_stable_arena_indices() {
        let mut table = BehaviorTable::default();
        let a = table.register("a", 1, false);
        let b = table.register("b", 9, false);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        // b sorts first but keeps its handle.
        assert_eq!(table.id_at(0), b);
        assert_eq!(table.record(b).unwrap().name(), "b");
    }

    #[test]
    fn unknown_id_is_an_error() {
        let table = BehaviorTable::default();
        let ghost = BehaviorId::from_index(3);
        assert_eq!(
            table.record(ghost).unwrap_err(),
            BehaviorError::UnknownBehavior(ghost)
        );
    }

    #[test]
    fn find_by_name() {
        let mut table = BehaviorTable::default();
        let turn = table.register("turn", 150, false);
        assert_eq!(table.find("turn"), Some(turn));
        assert_eq!(table.find("ghost"), None);
    }

    #[test]
    fn snapshot_reports_caller_and_visibility() {
        let mut table = BehaviorTable::new(PriorityBand::new(3, 200));
        let base = table.register("base", 2, true);
        let patrol = table.register("patrol", 60, false);
        table.record_mut(base).unwrap().caller = Some(patrol);

        let rows = table.snapshot();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "patrol");
        assert!(rows[0].visible);
        assert_eq!(rows[1].name, "base");
        assert!(!rows[1].visible);
        assert_eq!(rows[1].caller.as_deref(), Some("patrol"));
    }
}
