//! [`EmergencyProcedures`] – handlers run when something outside the
//! arbitration loop decides the robot must stop what it is doing.
//!
//! Procedures are registered on the
//! [`EngineBuilder`][crate::engine::EngineBuilder] and run in registration
//! order by [`Engine::trigger_emergency`][crate::engine::Engine::trigger_emergency].
//! Each one gets mutable access to the behavior table, so it can cancel
//! chains or switch behaviors on and off.

use tracing::info;

use crate::registry::BehaviorTable;

type Procedure = Box<dyn FnMut(&mut BehaviorTable) + Send>;

/// Ordered list of named emergency handlers.
#[derive(Default)]
pub struct EmergencyProcedures {
    procedures: Vec<(String, Procedure)>,
}

impl EmergencyProcedures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.  Handlers run in the order they were added.
    pub fn register<F>(&mut self, name: impl Into<String>, procedure: F)
    where
        F: FnMut(&mut BehaviorTable) + Send + 'static,
    {
        self.procedures.push((name.into(), Box::new(procedure)));
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Run every handler against `table`; returns how many ran.
    pub fn run(&mut self, table: &mut BehaviorTable) -> usize {
        for (name, procedure) in &mut self.procedures {
            info!(procedure = %name, "running emergency procedure");
            procedure(table);
        }
        self.procedures.len()
    }
}

impl std::fmt::Debug for EmergencyProcedures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.procedures.iter().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use behave_types::PriorityBand;

    use super::*;

    #[test]
    fn procedures_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut procs = EmergencyProcedures::new();
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            procs.register(name, move |_| log.lock().unwrap().push(name));
        }

        let mut table = BehaviorTable::new(PriorityBand::default());
        assert_eq!(procs.run(&mut table), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn procedures_can_change_the_table() {
        let mut table = BehaviorTable::new(PriorityBand::default());
        let app = table.register("app", 60, true);

        let mut procs = EmergencyProcedures::new();
        procs.register("stop apps", |table: &mut BehaviorTable| {
            table.deactivate_all();
        });
        procs.run(&mut table);
        assert!(!table.is_active(app).unwrap());
    }

    #[test]
    fn empty_list_runs_nothing() {
        let mut table = BehaviorTable::new(PriorityBand::default());
        let mut procs = EmergencyProcedures::new();
        assert!(procs.is_empty());
        assert_eq!(procs.run(&mut table), 0);
        assert_eq!(format!("{procs:?}"), "[]");
    }
}
