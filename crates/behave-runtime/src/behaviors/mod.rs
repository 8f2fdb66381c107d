//! Demonstration behaviors for the simulated two-wheel base.
//!
//! Priorities follow the usual layering: safety reflexes sit above the
//! operator-visible band, application behaviors inside it, and the base drive
//! below it.
//!
//! | Behavior            | Priority | Starts active | Kind    |
//! |---------------------|----------|---------------|---------|
//! | [`AvoidBorder`]     | 250      | yes           | reflex  |
//! | [`AvoidCollision`]  | 249      | yes           | reflex  |
//! | [`DriveFor`]        | 150      | no            | callee  |
//! | [`Delay`]           | 149      | no            | callee  |
//! | [`Patrol`]          | 60       | no            | caller  |
//! | [`BaseDrive`]       | 2        | yes           | base    |

use std::collections::HashMap;

use behave_kernel::{Behavior, EngineBuilder};
use behave_types::{BehaviorId, Priority};
use serde::{Deserialize, Serialize};
use tracing::debug;

mod avoid_border;
mod avoid_collision;
mod base;
mod delay;
mod drive_for;
mod patrol;

pub use avoid_border::AvoidBorder;
pub use avoid_collision::{AvoidCollision, Zone};
pub use base::BaseDrive;
pub use delay::Delay;
pub use drive_for::DriveFor;
pub use patrol::Patrol;

pub const PRIO_AVOID_BORDER: Priority = 250;
pub const PRIO_AVOID_COLLISION: Priority = 249;
pub const PRIO_DRIVE_FOR: Priority = 150;
pub const PRIO_DELAY: Priority = 149;
pub const PRIO_PATROL: Priority = 60;
pub const PRIO_BASE: Priority = 2;

/// Per-behavior start-up override, keyed by behavior name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorOverride {
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Handles of the registered demo behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoHandles {
    pub avoid_border: BehaviorId,
    pub avoid_collision: BehaviorId,
    pub drive_for: BehaviorId,
    pub delay: BehaviorId,
    pub patrol: BehaviorId,
    pub base: BehaviorId,
}

/// Register the full demo set on `builder`, applying `overrides` by name.
pub fn register_demo(
    builder: &mut EngineBuilder,
    overrides: &HashMap<String, BehaviorOverride>,
) -> DemoHandles {
    let mut add = |behavior: Box<dyn Behavior>, priority: Priority, active: bool| {
        let custom = overrides.get(behavior.name()).copied().unwrap_or_default();
        if custom != BehaviorOverride::default() {
            debug!(behavior = behavior.name(), ?custom, "applying override");
        }
        builder.register_boxed(
            custom.priority.unwrap_or(priority),
            behavior,
            custom.active.unwrap_or(active),
        )
    };

    let avoid_border = add(Box::new(AvoidBorder::new()), PRIO_AVOID_BORDER, true);
    let avoid_collision = add(Box::new(AvoidCollision::new()), PRIO_AVOID_COLLISION, true);
    let drive_for = add(Box::new(DriveFor::new()), PRIO_DRIVE_FOR, false);
    let delay = add(Box::new(Delay::new()), PRIO_DELAY, false);
    let patrol = add(Box::new(Patrol::new(drive_for, delay)), PRIO_PATROL, false);
    let base = add(Box::new(BaseDrive::new()), PRIO_BASE, true);

    DemoHandles {
        avoid_border,
        avoid_collision,
        drive_for,
        delay,
        patrol,
        base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_set_is_ordered_by_priority() {
        let mut builder = EngineBuilder::new();
        let handles = register_demo(&mut builder, &HashMap::new());
        let engine = builder.build();

        let names: Vec<_> = engine.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["avoid_border", "avoid_collision", "drive_for", "delay", "patrol", "base_drive"]
        );
        assert!(engine.is_active(handles.base).unwrap());
        assert!(!engine.is_active(handles.patrol).unwrap());
    }

    #[test]
    fn overrides_change_priority_and_activation() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "patrol".to_string(),
            BehaviorOverride {
                priority: Some(190),
                active: Some(true),
            },
        );
        let mut builder = EngineBuilder::new();
        let handles = register_demo(&mut builder, &overrides);
        let engine = builder.build();

        let record = engine.table().record(handles.patrol).unwrap();
        assert_eq!(record.priority(), 190);
        assert!(record.is_active());
    }

    #[test]
    fn override_deserializes_partially() {
        let o: BehaviorOverride = serde_json::from_str(r#"{"active": false}"#).unwrap();
        assert_eq!(o.active, Some(false));
        assert_eq!(o.priority, None);
    }
}
