//! PlantUML diagram generation

use std::collections::HashSet;

use crate::state::{StateInstance, StateTable};

/// Generate a PlantUML state diagram from a transition log and the owning
/// table. Hierarchy edges come from the parent slots; transitions with a
/// sentinel source render as the initial-state marker.
pub fn generate_plantuml<CTX, E>(
    transition_log: &HashSet<(StateInstance, StateInstance)>,
    current: StateInstance,
    table: &StateTable<CTX, E>,
) -> String {
    let mut plantuml = String::new();
    plantuml.push_str("@startuml\n");
    plantuml.push_str("skinparam state {\n");
    plantuml.push_str("  BackgroundColor<<Current>> YellowGreen\n");
    plantuml.push_str("}\n\n");

    // Add hierarchy relationships first
    let mut has_hierarchy = false;
    for descriptor in table.iter() {
        if let Some(parent) = descriptor.parent() {
            if let Some(parent_name) = table.name(parent) {
                plantuml.push_str(&format!(
                    "{} -up-> {} : parent\n",
                    descriptor.name(),
                    parent_name
                ));
                has_hierarchy = true;
            }
        }
    }
    if has_hierarchy {
        plantuml.push('\n');
    }

    // Add transitions
    for (from, to) in transition_log {
        let Some(to_name) = table.name(*to) else {
            continue;
        };
        match table.name(*from) {
            Some(from_name) => plantuml.push_str(&format!("{from_name} --> {to_name}\n")),
            None => plantuml.push_str(&format!("[*] --> {to_name}\n")),
        }
    }

    // Mark current state
    if let Some(current_name) = table.name(current) {
        plantuml.push_str(&format!("state {current_name} <<Current>>\n"));
    }

    plantuml.push_str("@enduml\n");
    plantuml
}
