//! State capture, reset and mutation
//!
//! The initial state of every readable variable is captured exactly once
//! when the parser is built. `reset_all` writes those captures back
//! before each run, making run cycles repeatable; variables that were
//! unreadable at capture time are skipped. Writes always replace whole
//! values; element-level edits are composed by the caller (read, modify,
//! write back).

use crate::error::Result;
use crate::model::SystemNode;
use crate::parser::resolver;
use crate::parser::tree::SystemCatalog;
use crate::types::{VarValue, VariableSnapshot};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Snapshots keyed by full variable path
pub type SnapshotMap = BTreeMap<String, VariableSnapshot>;

/// Deep-copy every readable variable reachable from the catalog
pub fn capture_initial_state(catalog: &SystemCatalog, root: &dyn SystemNode) -> SnapshotMap {
    let mut snapshots = SnapshotMap::new();
    for path in catalog.variable_paths() {
        let value = match resolver::read_variable(root, &path) {
            Ok(value) => value,
            Err(e) => {
                warn!("Initial capture failed for '{path}': {e}");
                None
            }
        };
        let size = value.as_ref().map(VarValue::size).unwrap_or(1);
        snapshots.insert(
            path.clone(),
            VariableSnapshot { path, size, value },
        );
    }
    debug!("Captured {} variable snapshots", snapshots.len());
    snapshots
}

/// Write every captured value back to the model
///
/// `None` captures are skipped; a failing write degrades that one
/// variable with a warning. Running this twice in a row is a no-op the
/// second time.
pub fn reset_all(snapshots: &SnapshotMap, root: &mut dyn SystemNode) {
    for snapshot in snapshots.values() {
        let Some(value) = &snapshot.value else {
            continue;
        };
        if let Err(e) = resolver::write_variable(root, &snapshot.path, value.clone()) {
            warn!("Reset failed for '{}': {e}", snapshot.path);
        }
    }
}

/// Replace one variable's value wholesale
pub fn set_variable(
    root: &mut dyn SystemNode,
    node_path: &str,
    port: &str,
    variable: &str,
    value: VarValue,
) -> Result<()> {
    let node = resolver::resolve_mut(root, node_path)?;
    node.write(port, variable, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory::{LocalPort, LocalSystem};

    fn sample() -> LocalSystem {
        LocalSystem::new("root")
            .with_inward("gravity", VarValue::Number(9.81))
            .with_child(LocalSystem::new("tank").with_port(
                LocalPort::input("flow").with_variable("levels", VarValue::Array(vec![1.0, 2.0])),
            ))
    }

    fn capture(sys: &LocalSystem) -> SnapshotMap {
        let (catalog, _) = SystemCatalog::discover(sys);
        capture_initial_state(&catalog, sys)
    }

    #[test]
    fn test_capture_sizes() {
        let sys = sample();
        let snapshots = capture(&sys);
        assert_eq!(snapshots["root.inwards.gravity"].size, 1);
        assert_eq!(snapshots["root.tank.flow.levels"].size, 2);
    }

    #[test]
    fn test_reset_restores_mutations() {
        let mut sys = sample();
        let snapshots = capture(&sys);
        set_variable(&mut sys, "root", "inwards", "gravity", VarValue::Number(1.0)).unwrap();
        set_variable(
            &mut sys,
            "root.tank",
            "flow",
            "levels",
            VarValue::Array(vec![9.0, 9.0]),
        )
        .unwrap();

        reset_all(&snapshots, &mut sys);
        assert_eq!(
            resolver::read_variable(&sys, "root.inwards.gravity").unwrap(),
            Some(VarValue::Number(9.81))
        );
        assert_eq!(
            resolver::read_variable(&sys, "root.tank.flow.levels").unwrap(),
            Some(VarValue::Array(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut sys = sample();
        let snapshots = capture(&sys);
        reset_all(&snapshots, &mut sys);
        let first = capture(&sys);
        reset_all(&snapshots, &mut sys);
        let second = capture(&sys);
        for (path, snapshot) in &first {
            assert_eq!(snapshot.value, second[path].value, "drift at {path}");
        }
    }

    #[test]
    fn test_set_variable_bad_path() {
        let mut sys = sample();
        let err = set_variable(&mut sys, "root.missing", "flow", "x", VarValue::Number(0.0));
        assert!(err.is_err());
    }
}
