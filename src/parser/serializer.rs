//! State serialization
//!
//! Three wire products, all fault-isolated per entry: a failing variable
//! or recorder degrades that one entry with a warning instead of
//! aborting the snapshot.
//!
//! - variable values as `[typename, value]` pairs keyed by full path
//! - recorder tables, direct recorders only, numeric scalar cells
//!   wrapped in singleton arrays
//! - solver residue traces reduced to per-iteration Euclidean norms

use crate::model::SystemNode;
use crate::parser::drivers::{find_driver, DriverMap, RecorderStatus};
use crate::parser::resolver;
use crate::parser::tree::SystemCatalog;
use crate::types::{TaggedValue, VarValue};
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use tracing::warn;

/// Serialize every cataloged variable as a `[typename, value]` pair
///
/// Every cataloged path keeps its key: unreadable variables degrade to
/// a `["NoneType", null]` entry so per-path consumers never see a hole.
pub fn serialize_values(
    catalog: &SystemCatalog,
    root: &dyn SystemNode,
) -> BTreeMap<String, TaggedValue> {
    let mut out = BTreeMap::new();
    for path in catalog.variable_paths() {
        let tagged = match resolver::read_variable(root, &path) {
            Ok(Some(value)) => TaggedValue::of(&value),
            Ok(None) => TaggedValue("NoneType".to_string(), Json::Null),
            Err(e) => {
                warn!("Substituting null for unreadable variable '{path}': {e}");
                TaggedValue("NoneType".to_string(), Json::Null)
            }
        };
        out.insert(path, tagged);
    }
    out
}

/// Serialize the tables of direct, non-suppressed recorders
///
/// Keys are `node_path.driver_path`. Numeric scalar cells are wrapped in
/// singleton arrays; arrays and text pass through unchanged.
pub fn serialize_recorders(drivers: &DriverMap, root: &dyn SystemNode) -> BTreeMap<String, Json> {
    let mut out = BTreeMap::new();
    for (node_path, entries) in drivers {
        let node = match resolver::resolve(root, node_path) {
            Ok(node) => node,
            Err(e) => {
                warn!("Recorder serialization skipped '{node_path}': {e}");
                continue;
            }
        };
        for entry in entries {
            if entry.recorder != RecorderStatus::Own {
                continue;
            }
            let Some(recorder) = find_driver(node, &entry.path).and_then(|d| d.recorder()) else {
                continue;
            };
            if recorder.is_suppressed() {
                continue;
            }
            let mut table = serde_json::Map::new();
            for (column, cells) in recorder.export_table() {
                let values: Vec<Json> = cells.iter().map(wire_cell).collect();
                table.insert(column, Json::Array(values));
            }
            out.insert(
                format!("{node_path}.{}", entry.dotted_path()),
                Json::Object(table),
            );
        }
    }
    out
}

fn wire_cell(cell: &VarValue) -> Json {
    let json = cell
        .to_json()
        .unwrap_or_else(|| Json::String(crate::types::NON_JSONABLE.to_string()));
    if cell.is_numeric_scalar() {
        Json::Array(vec![json])
    } else {
        json
    }
}

/// Serialize solver residue traces as per-iteration Euclidean norms
pub fn serialize_driver_traces(
    drivers: &DriverMap,
    root: &dyn SystemNode,
) -> BTreeMap<String, Json> {
    let mut out = BTreeMap::new();
    for (node_path, entries) in drivers {
        let node = match resolver::resolve(root, node_path) {
            Ok(node) => node,
            Err(e) => {
                warn!("Trace serialization skipped '{node_path}': {e}");
                continue;
            }
        };
        for entry in entries {
            if !entry.is_solver {
                continue;
            }
            let Some(driver) = find_driver(node, &entry.path) else {
                continue;
            };
            let trace = driver.solver_trace();
            if trace.is_empty() {
                continue;
            }
            let norms: Vec<f64> = trace.iter().map(|r| euclidean_norm(r)).collect();
            out.insert(
                format!("{node_path}.{}", entry.dotted_path()),
                json!({ "Residue": norms }),
            );
        }
    }
    out
}

fn euclidean_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory::{LocalDriver, LocalPort, LocalRecorder, LocalSystem};
    use crate::model::Simulation;
    use crate::parser::drivers::discover_drivers;

    fn discover(sys: &LocalSystem) -> (SystemCatalog, DriverMap) {
        let (catalog, _) = SystemCatalog::discover(sys);
        let drivers = discover_drivers(&catalog, sys);
        (catalog, drivers)
    }

    #[test]
    fn test_value_tagging() {
        let sys = LocalSystem::new("root").with_port(
            LocalPort::input("flow")
                .with_variable("rate", VarValue::Number(2.5))
                .with_variable("levels", VarValue::Array(vec![1.0, 2.0, 3.0]))
                .with_variable("mesh", VarValue::Opaque("OccShape".into())),
        );
        let (catalog, _) = discover(&sys);
        let values = serialize_values(&catalog, &sys);
        let wire = serde_json::to_value(&values).unwrap();
        assert_eq!(wire["root.flow.rate"], json!(["float", 2.5]));
        assert_eq!(wire["root.flow.levels"], json!(["ndarray", [1.0, 2.0, 3.0]]));
        assert_eq!(wire["root.flow.mesh"], json!(["OccShape", "non-jsonable"]));
    }

    #[test]
    fn test_unreadable_variable_keeps_its_key() {
        let sys = LocalSystem::new("root").with_child(
            LocalSystem::new("tank").with_port(
                LocalPort::input("flow").with_variable("rate", VarValue::Number(1.0)),
            ),
        );
        let (catalog, _) = SystemCatalog::discover(&sys);
        // Same root name, child gone: every tank path fails to resolve
        let detached = LocalSystem::new("root");
        let values = serialize_values(&catalog, &detached);
        let wire = serde_json::to_value(&values).unwrap();
        assert_eq!(wire["root.tank.flow.rate"], json!(["NoneType", null]));
    }

    #[test]
    fn test_recorder_singleton_wrapping() {
        let mut sys = LocalSystem::new("root")
            .with_inward("gravity", VarValue::Number(9.81))
            .with_driver(
                LocalDriver::time("transient", 2)
                    .with_recorder(LocalRecorder::new(vec!["inwards.gravity"])),
            );
        sys.run().unwrap();
        let (_, drivers) = discover(&sys);
        let tables = serialize_recorders(&drivers, &sys);
        let table = &tables["root.transient"];
        assert_eq!(table["inwards.gravity"], json!([[9.81], [9.81]]));
        assert_eq!(table["Reference"], json!(["0", "1"]));
    }

    #[test]
    fn test_suppressed_recorder_hidden() {
        let mut sys = LocalSystem::new("root").with_driver(LocalDriver::time("transient", 2));
        sys.run().unwrap();
        let (_, drivers) = discover(&sys);
        assert!(serialize_recorders(&drivers, &sys).is_empty());
    }

    #[test]
    fn test_residue_norms() {
        let sys = LocalSystem::new("root").with_driver(
            LocalDriver::solver("design").with_trace(vec![vec![3.0, 4.0], vec![0.6, 0.8]]),
        );
        let (_, drivers) = discover(&sys);
        let traces = serialize_driver_traces(&drivers, &sys);
        let residues = traces["root.design"]["Residue"].as_array().unwrap();
        assert!((residues[0].as_f64().unwrap() - 5.0).abs() < 1e-12);
        assert!((residues[1].as_f64().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_solver_without_history_hidden() {
        let sys = LocalSystem::new("root").with_driver(LocalDriver::solver("design"));
        let (_, drivers) = discover(&sys);
        assert!(serialize_driver_traces(&drivers, &sys).is_empty());
    }
}
