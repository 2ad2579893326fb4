//! Driver and recorder discovery
//!
//! Walks every node's driver hierarchy and records, per driver, whether
//! it has its own recorder, inherits one from the nearest ancestor, or
//! has none. Recorder field lists travel down with the inheritance so
//! consumers never need to climb the hierarchy again. A model with no
//! drivers at all yields an empty map, which is a valid state.

use crate::model::{DriverNode, SystemNode};
use crate::parser::resolver;
use crate::parser::tree::SystemCatalog;
use std::collections::BTreeMap;
use tracing::warn;

/// Where a driver's recorder fields come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    /// Recorder attached directly to this driver
    Own,
    /// Fields inherited from the nearest ancestor with a recorder
    Inherited,
    /// No recorder anywhere on the path to this driver
    None,
}

/// One discovered driver, keyed by its path under the owning node
#[derive(Debug, Clone)]
pub struct DriverEntry {
    /// Driver names from the node's driver list down to this driver
    pub path: Vec<String>,
    pub recorder: RecorderStatus,
    /// Recorded variable paths (own or inherited)
    pub fields: Vec<String>,
    pub is_time_driver: bool,
    pub is_solver: bool,
}

impl DriverEntry {
    /// Dotted driver path under the owning node
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Per-node driver entries, pre-order within each node
pub type DriverMap = BTreeMap<String, Vec<DriverEntry>>;

/// Discover every driver reachable from the cataloged nodes
pub fn discover_drivers(catalog: &SystemCatalog, root: &dyn SystemNode) -> DriverMap {
    let mut map = DriverMap::new();
    for path in catalog.paths() {
        let node = match resolver::resolve(root, path) {
            Ok(node) => node,
            Err(e) => {
                warn!("Driver discovery skipped '{path}': {e}");
                continue;
            }
        };
        let mut entries = Vec::new();
        for driver in node.drivers() {
            walk(driver, &[], &[], &mut entries);
        }
        if !entries.is_empty() {
            map.insert(path.to_string(), entries);
        }
    }
    map
}

fn walk(
    driver: &dyn DriverNode,
    ancestors: &[String],
    inherited: &[String],
    out: &mut Vec<DriverEntry>,
) {
    let mut path = ancestors.to_vec();
    path.push(driver.name().to_string());

    let (status, fields) = match driver.recorder() {
        Some(recorder) => (RecorderStatus::Own, recorder.field_names()),
        None if !inherited.is_empty() => (RecorderStatus::Inherited, inherited.to_vec()),
        None => (RecorderStatus::None, Vec::new()),
    };

    out.push(DriverEntry {
        path: path.clone(),
        recorder: status,
        fields: fields.clone(),
        is_time_driver: driver.is_time_driver(),
        is_solver: driver.is_solver(),
    });

    for child in driver.children() {
        walk(child, &path, &fields, out);
    }
}

/// Paths of all time drivers: `(node path, driver path)` pairs
pub fn time_driver_paths(map: &DriverMap) -> Vec<(String, Vec<String>)> {
    let mut found = Vec::new();
    for (node_path, entries) in map {
        for entry in entries {
            if entry.is_time_driver {
                found.push((node_path.clone(), entry.path.clone()));
            }
        }
    }
    found
}

/// Resolve a driver entry back to the live driver on its node
pub fn find_driver<'a>(node: &'a dyn SystemNode, path: &[String]) -> Option<&'a dyn DriverNode> {
    let (first, rest) = path.split_first()?;
    let mut driver = node.drivers().into_iter().find(|d| d.name() == first)?;
    for name in rest {
        driver = driver.children().into_iter().find(|d| d.name() == name)?;
    }
    Some(driver)
}
