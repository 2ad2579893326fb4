//! System introspection facade
//!
//! [`SystemParser`] ties the discovery, serialization and mutation
//! layers together over one data source. Construction walks the graph
//! once: tree discovery, driver discovery and the initial variable
//! capture all happen up front, under a single lock for live models.
//!
//! The parser holds the model weakly; dropping every strong handle on
//! the embedder side invalidates the parser rather than leaking the
//! model. Static JSON sources are owned outright since they carry no
//! runtime state.

pub mod drivers;
pub mod mutator;
pub mod resolver;
pub mod serializer;
pub mod tree;

use crate::error::{Result, SysVisError};
use crate::model::json::JsonSystem;
use crate::model::{SharedSimulation, SystemNode, WeakSimulation};
use crate::types::{TaggedValue, VarValue, VariableMeta};
use drivers::{discover_drivers, DriverMap};
use mutator::SnapshotMap;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tree::{SystemCatalog, TreeNode};

enum ParserSource {
    /// Weak handle to a live, runnable model
    Live(WeakSimulation),
    /// Owned static description; discovery only
    Static(JsonSystem),
}

/// Introspection, serialization and mutation over one data source
pub struct SystemParser {
    source: ParserSource,
    catalog: SystemCatalog,
    tree: Vec<TreeNode>,
    drivers: DriverMap,
    snapshots: SnapshotMap,
}

impl SystemParser {
    /// Build a parser over a live model, capturing its initial state
    pub fn from_simulation(model: &SharedSimulation) -> Result<SystemParser> {
        let guard = model
            .lock()
            .map_err(|_| SysVisError::Execution("model mutex poisoned".to_string()))?;
        let root: &dyn SystemNode = &*guard;
        let (catalog, tree) = SystemCatalog::discover(root);
        let drivers = discover_drivers(&catalog, root);
        let snapshots = mutator::capture_initial_state(&catalog, root);
        drop(guard);
        Ok(SystemParser {
            source: ParserSource::Live(Arc::downgrade(model)),
            catalog,
            tree,
            drivers,
            snapshots,
        })
    }

    /// Build a parser over a static JSON model description
    pub fn from_json(data: &Json) -> Result<SystemParser> {
        let system = JsonSystem::from_value(data)?;
        let (catalog, tree) = SystemCatalog::discover(&system);
        let drivers = discover_drivers(&catalog, &system);
        let snapshots = mutator::capture_initial_state(&catalog, &system);
        Ok(SystemParser {
            source: ParserSource::Static(system),
            catalog,
            tree,
            drivers,
            snapshots,
        })
    }

    pub fn root_name(&self) -> &str {
        self.catalog.root_name()
    }

    pub fn catalog(&self) -> &SystemCatalog {
        &self.catalog
    }

    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }

    pub fn drivers(&self) -> &DriverMap {
        &self.drivers
    }

    pub fn snapshots(&self) -> &SnapshotMap {
        &self.snapshots
    }

    /// Whether this parser drives a live model
    pub fn is_live(&self) -> bool {
        matches!(self.source, ParserSource::Live(_))
    }

    /// All node paths in pre-order
    pub fn children_list(&self) -> Vec<String> {
        self.catalog.paths().map(String::from).collect()
    }

    /// Input port names per node path
    pub fn children_in_port(&self) -> BTreeMap<String, Vec<String>> {
        self.catalog
            .records()
            .map(|r| (r.path.clone(), r.in_ports.clone()))
            .collect()
    }

    /// Output port names per node path
    pub fn children_out_port(&self) -> BTreeMap<String, Vec<String>> {
        self.catalog
            .records()
            .map(|r| (r.path.clone(), r.out_ports.clone()))
            .collect()
    }

    /// Whether any time driver was discovered
    pub fn has_time_driver(&self) -> bool {
        !drivers::time_driver_paths(&self.drivers).is_empty()
    }

    /// Recorded variable names and their captured sizes for one driver
    pub fn recorder_variables(
        &self,
        node_path: &str,
        driver_path: &[String],
    ) -> (Vec<String>, Vec<usize>) {
        let Some(entry) = self
            .drivers
            .get(node_path)
            .and_then(|entries| entries.iter().find(|e| e.path == driver_path))
        else {
            return (Vec::new(), Vec::new());
        };
        let sizes = entry
            .fields
            .iter()
            .map(|field| {
                let full = format!("{node_path}.{field}");
                self.snapshots.get(&full).map(|s| s.size).unwrap_or(1)
            })
            .collect();
        (entry.fields.clone(), sizes)
    }

    /// Run some closure with a shared view of the graph
    pub fn with_node<R>(&self, f: impl FnOnce(&dyn SystemNode) -> R) -> Result<R> {
        match &self.source {
            ParserSource::Live(weak) => {
                let model = weak.upgrade().ok_or(SysVisError::ModelDropped)?;
                let guard = model
                    .lock()
                    .map_err(|_| SysVisError::Execution("model mutex poisoned".to_string()))?;
                Ok(f(&*guard))
            }
            ParserSource::Static(system) => Ok(f(system)),
        }
    }

    /// Run some closure with a mutable view of the graph
    pub fn with_node_mut<R>(&mut self, f: impl FnOnce(&mut dyn SystemNode) -> R) -> Result<R> {
        match &mut self.source {
            ParserSource::Live(weak) => {
                let model = weak.upgrade().ok_or(SysVisError::ModelDropped)?;
                let mut guard = model
                    .lock()
                    .map_err(|_| SysVisError::Execution("model mutex poisoned".to_string()))?;
                Ok(f(&mut *guard))
            }
            ParserSource::Static(system) => Ok(f(system)),
        }
    }

    /// Serialize every cataloged variable
    pub fn serialize_values(&self) -> Result<BTreeMap<String, TaggedValue>> {
        self.with_node(|node| serializer::serialize_values(&self.catalog, node))
    }

    /// Serialize direct recorder tables
    pub fn serialize_recorders(&self) -> Result<BTreeMap<String, Json>> {
        self.with_node(|node| serializer::serialize_recorders(&self.drivers, node))
    }

    /// Serialize solver residue traces
    pub fn serialize_driver_traces(&self) -> Result<BTreeMap<String, Json>> {
        self.with_node(|node| serializer::serialize_driver_traces(&self.drivers, node))
    }

    /// Descriptive metadata for every variable: node -> port -> variable
    pub fn port_meta(
        &self,
    ) -> Result<BTreeMap<String, BTreeMap<String, BTreeMap<String, VariableMeta>>>> {
        self.with_node(|root| {
            let mut out = BTreeMap::new();
            for record in self.catalog.records() {
                let Ok(node) = resolver::resolve(root, &record.path) else {
                    continue;
                };
                let mut ports = BTreeMap::new();
                for (port, variables) in &record.port_variables {
                    let metas: BTreeMap<String, VariableMeta> = variables
                        .iter()
                        .map(|v| (v.clone(), node.variable_meta(port, v)))
                        .collect();
                    ports.insert(port.clone(), metas);
                }
                out.insert(record.path.clone(), ports);
            }
            out
        })
    }

    /// Current value of one variable by full dotted path
    pub fn get_value(&self, path: &str) -> Result<Option<VarValue>> {
        self.with_node(|node| resolver::read_variable(node, path))?
    }

    /// Replace one variable's value wholesale
    pub fn set_variable(
        &mut self,
        node_path: &str,
        port: &str,
        variable: &str,
        value: VarValue,
    ) -> Result<()> {
        self.with_node_mut(|node| mutator::set_variable(node, node_path, port, variable, value))?
    }

    /// Restore every variable to its captured initial value
    pub fn reset_all(&mut self) -> Result<()> {
        let snapshots = std::mem::take(&mut self.snapshots);
        let result = self.with_node_mut(|node| mutator::reset_all(&snapshots, node));
        self.snapshots = snapshots;
        result
    }

    /// Run the model, observing each completed time step
    pub fn run_with(&self, on_step: &mut dyn FnMut(u64, &dyn SystemNode)) -> Result<()> {
        match &self.source {
            ParserSource::Live(weak) => {
                let model = weak.upgrade().ok_or(SysVisError::ModelDropped)?;
                let mut guard = model
                    .lock()
                    .map_err(|_| SysVisError::Execution("model mutex poisoned".to_string()))?;
                guard.run_with(on_step)
            }
            ParserSource::Static(_) => Err(SysVisError::Execution(
                "static data source cannot run".to_string(),
            )),
        }
    }

    /// Run the model without observing steps
    pub fn run(&self) -> Result<()> {
        self.run_with(&mut |_, _| {})
    }
}
