//! Data-source adapters for the explorer
//!
//! Every structure the parser walks comes in through the traits in this
//! module. Two adapters ship with the crate:
//!
//! - [`memory::LocalSystem`] - an in-memory live object graph with ports,
//!   nested drivers, recorders and time stepping
//! - [`json::JsonSystem`] - a read-only adapter over a static JSON tree
//!
//! Embedders wrap other simulation frameworks by implementing
//! [`SystemNode`] (and [`Simulation`] at the root). The parser never
//! assumes anything beyond these traits.

pub mod json;
pub mod memory;

use crate::error::Result;
use crate::types::{PortInfo, VarValue, VariableMeta};
use serde_json::Value as Json;
use std::sync::{Arc, Mutex, Weak};

/// One node in the (possibly nested) system graph
pub trait SystemNode {
    /// Local name of this node, unique among its siblings
    fn name(&self) -> &str;

    /// Names of direct children, in declaration order
    fn child_names(&self) -> Vec<String>;

    /// Look up a direct child by name
    fn child(&self, name: &str) -> Option<&dyn SystemNode>;

    /// Mutable lookup of a direct child by name
    fn child_mut(&mut self, name: &str) -> Option<&mut dyn SystemNode>;

    /// Declared ports with their variables. Discovery treats an error
    /// here as a per-node fault, not a traversal abort.
    fn ports(&self) -> Result<Vec<PortInfo>>;

    /// Read one variable; `None` when the source cannot provide a value
    fn read(&self, port: &str, variable: &str) -> Option<VarValue>;

    /// Replace one variable's value wholesale
    fn write(&mut self, port: &str, variable: &str, value: VarValue) -> Result<()>;

    /// Descriptive metadata for one variable
    fn variable_meta(&self, _port: &str, _variable: &str) -> VariableMeta {
        VariableMeta::default()
    }

    /// Whether a variable is a free input (not driven by a connection)
    fn is_free_input(&self, _port: &str, _variable: &str) -> bool {
        true
    }

    /// Connection descriptors for the system graph view
    fn connections(&self) -> Vec<Json> {
        Vec::new()
    }

    /// Drivers attached directly to this node
    fn drivers(&self) -> Vec<&dyn DriverNode>;
}

/// A driver attached to a node, possibly with nested sub-drivers
pub trait DriverNode {
    fn name(&self) -> &str;

    /// Nested sub-drivers, in declaration order
    fn children(&self) -> Vec<&dyn DriverNode>;

    /// Recorder attached directly to this driver, if any
    fn recorder(&self) -> Option<&dyn RecorderSource>;

    /// Whether this driver advances simulated time in steps
    fn is_time_driver(&self) -> bool {
        false
    }

    /// Whether this driver is an iterative solver
    fn is_solver(&self) -> bool {
        false
    }

    /// Residual vectors per solver iteration, when history is kept
    fn solver_trace(&self) -> Vec<Vec<f64>> {
        Vec::new()
    }
}

/// A recorder accumulating variable values over driver executions
pub trait RecorderSource {
    /// Recorded variable paths, relative to the root node
    fn field_names(&self) -> Vec<String>;

    /// Step-signal-only marker: the recorder drives step callbacks but
    /// its table is not meant for the UI
    fn is_suppressed(&self) -> bool {
        false
    }

    /// Snapshot of the accumulated table
    fn export_table(&self) -> crate::types::RecorderTable;
}

/// The root of a runnable model
///
/// `run_with` executes the model's drivers and invokes `on_step` after
/// each completed time step, passing the step index and a view of the
/// graph so callers can read values mid-run without re-locking.
pub trait Simulation: SystemNode + Send {
    fn run_with(&mut self, on_step: &mut dyn FnMut(u64, &dyn SystemNode)) -> Result<()>;

    /// Run without observing individual steps
    fn run(&mut self) -> Result<()> {
        self.run_with(&mut |_, _| {})
    }
}

/// Owning handle to a simulation shared with an embedder
pub type SharedSimulation = Arc<Mutex<dyn Simulation>>;

/// Non-owning handle; the explorer never keeps the model alive
pub type WeakSimulation = Weak<Mutex<dyn Simulation>>;
