//! In-memory live model adapter
//!
//! [`LocalSystem`] is a full implementation of the adapter traits without
//! any external simulation framework: nodes carry ports and variables,
//! drivers nest and step, recorders accumulate column tables. It is the
//! reference adapter and the workhorse of the test suites, but embedders
//! can use it directly for hand-built models.

use crate::error::{Result, SysVisError};
use crate::model::{DriverNode, RecorderSource, SharedSimulation, Simulation, SystemNode};
use crate::types::{
    PortDirection, PortInfo, RecorderTable, VarValue, VariableMeta, COMMON_IN_PORT,
    COMMON_OUT_PORT,
};
use serde_json::Value as Json;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A port holding named variables in declaration order
#[derive(Debug)]
pub struct LocalPort {
    name: String,
    direction: PortDirection,
    variables: Vec<(String, VarValue)>,
    meta: HashMap<String, VariableMeta>,
    connected: HashSet<String>,
}

impl LocalPort {
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::In)
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Out)
    }

    fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            variables: Vec::new(),
            meta: HashMap::new(),
            connected: HashSet::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: VarValue) -> Self {
        self.variables.push((name.into(), value));
        self
    }

    pub fn with_meta(mut self, variable: impl Into<String>, meta: VariableMeta) -> Self {
        self.meta.insert(variable.into(), meta);
        self
    }

    /// Mark a variable as the sink of a connection (not a free input)
    pub fn with_connected(mut self, variable: impl Into<String>) -> Self {
        self.connected.insert(variable.into());
        self
    }

    fn info(&self) -> PortInfo {
        PortInfo {
            name: self.name.clone(),
            direction: self.direction,
            variables: self.variables.iter().map(|(n, _)| n.clone()).collect(),
        }
    }
}

/// A recorder accumulating one column per field plus a reference column
#[derive(Debug)]
pub struct LocalRecorder {
    fields: Vec<String>,
    suppressed: bool,
    // Interior mutability lets the run loop record through a shared
    // traversal of the tree.
    table: RefCell<RecorderTable>,
}

impl LocalRecorder {
    pub fn new(fields: Vec<&str>) -> Self {
        Self {
            fields: fields.into_iter().map(String::from).collect(),
            suppressed: false,
            table: RefCell::new(RecorderTable::new()),
        }
    }

    /// A step-signal-only recorder whose table the UI never sees
    pub fn suppressed() -> Self {
        Self {
            fields: Vec::new(),
            suppressed: true,
            table: RefCell::new(RecorderTable::new()),
        }
    }

    fn record(&self, reference: &str, root: &LocalSystem) {
        let mut table = self.table.borrow_mut();
        table
            .entry("Reference".to_string())
            .or_default()
            .push(VarValue::Text(reference.to_string()));
        for field in &self.fields {
            let value = root
                .read_path(field)
                .unwrap_or(VarValue::Json(Json::Null));
            table.entry(field.clone()).or_default().push(value);
        }
    }
}

impl RecorderSource for LocalRecorder {
    fn field_names(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    fn export_table(&self) -> RecorderTable {
        self.table.borrow().clone()
    }
}

/// A driver with optional nesting, recorder and time stepping
#[derive(Debug)]
pub struct LocalDriver {
    name: String,
    children: Vec<LocalDriver>,
    recorder: Option<LocalRecorder>,
    time_driver: bool,
    time_steps: u64,
    solver: bool,
    trace: Vec<Vec<f64>>,
}

impl LocalDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            recorder: None,
            time_driver: false,
            time_steps: 0,
            solver: false,
            trace: Vec::new(),
        }
    }

    /// A time driver executing the given number of steps per run
    pub fn time(name: impl Into<String>, steps: u64) -> Self {
        let mut driver = Self::new(name);
        driver.time_driver = true;
        driver.time_steps = steps;
        driver
    }

    /// An iterative solver driver
    pub fn solver(name: impl Into<String>) -> Self {
        let mut driver = Self::new(name);
        driver.solver = true;
        driver
    }

    pub fn with_child(mut self, child: LocalDriver) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_recorder(mut self, recorder: LocalRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_trace(mut self, trace: Vec<Vec<f64>>) -> Self {
        self.trace = trace;
        self
    }

    fn max_steps(&self) -> u64 {
        let own = if self.time_driver { self.time_steps } else { 0 };
        self.children
            .iter()
            .map(LocalDriver::max_steps)
            .fold(own, u64::max)
    }

    fn attach_step_recorders(&mut self) {
        if self.time_driver && self.recorder.is_none() {
            self.recorder = Some(LocalRecorder::suppressed());
        }
        for child in &mut self.children {
            child.attach_step_recorders();
        }
    }

    fn record_tick(&self, reference: &str, root: &LocalSystem) {
        if let Some(recorder) = &self.recorder {
            recorder.record(reference, root);
        }
        for child in &self.children {
            child.record_tick(reference, root);
        }
    }
}

impl DriverNode for LocalDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Vec<&dyn DriverNode> {
        self.children.iter().map(|c| c as &dyn DriverNode).collect()
    }

    fn recorder(&self) -> Option<&dyn RecorderSource> {
        self.recorder.as_ref().map(|r| r as &dyn RecorderSource)
    }

    fn is_time_driver(&self) -> bool {
        self.time_driver
    }

    fn is_solver(&self) -> bool {
        self.solver
    }

    fn solver_trace(&self) -> Vec<Vec<f64>> {
        self.trace.clone()
    }
}

/// An in-memory system node, usable as the root of a runnable model
#[derive(Debug, Default)]
pub struct LocalSystem {
    name: String,
    children: Vec<LocalSystem>,
    ports: Vec<LocalPort>,
    drivers: Vec<LocalDriver>,
    connections: Vec<Json>,
    broken_ports: bool,
    fail_after: Option<u64>,
}

impl LocalSystem {
    /// New node carrying the conventional `inwards`/`outwards` ports
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: vec![
                LocalPort::input(COMMON_IN_PORT),
                LocalPort::output(COMMON_OUT_PORT),
            ],
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: LocalSystem) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_port(mut self, port: LocalPort) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_driver(mut self, driver: LocalDriver) -> Self {
        self.drivers.push(driver);
        self
    }

    pub fn with_connection(mut self, connection: Json) -> Self {
        self.connections.push(connection);
        self
    }

    /// Add a variable to the conventional `inwards` port
    pub fn with_inward(mut self, name: impl Into<String>, value: VarValue) -> Self {
        self.port_mut(COMMON_IN_PORT)
            .variables
            .push((name.into(), value));
        self
    }

    /// Add a variable to the conventional `outwards` port
    pub fn with_outward(mut self, name: impl Into<String>, value: VarValue) -> Self {
        self.port_mut(COMMON_OUT_PORT)
            .variables
            .push((name.into(), value));
        self
    }

    /// Make `ports()` fail, exercising per-node discovery fault handling
    pub fn with_broken_ports(mut self) -> Self {
        self.broken_ports = true;
        self
    }

    /// Make `run_with` fail after the given number of completed steps
    pub fn with_failure_after(mut self, steps: u64) -> Self {
        self.fail_after = Some(steps);
        self
    }

    /// Wrap this node as the shared root of a runnable model
    pub fn into_shared(self) -> SharedSimulation {
        Arc::new(Mutex::new(self))
    }

    fn port_mut(&mut self, name: &str) -> &mut LocalPort {
        let idx = self
            .ports
            .iter()
            .position(|p| p.name == name)
            .unwrap_or_else(|| {
                self.ports.push(LocalPort::input(name));
                self.ports.len() - 1
            });
        &mut self.ports[idx]
    }

    fn port(&self, name: &str) -> Option<&LocalPort> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Read a variable by root-relative path (`child.….port.variable`)
    fn read_path(&self, path: &str) -> Option<VarValue> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() < 2 {
            return None;
        }
        let (port, variable) = (segments[segments.len() - 2], segments[segments.len() - 1]);
        let mut node = self;
        for name in &segments[..segments.len() - 2] {
            node = node.children.iter().find(|c| c.name == *name)?;
        }
        node.read(port, variable)
    }

    fn max_time_steps(&self) -> u64 {
        let own = self
            .drivers
            .iter()
            .map(LocalDriver::max_steps)
            .max()
            .unwrap_or(0);
        self.children
            .iter()
            .map(LocalSystem::max_time_steps)
            .fold(own, u64::max)
    }

    fn attach_step_recorders(&mut self) {
        for driver in &mut self.drivers {
            driver.attach_step_recorders();
        }
        for child in &mut self.children {
            child.attach_step_recorders();
        }
    }

    fn record_tick(&self, reference: &str, root: &LocalSystem) {
        for driver in &self.drivers {
            driver.record_tick(reference, root);
        }
        for child in &self.children {
            child.record_tick(reference, root);
        }
    }
}

impl SystemNode for LocalSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn child_names(&self) -> Vec<String> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }

    fn child(&self, name: &str) -> Option<&dyn SystemNode> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c as &dyn SystemNode)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut dyn SystemNode> {
        self.children
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| c as &mut dyn SystemNode)
    }

    fn ports(&self) -> Result<Vec<PortInfo>> {
        if self.broken_ports {
            return Err(SysVisError::Structure(format!(
                "port introspection failed on '{}'",
                self.name
            )));
        }
        Ok(self.ports.iter().map(LocalPort::info).collect())
    }

    fn read(&self, port: &str, variable: &str) -> Option<VarValue> {
        self.port(port)?
            .variables
            .iter()
            .find(|(n, _)| n == variable)
            .map(|(_, v)| v.clone())
    }

    fn write(&mut self, port: &str, variable: &str, value: VarValue) -> Result<()> {
        let node_name = self.name.clone();
        let slot = self
            .ports
            .iter_mut()
            .find(|p| p.name == port)
            .and_then(|p| p.variables.iter_mut().find(|(n, _)| n == variable))
            .ok_or_else(|| SysVisError::resolution(format!("{node_name}.{port}.{variable}")))?;
        slot.1 = value;
        Ok(())
    }

    fn variable_meta(&self, port: &str, variable: &str) -> VariableMeta {
        self.port(port)
            .and_then(|p| p.meta.get(variable).cloned())
            .unwrap_or_default()
    }

    fn is_free_input(&self, port: &str, variable: &str) -> bool {
        match self.port(port) {
            Some(p) => p.direction == PortDirection::In && !p.connected.contains(variable),
            None => false,
        }
    }

    fn connections(&self) -> Vec<Json> {
        self.connections.clone()
    }

    fn drivers(&self) -> Vec<&dyn DriverNode> {
        self.drivers.iter().map(|d| d as &dyn DriverNode).collect()
    }
}

impl Simulation for LocalSystem {
    fn run_with(&mut self, on_step: &mut dyn FnMut(u64, &dyn SystemNode)) -> Result<()> {
        self.attach_step_recorders();
        let steps = self.max_time_steps();
        if steps == 0 {
            self.record_tick("static", self);
            return Ok(());
        }
        for step in 0..steps {
            if let Some(limit) = self.fail_after {
                if step >= limit {
                    return Err(SysVisError::Execution(format!(
                        "model diverged at step {step}"
                    )));
                }
            }
            self.record_tick(&step.to_string(), self);
            on_step(step, self);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LocalSystem {
        LocalSystem::new("root")
            .with_child(
                LocalSystem::new("tank").with_port(
                    LocalPort::input("flow")
                        .with_variable("rate", VarValue::Number(2.0))
                        .with_variable("levels", VarValue::Array(vec![1.0, 2.0])),
                ),
            )
            .with_inward("gravity", VarValue::Number(9.81))
    }

    #[test]
    fn test_read_write() {
        let mut sys = sample();
        assert_eq!(
            sys.read("inwards", "gravity"),
            Some(VarValue::Number(9.81))
        );
        sys.write("inwards", "gravity", VarValue::Number(1.62)).unwrap();
        assert_eq!(sys.read("inwards", "gravity"), Some(VarValue::Number(1.62)));
        assert!(sys.write("inwards", "missing", VarValue::Number(0.0)).is_err());
    }

    #[test]
    fn test_read_path() {
        let sys = sample();
        assert_eq!(
            sys.read_path("tank.flow.rate"),
            Some(VarValue::Number(2.0))
        );
        assert_eq!(sys.read_path("inwards.gravity"), Some(VarValue::Number(9.81)));
        assert_eq!(sys.read_path("tank.flow.missing"), None);
    }

    #[test]
    fn test_time_run_records_each_step() {
        let mut sys = sample().with_driver(
            LocalDriver::time("runner", 3)
                .with_recorder(LocalRecorder::new(vec!["tank.flow.rate"])),
        );
        let mut seen = Vec::new();
        sys.run_with(&mut |step, _| seen.push(step)).unwrap();
        assert_eq!(seen, vec![0, 1, 2]);

        let table = sys.drivers[0].recorder.as_ref().unwrap().export_table();
        assert_eq!(table["tank.flow.rate"].len(), 3);
        assert_eq!(
            table["Reference"],
            vec![
                VarValue::Text("0".into()),
                VarValue::Text("1".into()),
                VarValue::Text("2".into())
            ]
        );
    }

    #[test]
    fn test_static_run_records_once() {
        let mut sys = sample()
            .with_driver(LocalDriver::new("design").with_recorder(LocalRecorder::new(vec![
                "inwards.gravity",
            ])));
        let mut steps = 0;
        sys.run_with(&mut |_, _| steps += 1).unwrap();
        assert_eq!(steps, 0);
        let table = sys.drivers[0].recorder.as_ref().unwrap().export_table();
        assert_eq!(table["inwards.gravity"], vec![VarValue::Number(9.81)]);
    }

    #[test]
    fn test_time_driver_gets_suppressed_recorder() {
        let mut sys = sample().with_driver(LocalDriver::time("runner", 2));
        sys.run().unwrap();
        let recorder = sys.drivers[0].recorder.as_ref().unwrap();
        assert!(recorder.is_suppressed());
        assert!(recorder.field_names().is_empty());
    }

    #[test]
    fn test_failure_after_steps() {
        let mut sys = sample()
            .with_driver(LocalDriver::time("runner", 5))
            .with_failure_after(2);
        let mut seen = Vec::new();
        let err = sys.run_with(&mut |step, _| seen.push(step)).unwrap_err();
        assert_eq!(seen, vec![0, 1]);
        assert!(err.to_string().contains("step 2"));
    }

    #[test]
    fn test_broken_ports() {
        let sys = LocalSystem::new("root").with_broken_ports();
        assert!(sys.ports().is_err());
    }
}
