//! System tree discovery
//!
//! A single pre-order traversal of the node graph produces two views:
//! the flat [`SystemCatalog`] keyed by full dotted path (storage is a Vec
//! in visit order plus a path index for O(1) lookup) and the nested
//! [`TreeNode`] presentation tree consumed by the UI.
//!
//! Discovery is fault-isolated: a node whose port introspection fails
//! contributes empty port lists and a warning, and the traversal carries
//! on. The conventional `inwards`/`outwards` pseudo-ports are always
//! present in the in/out lists so consumers can rely on them.

use crate::model::SystemNode;
use crate::types::{PortDirection, PortInfo, COMMON_IN_PORT, COMMON_OUT_PORT};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Recursion guard against cyclic or runaway graphs
const MAX_DEPTH: usize = 64;

/// Everything discovery learned about one node
#[derive(Debug, Clone)]
pub struct NodeRecord {
    /// Full dotted path, root name included
    pub path: String,
    /// Child names in declaration order; `None` for leaves
    pub children: Option<Vec<String>>,
    /// All port names, inputs before outputs
    pub port_list: Vec<String>,
    pub in_ports: Vec<String>,
    pub out_ports: Vec<String>,
    /// Variable names per port, declaration order preserved
    pub port_variables: BTreeMap<String, Vec<String>>,
    /// Names of drivers attached directly to the node
    pub driver_names: Vec<String>,
}

/// Nested presentation tree; leaves omit the `children` key entirely
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub title: String,
    pub id: String,
    pub expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// Flat pre-order map of the discovered system graph
#[derive(Debug, Default)]
pub struct SystemCatalog {
    root_name: String,
    records: Vec<NodeRecord>,
    index: HashMap<String, usize>,
}

impl SystemCatalog {
    /// Walk the graph once, producing the catalog and presentation tree
    pub fn discover(root: &dyn SystemNode) -> (SystemCatalog, Vec<TreeNode>) {
        let mut catalog = SystemCatalog {
            root_name: root.name().to_string(),
            records: Vec::new(),
            index: HashMap::new(),
        };
        let tree = visit(root, root.name(), 0, &mut catalog);
        (catalog, vec![tree])
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&NodeRecord> {
        self.index.get(path).map(|&i| &self.records[i])
    }

    /// All node paths in visit (pre-order) order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.path.as_str())
    }

    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.records.iter()
    }

    /// Full dotted variable paths for every node, port and variable
    pub fn variable_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for record in &self.records {
            for port in &record.port_list {
                if let Some(variables) = record.port_variables.get(port) {
                    for variable in variables {
                        paths.push(format!("{}.{port}.{variable}", record.path));
                    }
                }
            }
        }
        paths
    }

    fn insert(&mut self, record: NodeRecord) {
        if let Some(&i) = self.index.get(&record.path) {
            // Re-visited path (shared node): the newest record wins.
            self.records[i] = record;
        } else {
            self.index.insert(record.path.clone(), self.records.len());
            self.records.push(record);
        }
    }
}

fn visit(node: &dyn SystemNode, path: &str, depth: usize, catalog: &mut SystemCatalog) -> TreeNode {
    let child_names = node.child_names();
    let mut record = NodeRecord {
        path: path.to_string(),
        children: if child_names.is_empty() {
            None
        } else {
            Some(child_names.clone())
        },
        port_list: Vec::new(),
        in_ports: Vec::new(),
        out_ports: Vec::new(),
        port_variables: BTreeMap::new(),
        driver_names: node.drivers().iter().map(|d| d.name().to_string()).collect(),
    };

    let ports = match node.ports() {
        Ok(ports) => ports,
        Err(e) => {
            warn!("Port introspection failed at '{path}': {e}");
            Vec::new()
        }
    };
    for port in &ports {
        record
            .port_variables
            .insert(port.name.clone(), port.variables.clone());
        match port.direction {
            PortDirection::In => record.in_ports.push(port.name.clone()),
            PortDirection::Out => record.out_ports.push(port.name.clone()),
        }
    }
    ensure_common_ports(&mut record, &ports);
    record.port_list = record
        .in_ports
        .iter()
        .chain(record.out_ports.iter())
        .cloned()
        .collect();
    catalog.insert(record);

    let mut children = Vec::new();
    if depth >= MAX_DEPTH {
        warn!("Max traversal depth reached at '{path}', pruning subtree");
    } else {
        for name in &child_names {
            if let Some(child) = node.child(name) {
                let child_path = format!("{path}.{name}");
                children.push(visit(child, &child_path, depth + 1, catalog));
            }
        }
    }

    TreeNode {
        title: node.name().to_string(),
        id: path.to_string(),
        expanded: true,
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    }
}

/// The conventional pseudo-ports are always listed, declared or not
fn ensure_common_ports(record: &mut NodeRecord, declared: &[PortInfo]) {
    if !declared.iter().any(|p| p.name == COMMON_IN_PORT) {
        record.in_ports.insert(0, COMMON_IN_PORT.to_string());
        record
            .port_variables
            .entry(COMMON_IN_PORT.to_string())
            .or_default();
    }
    if !declared.iter().any(|p| p.name == COMMON_OUT_PORT) {
        record.out_ports.insert(0, COMMON_OUT_PORT.to_string());
        record
            .port_variables
            .entry(COMMON_OUT_PORT.to_string())
            .or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory::{LocalPort, LocalSystem};
    use crate::types::VarValue;

    fn sample() -> LocalSystem {
        LocalSystem::new("root")
            .with_child(
                LocalSystem::new("a").with_child(
                    LocalSystem::new("a1").with_port(
                        LocalPort::input("flow").with_variable("rate", VarValue::Number(1.0)),
                    ),
                ),
            )
            .with_child(LocalSystem::new("b"))
    }

    #[test]
    fn test_flat_map_completeness() {
        let sys = sample();
        let (catalog, _) = SystemCatalog::discover(&sys);
        let paths: Vec<&str> = catalog.paths().collect();
        assert_eq!(paths, vec!["root", "root.a", "root.a.a1", "root.b"]);
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_common_ports_always_present() {
        let sys = JsonOnly::default();
        let (catalog, _) = SystemCatalog::discover(&sys);
        let record = catalog.get("bare").unwrap();
        assert!(record.in_ports.contains(&COMMON_IN_PORT.to_string()));
        assert!(record.out_ports.contains(&COMMON_OUT_PORT.to_string()));
    }

    // Node with no declared ports at all
    #[derive(Default)]
    struct JsonOnly;

    impl crate::model::SystemNode for JsonOnly {
        fn name(&self) -> &str {
            "bare"
        }
        fn child_names(&self) -> Vec<String> {
            Vec::new()
        }
        fn child(&self, _: &str) -> Option<&dyn crate::model::SystemNode> {
            None
        }
        fn child_mut(&mut self, _: &str) -> Option<&mut dyn crate::model::SystemNode> {
            None
        }
        fn ports(&self) -> crate::error::Result<Vec<PortInfo>> {
            Ok(Vec::new())
        }
        fn read(&self, _: &str, _: &str) -> Option<VarValue> {
            None
        }
        fn write(&mut self, _: &str, _: &str, _: VarValue) -> crate::error::Result<()> {
            Ok(())
        }
        fn drivers(&self) -> Vec<&dyn crate::model::DriverNode> {
            Vec::new()
        }
    }

    #[test]
    fn test_tree_shape() {
        let sys = sample();
        let (_, tree) = SystemCatalog::discover(&sys);
        assert_eq!(tree.len(), 1);
        let root = &tree[0];
        assert_eq!(root.title, "root");
        assert_eq!(root.id, "root");
        let children = root.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        // Leaf nodes serialize without a children key
        let leaf = &children[1];
        assert!(leaf.children.is_none());
        let wire = serde_json::to_value(leaf).unwrap();
        assert!(wire.get("children").is_none());
        assert_eq!(wire["id"], "root.b");
    }

    #[test]
    fn test_broken_ports_do_not_abort() {
        let sys = LocalSystem::new("root")
            .with_child(LocalSystem::new("bad").with_broken_ports())
            .with_child(LocalSystem::new("ok").with_port(
                LocalPort::output("state").with_variable("level", VarValue::Number(0.0)),
            ));
        let (catalog, _) = SystemCatalog::discover(&sys);
        assert_eq!(catalog.len(), 3);
        let bad = catalog.get("root.bad").unwrap();
        // Common ports injected even when introspection failed
        assert_eq!(bad.in_ports, vec![COMMON_IN_PORT.to_string()]);
        let ok = catalog.get("root.ok").unwrap();
        assert!(ok.out_ports.contains(&"state".to_string()));
    }

    #[test]
    fn test_variable_paths() {
        let sys = sample();
        let (catalog, _) = SystemCatalog::discover(&sys);
        let paths = catalog.variable_paths();
        assert!(paths.contains(&"root.a.a1.flow.rate".to_string()));
    }
}
