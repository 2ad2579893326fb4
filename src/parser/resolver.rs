//! Dotted-path resolution over the node graph
//!
//! Every path in the crate is root-inclusive: the first segment must be
//! the root node's own name, subsequent segments name children. Variable
//! paths append `port.variable` to a node path. A path that does not
//! resolve is an error, never silently ignored.

use crate::error::{Result, SysVisError};
use crate::model::SystemNode;
use crate::types::VarValue;

/// Resolve a dotted node path to a node reference
pub fn resolve<'a>(root: &'a dyn SystemNode, path: &str) -> Result<&'a dyn SystemNode> {
    let mut segments = path.split('.');
    match segments.next() {
        Some(first) if first == root.name() => {}
        _ => return Err(SysVisError::resolution(path)),
    }
    let mut node = root;
    for segment in segments {
        node = node
            .child(segment)
            .ok_or_else(|| SysVisError::resolution(path))?;
    }
    Ok(node)
}

/// Resolve a dotted node path to a mutable node reference
pub fn resolve_mut<'a>(root: &'a mut dyn SystemNode, path: &str) -> Result<&'a mut dyn SystemNode> {
    let mut segments = path.split('.');
    match segments.next() {
        Some(first) if first == root.name() => {}
        _ => return Err(SysVisError::resolution(path)),
    }
    let mut node = root;
    for segment in segments {
        node = node
            .child_mut(segment)
            .ok_or_else(|| SysVisError::resolution(path))?;
    }
    Ok(node)
}

/// Split a full variable path into `(node_path, port, variable)`
///
/// The last two segments are the port and variable names; at least one
/// leading segment (the root name) must remain.
pub fn split_variable_path(path: &str) -> Result<(String, &str, &str)> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.len() < 3 {
        return Err(SysVisError::resolution(path));
    }
    let variable = segments[segments.len() - 1];
    let port = segments[segments.len() - 2];
    let node_path = segments[..segments.len() - 2].join(".");
    Ok((node_path, port, variable))
}

/// Read a variable by full dotted path
pub fn read_variable(root: &dyn SystemNode, path: &str) -> Result<Option<VarValue>> {
    let (node_path, port, variable) = split_variable_path(path)?;
    let node = resolve(root, &node_path)?;
    Ok(node.read(port, variable))
}

/// Replace a variable's value by full dotted path
pub fn write_variable(root: &mut dyn SystemNode, path: &str, value: VarValue) -> Result<()> {
    let (node_path, port, variable) = split_variable_path(path)?;
    let node = resolve_mut(root, &node_path)?;
    node.write(port, variable, value)
}
