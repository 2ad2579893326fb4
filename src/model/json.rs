//! Static JSON tree adapter
//!
//! [`JsonSystem`] exposes a serialized model description as a read-only
//! [`SystemNode`] graph so the discovery layer works identically on live
//! objects and exported files. Expected input shape:
//!
//! ```json
//! { "Systems": { "root": {
//!     "inputs":  { "flow": { "rate": {} }, "__class__": "…" },
//!     "outputs": { "state": { "level": {} } },
//!     "subsystems": { "child": { … } }
//! } } }
//! ```

use crate::error::{Result, SysVisError};
use crate::model::{DriverNode, SystemNode};
use crate::types::{PortDirection, PortInfo, VarValue};
use serde_json::Value as Json;

const CLASS_KEY: &str = "__class__";

/// A read-only system node backed by a JSON description
#[derive(Debug, Clone)]
pub struct JsonSystem {
    name: String,
    inputs: Vec<(String, Vec<String>)>,
    outputs: Vec<(String, Vec<String>)>,
    children: Vec<JsonSystem>,
}

impl JsonSystem {
    /// Parse the top-level `{"Systems": {name: body}}` document
    pub fn from_value(data: &Json) -> Result<JsonSystem> {
        let systems = data
            .get("Systems")
            .and_then(Json::as_object)
            .ok_or_else(|| {
                SysVisError::Structure("missing 'Systems' object in JSON model".to_string())
            })?;
        let (name, body) = systems.iter().next().ok_or_else(|| {
            SysVisError::Structure("'Systems' object is empty".to_string())
        })?;
        Self::parse_node(name, body)
    }

    fn parse_node(name: &str, body: &Json) -> Result<JsonSystem> {
        let mut children = Vec::new();
        if let Some(subsystems) = body.get("subsystems").and_then(Json::as_object) {
            for (child_name, child_body) in subsystems {
                children.push(Self::parse_node(child_name, child_body)?);
            }
        }
        Ok(JsonSystem {
            name: name.to_string(),
            inputs: Self::parse_ports(body.get("inputs")),
            outputs: Self::parse_ports(body.get("outputs")),
            children,
        })
    }

    fn parse_ports(section: Option<&Json>) -> Vec<(String, Vec<String>)> {
        let Some(ports) = section.and_then(Json::as_object) else {
            return Vec::new();
        };
        ports
            .iter()
            .filter(|(name, _)| name.as_str() != CLASS_KEY)
            .map(|(name, variables)| {
                let names = variables
                    .as_object()
                    .map(|vars| {
                        vars.keys()
                            .filter(|k| k.as_str() != CLASS_KEY)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                (name.clone(), names)
            })
            .collect()
    }
}

impl SystemNode for JsonSystem {
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
        let mut ports = Vec::new();
        for (name, variables) in &self.inputs {
            ports.push(PortInfo::new(name.clone(), PortDirection::In).with_variables(variables.clone()));
        }
        for (name, variables) in &self.outputs {
            ports.push(PortInfo::new(name.clone(), PortDirection::Out).with_variables(variables.clone()));
        }
        Ok(ports)
    }

    fn read(&self, _port: &str, _variable: &str) -> Option<VarValue> {
        // The JSON description carries structure only, no values.
        None
    }

    fn write(&mut self, port: &str, variable: &str, _value: VarValue) -> Result<()> {
        Err(SysVisError::ReadOnly(format!(
            "{}.{port}.{variable}",
            self.name
        )))
    }

    fn drivers(&self) -> Vec<&dyn DriverNode> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Json {
        json!({
            "Systems": {
                "plant": {
                    "inputs": {
                        "__class__": "Plant",
                        "inwards": { "gravity": {} }
                    },
                    "outputs": {
                        "outwards": {}
                    },
                    "subsystems": {
                        "tank": {
                            "inputs": { "flow": { "rate": {}, "__class__": "Flow" } },
                            "outputs": {}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_tree() {
        let sys = JsonSystem::from_value(&sample()).unwrap();
        assert_eq!(sys.name(), "plant");
        assert_eq!(sys.child_names(), vec!["tank"]);
        let tank = sys.child("tank").unwrap();
        let ports = tank.ports().unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "flow");
        assert_eq!(ports[0].variables, vec!["rate"]);
    }

    #[test]
    fn test_class_key_filtered() {
        let sys = JsonSystem::from_value(&sample()).unwrap();
        let ports = sys.ports().unwrap();
        assert!(ports.iter().all(|p| p.name != CLASS_KEY));
        let inwards = ports.iter().find(|p| p.name == "inwards").unwrap();
        assert_eq!(inwards.variables, vec!["gravity"]);
    }

    #[test]
    fn test_read_only() {
        let mut sys = JsonSystem::from_value(&sample()).unwrap();
        assert_eq!(sys.read("inwards", "gravity"), None);
        assert!(matches!(
            sys.write("inwards", "gravity", VarValue::Number(0.0)),
            Err(SysVisError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_missing_systems_key() {
        let err = JsonSystem::from_value(&json!({"foo": 1})).unwrap_err();
        assert!(err.to_string().contains("Systems"));
    }
}
