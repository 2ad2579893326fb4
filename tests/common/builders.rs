//! Test data builders for model graphs

use sysvis_rs::model::memory::{LocalDriver, LocalPort, LocalRecorder, LocalSystem};
use sysvis_rs::model::SharedSimulation;
use sysvis_rs::types::{VarValue, VariableMeta};

/// `root{a{a1}, b}` with a variable on every level
pub fn nested_system() -> LocalSystem {
    LocalSystem::new("root")
        .with_inward("gravity", VarValue::Number(9.81))
        .with_child(
            LocalSystem::new("a").with_child(
                LocalSystem::new("a1").with_port(
                    LocalPort::input("flow")
                        .with_variable("rate", VarValue::Number(1.0))
                        .with_variable("levels", VarValue::Array(vec![1.0, 2.0, 3.0])),
                ),
            ),
        )
        .with_child(LocalSystem::new("b"))
}

/// A runnable model with a recording time driver
pub fn stepped_system(steps: u64) -> SharedSimulation {
    LocalSystem::new("plant")
        .with_inward("gravity", VarValue::Number(9.81))
        .with_child(
            LocalSystem::new("tank").with_port(
                LocalPort::input("flow")
                    .with_variable("rate", VarValue::Number(2.0))
                    .with_variable("levels", VarValue::Array(vec![0.5, 1.5, 2.5]))
                    .with_meta(
                        "rate",
                        VariableMeta {
                            unit: Some("kg/s".to_string()),
                            desc: Some("inlet mass flow".to_string()),
                            ..Default::default()
                        },
                    ),
            ),
        )
        .with_driver(
            LocalDriver::time("transient", steps)
                .with_recorder(LocalRecorder::new(vec!["tank.flow.rate"])),
        )
        .into_shared()
}

/// A static model whose single solver keeps residue history
pub fn solver_system() -> SharedSimulation {
    LocalSystem::new("plant")
        .with_inward("gravity", VarValue::Number(9.81))
        .with_driver(
            LocalDriver::solver("design")
                .with_trace(vec![vec![3.0, 4.0], vec![0.3, 0.4]])
                .with_recorder(LocalRecorder::new(vec!["inwards.gravity"])),
        )
        .into_shared()
}

/// Static JSON description matching the `nested_system` shape
pub fn json_model() -> serde_json::Value {
    serde_json::json!({
        "Systems": {
            "root": {
                "inputs": { "inwards": { "gravity": {} } },
                "outputs": { "outwards": {} },
                "subsystems": {
                    "a": {
                        "inputs": {},
                        "outputs": {},
                        "subsystems": {
                            "a1": {
                                "inputs": { "flow": { "rate": {}, "levels": {} } },
                                "outputs": {}
                            }
                        }
                    },
                    "b": { "inputs": {}, "outputs": {} }
                }
            }
        }
    })
}
