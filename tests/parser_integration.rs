//! End-to-end parser tests: discovery, serialization and the
//! capture/reset cycle over live and static sources.

mod common;

use common::assert_float_eq;
use common::builders::{json_model, nested_system, solver_system, stepped_system};
use serde_json::json;
use sysvis_rs::parser::resolver;
use sysvis_rs::types::VarValue;
use sysvis_rs::SystemParser;

#[test]
fn test_flat_map_covers_every_node_exactly_once() {
    let model = nested_system().into_shared();
    let parser = SystemParser::from_simulation(&model).unwrap();
    assert_eq!(
        parser.children_list(),
        vec!["root", "root.a", "root.a.a1", "root.b"]
    );
}

#[test]
fn test_every_flat_path_resolves_back_to_its_node() {
    let model = nested_system().into_shared();
    let parser = SystemParser::from_simulation(&model).unwrap();
    let paths = parser.children_list();
    parser
        .with_node(|root| {
            for path in &paths {
                let node = resolver::resolve(root, path).unwrap();
                assert!(path.ends_with(node.name()), "path {path} vs {}", node.name());
            }
        })
        .unwrap();
}

#[test]
fn test_common_ports_present_on_every_node() {
    let model = nested_system().into_shared();
    let parser = SystemParser::from_simulation(&model).unwrap();
    for record in parser.catalog().records() {
        assert!(
            record.in_ports.contains(&"inwards".to_string()),
            "no inwards on {}",
            record.path
        );
        assert!(
            record.out_ports.contains(&"outwards".to_string()),
            "no outwards on {}",
            record.path
        );
    }
}

#[test]
fn test_live_and_json_discovery_agree_on_structure() {
    let model = nested_system().into_shared();
    let live = SystemParser::from_simulation(&model).unwrap();
    let parsed = SystemParser::from_json(&json_model()).unwrap();
    assert_eq!(live.children_list(), parsed.children_list());
    let live_record = live.catalog().get("root.a.a1").unwrap();
    let json_record = parsed.catalog().get("root.a.a1").unwrap();
    assert_eq!(live_record.port_variables["flow"].len(), 2);
    assert_eq!(
        json_record.port_variables["flow"].len(),
        live_record.port_variables["flow"].len()
    );
}

#[test]
fn test_ndarray_serialization_round_trip() {
    let model = nested_system().into_shared();
    let parser = SystemParser::from_simulation(&model).unwrap();
    let values = parser.serialize_values().unwrap();
    let wire = serde_json::to_value(&values).unwrap();
    assert_eq!(
        wire["root.a.a1.flow.levels"],
        json!(["ndarray", [1.0, 2.0, 3.0]])
    );
}

#[test]
fn test_reset_restores_initial_state_and_is_idempotent() {
    let model = nested_system().into_shared();
    let mut parser = SystemParser::from_simulation(&model).unwrap();

    parser
        .set_variable("root.a.a1", "flow", "rate", VarValue::Number(42.0))
        .unwrap();
    parser.reset_all().unwrap();
    assert_eq!(
        parser.get_value("root.a.a1.flow.rate").unwrap(),
        Some(VarValue::Number(1.0))
    );

    // Second reset changes nothing
    parser.reset_all().unwrap();
    assert_eq!(
        parser.get_value("root.a.a1.flow.rate").unwrap(),
        Some(VarValue::Number(1.0))
    );
    assert_eq!(
        parser.get_value("root.a.a1.flow.levels").unwrap(),
        Some(VarValue::Array(vec![1.0, 2.0, 3.0]))
    );
}

#[test]
fn test_recorder_table_wraps_numeric_scalars() {
    let model = stepped_system(2);
    let parser = SystemParser::from_simulation(&model).unwrap();
    parser.run().unwrap();
    let tables = parser.serialize_recorders().unwrap();
    let table = &tables["plant.transient"];
    assert_eq!(table["tank.flow.rate"], json!([[2.0], [2.0]]));
    assert_eq!(table["Reference"], json!(["0", "1"]));
}

#[test]
fn test_solver_traces_reduce_to_euclidean_norms() {
    let model = solver_system();
    let parser = SystemParser::from_simulation(&model).unwrap();
    let traces = parser.serialize_driver_traces().unwrap();
    let residues = traces["plant.design"]["Residue"].as_array().unwrap();
    assert_float_eq(residues[0].as_f64().unwrap(), 5.0, 1e-12);
    assert_float_eq(residues[1].as_f64().unwrap(), 0.5, 1e-12);
}

#[test]
fn test_bad_paths_are_errors_not_silence() {
    let model = nested_system().into_shared();
    let mut parser = SystemParser::from_simulation(&model).unwrap();
    assert!(parser.get_value("root.missing.flow.rate").is_err());
    assert!(parser
        .set_variable("root.missing", "flow", "rate", VarValue::Number(0.0))
        .is_err());
}

#[test]
fn test_dropped_model_invalidates_parser() {
    let model = stepped_system(2);
    let parser = SystemParser::from_simulation(&model).unwrap();
    drop(model);
    assert!(parser.run().is_err());
    assert!(parser.serialize_values().is_err());
}

#[test]
fn test_json_parser_discovers_but_cannot_run() {
    let parser = SystemParser::from_json(&json_model()).unwrap();
    assert!(!parser.is_live());
    assert!(parser.run().is_err());
    assert!(parser.drivers().is_empty());
    // Structure is intact even without values
    let record = parser.catalog().get("root.a.a1").unwrap();
    assert!(record.port_variables["flow"].contains(&"rate".to_string()));
}

#[test]
fn test_recorder_variables_report_captured_sizes() {
    let model = stepped_system(2);
    let parser = SystemParser::from_simulation(&model).unwrap();
    let (fields, sizes) = parser.recorder_variables("plant", &["transient".to_string()]);
    assert_eq!(fields, vec!["tank.flow.rate"]);
    assert_eq!(sizes, vec![1]);
}
