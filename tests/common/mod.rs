//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use sysvis_rs::widget::{Outbound, StateField, UiReceiver};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Drain the channel and keep only updates for one state field
pub fn field_updates(ui: &UiReceiver, field: StateField) -> Vec<serde_json::Value> {
    ui.drain()
        .into_iter()
        .filter_map(|message| match message {
            Outbound::FieldUpdate { field: f, value } if f == field => Some(value),
            _ => None,
        })
        .collect()
}

/// Split a drained batch into field updates and scoped messages
pub fn split_traffic(
    messages: Vec<Outbound>,
) -> (
    Vec<(StateField, serde_json::Value)>,
    Vec<(String, serde_json::Value)>,
) {
    let mut fields = Vec::new();
    let mut scoped = Vec::new();
    for message in messages {
        match message {
            Outbound::FieldUpdate { field, value } => fields.push((field, value)),
            Outbound::Message {
                msg_type, payload, ..
            } => scoped.push((msg_type, payload)),
        }
    }
    (fields, scoped)
}
