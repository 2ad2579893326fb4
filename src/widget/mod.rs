//! Widget-state synchronization protocol
//!
//! The explorer widget and its UI counterpart exchange two kinds of
//! traffic: named state-field updates ([`Outbound::FieldUpdate`]) and
//! scoped messages with optional binary buffers ([`Outbound::Message`]).
//! Inbound traffic is a JSON envelope `{"action": tag, "payload": {…}}`
//! parsed into [`Action`]. Outbound traffic travels over an unbounded
//! crossbeam channel; the embedder drains [`UiReceiver`] and forwards to
//! its transport. The channel must not apply backpressure: the embedder
//! runs on the same thread and only drains after `run()` returns, so
//! every per-step heartbeat and the completion snapshot have to queue.

pub mod components;
pub mod explorer;
pub mod logbuf;
pub mod registry;
pub mod server;
pub mod template;

pub use components::{ComponentRegistry, ComponentToken};
pub use explorer::{GeometrySource, RunState, SysExplorer};
pub use logbuf::LogBuffer;
pub use server::{CompanionClient, ServerSession};

use crate::error::{Result, SysVisError};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Named state fields synchronized with the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    SystemData,
    ComputedData,
    RecorderData,
    DriverData,
    GeoData,
    ProgressGeoUpdate,
    UpdateSignal,
    NotificationMsg,
    ServerMsg,
}

impl StateField {
    /// Wire name of this field
    pub fn name(&self) -> &'static str {
        match self {
            StateField::SystemData => "system_data",
            StateField::ComputedData => "computed_data",
            StateField::RecorderData => "recorder_data",
            StateField::DriverData => "driver_data",
            StateField::GeoData => "geo_data",
            StateField::ProgressGeoUpdate => "progress_geo_update",
            StateField::UpdateSignal => "update_signal",
            StateField::NotificationMsg => "notification_msg",
            StateField::ServerMsg => "server_msg",
        }
    }
}

/// Heartbeat payload carried by `notification_msg` and `server_msg`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub update: u64,
    pub msg: String,
    pub log: String,
}

/// Traffic from the widget to the UI
#[derive(Debug, Clone)]
pub enum Outbound {
    /// One state field changed
    FieldUpdate { field: StateField, value: Json },
    /// Scoped message, optionally with binary buffers
    Message {
        msg_type: String,
        payload: Json,
        buffers: Vec<Vec<u8>>,
    },
}

/// Parsed inbound action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Reset, apply the given variable updates, then run
    RunSignal(BTreeMap<String, Json>),
    /// Push the latest per-step buffer entry
    RequestUpdate,
    /// Start (`signal == true`) or stop the companion server session
    SwitchServer {
        token: String,
        url: String,
        signal: bool,
    },
    /// Force a full completion snapshot
    RequestComputedNotification,
    /// Persist chart template data to disk
    ChartViewerSaveJson { json_name: String, json_data: Json },
    /// Replay buffered geometry to a newly attached view
    RequestInitialGeometry,
    /// Component-scoped action (`"Name::action"` tags)
    Component { action: String, payload: Json },
}

impl Action {
    /// Parse the inbound `{"action": tag, "payload": {…}}` envelope
    pub fn from_content(content: &Json) -> Result<Action> {
        let tag = content
            .get("action")
            .and_then(Json::as_str)
            .ok_or_else(|| SysVisError::Structure("message without 'action' tag".to_string()))?;
        let payload = content.get("payload").cloned().unwrap_or(Json::Null);

        match tag {
            "runSignal" => {
                let updates = payload
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect::<BTreeMap<_, _>>()
                    })
                    .unwrap_or_default();
                Ok(Action::RunSignal(updates))
            }
            "requestUpdate" => Ok(Action::RequestUpdate),
            "switchServer" => {
                let get = |key: &str| {
                    payload.get(key).cloned().ok_or_else(|| {
                        SysVisError::Structure(format!("switchServer payload missing '{key}'"))
                    })
                };
                Ok(Action::SwitchServer {
                    token: get("token")?.as_str().unwrap_or_default().to_string(),
                    url: get("url")?.as_str().unwrap_or_default().to_string(),
                    signal: get("signal")?.as_bool().unwrap_or(false),
                })
            }
            "requestComputedNotification" => Ok(Action::RequestComputedNotification),
            "requestInitialGeometry" => Ok(Action::RequestInitialGeometry),
            "chartViewerSaveJson" => {
                let json_name = payload
                    .get("jsonName")
                    .and_then(Json::as_str)
                    .ok_or_else(|| {
                        SysVisError::Structure(
                            "chartViewerSaveJson payload missing 'jsonName'".to_string(),
                        )
                    })?
                    .to_string();
                let json_data = payload.get("jsonData").cloned().unwrap_or(Json::Null);
                Ok(Action::ChartViewerSaveJson {
                    json_name,
                    json_data,
                })
            }
            other => Ok(Action::Component {
                action: other.to_string(),
                payload,
            }),
        }
    }
}

/// Sender half of the widget→UI channel
#[derive(Debug, Clone)]
pub struct UiChannel {
    sender: Sender<Outbound>,
}

impl UiChannel {
    /// Create a connected channel pair
    pub fn new() -> (UiChannel, UiReceiver) {
        let (sender, receiver) = unbounded();
        (UiChannel { sender }, UiReceiver { receiver })
    }

    /// Push a state-field update; dropped only when the receiver is gone
    pub fn send_field(&self, field: StateField, value: Json) {
        let _ = self.sender.send(Outbound::FieldUpdate { field, value });
    }

    /// Push a scoped message with optional binary buffers
    pub fn send_message(&self, msg_type: impl Into<String>, payload: Json, buffers: Vec<Vec<u8>>) {
        let _ = self.sender.send(Outbound::Message {
            msg_type: msg_type.into(),
            payload,
            buffers,
        });
    }
}

/// Receiver half of the widget→UI channel
#[derive(Debug)]
pub struct UiReceiver {
    receiver: Receiver<Outbound>,
}

impl UiReceiver {
    pub fn try_recv(&self) -> Option<Outbound> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain everything currently queued
    pub fn drain(&self) -> Vec<Outbound> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_recv() {
            messages.push(message);
        }
        messages
    }
}
