//! The explorer widget state machine
//!
//! [`SysExplorer`] owns one [`SystemParser`] and drives the full sync
//! cycle with the UI:
//!
//! 1. construction pushes the initial `system_data` snapshot
//! 2. `runSignal` resets captured state, applies the requested variable
//!    updates (including `path[i]` single-element array writes), clears
//!    the step buffer and runs the model
//! 3. each completed step emits a `notification_msg` heartbeat carrying
//!    the log delta, and buffers a geometry frame when a source is set
//! 4. completion re-serializes values, recorders and solver traces,
//!    bumps `update_signal` exactly once and flushes the log
//!
//! A second `runSignal` while a run is in progress is rejected with
//! [`SysVisError::Busy`]; a failed run still flushes partial logs before
//! the error propagates. Dropping the explorer stops any companion
//! server session.

use crate::config::{ExplorerConfig, ExplorerMode};
use crate::error::{Result, SysVisError};
use crate::model::{SharedSimulation, SystemNode};
use crate::parser::{resolver, SystemParser};
use crate::types::{GeometryFrame, VarValue};
use crate::widget::components::{ComponentRegistry, ComponentToken, ComputedCallback, MessageHandler};
use crate::widget::logbuf::LogBuffer;
use crate::widget::server::{CompanionClient, ServerSession};
use crate::widget::template::{self, ChartTemplate};
use crate::widget::{Action, Notification, StateField, UiChannel, UiReceiver};
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Callback extracting a geometry frame from the current graph state
pub type GeometrySource = Box<dyn FnMut(&dyn SystemNode) -> GeometryFrame + Send>;

/// Execution state of the explorer's model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Explorer widget backend: protocol state machine over one parser
pub struct SysExplorer {
    parser: SystemParser,
    config: ExplorerConfig,
    ui: UiChannel,
    components: ComponentRegistry,
    log: LogBuffer,
    geometry: Option<GeometrySource>,
    template: Option<ChartTemplate>,
    save_dir: PathBuf,
    client: CompanionClient,
    session: Option<ServerSession>,
    connection_info: String,
    state: RunState,
    update_signal: u64,
    notification_count: u64,
    server_msg_count: u64,
    /// Geometry frames captured per completed step; kept after the run
    /// so `requestUpdate` can replay the latest entry at any time
    step_buffer: BTreeMap<u64, GeometryFrame>,
}

impl SysExplorer {
    /// Build an explorer over a live model
    pub fn new(model: &SharedSimulation, config: ExplorerConfig) -> Result<(SysExplorer, UiReceiver)> {
        let parser = SystemParser::from_simulation(model)?;
        Ok(Self::from_parser(parser, config))
    }

    /// Build an explorer over a static JSON model description
    pub fn from_json(data: &Json, mut config: ExplorerConfig) -> Result<(SysExplorer, UiReceiver)> {
        config.mode = ExplorerMode::Edit;
        let parser = SystemParser::from_json(data)?;
        Ok(Self::from_parser(parser, config))
    }

    fn from_parser(parser: SystemParser, config: ExplorerConfig) -> (SysExplorer, UiReceiver) {
        let (ui, receiver) = UiChannel::new();
        let save_dir = if config.save_dir.is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&config.save_dir)
        };
        let explorer = SysExplorer {
            parser,
            config,
            ui,
            components: ComponentRegistry::new(),
            log: LogBuffer::new(),
            geometry: None,
            template: None,
            save_dir,
            client: CompanionClient::new(),
            session: None,
            connection_info: String::new(),
            state: RunState::Idle,
            update_signal: 0,
            notification_count: 0,
            server_msg_count: 0,
            step_buffer: BTreeMap::new(),
        };
        (explorer, receiver)
    }

    /// Attach a geometry extraction callback
    pub fn with_geometry(mut self, source: GeometrySource) -> Self {
        self.geometry = Some(source);
        self
    }

    /// Load a chart template to seed the UI layout
    pub fn with_template(mut self, path: &std::path::Path) -> Result<Self> {
        self.template = Some(ChartTemplate::load(path)?);
        Ok(self)
    }

    /// Connection descriptor forwarded to the companion server
    pub fn with_connection_info(mut self, info: impl Into<String>) -> Self {
        self.connection_info = info.into();
        self
    }

    pub fn parser(&self) -> &SystemParser {
        &self.parser
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn update_signal(&self) -> u64 {
        self.update_signal
    }

    pub fn session(&self) -> Option<&ServerSession> {
        self.session.as_ref()
    }

    pub fn template(&self) -> Option<&ChartTemplate> {
        self.template.as_ref()
    }

    /// Handle to the log sink; wire it into a `tracing` subscriber so
    /// run output reaches the heartbeats
    pub fn log_buffer(&self) -> LogBuffer {
        self.log.clone()
    }

    /// Register a sub-view component by unique name
    pub fn register_component(
        &mut self,
        name: impl Into<String>,
        on_message: Option<MessageHandler>,
        on_computed: Option<ComputedCallback>,
    ) -> Result<ComponentToken> {
        self.components.register(name, on_message, on_computed)
    }

    /// Push the initial `system_data` snapshot (and the initial geometry
    /// frame when a source is set); honors `auto_run`
    pub fn push_initial_state(&mut self) -> Result<()> {
        let system_data = self.build_system_data()?;
        self.ui.send_field(StateField::SystemData, system_data);

        if self.parser.is_live() {
            if let Some(source) = self.geometry.as_mut() {
                let frame = self.parser.with_node(|node| source(node))?;
                if !frame.is_empty() {
                    self.ui.send_field(
                        StateField::GeoData,
                        json!({ "0": frame.threejs_data.clone() }),
                    );
                    self.step_buffer.insert(0, frame);
                }
            }
        }

        if self.config.auto_run && self.parser.is_live() {
            self.run_model()?;
        }
        Ok(())
    }

    /// Parse and handle one inbound message envelope
    pub fn handle_message(&mut self, content: &Json) -> Result<()> {
        let action = Action::from_content(content)?;
        self.handle_action(action)
    }

    /// Handle a parsed action, then fan it out to registered components
    pub fn handle_action(&mut self, action: Action) -> Result<()> {
        debug!("Handling action {action:?}");
        let result = match action.clone() {
            Action::RunSignal(updates) => self.on_run_signal(updates),
            Action::RequestUpdate => {
                self.on_request_update();
                Ok(())
            }
            Action::SwitchServer { token, url, signal } => {
                if signal {
                    self.start_server(token, url);
                } else {
                    self.stop_server();
                }
                Ok(())
            }
            Action::RequestComputedNotification => self.computed_notification(),
            Action::ChartViewerSaveJson {
                json_name,
                json_data,
            } => self.on_save_json(&json_name, &json_data),
            Action::RequestInitialGeometry => self.send_initial_geometry(),
            Action::Component { .. } => Ok(()),
        };
        self.components.dispatch(&action, &self.ui);
        result
    }

    fn on_run_signal(&mut self, updates: BTreeMap<String, Json>) -> Result<()> {
        if self.state == RunState::Running {
            return Err(SysVisError::Busy);
        }
        self.parser.reset_all()?;
        if !updates.is_empty() && !self.config.enable_edit {
            warn!("Variable edits are disabled; ignoring {} updates", updates.len());
        } else {
            for (key, value) in updates {
                self.apply_update(&key, value)?;
            }
        }
        self.run_model()
    }

    /// Apply one `runSignal` update; `path[i]` keys replace a single
    /// array element by read-modify-write
    fn apply_update(&mut self, key: &str, value: Json) -> Result<()> {
        if let Some((base, index)) = parse_indexed(key) {
            let current = self
                .parser
                .get_value(&base)?
                .ok_or_else(|| SysVisError::resolution(&base))?;
            let VarValue::Array(mut items) = current else {
                return Err(SysVisError::Structure(format!(
                    "indexed update on non-array '{base}'"
                )));
            };
            if index >= items.len() {
                return Err(SysVisError::Structure(format!(
                    "index {index} out of bounds for '{base}' (len {})",
                    items.len()
                )));
            }
            items[index] = value.as_f64().ok_or_else(|| {
                SysVisError::Serialization(format!("non-numeric element for '{base}'"))
            })?;
            let (node_path, port, variable) = resolver::split_variable_path(&base)?;
            self.parser
                .set_variable(&node_path, port, variable, VarValue::Array(items))
        } else {
            let (node_path, port, variable) = resolver::split_variable_path(key)?;
            self.parser
                .set_variable(&node_path, port, variable, VarValue::from_json(&value))
        }
    }

    fn run_model(&mut self) -> Result<()> {
        if self.state == RunState::Running {
            return Err(SysVisError::Busy);
        }
        self.state = RunState::Running;
        self.step_buffer.clear();
        debug!("Run started for '{}'", self.parser.root_name());

        let result = {
            let geometry = &mut self.geometry;
            let buffer = &mut self.step_buffer;
            let counter = &mut self.notification_count;
            let log = self.log.clone();
            let ui = self.ui.clone();
            self.parser.run_with(&mut |step, node| {
                if let Some(source) = geometry.as_mut() {
                    buffer.insert(step, source(node));
                }
                *counter += 1;
                let note = Notification {
                    update: *counter,
                    msg: format!("Computed step {step}"),
                    log: log.delta(),
                };
                ui.send_field(StateField::NotificationMsg, note_json(&note));
            })
        };
        self.state = RunState::Idle;

        match result {
            Ok(()) => self.computed_notification(),
            Err(e) => {
                // Flush whatever the run logged before it failed
                let log = self.log.take_all();
                self.notification_count += 1;
                let note = Notification {
                    update: self.notification_count,
                    msg: "Run failed".to_string(),
                    log,
                };
                self.ui
                    .send_field(StateField::NotificationMsg, note_json(&note));
                Err(e)
            }
        }
    }

    /// Completion snapshot: re-serialize everything, bump the update
    /// signal once and flush the captured log
    pub fn computed_notification(&mut self) -> Result<()> {
        if self.step_buffer.is_empty() && self.parser.is_live() {
            if let Some(source) = self.geometry.as_mut() {
                // Static model: capture a single frame now
                let frame = self.parser.with_node(|node| source(node))?;
                if !frame.is_empty() {
                    self.step_buffer.insert(0, frame);
                }
            }
        }

        let computed = self.parser.serialize_values()?;
        let recorders = self.parser.serialize_recorders()?;
        let traces = self.parser.serialize_driver_traces()?;
        self.ui.send_field(
            StateField::ComputedData,
            serde_json::to_value(&computed).unwrap_or(Json::Null),
        );
        self.ui.send_field(
            StateField::RecorderData,
            serde_json::to_value(&recorders).unwrap_or(Json::Null),
        );
        self.ui.send_field(
            StateField::DriverData,
            serde_json::to_value(&traces).unwrap_or(Json::Null),
        );

        let geo: serde_json::Map<String, Json> = self
            .step_buffer
            .iter()
            .map(|(step, frame)| (step.to_string(), frame.threejs_data.clone()))
            .collect();
        self.ui.send_field(StateField::GeoData, Json::Object(geo));

        self.update_signal += 1;
        self.ui
            .send_field(StateField::UpdateSignal, json!(self.update_signal));

        let server_log = self.log.take_all();
        self.ui.send_message(
            "Controller::update_signal",
            json!({ "server_log": server_log }),
            Vec::new(),
        );

        self.components.notify_computed(&self.ui);
        Ok(())
    }

    /// Push the latest step-buffer entry; a no-op when nothing is buffered
    fn on_request_update(&self) {
        if let Some((step, frame)) = self.step_buffer.iter().next_back() {
            self.ui.send_field(
                StateField::ProgressGeoUpdate,
                json!({ "data": frame.threejs_data, "time_step": step }),
            );
        }
    }

    /// Hand the model off to a companion server
    pub fn start_server(&mut self, token: String, base_url: String) {
        if self.session.is_some() {
            return;
        }
        let body = self.client.start(
            &base_url,
            &token,
            &self.connection_info,
            self.parser.root_name(),
        );
        if body == "1" {
            self.session = Some(ServerSession { token, base_url });
            self.push_server_msg("ok", String::new());
        } else {
            self.push_server_msg("error", body);
        }
    }

    /// Release the companion session; silently does nothing without one
    pub fn stop_server(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let body = self.client.stop(&session.base_url, &session.token);
        if body == "1" {
            self.session = None;
            self.push_server_msg("ok", String::new());
        } else {
            self.push_server_msg("error", body);
        }
    }

    /// Timestamped status line for the server panel
    pub fn update_server_log(&mut self, msg: &str) {
        let now = chrono::Local::now().format("[%H:%M:%S]");
        self.push_server_msg("update", format!("{now} {msg} \n"));
    }

    fn push_server_msg(&mut self, msg: &str, log: String) {
        self.server_msg_count += 1;
        let note = Notification {
            update: self.server_msg_count,
            msg: msg.to_string(),
            log,
        };
        self.ui.send_field(StateField::ServerMsg, note_json(&note));
    }

    fn on_save_json(&mut self, json_name: &str, json_data: &Json) -> Result<()> {
        let path = template::save_json(&self.save_dir, json_name, json_data)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let renamed = self
            .template
            .as_ref()
            .map(|t| t.stem != stem)
            .unwrap_or(true);
        if renamed {
            self.ui.send_message(
                "SysExplorer::update_save_path",
                json!({ "templatePath": stem }),
                Vec::new(),
            );
        }
        Ok(())
    }

    /// Replay buffered geometry to a newly attached view
    pub fn send_initial_geometry(&mut self) -> Result<()> {
        if !self.step_buffer.is_empty() {
            let total = self.step_buffer.len();
            for (i, (step, frame)) in self.step_buffer.iter().enumerate() {
                self.ui.send_message(
                    "GeometryView::geo_data",
                    json!({
                        "threejs_data": frame.threejs_data,
                        "binary_position": frame.binary_position,
                        "time_step": step,
                        "remaining": total - i - 1,
                    }),
                    frame.buffers.clone(),
                );
            }
            return Ok(());
        }
        if self.parser.is_live() {
            if let Some(source) = self.geometry.as_mut() {
                let frame = self.parser.with_node(|node| source(node))?;
                if !frame.is_empty() {
                    self.ui.send_message(
                        "GeometryView::geo_data",
                        json!({
                            "threejs_data": frame.threejs_data,
                            "binary_position": frame.binary_position,
                            "time_step": 0,
                            "remaining": 0,
                        }),
                        frame.buffers,
                    );
                }
            }
        }
        Ok(())
    }

    /// Assemble the composite `system_data` snapshot
    fn build_system_data(&self) -> Result<Json> {
        let system_list = self.parser.children_list();
        let in_ports = self.parser.children_in_port();
        let out_ports = self.parser.children_out_port();

        let graph_data = self.parser.with_node(|root| {
            let mut graph = serde_json::Map::new();
            for path in &system_list {
                let connections = resolver::resolve(root, path)
                    .map(|node| node.connections())
                    .unwrap_or_default();
                graph.insert(
                    path.clone(),
                    json!({
                        "inPort": in_ports.get(path).cloned().unwrap_or_default(),
                        "outPort": out_ports.get(path).cloned().unwrap_or_default(),
                        "connections": connections,
                    }),
                );
            }
            Json::Object(graph)
        })?;

        let variable_data = self.parser.with_node(|root| {
            let mut variables = serde_json::Map::new();
            for record in self.parser.catalog().records() {
                let Ok(node) = resolver::resolve(root, &record.path) else {
                    continue;
                };
                for (port, names) in &record.port_variables {
                    for name in names {
                        if !node.is_free_input(port, name) {
                            continue;
                        }
                        let Some(value) = node.read(port, name).and_then(|v| v.to_json()) else {
                            continue;
                        };
                        let meta = node.variable_meta(port, name);
                        let mut entry = serde_json::to_value(&meta).unwrap_or(json!({}));
                        if let Some(map) = entry.as_object_mut() {
                            map.insert("value".to_string(), value);
                        }
                        variables.insert(format!("{}.{port}.{name}", record.path), entry);
                    }
                }
            }
            Json::Object(variables)
        })?;

        let (computed, recorders, traces) =
            if self.config.mode == ExplorerMode::Run && self.parser.is_live() {
                (
                    serde_json::to_value(self.parser.serialize_values()?).unwrap_or(Json::Null),
                    serde_json::to_value(self.parser.serialize_recorders()?).unwrap_or(Json::Null),
                    serde_json::to_value(self.parser.serialize_driver_traces()?)
                        .unwrap_or(Json::Null),
                )
            } else {
                (json!({}), json!({}), json!({}))
            };

        Ok(json!({
            "systemGraph": {
                "systemGraphData": graph_data,
                "systemList": system_list,
                "graphJsonData": {},
            },
            "systemPBS": {},
            "systemTree": serde_json::to_value(self.parser.tree()).unwrap_or(Json::Null),
            "portMetaData": serde_json::to_value(self.parser.port_meta()?).unwrap_or(Json::Null),
            "variableData": variable_data,
            "computedResult": computed,
            "recorderData": recorders,
            "driverData": traces,
        }))
    }
}

impl Drop for SysExplorer {
    fn drop(&mut self) {
        self.stop_server();
    }
}

fn note_json(note: &Notification) -> Json {
    serde_json::to_value(note).unwrap_or(Json::Null)
}

/// Split a `path[i]` key into its base path and element index
fn parse_indexed(key: &str) -> Option<(String, usize)> {
    let open = key.find('[')?;
    let close = key.rfind(']')?;
    if close != key.len() - 1 || close <= open {
        return None;
    }
    let index: usize = key[open + 1..close].parse().ok()?;
    Some((key[..open].to_string(), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indexed() {
        assert_eq!(
            parse_indexed("root.flow.levels[2]"),
            Some(("root.flow.levels".to_string(), 2))
        );
        assert_eq!(parse_indexed("root.flow.levels"), None);
        assert_eq!(parse_indexed("root.flow.levels[x]"), None);
        assert_eq!(parse_indexed("root.flow.levels[1]extra"), None);
    }
}
