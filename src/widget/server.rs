//! Companion server session client
//!
//! The explorer can hand the model off to an external companion server
//! over plain HTTP. Every endpoint answers with a short text body;
//! `"1"` means success and anything else is reported as-is. Transport
//! failures never surface as errors to the UI: they degrade to the
//! literal `"-1"` outcome and a `server_msg` heartbeat.

use serde_json::{json, Value as Json};
use std::time::Duration;
use tracing::debug;

/// Endpoint paths under the companion base URL
pub const URL_START: &str = "server/start";
pub const URL_STOP: &str = "server/stop";
pub const URL_INFO: &str = "server/info";
pub const URL_RUN: &str = "server/run";

/// Body returned on any transport failure
pub const FAILURE_BODY: &str = "-1";

/// An established companion session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSession {
    pub token: String,
    pub base_url: String,
}

/// Blocking HTTP client for the companion protocol
pub struct CompanionClient {
    agent: ureq::Agent,
}

impl Default for CompanionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompanionClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self { agent }
    }

    /// Ask the companion to take over the named model
    pub fn start(
        &self,
        base_url: &str,
        token: &str,
        connection: &str,
        system_name: &str,
    ) -> String {
        self.post(
            base_url,
            URL_START,
            json!({
                "token": token,
                "connection": connection,
                "system_name": system_name,
            }),
        )
    }

    /// Ask the companion to release the session
    pub fn stop(&self, base_url: &str, token: &str) -> String {
        self.post(base_url, URL_STOP, json!({ "token": token }))
    }

    /// Query session status
    pub fn info(&self, base_url: &str, token: &str) -> String {
        self.post(base_url, URL_INFO, json!({ "token": token }))
    }

    /// Trigger a remote run: `parameters` are the variable updates to
    /// apply, `result` names the outputs to report back
    pub fn run(&self, base_url: &str, token: &str, parameters: Json, result: Json) -> String {
        self.post(base_url, URL_RUN, run_payload(token, parameters, result))
    }

    fn post(&self, base_url: &str, path: &str, body: Json) -> String {
        let url = format!("{}{path}", normalize(base_url));
        debug!("Companion POST {url}");
        match self.agent.post(&url).send_json(body) {
            Ok(response) => response
                .into_string()
                .unwrap_or_else(|_| FAILURE_BODY.to_string()),
            Err(e) => {
                debug!("Companion request failed: {e}");
                FAILURE_BODY.to_string()
            }
        }
    }
}

// The companion reads parameters and wanted results from a nested
// "data" object.
fn run_payload(token: &str, parameters: Json, result: Json) -> Json {
    json!({
        "token": token,
        "data": { "parameters": parameters, "result": result },
    })
}

fn normalize(base_url: &str) -> String {
    if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    }
}
