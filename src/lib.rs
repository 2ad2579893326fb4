//! # SysVis-RS: Simulation System Explorer Backend
//!
//! The backend half of an interactive explorer for hierarchical
//! simulation models: it introspects a system graph into flat and nested
//! views, serializes variable state for a UI, and keeps that UI in sync
//! across run cycles through a small message protocol.
//!
//! ## Architecture
//!
//! - **Model**: adapter traits over the data source; live in-memory
//!   graphs and static JSON descriptions ship in-crate, embedders wrap
//!   their own frameworks behind the same traits
//! - **Parser**: one-shot discovery (tree, drivers, recorders) plus
//!   serialization and mutation over a weakly-held model
//! - **Widget**: the `SysExplorer` state machine speaking the sync
//!   protocol; outbound traffic flows over a crossbeam channel the
//!   embedder drains and forwards to its transport
//!
//! ## Example
//!
//! ```ignore
//! use sysvis_rs::model::memory::{LocalDriver, LocalSystem};
//! use sysvis_rs::types::VarValue;
//! use sysvis_rs::{ExplorerConfig, SysExplorer};
//!
//! let model = LocalSystem::new("plant")
//!     .with_inward("gravity", VarValue::Number(9.81))
//!     .with_driver(LocalDriver::time("transient", 10))
//!     .into_shared();
//!
//! let (mut explorer, ui) = SysExplorer::new(&model, ExplorerConfig::default())?;
//! explorer.push_initial_state()?;
//!
//! // Feed inbound UI messages in…
//! explorer.handle_message(&serde_json::json!({
//!     "action": "runSignal",
//!     "payload": { "plant.inwards.gravity": 1.62 },
//! }))?;
//!
//! // …and drain outbound state updates.
//! for message in ui.drain() {
//!     // forward to the transport
//! }
//! # Ok::<(), sysvis_rs::SysVisError>(())
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod types;
pub mod utils;
pub mod widget;

// Re-export commonly used types
pub use config::{ExplorerConfig, ExplorerMode};
pub use error::{Result, ResultExt, SysVisError};
pub use model::{SharedSimulation, Simulation, SystemNode};
pub use parser::SystemParser;
pub use types::{TaggedValue, VarValue};
pub use widget::{Action, Outbound, StateField, SysExplorer, UiReceiver};
