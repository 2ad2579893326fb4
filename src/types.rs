//! Core data types for SysVis-RS
//!
//! This module contains the fundamental data structures used throughout
//! the crate for representing variables, ports, and their serialized forms.
//!
//! # Main Types
//!
//! - [`VarValue`] - Closed tagged variant of supported variable values
//! - [`TaggedValue`] - The `[typename, value]` pair every variable takes on
//!   the wire
//! - [`PortInfo`] - A declared port with its variable names
//! - [`RecorderTable`] - Column-oriented recorder output
//! - [`VariableSnapshot`] - Deep copy of a variable taken at construction
//!   time, used by the reset cycle
//!
//! # Value Model
//!
//! Adapters map whatever their backing model holds onto [`VarValue`]:
//! scalars and text map directly, numeric arrays become
//! [`VarValue::Array`] (reported as `"ndarray"` on the wire), structured
//! data falls back to [`VarValue::Json`], and anything with no JSON
//! representation becomes [`VarValue::Opaque`] carrying only its runtime
//! type name. Opaque values serialize to the [`NON_JSONABLE`] sentinel.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Name of the conventional pseudo-port holding orphan input variables
pub const COMMON_IN_PORT: &str = "inwards";

/// Name of the conventional pseudo-port holding orphan output variables
pub const COMMON_OUT_PORT: &str = "outwards";

/// Sentinel placed on the wire for values with no JSON representation
pub const NON_JSONABLE: &str = "non-jsonable";

/// Direction of a port relative to its owning node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

/// Broad classification of a variable value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Text,
    Enum,
    Array,
    Json,
    Opaque,
}

/// A variable value as read from a data source
///
/// The set of variants is closed; adapters never hand out anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Number(f64),
    Integer(i64),
    Bool(bool),
    Text(String),
    /// A value constrained to a finite set of options
    Enum { value: String, options: Vec<String> },
    /// A numeric array, reported on the wire as `"ndarray"`
    Array(Vec<f64>),
    /// Arbitrary structured data already in JSON form
    Json(Json),
    /// A non-serializable value; the payload is its runtime type name
    Opaque(String),
}

impl VarValue {
    /// Returns the broad classification of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            VarValue::Number(_) | VarValue::Integer(_) | VarValue::Bool(_) => ValueKind::Number,
            VarValue::Text(_) => ValueKind::Text,
            VarValue::Enum { .. } => ValueKind::Enum,
            VarValue::Array(_) => ValueKind::Array,
            VarValue::Json(_) => ValueKind::Json,
            VarValue::Opaque(_) => ValueKind::Opaque,
        }
    }

    /// Runtime type name used to tag wire values
    pub fn type_name(&self) -> &str {
        match self {
            VarValue::Number(_) => "float",
            VarValue::Integer(_) => "int",
            VarValue::Bool(_) => "bool",
            VarValue::Text(_) => "str",
            VarValue::Enum { .. } => "enum",
            VarValue::Array(_) => "ndarray",
            VarValue::Json(json) => match json {
                Json::Null => "NoneType",
                Json::Bool(_) => "bool",
                Json::Number(_) => "float",
                Json::String(_) => "str",
                Json::Array(_) => "list",
                Json::Object(_) => "dict",
            },
            VarValue::Opaque(name) => name,
        }
    }

    /// Element count: array length, or 1 for scalars
    pub fn size(&self) -> usize {
        match self {
            VarValue::Array(values) => values.len(),
            VarValue::Json(Json::Array(values)) => values.len(),
            _ => 1,
        }
    }

    /// Returns true for numeric scalar values (recorder cells wrap these
    /// in singleton arrays)
    pub fn is_numeric_scalar(&self) -> bool {
        matches!(
            self,
            VarValue::Number(_) | VarValue::Integer(_) | VarValue::Bool(_)
        )
    }

    /// JSON representation, or `None` for opaque values
    pub fn to_json(&self) -> Option<Json> {
        match self {
            VarValue::Number(n) => Some(json_f64(*n)),
            VarValue::Integer(n) => Some(Json::from(*n)),
            VarValue::Bool(b) => Some(Json::Bool(*b)),
            VarValue::Text(s) => Some(Json::String(s.clone())),
            VarValue::Enum { value, .. } => Some(Json::String(value.clone())),
            VarValue::Array(values) => {
                Some(Json::Array(values.iter().map(|v| json_f64(*v)).collect()))
            }
            VarValue::Json(json) => Some(json.clone()),
            VarValue::Opaque(_) => None,
        }
    }

    /// Map an incoming JSON payload onto a variable value
    ///
    /// Arrays whose elements are all numbers become [`VarValue::Array`];
    /// everything else structured stays JSON.
    pub fn from_json(json: &Json) -> VarValue {
        match json {
            Json::Bool(b) => VarValue::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    VarValue::Integer(i)
                } else {
                    VarValue::Number(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => VarValue::Text(s.clone()),
            Json::Array(items) => {
                let numbers: Option<Vec<f64>> = items.iter().map(Json::as_f64).collect();
                match numbers {
                    Some(values) => VarValue::Array(values),
                    None => VarValue::Json(json.clone()),
                }
            }
            _ => VarValue::Json(json.clone()),
        }
    }
}

fn json_f64(n: f64) -> Json {
    serde_json::Number::from_f64(n)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}

/// Wire pair `[typename, value]` used for every serialized variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedValue(pub String, pub Json);

impl TaggedValue {
    /// Tag a value with its runtime type name. Opaque values keep their
    /// type name but carry the [`NON_JSONABLE`] sentinel as payload.
    pub fn of(value: &VarValue) -> TaggedValue {
        let payload = value
            .to_json()
            .unwrap_or_else(|| Json::String(NON_JSONABLE.to_string()));
        TaggedValue(value.type_name().to_string(), payload)
    }
}

/// A declared port with its variable names, in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    pub name: String,
    pub direction: PortDirection,
    pub variables: Vec<String>,
}

impl PortInfo {
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            variables: Vec::new(),
        }
    }

    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = variables;
        self
    }
}

/// Descriptive metadata attached to a single variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<(f64, f64)>,
}

/// Column-oriented recorder output: column name to one cell per record
pub type RecorderTable = BTreeMap<String, Vec<VarValue>>;

/// Deep copy of a variable taken at construction time, used for resets
#[derive(Debug, Clone)]
pub struct VariableSnapshot {
    /// Full dotted path, root name included
    pub path: String,
    /// Element count at capture time
    pub size: usize,
    /// Captured value; `None` when the variable was unreadable
    pub value: Option<VarValue>,
}

/// One captured geometry payload: JSON scene data plus binary buffers
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeometryFrame {
    pub threejs_data: Json,
    pub binary_position: Vec<usize>,
    #[serde(skip)]
    pub buffers: Vec<Vec<u8>>,
}

impl GeometryFrame {
    /// Whether this frame carries any scene data
    pub fn is_empty(&self) -> bool {
        match &self.threejs_data {
            Json::Null => true,
            Json::Array(items) => items.is_empty(),
            Json::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}
