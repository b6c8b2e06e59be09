//! Query parameters.
//!
//! [`Params`] is the name→value mapping handed to the template renderer;
//! [`SqlValue`] is a value after rendering, bound to the statement as a
//! placeholder argument and never spliced into SQL text.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Reserved template variable bound to the output type's column list.
pub const MODEL_FIELDS_PARAM: &str = "_model_fields_";

/// Parameters for a template render, keyed by variable name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Params(serde_json::Map<String, JsonValue>);

impl Params {
    /// Create an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`Params::insert`].
    pub fn set(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, JsonValue>> for Params {
    fn from(map: serde_json::Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, JsonValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Build a [`Params`] map from `key => value` pairs.
///
/// Values go through `serde_json::json!`, so anything serializable works:
///
/// ```
/// use pgtempl::params;
///
/// let p = params! {
///     "user_id" => 1,
///     "tags" => ["new", "active"],
/// };
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut map = $crate::Params::new();
        $( map.insert($key, ::serde_json::json!($value)); )+
        map
    }};
}

/// A bound parameter value for a rendered statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
    /// Structured value, bound as jsonb
    Json(JsonValue),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
        }
    }
}
