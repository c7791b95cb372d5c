//! Incoming operation request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A named schema operation plus its operation-specific arguments.
///
/// `operation` is kept as a plain string here; it is checked against the
/// closed set of supported operations before anything touches the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OperationRequest {
    /// Operation name: get_info, create_table, alter_table, get_enums or create_enum
    pub operation: String,
    /// Operation-specific named arguments
    #[serde(default)]
    pub parameters: Map<String, JsonValue>,
}

impl OperationRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: Map::new(),
        }
    }

    /// Add one named argument.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}
