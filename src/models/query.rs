//! Query parameter and result row types.

use serde_json::Value as JsonValue;

/// One result row: column name to decoded value.
pub type QueryRow = serde_json::Map<String, JsonValue>;

/// A value bound to a placeholder of an introspection query.
///
/// Catalog lookups only ever filter on names, so a parameter is either a
/// string or SQL NULL (an omitted schema or enum name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Null,
    String(String),
}

impl QueryParam {
    /// Bind an optional string: `None` becomes SQL NULL.
    pub fn optional(value: Option<&str>) -> Self {
        value.map_or(Self::Null, Self::from)
    }

    /// The bound value as drivers take it.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Null => None,
            Self::String(s) => Some(s),
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_param() {
        assert_eq!(QueryParam::optional(None), QueryParam::Null);
        assert_eq!(
            QueryParam::optional(Some("public")),
            QueryParam::String("public".to_string())
        );
    }

    #[test]
    fn test_as_str() {
        assert_eq!(QueryParam::Null.as_str(), None);
        assert_eq!(QueryParam::from("users").as_str(), Some("users"));
    }
}
