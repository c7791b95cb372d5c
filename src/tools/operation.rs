//! The closed set of schema operations and their typed parameters.
//!
//! A request's `operation` string is resolved to a [`SchemaOperation`] and its
//! `parameters` object is decoded into the matching parameter struct. Both
//! steps only look at the request, never at the database.

use crate::error::{DbError, DbResult};
use crate::models::OperationRequest;
use crate::tools::format::OutputFormat;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::fmt;

/// Supported schema operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaOperation {
    GetInfo,
    CreateTable,
    AlterTable,
    GetEnums,
    CreateEnum,
}

impl SchemaOperation {
    pub const ALL: [SchemaOperation; 5] = [
        Self::GetInfo,
        Self::CreateTable,
        Self::AlterTable,
        Self::GetEnums,
        Self::CreateEnum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetInfo => "get_info",
            Self::CreateTable => "create_table",
            Self::AlterTable => "alter_table",
            Self::GetEnums => "get_enums",
            Self::CreateEnum => "create_enum",
        }
    }

    /// Whether the operation changes the schema.
    pub fn is_ddl(&self) -> bool {
        matches!(self, Self::CreateTable | Self::AlterTable | Self::CreateEnum)
    }

    /// Resolve an operation name. Names are matched exactly.
    pub fn parse(name: &str) -> DbResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| DbError::unsupported_operation(name, &Self::names()))
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(SchemaOperation::name).collect()
    }
}

impl fmt::Display for SchemaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_true() -> bool {
    true
}

/// Parameters of `get_info`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetInfoParams {
    /// Table to describe. Without it, the schema's tables are listed.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Schema to inspect (PostgreSQL defaults to "public", MySQL to the current database)
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// One column of a `create_table` request.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ColumnSpec {
    pub name: String,
    /// SQL data type, e.g. "varchar(255)" or "integer"
    #[serde(alias = "type")]
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Default value as a SQL expression, e.g. "0" or "now()"
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

/// Parameters of `create_table`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableParams {
    pub table_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub if_not_exists: bool,
}

/// One change of an `alter_table` request.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AlterChange {
    Add {
        column_name: String,
        #[serde(alias = "type")]
        data_type: String,
        #[serde(default = "default_true")]
        nullable: bool,
        #[serde(default)]
        default: Option<String>,
    },
    /// Unset fields stay as they are, except on MySQL: a `data_type` change
    /// there rewrites the whole column and needs `nullable` plus `default`
    /// or `drop_default`.
    Alter {
        column_name: String,
        #[serde(default, alias = "type")]
        data_type: Option<String>,
        #[serde(default)]
        nullable: Option<bool>,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        drop_default: bool,
    },
    Drop {
        column_name: String,
        #[serde(default)]
        cascade: bool,
    },
}

impl AlterChange {
    pub fn column_name(&self) -> &str {
        match self {
            Self::Add { column_name, .. }
            | Self::Alter { column_name, .. }
            | Self::Drop { column_name, .. } => column_name,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Alter { .. } => "alter",
            Self::Drop { .. } => "drop",
        }
    }
}

/// Parameters of `alter_table`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AlterTableParams {
    pub table_name: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Changes applied in order, one statement each
    pub operations: Vec<AlterChange>,
}

/// Parameters of `get_enums`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GetEnumsParams {
    #[serde(default)]
    pub schema: Option<String>,
    /// Only report this enum type
    #[serde(default)]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Parameters of `create_enum`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateEnumParams {
    pub enum_name: String,
    /// Labels in declaration order
    pub values: Vec<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub if_not_exists: bool,
}

/// A request whose operation and parameters have both been checked.
#[derive(Debug, Clone)]
pub enum SchemaCommand {
    GetInfo(GetInfoParams),
    CreateTable(CreateTableParams),
    AlterTable(AlterTableParams),
    GetEnums(GetEnumsParams),
    CreateEnum(CreateEnumParams),
}

impl SchemaCommand {
    /// Resolve the operation, then decode and check its parameters.
    pub fn from_request(request: &OperationRequest) -> DbResult<Self> {
        let operation = SchemaOperation::parse(&request.operation)?;
        Self::decode(operation, &request.parameters)
    }

    pub fn decode(operation: SchemaOperation, parameters: &Map<String, JsonValue>) -> DbResult<Self> {
        let command = match operation {
            SchemaOperation::GetInfo => Self::GetInfo(decode_params(operation, parameters)?),
            SchemaOperation::CreateTable => {
                Self::CreateTable(decode_params(operation, parameters)?)
            }
            SchemaOperation::AlterTable => Self::AlterTable(decode_params(operation, parameters)?),
            SchemaOperation::GetEnums => Self::GetEnums(decode_params(operation, parameters)?),
            SchemaOperation::CreateEnum => Self::CreateEnum(decode_params(operation, parameters)?),
        };
        command.validate()?;
        Ok(command)
    }

    pub fn operation(&self) -> SchemaOperation {
        match self {
            Self::GetInfo(_) => SchemaOperation::GetInfo,
            Self::CreateTable(_) => SchemaOperation::CreateTable,
            Self::AlterTable(_) => SchemaOperation::AlterTable,
            Self::GetEnums(_) => SchemaOperation::GetEnums,
            Self::CreateEnum(_) => SchemaOperation::CreateEnum,
        }
    }

    fn validate(&self) -> DbResult<()> {
        match self {
            Self::GetInfo(params) => {
                check_optional_identifier("schema", params.schema.as_deref())?;
                check_optional_identifier("table_name", params.table_name.as_deref())
            }
            Self::CreateTable(params) => {
                check_identifier("table_name", &params.table_name)?;
                check_optional_identifier("schema", params.schema.as_deref())?;
                if params.columns.is_empty() {
                    return Err(DbError::invalid_input(
                        "create_table requires at least one column",
                    ));
                }
                let mut seen = HashSet::new();
                for column in &params.columns {
                    check_identifier("column name", &column.name)?;
                    check_fragment("data_type", &column.data_type)?;
                    if let Some(default) = &column.default {
                        check_fragment("default", default)?;
                    }
                    if !seen.insert(column.name.as_str()) {
                        return Err(DbError::invalid_input(format!(
                            "Duplicate column '{}'",
                            column.name
                        )));
                    }
                }
                Ok(())
            }
            Self::AlterTable(params) => {
                check_identifier("table_name", &params.table_name)?;
                check_optional_identifier("schema", params.schema.as_deref())?;
                if params.operations.is_empty() {
                    return Err(DbError::invalid_input(
                        "alter_table requires at least one entry in operations",
                    ));
                }
                params.operations.iter().try_for_each(validate_change)
            }
            Self::GetEnums(params) => {
                check_optional_identifier("schema", params.schema.as_deref())?;
                check_optional_identifier("enum_name", params.enum_name.as_deref())
            }
            Self::CreateEnum(params) => {
                check_identifier("enum_name", &params.enum_name)?;
                check_optional_identifier("schema", params.schema.as_deref())?;
                if params.values.is_empty() {
                    return Err(DbError::invalid_input(
                        "create_enum requires at least one value",
                    ));
                }
                let mut seen = HashSet::new();
                for value in &params.values {
                    if !seen.insert(value.as_str()) {
                        return Err(DbError::invalid_input(format!(
                            "Duplicate enum value '{}'",
                            value
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

fn decode_params<T: DeserializeOwned>(
    operation: SchemaOperation,
    parameters: &Map<String, JsonValue>,
) -> DbResult<T> {
    serde_json::from_value(JsonValue::Object(parameters.clone())).map_err(|e| {
        DbError::invalid_input(format!("Invalid parameters for {}: {}", operation, e))
    })
}

fn validate_change(change: &AlterChange) -> DbResult<()> {
    check_identifier("column_name", change.column_name())?;
    match change {
        AlterChange::Add {
            data_type, default, ..
        } => {
            check_fragment("data_type", data_type)?;
            if let Some(default) = default {
                check_fragment("default", default)?;
            }
        }
        AlterChange::Alter {
            data_type,
            nullable,
            default,
            drop_default,
            ..
        } => {
            if data_type.is_none() && nullable.is_none() && default.is_none() && !drop_default {
                return Err(DbError::invalid_input(format!(
                    "alter of column '{}' must change at least one of data_type, nullable, default or drop_default",
                    change.column_name()
                )));
            }
            if default.is_some() && *drop_default {
                return Err(DbError::invalid_input(
                    "default and drop_default cannot be combined",
                ));
            }
            if let Some(data_type) = data_type {
                check_fragment("data_type", data_type)?;
            }
            if let Some(default) = default {
                check_fragment("default", default)?;
            }
        }
        AlterChange::Drop { .. } => {}
    }
    Ok(())
}

fn check_identifier(field: &str, value: &str) -> DbResult<()> {
    if value.trim().is_empty() {
        return Err(DbError::invalid_input(format!("{} must not be empty", field)));
    }
    if value.contains('\0') {
        return Err(DbError::invalid_input(format!(
            "{} must not contain NUL characters",
            field
        )));
    }
    Ok(())
}

fn check_optional_identifier(field: &str, value: Option<&str>) -> DbResult<()> {
    value.map_or(Ok(()), |v| check_identifier(field, v))
}

/// Data types and default expressions are parsed per dialect later; here
/// they only need to be present.
fn check_fragment(field: &str, value: &str) -> DbResult<()> {
    if value.trim().is_empty() {
        return Err(DbError::invalid_input(format!(
            "{} must not be empty; use drop_default to remove a default",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(operation: &str, parameters: JsonValue) -> OperationRequest {
        OperationRequest {
            operation: operation.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_parse_known_operations() {
        for op in SchemaOperation::ALL {
            assert_eq!(SchemaOperation::parse(op.name()).unwrap(), op);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_and_near_misses() {
        for name in ["invalid", "", "GET_INFO", " get_info", "drop_table"] {
            let err = SchemaOperation::parse(name).unwrap_err();
            assert!(matches!(err, DbError::UnsupportedOperation { .. }), "{name}");
        }
        let message = SchemaOperation::parse("invalid").unwrap_err().to_string();
        assert!(message.contains("get_info"));
        assert!(message.contains("create_enum"));
    }

    #[test]
    fn test_get_info_defaults() {
        let command = SchemaCommand::from_request(&request("get_info", json!({}))).unwrap();
        let SchemaCommand::GetInfo(params) = command else {
            panic!("expected get_info");
        };
        assert!(params.table_name.is_none());
        assert!(matches!(params.format, OutputFormat::Json));
    }

    #[test]
    fn test_column_spec_defaults_and_type_alias() {
        let command = SchemaCommand::from_request(&request(
            "create_table",
            json!({
                "table_name": "users",
                "columns": [{ "name": "id", "type": "integer", "primary_key": true }]
            }),
        ))
        .unwrap();
        let SchemaCommand::CreateTable(params) = command else {
            panic!("expected create_table");
        };
        let column = &params.columns[0];
        assert_eq!(column.data_type, "integer");
        assert!(column.nullable);
        assert!(column.primary_key);
        assert!(!params.if_not_exists);
    }

    #[test]
    fn test_create_table_requires_columns() {
        let err = SchemaCommand::from_request(&request(
            "create_table",
            json!({ "table_name": "users", "columns": [] }),
        ))
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_create_table_rejects_duplicate_columns() {
        let err = SchemaCommand::from_request(&request(
            "create_table",
            json!({
                "table_name": "t",
                "columns": [
                    { "name": "a", "data_type": "int" },
                    { "name": "a", "data_type": "text" }
                ]
            }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate column 'a'"));
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = SchemaCommand::from_request(&request("create_enum", json!({ "values": ["a"] })))
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(err.to_string().contains("create_enum"));
    }

    #[test]
    fn test_alter_change_tagging() {
        let command = SchemaCommand::from_request(&request(
            "alter_table",
            json!({
                "table_name": "users",
                "operations": [
                    { "action": "add", "column_name": "email", "data_type": "text", "nullable": false },
                    { "action": "alter", "column_name": "name", "drop_default": true },
                    { "action": "drop", "column_name": "legacy", "cascade": true }
                ]
            }),
        ))
        .unwrap();
        let SchemaCommand::AlterTable(params) = command else {
            panic!("expected alter_table");
        };
        let actions: Vec<_> = params.operations.iter().map(AlterChange::action).collect();
        assert_eq!(actions, ["add", "alter", "drop"]);
        assert!(matches!(
            params.operations[0],
            AlterChange::Add { nullable: false, .. }
        ));
    }

    #[test]
    fn test_alter_without_changes_is_rejected() {
        let err = SchemaCommand::from_request(&request(
            "alter_table",
            json!({
                "table_name": "users",
                "operations": [{ "action": "alter", "column_name": "name" }]
            }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_unknown_alter_action_is_rejected() {
        let err = SchemaCommand::from_request(&request(
            "alter_table",
            json!({
                "table_name": "users",
                "operations": [{ "action": "rename", "column_name": "name" }]
            }),
        ))
        .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_create_enum_rejects_duplicate_labels() {
        let err = SchemaCommand::from_request(&request(
            "create_enum",
            json!({ "enum_name": "mood", "values": ["happy", "sad", "happy"] }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Duplicate enum value 'happy'"));
    }

    #[test]
    fn test_blank_identifier_is_rejected() {
        let err = SchemaCommand::from_request(&request(
            "get_info",
            json!({ "table_name": "   " }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("table_name must not be empty"));
    }
}
