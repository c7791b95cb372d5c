//! Schema tool implementation.
//!
//! - `operation`: the closed operation set and typed parameters
//! - `schema`: the dispatcher behind the `manage_schema` tool
//! - `ddl`: identifier quoting and DDL statement building
//! - `format`: JSON / table / Markdown rendering of introspection rows

pub mod ddl;
pub mod format;
pub mod operation;
pub mod schema;

pub use format::OutputFormat;
pub use operation::{AlterChange, ColumnSpec, SchemaCommand, SchemaOperation};
pub use schema::SchemaToolHandler;
