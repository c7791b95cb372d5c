//! Data models for the schema MCP server.

pub mod connection;
pub mod envelope;
pub mod query;
pub mod request;

pub use connection::DatabaseType;
pub use envelope::{ContentBlock, ResponseEnvelope};
pub use query::{QueryParam, QueryRow};
pub use request::OperationRequest;
