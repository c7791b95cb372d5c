//! Schema MCP Server Library
//!
//! This library exposes schema introspection and DDL operations for SQL
//! databases (PostgreSQL, MySQL, SQLite) as a single MCP (Model Context
//! Protocol) tool, backed by one process-wide connection pool.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use db::ConnectionProvider;
pub use error::DbError;
pub use mcp::SchemaService;
pub use tools::SchemaToolHandler;
