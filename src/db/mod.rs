//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The `SchemaConnection`/`Connector` seam the dispatcher runs against
//! - sqlx connection pools and the process-wide `ConnectionProvider`
//! - Schema introspection queries
//! - Row decoding into JSON

pub mod connection;
pub mod pool;
pub mod provider;
pub mod schema;
pub mod types;

pub use connection::{Connector, SchemaConnection};
pub use pool::{DbPool, SqlxConnector};
pub use provider::ConnectionProvider;
pub use schema::{SchemaInspector, TableDetails};
