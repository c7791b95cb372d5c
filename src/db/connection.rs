//! The seam between schema operations and the database driver.
//!
//! Operations only ever see a [`SchemaConnection`]. The production
//! implementation is [`DbPool`](super::DbPool); tests substitute their own.

use crate::error::DbResult;
use crate::models::{DatabaseType, QueryParam, QueryRow};
use std::future::Future;

/// A pooled, shareable handle that can run one statement at a time per call.
///
/// Implementations must be safe for concurrent use: each `query` checks a
/// connection out of the pool and returns it when the statement finishes.
pub trait SchemaConnection: Send + Sync {
    /// Dialect of the database behind this handle.
    fn database_type(&self) -> DatabaseType;

    /// Run one statement and collect every result row.
    ///
    /// With no `params` the statement is sent as plain text, which is what
    /// DDL needs on some drivers.
    fn query(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Vec<QueryRow>>> + Send;

    /// Release every pooled connection.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Builds a [`SchemaConnection`] from a connection string.
pub trait Connector: Send + Sync {
    type Handle: SchemaConnection;

    fn connect(&self, connection_string: &str)
    -> impl Future<Output = DbResult<Self::Handle>> + Send;
}
