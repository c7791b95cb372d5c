//! Process-wide shared connection handle.
//!
//! # Design Decisions
//!
//! - **`OnceCell` barrier**: concurrent first callers wait on one
//!   initialization; exactly one handle is ever constructed per barrier
//! - **First connection string wins**: later calls reuse the handle no matter
//!   which connection string they pass
//! - **Failures are not cached**: a failed initialization leaves the cell
//!   empty and the next call tries again
//! - **`std::sync::Mutex` around the barrier**: held only to clone or swap the
//!   `Arc`, never across an await point
//! - **Reset during initialization**: a handle finished against a barrier
//!   that [`ConnectionProvider::reset`] already replaced is closed, and its
//!   callers get a connection error instead of an orphaned pool

use crate::db::connection::{Connector, SchemaConnection};
use crate::db::pool::SqlxConnector;
use crate::error::{DbError, DbResult};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

struct ProviderEntry<H> {
    handle: Arc<H>,
    /// Kept only for comparison; never logged.
    connection_string: String,
}

/// Lazily creates and then hands out one shared [`SchemaConnection`].
pub struct ConnectionProvider<C: Connector> {
    connector: C,
    cell: Mutex<Arc<OnceCell<ProviderEntry<C::Handle>>>>,
}

impl<C: Connector> ConnectionProvider<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            cell: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// Return the shared handle, creating it from `connection_string` on
    /// first use.
    ///
    /// Construction failures are reported as [`DbError::Connection`].
    pub async fn get_instance(&self, connection_string: &str) -> DbResult<Arc<C::Handle>> {
        let cell = self.current_cell();

        let entry = cell
            .get_or_try_init(|| async {
                debug!("Initializing shared connection pool");
                let handle = self
                    .connector
                    .connect(connection_string)
                    .await
                    .map_err(into_acquisition_failure)?;
                info!(
                    db_type = %handle.database_type(),
                    "Shared connection pool ready"
                );
                Ok::<_, DbError>(ProviderEntry {
                    handle: Arc::new(handle),
                    connection_string: connection_string.to_string(),
                })
            })
            .await?;

        if !self.is_current(&cell) {
            entry.handle.close().await;
            return Err(DbError::connection(
                "The shared connection pool was reset while it was being created",
                "Retry the request",
            ));
        }

        if entry.connection_string != connection_string {
            warn!(
                db_type = %entry.handle.database_type(),
                "Ignoring a different connection string; the shared pool keeps its first configuration"
            );
        }

        Ok(Arc::clone(&entry.handle))
    }

    pub fn is_initialized(&self) -> bool {
        self.current_cell().initialized()
    }

    /// Drop the shared handle and close its pool.
    ///
    /// The next [`get_instance`](Self::get_instance) builds a new handle.
    /// Calls still holding the old handle fail with a closed-pool error.
    /// Returns whether a handle existed.
    pub async fn reset(&self) -> bool {
        let previous = {
            let mut guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, Arc::new(OnceCell::new()))
        };

        match previous.get() {
            Some(entry) => {
                info!(
                    db_type = %entry.handle.database_type(),
                    "Closing shared connection pool"
                );
                entry.handle.close().await;
                true
            }
            None => false,
        }
    }

    fn current_cell(&self) -> Arc<OnceCell<ProviderEntry<C::Handle>>> {
        let guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    fn is_current(&self, cell: &Arc<OnceCell<ProviderEntry<C::Handle>>>) -> bool {
        let guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::ptr_eq(&guard, cell)
    }
}

impl ConnectionProvider<SqlxConnector> {
    /// The provider shared by the whole process.
    pub fn shared() -> Arc<ConnectionProvider<SqlxConnector>> {
        static SHARED: OnceLock<Arc<ConnectionProvider<SqlxConnector>>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(ConnectionProvider::new(SqlxConnector))))
    }
}

fn into_acquisition_failure(err: DbError) -> DbError {
    match err {
        err @ DbError::Connection { .. } => err,
        other => DbError::connection(
            other.to_string(),
            "Check that the database is reachable with the configured connection string",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatabaseType, QueryParam, QueryRow};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct FakeHandle {
        serial: usize,
        closed: AtomicBool,
        closes: Arc<AtomicUsize>,
    }

    impl SchemaConnection for FakeHandle {
        fn database_type(&self) -> DatabaseType {
            DatabaseType::PostgreSQL
        }

        async fn query(&self, _sql: &str, _params: &[QueryParam]) -> DbResult<Vec<QueryRow>> {
            Ok(Vec::new())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Counts constructions; fails while `failures_left` is non-zero.
    #[derive(Default)]
    struct CountingConnector {
        constructed: AtomicUsize,
        failures_left: AtomicUsize,
        delay_ms: u64,
        closes: Arc<AtomicUsize>,
    }

    impl Connector for CountingConnector {
        type Handle = FakeHandle;

        async fn connect(&self, _connection_string: &str) -> DbResult<FakeHandle> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DbError::internal("server went away"));
            }
            let serial = self.constructed.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(FakeHandle {
                serial,
                closed: AtomicBool::new(false),
                closes: Arc::clone(&self.closes),
            })
        }
    }

    #[tokio::test]
    async fn test_same_instance_regardless_of_connection_string() {
        let provider = ConnectionProvider::new(CountingConnector::default());
        assert!(!provider.is_initialized());

        let first = provider.get_instance("postgres://a/one").await.unwrap();
        let second = provider.get_instance("postgres://b/two").await.unwrap();
        let third = provider.get_instance("postgres://a/one").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(provider.connector.constructed.load(Ordering::SeqCst), 1);
        assert!(provider.is_initialized());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_callers_share_one_construction() {
        let provider = Arc::new(ConnectionProvider::new(CountingConnector {
            delay_ms: 50,
            ..Default::default()
        }));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let provider = Arc::clone(&provider);
            tasks.push(tokio::spawn(async move {
                provider
                    .get_instance(&format!("postgres://host/db{i}"))
                    .await
                    .unwrap()
            }));
        }

        let handles = futures_util::future::join_all(tasks).await;
        let handles: Vec<_> = handles.into_iter().map(|h| h.unwrap()).collect();

        assert_eq!(provider.connector.constructed.load(Ordering::SeqCst), 1);
        for handle in &handles {
            assert!(Arc::ptr_eq(handle, &handles[0]));
        }
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let provider = ConnectionProvider::new(CountingConnector {
            failures_left: AtomicUsize::new(1),
            ..Default::default()
        });

        let err = provider.get_instance("postgres://host/db").await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("server went away"));
        assert!(!provider.is_initialized());

        let handle = provider.get_instance("postgres://host/db").await.unwrap();
        assert_eq!(handle.serial, 1);
    }

    #[tokio::test]
    async fn test_reset_closes_and_rebuilds() {
        let provider = ConnectionProvider::new(CountingConnector::default());
        assert!(!provider.reset().await);

        let first = provider.get_instance("postgres://host/db").await.unwrap();
        assert!(provider.reset().await);
        assert!(first.closed.load(Ordering::SeqCst));
        assert!(!provider.is_initialized());

        let second = provider.get_instance("postgres://host/db").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.serial, 2);
    }

    #[tokio::test]
    async fn test_reset_during_initialization_closes_the_new_handle() {
        let provider = Arc::new(ConnectionProvider::new(CountingConnector {
            delay_ms: 50,
            ..Default::default()
        }));

        let pending = {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move { provider.get_instance("postgres://host/db").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!provider.reset().await);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert_eq!(provider.connector.constructed.load(Ordering::SeqCst), 1);
        assert_eq!(provider.connector.closes.load(Ordering::SeqCst), 1);
        assert!(!provider.is_initialized());

        let handle = provider.get_instance("postgres://host/db").await.unwrap();
        assert_eq!(handle.serial, 2);
        assert!(!handle.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shared_provider_is_a_singleton() {
        let a = ConnectionProvider::shared();
        let b = ConnectionProvider::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
