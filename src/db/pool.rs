//! sqlx-backed connection pools.
//!
//! Uses database-specific pools (MySqlPool, PgPool, SqlitePool) rather than
//! `AnyPool` so every column type decodes with full driver support.

use crate::config::{ConnectionSettings, mask_connection_string};
use crate::db::connection::{Connector, SchemaConnection};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam, QueryRow};
use futures_util::TryStreamExt;
use sqlx::{
    Executor, MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions,
    mysql::MySqlPoolOptions, postgres::PgConnectOptions, postgres::PgPoolOptions,
    sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// How long a statement waits for a free pooled connection.
    pub fn acquire_timeout(&self) -> Duration {
        match self {
            DbPool::MySql(pool) => pool.options().get_acquire_timeout(),
            DbPool::Postgres(pool) => pool.options().get_acquire_timeout(),
            DbPool::SQLite(pool) => pool.options().get_acquire_timeout(),
        }
    }

    /// Server version string, if the server reports one.
    pub async fn server_version(&self) -> Option<String> {
        let result = match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>("SELECT version()")
                    .fetch_one(pool)
                    .await
            }
            DbPool::SQLite(pool) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(pool)
                    .await
            }
        };

        match result {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}

impl SchemaConnection for DbPool {
    fn database_type(&self) -> DatabaseType {
        self.db_type()
    }

    async fn query(&self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<QueryRow>> {
        debug!(
            db_type = %self.db_type(),
            params = params.len(),
            "Running statement"
        );

        let result = match self {
            DbPool::MySql(pool) if params.is_empty() => {
                pool.fetch(sql)
                    .map_ok(|row| row.to_json_map())
                    .try_collect::<Vec<_>>()
                    .await
            }
            DbPool::MySql(pool) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query
                    .fetch(pool)
                    .map_ok(|row| row.to_json_map())
                    .try_collect::<Vec<_>>()
                    .await
            }
            DbPool::Postgres(pool) if params.is_empty() => {
                pool.fetch(sql)
                    .map_ok(|row| row.to_json_map())
                    .try_collect::<Vec<_>>()
                    .await
            }
            DbPool::Postgres(pool) => {
                // NULLs go out as text; queries cast the placeholder
                // (`$2::text`) where the server cannot infer it
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query
                    .fetch(pool)
                    .map_ok(|row| row.to_json_map())
                    .try_collect::<Vec<_>>()
                    .await
            }
            DbPool::SQLite(pool) if params.is_empty() => {
                pool.fetch(sql)
                    .map_ok(|row| row.to_json_map())
                    .try_collect::<Vec<_>>()
                    .await
            }
            DbPool::SQLite(pool) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = query.bind(param.as_str());
                }
                query
                    .fetch(pool)
                    .map_ok(|row| row.to_json_map())
                    .try_collect::<Vec<_>>()
                    .await
            }
        };

        result.map_err(|e| statement_error(e, self.acquire_timeout()))
    }

    async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }
}

/// Builds [`DbPool`]s from connection strings.
///
/// Pool sizing comes from the connection string's query parameters
/// (see [`ConnectionSettings`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

impl Connector for SqlxConnector {
    type Handle = DbPool;

    async fn connect(&self, connection_string: &str) -> DbResult<DbPool> {
        let settings = ConnectionSettings::parse(connection_string)?;
        info!(
            db_type = %settings.db_type,
            url = %mask_connection_string(&settings.connection_string),
            "Creating connection pool"
        );

        let pool = create_pool(&settings).await?;
        if let Some(version) = pool.server_version().await {
            info!(db_type = %settings.db_type, server_version = %version, "Connected");
        }
        Ok(pool)
    }
}

async fn create_pool(settings: &ConnectionSettings) -> DbResult<DbPool> {
    let pool_opts = &settings.pool_options;
    let db_type = settings.db_type;
    let is_sqlite = db_type == DatabaseType::SQLite;
    let acquire_timeout = pool_opts.acquire_timeout();
    let idle_timeout = Some(pool_opts.idle_timeout());
    let invalid_url = |e: sqlx::Error| {
        DbError::connection(
            format!("Invalid {} connection string: {}", db_type, e),
            db_type.url_hint(),
        )
    };
    let connect_failed = |e: sqlx::Error| {
        DbError::connection(
            format!("Failed to connect: {}", e),
            connection_suggestion(db_type, &e),
        )
    };

    match db_type {
        DatabaseType::MySQL => {
            let options = MySqlConnectOptions::from_str(&settings.connection_string)
                .map_err(invalid_url)?
                .charset("utf8mb4");

            let pool = MySqlPoolOptions::new()
                .min_connections(pool_opts.min_connections_or_default())
                .max_connections(pool_opts.max_connections_or_default(is_sqlite))
                .acquire_timeout(acquire_timeout)
                .idle_timeout(idle_timeout)
                .test_before_acquire(pool_opts.test_before_acquire_or_default())
                .connect_with(options)
                .await
                .map_err(connect_failed)?;
            Ok(DbPool::MySql(pool))
        }
        DatabaseType::PostgreSQL => {
            let options =
                PgConnectOptions::from_str(&settings.connection_string).map_err(invalid_url)?;

            let pool = PgPoolOptions::new()
                .min_connections(pool_opts.min_connections_or_default())
                .max_connections(pool_opts.max_connections_or_default(is_sqlite))
                .acquire_timeout(acquire_timeout)
                .idle_timeout(idle_timeout)
                .test_before_acquire(pool_opts.test_before_acquire_or_default())
                .connect_with(options)
                .await
                .map_err(connect_failed)?;
            Ok(DbPool::Postgres(pool))
        }
        DatabaseType::SQLite => {
            let options =
                SqliteConnectOptions::from_str(&settings.connection_string).map_err(invalid_url)?;

            let pool = SqlitePoolOptions::new()
                .min_connections(pool_opts.min_connections_or_default())
                .max_connections(pool_opts.max_connections_or_default(is_sqlite))
                .acquire_timeout(acquire_timeout)
                .idle_timeout(idle_timeout)
                .test_before_acquire(pool_opts.test_before_acquire_or_default())
                .connect_with(options)
                .await
                .map_err(connect_failed)?;
            Ok(DbPool::SQLite(pool))
        }
    }
}

/// Map a failed statement, reporting pool exhaustion against the configured
/// `acquire_timeout`.
fn statement_error(err: sqlx::Error, acquire_timeout: Duration) -> DbError {
    match err {
        sqlx::Error::PoolTimedOut => {
            DbError::timeout("connection pool acquire", acquire_timeout.as_secs())
        }
        other => DbError::from(other),
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password in the connection string".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("unable to open database file") {
        return "Check the SQLite file path, or add ?mode=rwc to create it".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    db_type.url_hint().to_string()
}
