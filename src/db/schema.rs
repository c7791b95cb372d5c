//! Schema introspection.
//!
//! SQL queries are organized in the `queries` submodule with constants for
//! each database type. [`SchemaInspector`] picks the right set from the
//! connection's dialect and runs them through [`SchemaConnection::query`],
//! so the same code serves the real pools and test doubles.
//!
//! Every query aliases its columns to the same lowercase names on all three
//! backends (`table_name`, `column_name`, `data_type`, ...).

use crate::db::connection::SchemaConnection;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam, QueryRow};
use serde::Serialize;
use tracing::debug;

/// Everything `get_info` reports about one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDetails {
    pub columns: Vec<QueryRow>,
    pub constraints: Vec<QueryRow>,
    pub indexes: Vec<QueryRow>,
}

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Number of statements [`describe_table`](Self::describe_table) issues.
    pub const DESCRIBE_QUERY_COUNT: usize = 3;

    /// List tables and views of a schema. One query.
    pub async fn list_tables<C: SchemaConnection>(
        conn: &C,
        schema: Option<&str>,
    ) -> DbResult<Vec<QueryRow>> {
        let (sql, params) = match conn.database_type() {
            DatabaseType::PostgreSQL => (
                queries::postgres::LIST_TABLES,
                vec![QueryParam::from(schema_or_default(DatabaseType::PostgreSQL, schema))],
            ),
            DatabaseType::MySQL => (
                queries::mysql::LIST_TABLES,
                vec![QueryParam::optional(schema)],
            ),
            DatabaseType::SQLite => (queries::sqlite::LIST_TABLES, Vec::new()),
        };

        let rows = conn.query(sql, &params).await?;
        debug!(count = rows.len(), "Listed tables");
        Ok(rows)
    }

    /// Columns, constraints and indexes of one table, in that order.
    pub async fn describe_table<C: SchemaConnection>(
        conn: &C,
        table_name: &str,
        schema: Option<&str>,
    ) -> DbResult<TableDetails> {
        let db_type = conn.database_type();
        let (columns_sql, constraints_sql, indexes_sql, params, constraint_params) = match db_type
        {
            DatabaseType::PostgreSQL => {
                let params = vec![
                    QueryParam::from(schema_or_default(db_type, schema)),
                    QueryParam::from(table_name),
                ];
                (
                    queries::postgres::DESCRIBE_COLUMNS,
                    queries::postgres::DESCRIBE_CONSTRAINTS,
                    queries::postgres::DESCRIBE_INDEXES,
                    params.clone(),
                    params,
                )
            }
            DatabaseType::MySQL => {
                let params = vec![QueryParam::optional(schema), QueryParam::from(table_name)];
                (
                    queries::mysql::DESCRIBE_COLUMNS,
                    queries::mysql::DESCRIBE_CONSTRAINTS,
                    queries::mysql::DESCRIBE_INDEXES,
                    params.clone(),
                    params,
                )
            }
            DatabaseType::SQLite => (
                queries::sqlite::DESCRIBE_COLUMNS,
                queries::sqlite::DESCRIBE_CONSTRAINTS,
                queries::sqlite::DESCRIBE_INDEXES,
                vec![QueryParam::from(table_name)],
                // the constraint query reads two pragmas
                vec![QueryParam::from(table_name), QueryParam::from(table_name)],
            ),
        };

        let columns = conn.query(columns_sql, &params).await?;
        let constraints = conn.query(constraints_sql, &constraint_params).await?;
        let indexes = conn.query(indexes_sql, &params).await?;

        debug!(
            table = %table_name,
            columns = columns.len(),
            constraints = constraints.len(),
            indexes = indexes.len(),
            "Described table"
        );

        Ok(TableDetails {
            columns,
            constraints,
            indexes,
        })
    }

    /// Enum types with their labels in declaration order. PostgreSQL only.
    pub async fn list_enums<C: SchemaConnection>(
        conn: &C,
        schema: Option<&str>,
        enum_name: Option<&str>,
    ) -> DbResult<Vec<QueryRow>> {
        let db_type = conn.database_type();
        ensure_enum_support(db_type)?;

        let params = vec![
            QueryParam::from(schema_or_default(db_type, schema)),
            QueryParam::optional(enum_name),
        ];
        let rows = conn.query(queries::postgres::LIST_ENUMS, &params).await?;
        debug!(count = rows.len(), "Listed enum types");
        Ok(rows)
    }

    /// Whether an enum type already exists. PostgreSQL only.
    pub async fn enum_exists<C: SchemaConnection>(
        conn: &C,
        schema: Option<&str>,
        enum_name: &str,
    ) -> DbResult<bool> {
        let db_type = conn.database_type();
        ensure_enum_support(db_type)?;

        let params = vec![
            QueryParam::from(schema_or_default(db_type, schema)),
            QueryParam::from(enum_name),
        ];
        let rows = conn.query(queries::postgres::ENUM_EXISTS, &params).await?;
        Ok(!rows.is_empty())
    }
}

/// Named schema, or the dialect's default. Empty for MySQL/SQLite defaults.
pub fn schema_or_default(db_type: DatabaseType, schema: Option<&str>) -> &str {
    schema.or(db_type.default_schema()).unwrap_or_default()
}

pub fn ensure_enum_support(db_type: DatabaseType) -> DbResult<()> {
    if db_type.supports_enum_types() {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "Enum types are only supported on PostgreSQL connections (this connection is {})",
            db_type
        )))
    }
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT
                t.table_name::text AS table_name,
                t.table_type::text AS table_type,
                CASE
                    WHEN t.table_type = 'BASE TABLE' THEN pg_total_relation_size(
                        (quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass
                    )
                    ELSE NULL
                END AS total_size,
                obj_description(
                    (quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass,
                    'pg_class'
                ) AS comment
            FROM information_schema.tables t
            WHERE t.table_schema = $1
            AND t.table_type IN ('BASE TABLE', 'VIEW')
            ORDER BY t.table_name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.udt_name::text AS udt_name,
                c.is_nullable::text AS is_nullable,
                c.column_default::text AS column_default,
                c.character_maximum_length::int AS character_maximum_length
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
            "#;

        pub const DESCRIBE_CONSTRAINTS: &str = r#"
            SELECT
                tc.constraint_name::text AS constraint_name,
                tc.constraint_type::text AS constraint_type,
                kcu.column_name::text AS column_name,
                ccu.table_name::text AS foreign_table_name,
                ccu.column_name::text AS foreign_column_name
            FROM information_schema.table_constraints tc
            LEFT JOIN information_schema.key_column_usage kcu
                ON kcu.constraint_name = tc.constraint_name
                AND kcu.constraint_schema = tc.constraint_schema
                AND kcu.table_name = tc.table_name
            LEFT JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.constraint_schema = tc.constraint_schema
                AND tc.constraint_type = 'FOREIGN KEY'
            WHERE tc.table_schema = $1
            AND tc.table_name = $2
            AND tc.constraint_name::text NOT LIKE '%\_not\_null'
            ORDER BY tc.constraint_type, tc.constraint_name, kcu.ordinal_position
            "#;

        pub const DESCRIBE_INDEXES: &str = r#"
            SELECT
                indexname::text AS index_name,
                indexdef AS definition
            FROM pg_indexes
            WHERE schemaname = $1 AND tablename = $2
            ORDER BY indexname
            "#;

        pub const LIST_ENUMS: &str = r#"
            SELECT
                n.nspname::text AS enum_schema,
                t.typname::text AS enum_name,
                json_agg(e.enumlabel ORDER BY e.enumsortorder) AS labels
            FROM pg_type t
            JOIN pg_enum e ON e.enumtypid = t.oid
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1
            AND ($2::text IS NULL OR t.typname = $2::text)
            GROUP BY n.nspname, t.typname
            ORDER BY t.typname
            "#;

        pub const ENUM_EXISTS: &str = r#"
            SELECT 1 AS found
            FROM pg_type t
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = $1 AND t.typname = $2
            "#;
    }

    pub mod mysql {
        pub const LIST_TABLES: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8mb4) AS table_name,
                CONVERT(TABLE_TYPE USING utf8mb4) AS table_type,
                CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS UNSIGNED) AS total_size,
                CONVERT(TABLE_COMMENT USING utf8mb4) AS comment
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            AND TABLE_TYPE IN ('BASE TABLE', 'VIEW')
            ORDER BY TABLE_NAME
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                CONVERT(COLUMN_NAME USING utf8mb4) AS column_name,
                CONVERT(COLUMN_TYPE USING utf8mb4) AS data_type,
                CONVERT(IS_NULLABLE USING utf8mb4) AS is_nullable,
                CONVERT(COLUMN_DEFAULT USING utf8mb4) AS column_default,
                CONVERT(COLUMN_KEY USING utf8mb4) AS column_key,
                CONVERT(EXTRA USING utf8mb4) AS extra
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#;

        pub const DESCRIBE_CONSTRAINTS: &str = r#"
            SELECT
                CONVERT(tc.CONSTRAINT_NAME USING utf8mb4) AS constraint_name,
                CONVERT(tc.CONSTRAINT_TYPE USING utf8mb4) AS constraint_type,
                CONVERT(kcu.COLUMN_NAME USING utf8mb4) AS column_name,
                CONVERT(kcu.REFERENCED_TABLE_NAME USING utf8mb4) AS foreign_table_name,
                CONVERT(kcu.REFERENCED_COLUMN_NAME USING utf8mb4) AS foreign_column_name
            FROM information_schema.TABLE_CONSTRAINTS tc
            LEFT JOIN information_schema.KEY_COLUMN_USAGE kcu
                ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
                AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND kcu.TABLE_NAME = tc.TABLE_NAME
            WHERE tc.TABLE_SCHEMA = COALESCE(?, DATABASE()) AND tc.TABLE_NAME = ?
            ORDER BY tc.CONSTRAINT_TYPE, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
            "#;

        pub const DESCRIBE_INDEXES: &str = r#"
            SELECT
                CONVERT(INDEX_NAME USING utf8mb4) AS index_name,
                CONVERT(GROUP_CONCAT(COLUMN_NAME ORDER BY SEQ_IN_INDEX) USING utf8mb4) AS column_names,
                NOT NON_UNIQUE AS is_unique,
                CONVERT(INDEX_TYPE USING utf8mb4) AS index_type
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
            GROUP BY INDEX_NAME, NON_UNIQUE, INDEX_TYPE
            ORDER BY INDEX_NAME
            "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name AS table_name, type AS table_type
            FROM sqlite_master
            WHERE type IN ('table', 'view')
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                name AS column_name,
                type AS data_type,
                CASE WHEN "notnull" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable,
                dflt_value AS column_default,
                pk AS primary_key_position
            FROM pragma_table_info(?)
            ORDER BY cid
            "#;

        pub const DESCRIBE_CONSTRAINTS: &str = r#"
            SELECT
                'PRIMARY KEY' AS constraint_type,
                name AS column_name,
                NULL AS foreign_table_name,
                NULL AS foreign_column_name
            FROM pragma_table_info(?)
            WHERE pk > 0
            UNION ALL
            SELECT
                'FOREIGN KEY' AS constraint_type,
                "from" AS column_name,
                "table" AS foreign_table_name,
                "to" AS foreign_column_name
            FROM pragma_foreign_key_list(?)
            "#;

        pub const DESCRIBE_INDEXES: &str = r#"
            SELECT name AS index_name, "unique" AS is_unique, origin
            FROM pragma_index_list(?)
            ORDER BY name
            "#;
    }
}
