//! Schema operation dispatcher.
//!
//! [`SchemaToolHandler::execute`] is the single entry point. Every call walks
//! the same path: the operation and its parameters are checked, the
//! connection string is resolved, the shared handle is taken from the
//! [`ConnectionProvider`], and exactly one operation branch runs against it.
//! Nothing touches the database before the request is known to be valid.

use crate::db::connection::{Connector, SchemaConnection};
use crate::db::provider::ConnectionProvider;
use crate::db::schema::{SchemaInspector, TableDetails, ensure_enum_support};
use crate::error::DbResult;
use crate::models::{DatabaseType, OperationRequest, ResponseEnvelope};
use crate::tools::ddl;
use crate::tools::format::{OutputFormat, annotate_sizes, render_rows};
use crate::tools::operation::{
    AlterTableParams, CreateEnumParams, CreateTableParams, GetEnumsParams, GetInfoParams,
    SchemaCommand,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SchemaToolHandler<C: Connector> {
    provider: Arc<ConnectionProvider<C>>,
}

impl<C: Connector> SchemaToolHandler<C> {
    pub fn new(provider: Arc<ConnectionProvider<C>>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<ConnectionProvider<C>> {
        &self.provider
    }

    /// Run one schema operation.
    ///
    /// `resolve_connection_string` is only called once the request has been
    /// validated. Database failures are returned as they come from the
    /// driver; nothing is retried.
    pub async fn execute<F>(
        &self,
        request: &OperationRequest,
        resolve_connection_string: F,
    ) -> DbResult<ResponseEnvelope>
    where
        F: FnOnce() -> String + Send,
    {
        let command = SchemaCommand::from_request(request)?;
        let operation = command.operation();

        let connection_string = resolve_connection_string();
        let conn = self.provider.get_instance(&connection_string).await?;
        debug!(
            operation = %operation,
            db_type = %conn.database_type(),
            "Connection acquired"
        );

        let result = match command {
            SchemaCommand::GetInfo(params) => get_info(&*conn, params).await,
            SchemaCommand::CreateTable(params) => create_table(&*conn, params).await,
            SchemaCommand::AlterTable(params) => alter_table(&*conn, params).await,
            SchemaCommand::GetEnums(params) => get_enums(&*conn, params).await,
            SchemaCommand::CreateEnum(params) => create_enum(&*conn, params).await,
        };

        match &result {
            Ok(_) => info!(
                operation = %operation,
                ddl = operation.is_ddl(),
                "Schema operation completed"
            ),
            Err(e) => warn!(operation = %operation, error = %e, "Schema operation failed"),
        }
        result
    }
}

/// Where a request points, for messages: "schema 'public'" or similar.
fn scope(db_type: DatabaseType, schema: Option<&str>) -> String {
    match (db_type, schema) {
        (DatabaseType::SQLite, _) => "the database".to_string(),
        (_, Some(schema)) => format!("schema '{}'", schema),
        (DatabaseType::PostgreSQL, None) => "schema 'public'".to_string(),
        (DatabaseType::MySQL, None) => "the current database".to_string(),
    }
}

async fn get_info<C: SchemaConnection>(
    conn: &C,
    params: GetInfoParams,
) -> DbResult<ResponseEnvelope> {
    let db_type = conn.database_type();
    let scope = scope(db_type, params.schema.as_deref());

    let Some(table_name) = params.table_name else {
        let mut rows = SchemaInspector::list_tables(conn, params.schema.as_deref()).await?;
        if rows.is_empty() {
            return Ok(ResponseEnvelope::text(format!("No tables found in {}.", scope)));
        }
        annotate_sizes(&mut rows);
        return Ok(ResponseEnvelope::text(format!(
            "Tables in {} ({}):\n{}",
            scope,
            rows.len(),
            render_rows(&rows, params.format)
        )));
    };

    let details =
        SchemaInspector::describe_table(conn, &table_name, params.schema.as_deref()).await?;
    if details.columns.is_empty() {
        return Ok(ResponseEnvelope::text(format!(
            "Table '{}' not found in {}.",
            table_name, scope
        )));
    }

    Ok(ResponseEnvelope::text(format!(
        "Table '{}' in {}:\n{}",
        table_name,
        scope,
        render_table_details(&details, params.format)
    )))
}

fn render_table_details(details: &TableDetails, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(details).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table | OutputFormat::Markdown => format!(
            "Columns:\n{}\n\nConstraints:\n{}\n\nIndexes:\n{}",
            render_rows(&details.columns, format),
            render_rows(&details.constraints, format),
            render_rows(&details.indexes, format)
        ),
    }
}

async fn create_table<C: SchemaConnection>(
    conn: &C,
    params: CreateTableParams,
) -> DbResult<ResponseEnvelope> {
    let db_type = conn.database_type();
    let sql = ddl::create_table_sql(db_type, &params)?;

    conn.query(&sql, &[]).await?;
    info!(table = %params.table_name, columns = params.columns.len(), "Table created");

    let scope = scope(db_type, params.schema.as_deref());
    let message = if params.if_not_exists {
        format!(
            "Table '{}' is present in {} (created if it did not exist).",
            params.table_name, scope
        )
    } else {
        format!(
            "Table '{}' created in {} with {} column(s).",
            params.table_name,
            scope,
            params.columns.len()
        )
    };
    Ok(ResponseEnvelope::text(message))
}

async fn alter_table<C: SchemaConnection>(
    conn: &C,
    params: AlterTableParams,
) -> DbResult<ResponseEnvelope> {
    let db_type = conn.database_type();
    let table = ddl::qualified_name(db_type, params.schema.as_deref(), &params.table_name);

    // Build every statement first so a change the dialect cannot express
    // fails before anything is applied.
    let statements = params
        .operations
        .iter()
        .map(|change| ddl::alter_table_sql(db_type, &table, change))
        .collect::<DbResult<Vec<_>>>()?;

    for (applied, sql) in statements.iter().enumerate() {
        if let Err(e) = conn.query(sql, &[]).await {
            warn!(
                table = %params.table_name,
                applied,
                total = statements.len(),
                "Stopping alter_table after a failed change"
            );
            return Err(e);
        }
    }

    let summary: Vec<String> = params
        .operations
        .iter()
        .map(|change| format!("- {} column '{}'", change.action(), change.column_name()))
        .collect();
    Ok(ResponseEnvelope::text(format!(
        "Table '{}' altered ({} change(s) applied):\n{}",
        params.table_name,
        statements.len(),
        summary.join("\n")
    )))
}

async fn get_enums<C: SchemaConnection>(
    conn: &C,
    params: GetEnumsParams,
) -> DbResult<ResponseEnvelope> {
    let db_type = conn.database_type();
    let rows = SchemaInspector::list_enums(
        conn,
        params.schema.as_deref(),
        params.enum_name.as_deref(),
    )
    .await?;

    let scope = scope(db_type, params.schema.as_deref());
    if rows.is_empty() {
        let message = match &params.enum_name {
            Some(name) => format!("No enum type '{}' found in {}.", name, scope),
            None => format!("No enum types found in {}.", scope),
        };
        return Ok(ResponseEnvelope::text(message));
    }

    Ok(ResponseEnvelope::text(format!(
        "Enum types in {} ({}):\n{}",
        scope,
        rows.len(),
        render_rows(&rows, params.format)
    )))
}

async fn create_enum<C: SchemaConnection>(
    conn: &C,
    params: CreateEnumParams,
) -> DbResult<ResponseEnvelope> {
    let db_type = conn.database_type();
    ensure_enum_support(db_type)?;
    let scope = scope(db_type, params.schema.as_deref());

    if params.if_not_exists
        && SchemaInspector::enum_exists(conn, params.schema.as_deref(), &params.enum_name).await?
    {
        return Ok(ResponseEnvelope::text(format!(
            "Enum type '{}' already exists in {}.",
            params.enum_name, scope
        )));
    }

    conn.query(&ddl::create_enum_sql(&params), &[]).await?;
    info!(enum_name = %params.enum_name, values = params.values.len(), "Enum type created");

    Ok(ResponseEnvelope::text(format!(
        "Enum type '{}' created in {} with values: {}.",
        params.enum_name,
        scope,
        params.values.join(", ")
    )))
}
