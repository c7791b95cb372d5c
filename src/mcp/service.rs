//! MCP service implementation using rmcp.
//!
//! This module defines the SchemaService struct, which exposes the schema
//! dispatcher as a single `manage_schema` tool using the rmcp framework's
//! macros.

use crate::db::{ConnectionProvider, SqlxConnector};
use crate::models::OperationRequest;
use crate::tools::SchemaToolHandler;
use crate::tools::operation::SchemaOperation;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SchemaService {
    /// Dispatcher shared by every tool call
    handler: Arc<SchemaToolHandler<SqlxConnector>>,
    /// Handed to the dispatcher's resolver; never logged
    connection_string: Arc<str>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl SchemaService {
    /// Create a new SchemaService instance.
    ///
    /// # Arguments
    ///
    /// * `provider` - Shared connection provider, usually [`ConnectionProvider::shared`]
    /// * `connection_string` - Database URL resolved for every operation
    pub fn new(
        provider: Arc<ConnectionProvider<SqlxConnector>>,
        connection_string: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            handler: Arc::new(SchemaToolHandler::new(provider)),
            connection_string: connection_string.into(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn provider(&self) -> &Arc<ConnectionProvider<SqlxConnector>> {
        self.handler.provider()
    }
}

#[tool_router]
impl SchemaService {
    #[tool(
        description = "Inspect and manage the database schema.\n\
        Operations:\n\
        - get_info: list tables, or describe one table (columns, constraints, indexes) with `table_name`. Optional `schema`, `format` (json, table, markdown).\n\
        - create_table: `table_name`, `columns` [{name, data_type, nullable, default, primary_key}], optional `schema`, `if_not_exists`.\n\
        - alter_table: `table_name`, `operations` [{action: add|alter|drop, column_name, ...}], optional `schema`.\n\
        - get_enums: PostgreSQL enum types, optional `schema`, `enum_name`.\n\
        - create_enum: PostgreSQL only, `enum_name`, `values`, optional `schema`, `if_not_exists`."
    )]
    async fn manage_schema(
        &self,
        Parameters(request): Parameters<OperationRequest>,
    ) -> Result<CallToolResult, McpError> {
        debug!(operation = %request.operation, "manage_schema called");
        let connection_string = Arc::clone(&self.connection_string);
        self.handler
            .execute(&request, move || connection_string.to_string())
            .await
            .map(CallToolResult::from)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for SchemaService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "schema-mcp-server".to_owned(),
                title: Some("Schema MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Schema management for one SQL database (PostgreSQL, MySQL or SQLite).\n\
                \n\
                Call `manage_schema` with an `operation` and its `parameters`.\n\
                Supported operations: {}.\n\
                \n\
                ## Notes\n\
                - Start with `get_info` to see the tables, then pass `table_name` for details.\n\
                - PostgreSQL defaults to the `public` schema; MySQL to the connection's database.\n\
                - Enum operations are PostgreSQL only. SQLite can add and drop columns but not alter them.\n\
                - On MySQL a `data_type` change restates the column: also pass `nullable` and `default` (or `drop_default`).\n\
                - Each `alter_table` change runs as its own statement; a failure stops at that change.",
                SchemaOperation::names().join(", ")
            )),
        }
    }
}
