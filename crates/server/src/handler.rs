//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::services::Services;
use crate::tools::{
    AnalyseAreasParams, AreaStatsParams, CacheGetParams, ValuationParams, analyse_impl, area_stats_impl, get_impl,
    valuation_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for housestats.
#[derive(Clone)]
pub struct HouseStatsServer {
    tool_router: ToolRouter<Self>,
    services: Services,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl HouseStatsServer {
    /// Create a new server handler.
    pub fn new(services: Services) -> Self {
        Self { tool_router: Self::tool_router(), services }
    }

    /// Price statistics for one area.
    ///
    /// Serves the cached document while it is newer than the last ingest,
    /// otherwise recomputes it from the sale store.
    #[tool(
        description = "Price statistics for one area over 1, 3, 6 and 12 month periods: average price, \
        percentage change, monthly volume and quantity, type proportions and tenancy, per property type."
    )]
    async fn area_stats(&self, params: Parameters<AreaStatsParams>) -> Result<CallToolResult, McpError> {
        area_stats_impl(&self.services.coordinator, params.0).await
    }

    /// Statistics for several areas at once.
    #[tool(
        description = "Compute statistics for several areas concurrently. Returns one outcome per area \
        (completed, no_data, failed or timed_out) in request order, plus a summary."
    )]
    async fn analyse_areas(&self, params: Parameters<AnalyseAreasParams>) -> Result<CallToolResult, McpError> {
        analyse_impl(&self.services.orchestrator, params.0).await
    }

    #[tool(description = "Estimate a house's current value range from its last sale and the growth of its areas.")]
    async fn valuation(&self, params: Parameters<ValuationParams>) -> Result<CallToolResult, McpError> {
        valuation_impl(&self.services.valuer, params.0).await
    }

    /// Read a cached entry without recomputing.
    #[tool(description = "Retrieve the cached statistics for an area without recomputing. Fails with CACHE_MISS.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.services.coordinator, params.0).await
    }
}

impl ServerHandler for HouseStatsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "housestats".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tests::services;

    #[tokio::test]
    async fn test_lists_all_tools() {
        let server = HouseStatsServer::new(services().await);
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["analyse_areas", "area_stats", "cache_get", "valuation"]);
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = HouseStatsServer::new(services().await);
        let info = server.get_info();
        assert_eq!(info.server_info.name, "housestats");
        assert!(info.capabilities.tools.is_some());
    }
}
