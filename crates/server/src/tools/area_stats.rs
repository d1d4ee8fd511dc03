//! area_stats tool implementation.
//!
//! Returns the statistics document for one area, recomputing it when the
//! cached copy is older than the ingest marker.

use housestats_core::{CacheCoordinator, CacheEntry};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the area_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AreaStatsParams {
    /// Area name, e.g. "CH". Case-insensitive.
    pub area: String,

    /// Area type, e.g. "area", "outcode", "town".
    pub area_type: String,
}

/// Output from the area_stats tool.
#[derive(Debug, Clone, Serialize)]
pub struct AreaStatsOutput {
    /// Whether the entry was served from cache without recomputing.
    pub cache_hit: bool,

    #[serde(flatten)]
    pub entry: CacheEntry,
}

/// Implementation of the area_stats tool.
pub async fn area_stats_impl(
    coordinator: &CacheCoordinator, params: AreaStatsParams,
) -> Result<CallToolResult, McpError> {
    let stats = coordinator.get_or_compute(&params.area, &params.area_type).await?;
    json_result(&AreaStatsOutput { cache_hit: stats.cache_hit, entry: stats.entry })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tests::services;
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_area_stats_miss_then_hit() {
        let services = services().await;
        let params = AreaStatsParams { area: "ch".into(), area_type: "area".into() };

        let first = result_json(&area_stats_impl(&services.coordinator, params.clone()).await.unwrap());
        assert_eq!(first["cache_hit"], false);
        assert_eq!(first["id"], "CHAREA");
        assert_eq!(first["data"]["periods"][0]["period"], "1mo");

        let second = result_json(&area_stats_impl(&services.coordinator, params).await.unwrap());
        assert_eq!(second["cache_hit"], true);
    }

    #[tokio::test]
    async fn test_area_stats_invalid_type() {
        let services = services().await;
        let params = AreaStatsParams { area: "CH".into(), area_type: "galaxy".into() };
        let err = area_stats_impl(&services.coordinator, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_area_stats_unknown_area() {
        let services = services().await;
        let params = AreaStatsParams { area: "ZZ".into(), area_type: "area".into() };
        let err = area_stats_impl(&services.coordinator, params).await.unwrap_err();
        assert_eq!(err.code.0, -32004);
    }
}
