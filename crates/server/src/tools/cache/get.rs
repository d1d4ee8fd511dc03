//! cache_get tool implementation.
//!
//! Retrieves the stored statistics for an area without recomputing.

use housestats_core::{CacheCoordinator, CacheEntry};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Area name. Case-insensitive.
    pub area: String,

    /// Area type. Case-insensitive.
    pub area_type: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetOutput {
    /// The cached entry.
    pub entry: CacheEntry,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(coordinator: &CacheCoordinator, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let entry = coordinator.cached(&params.area, &params.area_type).await?;
    json_result(&CacheGetOutput { entry })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tests::services;
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_get_impl_missing() {
        let services = services().await;
        let params = CacheGetParams { area: "CH".into(), area_type: "AREA".into() };

        let err = get_impl(&services.coordinator, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let services = services().await;
        services.coordinator.get_or_compute("CH", "AREA").await.unwrap();

        let params = CacheGetParams { area: " ch ".into(), area_type: "area".into() };
        let json = result_json(&get_impl(&services.coordinator, params).await.unwrap());
        assert_eq!(json["entry"]["id"], "CHAREA");
        assert_eq!(json["entry"]["area_type"], "AREA");
    }
}
