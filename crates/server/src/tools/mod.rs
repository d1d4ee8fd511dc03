//! MCP tool implementations.
//!
//! This module contains all tools exposed by the housestats server.

pub mod analyse_areas;
pub mod area_stats;
pub mod cache;
pub mod valuation;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use analyse_areas::{AnalyseAreasParams, analyse_impl};
pub use area_stats::{AreaStatsParams, area_stats_impl};
pub use cache::{CacheGetParams, get_impl};
pub use valuation::{ValuationParams, valuation_impl};

/// One `(area, area_type)` pair as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AreaParam {
    /// Area name, e.g. "CH" or "EX2 4". Case-insensitive.
    pub area: String,

    /// One of postcode, street, town, district, county, outcode, area,
    /// sector, or country (with area "ALL").
    pub area_type: String,
}

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize output: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let text = result.content.first().and_then(|c| c.as_text()).map(|t| t.text.clone()).unwrap();
    serde_json::from_str(&text).unwrap()
}
