//! valuation tool implementation.
//!
//! Estimates a house's current price range from the growth of the areas it
//! belongs to.

use housestats_core::Valuer;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the valuation tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValuationParams {
    /// Identifier of the house in the sale store.
    pub house_id: String,
}

/// Implementation of the valuation tool.
pub async fn valuation_impl(valuer: &Valuer, params: ValuationParams) -> Result<CallToolResult, McpError> {
    let valuation = valuer.value_house(&params.house_id).await?;
    json_result(&valuation)
}
