//! analyse_areas tool implementation.
//!
//! Fans a list of areas out over the worker pool and reports each outcome in
//! request order.

use housestats_core::{AreaOutcome, Error, TaskOrchestrator};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{AreaParam, json_result};

/// Upper bound on areas in one request.
const MAX_AREAS: usize = 64;

/// Parameters for the analyse_areas tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AnalyseAreasParams {
    /// Areas to analyse.
    pub areas: Vec<AreaParam>,
}

/// Outcome for one requested area.
#[derive(Debug, Clone, Serialize)]
pub struct AreaReport {
    pub area: String,
    pub area_type: String,
    #[serde(flatten)]
    pub outcome: AreaOutcome,
}

/// Counts by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyseSummary {
    pub total: u32,
    pub completed: u32,
    pub no_data: u32,
    pub failed: u32,
    pub timed_out: u32,
}

impl AnalyseSummary {
    fn from_outcomes(outcomes: &[AreaOutcome]) -> Self {
        let mut summary = Self { total: outcomes.len() as u32, ..Default::default() };
        for outcome in outcomes {
            match outcome {
                AreaOutcome::Completed { .. } => summary.completed += 1,
                AreaOutcome::NoData { .. } => summary.no_data += 1,
                AreaOutcome::Failed { .. } => summary.failed += 1,
                AreaOutcome::TimedOut { .. } => summary.timed_out += 1,
            }
        }
        summary
    }
}

/// Output structure for analyse_areas tool.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyseAreasOutput {
    /// Individual results (in input order).
    pub results: Vec<AreaReport>,
    pub summary: AnalyseSummary,
}

/// Implementation of the analyse_areas tool.
pub async fn analyse_impl(
    orchestrator: &TaskOrchestrator, params: AnalyseAreasParams,
) -> Result<CallToolResult, McpError> {
    if params.areas.is_empty() {
        return Err(Error::InvalidInput("areas cannot be empty".into()).into());
    }
    if params.areas.len() > MAX_AREAS {
        return Err(Error::InvalidInput(format!("at most {MAX_AREAS} areas per request")).into());
    }

    let requests = params.areas.iter().map(|p| (p.area.clone(), p.area_type.clone())).collect();
    let outcomes = orchestrator.run_multi_area_job(requests).await;
    let summary = AnalyseSummary::from_outcomes(&outcomes);

    let results = params
        .areas
        .into_iter()
        .zip(outcomes)
        .map(|(param, outcome)| AreaReport { area: param.area, area_type: param.area_type, outcome })
        .collect();

    json_result(&AnalyseAreasOutput { results, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tests::services;
    use crate::tools::result_json;

    fn area(area: &str, area_type: &str) -> AreaParam {
        AreaParam { area: area.into(), area_type: area_type.into() }
    }

    #[tokio::test]
    async fn test_analyse_reports_in_order() {
        let services = services().await;
        let params = AnalyseAreasParams {
            areas: vec![area("CH", "area"), area("EX", "area"), area("CH1", "galaxy"), area("CHESTER", "town")],
        };

        let json = result_json(&analyse_impl(&services.orchestrator, params).await.unwrap());
        let statuses: Vec<&str> =
            json["results"].as_array().unwrap().iter().map(|r| r["status"].as_str().unwrap()).collect();
        assert_eq!(statuses, vec!["completed", "no_data", "failed", "completed"]);
        assert_eq!(json["results"][1]["area"], "EX");
        assert_eq!(json["summary"]["total"], 4);
        assert_eq!(json["summary"]["completed"], 2);
    }

    #[tokio::test]
    async fn test_analyse_rejects_empty() {
        let services = services().await;
        let result = analyse_impl(&services.orchestrator, AnalyseAreasParams::default()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_counts() {
        let outcomes = vec![
            AreaOutcome::TimedOut { after_ms: 10 },
            AreaOutcome::Failed { reason: "x".into() },
            AreaOutcome::Failed { reason: "y".into() },
        ];
        let summary = AnalyseSummary::from_outcomes(&outcomes);
        assert_eq!(summary, AnalyseSummary { total: 3, completed: 0, no_data: 0, failed: 2, timed_out: 1 });
    }
}
