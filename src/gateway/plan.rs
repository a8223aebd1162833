//! Plan suggestions from a JSON-over-HTTP service.

use async_trait::async_trait;
use serde::Serialize;

use super::{PlanSuggester, PlanSuggestion};
use crate::error::Result;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanRequest<'a> {
    project_name: &'a str,
    description: &'a str,
}

pub struct HttpPlanSuggester {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPlanSuggester {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        HttpPlanSuggester {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Parse a suggestion body. Malformed JSON and plans without phases are `None`.
pub fn parse_plan(body: &str) -> Option<PlanSuggestion> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<PlanSuggestion>(body) {
        Ok(plan) if plan.phases.is_empty() => None,
        Ok(plan) => Some(plan),
        Err(e) => {
            tracing::warn!("Discarding malformed plan suggestion: {e}");
            None
        }
    }
}

#[async_trait]
impl PlanSuggester for HttpPlanSuggester {
    async fn suggest_plan(&self, project_name: &str, description: &str) -> Result<Option<PlanSuggestion>> {
        let mut request = self.client.post(&self.endpoint).json(&PlanRequest {
            project_name,
            description,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!("Plan service returned {}: {}", status.as_u16(), body);
            return Ok(None);
        }
        let body = resp.text().await?;
        Ok(parse_plan(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan() {
        let body = r#"{
            "phases": [
                {"name": "Discovery", "tasks": [
                    {"title": "Kickoff", "estimatedHours": 2},
                    {"title": "Interviews"}
                ]},
                {"name": "Delivery"}
            ]
        }"#;
        let plan = parse_plan(body).unwrap();
        assert_eq!(plan.phases.len(), 2);
        assert_eq!(plan.phases[0].tasks[0].estimated_hours, Some(2.0));
        assert_eq!(plan.phases[0].tasks[1].estimated_hours, None);
        assert!(plan.phases[1].tasks.is_empty());
    }

    #[test]
    fn test_parse_plan_rejects_empty_and_malformed() {
        assert!(parse_plan("").is_none());
        assert!(parse_plan("   ").is_none());
        assert!(parse_plan(r#"{"phases": []}"#).is_none());
        assert!(parse_plan("not json").is_none());
        assert!(parse_plan(r#"{"phases": [{"tasks": []}]}"#).is_none());
    }

    #[test]
    fn test_request_body_is_camel_case() {
        let json = serde_json::to_value(PlanRequest { project_name: "Shop", description: "Store" }).unwrap();
        assert_eq!(json, serde_json::json!({"projectName": "Shop", "description": "Store"}));
    }
}
