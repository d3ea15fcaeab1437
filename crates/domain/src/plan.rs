use serde::{Deserialize, Serialize};

/// The planner's structured breakdown of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub thought: String,
    pub title: String,
    pub steps: Vec<PlanStep>,
}

/// One step of the plan, assigned to a named team member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent_name: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
