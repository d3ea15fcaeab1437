//! `GET /api/team_members` — the agent registry listing.

use axum::Json;

use mf_domain::agents::AGENT_REGISTRY;

pub async fn team_members() -> Json<serde_json::Value> {
    let members: Vec<serde_json::Value> = AGENT_REGISTRY
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "description": p.description,
                "optional": p.optional,
            })
        })
        .collect();

    Json(serde_json::json!({ "team_members": members }))
}
