//! Web search via the Tavily API.

use serde::Deserialize;
use serde_json::Value;

use mf_domain::config::SearchConfig;

use crate::error::ToolError;
use crate::{Tool, ToolContext};

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct WebSearchTool {
    config: SearchConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl WebSearchTool {
    pub fn new(config: SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client with static options");
        Self { config, client }
    }

    /// Run a search directly (used by the planner's pre-enrichment,
    /// which bypasses the LLM tool-call path).
    pub async fn search(&self, query: &str) -> Result<String, ToolError> {
        if self.config.tavily_api_key.is_empty() {
            return Err(ToolError::Permanent("TAVILY_API_KEY is not configured".into()));
        }

        let body = serde_json::json!({
            "api_key": self.config.tavily_api_key,
            "query": query,
            "max_results": self.config.max_results,
        });

        let response = self
            .client
            .post(TAVILY_URL)
            .json(&body)
            .send()
            .await
            .map_err(ToolError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ToolError::Network(format!("tavily HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ToolError::Permanent(format!("tavily HTTP {status}")));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ToolError::Network(format!("tavily body: {e}")))?;

        Ok(render_results(&parsed))
    }
}

fn render_results(parsed: &TavilyResponse) -> String {
    if parsed.results.is_empty() {
        return "No results found.".into();
    }
    parsed
        .results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} ({})\n{}", i + 1, r.title, r.url, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web. Returns titles, URLs, and content snippets for the top results."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query."}
            },
            "required": ["query"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::Validation("query is required".into()))?;
        self.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_results_with_ordinals() {
        let parsed = TavilyResponse {
            results: vec![
                TavilyResult {
                    title: "Flu treatment".into(),
                    url: "https://example.org/flu".into(),
                    content: "Antivirals within 48h.".into(),
                },
                TavilyResult {
                    title: "CDC guidance".into(),
                    url: "https://example.org/cdc".into(),
                    content: String::new(),
                },
            ],
        };
        let text = render_results(&parsed);
        assert!(text.starts_with("1. Flu treatment"));
        assert!(text.contains("2. CDC guidance"));
    }

    #[test]
    fn empty_results_render_placeholder() {
        let parsed = TavilyResponse { results: vec![] };
        assert_eq!(render_results(&parsed), "No results found.");
    }

    #[tokio::test]
    async fn missing_query_is_validation_error() {
        let tool = WebSearchTool::new(SearchConfig::default());
        let ctx = ToolContext {
            tool_call_id: "t".into(),
            tool_name: "web_search".into(),
            cancel: crate::CancelToken::new(),
            progress: None,
        };
        let err = tool.invoke(serde_json::json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_api_key_is_permanent() {
        let tool = WebSearchTool::new(SearchConfig::default());
        let err = tool.search("flu").await.unwrap_err();
        assert!(matches!(err, ToolError::Permanent(_)));
    }
}
