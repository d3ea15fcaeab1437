//! Abstract search against PubMed's E-utilities.
//!
//! Two-step flow: esearch resolves the query to PMIDs, esummary pulls
//! title/journal/date for each. Abstract text itself lives behind
//! efetch; summaries are enough for the researcher to pick what to
//! crawl.

use serde_json::Value;

use crate::error::ToolError;
use crate::{Tool, ToolContext};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const ESUMMARY_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";

pub struct AbstractSearchTool {
    client: reqwest::Client,
    max_results: usize,
}

impl AbstractSearchTool {
    pub fn new(max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client with static options");
        Self {
            client,
            max_results,
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ToolError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ToolError::Network(format!("eutils HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ToolError::Permanent(format!("eutils HTTP {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::Network(format!("eutils body: {e}")))
    }

    pub async fn search(&self, query: &str) -> Result<String, ToolError> {
        let max = self.max_results.to_string();
        let esearch = self
            .get_json(
                ESEARCH_URL,
                &[
                    ("db", "pubmed"),
                    ("retmode", "json"),
                    ("retmax", &max),
                    ("term", query),
                ],
            )
            .await?;

        let ids: Vec<String> = esearch
            .pointer("/esearchresult/idlist")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        if ids.is_empty() {
            return Ok("No PubMed records found.".into());
        }

        let id_list = ids.join(",");
        let esummary = self
            .get_json(
                ESUMMARY_URL,
                &[("db", "pubmed"), ("retmode", "json"), ("id", &id_list)],
            )
            .await?;

        Ok(render_summaries(&esummary, &ids))
    }
}

fn render_summaries(esummary: &Value, ids: &[String]) -> String {
    let mut lines = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let Some(doc) = esummary.pointer(&format!("/result/{id}")) else {
            continue;
        };
        let title = doc.get("title").and_then(|v| v.as_str()).unwrap_or("(no title)");
        let source = doc.get("source").and_then(|v| v.as_str()).unwrap_or("");
        let pubdate = doc.get("pubdate").and_then(|v| v.as_str()).unwrap_or("");
        lines.push(format!(
            "{}. {title}\n   {source} {pubdate} — https://pubmed.ncbi.nlm.nih.gov/{id}/",
            i + 1
        ));
    }
    if lines.is_empty() {
        "No PubMed records found.".into()
    } else {
        lines.join("\n")
    }
}

#[async_trait::async_trait]
impl Tool for AbstractSearchTool {
    fn name(&self) -> &'static str {
        "abstract_search"
    }

    fn description(&self) -> &'static str {
        "Search PubMed for medical literature. Returns titles, journals, dates, and links."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "PubMed query, e.g. 'metformin type 2 diabetes'."}
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
    fn renders_summaries_in_id_order() {
        let ids = vec!["111".to_string(), "222".to_string()];
        let esummary = serde_json::json!({
            "result": {
                "111": {"title": "Metformin outcomes", "source": "Lancet", "pubdate": "2024 Jan"},
                "222": {"title": "GLP-1 comparison", "source": "NEJM", "pubdate": "2023 Nov"}
            }
        });
        let text = render_summaries(&esummary, &ids);
        assert!(text.starts_with("1. Metformin outcomes"));
        assert!(text.contains("https://pubmed.ncbi.nlm.nih.gov/222/"));
    }

    #[test]
    fn missing_docs_render_placeholder() {
        let text = render_summaries(&serde_json::json!({"result": {}}), &["9".into()]);
        assert_eq!(text, "No PubMed records found.");
    }
}
