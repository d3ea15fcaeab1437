//! URL crawl: fetch a page and reduce it to readable text.
//!
//! Deliberately simple — script/style blocks are dropped, tags are
//! stripped, entities unescaped, whitespace collapsed. Sites that need
//! real interaction belong to the browser worker.

use serde_json::Value;

use crate::error::ToolError;
use crate::{Tool, ToolContext};

/// Cap on returned text so one page cannot blow up the LLM context.
const MAX_TEXT_CHARS: usize = 20_000;

pub struct CrawlTool {
    client: reqwest::Client,
}

impl Default for CrawlTool {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("medflow/0.1 (+https://github.com/medflow)")
            .build()
            .expect("reqwest client with static options");
        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::Validation(format!("not an http(s) URL: {url}")));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ToolError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ToolError::Network(format!("crawl HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ToolError::Permanent(format!("crawl HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::Network(format!("crawl body: {e}")))?;

        let mut text = html_to_text(&html);
        if text.len() > MAX_TEXT_CHARS {
            let mut end = MAX_TEXT_CHARS;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
            text.push_str("\n[truncated]");
        }
        Ok(text)
    }
}

/// Strip an HTML document down to its visible text.
pub(crate) fn html_to_text(html: &str) -> String {
    // Drop script/style/head blocks wholesale, then strip tags.
    let block_re = regex::Regex::new(
        r"(?is)<script\b.*?</script>|<style\b.*?</style>|<head\b.*?</head>|<noscript\b.*?</noscript>",
    )
    .expect("static regex");
    let tag_re = regex::Regex::new(r"(?s)<[^>]+>").expect("static regex");
    let ws_re = regex::Regex::new(r"[ \t]*\n[ \t\n]*").expect("static regex");

    let without_blocks = block_re.replace_all(html, "\n");
    let without_tags = tag_re.replace_all(&without_blocks, "\n");
    let unescaped = without_tags
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    ws_re.replace_all(unescaped.trim(), "\n").into_owned()
}

#[async_trait::async_trait]
impl Tool for CrawlTool {
    fn name(&self) -> &'static str {
        "crawl"
    }

    fn description(&self) -> &'static str {
        "Fetch a URL and return the page's readable text content."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The http(s) URL to fetch."}
            },
            "required": ["url"]
        })
    }

    fn idempotent(&self) -> bool {
        true
    }

    async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::Validation("url is required".into()))?;
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_script_blocks() {
        let html = r#"<html><head><title>x</title></head>
            <body><script>alert(1)</script><h1>Aspirin</h1>
            <p>Low-dose aspirin &amp; stroke prevention.</p></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Aspirin"));
        assert!(text.contains("Low-dose aspirin & stroke prevention."));
        assert!(!text.contains("alert"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn collapses_blank_runs() {
        let html = "<p>a</p>\n\n\n<p>b</p>";
        assert_eq!(html_to_text(html), "a\nb");
    }

    #[tokio::test]
    async fn non_http_url_is_rejected() {
        let tool = CrawlTool::new();
        let err = tool.fetch("ftp://example.org/x").await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }
}
