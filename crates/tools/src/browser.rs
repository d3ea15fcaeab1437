//! Browser drive tool and the process-wide browser pool.
//!
//! The pool bounds total concurrent browser sessions and keeps a handle
//! to every active drive so cancellation can reach it. Each drive runs
//! the configured Chromium binary headless against a URL, returns the
//! rendered page as text, and names the trace artifact (written by the
//! recording driver when one is attached) under the history directory.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Semaphore;

use mf_domain::config::BrowserConfig;

use crate::cancel::CancelToken;
use crate::crawl::html_to_text;
use crate::error::ToolError;
use crate::{Tool, ToolContext};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide pool of browser sessions.
pub struct BrowserPool {
    config: BrowserConfig,
    slots: Arc<Semaphore>,
    /// tool_call_id -> per-drive cancel handle.
    active: Mutex<HashMap<String, CancelToken>>,
}

impl BrowserPool {
    pub fn new(config: BrowserConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_sessions));
        Self {
            config,
            slots,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Number of drives currently holding a slot.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Cancel every active drive (server shutdown, orchestrator cleanup).
    pub fn abort_all(&self) {
        for (id, token) in self.active.lock().iter() {
            tracing::info!(tool_call_id = %id, "aborting browser drive");
            token.cancel();
        }
    }

    fn track(&self, id: &str, token: CancelToken) {
        self.active.lock().insert(id.to_owned(), token);
    }

    fn untrack(&self, id: &str) {
        self.active.lock().remove(id);
    }

    /// Run one drive inside a pool slot.
    async fn drive(&self, url: &str, ctx: &ToolContext) -> Result<String, ToolError> {
        let chrome = self
            .config
            .instance_path
            .as_ref()
            .ok_or_else(|| {
                ToolError::Permanent("CHROME_INSTANCE_PATH is not configured".into())
            })?;

        let _slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ToolError::Permanent("browser pool is closed".into()))?;

        // Per-drive token: cancelled by the run token or by abort_all.
        let drive_token = CancelToken::new();
        self.track(&ctx.tool_call_id, drive_token.clone());

        ctx.report_progress(serde_json::json!({
            "status": "navigating",
            "url": url,
        }));

        let mut cmd = Command::new(chrome);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--dump-dom");
        if let Some(proxy) = &self.config.proxy_server {
            cmd.arg(format!("--proxy-server={proxy}"));
        }
        cmd.arg(url);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                self.untrack(&ctx.tool_call_id);
                return Err(ToolError::Permanent(format!("failed to spawn browser: {e}")));
            }
        };

        let timeout = Duration::from_secs(self.config.drive_timeout_sec);
        let result = tokio::select! {
            out = child.wait_with_output() => match out {
                Ok(out) if out.status.success() => {
                    let dom = String::from_utf8_lossy(&out.stdout);
                    Ok(html_to_text(&dom))
                }
                Ok(out) => Err(ToolError::Permanent(format!(
                    "browser exited with code {}",
                    out.status.code().unwrap_or(-1)
                ))),
                Err(e) => Err(ToolError::Permanent(format!("browser: {e}"))),
            },
            _ = tokio::time::sleep(timeout) => Err(ToolError::Timeout(format!(
                "browser drive exceeded {}s", self.config.drive_timeout_sec
            ))),
            _ = wait_any_cancel(&ctx.cancel, &drive_token) => {
                Err(ToolError::Permanent("browser drive cancelled".into()))
            }
        };

        self.untrack(&ctx.tool_call_id);
        result
    }

    /// Trace artifact filename for a drive, when the recording driver
    /// wrote one into the history directory.
    fn trace_artifact(&self, tool_call_id: &str) -> Option<String> {
        let name = format!("{tool_call_id}.gif");
        self.config
            .history_dir
            .join(&name)
            .exists()
            .then_some(name)
    }
}

async fn wait_any_cancel(run: &CancelToken, drive: &CancelToken) {
    loop {
        if run.is_cancelled() || drive.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct BrowserTool {
    pool: Arc<BrowserPool>,
}

impl BrowserTool {
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn description(&self) -> &'static str {
        "Open a URL in a real browser session and return the rendered page text. \
         Use for sites that plain crawling cannot read."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "The page to open."},
                "instruction": {
                    "type": "string",
                    "description": "What to look for on the page."
                }
            },
            "required": ["url"]
        })
    }

    fn idempotent(&self) -> bool {
        false
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::Validation("url is required".into()))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::Validation(format!("not an http(s) URL: {url}")));
        }

        let mut text = self.pool.drive(url, ctx).await?;

        if let Some(artifact) = self.pool.trace_artifact(&ctx.tool_call_id) {
            text.push_str(&format!("\n\n[browser trace: {artifact}]"));
        }
        Ok(text)
    }
}
