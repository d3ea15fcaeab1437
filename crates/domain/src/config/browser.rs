use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Browser driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Path to the Chrome/Chromium binary driven by the browser worker.
    #[serde(default)]
    pub instance_path: Option<PathBuf>,
    #[serde(default = "d_true")]
    pub headless: bool,
    #[serde(default)]
    pub proxy_server: Option<String>,
    #[serde(default)]
    pub proxy_username: Option<String>,
    #[serde(default)]
    pub proxy_password: Option<String>,
    /// When true, the driver extracts text only (no screenshots in traces).
    #[serde(default)]
    pub text_only: bool,
    /// Directory where `.gif` trace artifacts are written.
    #[serde(default = "d_history_dir")]
    pub history_dir: PathBuf,
    /// Total concurrent browser sessions across all runs.
    #[serde(default = "d_2")]
    pub max_sessions: usize,
    /// Hard timeout for a single browser drive, in seconds.
    #[serde(default = "d_300")]
    pub drive_timeout_sec: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            instance_path: None,
            headless: true,
            proxy_server: None,
            proxy_username: None,
            proxy_password: None,
            text_only: false,
            history_dir: d_history_dir(),
            max_sessions: 2,
            drive_timeout_sec: 300,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_history_dir() -> PathBuf {
    PathBuf::from("./data/browser_history")
}
fn d_2() -> usize {
    2
}
fn d_300() -> u64 {
    300
}
