mod browser;
mod llm;
mod server;
mod storage;
mod tools;
mod workflow;

pub use browser::*;
pub use llm::*;
pub use server::*;
pub use storage::*;
pub use tools::*;
pub use workflow::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl Config {
    /// Load configuration: optional `config.toml`, then the environment
    /// overlay (env wins, which is how deployments inject credentials).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", p.display())))?
            }
            _ => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay the recognised environment keys onto the config tree.
    pub fn apply_env(&mut self) {
        overlay(&mut self.llm.basic.api_key, "BASIC_API_KEY");
        overlay(&mut self.llm.basic.model, "BASIC_MODEL");
        overlay(&mut self.llm.basic.base_url, "BASIC_BASE_URL");
        overlay(&mut self.llm.reasoning.api_key, "REASONING_API_KEY");
        overlay(&mut self.llm.reasoning.model, "REASONING_MODEL");
        overlay(&mut self.llm.reasoning.base_url, "REASONING_BASE_URL");
        overlay(&mut self.llm.vision.api_key, "VL_API_KEY");
        overlay(&mut self.llm.vision.model, "VL_MODEL");
        overlay(&mut self.llm.vision.base_url, "VL_BASE_URL");

        overlay(&mut self.tools.search.tavily_api_key, "TAVILY_API_KEY");
        if let Some(n) = env_parse::<usize>("TAVILY_MAX_RESULTS") {
            self.tools.search.max_results = n;
        }

        if let Ok(p) = std::env::var("CHROME_INSTANCE_PATH") {
            if !p.is_empty() {
                self.browser.instance_path = Some(p.into());
            }
        }
        if let Some(b) = env_parse::<bool>("CHROME_HEADLESS") {
            self.browser.headless = b;
        }
        overlay_opt(&mut self.browser.proxy_server, "CHROME_PROXY_SERVER");
        overlay_opt(&mut self.browser.proxy_username, "CHROME_PROXY_USERNAME");
        overlay_opt(&mut self.browser.proxy_password, "CHROME_PROXY_PASSWORD");
        if let Some(b) = env_parse::<bool>("BROWSER_USE_TEXT_ONLY") {
            self.browser.text_only = b;
        }

        overlay(&mut self.storage.database_url, "DATABASE_URL");

        overlay(&mut self.server.host, "MEDFLOW_HOST");
        if let Some(p) = env_parse::<u16>("MEDFLOW_PORT") {
            self.server.port = p;
        }
    }

    /// Validate the assembled configuration. Errors abort startup;
    /// warnings are logged and the server boots anyway.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if !self.llm.basic.is_configured() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.basic".into(),
                message: "BASIC_API_KEY/BASIC_MODEL unset — chat turns will fail until \
                          credentials are configured"
                    .into(),
            });
        }
        // Reasoning falls back to basic; only half-configured is an error.
        if !self.llm.reasoning.model.is_empty() && self.llm.reasoning.api_key.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "llm.reasoning".into(),
                message: "REASONING_MODEL set without REASONING_API_KEY".into(),
            });
        }
        if self.tools.search.max_results == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "tools.search.max_results".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.workflow.max_steps == 0 || self.workflow.max_react_loops == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "workflow".into(),
                message: "max_steps and max_react_loops must be at least 1".into(),
            });
        }
        if self.browser.max_sessions == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "browser.max_sessions".into(),
                message: "must be at least 1".into(),
            });
        }

        issues
    }
}

fn overlay(target: &mut String, key: &str) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *target = v;
        }
    }
}

fn overlay_opt(target: &mut Option<String>, key: &str) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *target = Some(v);
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        let errors: Vec<_> = config
            .validate()
            .into_iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn toml_round_trip_keeps_defaults() {
        let raw = r#"
            [server]
            port = 9000

            [llm.basic]
            api_key = "k"
            model = "gpt-4o-mini"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.llm.basic.is_configured());
        assert_eq!(config.workflow.max_react_loops, 10);
    }

    #[test]
    fn database_path_strips_sqlite_scheme() {
        let storage = StorageConfig {
            database_url: "sqlite:///var/lib/medflow.db".into(),
        };
        assert_eq!(storage.database_path(), "/var/lib/medflow.db");

        let bare = StorageConfig {
            database_url: "./data/medflow.db".into(),
        };
        assert_eq!(bare.database_path(), "./data/medflow.db");
    }

    #[test]
    fn zero_max_results_is_an_error() {
        let mut config = Config::default();
        config.tools.search.max_results = 0;
        assert!(config
            .validate()
            .iter()
            .any(|i| i.severity == ConfigSeverity::Error));
    }
}
