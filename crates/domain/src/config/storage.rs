use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database location. Accepts a bare path or a
    /// `sqlite://path` URL (the scheme is stripped). `:memory:` gives an
    /// in-process ephemeral store.
    #[serde(default = "d_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: d_database_url(),
        }
    }
}

impl StorageConfig {
    /// The filesystem path (or `:memory:`) behind `database_url`.
    pub fn database_path(&self) -> &str {
        self.database_url
            .strip_prefix("sqlite://")
            .unwrap_or(&self.database_url)
    }
}

fn d_database_url() -> String {
    "./data/medflow.db".into()
}
