use std::sync::Arc;

use mf_domain::config::Config;
use mf_domain::error::Result;
use mf_llm::LlmRouter;
use mf_store::SessionStore;
use mf_tools::abstracts::AbstractSearchTool;
use mf_tools::browser::{BrowserPool, BrowserTool};
use mf_tools::crawl::CrawlTool;
use mf_tools::exec::{PythonExecTool, ShellExecTool};
use mf_tools::search::WebSearchTool;
use mf_tools::ToolRegistry;

use crate::workflow::session_lock::SessionLockMap;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SessionStore>,
    pub llm: LlmRouter,
    pub tools: Arc<ToolRegistry>,
    pub browser_pool: Arc<BrowserPool>,
    pub session_locks: Arc<SessionLockMap>,
}

impl AppState {
    /// Wire up every shared service from the loaded configuration.
    pub fn build(config: Arc<Config>) -> Result<Self> {
        let store = Arc::new(SessionStore::open(config.storage.database_path())?);
        let llm = LlmRouter::from_config(&config.llm)?;

        let browser_pool = Arc::new(BrowserPool::new(config.browser.clone()));

        let mut tools = ToolRegistry::new(config.tools.retry.clone());
        tools.register(Arc::new(WebSearchTool::new(config.tools.search.clone())));
        tools.register(Arc::new(CrawlTool::new()));
        tools.register(Arc::new(AbstractSearchTool::new(
            config.tools.search.max_results,
        )));
        tools.register(Arc::new(PythonExecTool::new(config.tools.exec.clone())));
        tools.register(Arc::new(ShellExecTool::new(config.tools.exec.clone())));
        tools.register(Arc::new(BrowserTool::new(browser_pool.clone())));

        Ok(Self {
            config,
            store,
            llm,
            tools: Arc::new(tools),
            browser_pool,
            session_locks: Arc::new(SessionLockMap::new()),
        })
    }
}
