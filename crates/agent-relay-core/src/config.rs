//! Client configuration for the streaming adapter.
//!
//! The wire shapes are fixed by the protocol; the endpoint locations are
//! deployment detail and live here.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://api.agent-relay.dev".into()
}

fn default_run_path() -> String {
    "/v1/tasks/stream".into()
}

fn default_task_path() -> String {
    "/v1/tasks".into()
}

/// Where and as whom the adapter talks to the remote agent-execution
/// service. The access credential itself is supplied per send, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Service origin, no trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// POST path that opens a streaming run.
    #[serde(default = "default_run_path")]
    pub run_path: String,

    /// Base path for per-task operations (`DELETE {task_path}/{id}`).
    #[serde(default = "default_task_path")]
    pub task_path: String,

    /// Identity attached to every request and to cancellation calls.
    pub api_key_id: String,
}

impl RelayConfig {
    pub fn new(api_key_id: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            run_path: default_run_path(),
            task_path: default_task_path(),
            api_key_id: api_key_id.into(),
        }
    }

    /// Environment overrides: `AGENT_RELAY_BASE_URL`, `AGENT_RELAY_KEY_ID`.
    pub fn from_env() -> Self {
        let mut config = Self::new(std::env::var("AGENT_RELAY_KEY_ID").unwrap_or_default());
        if let Ok(url) = std::env::var("AGENT_RELAY_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn run_url(&self) -> String {
        format!("{}{}", self.base_url, self.run_path)
    }

    pub fn task_url(&self, task_id: &str) -> String {
        format!("{}{}/{}", self.base_url, self.task_path, task_id)
    }
}
