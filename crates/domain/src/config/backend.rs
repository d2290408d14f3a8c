use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Answering backend connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_send_message_path")]
    pub send_message_path: String,
    /// Upper bound for a whole streamed answer, not a single read.
    #[serde(default = "d_300000")]
    pub timeout_ms: u64,
    /// Environment variable holding the bearer token.  When the variable is
    /// unset or empty the request is sent without `Authorization`.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_true")]
    pub use_agentic_search: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            send_message_path: d_send_message_path(),
            timeout_ms: 300_000,
            api_key_env: d_api_key_env(),
            use_agentic_search: true,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL of the streaming send-message endpoint.
    pub fn send_message_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.send_message_path
        )
    }
}

fn d_base_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn d_send_message_path() -> String {
    "/chat/send-message".into()
}

fn d_300000() -> u64 {
    300_000
}

fn d_api_key_env() -> String {
    "DS_API_KEY".into()
}

fn d_true() -> bool {
    true
}
