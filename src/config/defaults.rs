// Defaults for the console configuration file

use super::types::Config;
use crate::core::dashboard::api_gateway::EndpointPaths;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_BASE_PATH: &str = "/omniping";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_CLEAR_SETTLE_MS: u64 = 1000;
pub const DEFAULT_RESTART_RETRY_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 5000;

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            clear_settle_ms: DEFAULT_CLEAR_SETTLE_MS,
            restart_retry_ms: DEFAULT_RESTART_RETRY_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            color: true,
            endpoints: EndpointPaths::default(),
        }
    }
}
