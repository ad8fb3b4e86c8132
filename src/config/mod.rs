pub mod defaults;
pub mod types;

pub use types::{Config, ConfigError, SERVER_ENV_VAR};
