use crate::error::{CuError, Result};

pub const DEFAULT_PATH_PREFIX: &str = "/contentunderstanding";
pub const DEFAULT_USER_AGENT: &str = "cu-sample-code";

/// Service connection settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CuConfig {
    pub endpoint: String,
    pub api_version: String,
    pub subscription_key: Option<String>,
    /// Path between the endpoint host and `/analyzers`.
    pub path_prefix: String,
    pub user_agent: String,
}

impl CuConfig {
    pub fn new(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_version: api_version.into(),
            subscription_key: None,
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            endpoint: required_env("AZURE_CU_ENDPOINT")?,
            api_version: required_env("AZURE_CU_API_VERSION")?,
            subscription_key: std::env::var("AZURE_CU_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            path_prefix: std::env::var("AZURE_CU_PATH_PREFIX")
                .unwrap_or_else(|_| DEFAULT_PATH_PREFIX.to_string()),
            user_agent: std::env::var("AZURE_CU_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
        };

        config.log_keys();
        Ok(config)
    }

    /// `{endpoint}{path_prefix}` with no trailing slash.
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        let prefix = self.path_prefix.trim_matches('/');
        if prefix.is_empty() {
            endpoint.to_string()
        } else {
            format!("{endpoint}/{prefix}")
        }
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  AZURE_CU_ENDPOINT: {}", self.endpoint);
        tracing::info!("  AZURE_CU_API_VERSION: {}", self.api_version);
        tracing::info!("  AZURE_CU_API_KEY: {}", preview(&self.subscription_key));
    }
}

/// First five characters of a secret, for logs.
fn preview(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => {
            let head: String = v.chars().take(5).collect();
            format!("{head}...({} chars)", v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}

fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(CuError::Config(format!("{key} environment variable is required"))),
    }
}
