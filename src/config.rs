use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "EVENTWATCH_API_URL";
pub const TIMEOUT_ENV: &str = "EVENTWATCH_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Config {
    /// Resolves the API location: explicit flag first, then the environment,
    /// then the local development address.
    pub fn resolve(api_url: Option<&str>) -> Result<Self> {
        let env_url = std::env::var(API_URL_ENV).ok();
        let raw = api_url
            .map(str::to_string)
            .or(env_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = match std::env::var(TIMEOUT_ENV) {
            Ok(secs) => Duration::from_secs(
                secs.trim()
                    .parse()
                    .with_context(|| format!("{} must be a number of seconds", TIMEOUT_ENV))?,
            ),
            Err(_) => DEFAULT_TIMEOUT,
        };

        Self::new(&raw, timeout)
    }

    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid API URL: {}", api_url))?;
        if api_url.cannot_be_a_base() {
            anyhow::bail!("API URL cannot be used as a base: {}", api_url);
        }

        Ok(Self {
            api_url,
            timeout,
            user_agent: format!("EventWatch/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Joins an absolute API path onto the base URL, keeping any path prefix
    /// the base carries.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.api_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base, path.trim_start_matches('/')));
        url
    }
}
