use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::debug;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rate_limit_per_hour: u32,
    pub transcript_rate_limit_per_hour: u32,
    /// Deadline for the whole fallback sequence of one transcript request
    pub fetch_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            rate_limit_per_hour: 100,
            transcript_rate_limit_per_hour: 50,
            fetch_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
            http: HttpConfig::default(),
        }
    }
}

/// Outbound headers and timeouts for requests to YouTube
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub accept: String,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US,en;q=0.9,pt-BR;q=0.8,pt;q=0.7".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl HttpConfig {
    /// Build the process-wide client; headers are fixed here, not per request
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&self.accept_language).wrap_err("invalid accept_language header")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_str(&self.accept).wrap_err("invalid accept header")?);
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()?;
        Ok(client)
    }
}

impl Config {
    /// Load config from `path`, or ~/.config/ytscribe/config.toml if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::load_file(&path)
                } else {
                    debug!("No config file found at {}", path.display());
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content =
            std::fs::read_to_string(path).wrap_err_with(|| format!("reading config {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).wrap_err_with(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Apply a `PORT` value from the environment; unparsable values are ignored
    pub fn with_port_override(mut self, port: Option<&str>) -> Self {
        if let Some(port) = port.and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytscribe")
        .join("config.toml")
}
