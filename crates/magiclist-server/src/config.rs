use std::{path::PathBuf, time::Duration};

use crate::error::Result;
pub use clap::Parser;
use magiclist_app::{state::AppConfig, suggest::SuggestConfig};
use magiclist_types::config::BackendConfig;
use url::Url;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "MAGICLIST_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "MAGICLIST_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[command(flatten)]
    pub backend: BackendConfig,

    #[arg(
        long,
        env = "MAGICLIST_DEFAULT_PAGE_SIZE",
        default_value = "100",
        value_parser = clap::value_parser!(u32).range(1..=1000),
        help = "Default page size"
    )]
    pub default_page_size: u32,

    #[arg(long, env = "MAGICLIST_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,

    #[arg(
        long,
        env = "MAGICLIST_LLM_URL",
        default_value = "https://api.openai.com/v1/chat/completions",
        help = "Chat completions endpoint used for field suggestions"
    )]
    pub llm_url: Url,

    #[arg(
        long,
        env = "MAGICLIST_LLM_MODEL",
        default_value = "gpt-4o-mini",
        help = "Model name used for field suggestions"
    )]
    pub llm_model: String,

    #[arg(
        long,
        env = "MAGICLIST_LLM_API_KEY",
        hide_env_values = true,
        help = "API key for suggestions endpoint, suggestions are disabled without it"
    )]
    pub llm_api_key: Option<String>,

    #[arg(
        long,
        env = "MAGICLIST_LLM_TIMEOUT",
        default_value = "30s",
        help = "Timeout of suggestion requests in human friendly format (e.g. 30s, 1m)",
        value_parser = humantime::parse_duration
    )]
    pub llm_timeout: Duration,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.backend.data_dir()
    }

    pub fn database_url(&self) -> String {
        self.backend.database_url()
    }

    pub fn cors(&self) -> bool {
        !self.no_cors
    }

    /// `None` when no API key is set.
    pub fn suggest_config(&self) -> Option<SuggestConfig> {
        self.llm_api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| SuggestConfig {
                api_url: self.llm_url.clone(),
                model: self.llm_model.clone(),
                api_key: key.clone(),
                timeout: self.llm_timeout,
            })
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            default_page_size: config.default_page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["magiclist-server", "--data-dir", "/tmp/ml"]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.default_page_size, 100);
        assert!(config.cors());
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.database_url(), "sqlite:///tmp/ml/magiclist.db");
    }

    #[test]
    fn test_suggest_config() {
        let config = ServerConfig::try_parse_from([
            "magiclist-server",
            "--data-dir",
            "/tmp/ml",
            "--llm-api-key",
            "sk-test",
            "--llm-timeout",
            "5s",
            "--no-cors",
        ])
        .unwrap();
        let suggest = config.suggest_config().unwrap();
        assert_eq!(suggest.api_key, "sk-test");
        assert_eq!(suggest.timeout, Duration::from_secs(5));
        assert!(!config.cors());

        let config = ServerConfig::try_parse_from([
            "magiclist-server",
            "--data-dir",
            "/tmp/ml",
            "--llm-api-key",
            " ",
        ])
        .unwrap();
        assert!(config.suggest_config().is_none());
    }

    #[test]
    fn test_page_size_range() {
        assert!(ServerConfig::try_parse_from([
            "magiclist-server",
            "--default-page-size",
            "0"
        ])
        .is_err());
    }
}
