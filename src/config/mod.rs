use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub reporting: ReportingConfig,
    pub insights: InsightsConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream reporting API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub base_url: String,
    #[serde(default = "ReportingConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ReportingConfig {
    const fn default_timeout_secs() -> u64 {
        30
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Generative-text service settings for the insight lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default = "InsightsConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl InsightsConfig {
    const fn default_timeout_secs() -> u64 {
        60
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default freshness window for report views, in seconds.
    #[serde(default = "CacheConfig::default_report_ttl_secs")]
    pub report_ttl_secs: u64,
    /// Freshness window for generated insights, in seconds.
    #[serde(default = "CacheConfig::default_insight_ttl_secs")]
    pub insight_ttl_secs: u64,
}

impl CacheConfig {
    const fn default_report_ttl_secs() -> u64 {
        3600
    }

    const fn default_insight_ttl_secs() -> u64 {
        86_400
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres, memory"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./vantage.db".to_string());

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let reporting_base_url = std::env::var("REPORTING_BASE_URL")
            .unwrap_or_else(|_| "https://analyticsdata.googleapis.com".to_string());
        let reporting_timeout_secs = std::env::var("REPORTING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(ReportingConfig::default_timeout_secs);

        let insights_base_url = std::env::var("INSIGHTS_BASE_URL")
            .context("INSIGHTS_BASE_URL must be set (generative-text service endpoint)")?;
        let insights_api_key = std::env::var("INSIGHTS_API_KEY").ok();
        let insights_model =
            std::env::var("INSIGHTS_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let insights_timeout_secs = std::env::var("INSIGHTS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(InsightsConfig::default_timeout_secs);

        let report_ttl_secs = std::env::var("REPORT_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(CacheConfig::default_report_ttl_secs);
        let insight_ttl_secs = std::env::var("INSIGHT_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(CacheConfig::default_insight_ttl_secs);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            reporting: ReportingConfig {
                base_url: reporting_base_url,
                timeout_secs: reporting_timeout_secs,
            },
            insights: InsightsConfig {
                base_url: insights_base_url,
                api_key: insights_api_key,
                model: insights_model,
                timeout_secs: insights_timeout_secs,
            },
            cache: CacheConfig {
                report_ttl_secs,
                insight_ttl_secs,
            },
        })
    }
}
