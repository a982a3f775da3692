use crate::domain::{ChainId, PositionVersion};
use crate::engine::DEFAULT_PAGE_SIZE;
use std::collections::HashMap;
use thiserror::Error;

/// One configured indexing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerEndpoint {
    pub chain_id: ChainId,
    pub version: PositionVersion,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub indexer_endpoints: Vec<IndexerEndpoint>,
    pub underlying_api_url: String,
    pub indexer_page_size: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let indexer_endpoints = env_map
            .get("INDEXER_ENDPOINTS")
            .ok_or_else(|| ConfigError::MissingEnv("INDEXER_ENDPOINTS".to_string()))
            .and_then(|raw| parse_indexer_endpoints(raw))?;

        let underlying_api_url = env_map
            .get("UNDERLYING_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("UNDERLYING_API_URL".to_string()))?;

        let default_page_size = DEFAULT_PAGE_SIZE.to_string();
        let indexer_page_size = env_map
            .get("INDEXER_PAGE_SIZE")
            .unwrap_or(&default_page_size)
            .parse::<usize>()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "INDEXER_PAGE_SIZE".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            indexer_endpoints,
            underlying_api_url,
            indexer_page_size,
        })
    }
}

/// Parse `chainId:vN=url` entries separated by commas.
fn parse_indexer_endpoints(raw: &str) -> Result<Vec<IndexerEndpoint>, ConfigError> {
    let invalid = |entry: &str, reason: &str| {
        ConfigError::InvalidValue(
            "INDEXER_ENDPOINTS".to_string(),
            format!("{} in entry {:?}", reason, entry),
        )
    };

    let mut endpoints = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (target, url) = entry
            .split_once('=')
            .ok_or_else(|| invalid(entry, "expected chainId:vN=url"))?;
        let (chain, version) = target
            .split_once(':')
            .ok_or_else(|| invalid(entry, "expected chainId:vN"))?;
        let chain_id = chain
            .trim()
            .parse::<u64>()
            .map(ChainId)
            .map_err(|_| invalid(entry, "chain id must be an integer"))?;
        let version = version
            .parse::<PositionVersion>()
            .map_err(|e| invalid(entry, &e.to_string()))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(invalid(entry, "url is empty"));
        }
        endpoints.push(IndexerEndpoint {
            chain_id,
            version,
            url: url.to_string(),
        });
    }

    if endpoints.is_empty() {
        return Err(ConfigError::InvalidValue(
            "INDEXER_ENDPOINTS".to_string(),
            "at least one endpoint is required".to_string(),
        ));
    }
    Ok(endpoints)
}
