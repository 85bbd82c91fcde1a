// src/config.rs

use anyhow::{anyhow, bail, Context, Result};
use std::{env, path::PathBuf};
use url::Url;

pub const DEFAULT_API_URL: &str = "https://deep-index.moralis.io/api/v2.2";
/// USDT on Ethereum mainnet.
pub const DEFAULT_TOKEN_ADDRESS: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const DEFAULT_CHAIN: &str = "0x1";
pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const DEFAULT_MAX_ROWS: usize = 10_000;
pub const DEFAULT_OUTPUT_PATH: &str = "usdt_transfers.csv";

/// Everything the exporter needs, read once at start-up.
#[derive(Clone)]
pub struct FetchConfig {
    pub api_url: Url,
    pub api_key: String,
    pub token_address: String,
    pub chain: String,
    /// Rows requested per page.
    pub page_limit: usize,
    /// Overall cap on exported rows.
    pub max_rows: usize,
    pub output_path: PathBuf,
}

impl std::fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("token_address", &self.token_address)
            .field("chain", &self.chain)
            .field("page_limit", &self.page_limit)
            .field("max_rows", &self.max_rows)
            .field("output_path", &self.output_path)
            .finish()
    }
}

impl FetchConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("MORALIS_API_KEY")
            .ok_or_else(|| anyhow!("MORALIS_API_KEY must be set to a non-empty API key"))?;

        let raw_url = get("MORALIS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url =
            Url::parse(&raw_url).with_context(|| format!("parsing MORALIS_API_URL {:?}", raw_url))?;

        let cfg = Self {
            api_url,
            api_key,
            token_address: get("TOKEN_ADDRESS").unwrap_or_else(|| DEFAULT_TOKEN_ADDRESS.to_string()),
            chain: get("CHAIN").unwrap_or_else(|| DEFAULT_CHAIN.to_string()),
            page_limit: parse_count(get("PAGE_LIMIT"), "PAGE_LIMIT", DEFAULT_PAGE_LIMIT)?,
            max_rows: parse_count(get("MAX_ROWS"), "MAX_ROWS", DEFAULT_MAX_ROWS)?,
            output_path: get("OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
        };
        Ok(cfg)
    }
}

fn parse_count(raw: Option<String>, key: &str, default: usize) -> Result<usize> {
    let value = match raw {
        Some(s) => s
            .parse::<usize>()
            .with_context(|| format!("{} must be a positive integer, got {:?}", key, s))?,
        None => default,
    };
    if value == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(value)
}
