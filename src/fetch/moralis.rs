use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{TransferPage, TransferSource, TransfersResponse};
use crate::config::FetchConfig;

/// `TransferSource` backed by the Moralis `erc20/{address}/transfers` endpoint.
pub struct MoralisClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    chain: String,
    limit: usize,
}

impl MoralisClient {
    pub fn new(client: Client, cfg: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: transfers_endpoint(&cfg.api_url, &cfg.token_address)?,
            api_key: cfg.api_key.clone(),
            chain: cfg.chain.clone(),
            limit: cfg.page_limit,
        })
    }

    /// Full request URL for one page, most recent transfers first.
    pub fn page_url(&self, cursor: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("chain", &self.chain);
            q.append_pair("limit", &self.limit.to_string());
            q.append_pair("order", "DESC");
            if let Some(c) = cursor {
                q.append_pair("cursor", c);
            }
        }
        url
    }
}

impl TransferSource for MoralisClient {
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<TransferPage> {
        let url = self.page_url(cursor);
        debug!(endpoint = %self.endpoint, has_cursor = cursor.is_some(), "requesting page");

        let resp = self
            .client
            .get(url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("GET {}", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "HTTP error {} from {}: {}",
                status,
                self.endpoint,
                body.trim()
            ));
        }

        let body: TransfersResponse = resp
            .json()
            .await
            .with_context(|| format!("decoding transfers response from {}", self.endpoint))?;
        Ok(body.into())
    }
}

/// `{base}/erc20/{address}/transfers`, tolerating a trailing slash on `base`.
fn transfers_endpoint(base: &Url, token_address: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("API URL {} cannot be a base", base))?
        .pop_if_empty()
        .extend(["erc20", token_address, "transfers"]);
    Ok(url)
}
