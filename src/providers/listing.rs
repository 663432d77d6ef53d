//! Event listing API client.

use eventmap_core::config::SourceConfig;
use eventmap_core::{Listing, SyncError, SyncResult};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::warn;
use url::Url;

pub struct ListingSource {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl ListingSource {
    pub fn new(client: reqwest::Client, cfg: &SourceConfig) -> Self {
        ListingSource {
            client,
            endpoint: cfg.endpoint.clone(),
            token: cfg.token.clone(),
        }
    }

    /// Fetch every listed event. Array entries that aren't objects are
    /// logged and left out rather than failing the batch.
    pub async fn fetch(&self) -> SyncResult<Vec<Listing>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(AUTHORIZATION, format!("Token token=\"{}\"", self.token))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SyncError::Source(e.to_string()))?;

        let entries: Vec<Value> = response
            .json()
            .await
            .map_err(|e| SyncError::Source(format!("unexpected response: {e}")))?;

        let listings = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!(index, error = %e, "skipping unreadable listing");
                    None
                }
            })
            .collect();

        Ok(listings)
    }
}
