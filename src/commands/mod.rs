pub mod fetch;
pub mod load;

use anyhow::{Context, Result};
use eventmap_core::JsonStore;
use eventmap_core::config::EventmapConfig;

use crate::providers::arcgis::{Session, token};

/// The working set file named in the config.
pub fn open_store(cfg: &EventmapConfig) -> JsonStore {
    JsonStore::new(cfg.store_path())
}

/// Sign in to ArcGIS and return a session for REST calls.
pub async fn arcgis_session(cfg: &EventmapConfig, client: &reqwest::Client) -> Result<Session> {
    let arcgis = cfg.arcgis()?;

    let token = token::generate(client, arcgis)
        .await
        .context("Failed to get an ArcGIS token")?;

    Ok(Session::new(client.clone(), token, &arcgis.referer()?))
}
