use anyhow::{Context, Result};
use eventmap_core::config::EventmapConfig;
use eventmap_core::{RecordStore, project};
use tracing::info;

use crate::providers::arcgis::FeatureLayer;

use super::{arcgis_session, open_store};

pub struct LoadSummary {
    pub processed: usize,
    pub created: usize,
    pub failed: usize,
}

/// Delete features for events that are gone, then create features for
/// geocoded events that don't have one yet.
pub async fn run(cfg: &EventmapConfig, client: &reqwest::Client) -> Result<LoadSummary> {
    let store = open_store(cfg);
    let records = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    let target = cfg.feature_layer()?.target()?;
    let session = arcgis_session(cfg, client).await?;
    let layer = FeatureLayer::resolve(session, cfg.arcgis()?, &target)
        .await
        .context("Failed to resolve feature layer")?;
    info!(layer = %layer.url(), "syncing features");

    let projected = project(records, &layer, &store)
        .await
        .context("Feature sync stopped")?;

    let stats = projected.stats;
    info!(
        deleted = stats.deleted,
        created = stats.created,
        failed = stats.failed,
        already_created = stats.already_created,
        not_geocoded = stats.not_geocoded,
        "feature sync done"
    );

    Ok(LoadSummary {
        processed: projected.records.len(),
        created: stats.created,
        failed: stats.failed,
    })
}
