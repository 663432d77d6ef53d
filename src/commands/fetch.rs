use anyhow::{Context, Result};
use eventmap_core::config::EventmapConfig;
use eventmap_core::{RecordStore, enrich, reconcile};
use tracing::info;

use crate::providers::arcgis::ArcgisGeocoder;
use crate::providers::listing::ListingSource;

use super::{arcgis_session, open_store};

/// Fetch listings, fold them into the working set and geocode what's new.
///
/// Returns the number of events in the working set.
pub async fn run(cfg: &EventmapConfig, client: &reqwest::Client) -> Result<usize> {
    let store = open_store(cfg);
    let stored = store
        .load()
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    let source = ListingSource::new(client.clone(), cfg.source()?);
    let listings = source.fetch().await.context("Failed to fetch events")?;
    info!(fetched = listings.len(), stored = stored.len(), "fetched events");

    let reconciled = reconcile(listings, &stored)?;
    let stats = reconciled.stats;
    info!(
        added = stats.added,
        changed = stats.changed,
        unchanged = stats.unchanged,
        removed = stats.removed,
        skipped = stats.skipped,
        "reconciled with {}",
        store.path().display()
    );

    store
        .save(&reconciled.records)
        .with_context(|| format!("Failed to write {}", store.path().display()))?;

    let pending = reconciled
        .records
        .iter()
        .filter(|r| !r.is_geocoded() && r.address().is_some())
        .count();

    if pending == 0 {
        info!("nothing to geocode");
        return Ok(reconciled.records.len());
    }

    info!(pending, "geocoding new and changed events");
    let session = arcgis_session(cfg, client).await?;
    let geocoder = ArcgisGeocoder::new(session, &cfg.geocoder)?;

    let enriched = enrich(reconciled.records, &geocoder, &store)
        .await
        .context("Geocoding stopped")?;

    let stats = enriched.stats;
    info!(
        matched = stats.matched,
        unmatched = stats.unmatched,
        no_address = stats.no_address,
        "geocoding done"
    );

    Ok(enriched.records.len())
}
