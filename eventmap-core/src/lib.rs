//! Core of eventmap: the event record model and the three sync stages.
//!
//! - `reconcile`: merge fetched listings into the stored working set
//! - `enrich`: geocode venue addresses
//! - `project`: mirror geocoded records onto a feature layer
//!
//! Remote services are reached through the `Geocoder` and `FeatureService`
//! traits; persistence through `RecordStore`.

pub mod config;
pub mod enrich;
pub mod error;
pub mod project;
pub mod reconcile;
pub mod record;
pub mod store;

#[cfg(test)]
mod testing;

pub use enrich::{EnrichStats, Enriched, Geocoder, enrich};
pub use error::{SyncError, SyncResult};
pub use project::{Feature, FeatureService, ProjectStats, Projected, project};
pub use reconcile::{ReconcileStats, Reconciled, reconcile};
pub use record::{Candidate, EventContent, EventId, Geocode, Listing, Location, Record, RemoteId};
pub use store::{JsonStore, RecordStore};
