//! ArcGIS World Geocoding Service client.

use async_trait::async_trait;
use eventmap_core::config::GeocoderConfig;
use eventmap_core::{Candidate, Geocoder, SyncError, SyncResult};
use serde::Deserialize;
use url::Url;

use super::Session;

pub struct ArcgisGeocoder {
    session: Session,
    url: Url,
    city: String,
    region: String,
}

#[derive(Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl ArcgisGeocoder {
    pub fn new(session: Session, cfg: &GeocoderConfig) -> SyncResult<Self> {
        Ok(ArcgisGeocoder {
            session,
            url: cfg.url()?,
            city: cfg.city.clone(),
            region: cfg.region.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for ArcgisGeocoder {
    async fn find_candidate(&self, address: &str) -> SyncResult<Option<Candidate>> {
        let response: CandidatesResponse = self
            .session
            .get(
                self.url.as_str(),
                &[
                    ("address", address),
                    ("city", self.city.as_str()),
                    ("region", self.region.as_str()),
                    ("maxLocations", "1"),
                ],
            )
            .await
            .map_err(|e| SyncError::Geocoder(format!("{address}: {e}")))?;

        Ok(response.candidates.into_iter().next())
    }
}
