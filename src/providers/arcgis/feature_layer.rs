//! Feature layer client (query / deleteFeatures / addFeatures).

use async_trait::async_trait;
use eventmap_core::config::{ArcgisConfig, LayerTarget};
use eventmap_core::{Feature, FeatureService, RemoteId, SyncError, SyncResult};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{ServiceError, Session};

pub struct FeatureLayer {
    session: Session,
    url: Url,
}

#[derive(Deserialize)]
struct IdsResponse {
    #[serde(default, rename = "objectIds")]
    object_ids: Option<Vec<RemoteId>>,
}

#[derive(Deserialize)]
struct EditResult {
    #[serde(default, rename = "objectId")]
    object_id: Option<RemoteId>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default, rename = "deleteResults")]
    delete_results: Vec<EditResult>,
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(default, rename = "addResults")]
    add_results: Vec<EditResult>,
}

#[derive(Deserialize)]
struct Item {
    url: Option<String>,
}

fn service_error(e: impl std::fmt::Display) -> SyncError {
    SyncError::FeatureService(e.to_string())
}

impl FeatureLayer {
    pub fn new(session: Session, url: Url) -> Self {
        FeatureLayer { session, url }
    }

    /// Resolve the configured target to a layer URL. Portal items are looked
    /// up to find the service they point at.
    pub async fn resolve(
        session: Session,
        arcgis: &ArcgisConfig,
        target: &LayerTarget,
    ) -> SyncResult<Self> {
        let (service_id, layer_id) = match target {
            LayerTarget::Url(url) => return Ok(Self::new(session, url.clone())),
            LayerTarget::Item {
                service_id,
                layer_id,
            } => (service_id, layer_id),
        };

        let item: Item = session
            .get(arcgis.item_url(service_id)?.as_str(), &[])
            .await
            .map_err(|e| service_error(format!("item {service_id}: {e}")))?;

        let service_url = item
            .url
            .ok_or_else(|| service_error(format!("item {service_id} has no service url")))?;

        let layer_url = format!("{}/{layer_id}", service_url.trim_end_matches('/'));
        let url = Url::parse(&layer_url).map_err(|e| service_error(format!("{layer_url}: {e}")))?;

        Ok(Self::new(session, url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{operation}", self.url.as_str().trim_end_matches('/'))
    }
}

#[async_trait]
impl FeatureService for FeatureLayer {
    async fn existing_ids(&self) -> SyncResult<Vec<RemoteId>> {
        let response: IdsResponse = self
            .session
            .get(
                &self.endpoint("query"),
                &[("where", "1=1"), ("returnIdsOnly", "true")],
            )
            .await
            .map_err(service_error)?;

        Ok(response.object_ids.unwrap_or_default())
    }

    async fn delete(&self, ids: &[RemoteId]) -> SyncResult<()> {
        let object_ids = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let response: DeleteResponse = self
            .session
            .post(&self.endpoint("deleteFeatures"), &[("objectIds", object_ids.as_str())])
            .await
            .map_err(service_error)?;

        for result in response.delete_results.iter().filter(|r| !r.success) {
            warn!(
                object_id = ?result.object_id,
                error = ?result.error.as_ref().map(ToString::to_string),
                "feature was not deleted"
            );
        }

        Ok(())
    }

    async fn create(&self, feature: &Feature) -> SyncResult<Option<RemoteId>> {
        let features = serde_json::to_string(&[feature])
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        let response: AddResponse = self
            .session
            .post(&self.endpoint("addFeatures"), &[("features", features.as_str())])
            .await
            .map_err(service_error)?;

        match response.add_results.into_iter().next() {
            Some(EditResult {
                success: true,
                object_id: Some(id),
                ..
            }) => Ok(Some(id)),
            Some(result) => {
                debug!(
                    error = ?result.error.as_ref().map(ToString::to_string),
                    "addFeatures rejected feature"
                );
                Ok(None)
            }
            None => {
                debug!("addFeatures returned no results");
                Ok(None)
            }
        }
    }
}
