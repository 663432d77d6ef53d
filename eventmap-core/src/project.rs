//! Projection of geocoded records onto the remote feature layer.
//!
//! A run first deletes remote features no local record claims, then creates
//! one feature per geocoded record that has no `remote_id` yet. Per record:
//!
//! ```text
//! not geocoded -> pending create -> created
//!                 pending create -> pending create   (create failed, retried next run)
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::record::{Record, RemoteId};
use crate::store::RecordStore;

/// Attributes sent to the feature layer, in layer field order.
pub const DESTINATION_FIELDS: [&str; 9] = [
    "event_id",
    "event_name",
    "event_type",
    "venue_name",
    "venue_address",
    "venue_capacity",
    "start_time",
    "end_time",
    "url",
];

/// WGS84, the reference the geocoder returns coordinates in.
pub const WGS84_WKID: u32 = 4326;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub spatial_reference: SpatialReference,
}

/// Creation payload for one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub attributes: Map<String, Value>,
    pub geometry: Point,
}

impl Feature {
    pub fn point(attributes: Map<String, Value>, x: f64, y: f64) -> Self {
        Feature {
            attributes,
            geometry: Point {
                x,
                y,
                spatial_reference: SpatialReference { wkid: WGS84_WKID },
            },
        }
    }

    /// Payload for a geocoded record; `None` when it has no location.
    pub fn from_record(record: &Record) -> Option<Feature> {
        let location = record.location()?;

        let mut values: Map<String, Value> = record
            .content
            .fields()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        values.insert("event_id".into(), Value::from(&record.event_id));

        let attributes = DESTINATION_FIELDS
            .iter()
            .map(|&name| (name.to_string(), values.remove(name).unwrap_or(Value::Null)))
            .collect();

        Some(Feature::point(attributes, location.x, location.y))
    }
}

/// The feature layer operations the sync needs.
#[async_trait]
pub trait FeatureService {
    /// Ids of every feature currently in the layer.
    async fn existing_ids(&self) -> SyncResult<Vec<RemoteId>>;

    /// Delete the given features in one call.
    async fn delete(&self, ids: &[RemoteId]) -> SyncResult<()>;

    /// Create one feature. `Ok(None)` means the service refused it.
    async fn create(&self, feature: &Feature) -> SyncResult<Option<RemoteId>>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProjectStats {
    pub deleted: usize,
    pub created: usize,
    pub failed: usize,
    pub already_created: usize,
    pub not_geocoded: usize,
}

pub struct Projected {
    pub records: Vec<Record>,
    pub stats: ProjectStats,
}

/// Bring the feature layer in line with the working set.
///
/// Saves the working set after every create attempt, successful or not.
pub async fn project<F, S>(mut records: Vec<Record>, service: &F, store: &S) -> SyncResult<Projected>
where
    F: FeatureService + ?Sized,
    S: RecordStore + ?Sized,
{
    let mut stats = ProjectStats {
        deleted: delete_stale(&records, service).await?.len(),
        ..ProjectStats::default()
    };

    for index in 0..records.len() {
        let Some(feature) = Feature::from_record(&records[index]) else {
            stats.not_geocoded += 1;
            continue;
        };

        if records[index].remote_id.is_some() {
            stats.already_created += 1;
            continue;
        }

        match service.create(&feature).await? {
            Some(id) => {
                debug!(event_id = %records[index].event_id, remote_id = %id, "feature created");
                stats.created += 1;
                records[index].remote_id = Some(id);
            }
            None => {
                warn!(event_id = %records[index].event_id, "feature service did not create feature");
                stats.failed += 1;
            }
        }

        store.save(&records)?;
    }

    Ok(Projected { records, stats })
}

/// Delete every remote feature whose id no record claims. Returns the ids
/// sent for deletion, each once.
pub async fn delete_stale<F>(records: &[Record], service: &F) -> SyncResult<Vec<RemoteId>>
where
    F: FeatureService + ?Sized,
{
    let existing = service.existing_ids().await?;
    if existing.is_empty() {
        return Ok(Vec::new());
    }

    let claimed: HashSet<RemoteId> = records.iter().filter_map(|r| r.remote_id).collect();

    let mut seen = HashSet::new();
    let stale: Vec<RemoteId> = existing
        .into_iter()
        .filter(|id| !claimed.contains(id) && seen.insert(*id))
        .collect();

    if !stale.is_empty() {
        info!(count = stale.len(), "deleting features no longer listed");
        service.delete(&stale).await?;
    }

    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Geocode, Location};
    use crate::testing::{FakeFeatureService, MemoryStore, event};
    use serde_json::json;

    fn geocoded(id: i64) -> Record {
        let mut record = event(id, Some("1100 Congress Ave"));
        record.geocode = Some(Geocode::Matched {
            location: Location { x: -97.74, y: 30.27 },
            score: 99.0,
            address: "1100 Congress Ave, Austin, Texas, 78701".into(),
        });
        record
    }

    fn created(id: i64, remote_id: i64) -> Record {
        let mut record = geocoded(id);
        record.remote_id = Some(RemoteId(remote_id));
        record
    }

    #[test]
    fn test_feature_payload_shape() {
        let mut record = geocoded(7);
        record
            .extra
            .insert("artist_bio".into(), json!("not a layer field"));

        let feature = Feature::from_record(&record).unwrap();

        assert_eq!(
            serde_json::to_value(&feature).unwrap(),
            json!({
                "attributes": {
                    "event_id": 7,
                    "event_name": "Event 7",
                    "event_type": "Party",
                    "venue_name": "The Venue",
                    "venue_address": "1100 Congress Ave",
                    "venue_capacity": 300,
                    "start_time": "2024-03-09T19:00:00-06:00",
                    "end_time": "2024-03-09T22:00:00-06:00",
                    "url": "https://schedule.example.com/7"
                },
                "geometry": {
                    "x": -97.74,
                    "y": 30.27,
                    "spatialReference": {"wkid": 4326}
                }
            })
        );
    }

    #[test]
    fn test_payload_has_every_destination_field_as_sent() {
        let mut record = geocoded(8);
        record.content.event_type = Some(json!(3));
        record.content.url = None;

        let feature = Feature::from_record(&record).unwrap();

        let mut keys: Vec<&str> = feature.attributes.keys().map(String::as_str).collect();
        let mut expected = DESTINATION_FIELDS.to_vec();
        keys.sort_unstable();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert_eq!(feature.attributes["event_type"], json!(3));
        assert_eq!(feature.attributes["url"], Value::Null);
    }

    #[test]
    fn test_no_payload_without_location() {
        let mut missed = event(1, Some("123 Fake St"));
        missed.geocode = Some(Geocode::NoMatch);

        assert!(Feature::from_record(&missed).is_none());
        assert!(Feature::from_record(&event(2, None)).is_none());
    }

    #[tokio::test]
    async fn test_unclaimed_remote_ids_are_deleted() {
        let service = FakeFeatureService::new(100).with_existing(&[10, 11]);
        let records = vec![created(1, 10)];

        let deleted = delete_stale(&records, &service).await.unwrap();

        assert_eq!(deleted, vec![RemoteId(11)]);
        assert_eq!(service.delete_calls(), vec![vec![RemoteId(11)]]);
        assert_eq!(service.ids(), vec![RemoteId(10)]);
    }

    #[tokio::test]
    async fn test_no_delete_call_when_nothing_is_stale() {
        let service = FakeFeatureService::new(100).with_existing(&[10]);

        delete_stale(&[created(1, 10)], &service).await.unwrap();
        delete_stale(&[], &FakeFeatureService::new(1)).await.unwrap();

        assert!(service.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_stale_ids_are_deleted_once() {
        let service = FakeFeatureService::new(100).with_existing(&[4, 5, 4]);

        let deleted = delete_stale(&[], &service).await.unwrap();

        assert_eq!(deleted, vec![RemoteId(4), RemoteId(5)]);
        assert_eq!(service.delete_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_creates_only_geocoded_records_without_remote_id() {
        let service = FakeFeatureService::new(20).with_existing(&[10]);
        let store = MemoryStore::default();
        let records = vec![created(1, 10), geocoded(2), event(3, None), geocoded(4)];

        let projected = project(records, &service, &store).await.unwrap();

        let ids: Vec<Option<RemoteId>> = projected.records.iter().map(|r| r.remote_id).collect();
        assert_eq!(
            ids,
            vec![Some(RemoteId(10)), Some(RemoteId(20)), None, Some(RemoteId(21))]
        );
        assert_eq!(service.create_calls(), 2);
        assert_eq!(store.save_count(), 2);
        assert_eq!(
            projected.stats,
            ProjectStats {
                deleted: 0,
                created: 2,
                failed: 0,
                already_created: 1,
                not_geocoded: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_create_is_saved_and_retried_next_run() {
        let service = FakeFeatureService::new(30);
        let store = MemoryStore::default();
        service.reject(1);

        let first = project(vec![geocoded(1), geocoded(2)], &service, &store)
            .await
            .unwrap();

        assert_eq!(first.stats.failed, 1);
        assert_eq!(first.records[0].remote_id, None);
        assert_eq!(first.records[1].remote_id, Some(RemoteId(30)));
        assert_eq!(store.save_count(), 2);

        let second = project(first.records, &service, &store).await.unwrap();

        assert_eq!(second.records[0].remote_id, Some(RemoteId(31)));
        assert_eq!(second.stats.created, 1);
        assert_eq!(second.stats.already_created, 1);
        assert_eq!(service.create_calls(), 3);
    }

    #[tokio::test]
    async fn test_repeated_runs_create_each_feature_once() {
        let service = FakeFeatureService::new(1);
        let store = MemoryStore::default();
        let mut records = vec![geocoded(1), geocoded(2), geocoded(3)];

        for _ in 0..3 {
            records = project(records, &service, &store).await.unwrap().records;
        }

        assert_eq!(service.create_calls(), 3);
        assert!(service.delete_calls().is_empty());
        assert_eq!(service.ids().len(), 3);
    }

    #[tokio::test]
    async fn test_dropped_record_is_deleted_then_recreated_after_change() {
        let service = FakeFeatureService::new(50).with_existing(&[10, 11]);
        let store = MemoryStore::default();

        // Event 2 changed upstream: reconciliation dropped its remote id.
        let records = vec![created(1, 10), geocoded(2)];

        let projected = project(records, &service, &store).await.unwrap();

        assert_eq!(service.delete_calls(), vec![vec![RemoteId(11)]]);
        assert_eq!(projected.records[1].remote_id, Some(RemoteId(50)));
        assert_eq!(service.ids(), vec![RemoteId(10), RemoteId(50)]);
    }
}
