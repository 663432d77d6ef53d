//! In-memory stand-ins for the geocoder, feature service and store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::enrich::Geocoder;
use crate::error::{SyncError, SyncResult};
use crate::project::{Feature, FeatureService};
use crate::record::{Candidate, EventContent, EventId, Location, Record, RemoteId};
use crate::store::RecordStore;

pub fn event(id: i64, address: Option<&str>) -> Record {
    Record::new(
        EventId::Number(id),
        EventContent {
            event_name: Some(json!(format!("Event {id}"))),
            event_type: Some(json!("Party")),
            venue_name: Some(json!("The Venue")),
            venue_address: address.map(|a| json!(a)),
            venue_capacity: Some(json!(300)),
            start_time: Some(json!("2024-03-09T19:00:00-06:00")),
            end_time: Some(json!("2024-03-09T22:00:00-06:00")),
            url: Some(json!(format!("https://schedule.example.com/{id}"))),
        },
    )
}

#[derive(Default)]
pub struct MemoryStore {
    pub saves: Mutex<Vec<Vec<Record>>>,
}

impl MemoryStore {
    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Vec<Record>> {
        self.saves.lock().unwrap().last().cloned()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> SyncResult<Vec<Record>> {
        Ok(self.last().unwrap_or_default())
    }

    fn save(&self, records: &[Record]) -> SyncResult<()> {
        self.saves.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

/// Geocoder answering from a fixed table; unknown addresses have no match.
#[derive(Default)]
pub struct FakeGeocoder {
    pub known: HashMap<String, Candidate>,
    /// Address that fails as if the service were unreachable.
    pub failing: Option<String>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    pub fn with(mut self, address: &str, x: f64, y: f64) -> Self {
        self.known.insert(
            address.to_string(),
            Candidate {
                address: format!("{address}, Austin, Texas"),
                location: Location { x, y },
                score: 100.0,
            },
        );
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn find_candidate(&self, address: &str) -> SyncResult<Option<Candidate>> {
        self.queries.lock().unwrap().push(address.to_string());

        if self.failing.as_deref() == Some(address) {
            return Err(SyncError::Geocoder("connection refused".into()));
        }

        Ok(self.known.get(address).cloned())
    }
}

/// Feature layer kept in memory, assigning ids from a counter.
pub struct FakeFeatureService {
    pub features: Mutex<Vec<(RemoteId, Feature)>>,
    pub deletes: Mutex<Vec<Vec<RemoteId>>>,
    pub creates: Mutex<Vec<Feature>>,
    pub next_id: Mutex<i64>,
    /// Number of upcoming create calls that come back without an id.
    pub reject_next: Mutex<usize>,
}

impl FakeFeatureService {
    pub fn new(first_id: i64) -> Self {
        FakeFeatureService {
            features: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            creates: Mutex::new(Vec::new()),
            next_id: Mutex::new(first_id),
            reject_next: Mutex::new(0),
        }
    }

    /// Pre-populate the layer with features that carry only an id.
    pub fn with_existing(self, ids: &[i64]) -> Self {
        {
            let mut features = self.features.lock().unwrap();
            for id in ids {
                features.push((RemoteId(*id), Feature::point(Default::default(), 0.0, 0.0)));
            }
        }
        self
    }

    pub fn reject(&self, count: usize) {
        *self.reject_next.lock().unwrap() = count;
    }

    pub fn delete_calls(&self) -> Vec<Vec<RemoteId>> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<RemoteId> {
        self.features.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl FeatureService for FakeFeatureService {
    async fn existing_ids(&self) -> SyncResult<Vec<RemoteId>> {
        Ok(self.ids())
    }

    async fn delete(&self, ids: &[RemoteId]) -> SyncResult<()> {
        self.deletes.lock().unwrap().push(ids.to_vec());
        self.features
            .lock()
            .unwrap()
            .retain(|(id, _)| !ids.contains(id));
        Ok(())
    }

    async fn create(&self, feature: &Feature) -> SyncResult<Option<RemoteId>> {
        self.creates.lock().unwrap().push(feature.clone());

        let mut reject = self.reject_next.lock().unwrap();
        if *reject > 0 {
            *reject -= 1;
            return Ok(None);
        }

        let mut next_id = self.next_id.lock().unwrap();
        let id = RemoteId(*next_id);
        *next_id += 1;
        self.features.lock().unwrap().push((id, feature.clone()));
        Ok(Some(id))
    }
}
