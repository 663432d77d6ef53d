//! Event records, as fetched from the listing API and as persisted locally.
//!
//! A persisted record is the fetched listing plus whatever the pipelines have
//! learned about it since: the geocode result and the object id assigned by
//! the feature service. On disk these are flat keys next to the listing
//! fields (`geocode_status`, `location`, `match_score`, `found_address`,
//! `remote_id`), which is the layout earlier runs of the tool wrote.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// `geocode_status` value for a matched address.
pub const STATUS_MATCHED: u8 = 1;
/// `geocode_status` value for an address the geocoder had no candidate for.
pub const STATUS_NO_MATCH: u8 = 9;

/// Keys owned by the record model. The listing API never sends these, and
/// they are stripped from pass-through fields so they can't be written twice.
const RESERVED_KEYS: [&str; 6] = [
    "geocode_status",
    "location",
    "match_score",
    "found_address",
    "remote_id",
    "OBJECTID",
];

/// Identifier assigned by the listing API.
///
/// The API is not consistent about sending numbers or strings, so both are
/// accepted and written back in the form they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Text(String),
}

impl EventId {
    /// Read an id from a raw listing value. Anything other than an integer
    /// or a non-blank string is not an id.
    pub fn from_value(value: &Value) -> Option<EventId> {
        let id = match value {
            Value::Number(n) => EventId::Number(n.as_i64()?),
            Value::String(s) => EventId::Text(s.clone()),
            _ => return None,
        };
        id.is_valid().then_some(id)
    }

    pub fn is_valid(&self) -> bool {
        match self {
            EventId::Number(_) => true,
            EventId::Text(s) => !s.trim().is_empty(),
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{n}"),
            EventId::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&EventId> for Value {
    fn from(id: &EventId) -> Self {
        match id {
            EventId::Number(n) => Value::from(*n),
            EventId::Text(s) => Value::from(s.as_str()),
        }
    }
}

/// Object id assigned by the feature service when a feature is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(pub i64);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The listing fields compared between runs. If any of them differ, the
/// event is treated as new content and loses its geocode and remote id.
///
/// Values are kept as the API sent them; its types drift between venues and
/// seasons (capacity as a number or a string, ids in `event_type`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventContent {
    pub event_name: Option<Value>,
    pub event_type: Option<Value>,
    pub venue_name: Option<Value>,
    pub venue_address: Option<Value>,
    pub venue_capacity: Option<Value>,
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
    pub url: Option<Value>,
}

impl EventContent {
    /// Content fields as flat `(name, value)` pairs, missing values as null.
    pub fn fields(&self) -> [(&'static str, Value); 8] {
        let value = |field: &Option<Value>| field.clone().unwrap_or(Value::Null);
        [
            ("event_name", value(&self.event_name)),
            ("event_type", value(&self.event_type)),
            ("venue_name", value(&self.venue_name)),
            ("venue_address", value(&self.venue_address)),
            ("venue_capacity", value(&self.venue_capacity)),
            ("start_time", value(&self.start_time)),
            ("end_time", value(&self.end_time)),
            ("url", value(&self.url)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// Top candidate returned by the geocoder for an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub address: String,
    pub location: Location,
    pub score: f64,
}

/// Terminal geocode outcome. Once set it is never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub enum Geocode {
    Matched {
        location: Location,
        score: f64,
        address: String,
    },
    NoMatch,
}

impl From<Candidate> for Geocode {
    fn from(candidate: Candidate) -> Self {
        Geocode::Matched {
            location: candidate.location,
            score: candidate.score,
            address: candidate.address,
        }
    }
}

/// One event as returned by the listing API.
///
/// Every field is a raw JSON value, so any object decodes; whether it has a
/// usable id is decided by `into_record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub event_id: Option<Value>,
    #[serde(flatten)]
    pub content: EventContent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Listing {
    /// Turn the listing into a fresh record, or `None` if it has no usable id.
    pub fn into_record(self) -> Option<Record> {
        let event_id = EventId::from_value(self.event_id.as_ref()?)?;

        let mut extra = self.extra;
        extra.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));

        Some(Record {
            event_id,
            content: self.content,
            geocode: None,
            remote_id: None,
            extra,
        })
    }
}

/// One event in the local working set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredRecord", into = "StoredRecord")]
pub struct Record {
    pub event_id: EventId,
    pub content: EventContent,
    pub geocode: Option<Geocode>,
    pub remote_id: Option<RemoteId>,
    /// Listing fields we don't interpret, carried through verbatim.
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(event_id: EventId, content: EventContent) -> Self {
        Record {
            event_id,
            content,
            geocode: None,
            remote_id: None,
            extra: Map::new(),
        }
    }

    /// Venue address to geocode, if there is a non-blank one.
    pub fn address(&self) -> Option<&str> {
        self.content
            .venue_address
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn location(&self) -> Option<Location> {
        match &self.geocode {
            Some(Geocode::Matched { location, .. }) => Some(*location),
            _ => None,
        }
    }

    pub fn is_geocoded(&self) -> bool {
        self.geocode.is_some()
    }
}

/// On-disk layout of a record.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    event_id: EventId,
    #[serde(flatten)]
    content: EventContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geocode_status: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    found_address: Option<String>,
    #[serde(default, alias = "OBJECTID", skip_serializing_if = "Option::is_none")]
    remote_id: Option<RemoteId>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<StoredRecord> for Record {
    type Error = SyncError;

    fn try_from(stored: StoredRecord) -> Result<Self, Self::Error> {
        let id = &stored.event_id;

        let geocode = match (stored.geocode_status.unwrap_or(0), stored.location) {
            (0, None) => None,
            (STATUS_MATCHED, Some(location)) => {
                let (Some(score), Some(address)) = (stored.match_score, stored.found_address)
                else {
                    return Err(SyncError::InvalidRecord(format!(
                        "event {id} is geocoded but has no match_score or found_address"
                    )));
                };
                Some(Geocode::Matched {
                    location,
                    score,
                    address,
                })
            }
            (STATUS_NO_MATCH, None) => Some(Geocode::NoMatch),
            (status, location) => {
                return Err(SyncError::InvalidRecord(format!(
                    "event {id} has geocode_status {status} with{} location",
                    if location.is_some() { "" } else { "out" }
                )));
            }
        };

        Ok(Record {
            event_id: stored.event_id,
            content: stored.content,
            geocode,
            remote_id: stored.remote_id,
            extra: stored.extra,
        })
    }
}

impl From<Record> for StoredRecord {
    fn from(record: Record) -> Self {
        let (geocode_status, location, match_score, found_address) = match record.geocode {
            None => (None, None, None, None),
            Some(Geocode::NoMatch) => (Some(STATUS_NO_MATCH), None, None, None),
            Some(Geocode::Matched {
                location,
                score,
                address,
            }) => (
                Some(STATUS_MATCHED),
                Some(location),
                Some(score),
                Some(address),
            ),
        };

        StoredRecord {
            event_id: record.event_id,
            content: record.content,
            geocode_status,
            location,
            match_score,
            found_address,
            remote_id: record.remote_id,
            extra: record.extra,
        }
    }
}
