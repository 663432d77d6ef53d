//! Geocoding of venue addresses.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::record::{Candidate, Geocode, Record};
use crate::store::RecordStore;

/// Address lookup. Implementations apply their own city/region bias and
/// return at most the top candidate.
#[async_trait]
pub trait Geocoder {
    async fn find_candidate(&self, address: &str) -> SyncResult<Option<Candidate>>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub matched: usize,
    pub unmatched: usize,
    pub no_address: usize,
    pub already_geocoded: usize,
}

pub struct Enriched {
    pub records: Vec<Record>,
    pub stats: EnrichStats,
}

/// Geocode every record that has an address and no geocode yet.
///
/// Both outcomes are terminal: a match stores the candidate, no candidate
/// stores `Geocode::NoMatch` and the address is not tried again. The whole
/// working set is saved after each record. A geocoder error stops the run;
/// what was saved before it stays saved.
pub async fn enrich<G, S>(mut records: Vec<Record>, geocoder: &G, store: &S) -> SyncResult<Enriched>
where
    G: Geocoder + ?Sized,
    S: RecordStore + ?Sized,
{
    let mut stats = EnrichStats::default();

    for index in 0..records.len() {
        if records[index].is_geocoded() {
            stats.already_geocoded += 1;
            continue;
        }

        let Some(address) = records[index].address().map(str::to_string) else {
            debug!(event_id = %records[index].event_id, "no venue address, skipping");
            stats.no_address += 1;
            continue;
        };

        let geocode = match geocoder.find_candidate(&address).await? {
            Some(candidate) => {
                info!(
                    event_id = %records[index].event_id,
                    score = candidate.score,
                    "geocoded {address}"
                );
                stats.matched += 1;
                Geocode::from(candidate)
            }
            None => {
                warn!(event_id = %records[index].event_id, "no geocode match for {address}");
                stats.unmatched += 1;
                Geocode::NoMatch
            }
        };

        records[index].geocode = Some(geocode);
        store.save(&records)?;
    }

    Ok(Enriched { records, stats })
}
