use std::{collections::BTreeMap, fs, future::Future, path::Path as FsPath};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DistanceError;

/// Provider of measured walking distance, in metres per calendar day.
pub trait DistanceSource: Send + Sync {
    /// Distance walked on each day in `from..=to`. Days without data may be
    /// missing from the map.
    fn daily_distances(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<BTreeMap<NaiveDate, f64>, DistanceError>> + Send;
}

/// Distance already summed for every day strictly before `to_date`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkingDistance {
    pub distance: f64,
    pub to_date: NaiveDate,
}

/// Sums a [`DistanceSource`] while caching the days that can no longer
/// change, so later refreshes only query from the cache date on.
pub struct DistanceTracker<S> {
    source: S,
    stored: Option<WalkingDistance>,
}

impl<S: DistanceSource> DistanceTracker<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            stored: None,
        }
    }

    pub fn with_stored(source: S, stored: Option<WalkingDistance>) -> Self {
        Self { source, stored }
    }

    pub fn stored(&self) -> Option<WalkingDistance> {
        self.stored
    }

    /// Distance walked before the cache date, i.e. before today after a
    /// refresh.
    pub fn stored_distance(&self) -> f64 {
        self.stored.map_or(0.0, |s| s.distance)
    }

    /// Forgets the cache, e.g. after the path's start date changed.
    pub fn reset(&mut self) {
        self.stored = None;
    }

    /// Total distance walked from `from` through `today`.
    pub async fn total_walking_distance(
        &mut self,
        from: NaiveDate,
        today: NaiveDate,
    ) -> Result<f64, DistanceError> {
        let (mut total, fetch_from) = match self.stored {
            Some(stored) if today < stored.to_date => (stored.distance, None),
            Some(stored) => (stored.distance, Some(stored.to_date)),
            None => (0.0, Some(from)),
        };

        if let Some(fetch_from) = fetch_from {
            tracing::debug!(%fetch_from, %today, "fetching daily distances");
            let values = self.source.daily_distances(fetch_from, today).await?;
            let mut stored = total;
            for (date, distance) in values {
                total += distance;
                if date < today {
                    stored += distance;
                }
            }
            self.stored = Some(WalkingDistance {
                distance: stored,
                to_date: today,
            });
        }

        Ok(total)
    }
}

/// Fixed per-day values, for tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct FixedDistanceSource {
    values: BTreeMap<NaiveDate, f64>,
}

impl FixedDistanceSource {
    pub fn new(values: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Reads a JSON object mapping `YYYY-MM-DD` to metres walked that day.
    pub fn from_json_file(path: impl AsRef<FsPath>) -> Result<Self, DistanceError> {
        let bytes = fs::read(path.as_ref())?;
        let values: BTreeMap<NaiveDate, f64> = serde_json::from_slice(&bytes)?;
        tracing::debug!(days = values.len(), "loaded daily distances from {:?}", path.as_ref());
        Ok(Self { values })
    }
}

impl DistanceSource for FixedDistanceSource {
    async fn daily_distances(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, f64>, DistanceError> {
        if from > to {
            return Ok(BTreeMap::new());
        }
        Ok(self
            .values
            .range(from..=to)
            .map(|(date, distance)| (*date, *distance))
            .collect())
    }
}
