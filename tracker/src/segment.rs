use serde::{Deserialize, Serialize};

use crate::{
    error::TrackerError,
    geo::{polyline_length_m, polyline_prefix},
    models::Coordinate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentStatus {
    #[default]
    Pending,
    Done,
}

/// One distance-bearing polyline piece of a leg.
///
/// Only `distance` and `polyline` are persisted; the status and the
/// traversed polyline are derived from progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SegmentRecord")]
pub struct Segment {
    distance: f64,
    polyline: Vec<Coordinate>,
    #[serde(skip)]
    status: SegmentStatus,
    #[serde(skip)]
    traversed_polyline: Option<Vec<Coordinate>>,
}

#[derive(Deserialize)]
struct SegmentRecord {
    distance: f64,
    polyline: Vec<Coordinate>,
}

impl TryFrom<SegmentRecord> for Segment {
    type Error = TrackerError;

    fn try_from(record: SegmentRecord) -> Result<Self, Self::Error> {
        Segment::new(record.distance, record.polyline)
    }
}

impl Segment {
    pub fn new(distance: f64, polyline: Vec<Coordinate>) -> Result<Self, TrackerError> {
        if polyline.is_empty() {
            return Err(TrackerError::InvalidRoute);
        }
        Ok(Self {
            distance: if distance.is_finite() { distance.max(0.0) } else { 0.0 },
            polyline,
            status: SegmentStatus::Pending,
            traversed_polyline: None,
        })
    }

    /// A segment whose distance is the great-circle length of its polyline.
    pub fn from_polyline(polyline: Vec<Coordinate>) -> Result<Self, TrackerError> {
        let distance = polyline_length_m(&polyline);
        Self::new(distance, polyline)
    }

    pub(crate) fn straight(start: Coordinate, finish: Coordinate, distance: f64) -> Self {
        Self {
            distance,
            polyline: vec![start, finish],
            status: SegmentStatus::Pending,
            traversed_polyline: None,
        }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn polyline(&self) -> &[Coordinate] {
        &self.polyline
    }

    pub fn status(&self) -> SegmentStatus {
        self.status
    }

    pub fn traversed_polyline(&self) -> Option<&[Coordinate]> {
        self.traversed_polyline.as_deref()
    }

    pub fn first(&self) -> Coordinate {
        self.polyline[0]
    }

    pub fn last(&self) -> Coordinate {
        self.polyline[self.polyline.len() - 1]
    }

    pub(crate) fn set_status(&mut self, status: SegmentStatus) {
        self.status = status;
    }

    pub(crate) fn reset_progress(&mut self) {
        self.status = SegmentStatus::Pending;
        self.traversed_polyline = None;
    }

    /// Cuts the segment `local` metres from its start.
    ///
    /// Returns the covered part as a new, done segment and remembers its
    /// polyline on `self`, which stays pending.
    pub(crate) fn split_at(&mut self, local: f64) -> Segment {
        let fraction = if self.distance > 0.0 {
            local / self.distance
        } else {
            1.0
        };
        let covered = polyline_prefix(&self.polyline, fraction);
        self.status = SegmentStatus::Pending;
        self.traversed_polyline = Some(covered.clone());

        Segment {
            distance: local,
            polyline: covered,
            status: SegmentStatus::Done,
            traversed_polyline: None,
        }
    }
}
