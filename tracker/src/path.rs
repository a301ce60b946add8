use std::fmt;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{geo::polyline_slice, leg::Leg, models::Coordinate};

pub const DEFAULT_PATH_NAME: &str = "New";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    /// No leg yet.
    Preparing,
    Walking,
    Completed,
    Suspended,
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PathStatus::Preparing => "preparing",
            PathStatus::Walking => "walking",
            PathStatus::Completed => "completed",
            PathStatus::Suspended => "suspended",
        };
        f.write_str(label)
    }
}

/// The full chain of legs plus the walked distance along it.
///
/// Distances are metres. Every change to the legs or to the walked distance
/// keeps the derived fields (endpoints, totals, traversed parts) current.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PathRecord")]
pub struct Path {
    pub name: String,
    legs: Vec<Leg>,
    pub start_date: NaiveDate,
    pub finished_date: NaiveDate,
    walked_distance: f64,
    pub stopped: bool,
    /// Distance walked since the start of the current day.
    #[serde(skip)]
    pub today_distance: f64,
    #[serde(skip)]
    total_distance: f64,
    #[serde(skip)]
    remaining_distance: f64,
    #[serde(skip)]
    start: Option<Coordinate>,
    #[serde(skip)]
    finish: Option<Coordinate>,
    #[serde(skip)]
    current_position: Option<Coordinate>,
}

#[derive(Deserialize)]
struct PathRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    legs: Vec<Leg>,
    #[serde(default = "today")]
    start_date: NaiveDate,
    #[serde(default = "today")]
    finished_date: NaiveDate,
    #[serde(default)]
    walked_distance: f64,
    #[serde(default)]
    stopped: bool,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl From<PathRecord> for Path {
    fn from(record: PathRecord) -> Self {
        let mut path = Path::with_legs(record.start_date, record.legs, record.walked_distance);
        path.name = record.name;
        path.finished_date = record.finished_date;
        path.stopped = record.stopped;
        path
    }
}

impl Path {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            name: DEFAULT_PATH_NAME.to_string(),
            legs: Vec::new(),
            start_date,
            finished_date: start_date,
            walked_distance: 0.0,
            stopped: false,
            today_distance: 0.0,
            total_distance: 0.0,
            remaining_distance: 0.0,
            start: None,
            finish: None,
            current_position: None,
        }
    }

    pub fn with_legs(start_date: NaiveDate, legs: Vec<Leg>, walked_distance: f64) -> Self {
        let mut path = Self::new(start_date);
        path.legs = legs;
        path.walked_distance = sanitize(walked_distance);
        path.refresh();
        path
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn has_legs(&self) -> bool {
        !self.legs.is_empty()
    }

    pub fn walked_distance(&self) -> f64 {
        self.walked_distance
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn remaining_distance(&self) -> f64 {
        self.remaining_distance
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.start
    }

    pub fn finish(&self) -> Option<Coordinate> {
        self.finish
    }

    /// Position reached by the walked distance, as of the last
    /// [`Path::todays_path`] call.
    pub fn current_position(&self) -> Option<Coordinate> {
        self.current_position
    }

    /// Appends a leg. Progress is not re-applied to it.
    pub fn add_leg(&mut self, leg: Leg) {
        self.legs.push(leg);
        self.update_endpoints();
    }

    /// Swaps in a new leg list and re-applies the walked distance.
    pub fn replace_legs(&mut self, legs: Vec<Leg>) -> Vec<Leg> {
        let old = std::mem::replace(&mut self.legs, legs);
        self.refresh();
        old
    }

    /// Re-derives endpoints and totals from the legs and re-applies progress.
    pub fn refresh(&mut self) {
        self.update_endpoints();
        self.update_traversed();
        self.update_remaining_distance();
    }

    pub fn set_walked_distance(&mut self, distance: f64) {
        self.walked_distance = sanitize(distance);
        self.update_traversed();
        self.update_remaining_distance();
    }

    /// Applies a freshly measured total.
    ///
    /// `stored_before_today` is the part of `total` walked before the current
    /// day. A stopped path keeps its progress and walks nothing today.
    pub fn apply_walked_distance(&mut self, total: f64, stored_before_today: f64) {
        if self.stopped {
            self.today_distance = 0.0;
            return;
        }
        self.set_walked_distance(total);
        self.today_distance = sanitize(total - stored_before_today);
    }

    pub fn is_complete(&self) -> bool {
        self.has_legs() && self.walked_distance >= self.total_distance
    }

    /// Number of fully walked legs, which is also the index of the last
    /// reached waypoint. `None` before any progress.
    pub fn completed_waypoint_index(&self) -> Option<usize> {
        if !self.has_legs() || self.walked_distance <= 0.0 {
            return None;
        }
        let mut reached = 0.0;
        let completed = self
            .legs
            .iter()
            .take_while(|leg| {
                reached += leg.total_distance();
                reached <= self.walked_distance
            })
            .count();
        Some(completed)
    }

    /// Polyline covered today, from `walked - today` up to `walked`.
    ///
    /// Also updates [`Path::current_position`] to the end of that polyline.
    pub fn todays_path(&mut self) -> Option<Vec<Coordinate>> {
        self.current_position = None;
        if !self.has_legs() || self.walked_distance <= 0.0 {
            return None;
        }

        let end = self.walked_distance.min(self.total_distance);
        let start = (self.walked_distance - sanitize(self.today_distance)).clamp(0.0, end);

        let mut points: Vec<Coordinate> = Vec::new();
        let mut offset = 0.0;
        'legs: for leg in &self.legs {
            for segment in leg.segments() {
                let seg_start = offset;
                let distance = segment.distance();
                offset += distance;

                if offset < start {
                    continue;
                }
                if seg_start > end || (seg_start == end && !points.is_empty()) {
                    break 'legs;
                }

                let (from, to) = if distance > 0.0 {
                    ((start - seg_start) / distance, (end - seg_start) / distance)
                } else {
                    (0.0, 1.0)
                };
                for point in polyline_slice(segment.polyline(), from, to) {
                    if points.last() != Some(&point) {
                        points.push(point);
                    }
                }
            }
        }

        self.current_position = points.last().copied();
        tracing::debug!(
            start,
            end,
            points = points.len(),
            "assembled today's path"
        );
        Some(points)
    }

    pub fn status(&self) -> PathStatus {
        if !self.has_legs() {
            PathStatus::Preparing
        } else if !self.stopped {
            PathStatus::Walking
        } else if self.is_complete() {
            PathStatus::Completed
        } else {
            PathStatus::Suspended
        }
    }

    pub fn display_label(&self) -> String {
        format!(
            "{} {} ({})",
            self.start_date.format("%Y/%m/%d"),
            self.name,
            self.status()
        )
    }

    fn update_endpoints(&mut self) {
        self.start = self.legs.first().map(Leg::start);
        self.finish = self.legs.last().map(Leg::finish);
        self.total_distance = self.legs.iter().map(Leg::total_distance).sum();
        self.update_remaining_distance();
    }

    fn update_traversed(&mut self) {
        let mut previous = 0.0;
        for leg in &mut self.legs {
            leg.update_traversed(self.walked_distance - previous);
            previous += leg.total_distance();
        }
    }

    fn update_remaining_distance(&mut self) {
        self.remaining_distance = (self.total_distance - self.walked_distance).max(0.0);
    }
}

fn sanitize(distance: f64) -> f64 {
    if distance.is_finite() {
        distance.max(0.0)
    } else {
        0.0
    }
}
