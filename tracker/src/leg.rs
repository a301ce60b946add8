use serde::{Deserialize, Serialize};

use crate::{
    error::TrackerError,
    geo::haversine_m,
    models::Coordinate,
    segment::{Segment, SegmentStatus},
};

/// The connected path between two consecutive waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LegRecord")]
pub struct Leg {
    segments: Vec<Segment>,
    start_label: String,
    finish_label: String,
    #[serde(skip)]
    start: Coordinate,
    #[serde(skip)]
    finish: Coordinate,
    #[serde(skip)]
    total_distance: f64,
    #[serde(skip)]
    polyline: Vec<Coordinate>,
    #[serde(skip)]
    traversed_segments: Option<Vec<Segment>>,
}

#[derive(Deserialize)]
struct LegRecord {
    segments: Vec<Segment>,
    #[serde(default)]
    start_label: String,
    #[serde(default)]
    finish_label: String,
}

impl TryFrom<LegRecord> for Leg {
    type Error = TrackerError;

    fn try_from(record: LegRecord) -> Result<Self, Self::Error> {
        Leg::new(record.segments, record.start_label, record.finish_label)
    }
}

impl Leg {
    pub fn new(
        segments: Vec<Segment>,
        start_label: impl Into<String>,
        finish_label: impl Into<String>,
    ) -> Result<Self, TrackerError> {
        if segments.is_empty() {
            return Err(TrackerError::InvalidRoute);
        }
        Ok(Self::build(segments, start_label.into(), finish_label.into()))
    }

    /// `segments` must not be empty.
    fn build(segments: Vec<Segment>, start_label: String, finish_label: String) -> Self {
        let start = segments[0].first();
        let finish = segments[segments.len() - 1].last();
        let total_distance = segments.iter().map(Segment::distance).sum();
        let polyline = display_polyline(&segments);

        Self {
            segments,
            start_label,
            finish_label,
            start,
            finish,
            total_distance,
            polyline,
            traversed_segments: None,
        }
    }

    /// A single two-point segment measured as the great-circle distance.
    pub fn straight_line(
        start: Coordinate,
        finish: Coordinate,
        start_label: impl Into<String>,
        finish_label: impl Into<String>,
    ) -> Self {
        let segment = Segment::straight(start, finish, haversine_m(start, finish));
        Self::build(vec![segment], start_label.into(), finish_label.into())
    }

    pub fn with_labels(mut self, start_label: impl Into<String>, finish_label: impl Into<String>) -> Self {
        self.start_label = start_label.into();
        self.finish_label = finish_label.into();
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn start_label(&self) -> &str {
        &self.start_label
    }

    pub fn finish_label(&self) -> &str {
        &self.finish_label
    }

    pub fn start(&self) -> Coordinate {
        self.start
    }

    pub fn finish(&self) -> Coordinate {
        self.finish
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Start of the leg followed by the end of every segment.
    pub fn polyline(&self) -> &[Coordinate] {
        &self.polyline
    }

    /// Segments covered so far while the leg is in progress.
    pub fn traversed_segments(&self) -> Option<&[Segment]> {
        self.traversed_segments.as_deref()
    }

    /// Walked part of the leg: the whole leg once done.
    pub fn traversed_distance(&self) -> f64 {
        if self.is_done() {
            return self.total_distance;
        }
        self.traversed_segments
            .iter()
            .flatten()
            .map(Segment::distance)
            .sum()
    }

    pub fn is_done(&self) -> bool {
        self.segments
            .iter()
            .all(|s| s.status() == SegmentStatus::Done)
    }

    /// Recomputes which part of the leg lies within `distance` metres of its
    /// start.
    pub fn update_traversed(&mut self, distance: f64) {
        for segment in &mut self.segments {
            segment.reset_progress();
        }
        self.traversed_segments = None;

        if distance.is_nan() || distance <= 0.0 {
            return;
        }
        if distance >= self.total_distance {
            for segment in &mut self.segments {
                segment.set_status(SegmentStatus::Done);
            }
            return;
        }

        let mut traversed = Vec::new();
        let mut consumed = 0.0;
        for segment in &mut self.segments {
            let reach = consumed + segment.distance();
            if distance >= reach {
                segment.set_status(SegmentStatus::Done);
                traversed.push(segment.clone());
                consumed = reach;
                if distance == reach {
                    break;
                }
            } else {
                let local = distance - consumed;
                tracing::trace!(local, of = segment.distance(), "leg boundary inside segment");
                traversed.push(segment.split_at(local));
                break;
            }
        }

        if !traversed.is_empty() {
            self.traversed_segments = Some(traversed);
        }
    }
}

fn display_polyline(segments: &[Segment]) -> Vec<Coordinate> {
    let mut polyline = Vec::with_capacity(segments.len() + 1);
    if let Some(first) = segments.first() {
        polyline.push(first.first());
    }
    polyline.extend(segments.iter().map(Segment::last));
    polyline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    fn segment(distance: f64, points: &[(f64, f64)]) -> Segment {
        Segment::new(distance, points.iter().map(|&(lat, lon)| c(lat, lon)).collect()).unwrap()
    }

    fn three_segment_leg() -> Leg {
        Leg::new(
            vec![
                segment(100.0, &[(10.1, 11.1), (10.2, 11.2)]),
                segment(200.0, &[(20.1, 21.1), (20.2, 21.2), (20.3, 21.3)]),
                segment(300.0, &[(30.1, 31.1), (30.2, 31.2)]),
            ],
            "start",
            "finish",
        )
        .unwrap()
    }

    #[test]
    fn empty_leg_is_invalid() {
        assert_eq!(Leg::new(vec![], "a", "b"), Err(TrackerError::InvalidRoute));
    }

    #[test]
    fn derives_endpoints_distance_and_polyline() {
        let leg = three_segment_leg();
        assert_eq!(leg.start(), c(10.1, 11.1));
        assert_eq!(leg.finish(), c(30.2, 31.2));
        assert_eq!(leg.total_distance(), 600.0);
        assert_eq!(
            leg.polyline(),
            &[c(10.1, 11.1), c(10.2, 11.2), c(20.3, 21.3), c(30.2, 31.2)]
        );
        assert_eq!(leg.start_label(), "start");
        assert_eq!(leg.finish_label(), "finish");
    }

    #[test]
    fn nothing_walked_leaves_everything_pending() {
        let mut leg = three_segment_leg();
        for distance in [0.0, -10.0, f64::NAN] {
            leg.update_traversed(distance);
            assert!(leg.traversed_segments().is_none());
            assert!(leg
                .segments()
                .iter()
                .all(|s| s.status() == SegmentStatus::Pending));
        }
    }

    #[test]
    fn fully_walked_leg_has_no_traversed_segments() {
        let mut leg = three_segment_leg();
        for distance in [600.0, 601.0, 1e9] {
            leg.update_traversed(distance);
            assert!(leg.traversed_segments().is_none());
            assert!(leg.is_done());
        }
    }

    #[test]
    fn partial_progress_interpolates_inside_segment() {
        let mut leg = three_segment_leg();
        leg.update_traversed(200.0);

        let traversed = leg.traversed_segments().expect("in progress");
        assert_eq!(traversed.len(), 2);
        assert_eq!(traversed[0].distance(), 100.0);
        assert_eq!(traversed[1].distance(), 100.0);
        // halfway into the second segment lands on its middle vertex
        let cut = traversed[1].last();
        assert!((cut.lat - 20.2).abs() < 1e-3, "{cut:?}");

        assert_eq!(leg.segments()[0].status(), SegmentStatus::Done);
        assert_eq!(leg.segments()[1].status(), SegmentStatus::Pending);
        assert_eq!(leg.segments()[2].status(), SegmentStatus::Pending);
        assert!(leg.segments()[1].traversed_polyline().is_some());
        assert!((leg.traversed_distance() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn progress_on_segment_boundary_marks_segment_done() {
        let mut leg = three_segment_leg();
        leg.update_traversed(300.0);

        let traversed = leg.traversed_segments().expect("in progress");
        assert_eq!(traversed.len(), 2);
        assert_eq!(traversed[1], leg.segments()[1]);
        assert_eq!(leg.segments()[1].status(), SegmentStatus::Done);
        assert_eq!(leg.segments()[2].status(), SegmentStatus::Pending);
    }

    #[test]
    fn midpoint_of_single_straight_segment() {
        let start = c(35.0, 139.0);
        let finish = c(35.0, 139.1);
        let mut leg = Leg::straight_line(start, finish, "a", "b");
        let half = leg.total_distance() / 2.0;
        leg.update_traversed(half);

        let traversed = leg.traversed_segments().expect("in progress");
        assert_eq!(traversed.len(), 1);
        assert_eq!(traversed[0].distance(), half);
        let mid = traversed[0].last();
        assert!((mid.lat - 35.0).abs() < 1e-9);
        assert!((mid.lon - 139.05).abs() < 1e-9);
    }

    #[test]
    fn update_resets_previous_progress() {
        let mut leg = three_segment_leg();
        leg.update_traversed(450.0);
        assert_eq!(leg.traversed_segments().map(<[_]>::len), Some(3));
        leg.update_traversed(50.0);
        assert_eq!(leg.traversed_segments().map(<[_]>::len), Some(1));
        assert!(leg
            .segments()
            .iter()
            .all(|s| s.status() == SegmentStatus::Pending));
    }

    #[test]
    fn decoding_rederives_fields() {
        let leg = three_segment_leg();
        let json = serde_json::to_string(&leg).unwrap();
        let decoded: Leg = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.segments().len(), 3);
        assert_eq!(decoded.total_distance(), 600.0);
        assert_eq!(decoded.start_label(), "start");
        assert_eq!(decoded.polyline().len(), 4);
        assert!(decoded.traversed_segments().is_none());
    }

    #[test]
    fn decoding_without_segments_fails() {
        let decoded: Result<Leg, _> = serde_json::from_str(r#"{"segments":[]}"#);
        assert!(decoded.is_err());
    }
}
