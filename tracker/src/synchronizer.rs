use chrono::NaiveDate;

use crate::{
    distance::{DistanceSource, DistanceTracker},
    error::{DistanceError, TrackerError},
    leg::Leg,
    models::Coordinate,
    path::Path,
    pathfinder::PathFinder,
    report::{LegUpdate, RouteUpdatedSet},
    waypoint::{Waypoint, WaypointColor, WaypointId},
};

/// Keeps the ordered waypoint list and the legs of a [`Path`] consistent.
///
/// With at least one leg, leg `i` always runs from waypoint `i` to waypoint
/// `i + 1`. Every structural edit works on a draft copy and only replaces
/// the live state once all path-finding calls succeeded, so a failed
/// computation leaves the set untouched.
pub struct WaypointSet<P> {
    finder: P,
    path: Path,
    waypoints: Vec<Waypoint>,
    next_id: u64,
}

/// Tentative state of an edit in progress.
struct Draft {
    waypoints: Vec<Waypoint>,
    legs: Vec<Leg>,
}

impl Draft {
    fn reindex(&mut self) {
        for (index, waypoint) in self.waypoints.iter_mut().enumerate() {
            waypoint.sequence_index = Some(index);
        }
    }

    fn update_for(&self, leg: Leg, leg_index: usize) -> LegUpdate {
        leg_update(&self.waypoints, leg, leg_index)
    }
}

/// Pairs leg `leg_index` with its endpoints in `waypoints`.
fn leg_update(waypoints: &[Waypoint], leg: Leg, leg_index: usize) -> LegUpdate {
    match (waypoints.get(leg_index), waypoints.get(leg_index + 1)) {
        (Some(start), Some(finish)) => LegUpdate::between(leg, start, finish),
        _ => LegUpdate::new(leg),
    }
}

impl<P: PathFinder> WaypointSet<P> {
    pub fn new(finder: P, start_date: NaiveDate) -> Self {
        Self::with_path(finder, Path::new(start_date))
    }

    pub fn with_path(finder: P, path: Path) -> Self {
        let mut set = Self {
            finder,
            path: Path::new(path.start_date),
            waypoints: Vec::new(),
            next_id: 0,
        };
        set.set_path(path);
        set
    }

    pub fn finder(&self) -> &P {
        &self.finder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn into_path(self) -> Path {
        self.path
    }

    /// Drops every waypoint and starts an empty path.
    pub fn new_path(&mut self, start_date: NaiveDate) {
        self.set_path(Path::new(start_date));
    }

    /// Adopts `path` and rebuilds the waypoints from its legs: the start of
    /// the first leg and the finish of every leg.
    pub fn set_path(&mut self, path: Path) {
        let mut waypoints = Vec::with_capacity(path.legs().len() + 1);
        if let Some(first) = path.legs().first() {
            waypoints.push(Waypoint::new(first.start(), first.start_label()));
            waypoints.extend(
                path.legs()
                    .iter()
                    .map(|leg| Waypoint::new(leg.finish(), leg.finish_label())),
            );
        }
        for waypoint in &mut waypoints {
            waypoint.id = Some(self.issue_id());
        }

        self.path = path;
        self.waypoints = waypoints;
        for (index, waypoint) in self.waypoints.iter_mut().enumerate() {
            waypoint.sequence_index = Some(index);
        }
        self.reset_colors();
        tracing::debug!(
            waypoints = self.waypoints.len(),
            legs = self.path.legs().len(),
            "path adopted"
        );
    }

    /// Index of a tracked waypoint.
    pub fn position_of(&self, waypoint: &Waypoint) -> Option<usize> {
        let id = waypoint.id?;
        self.waypoints.iter().position(|w| w.id == Some(id))
    }

    /// Appends `waypoint` after the current last one.
    ///
    /// A provisional append connects the two with a straight line; the leg
    /// can be replaced later with [`WaypointSet::update_provisional`]. The
    /// appended waypoint is moved onto the finish of the new leg.
    pub async fn append(
        &mut self,
        mut waypoint: Waypoint,
        provisional: bool,
    ) -> Result<RouteUpdatedSet, TrackerError> {
        let mut draft = self.draft();
        waypoint.id = Some(self.issue_id());

        let mut new_leg = None;
        if let Some(last) = draft.waypoints.last() {
            let leg = if provisional {
                self.finder
                    .straight_line_leg(last.position, waypoint.position)
                    .with_labels(&last.label, &waypoint.label)
            } else {
                self.leg_between(last, &waypoint).await?
            };
            waypoint.position = leg.finish();
            draft.legs.push(leg.clone());
            new_leg = Some(leg);
        }
        draft.waypoints.push(waypoint);
        draft.reindex();

        let mut report = RouteUpdatedSet::default();
        if let Some(leg) = new_leg {
            report.after.push(draft.update_for(leg, draft.legs.len() - 1));
        }
        tracing::debug!(provisional, waypoints = draft.waypoints.len(), "waypoint appended");
        self.commit(draft);
        Ok(report)
    }

    /// Replaces the straight-line leg in front of the last waypoint with a
    /// computed one. Any other waypoint yields an empty report.
    pub async fn update_provisional(
        &mut self,
        waypoint: &Waypoint,
    ) -> Result<RouteUpdatedSet, TrackerError> {
        let mut report = RouteUpdatedSet::default();
        if !self.path.has_legs() {
            return Ok(report);
        }
        let Some(index) = self.position_of(waypoint) else {
            return Ok(report);
        };
        if index != self.waypoints.len() - 1 || index == 0 {
            return Ok(report);
        }

        let mut draft = self.draft();
        apply_edit(&mut draft.waypoints[index], waypoint);
        report.extend(self.recompute(&mut draft, index - 1).await?);
        self.commit(draft);
        Ok(report)
    }

    /// Recomputes the legs on both sides of a waypoint whose position or
    /// label changed.
    pub async fn update(&mut self, waypoint: &Waypoint) -> Result<RouteUpdatedSet, TrackerError> {
        let index = self.position_of(waypoint).ok_or(TrackerError::NotFound)?;
        self.check_counts()?;

        let mut report = RouteUpdatedSet::default();
        let mut draft = self.draft();
        apply_edit(&mut draft.waypoints[index], waypoint);
        if self.path.has_legs() {
            if index > 0 {
                report.extend(self.recompute(&mut draft, index - 1).await?);
            }
            if index < draft.waypoints.len() - 1 {
                report.extend(self.recompute(&mut draft, index).await?);
            }
        }
        tracing::debug!(index, changed = report.after.len(), "waypoint updated");
        self.commit(draft);
        Ok(report)
    }

    /// Removes a waypoint. An interior waypoint's two legs are replaced by
    /// one leg joining its neighbours.
    pub async fn remove(&mut self, waypoint: &Waypoint) -> Result<RouteUpdatedSet, TrackerError> {
        let mut report = RouteUpdatedSet::default();
        let Some(index) = self.position_of(waypoint) else {
            return Ok(report);
        };

        let mut draft = self.draft();
        let last = draft.waypoints.len() - 1;
        if self.path.has_legs() && draft.waypoints.len() >= 2 {
            self.check_counts()?;
            if index == 0 {
                let old = draft.legs.remove(0);
                report.before.push(draft.update_for(old, 0));
            } else if index == last {
                let old = draft.legs.remove(index - 1);
                report.before.push(draft.update_for(old, index - 1));
            } else {
                let joined = self
                    .leg_between(&draft.waypoints[index - 1], &draft.waypoints[index + 1])
                    .await?;
                let second = draft.legs.remove(index);
                let first = std::mem::replace(&mut draft.legs[index - 1], joined.clone());
                report.before.push(draft.update_for(first, index - 1));
                report.before.push(draft.update_for(second, index));
                report.after.push(LegUpdate::between(
                    joined,
                    &draft.waypoints[index - 1],
                    &draft.waypoints[index + 1],
                ));
            }
        }

        draft.waypoints.remove(index);
        if draft.waypoints.len() < 2 {
            draft.legs.clear();
        }
        tracing::debug!(index, remaining = draft.waypoints.len(), "waypoint removed");
        self.commit(draft);
        Ok(report)
    }

    /// Moves the waypoint at `from` so that it ends up at `to` and recomputes
    /// every leg whose endpoints changed.
    ///
    /// `to` may equal the waypoint count to move to the end. Out-of-range
    /// indices are ignored.
    pub async fn move_waypoint(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<RouteUpdatedSet, TrackerError> {
        let mut report = RouteUpdatedSet::default();
        let count = self.waypoints.len();
        if from == to || from >= count || to > count || !self.path.has_legs() {
            tracing::debug!(from, to, count, "move ignored");
            return Ok(report);
        }
        self.check_counts()?;

        let mut draft = self.draft();
        let moved = draft.waypoints.remove(from);
        if to >= draft.waypoints.len() {
            draft.waypoints.push(moved);
        } else {
            draft.waypoints.insert(to, moved);
        }
        draft.reindex();

        let first = from.min(to).saturating_sub(1);
        let last = from.max(to).min(draft.legs.len() - 1);
        for leg_index in first..=last {
            report.extend(self.recompute(&mut draft, leg_index).await?);
        }
        tracing::debug!(from, to, recomputed = report.after.len(), "waypoint moved");
        self.commit(draft);
        Ok(report)
    }

    /// Inserts `waypoint` before the waypoint currently at `index`, splitting
    /// the leg that spanned the insertion point. Out-of-range indices are
    /// ignored.
    pub async fn insert(
        &mut self,
        index: usize,
        mut waypoint: Waypoint,
    ) -> Result<RouteUpdatedSet, TrackerError> {
        let mut report = RouteUpdatedSet::default();
        if index >= self.waypoints.len() || !self.path.has_legs() {
            tracing::debug!(index, count = self.waypoints.len(), "insert ignored");
            return Ok(report);
        }
        self.check_counts()?;

        let mut draft = self.draft();
        waypoint.id = Some(self.issue_id());
        draft.waypoints.insert(index, waypoint);
        draft.reindex();

        if index > 0 {
            report.extend(self.recompute(&mut draft, index - 1).await?);
        }
        let next = self
            .leg_between(&draft.waypoints[index], &draft.waypoints[index + 1])
            .await?;
        draft.legs.insert(index, next.clone());
        report.after.push(draft.update_for(next, index));

        tracing::debug!(index, waypoints = draft.waypoints.len(), "waypoint inserted");
        self.commit(draft);
        Ok(report)
    }

    /// Snaps `position` onto the routable network by asking the path finder
    /// for a route from the point to itself.
    pub async fn snap_to_route(&self, position: Coordinate) -> Result<Coordinate, TrackerError> {
        let leg = self.finder.compute_leg(position, position).await?;
        Ok(leg.start())
    }

    pub fn set_walked_distance(&mut self, distance: f64) {
        self.path.set_walked_distance(distance);
        self.reset_colors();
    }

    /// See [`Path::apply_walked_distance`].
    pub fn apply_walked_distance(&mut self, total: f64, stored_before_today: f64) {
        self.path.apply_walked_distance(total, stored_before_today);
        self.reset_colors();
    }

    /// Fetches the distance walked from the path's start date through
    /// `today` and applies it. Today's share is whatever the tracker has not
    /// cached as earlier days. Returns the fetched total.
    pub async fn refresh_walked_distance<S: DistanceSource>(
        &mut self,
        tracker: &mut DistanceTracker<S>,
        today: NaiveDate,
    ) -> Result<f64, DistanceError> {
        let total = tracker
            .total_walking_distance(self.path.start_date, today)
            .await?;
        self.apply_walked_distance(total, tracker.stored_distance());
        tracing::debug!(
            total,
            today = self.path.today_distance,
            stopped = self.path.stopped,
            "walked distance refreshed"
        );
        Ok(total)
    }

    pub fn todays_path(&mut self) -> Option<Vec<Coordinate>> {
        self.path.todays_path()
    }

    /// Marker for the position reached by the walked distance.
    pub fn current_location_waypoint(&self) -> Option<Waypoint> {
        self.path.current_position().map(Waypoint::current_location)
    }

    pub fn color_for(&self, waypoint: &Waypoint) -> WaypointColor {
        if self.waypoints.is_empty() {
            return WaypointColor::Pending;
        }
        match waypoint.sequence_index {
            Some(index) if index < self.waypoints.len() => {
                if self.is_reached(index) {
                    WaypointColor::Done
                } else {
                    WaypointColor::Pending
                }
            }
            _ => WaypointColor::Other,
        }
    }

    pub fn reset_colors(&mut self) {
        let completed = self.path.completed_waypoint_index();
        for waypoint in &mut self.waypoints {
            waypoint.color = match (waypoint.sequence_index, completed) {
                (Some(index), Some(done)) if index <= done => WaypointColor::Done,
                _ => WaypointColor::Pending,
            };
        }
    }

    pub fn is_waypoint_completed(&self, index: usize) -> Result<bool, TrackerError> {
        if index >= self.waypoints.len() {
            return Err(TrackerError::NotFound);
        }
        Ok(self.is_reached(index))
    }

    /// Where the path places a tracked waypoint, which may differ from the
    /// position the user picked.
    pub fn coordinate_from_path(&self, waypoint: &Waypoint) -> Option<Coordinate> {
        let index = self.position_of(waypoint)?;
        let legs = self.path.legs();
        if index + 1 < self.waypoints.len() {
            legs.get(index).map(Leg::start)
        } else {
            index.checked_sub(1).and_then(|i| legs.get(i)).map(Leg::finish)
        }
    }

    fn is_reached(&self, index: usize) -> bool {
        self.path
            .completed_waypoint_index()
            .is_some_and(|done| index <= done)
    }

    fn check_counts(&self) -> Result<(), TrackerError> {
        let waypoints = self.waypoints.len();
        let legs = self.path.legs().len();
        if waypoints.saturating_sub(1) != legs {
            return Err(TrackerError::Mismatch { waypoints, legs });
        }
        Ok(())
    }

    fn issue_id(&mut self) -> WaypointId {
        self.next_id += 1;
        WaypointId(self.next_id)
    }

    fn draft(&self) -> Draft {
        Draft {
            waypoints: self.waypoints.clone(),
            legs: self.path.legs().to_vec(),
        }
    }

    fn commit(&mut self, mut draft: Draft) {
        draft.reindex();
        self.waypoints = draft.waypoints;
        self.path.replace_legs(draft.legs);
        self.reset_colors();
    }

    async fn leg_between(&self, start: &Waypoint, finish: &Waypoint) -> Result<Leg, TrackerError> {
        let leg = self
            .finder
            .compute_leg(start.position, finish.position)
            .await
            .inspect_err(|err| tracing::warn!("leg {:?} -> {:?}: {err}", start.label, finish.label))?;
        Ok(leg.with_labels(&start.label, &finish.label))
    }

    /// Recomputes leg `leg_index` of the draft from its current endpoints.
    ///
    /// `draft.legs[leg_index]` must still be the committed leg; it is reported
    /// with its endpoints from the committed waypoint list.
    async fn recompute(
        &self,
        draft: &mut Draft,
        leg_index: usize,
    ) -> Result<RouteUpdatedSet, TrackerError> {
        let leg = self
            .leg_between(&draft.waypoints[leg_index], &draft.waypoints[leg_index + 1])
            .await?;
        let old = std::mem::replace(&mut draft.legs[leg_index], leg.clone());
        Ok(RouteUpdatedSet {
            before: vec![leg_update(&self.waypoints, old, leg_index)],
            after: vec![draft.update_for(leg, leg_index)],
        })
    }
}

/// Copies the user-editable fields of `edited` onto the tracked waypoint.
fn apply_edit(tracked: &mut Waypoint, edited: &Waypoint) {
    tracked.position = edited.position;
    tracked.label = edited.label.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinder::StraightLineFinder;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 19).unwrap()
    }

    fn wp(lat: f64, lon: f64, label: &str) -> Waypoint {
        Waypoint::new(Coordinate::new(lat, lon), label)
    }

    #[tokio::test]
    async fn first_append_creates_no_leg() {
        let mut set = WaypointSet::new(StraightLineFinder, date());
        let report = set.append(wp(35.68, 139.76, "tokyo"), false).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(set.waypoints().len(), 1);
        assert_eq!(set.waypoints()[0].sequence_index, Some(0));
        assert_eq!(set.waypoints()[0].color, WaypointColor::Pending);
        assert!(!set.path().has_legs());
    }

    #[tokio::test]
    async fn set_path_rebuilds_waypoints_from_legs() {
        let first = Leg::straight_line(
            Coordinate::new(10.1, 11.1),
            Coordinate::new(10.2, 11.2),
            "start11",
            "finish11",
        );
        let second = Leg::straight_line(first.finish(), Coordinate::new(30.2, 31.2), "start12", "finish12");
        let path = Path::with_legs(date(), vec![first, second], 0.0);

        let set = WaypointSet::with_path(StraightLineFinder, path);
        let labels: Vec<_> = set.waypoints().iter().map(|w| w.label.as_str()).collect();
        assert_eq!(labels, ["start11", "finish11", "finish12"]);
        assert_eq!(set.waypoints()[2].position, Coordinate::new(30.2, 31.2));
        assert_eq!(set.waypoints()[2].sequence_index, Some(2));
    }

    #[tokio::test]
    async fn untracked_waypoint_is_reported() {
        let mut set = WaypointSet::new(StraightLineFinder, date());
        set.append(wp(35.0, 139.0, "a"), false).await.unwrap();
        let stranger = wp(36.0, 140.0, "x");
        assert_eq!(set.update(&stranger).await, Err(TrackerError::NotFound));
        assert!(set.remove(&stranger).await.unwrap().is_empty());
        assert_eq!(set.coordinate_from_path(&stranger), None);
        assert_eq!(set.color_for(&stranger), WaypointColor::Other);
    }

    #[tokio::test]
    async fn inconsistent_counts_are_rejected() {
        let mut set = WaypointSet::new(StraightLineFinder, date());
        for (lon, label) in [(139.0, "a"), (139.1, "b"), (139.2, "c")] {
            set.append(wp(35.0, lon, label), false).await.unwrap();
        }
        set.waypoints.pop();
        let mismatch = Err(TrackerError::Mismatch {
            waypoints: 2,
            legs: 2,
        });

        let first = set.waypoints[0].clone();
        assert_eq!(set.update(&first).await, mismatch);
        assert_eq!(set.move_waypoint(0, 1).await, mismatch);
        assert_eq!(set.insert(1, wp(35.0, 139.05, "x")).await, mismatch);
        assert_eq!(set.path().legs().len(), 2);
    }

    #[tokio::test]
    async fn refresh_splits_todays_distance_from_cached_days() {
        use crate::distance::FixedDistanceSource;

        let start = NaiveDate::from_ymd_opt(2023, 3, 17).unwrap();
        let mut set = WaypointSet::new(StraightLineFinder, start);
        set.append(wp(35.0, 139.0, "a"), false).await.unwrap();
        set.append(wp(35.0, 139.2, "b"), false).await.unwrap();

        let source = FixedDistanceSource::new([
            (NaiveDate::from_ymd_opt(2023, 3, 16).unwrap(), 9000.0),
            (start, 3000.0),
            (NaiveDate::from_ymd_opt(2023, 3, 18).unwrap(), 2000.0),
            (date(), 1500.0),
        ]);
        let mut tracker = DistanceTracker::new(source);

        let total = set.refresh_walked_distance(&mut tracker, date()).await.unwrap();
        assert_eq!(total, 6500.0);
        assert_eq!(set.path().walked_distance(), 6500.0);
        assert_eq!(set.path().today_distance, 1500.0);
        assert_eq!(tracker.stored_distance(), 5000.0);

        set.path.stopped = true;
        set.refresh_walked_distance(&mut tracker, date()).await.unwrap();
        assert_eq!(set.path().walked_distance(), 6500.0);
        assert_eq!(set.path().today_distance, 0.0);
    }

    #[tokio::test]
    async fn coordinate_from_path_uses_leg_endpoints() {
        let mut set = WaypointSet::new(StraightLineFinder, date());
        set.append(wp(35.0, 139.0, "a"), false).await.unwrap();
        set.append(wp(35.0, 139.1, "b"), false).await.unwrap();
        let a = set.waypoints()[0].clone();
        let b = set.waypoints()[1].clone();
        assert_eq!(set.coordinate_from_path(&a), Some(Coordinate::new(35.0, 139.0)));
        assert_eq!(set.coordinate_from_path(&b), Some(Coordinate::new(35.0, 139.1)));
    }

    #[tokio::test]
    async fn colors_follow_progress() {
        let mut set = WaypointSet::new(StraightLineFinder, date());
        for (lon, label) in [(139.0, "a"), (139.1, "b"), (139.2, "c")] {
            set.append(wp(35.0, lon, label), false).await.unwrap();
        }
        let first_leg = set.path().legs()[0].total_distance();

        set.set_walked_distance(first_leg + 1.0);
        let colors: Vec<_> = set.waypoints().iter().map(|w| w.color).collect();
        assert_eq!(
            colors,
            [WaypointColor::Done, WaypointColor::Done, WaypointColor::Pending]
        );
        assert_eq!(set.is_waypoint_completed(1), Ok(true));
        assert_eq!(set.is_waypoint_completed(2), Ok(false));
        assert_eq!(set.is_waypoint_completed(3), Err(TrackerError::NotFound));

        set.path.today_distance = 10.0;
        set.todays_path().unwrap();
        let marker = set.current_location_waypoint().unwrap();
        assert!(marker.is_current_location);
        assert_eq!(marker.color, WaypointColor::Current);
        assert_eq!(marker.sequence_index, None);
    }
}
