use crate::{leg::Leg, waypoint::Waypoint};

/// Snapshot of one leg touched by an edit, with the waypoints bounding it
/// when they are known.
#[derive(Debug, Clone, PartialEq)]
pub struct LegUpdate {
    pub leg: Leg,
    pub start: Option<Waypoint>,
    pub finish: Option<Waypoint>,
}

impl LegUpdate {
    pub fn new(leg: Leg) -> Self {
        Self {
            leg,
            start: None,
            finish: None,
        }
    }

    pub fn between(leg: Leg, start: &Waypoint, finish: &Waypoint) -> Self {
        Self {
            leg,
            start: Some(start.clone()),
            finish: Some(finish.clone()),
        }
    }
}

/// Legs an observer should remove (`before`) and draw (`after`) after an edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteUpdatedSet {
    pub before: Vec<LegUpdate>,
    pub after: Vec<LegUpdate>,
}

impl RouteUpdatedSet {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    pub fn extend(&mut self, other: RouteUpdatedSet) {
        self.before.extend(other.before);
        self.after.extend(other.after);
    }
}
