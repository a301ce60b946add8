use crate::models::Coordinate;

/// Stable identity of a waypoint inside a [`crate::synchronizer::WaypointSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaypointId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaypointColor {
    Done,
    #[default]
    Pending,
    /// Marker for the walker's current position.
    Current,
    /// Not (or no longer) part of the set.
    Other,
}

/// A user-visible point bounding legs.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub position: Coordinate,
    pub label: String,
    /// Position in the owning list, `None` until the waypoint is added.
    pub sequence_index: Option<usize>,
    pub color: WaypointColor,
    pub is_current_location: bool,
    pub(crate) id: Option<WaypointId>,
}

impl Waypoint {
    pub fn new(position: Coordinate, label: impl Into<String>) -> Self {
        Self {
            position,
            label: label.into(),
            sequence_index: None,
            color: WaypointColor::Pending,
            is_current_location: false,
            id: None,
        }
    }

    pub fn current_location(position: Coordinate) -> Self {
        Self {
            color: WaypointColor::Current,
            is_current_location: true,
            ..Self::new(position, "")
        }
    }

    /// Identity assigned when the waypoint joined a set.
    pub fn id(&self) -> Option<WaypointId> {
        self.id
    }
}
