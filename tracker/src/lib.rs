pub mod config;
pub mod distance;
pub mod error;
pub mod geo;
pub mod leg;
pub mod models;
pub mod path;
pub mod pathfinder;
pub mod report;
pub mod segment;
pub mod store;
pub mod synchronizer;
pub mod waypoint;

pub use crate::config::TrackerConfig;
pub use crate::distance::{DistanceSource, DistanceTracker, FixedDistanceSource, WalkingDistance};
pub use crate::error::{ConfigError, DistanceError, StoreError, TrackerError};
pub use crate::leg::Leg;
pub use crate::models::Coordinate;
pub use crate::path::{Path, PathStatus};
pub use crate::pathfinder::{HttpPathFinder, PathFinder, StraightLineFinder};
pub use crate::report::{LegUpdate, RouteUpdatedSet};
pub use crate::segment::{Segment, SegmentStatus};
pub use crate::store::Store;
pub use crate::synchronizer::WaypointSet;
pub use crate::waypoint::{Waypoint, WaypointColor, WaypointId};
