use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("a route needs at least one segment with at least one point")]
    InvalidRoute,
    #[error("waypoint is not part of this set")]
    NotFound,
    #[error("waypoint count ({waypoints}) does not match leg count ({legs})")]
    Mismatch { waypoints: usize, legs: usize },
    #[error("route computation failed: {0}")]
    RouteComputationFailed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid stored data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("a previous load failed, refusing to overwrite {0}")]
    LoadFailed(String),
}

#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("distance source error: {0}")]
    Source(String),
    #[error("failed to read daily distances: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid daily distances: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
