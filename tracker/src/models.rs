pub use shared::{ApiError, Coordinate, RouteRequest, RouteResponse, default_weight};
