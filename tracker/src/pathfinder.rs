use std::future::Future;

use crate::{
    config::TrackerConfig,
    error::TrackerError,
    leg::Leg,
    models::{ApiError, Coordinate, RouteRequest, RouteResponse},
    segment::Segment,
};

/// Source of legs between two coordinates.
///
/// Abstracts the directions service so that:
/// - **Editing** can use a cheap straight line while the user drags a point
/// - **Testing** can use a deterministic implementation
///
/// # Contract
/// - `compute_leg` may suspend on I/O and fails with
///   [`TrackerError::RouteComputationFailed`] when no route can be found
/// - `straight_line_leg` never fails
/// - Returned legs carry empty labels; the caller names the endpoints
pub trait PathFinder: Send + Sync {
    fn compute_leg(
        &self,
        start: Coordinate,
        finish: Coordinate,
    ) -> impl Future<Output = Result<Leg, TrackerError>> + Send;

    fn straight_line_leg(&self, start: Coordinate, finish: Coordinate) -> Leg {
        Leg::straight_line(start, finish, "", "")
    }
}

/// Connects every pair of points with a straight line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineFinder;

impl PathFinder for StraightLineFinder {
    async fn compute_leg(&self, start: Coordinate, finish: Coordinate) -> Result<Leg, TrackerError> {
        Ok(self.straight_line_leg(start, finish))
    }
}

/// Asks a routing service (`POST {base_url}/api/route`) for walking routes.
#[derive(Debug, Clone)]
pub struct HttpPathFinder {
    client: reqwest::Client,
    base_url: String,
    w_pop: f64,
    w_paved: f64,
}

impl HttpPathFinder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            w_pop: shared::default_weight(),
            w_paved: shared::default_weight(),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.routing_url.clone()).with_weights(config.w_pop, config.w_paved)
    }

    pub fn with_weights(mut self, w_pop: f64, w_paved: f64) -> Self {
        self.w_pop = w_pop;
        self.w_paved = w_paved;
        self
    }

    fn route_url(&self) -> String {
        format!("{}/api/route", self.base_url)
    }
}

impl PathFinder for HttpPathFinder {
    async fn compute_leg(&self, start: Coordinate, finish: Coordinate) -> Result<Leg, TrackerError> {
        let request = RouteRequest {
            start,
            end: finish,
            w_pop: self.w_pop,
            w_paved: self.w_paved,
        };

        let response = self
            .client
            .post(self.route_url())
            .json(&request)
            .send()
            .await
            .map_err(computation_failed)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiError>()
                .await
                .map(|err| err.message)
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!("routing service answered {status}: {message}");
            return Err(TrackerError::RouteComputationFailed(message));
        }

        let body: RouteResponse = response.json().await.map_err(computation_failed)?;
        tracing::debug!(
            points = body.path.len(),
            distance_km = body.distance_km,
            "received route"
        );
        let segment = Segment::new(body.distance_km * 1000.0, body.path).map_err(|_| {
            TrackerError::RouteComputationFailed("routing service returned an empty path".into())
        })?;
        Leg::new(vec![segment], "", "")
    }
}

fn computation_failed(err: reqwest::Error) -> TrackerError {
    tracing::warn!("route request failed: {err}");
    TrackerError::RouteComputationFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn straight_line_finder_connects_endpoints() {
        let start = Coordinate::new(35.681, 139.767);
        let finish = Coordinate::new(35.710, 139.811);
        let leg = StraightLineFinder.compute_leg(start, finish).await.unwrap();
        assert_eq!(leg.start(), start);
        assert_eq!(leg.finish(), finish);
        assert_eq!(leg.segments().len(), 1);
        assert!(leg.total_distance() > 4000.0 && leg.total_distance() < 6000.0);
    }

    #[test]
    fn http_finder_normalizes_base_url() {
        let finder = HttpPathFinder::new("http://localhost:8080/");
        assert_eq!(finder.route_url(), "http://localhost:8080/api/route");
    }
}
