//! Remote routing client for OSRM-style HTTP services.
//!
//! Walks the profile's endpoint list in order (primary first), retrying each
//! endpoint under the configured policy and stopping at the first response
//! that carries usable geometry. Failures never escape: the caller only sees
//! "no route" and decides how to degrade.

use crate::config::{GeometryFormat, RemoteConfig, ScoreWeights};
use crate::retry::RetryPolicy;
use reqwest::Client;
use routeguard_core::{
    decode_polyline, Coordinate, Maneuver, Route, RoutingProfile, SourceKind, DEFAULT_PRECISION,
};
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

/// Anything that can be asked for a route and may come back empty-handed.
pub trait RouteSource: Send + Sync {
    fn fetch_route(
        &self,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> impl Future<Output = Option<Route>> + Send;
}

/// Why a single attempt against one endpoint failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("routing service returned HTTP {0}")]
    HttpStatus(u16),
    #[error("routing service returned code {code}: {message}")]
    ServiceCode { code: String, message: String },
    #[error("response contained no routes")]
    NoRoutes,
    #[error("no route carried usable geometry")]
    MissingGeometry,
    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<RemoteRoute>,
}

#[derive(Debug, Deserialize)]
struct RemoteRoute {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    geometry: Option<RemoteGeometry>,
    #[serde(default)]
    legs: Vec<RemoteLeg>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteGeometry {
    Encoded(String),
    LineString { coordinates: Vec<[f64; 2]> },
    Coordinates(Vec<[f64; 2]>),
}

impl RemoteGeometry {
    fn decode(&self) -> Vec<Coordinate> {
        match self {
            RemoteGeometry::Encoded(encoded) => decode_polyline(encoded, DEFAULT_PRECISION),
            RemoteGeometry::LineString { coordinates } | RemoteGeometry::Coordinates(coordinates) => {
                coordinates
                    .iter()
                    .map(|[lon, lat]| Coordinate {
                        latitude: *lat,
                        longitude: *lon,
                    })
                    .filter(Coordinate::is_valid)
                    .collect()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteLeg {
    #[serde(default)]
    steps: Vec<RemoteStep>,
}

#[derive(Debug, Deserialize)]
struct RemoteStep {
    #[serde(default)]
    name: String,
    #[serde(default)]
    distance: f64,
    maneuver: RemoteManeuver,
}

#[derive(Debug, Deserialize)]
struct RemoteManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    location: Option<[f64; 2]>,
}

/// HTTP client for the remote routing service.
#[derive(Debug, Clone)]
pub struct RemoteRoutingClient {
    client: Client,
    config: RemoteConfig,
}

impl RemoteRoutingClient {
    pub fn new(config: RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: Client, config: RemoteConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Try every endpoint for `profile` in order; `None` when all fail.
    pub async fn route(
        &self,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> Option<Route> {
        let endpoints = self.config.endpoints(profile);
        if endpoints.is_empty() {
            tracing::debug!("No {} endpoints configured; skipping remote routing", profile);
            return None;
        }

        let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_delay());
        for (index, endpoint) in endpoints.iter().enumerate() {
            let role = if index == 0 { "primary" } else { "fallback" };
            let label = format!("{} endpoint {}", role, endpoint);
            let result = policy
                .run(&label, |_| self.fetch_from(endpoint, start, destination, profile))
                .await;
            if let Ok(route) = result {
                tracing::info!(
                    "Remote route from {} endpoint: {} points, {:.0} m",
                    role,
                    route.points().len(),
                    route.distance_m()
                );
                return Some(route);
            }
        }

        tracing::warn!(
            "All {} {} endpoints failed; no remote route",
            endpoints.len(),
            profile
        );
        None
    }

    /// One attempt against one endpoint.
    pub async fn fetch_from(
        &self,
        endpoint: &str,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> Result<Route, FetchError> {
        let url = build_route_url(endpoint, start, destination, self.config.geometry_format);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: RouteResponse =
            serde_json::from_str(&body).map_err(|err| FetchError::Decode(err.to_string()))?;
        parse_route_response(parsed, self.config.weights(profile))
    }
}

impl RouteSource for RemoteRoutingClient {
    async fn fetch_route(
        &self,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> Option<Route> {
        self.route(start, destination, profile).await
    }
}

pub fn build_route_url(
    base: &str,
    start: Coordinate,
    destination: Coordinate,
    format: GeometryFormat,
) -> String {
    let separator = if base.ends_with('/') { "" } else { "/" };
    format!(
        "{}{}{:.6},{:.6};{:.6},{:.6}?overview=full&steps=true&geometries={}&alternatives=true",
        base,
        separator,
        start.longitude,
        start.latitude,
        destination.longitude,
        destination.latitude,
        format.as_query()
    )
}

/// Pick the best-scoring alternative that has geometry and build a route from it.
///
/// The upstream distance only ranks alternatives; the route's own distance is
/// recomputed from the decoded points.
pub(crate) fn parse_route_response(
    response: RouteResponse,
    weights: ScoreWeights,
) -> Result<Route, FetchError> {
    if response.code != "Ok" {
        return Err(FetchError::ServiceCode {
            code: response.code,
            message: response.message.unwrap_or_default(),
        });
    }
    if response.routes.is_empty() {
        return Err(FetchError::NoRoutes);
    }

    let (points, legs) = response
        .routes
        .into_iter()
        .filter_map(|route| {
            let points = route.geometry.as_ref()?.decode();
            if points.len() < 2 {
                return None;
            }
            let score = weights.score(route.duration, route.distance);
            Some((score, points, route.legs))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, points, legs)| (points, legs))
        .ok_or(FetchError::MissingGeometry)?;

    let route = Route::new(points, SourceKind::Remote)
        .map_err(|err| FetchError::Decode(err.to_string()))?;
    Ok(route.with_maneuvers(extract_maneuvers(&legs)))
}

fn extract_maneuvers(legs: &[RemoteLeg]) -> Vec<Maneuver> {
    legs.iter()
        .flat_map(|leg| leg.steps.iter())
        .map(|step| Maneuver {
            kind: step.maneuver.kind.clone(),
            modifier: step.maneuver.modifier.clone(),
            street: Some(step.name.trim().to_string()).filter(|name| !name.is_empty()),
            distance_m: step.distance,
            location: step
                .maneuver
                .location
                .map(|[lon, lat]| Coordinate {
                    latitude: lat,
                    longitude: lon,
                })
                .filter(Coordinate::is_valid),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use routeguard_core::{encode_polyline, spatial::path_length_m};
    use serde_json::json;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    fn parse(value: serde_json::Value, profile: RoutingProfile) -> Result<Route, FetchError> {
        let response: RouteResponse = serde_json::from_value(value).unwrap();
        parse_route_response(response, RemoteConfig::default().weights(profile))
    }

    fn sample_points() -> Vec<Coordinate> {
        vec![
            coord(53.5142, 8.1428),
            coord(53.5120, 8.1460),
            coord(53.5090, 8.1500),
            coord(53.5049, 8.1554),
        ]
    }

    #[test]
    fn builds_osrm_url() {
        let url = build_route_url(
            "https://example.test/route/v1/foot",
            coord(53.5142, 8.1428),
            coord(53.5049, 8.1554),
            GeometryFormat::Polyline,
        );
        assert_eq!(
            url,
            "https://example.test/route/v1/foot/8.142800,53.514200;8.155400,53.504900\
             ?overview=full&steps=true&geometries=polyline&alternatives=true"
        );
    }

    #[test]
    fn parses_polyline_route_and_recomputes_distance() {
        let points = sample_points();
        let route = parse(
            json!({
                "code": "Ok",
                "routes": [{
                    "distance": 99999.0,
                    "duration": 600.0,
                    "geometry": encode_polyline(&points, 5),
                    "legs": []
                }]
            }),
            RoutingProfile::Foot,
        )
        .unwrap();
        assert_eq!(route.source(), SourceKind::Remote);
        assert_eq!(route.points().len(), 4);
        assert!((route.distance_m() - path_length_m(route.points())).abs() < 1e-6);
        assert!(route.distance_m() < 2_000.0);
    }

    #[test]
    fn parses_geojson_geometry() {
        let coordinates: Vec<[f64; 2]> = sample_points()
            .iter()
            .map(|p| [p.longitude, p.latitude])
            .collect();
        let route = parse(
            json!({
                "code": "Ok",
                "routes": [{
                    "distance": 1200.0,
                    "duration": 800.0,
                    "geometry": { "type": "LineString", "coordinates": coordinates }
                }]
            }),
            RoutingProfile::Foot,
        )
        .unwrap();
        assert_eq!(route.points(), sample_points().as_slice());
    }

    #[test]
    fn non_ok_code_is_a_failure() {
        let err = parse(
            json!({ "code": "NoRoute", "message": "Impossible route", "routes": [] }),
            RoutingProfile::Foot,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::ServiceCode { ref code, .. } if code == "NoRoute"));
    }

    #[test]
    fn empty_routes_is_a_failure() {
        let err = parse(json!({ "code": "Ok", "routes": [] }), RoutingProfile::Foot).unwrap_err();
        assert!(matches!(err, FetchError::NoRoutes));
    }

    #[test]
    fn missing_or_empty_geometry_is_a_failure() {
        let err = parse(
            json!({
                "code": "Ok",
                "routes": [
                    { "distance": 10.0, "duration": 5.0 },
                    { "distance": 10.0, "duration": 5.0, "geometry": "" }
                ]
            }),
            RoutingProfile::Foot,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::MissingGeometry));
    }

    #[test]
    fn bicycle_prefers_shorter_alternative() {
        let short = sample_points();
        let long = vec![short[0], coord(53.5160, 8.1500), short[3]];
        let body = json!({
            "code": "Ok",
            "routes": [
                { "distance": 2400.0, "duration": 500.0, "geometry": encode_polyline(&long, 5) },
                { "distance": 2000.0, "duration": 600.0, "geometry": encode_polyline(&short, 5) }
            ]
        });
        let bike = parse(body.clone(), RoutingProfile::Bicycle).unwrap();
        assert_eq!(bike.points().len(), 4);
        let foot = parse(body, RoutingProfile::Foot).unwrap();
        assert_eq!(foot.points().len(), 3);
    }

    #[test]
    fn extracts_maneuvers_from_steps() {
        let route = parse(
            json!({
                "code": "Ok",
                "routes": [{
                    "distance": 1200.0,
                    "duration": 800.0,
                    "geometry": encode_polyline(&sample_points(), 5),
                    "legs": [{
                        "steps": [
                            { "name": "Deichstraße", "distance": 300.0,
                              "maneuver": { "type": "depart", "location": [8.1428, 53.5142] } },
                            { "name": "", "distance": 900.0,
                              "maneuver": { "type": "turn", "modifier": "left" } }
                        ]
                    }]
                }]
            }),
            RoutingProfile::Foot,
        )
        .unwrap();
        let maneuvers = route.maneuvers();
        assert_eq!(maneuvers.len(), 2);
        assert_eq!(maneuvers[0].street.as_deref(), Some("Deichstraße"));
        assert_eq!(maneuvers[0].location, Some(coord(53.5142, 8.1428)));
        assert_eq!(maneuvers[1].modifier.as_deref(), Some("left"));
        assert_eq!(maneuvers[1].street, None);
    }
}
