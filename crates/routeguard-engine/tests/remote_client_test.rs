//! Remote routing integration tests.
//!
//! Each test starts a local axum server that plays the routing service, so
//! nothing here touches the network beyond 127.0.0.1.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use routeguard_core::{encode_polyline, interpolate, spatial, Coordinate, RoutingProfile, SourceKind};
use routeguard_engine::{
    EngineConfig, GeometryFormat, Outcome, RemoteConfig, RouteResolutionEngine, Tier,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const START: Coordinate = Coordinate {
    latitude: 53.5142,
    longitude: 8.1428,
};
const DESTINATION: Coordinate = Coordinate {
    latitude: 53.5120,
    longitude: 8.1460,
};

#[derive(Clone, Copy)]
enum Behaviour {
    Success,
    GeoJson,
    NoRoute,
    ServerError,
    FarStart,
}

#[derive(Clone)]
struct MockService {
    behaviour: Behaviour,
    hits: Arc<AtomicUsize>,
}

fn parse_pair(pair: &str) -> Option<Coordinate> {
    let (lon, lat) = pair.split_once(',')?;
    Some(Coordinate {
        latitude: lat.parse().ok()?,
        longitude: lon.parse().ok()?,
    })
}

fn parse_coords(raw: &str) -> Option<(Coordinate, Coordinate)> {
    let (a, b) = raw.split_once(';')?;
    Some((parse_pair(a)?, parse_pair(b)?))
}

/// Short irregular steps with small sideways offsets, like a footpath.
fn walking_path(start: Coordinate, destination: Coordinate) -> Vec<Coordinate> {
    [0.0, 0.12, 0.3, 0.41, 0.63, 0.78, 1.0]
        .iter()
        .enumerate()
        .map(|(i, fraction)| {
            let base = interpolate(start, destination, *fraction);
            let offset = if i % 2 == 0 {
                0.0
            } else {
                spatial::meters_to_lon(8.0, base.latitude)
            };
            Coordinate {
                latitude: base.latitude,
                longitude: base.longitude + offset,
            }
        })
        .collect()
}

async fn route_handler(State(service): State<MockService>, Path(coords): Path<String>) -> Response {
    service.hits.fetch_add(1, Ordering::SeqCst);
    let Some((start, destination)) = parse_coords(&coords) else {
        return (StatusCode::BAD_REQUEST, "bad coordinates").into_response();
    };

    let mut points = walking_path(start, destination);
    match service.behaviour {
        Behaviour::ServerError => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream down").into_response();
        }
        Behaviour::NoRoute => {
            return Json(json!({ "code": "NoRoute", "message": "Impossible route", "routes": [] }))
                .into_response();
        }
        Behaviour::FarStart => {
            points[0].latitude += spatial::meters_to_lat(600.0, start.latitude);
        }
        Behaviour::Success | Behaviour::GeoJson => {}
    }

    let geometry = match service.behaviour {
        Behaviour::GeoJson => json!({
            "type": "LineString",
            "coordinates": points.iter().map(|p| [p.longitude, p.latitude]).collect::<Vec<_>>()
        }),
        _ => json!(encode_polyline(&points, 5)),
    };

    Json(json!({
        "code": "Ok",
        "routes": [{
            "distance": 12345.0,
            "duration": 300.0,
            "geometry": geometry,
            "legs": [{
                "steps": [
                    { "name": "Deichstraße", "distance": 150.0,
                      "maneuver": { "type": "depart", "location": [start.longitude, start.latitude] } },
                    { "name": "", "distance": 0.0,
                      "maneuver": { "type": "arrive", "location": [destination.longitude, destination.latitude] } }
                ]
            }]
        }]
    }))
    .into_response()
}

/// Serve the mock routing API and return its foot endpoint base URL.
async fn spawn_service(behaviour: Behaviour) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let service = MockService {
        behaviour,
        hits: Arc::clone(&hits),
    };
    let app = Router::new()
        .route("/route/v1/foot/:coords", get(route_handler))
        .with_state(service);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/route/v1/foot/", addr), hits)
}

async fn unused_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/route/v1/foot/", addr)
}

fn config_for(endpoints: Vec<String>) -> EngineConfig {
    EngineConfig {
        remote: RemoteConfig {
            foot_endpoints: endpoints,
            bicycle_endpoints: Vec::new(),
            max_retries: 2,
            retry_delay_ms: 10,
            connect_timeout_s: 1,
            read_timeout_s: 2,
            ..RemoteConfig::default()
        },
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn test_remote_route_is_validated_and_cached() {
    let (endpoint, hits) = spawn_service(Behaviour::Success).await;
    let engine = RouteResolutionEngine::new(config_for(vec![endpoint])).unwrap();

    let resolution = engine
        .resolve_detailed(START, DESTINATION, RoutingProfile::Foot)
        .await
        .unwrap();
    let route = &resolution.route;

    assert_eq!(route.source(), SourceKind::Remote);
    assert_eq!(route.points().len(), 7);
    assert!((route.distance_m() - spatial::path_length_m(route.points())).abs() < 1e-3);
    assert!(route.distance_m() < 1_000.0, "upstream distance must not be trusted");
    assert_eq!(route.maneuvers().len(), 2);
    assert_eq!(route.maneuvers()[0].street.as_deref(), Some("Deichstraße"));
    assert_eq!(
        resolution.tiers.last().map(|report| report.tier),
        Some(Tier::CacheAndReturn)
    );

    let again = engine
        .resolve_detailed(START, DESTINATION, RoutingProfile::Foot)
        .await
        .unwrap();
    assert!(again.cached);
    assert_eq!(again.route, resolution.route);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_geojson_geometry_is_accepted() {
    let (endpoint, _hits) = spawn_service(Behaviour::GeoJson).await;
    let mut config = config_for(vec![endpoint]);
    config.remote.geometry_format = GeometryFormat::GeoJson;
    let engine = RouteResolutionEngine::new(config).unwrap();

    let route = engine
        .resolve(START, DESTINATION, RoutingProfile::Foot)
        .await
        .unwrap();
    assert_eq!(route.source(), SourceKind::Remote);
    assert_eq!(route.first(), START);
}

#[tokio::test]
async fn test_non_ok_code_retries_then_degrades() {
    let (endpoint, hits) = spawn_service(Behaviour::NoRoute).await;
    let engine = RouteResolutionEngine::new(config_for(vec![endpoint])).unwrap();

    let resolution = engine
        .resolve_detailed(START, DESTINATION, RoutingProfile::Foot)
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_ne!(resolution.route.source(), SourceKind::Remote);
    assert!(resolution.tiers.iter().any(|report| {
        report.tier == Tier::RemoteAttempt && matches!(report.outcome, Outcome::Unavailable { .. })
    }));
}

#[tokio::test]
async fn test_server_error_moves_to_fallback_endpoint() {
    let (primary, primary_hits) = spawn_service(Behaviour::ServerError).await;
    let (fallback, fallback_hits) = spawn_service(Behaviour::Success).await;
    let engine = RouteResolutionEngine::new(config_for(vec![primary, fallback])).unwrap();

    let route = engine
        .resolve(START, DESTINATION, RoutingProfile::Foot)
        .await
        .unwrap();

    assert_eq!(route.source(), SourceKind::Remote);
    assert_eq!(primary_hits.load(Ordering::SeqCst), 2);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_far_start_is_rejected_and_offline_tier_runs() {
    let (endpoint, _hits) = spawn_service(Behaviour::FarStart).await;
    let engine = RouteResolutionEngine::new(config_for(vec![endpoint])).unwrap();

    let resolution = engine
        .resolve_detailed(START, DESTINATION, RoutingProfile::Foot)
        .await
        .unwrap();

    let rejected = resolution
        .rejections()
        .next()
        .expect("remote route should be rejected");
    match &rejected.outcome {
        Outcome::Rejected { source, reason, .. } => {
            assert_eq!(*source, SourceKind::Remote);
            assert!(reason.contains("endpoint distance"), "reason: {}", reason);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(resolution
        .tiers
        .iter()
        .any(|report| report.tier == Tier::OfflineAttempt));
    assert_ne!(resolution.route.source(), SourceKind::Remote);
}

#[tokio::test]
async fn test_unreachable_endpoint_still_returns_route() {
    let endpoint = unused_endpoint().await;
    let engine = RouteResolutionEngine::new(config_for(vec![endpoint])).unwrap();

    let start = Coordinate {
        latitude: 53.5142,
        longitude: 8.1428,
    };
    let destination = Coordinate {
        latitude: 53.5049,
        longitude: 8.1554,
    };
    let route = engine
        .resolve(start, destination, RoutingProfile::Foot)
        .await
        .unwrap();

    assert_eq!(route.source(), SourceKind::SyntheticFallback);
    assert_eq!(route.points().len(), 3);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_profile_without_endpoints_skips_network() {
    let (endpoint, hits) = spawn_service(Behaviour::Success).await;
    let engine = RouteResolutionEngine::new(config_for(vec![endpoint])).unwrap();

    let route = engine
        .resolve(START, DESTINATION, RoutingProfile::Bicycle)
        .await
        .unwrap();

    assert_ne!(route.source(), SourceKind::Remote);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
