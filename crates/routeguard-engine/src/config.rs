//! Engine configuration: policy defaults overlaid with environment variables.

use routeguard_core::{OfflineConfig, RoutingProfile, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Geometry encoding requested from the routing service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryFormat {
    #[default]
    Polyline,
    GeoJson,
}

impl GeometryFormat {
    pub fn as_query(&self) -> &'static str {
        match self {
            GeometryFormat::Polyline => "polyline",
            GeometryFormat::GeoJson => "geojson",
        }
    }
}

/// Weights for ranking alternative routes; lower score wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub duration: f64,
    pub distance: f64,
}

impl ScoreWeights {
    pub fn score(&self, duration_s: f64, distance_m: f64) -> f64 {
        self.duration * duration_s + self.distance * distance_m
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Ordered base URLs for foot routing; the first is the primary
    pub foot_endpoints: Vec<String>,
    /// Ordered base URLs for bicycle routing; the first is the primary
    pub bicycle_endpoints: Vec<String>,
    /// Attempts per endpoint
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub connect_timeout_s: u64,
    pub read_timeout_s: u64,
    pub geometry_format: GeometryFormat,
    pub foot_weights: ScoreWeights,
    pub bicycle_weights: ScoreWeights,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            foot_endpoints: vec![
                "https://routing.openstreetmap.de/routed-foot/route/v1/foot/".to_string(),
                "https://router.project-osrm.org/route/v1/foot/".to_string(),
            ],
            bicycle_endpoints: vec![
                "https://routing.openstreetmap.de/routed-bike/route/v1/bike/".to_string(),
                "https://router.project-osrm.org/route/v1/bike/".to_string(),
            ],
            max_retries: 3,
            retry_delay_ms: 1_000,
            connect_timeout_s: 10,
            read_timeout_s: 15,
            geometry_format: GeometryFormat::Polyline,
            foot_weights: ScoreWeights {
                duration: 1.0,
                distance: 0.5,
            },
            // Cyclists prefer the shorter, quieter option over the fastest one.
            bicycle_weights: ScoreWeights {
                duration: 0.3,
                distance: 1.0,
            },
        }
    }
}

impl RemoteConfig {
    pub fn endpoints(&self, profile: RoutingProfile) -> &[String] {
        match profile {
            RoutingProfile::Foot => &self.foot_endpoints,
            RoutingProfile::Bicycle => &self.bicycle_endpoints,
        }
    }

    pub fn weights(&self, profile: RoutingProfile) -> ScoreWeights {
        match profile {
            RoutingProfile::Foot => self.foot_weights,
            RoutingProfile::Bicycle => self.bicycle_weights,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_s)
    }

    /// Whole-request bound: connect phase plus read phase.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_s + self.read_timeout_s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_s: u64,
    pub max_entries: usize,
    /// Decimal places kept when rounding endpoints into a cache key
    pub key_precision: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_s: 24 * 60 * 60,
            max_entries: 256,
            key_precision: 4,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_s)
    }
}

/// Every tunable of the resolution engine, supplied once at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub validator: ValidatorConfig,
    pub remote: RemoteConfig,
    pub offline: OfflineConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(endpoints) = env_list("ROUTEGUARD_FOOT_ENDPOINTS") {
            config.remote.foot_endpoints = endpoints;
        }
        if let Some(endpoints) = env_list("ROUTEGUARD_BICYCLE_ENDPOINTS") {
            config.remote.bicycle_endpoints = endpoints;
        }
        if let Some(value) = env_parse("ROUTEGUARD_MAX_RETRIES") {
            config.remote.max_retries = value;
        }
        if let Some(value) = env_parse("ROUTEGUARD_RETRY_DELAY_MS") {
            config.remote.retry_delay_ms = value;
        }
        if let Some(value) = env_parse("ROUTEGUARD_CONNECT_TIMEOUT_S") {
            config.remote.connect_timeout_s = value;
        }
        if let Some(value) = env_parse("ROUTEGUARD_READ_TIMEOUT_S") {
            config.remote.read_timeout_s = value;
        }
        if let Some(value) = env_parse("ROUTEGUARD_CACHE_TTL_S") {
            config.cache.ttl_s = value;
        }
        if let Some(value) = env_parse("ROUTEGUARD_CACHE_MAX_ENTRIES") {
            config.cache.max_entries = value;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let values: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
