//! Core data models for route resolution.

use crate::error::{Result, RouteError};
use crate::spatial::path_length_m;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting anything outside the valid lat/lon range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coordinate = Self {
            latitude,
            longitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RouteError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = String;

    /// Parses `"lat,lon"`.
    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lon) = value
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON but got '{}'", value))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
        Coordinate::new(latitude, longitude).map_err(|err| err.to_string())
    }
}

/// Which tier of the resolution pipeline produced a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Returned by a remote routing service.
    Remote,
    /// A* search over the on-device path graph.
    OfflineGraph,
    /// Degraded geometric detour, never validated.
    SyntheticFallback,
}

impl SourceKind {
    /// Whether the route followed real path data rather than a geometric guess.
    pub fn is_authoritative(&self) -> bool {
        !matches!(self, SourceKind::SyntheticFallback)
    }
}

/// Travel mode used to pick endpoints and alternative-route weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingProfile {
    #[default]
    Foot,
    Bicycle,
}

impl RoutingProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingProfile::Foot => "foot",
            RoutingProfile::Bicycle => "bicycle",
        }
    }
}

impl fmt::Display for RoutingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingProfile {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "foot" | "walk" | "walking" => Ok(RoutingProfile::Foot),
            "bicycle" | "bike" | "cycling" => Ok(RoutingProfile::Bicycle),
            other => Err(format!("unknown routing profile '{}'", other)),
        }
    }
}

/// A turn maneuver reported by a remote routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    /// Maneuver type as reported upstream ("turn", "depart", "arrive", ...).
    pub kind: String,
    #[serde(default)]
    pub modifier: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    /// Length of the step that follows the maneuver.
    pub distance_m: f64,
    #[serde(default)]
    pub location: Option<Coordinate>,
}

/// A resolved route.
///
/// The distance is always recomputed from the points, so it equals the
/// great-circle length of the polyline regardless of what produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    points: Vec<Coordinate>,
    distance_m: f64,
    source: SourceKind,
    maneuvers: Vec<Maneuver>,
}

impl Route {
    pub fn new(points: Vec<Coordinate>, source: SourceKind) -> Result<Self> {
        if points.len() < 2 {
            return Err(RouteError::TooFewPoints(points.len()));
        }
        if let Some(invalid) = points.iter().find(|point| !point.is_valid()) {
            return Err(RouteError::InvalidCoordinate {
                latitude: invalid.latitude,
                longitude: invalid.longitude,
            });
        }
        let distance_m = path_length_m(&points);
        Ok(Self {
            points,
            distance_m,
            source,
            maneuvers: Vec::new(),
        })
    }

    pub fn with_maneuvers(mut self, maneuvers: Vec<Maneuver>) -> Self {
        self.maneuvers = maneuvers;
        self
    }

    /// Same geometry, different provenance.
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn maneuvers(&self) -> &[Maneuver] {
        &self.maneuvers
    }

    pub fn first(&self) -> Coordinate {
        self.points[0]
    }

    pub fn last(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }
}

/// Which validator check rejected a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    MinimumSize,
    EndpointProximity,
    SegmentLength,
    TurnAngle,
    Density,
}

/// Outcome of running the validator over a candidate route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub reason: String,
    #[serde(default)]
    pub failed_check: Option<ValidationCheck>,
}

impl ValidationVerdict {
    pub fn pass() -> Self {
        Self {
            valid: true,
            reason: "route passed all checks".to_string(),
            failed_check: None,
        }
    }

    pub fn fail(check: ValidationCheck, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
            failed_check: Some(check),
        }
    }
}
