//! Error types for the routing core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouteError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// Latitude or longitude outside the WGS84 range, or not finite.
    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A route needs at least two points to describe a segment.
    #[error("route needs at least 2 points, got {0}")]
    TooFewPoints(usize),
}
