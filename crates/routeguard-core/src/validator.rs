//! Heuristic plausibility checks for candidate routes.
//!
//! The validator has no knowledge of real road topology. It flags geometry
//! that is likely wrong: routes that start or end far from the request, cut
//! across terrain in long straight hops, zig-zag implausibly, or are spaced
//! so evenly that they were probably generated rather than followed.

use crate::models::{Coordinate, Route, ValidationCheck, ValidationVerdict};
use crate::spatial::{angle_difference, bearing_degrees, distance_m};
use serde::{Deserialize, Serialize};

/// Segments shorter than this carry no usable heading.
const MIN_HEADING_SEGMENT_M: f64 = 0.01;

/// Policy thresholds for route validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Max distance between a route endpoint and the requested endpoint
    pub max_endpoint_distance_m: f64,
    /// Segments longer than this count as suspicious
    pub max_suspicious_segment_m: f64,
    /// How many suspicious segments are tolerated
    pub max_suspicious_segments: usize,
    /// Bearing changes above this count as suspicious turns
    pub max_angle_deg: f64,
    /// How many suspicious turns are tolerated
    pub max_suspicious_angles: usize,
    /// Density check only runs on routes with at least this many points
    pub min_density_samples: usize,
    /// Minimum coefficient of variation of segment lengths
    pub min_density_cv: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_endpoint_distance_m: 500.0,
            max_suspicious_segment_m: 300.0,
            max_suspicious_segments: 2,
            max_angle_deg: 60.0,
            max_suspicious_angles: 3,
            min_density_samples: 10,
            min_density_cv: 0.1,
        }
    }
}

type Check = fn(&RouteValidator, &[Coordinate], Coordinate, Coordinate) -> Option<ValidationVerdict>;

#[derive(Debug, Clone, Default)]
pub struct RouteValidator {
    config: ValidatorConfig,
}

impl RouteValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate(
        &self,
        route: &Route,
        start: Coordinate,
        destination: Coordinate,
    ) -> ValidationVerdict {
        self.validate_points(route.points(), start, destination)
    }

    /// Run every check in priority order; the first failure wins.
    pub fn validate_points(
        &self,
        points: &[Coordinate],
        start: Coordinate,
        destination: Coordinate,
    ) -> ValidationVerdict {
        let checks: [Check; 5] = [
            Self::check_size,
            Self::check_endpoints,
            Self::check_segments,
            Self::check_angles,
            Self::check_density,
        ];

        for check in checks {
            if let Some(failure) = check(self, points, start, destination) {
                return failure;
            }
        }
        ValidationVerdict::pass()
    }

    fn check_size(
        &self,
        points: &[Coordinate],
        _start: Coordinate,
        _destination: Coordinate,
    ) -> Option<ValidationVerdict> {
        if points.len() >= 3 {
            return None;
        }
        Some(ValidationVerdict::fail(
            ValidationCheck::MinimumSize,
            format!("too few points: {} (need at least 3)", points.len()),
        ))
    }

    fn check_endpoints(
        &self,
        points: &[Coordinate],
        start: Coordinate,
        destination: Coordinate,
    ) -> Option<ValidationVerdict> {
        let max = self.config.max_endpoint_distance_m;
        let first = points.first()?;
        let last = points.last()?;

        let start_gap = distance_m(*first, start);
        if start_gap > max {
            return Some(ValidationVerdict::fail(
                ValidationCheck::EndpointProximity,
                format!(
                    "endpoint distance: route starts {:.0} m from requested start (limit {:.0} m)",
                    start_gap, max
                ),
            ));
        }
        let end_gap = distance_m(*last, destination);
        if end_gap > max {
            return Some(ValidationVerdict::fail(
                ValidationCheck::EndpointProximity,
                format!(
                    "endpoint distance: route ends {:.0} m from requested destination (limit {:.0} m)",
                    end_gap, max
                ),
            ));
        }
        None
    }

    fn check_segments(
        &self,
        points: &[Coordinate],
        _start: Coordinate,
        _destination: Coordinate,
    ) -> Option<ValidationVerdict> {
        let suspicious = points
            .windows(2)
            .filter(|pair| distance_m(pair[0], pair[1]) > self.config.max_suspicious_segment_m)
            .count();
        if suspicious <= self.config.max_suspicious_segments {
            return None;
        }
        Some(ValidationVerdict::fail(
            ValidationCheck::SegmentLength,
            format!(
                "suspicious segments: {} longer than {:.0} m (limit {})",
                suspicious, self.config.max_suspicious_segment_m, self.config.max_suspicious_segments
            ),
        ))
    }

    fn check_angles(
        &self,
        points: &[Coordinate],
        _start: Coordinate,
        _destination: Coordinate,
    ) -> Option<ValidationVerdict> {
        if points.len() < 3 {
            return None;
        }
        let suspicious = points
            .windows(3)
            .filter_map(|triple| turn_angle(triple[0], triple[1], triple[2]))
            .filter(|angle| angle.abs() > self.config.max_angle_deg)
            .count();
        if suspicious <= self.config.max_suspicious_angles {
            return None;
        }
        Some(ValidationVerdict::fail(
            ValidationCheck::TurnAngle,
            format!(
                "suspicious turns: {} bearing changes above {:.0}° (limit {})",
                suspicious, self.config.max_angle_deg, self.config.max_suspicious_angles
            ),
        ))
    }

    fn check_density(
        &self,
        points: &[Coordinate],
        _start: Coordinate,
        _destination: Coordinate,
    ) -> Option<ValidationVerdict> {
        if points.len() < self.config.min_density_samples {
            return None;
        }
        let lengths: Vec<f64> = points
            .windows(2)
            .map(|pair| distance_m(pair[0], pair[1]))
            .collect();
        let cv = coefficient_of_variation(&lengths);
        if cv >= self.config.min_density_cv {
            return None;
        }
        Some(ValidationVerdict::fail(
            ValidationCheck::Density,
            format!(
                "uniform spacing: segment length variation {:.3} below {:.3}",
                cv, self.config.min_density_cv
            ),
        ))
    }
}

/// Signed bearing change at `via`, or `None` when either leg is degenerate.
pub fn turn_angle(from: Coordinate, via: Coordinate, to: Coordinate) -> Option<f64> {
    if distance_m(from, via) < MIN_HEADING_SEGMENT_M || distance_m(via, to) < MIN_HEADING_SEGMENT_M
    {
        return None;
    }
    Some(angle_difference(
        bearing_degrees(from, via),
        bearing_degrees(via, to),
    ))
}

/// Population stddev over mean; zero for empty or zero-length input.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
