//! Routeguard core - geometry, validation and offline routing.
//!
//! Everything in this crate is synchronous and free of I/O. The resolution
//! engine in `routeguard-engine` sequences these pieces into tiers.

pub mod error;
pub mod graph;
pub mod guidance;
pub mod models;
pub mod offline;
pub mod polyline;
pub mod spatial;
pub mod validator;

pub use error::{Result, RouteError};
pub use graph::{NodeKey, PathGraph};
pub use guidance::{maneuver_text, next_instruction, Instruction, TurnDirection};
pub use models::{
    Coordinate, Maneuver, Route, RoutingProfile, SourceKind, ValidationCheck, ValidationVerdict,
};
pub use offline::{a_star, safe_fallback_path, OfflineConfig, OfflineRouter, SearchFailure};
pub use polyline::{decode_polyline, encode_polyline, DEFAULT_PRECISION};
pub use spatial::{angle_difference, bearing_degrees, distance_m, haversine_distance, interpolate};
pub use validator::{RouteValidator, ValidatorConfig};
