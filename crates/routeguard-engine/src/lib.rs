//! Routeguard engine - tiered route resolution.
//!
//! Wraps the synchronous pieces from `routeguard-core` with the remote
//! routing client, retry policy and result cache, and sequences them in
//! [`RouteResolutionEngine`].

pub mod cache;
pub mod config;
pub mod engine;
pub mod remote;
pub mod retry;

pub use cache::{CacheKey, CachedRoute, RouteCache};
pub use config::{CacheConfig, EngineConfig, GeometryFormat, RemoteConfig, ScoreWeights};
pub use engine::{
    Outcome, Resolution, ResolveError, ResolveHandle, RouteResolutionEngine, Tier, TierReport,
};
pub use remote::{build_route_url, FetchError, RemoteRoutingClient, RouteSource};
pub use retry::RetryPolicy;
