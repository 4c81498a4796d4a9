//! Route resolution orchestrator.
//!
//! A request walks a fixed chain of tiers: cache, remote service, offline
//! graph, synthetic fallback. Every candidate except the synthetic one has to
//! pass the validator before it is cached and returned. Each tier records a
//! typed outcome so callers can see why a route was (or was not) accepted.

use crate::cache::RouteCache;
use crate::config::EngineConfig;
use crate::remote::{RemoteRoutingClient, RouteSource};
use routeguard_core::{
    Coordinate, OfflineRouter, Route, RouteError, RouteValidator, RoutingProfile, SourceKind,
    ValidationCheck,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] RouteError),
    #[error("resolution was cancelled")]
    Cancelled,
    #[error("resolution task failed: {0}")]
    TaskFailed(String),
}

/// A step of the resolution state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    CacheCheck,
    RemoteAttempt,
    Validate,
    OfflineAttempt,
    SyntheticFallback,
    CacheAndReturn,
}

/// What happened when a tier ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Hit,
    Miss,
    Produced { source: SourceKind, points: usize },
    Unavailable { reason: String },
    Accepted { source: SourceKind },
    Rejected {
        source: SourceKind,
        check: Option<ValidationCheck>,
        reason: String,
    },
    Stored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierReport {
    pub tier: Tier,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// A resolved route plus the trail of tiers that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub route: Route,
    pub tiers: Vec<TierReport>,
    pub cached: bool,
}

impl Resolution {
    pub fn rejections(&self) -> impl Iterator<Item = &TierReport> {
        self.tiers
            .iter()
            .filter(|report| matches!(report.outcome, Outcome::Rejected { .. }))
    }
}

enum State {
    CacheCheck,
    RemoteAttempt,
    Validate(Route),
    OfflineAttempt,
    SyntheticFallback,
    CacheAndReturn(Route),
}

/// Session-scoped engine owning the result cache and the offline graph.
///
/// Share it behind an `Arc`; concurrent resolutions only contend on the cache
/// and graph locks, never on each other's network waits.
pub struct RouteResolutionEngine<S = RemoteRoutingClient> {
    config: EngineConfig,
    remote: S,
    validator: RouteValidator,
    offline: OfflineRouter,
    cache: RouteCache,
}

impl RouteResolutionEngine<RemoteRoutingClient> {
    pub fn new(config: EngineConfig) -> Result<Self, reqwest::Error> {
        let remote = RemoteRoutingClient::new(config.remote.clone())?;
        Ok(Self::with_source(config, remote))
    }
}

impl<S: RouteSource> RouteResolutionEngine<S> {
    pub fn with_source(config: EngineConfig, remote: S) -> Self {
        Self {
            validator: RouteValidator::new(config.validator.clone()),
            offline: OfflineRouter::new(config.offline.clone()),
            cache: RouteCache::new(config.cache.clone()),
            remote,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn offline(&self) -> &OfflineRouter {
        &self.offline
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Feed one drawn path into the offline graph.
    pub fn add_path(&self, points: &[Coordinate]) -> usize {
        self.offline.add_path(points)
    }

    /// Swap the whole path inventory for a new one.
    pub fn replace_paths<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[Coordinate]>,
    {
        self.offline.replace_paths(paths)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn resolve(
        &self,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> Result<Route, ResolveError> {
        self.resolve_detailed(start, destination, profile)
            .await
            .map(|resolution| resolution.route)
    }

    /// Resolve a route and report every tier visited on the way.
    ///
    /// Only out-of-range coordinates produce an error; everything else
    /// degrades to the next tier and ends in a route.
    pub async fn resolve_detailed(
        &self,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> Result<Resolution, ResolveError> {
        start.validate()?;
        destination.validate()?;

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("resolve", %request_id, %profile);
        self.run(start, destination, profile).instrument(span).await
    }

    async fn run(
        &self,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> Result<Resolution, ResolveError> {
        let key = self.cache.key(start, destination, profile);
        let mut tiers = Vec::new();
        let mut state = State::CacheCheck;

        loop {
            state = match state {
                State::CacheCheck => match self.cache.get(&key) {
                    Some(entry) => {
                        tracing::debug!("Cache hit ({} points)", entry.route.points().len());
                        tiers.push(report(Tier::CacheCheck, Outcome::Hit));
                        return Ok(Resolution {
                            route: entry.route,
                            tiers,
                            cached: true,
                        });
                    }
                    None => {
                        tiers.push(report(Tier::CacheCheck, Outcome::Miss));
                        State::RemoteAttempt
                    }
                },
                State::RemoteAttempt => {
                    match self.remote.fetch_route(start, destination, profile).await {
                        Some(route) => {
                            tiers.push(report(Tier::RemoteAttempt, produced(&route)));
                            State::Validate(route)
                        }
                        None => {
                            tracing::debug!("Remote routing unavailable; trying offline graph");
                            tiers.push(report(
                                Tier::RemoteAttempt,
                                Outcome::Unavailable {
                                    reason: "no endpoint returned a usable route".to_string(),
                                },
                            ));
                            State::OfflineAttempt
                        }
                    }
                }
                State::Validate(route) => {
                    let source = route.source();
                    let verdict = self.validator.validate(&route, start, destination);
                    if verdict.valid {
                        tiers.push(report(Tier::Validate, Outcome::Accepted { source }));
                        State::CacheAndReturn(route)
                    } else {
                        tracing::warn!(
                            "Rejected {:?} route: {}",
                            source,
                            verdict.reason
                        );
                        tiers.push(report(
                            Tier::Validate,
                            Outcome::Rejected {
                                source,
                                check: verdict.failed_check,
                                reason: verdict.reason,
                            },
                        ));
                        match source {
                            SourceKind::Remote => State::OfflineAttempt,
                            _ => State::SyntheticFallback,
                        }
                    }
                }
                State::OfflineAttempt => match self.offline.find_route(start, destination) {
                    Ok(route) => {
                        tiers.push(report(Tier::OfflineAttempt, produced(&route)));
                        State::Validate(route)
                    }
                    Err(failure) => {
                        tracing::debug!("Offline search failed: {}", failure);
                        tiers.push(report(
                            Tier::OfflineAttempt,
                            Outcome::Unavailable {
                                reason: failure.to_string(),
                            },
                        ));
                        State::SyntheticFallback
                    }
                },
                State::SyntheticFallback => {
                    let route = self.offline.safe_fallback(start, destination)?;
                    tracing::info!(
                        "Using synthetic fallback route ({:.0} m)",
                        route.distance_m()
                    );
                    tiers.push(report(Tier::SyntheticFallback, produced(&route)));
                    return Ok(Resolution {
                        route,
                        tiers,
                        cached: false,
                    });
                }
                State::CacheAndReturn(route) => {
                    self.cache.insert(key, route.clone());
                    tiers.push(report(Tier::CacheAndReturn, Outcome::Stored));
                    tracing::info!(
                        "Resolved {:?} route: {} points, {:.0} m",
                        route.source(),
                        route.points().len(),
                        route.distance_m()
                    );
                    return Ok(Resolution {
                        route,
                        tiers,
                        cached: false,
                    });
                }
            };
        }
    }
}

impl<S: RouteSource + 'static> RouteResolutionEngine<S> {
    /// Resolve on a background task the caller can abandon.
    pub fn spawn_resolve(
        self: &Arc<Self>,
        start: Coordinate,
        destination: Coordinate,
        profile: RoutingProfile,
    ) -> ResolveHandle {
        let engine = Arc::clone(self);
        let task =
            tokio::spawn(async move { engine.resolve(start, destination, profile).await });
        ResolveHandle { task }
    }
}

/// Handle to a resolution running in the background.
///
/// Cancelling drops any in-flight request; the cache is only written after a
/// route has been accepted, so an abandoned resolution leaves nothing behind.
#[derive(Debug)]
pub struct ResolveHandle {
    task: JoinHandle<Result<Route, ResolveError>>,
}

impl ResolveHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<Route, ResolveError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(ResolveError::Cancelled),
            Err(err) => Err(ResolveError::TaskFailed(err.to_string())),
        }
    }
}

fn report(tier: Tier, outcome: Outcome) -> TierReport {
    TierReport { tier, outcome }
}

fn produced(route: &Route) -> Outcome {
    Outcome::Produced {
        source: route.source(),
        points: route.points().len(),
    }
}
