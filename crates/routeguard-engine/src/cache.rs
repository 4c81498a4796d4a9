//! Short-lived result cache keyed by rounded endpoints.

use crate::config::CacheConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use routeguard_core::{Coordinate, Route, RoutingProfile};
use std::hash::Hash;
use std::time::{Duration, Instant};

pub trait CacheEntry {
    fn fetched_at(&self) -> Instant;
}

/// Drop entries older than `max_age`, then the oldest until `max_entries` remain.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration)
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let now = Instant::now();
    let mut entries: Vec<(K, Instant)> = cache
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().fetched_at()))
        .collect();

    entries.retain(|(key, fetched_at)| {
        if now.duration_since(*fetched_at) >= max_age {
            cache.remove(key);
            false
        } else {
            true
        }
    });

    if cache.len() <= max_entries {
        return;
    }

    entries.sort_by_key(|(_, fetched_at)| *fetched_at);
    for (key, _) in entries {
        if cache.len() <= max_entries {
            break;
        }
        cache.remove(&key);
    }
}

/// Endpoints rounded to a fixed number of decimals, plus the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    start: (i64, i64),
    end: (i64, i64),
    profile: RoutingProfile,
}

impl CacheKey {
    pub fn new(
        start: Coordinate,
        end: Coordinate,
        profile: RoutingProfile,
        precision: u32,
    ) -> Self {
        let factor = 10f64.powi(precision as i32);
        let round = |c: Coordinate| {
            (
                (c.latitude * factor).round() as i64,
                (c.longitude * factor).round() as i64,
            )
        };
        Self {
            start: round(start),
            end: round(end),
            profile,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachedRoute {
    pub route: Route,
    pub created_at: DateTime<Utc>,
    fetched_at: Instant,
}

impl CacheEntry for CachedRoute {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

/// Concurrent reads, per-shard exclusive writes.
#[derive(Debug)]
pub struct RouteCache {
    entries: DashMap<CacheKey, CachedRoute>,
    config: CacheConfig,
}

impl RouteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    pub fn key(&self, start: Coordinate, end: Coordinate, profile: RoutingProfile) -> CacheKey {
        CacheKey::new(start, end, profile, self.config.key_precision)
    }

    /// Fresh entry for `key`; expired entries are evicted on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<CachedRoute> {
        {
            let entry = self.entries.get(key)?;
            if entry.fetched_at.elapsed() < self.config.ttl() {
                return Some(entry.value().clone());
            }
        }
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: CacheKey, route: Route) {
        self.entries.insert(
            key,
            CachedRoute {
                route,
                created_at: Utc::now(),
                fetched_at: Instant::now(),
            },
        );
        prune_cache(&self.entries, self.config.max_entries, self.config.ttl());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
