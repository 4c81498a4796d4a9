//! On-device routing over the path graph.
//!
//! Snaps the request endpoints to the nearest graph nodes, runs A* between
//! them and stitches the caller's literal endpoints back onto the result.
//! When the graph is empty a synthetic grid stands in for it.

use crate::error::RouteError;
use crate::graph::{NodeKey, PathGraph};
use crate::models::{Coordinate, Route, SourceKind};
use crate::spatial::distance_m;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError, RwLock};
use thiserror::Error;

/// Consecutive points closer than this are treated as the same point.
const DUPLICATE_POINT_M: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Rounding applied to node coordinates (~10 m at 1e-4 degrees)
    pub node_tolerance_deg: f64,
    /// Query points further than this from every node cannot be snapped
    pub max_snap_distance_m: f64,
    /// Hard cap on A* expansions
    pub max_iterations: usize,
    /// Below this distance the safe fallback is a straight segment
    pub direct_fallback_m: f64,
    /// Cells per side of the synthetic grid
    pub grid_cells: usize,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            node_tolerance_deg: 1e-4,
            max_snap_distance_m: 1_000.0,
            max_iterations: 1_000,
            direct_fallback_m: 100.0,
            grid_cells: 2,
        }
    }
}

/// Why the graph search produced no path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchFailure {
    #[error("no graph node within {0:.0} m of start")]
    StartNotSnapped(f64),
    #[error("no graph node within {0:.0} m of destination")]
    DestinationNotSnapped(f64),
    #[error("destination unreachable from start")]
    Unreachable,
    #[error("search gave up after {0} expansions")]
    IterationLimit(usize),
    #[error("search produced a degenerate route: {0}")]
    Degenerate(RouteError),
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f_score: FloatOrd,
    g_score: FloatOrd,
    key: NodeKey,
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
            .then_with(|| self.key.cmp(&other.key))
    }
}

/// A* over `graph` from `start` to `goal`.
///
/// g is accumulated great-circle edge length and h the great-circle distance
/// to the goal, which never overestimates since edges are straight lines.
pub fn a_star(
    graph: &PathGraph,
    start: NodeKey,
    goal: NodeKey,
    max_iterations: usize,
) -> Result<Vec<NodeKey>, SearchFailure> {
    let goal_coord = graph.coordinate(goal).ok_or(SearchFailure::Unreachable)?;
    let start_coord = graph.coordinate(start).ok_or(SearchFailure::Unreachable)?;

    let mut open_set: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();
    let mut closed_set: HashSet<NodeKey> = HashSet::new();
    let mut g_score: HashMap<NodeKey, f64> = HashMap::new();
    let mut came_from: HashMap<NodeKey, NodeKey> = HashMap::new();

    g_score.insert(start, 0.0);
    open_set.push(Reverse(OpenNode {
        f_score: FloatOrd(distance_m(start_coord, goal_coord)),
        g_score: FloatOrd(0.0),
        key: start,
    }));

    let mut iterations = 0usize;
    while let Some(Reverse(current)) = open_set.pop() {
        if closed_set.contains(&current.key) {
            continue;
        }
        let best_g = g_score.get(&current.key).copied().unwrap_or(f64::INFINITY);
        if current.g_score.0 > best_g + 1e-9 {
            continue;
        }

        if current.key == goal {
            return Ok(reconstruct_path(&came_from, goal));
        }

        iterations += 1;
        if iterations > max_iterations {
            return Err(SearchFailure::IterationLimit(max_iterations));
        }
        closed_set.insert(current.key);

        let Some(current_coord) = graph.coordinate(current.key) else {
            continue;
        };
        for next in graph.neighbors(current.key) {
            if closed_set.contains(&next) {
                continue;
            }
            let Some(next_coord) = graph.coordinate(next) else {
                continue;
            };
            let tentative_g = best_g + distance_m(current_coord, next_coord);
            if tentative_g < g_score.get(&next).copied().unwrap_or(f64::INFINITY) {
                came_from.insert(next, current.key);
                g_score.insert(next, tentative_g);
                open_set.push(Reverse(OpenNode {
                    f_score: FloatOrd(tentative_g + distance_m(next_coord, goal_coord)),
                    g_score: FloatOrd(tentative_g),
                    key: next,
                }));
            }
        }
    }

    Err(SearchFailure::Unreachable)
}

fn reconstruct_path(came_from: &HashMap<NodeKey, NodeKey>, goal: NodeKey) -> Vec<NodeKey> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(previous) = came_from.get(&current) {
        path.push(*previous);
        current = *previous;
    }
    path.reverse();
    path
}

/// Safe geometric detour used when nothing better exists.
///
/// Short hops go direct. Longer ones bend once via `(start.lat, destination.lon)`:
/// an axis-aligned bend is less likely to cross water than the diagonal.
pub fn safe_fallback_path(
    start: Coordinate,
    destination: Coordinate,
    direct_threshold_m: f64,
) -> Vec<Coordinate> {
    if distance_m(start, destination) < direct_threshold_m {
        return vec![start, destination];
    }
    let bend = Coordinate {
        latitude: start.latitude,
        longitude: destination.longitude,
    };
    if distance_m(bend, start) < DUPLICATE_POINT_M || distance_m(bend, destination) < DUPLICATE_POINT_M
    {
        return vec![start, destination];
    }
    vec![start, bend, destination]
}

/// Owns the session's path graph and the snapped-node cache.
#[derive(Debug)]
pub struct OfflineRouter {
    config: OfflineConfig,
    graph: RwLock<PathGraph>,
    snap_cache: Mutex<HashMap<NodeKey, Option<NodeKey>>>,
}

impl OfflineRouter {
    pub fn new(config: OfflineConfig) -> Self {
        let graph = PathGraph::new(config.node_tolerance_deg);
        Self {
            config,
            graph: RwLock::new(graph),
            snap_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Seed the graph with one drawn path. Returns the number of new edges.
    pub fn add_path(&self, points: &[Coordinate]) -> usize {
        let added = self
            .graph
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_path(points);
        self.invalidate_snaps();
        added
    }

    /// Rebuild the graph from the current path inventory.
    pub fn replace_paths<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[Coordinate]>,
    {
        let added = {
            let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
            graph.clear();
            paths
                .into_iter()
                .map(|path| graph.add_path(path.as_ref()))
                .sum::<usize>()
        };
        self.invalidate_snaps();
        added
    }

    pub fn clear(&self) {
        self.graph
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.invalidate_snaps();
    }

    pub fn node_count(&self) -> usize {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .edge_count()
    }

    /// Search the graph; falls back to a synthetic grid when it is empty.
    pub fn find_route(
        &self,
        start: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, SearchFailure> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        if graph.is_empty() {
            drop(graph);
            tracing::debug!("No path data loaded; searching synthetic grid");
            let grid = PathGraph::synthetic_grid(
                start,
                destination,
                self.config.grid_cells,
                self.config.node_tolerance_deg,
            );
            let start_node = self.nearest(&grid, start);
            let goal_node = self.nearest(&grid, destination);
            return self.search(&grid, start, destination, start_node, goal_node);
        }

        let start_node = self.snap(&graph, start);
        let goal_node = self.snap(&graph, destination);
        self.search(&graph, start, destination, start_node, goal_node)
    }

    /// Graph route when one exists, otherwise the safe fallback path.
    pub fn route(&self, start: Coordinate, destination: Coordinate) -> crate::Result<Route> {
        match self.find_route(start, destination) {
            Ok(route) => Ok(route),
            Err(failure) => {
                tracing::debug!("Offline search failed ({}); using safe fallback", failure);
                self.safe_fallback(start, destination)
            }
        }
    }

    pub fn safe_fallback(&self, start: Coordinate, destination: Coordinate) -> crate::Result<Route> {
        Route::new(
            safe_fallback_path(start, destination, self.config.direct_fallback_m),
            SourceKind::SyntheticFallback,
        )
    }

    fn search(
        &self,
        graph: &PathGraph,
        start: Coordinate,
        destination: Coordinate,
        start_node: Option<NodeKey>,
        goal_node: Option<NodeKey>,
    ) -> Result<Route, SearchFailure> {
        let max = self.config.max_snap_distance_m;
        let start_node = start_node.ok_or(SearchFailure::StartNotSnapped(max))?;
        let goal_node = goal_node.ok_or(SearchFailure::DestinationNotSnapped(max))?;

        let path = a_star(graph, start_node, goal_node, self.config.max_iterations)?;

        let mut points = Vec::with_capacity(path.len() + 2);
        points.push(start);
        for coordinate in path.iter().filter_map(|key| graph.coordinate(*key)) {
            push_distinct(&mut points, coordinate);
        }
        // The caller's destination replaces a snapped node sitting on top of it.
        if points.len() > 1 {
            if let Some(last) = points.last() {
                if distance_m(*last, destination) < DUPLICATE_POINT_M {
                    points.pop();
                }
            }
        }
        push_distinct(&mut points, destination);

        Route::new(points, SourceKind::OfflineGraph).map_err(SearchFailure::Degenerate)
    }

    fn nearest(&self, graph: &PathGraph, point: Coordinate) -> Option<NodeKey> {
        graph
            .nearest_node(point, self.config.max_snap_distance_m)
            .map(|(key, _)| key)
    }

    fn snap(&self, graph: &PathGraph, point: Coordinate) -> Option<NodeKey> {
        let cache_key = graph.key_for(point);
        if let Some(cached) = self
            .snap_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
        {
            return *cached;
        }
        let snapped = self.nearest(graph, point);
        self.snap_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key, snapped);
        snapped
    }

    fn invalidate_snaps(&self) {
        self.snap_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for OfflineRouter {
    fn default() -> Self {
        Self::new(OfflineConfig::default())
    }
}

fn push_distinct(points: &mut Vec<Coordinate>, coordinate: Coordinate) {
    match points.last() {
        Some(last) if distance_m(*last, coordinate) < DUPLICATE_POINT_M => {}
        _ => points.push(coordinate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{meters_to_lat, meters_to_lon, path_length_m};

    const BASE_LAT: f64 = 53.5;
    const BASE_LON: f64 = 8.1;

    fn at(north_m: f64, east_m: f64) -> Coordinate {
        Coordinate {
            latitude: BASE_LAT + meters_to_lat(north_m, BASE_LAT),
            longitude: BASE_LON + meters_to_lon(east_m, BASE_LAT),
        }
    }

    /// Small hand-built network with a known optimum:
    /// S -> Y -> Z -> W -> G (~424 m) beats S -> X -> G (500 m) and the
    /// dead-end spur through V.
    fn sample_router() -> (OfflineRouter, Vec<Coordinate>) {
        let s = at(0.0, 0.0);
        let x = at(200.0, 150.0);
        let y = at(100.0, 0.0);
        let z = at(200.0, -50.0);
        let w = at(300.0, 0.0);
        let g = at(400.0, 0.0);
        let v = at(150.0, -300.0);
        let u = at(350.0, -300.0);

        let router = OfflineRouter::default();
        router.add_path(&[s, x, g]);
        router.add_path(&[s, y, z, w, g]);
        router.add_path(&[z, v, u]);
        (router, vec![s, y, z, w, g])
    }

    #[test]
    fn a_star_finds_known_shortest_path() {
        let (router, optimal) = sample_router();
        let start = optimal[0];
        let goal = optimal[optimal.len() - 1];
        let route = router.find_route(start, goal).unwrap();
        assert_eq!(route.source(), SourceKind::OfflineGraph);
        let expected = path_length_m(&optimal);
        assert!(
            (route.distance_m() - expected).abs() < 1e-6,
            "expected {expected}, got {}",
            route.distance_m()
        );
        assert_eq!(route.points().len(), optimal.len());
    }

    #[test]
    fn literal_endpoints_replace_snapped_nodes() {
        let (router, optimal) = sample_router();
        // Query points 30 m off the graph still snap to S and G.
        let start = at(-30.0, 0.0);
        let goal = at(430.0, 0.0);
        let route = router.find_route(start, goal).unwrap();
        assert_eq!(route.first(), start);
        assert_eq!(route.last(), goal);
        assert_eq!(route.points()[1], optimal[0]);
        assert_eq!(route.points()[route.points().len() - 2], optimal[4]);
    }

    #[test]
    fn disconnected_components_are_unreachable() {
        let router = OfflineRouter::default();
        router.add_path(&[at(0.0, 0.0), at(100.0, 0.0)]);
        router.add_path(&[at(500.0, 0.0), at(600.0, 0.0)]);
        let result = router.find_route(at(0.0, 0.0), at(600.0, 0.0));
        assert_eq!(result, Err(SearchFailure::Unreachable));
    }

    #[test]
    fn far_query_cannot_snap() {
        let router = OfflineRouter::default();
        router.add_path(&[at(0.0, 0.0), at(100.0, 0.0)]);
        let result = router.find_route(at(5_000.0, 0.0), at(100.0, 0.0));
        assert_eq!(result, Err(SearchFailure::StartNotSnapped(1_000.0)));
        let result = router.find_route(at(0.0, 0.0), at(5_000.0, 0.0));
        assert_eq!(result, Err(SearchFailure::DestinationNotSnapped(1_000.0)));
    }

    #[test]
    fn iteration_cap_bounds_long_searches() {
        let router = OfflineRouter::new(OfflineConfig {
            max_iterations: 50,
            ..OfflineConfig::default()
        });
        let chain: Vec<Coordinate> = (0..200).map(|i| at(i as f64 * 20.0, 0.0)).collect();
        router.add_path(&chain);
        let result = router.find_route(chain[0], chain[199]);
        assert_eq!(result, Err(SearchFailure::IterationLimit(50)));
    }

    #[test]
    fn route_falls_back_when_search_fails() {
        let router = OfflineRouter::default();
        router.add_path(&[at(0.0, 0.0), at(100.0, 0.0)]);
        let start = at(5_000.0, 0.0);
        let end = at(5_500.0, 400.0);
        let route = router.route(start, end).unwrap();
        assert_eq!(route.source(), SourceKind::SyntheticFallback);
        assert_eq!(route.points().len(), 3);
    }

    #[test]
    fn empty_graph_searches_synthetic_grid() {
        let router = OfflineRouter::default();
        let start = Coordinate { latitude: 53.5142, longitude: 8.1428 };
        let end = Coordinate { latitude: 53.5049, longitude: 8.1554 };
        let route = router.find_route(start, end).unwrap();
        assert_eq!(route.source(), SourceKind::OfflineGraph);
        assert_eq!(route.first(), start);
        assert_eq!(route.last(), end);
        // Manhattan path across a 2x2 grid visits five nodes.
        assert_eq!(route.points().len(), 5);
        assert_eq!(router.node_count(), 0);
    }

    #[test]
    fn graph_changes_invalidate_snapped_nodes() {
        let router = OfflineRouter::default();
        router.add_path(&[at(0.0, 0.0), at(100.0, 0.0)]);
        assert!(router.find_route(at(0.0, 0.0), at(2_000.0, 0.0)).is_err());
        router.add_path(&[at(100.0, 0.0), at(2_000.0, 0.0)]);
        let route = router.find_route(at(0.0, 0.0), at(2_000.0, 0.0)).unwrap();
        assert_eq!(route.points().len(), 3);
    }

    #[test]
    fn replace_paths_rebuilds_graph() {
        let router = OfflineRouter::default();
        router.add_path(&[at(0.0, 0.0), at(100.0, 0.0)]);
        let added = router.replace_paths(vec![vec![at(0.0, 0.0), at(0.0, 100.0), at(0.0, 200.0)]]);
        assert_eq!(added, 2);
        assert_eq!(router.node_count(), 3);
        assert_eq!(router.edge_count(), 2);
        router.clear();
        assert_eq!(router.node_count(), 0);
    }

    #[test]
    fn safe_fallback_goes_direct_for_short_hops() {
        let path = safe_fallback_path(at(0.0, 0.0), at(50.0, 50.0), 100.0);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn safe_fallback_bends_along_axes() {
        let start = Coordinate { latitude: 53.5142, longitude: 8.1428 };
        let end = Coordinate { latitude: 53.5049, longitude: 8.1554 };
        let path = safe_fallback_path(start, end, 100.0);
        assert_eq!(
            path,
            vec![
                start,
                Coordinate { latitude: 53.5142, longitude: 8.1554 },
                end
            ]
        );
    }

    #[test]
    fn safe_fallback_skips_bend_on_shared_axis() {
        let start = at(0.0, 0.0);
        let end = at(0.0, 800.0);
        assert_eq!(safe_fallback_path(start, end, 100.0), vec![start, end]);
    }
}
