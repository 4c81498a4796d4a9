//! Bidirectional path graph built from drawn path geometry.

use crate::models::Coordinate;
use crate::spatial::distance_m;
use std::collections::{BTreeMap, BTreeSet};

/// Grid coordinate of a node after rounding to the graph tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    lat: i64,
    lon: i64,
}

impl NodeKey {
    pub fn from_coordinate(coordinate: Coordinate, tolerance_deg: f64) -> Self {
        let tolerance = tolerance_deg.max(1e-9);
        Self {
            lat: (coordinate.latitude / tolerance).round() as i64,
            lon: (coordinate.longitude / tolerance).round() as i64,
        }
    }
}

/// Nodes keep the first coordinate that landed in their cell, so near-duplicate
/// points from overlapping paths merge into a single node.
#[derive(Debug, Clone)]
pub struct PathGraph {
    tolerance_deg: f64,
    nodes: BTreeMap<NodeKey, Coordinate>,
    edges: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
}

impl PathGraph {
    pub fn new(tolerance_deg: f64) -> Self {
        Self {
            tolerance_deg,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    pub fn tolerance_deg(&self) -> f64 {
        self.tolerance_deg
    }

    pub fn key_for(&self, coordinate: Coordinate) -> NodeKey {
        NodeKey::from_coordinate(coordinate, self.tolerance_deg)
    }

    pub fn add_node(&mut self, coordinate: Coordinate) -> NodeKey {
        let key = self.key_for(coordinate);
        self.nodes.entry(key).or_insert(coordinate);
        key
    }

    /// Connect two coordinates both ways. Returns false for self-loops and
    /// edges that already existed.
    pub fn add_edge(&mut self, a: Coordinate, b: Coordinate) -> bool {
        let ka = self.add_node(a);
        let kb = self.add_node(b);
        if ka == kb {
            return false;
        }
        let inserted = self.edges.entry(ka).or_default().insert(kb);
        self.edges.entry(kb).or_default().insert(ka);
        inserted
    }

    /// Add consecutive edges of a path. Invalid coordinates split the path.
    pub fn add_path(&mut self, points: &[Coordinate]) -> usize {
        let mut added = 0usize;
        let mut previous: Option<Coordinate> = None;
        for point in points {
            if !point.is_valid() {
                previous = None;
                continue;
            }
            if let Some(prev) = previous {
                if self.add_edge(prev, *point) {
                    added += 1;
                }
            } else {
                self.add_node(*point);
            }
            previous = Some(*point);
        }
        added
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn coordinate(&self, key: NodeKey) -> Option<Coordinate> {
        self.nodes.get(&key).copied()
    }

    pub fn neighbors(&self, key: NodeKey) -> impl Iterator<Item = NodeKey> + '_ {
        self.edges.get(&key).into_iter().flat_map(|set| set.iter().copied())
    }

    /// Closest node within `max_distance_m`, by linear scan.
    pub fn nearest_node(&self, point: Coordinate, max_distance_m: f64) -> Option<(NodeKey, f64)> {
        let mut best: Option<(NodeKey, f64)> = None;
        for (key, coordinate) in &self.nodes {
            let dist = distance_m(point, *coordinate);
            if dist > max_distance_m {
                continue;
            }
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((*key, dist));
            }
        }
        best
    }

    /// Coarse grid spanning the bounding box of two points.
    ///
    /// This is a degraded substrate for searching when no path data exists;
    /// it says nothing about real topology.
    pub fn synthetic_grid(
        start: Coordinate,
        destination: Coordinate,
        cells: usize,
        tolerance_deg: f64,
    ) -> Self {
        let cells = cells.max(1);
        let mut graph = Self::new(tolerance_deg);

        let min_span = tolerance_deg * cells as f64 * 2.0;
        let (min_lat, max_lat) = padded_range(start.latitude, destination.latitude, min_span, 90.0);
        let (min_lon, max_lon) =
            padded_range(start.longitude, destination.longitude, min_span, 180.0);
        let lat_step = (max_lat - min_lat) / cells as f64;
        let lon_step = (max_lon - min_lon) / cells as f64;

        let lat_at = |i: usize| min_lat + lat_step * i as f64;
        let lon_at = |j: usize| min_lon + lon_step * j as f64;

        for i in 0..=cells {
            let row: Vec<Coordinate> = (0..=cells)
                .map(|j| Coordinate {
                    latitude: lat_at(i),
                    longitude: lon_at(j),
                })
                .collect();
            graph.add_path(&row);
        }
        for j in 0..=cells {
            let column: Vec<Coordinate> = (0..=cells)
                .map(|i| Coordinate {
                    latitude: lat_at(i),
                    longitude: lon_at(j),
                })
                .collect();
            graph.add_path(&column);
        }
        graph
    }
}

fn padded_range(a: f64, b: f64, min_span: f64, limit: f64) -> (f64, f64) {
    let (mut lo, mut hi) = (a.min(b), a.max(b));
    if hi - lo < min_span {
        let pad = (min_span - (hi - lo)) / 2.0;
        lo -= pad;
        hi += pad;
    }
    (lo.max(-limit), hi.min(limit))
}
