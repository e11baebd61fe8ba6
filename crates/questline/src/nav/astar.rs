use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::grid::{snap_to_walkable, GridPoint, WalkabilityOracle};
use super::route::{Route, RouteKind};

const DIAGONAL_COST: f64 = std::f64::consts::SQRT_2;

/// Lateral moves: four cardinal first, then four diagonal.
const DIRECTIONS: [(i32, i32, f64); 8] = [
    (1, 0, 1.0),
    (-1, 0, 1.0),
    (0, 1, 1.0),
    (0, -1, 1.0),
    (1, 1, DIAGONAL_COST),
    (1, -1, DIAGONAL_COST),
    (-1, 1, DIAGONAL_COST),
    (-1, -1, DIAGONAL_COST),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    pub max_iterations: u32,
    /// Below this XZ distance no route is produced.
    pub min_distance: f64,
    /// XZ distance at which the goal counts as reached.
    pub goal_tolerance: f64,
    pub vertical_probe_span: i32,
    pub max_step_up: i32,
    pub max_drop: i32,
    pub height_penalty: f64,
    pub vertical_heuristic_weight: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            min_distance: 3.0,
            goal_tolerance: 2.0,
            vertical_probe_span: 8,
            max_step_up: 1,
            max_drop: 3,
            height_penalty: 0.5,
            vertical_heuristic_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    point: GridPoint,
    g_cost: f64,
    h_cost: f64,
    parent: Option<u64>,
}

impl SearchNode {
    fn f_cost(&self) -> f64 {
        self.g_cost + self.h_cost
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    key: u64,
    f_cost: f64,
    g_cost: f64,
    insertion_order: u64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    // Reversed so BinaryHeap pops the lowest f_cost, oldest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.insertion_order.cmp(&self.insertion_order))
    }
}

/// A* over the implicit block grid exposed by a [`WalkabilityOracle`].
pub struct GridPathfinder<'a, O: ?Sized> {
    oracle: &'a O,
    config: &'a PathfinderConfig,
}

impl<'a, O: WalkabilityOracle + ?Sized> GridPathfinder<'a, O> {
    pub fn new(oracle: &'a O, config: &'a PathfinderConfig) -> Self {
        Self { oracle, config }
    }

    /// Computes a start-to-goal route. Never fails: an unreachable goal yields
    /// an empty or partial route. `max_len` of 0 disables truncation.
    pub fn find_path(&self, start: GridPoint, goal: GridPoint, max_len: usize) -> Route {
        let span = self.config.vertical_probe_span;
        let Some(start) = snap_to_walkable(&self.oracle, start, span) else {
            debug!(?start, "pathfind_start_not_walkable");
            return Route::empty();
        };
        let goal = snap_to_walkable(&self.oracle, goal, span).unwrap_or(goal);

        if start.xz_distance(goal) < self.config.min_distance {
            return Route::empty();
        }

        let start_key = start.pack_key();
        let start_h = self.heuristic(start, goal);
        let mut nodes = HashMap::<u64, SearchNode>::new();
        let mut closed = HashSet::<u64>::new();
        let mut open = BinaryHeap::new();
        let mut next_insertion = 0u64;

        nodes.insert(
            start_key,
            SearchNode {
                point: start,
                g_cost: 0.0,
                h_cost: start_h,
                parent: None,
            },
        );
        open.push(OpenEntry {
            key: start_key,
            f_cost: start_h,
            g_cost: 0.0,
            insertion_order: next_insertion,
        });
        next_insertion += 1;

        let mut best_key = start_key;
        let mut best_h = start_h;
        let mut iterations = 0u32;

        while let Some(entry) = open.pop() {
            if closed.contains(&entry.key) {
                continue;
            }
            let Some(current) = nodes.get(&entry.key).copied() else {
                continue;
            };
            if entry.g_cost > current.g_cost {
                continue;
            }
            if iterations >= self.config.max_iterations {
                break;
            }
            iterations += 1;
            closed.insert(entry.key);

            if current.point.xz_distance(goal) <= self.config.goal_tolerance {
                debug!(iterations, "pathfind_goal_reached");
                let points = reconstruct(&nodes, entry.key);
                return Route::from_points(truncate(points, max_len), RouteKind::Complete);
            }

            if current.h_cost < best_h {
                best_h = current.h_cost;
                best_key = entry.key;
            }

            for (dx, dz, lateral_cost) in DIRECTIONS {
                let Some(next) = self.step_target(current.point, dx, dz) else {
                    continue;
                };
                let next_key = next.pack_key();
                if closed.contains(&next_key) {
                    continue;
                }

                let climb = f64::from((next.y - current.point.y).abs());
                let tentative_g =
                    current.g_cost + lateral_cost + self.config.height_penalty * climb;
                let candidate = SearchNode {
                    point: next,
                    g_cost: tentative_g,
                    h_cost: self.heuristic(next, goal),
                    parent: Some(entry.key),
                };
                match nodes.entry(next_key) {
                    Entry::Occupied(mut occupied) => {
                        if tentative_g >= occupied.get().g_cost {
                            continue;
                        }
                        occupied.insert(candidate);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(candidate);
                    }
                }
                open.push(OpenEntry {
                    key: next_key,
                    f_cost: candidate.f_cost(),
                    g_cost: tentative_g,
                    insertion_order: next_insertion,
                });
                next_insertion += 1;
            }
        }

        if best_key == start_key {
            debug!(iterations, "pathfind_no_progress");
            return Route::empty();
        }
        debug!(iterations, best_h, "pathfind_partial");
        let points = reconstruct(&nodes, best_key);
        Route::from_points(truncate(points, max_len), RouteKind::Partial)
    }

    /// Standing point one lateral step away, re-probed around the current
    /// height: same level, then stepping up, then dropping down.
    fn step_target(&self, from: GridPoint, dx: i32, dz: i32) -> Option<GridPoint> {
        let level = from.offset(dx, 0, dz);
        if self.oracle.is_walkable(level) {
            return Some(level);
        }
        for up in 1..=self.config.max_step_up {
            let candidate = level.offset(0, up, 0);
            if self.oracle.is_walkable(candidate) {
                return Some(candidate);
            }
        }
        for down in 1..=self.config.max_drop {
            let candidate = level.offset(0, -down, 0);
            if self.oracle.is_walkable(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn heuristic(&self, from: GridPoint, goal: GridPoint) -> f64 {
        let dx = f64::from(goal.x - from.x);
        let dz = f64::from(goal.z - from.z);
        let dy = f64::from(goal.y - from.y) * self.config.vertical_heuristic_weight;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

fn reconstruct(nodes: &HashMap<u64, SearchNode>, end_key: u64) -> Vec<GridPoint> {
    let mut points = Vec::new();
    let mut cursor = Some(end_key);
    while let Some(key) = cursor {
        let Some(node) = nodes.get(&key) else {
            break;
        };
        points.push(node.point);
        cursor = node.parent;
    }
    points.reverse();
    points
}

fn truncate(mut points: Vec<GridPoint>, max_len: usize) -> Vec<GridPoint> {
    if max_len > 0 && points.len() > max_len {
        points.truncate(max_len);
    }
    points
}
