//! Global planner: A* over an 8-connected occupancy grid.
//!
//! Endpoints that land out of bounds or inside an obstacle are repaired
//! by a breadth-first walk to the nearest free cell. Movement cost is
//! penalized by cell value so paths prefer staying clear of obstacles
//! even through technically-free space.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use tracing::debug;
use waymark_world::{Costmap, Path, Vector};

/// 8-connected neighborhood.
const DIRECTIONS: [(i64, i64); 8] = [
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

const STRAIGHT_COST: f64 = 1.0;
const DIAGONAL_COST: f64 = 1.42;

/// A* tuning knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AstarConfig {
    /// Cell value at or above which a cell is an obstacle.
    pub cost_threshold: i8,
    pub allow_diagonal: bool,
    /// Endpoint-repair search radius in cells.
    pub max_search_radius: i64,
}

impl Default for AstarConfig {
    fn default() -> Self {
        Self {
            cost_threshold: 90,
            allow_diagonal: true,
            max_search_radius: 20,
        }
    }
}

/// Find the nearest cell below `cost_threshold` by BFS from `position`.
///
/// Falls back to the original cell when nothing free exists within
/// `max_search_radius`.
pub fn find_nearest_free_cell(
    costmap: &Costmap,
    position: &Vector,
    cost_threshold: i8,
    max_search_radius: i64,
) -> (i64, i64) {
    let (start_x, start_y) = costmap.world_to_cell(position);

    if let Some(value) = costmap.value_at_cell(start_x, start_y) {
        if value >= 0 && value < cost_threshold {
            return (start_x, start_y);
        }
    }

    let mut queue = VecDeque::from([(start_x, start_y, 0i64)]);
    let mut visited = HashSet::from([(start_x, start_y)]);

    while let Some((x, y, dist)) = queue.pop_front() {
        if dist > max_search_radius {
            debug!(
                radius = max_search_radius,
                "no free cell within search radius, keeping original"
            );
            return (start_x, start_y);
        }

        if let Some(value) = costmap.value_at_cell(x, y) {
            if value >= 0 && value < cost_threshold {
                debug!(from = ?(start_x, start_y), to = ?(x, y), dist, "repaired endpoint");
                return (x, y);
            }
        }

        for (dx, dy) in DIRECTIONS {
            let next = (x + dx, y + dy);
            if visited.insert(next) {
                queue.push_back((next.0, next.1, dist + 1));
            }
        }
    }

    (start_x, start_y)
}

#[derive(Debug)]
struct Node {
    f: f64,
    order: u64,
    cell: (i64, i64),
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    // Reversed so the max-heap pops the lowest f-score; ties go to the
    // earliest-inserted node.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.order.cmp(&self.order))
    }
}

fn heuristic(a: (i64, i64), b: (i64, i64)) -> f64 {
    let dx = (b.0 - a.0) as f64;
    let dy = (b.1 - a.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Plan a world-coordinate path from `start` to `goal`.
///
/// Returns `None` when the open set exhausts without reaching the goal.
pub fn astar(
    costmap: &Costmap,
    start: &Vector,
    goal: &Vector,
    config: &AstarConfig,
) -> Option<Path> {
    let original_start = costmap.world_to_cell(start);
    let original_goal = costmap.world_to_cell(goal);
    let goal_in_bounds = costmap.in_bounds(original_goal.0, original_goal.1);

    let endpoint_blocked = |cell: (i64, i64)| match costmap.value_at_cell(cell.0, cell.1) {
        Some(value) => value < 0 || value >= config.cost_threshold,
        None => true,
    };

    let adjusted_start = if endpoint_blocked(original_start) {
        debug!("start is out of bounds or blocked, repairing");
        find_nearest_free_cell(costmap, start, config.cost_threshold, config.max_search_radius)
    } else {
        original_start
    };
    let adjusted_goal = if endpoint_blocked(original_goal) {
        debug!("goal is out of bounds or blocked, repairing");
        find_nearest_free_cell(costmap, goal, config.cost_threshold, config.max_search_radius)
    } else {
        original_goal
    };

    if adjusted_start == adjusted_goal {
        let mut single = Path::new();
        single
            .push(costmap.grid_to_world(adjusted_goal.0, adjusted_goal.1))
            .ok()?;
        return Some(single);
    }

    let step_costs: &[f64] = if config.allow_diagonal {
        &[
            STRAIGHT_COST,
            STRAIGHT_COST,
            STRAIGHT_COST,
            STRAIGHT_COST,
            DIAGONAL_COST,
            DIAGONAL_COST,
            DIAGONAL_COST,
            DIAGONAL_COST,
        ]
    } else {
        &[STRAIGHT_COST, STRAIGHT_COST, STRAIGHT_COST, STRAIGHT_COST]
    };

    let mut open = BinaryHeap::new();
    let mut closed: HashSet<(i64, i64)> = HashSet::new();
    let mut g_score: HashMap<(i64, i64), f64> = HashMap::from([(adjusted_start, 0.0)]);
    let mut parents: HashMap<(i64, i64), (i64, i64)> = HashMap::new();
    let mut order = 0u64;

    open.push(Node {
        f: heuristic(adjusted_start, adjusted_goal),
        order,
        cell: adjusted_start,
    });

    while let Some(Node { cell: current, .. }) = open.pop() {
        if current == adjusted_goal {
            return Some(reconstruct(
                costmap,
                &parents,
                adjusted_start,
                adjusted_goal,
                goal_in_bounds,
                goal,
            ));
        }

        if !closed.insert(current) {
            continue;
        }

        for (&step_cost, &(dx, dy)) in step_costs.iter().zip(DIRECTIONS.iter()) {
            let neighbor = (current.0 + dx, current.1 + dy);
            if closed.contains(&neighbor) {
                continue;
            }
            let Some(value) = costmap.value_at_cell(neighbor.0, neighbor.1) else {
                continue;
            };
            if value < 0 || value >= config.cost_threshold {
                continue;
            }

            // Prefer cells away from obstacles even when strictly free.
            let proximity_penalty = value as f64 / 25.0;
            let step = step_cost * (1.0 + proximity_penalty);
            let tentative = g_score.get(&current).copied().unwrap_or(f64::INFINITY) + step;

            if tentative < g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                parents.insert(neighbor, current);
                g_score.insert(neighbor, tentative);
                order += 1;
                open.push(Node {
                    f: tentative + heuristic(neighbor, adjusted_goal),
                    order,
                    cell: neighbor,
                });
            }
        }
    }

    None
}

fn reconstruct(
    costmap: &Costmap,
    parents: &HashMap<(i64, i64), (i64, i64)>,
    adjusted_start: (i64, i64),
    adjusted_goal: (i64, i64),
    goal_in_bounds: bool,
    goal: &Vector,
) -> Path {
    let mut cells = Vec::new();
    let mut current = adjusted_goal;
    cells.push(current);
    while let Some(&parent) = parents.get(&current) {
        cells.push(parent);
        current = parent;
        if current == adjusted_start {
            break;
        }
    }
    cells.reverse();

    let mut waypoints: Vec<Vector> = cells
        .iter()
        .map(|&(x, y)| costmap.grid_to_world(x, y))
        .collect();

    let repaired_goal_point = costmap.grid_to_world(adjusted_goal.0, adjusted_goal.1);
    if waypoints
        .last()
        .map(|last| last.distance(&repaired_goal_point) > 1e-5)
        .unwrap_or(true)
    {
        waypoints.push(repaired_goal_point);
    }

    // The path ends at the caller's goal whenever it is on the map,
    // repaired or not.
    if goal_in_bounds {
        let goal_2d = goal.to_2d();
        if waypoints
            .last()
            .map(|last| last.distance(&goal_2d) > 1e-5)
            .unwrap_or(true)
        {
            waypoints.push(goal_2d);
        }
    }

    Path::from_points(waypoints).unwrap_or_default()
}
