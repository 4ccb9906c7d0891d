//! Occupancy costmap: a 2-D grid of signed 8-bit cells.
//!
//! Cell values are `-1` for unknown and `0..=100` for cost. The map
//! carries its resolution in meters per cell, the world position of cell
//! `(0, 0)` and the grid orientation. `grid_to_world` returns cell
//! centers, so converting a cell to the world and back lands on the same
//! cell.

use crate::error::{WorldError, WorldResult};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Cell value marking unknown space.
pub const UNKNOWN: i8 = -1;

/// Maximum cost value of a fully occupied cell.
pub const MAX_COST: i8 = 100;

/// Parameters for [`Costmap::smudge`] obstacle expansion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SmudgeParams {
    /// Diameter of the circular dilation kernel in cells (made odd).
    pub kernel_size: usize,
    /// Number of dilation rings to grow.
    pub iterations: usize,
    /// Multiplicative cost decay per ring.
    pub decay: f64,
    /// Minimum cell value treated as an obstacle seed.
    pub threshold: i8,
    /// Restore unknown cells after expansion.
    pub preserve_unknown: bool,
}

impl Default for SmudgeParams {
    fn default() -> Self {
        Self {
            kernel_size: 6,
            iterations: 20,
            decay: 0.9,
            threshold: 90,
            preserve_unknown: false,
        }
    }
}

/// A 2-D occupancy grid with world/grid conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Costmap {
    grid: Vec<i8>,
    width: usize,
    height: usize,
    resolution: f64,
    origin: Vector,
    origin_theta: f64,
}

impl Costmap {
    /// Build a costmap from a row-major grid buffer and its metadata.
    pub fn from_parts(
        grid: Vec<i8>,
        width: usize,
        height: usize,
        resolution: f64,
        origin: Vector,
        origin_theta: f64,
    ) -> WorldResult<Self> {
        if grid.len() != width * height {
            return Err(WorldError::GridShape {
                width,
                height,
                expected: width * height,
                got: grid.len(),
            });
        }
        Ok(Self {
            grid,
            width,
            height,
            resolution,
            origin: origin.to_2d(),
            origin_theta,
        })
    }

    /// An all-free costmap with origin at the world origin.
    pub fn create_empty(width: usize, height: usize, resolution: f64) -> Self {
        Self {
            grid: vec![0; width * height],
            width,
            height,
            resolution,
            origin: Vector::xy(0.0, 0.0),
            origin_theta: 0.0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn origin(&self) -> &Vector {
        &self.origin
    }

    pub fn origin_theta(&self) -> f64 {
        self.origin_theta
    }

    pub fn grid(&self) -> &[i8] {
        &self.grid
    }

    /// World coordinates to fractional grid coordinates.
    pub fn world_to_grid(&self, point: &Vector) -> Vector {
        (&point.to_2d() - &self.origin) / self.resolution
    }

    /// World coordinates to the containing cell, floor semantics. The
    /// cell may lie outside the grid.
    pub fn world_to_cell(&self, point: &Vector) -> (i64, i64) {
        let g = self.world_to_grid(point);
        (g.x().floor() as i64, g.y().floor() as i64)
    }

    /// Center of a grid cell in world coordinates.
    pub fn grid_to_world(&self, cell_x: i64, cell_y: i64) -> Vector {
        Vector::xy(
            (cell_x as f64 + 0.5) * self.resolution + self.origin.x(),
            (cell_y as f64 + 0.5) * self.resolution + self.origin.y(),
        )
    }

    pub fn in_bounds(&self, cell_x: i64, cell_y: i64) -> bool {
        cell_x >= 0 && cell_y >= 0 && (cell_x as usize) < self.width && (cell_y as usize) < self.height
    }

    /// Cell value, `None` out of bounds.
    pub fn value_at_cell(&self, cell_x: i64, cell_y: i64) -> Option<i8> {
        if self.in_bounds(cell_x, cell_y) {
            Some(self.grid[cell_y as usize * self.width + cell_x as usize])
        } else {
            None
        }
    }

    /// Value of the cell containing a world point, `None` out of bounds.
    pub fn get_value(&self, point: &Vector) -> Option<i8> {
        let (x, y) = self.world_to_cell(point);
        self.value_at_cell(x, y)
    }

    /// Set the cell containing a world point. Returns false out of bounds.
    pub fn set_value(&mut self, point: &Vector, value: i8) -> bool {
        let (x, y) = self.world_to_cell(point);
        if self.in_bounds(x, y) {
            self.grid[y as usize * self.width + x as usize] = value;
            true
        } else {
            false
        }
    }

    pub fn set_cell(&mut self, cell_x: i64, cell_y: i64, value: i8) -> bool {
        if self.in_bounds(cell_x, cell_y) {
            self.grid[cell_y as usize * self.width + cell_x as usize] = value;
            true
        } else {
            false
        }
    }

    /// Occupancy test for a world point.
    ///
    /// Out-of-bounds and unknown cells count as occupied.
    pub fn is_occupied(&self, point: &Vector, threshold: i8) -> bool {
        match self.get_value(point) {
            Some(UNKNOWN) => true,
            Some(value) => value >= threshold,
            None => true,
        }
    }

    /// Iterate cells with a value above zero as `(x, y, value)`.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (usize, usize, i8)> + '_ {
        self.grid.iter().enumerate().filter_map(move |(i, &v)| {
            if v > 0 {
                Some((i % self.width, i / self.width, v))
            } else {
                None
            }
        })
    }

    /// Expand obstacles with decaying cost rings.
    ///
    /// Iteratively dilates the obstacle mask with a circular kernel; ring
    /// `i` is stamped at `100 * decay^i`, the final value per cell is the
    /// max across rings, and original obstacle values are preserved.
    pub fn smudge(&self, params: &SmudgeParams) -> Costmap {
        let kernel_size = if params.kernel_size % 2 == 0 {
            params.kernel_size + 1
        } else {
            params.kernel_size
        };
        let radius = (kernel_size / 2) as i64;
        let radius_sq = radius * radius;

        let mut kernel = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius_sq {
                    kernel.push((dx, dy));
                }
            }
        }

        let mut work: Vec<i8> = self.grid.clone();
        let unknown_mask: Vec<bool> = self.grid.iter().map(|&v| v == UNKNOWN).collect();
        if params.preserve_unknown {
            for (cell, unknown) in work.iter_mut().zip(unknown_mask.iter()) {
                if *unknown {
                    *cell = 0;
                }
            }
        }

        let obstacle_mask: Vec<bool> = work.iter().map(|&v| v >= params.threshold).collect();

        let mut current = obstacle_mask.clone();
        let mut smudged: Vec<f64> = obstacle_mask
            .iter()
            .map(|&o| if o { 100.0 } else { 0.0 })
            .collect();

        for ring in 0..params.iterations {
            let mut dilated = current.clone();
            for y in 0..self.height as i64 {
                for x in 0..self.width as i64 {
                    let idx = y as usize * self.width + x as usize;
                    if current[idx] {
                        continue;
                    }
                    let touches = kernel.iter().any(|&(dx, dy)| {
                        let (nx, ny) = (x + dx, y + dy);
                        self.in_bounds(nx, ny) && current[ny as usize * self.width + nx as usize]
                    });
                    if touches {
                        dilated[idx] = true;
                    }
                }
            }

            let intensity = 100.0 * params.decay.powi(ring as i32 + 1);
            for idx in 0..smudged.len() {
                if dilated[idx] && !current[idx] {
                    smudged[idx] = smudged[idx].max(intensity);
                }
            }
            current = dilated;
        }

        let grid: Vec<i8> = smudged
            .iter()
            .enumerate()
            .map(|(idx, &v)| {
                if obstacle_mask[idx] {
                    work[idx]
                } else if params.preserve_unknown && unknown_mask[idx] {
                    UNKNOWN
                } else {
                    v.clamp(0.0, 100.0) as i8
                }
            })
            .collect();

        Costmap {
            grid,
            width: self.width,
            height: self.height,
            resolution: self.resolution,
            origin: self.origin.clone(),
            origin_theta: self.origin_theta,
        }
    }
}

impl std::fmt::Display for Costmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = (self.width * self.height) as f64;
        let occupied = self.grid.iter().filter(|&&v| v >= 50).count() as f64;
        let unknown = self.grid.iter().filter(|&&v| v == UNKNOWN).count() as f64;
        write!(
            f,
            "Costmap {}x{} ({:.1}x{:.1}m @ {:.2}m/cell) origin ({:.2}, {:.2}) occupied {:.1}% unknown {:.1}%",
            self.width,
            self.height,
            self.width as f64 * self.resolution,
            self.height as f64 * self.resolution,
            self.resolution,
            self.origin.x(),
            self.origin.y(),
            occupied / total * 100.0,
            unknown / total * 100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_block() -> Costmap {
        let mut map = Costmap::create_empty(10, 10, 0.1);
        for y in 4..7 {
            for x in 4..7 {
                map.set_cell(x, y, 100);
            }
        }
        map
    }

    #[test]
    fn world_grid_roundtrip_all_cells() {
        let map = Costmap::from_parts(
            vec![0; 20 * 15],
            20,
            15,
            0.1,
            Vector::xy(-1.0, 2.5),
            0.0,
        )
        .unwrap();
        for y in 0..15 {
            for x in 0..20 {
                let world = map.grid_to_world(x, y);
                assert_eq!(map.world_to_cell(&world), (x, y));
            }
        }
    }

    #[test]
    fn from_parts_validates_shape() {
        let err = Costmap::from_parts(vec![0; 5], 2, 3, 0.1, Vector::xy(0.0, 0.0), 0.0);
        assert!(matches!(err, Err(WorldError::GridShape { expected: 6, got: 5, .. })));
    }

    #[test]
    fn out_of_bounds_is_occupied() {
        let map = Costmap::create_empty(10, 10, 0.1);
        assert!(map.is_occupied(&Vector::xy(-0.5, 0.5), 50));
        assert!(map.is_occupied(&Vector::xy(5.0, 0.5), 50));
        assert!(!map.is_occupied(&Vector::xy(0.5, 0.5), 50));
    }

    #[test]
    fn unknown_is_occupied() {
        let mut map = Costmap::create_empty(4, 4, 1.0);
        map.set_cell(1, 1, UNKNOWN);
        assert!(map.is_occupied(&map.grid_to_world(1, 1), 50));
    }

    #[test]
    fn get_set_value() {
        let mut map = Costmap::create_empty(10, 10, 0.5);
        let p = Vector::xy(2.25, 3.75);
        assert_eq!(map.get_value(&p), Some(0));
        assert!(map.set_value(&p, 77));
        assert_eq!(map.get_value(&p), Some(77));
        assert_eq!(map.get_value(&Vector::xy(100.0, 0.0)), None);
        assert!(!map.set_value(&Vector::xy(100.0, 0.0), 1));
    }

    #[test]
    fn smudge_zero_iterations_is_identity() {
        let map = map_with_block();
        let smudged = map.smudge(&SmudgeParams {
            iterations: 0,
            ..SmudgeParams::default()
        });
        assert_eq!(smudged, map);
    }

    #[test]
    fn smudge_grows_decaying_rings() {
        let map = map_with_block();
        let smudged = map.smudge(&SmudgeParams {
            kernel_size: 3,
            iterations: 2,
            decay: 0.5,
            threshold: 90,
            preserve_unknown: false,
        });

        // Original obstacle values survive.
        assert_eq!(smudged.value_at_cell(5, 5), Some(100));
        // First ring at 100 * 0.5, second at 100 * 0.25.
        assert_eq!(smudged.value_at_cell(3, 5), Some(50));
        assert_eq!(smudged.value_at_cell(2, 5), Some(25));
        // Outside the rings stays free.
        assert_eq!(smudged.value_at_cell(0, 0), Some(0));
    }

    #[test]
    fn smudge_preserves_unknown_when_asked() {
        let mut map = map_with_block();
        map.set_cell(3, 5, UNKNOWN);
        let smudged = map.smudge(&SmudgeParams {
            kernel_size: 3,
            iterations: 2,
            decay: 0.5,
            threshold: 90,
            preserve_unknown: true,
        });
        assert_eq!(smudged.value_at_cell(3, 5), Some(UNKNOWN));

        let overwritten = map.smudge(&SmudgeParams {
            kernel_size: 3,
            iterations: 2,
            decay: 0.5,
            threshold: 90,
            preserve_unknown: false,
        });
        assert_eq!(overwritten.value_at_cell(3, 5), Some(50));
    }

    #[test]
    fn occupied_cells_iterates_positive_values() {
        let map = map_with_block();
        assert_eq!(map.occupied_cells().count(), 9);
        assert!(map.occupied_cells().all(|(_, _, v)| v == 100));
    }
}
