//! A path is an ordered sequence of waypoints.
//!
//! All points share one dimensionality once the path is non-empty; the
//! mutating operations enforce it.

use crate::error::{WorldError, WorldResult};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// An ordered sequence of [`Vector`] waypoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    points: Vec<Vector>,
}

impl Path {
    /// Create an empty path.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a path from points, validating shared dimensionality.
    pub fn from_points(points: Vec<Vector>) -> WorldResult<Self> {
        if let Some(first) = points.first() {
            let dim = first.dim();
            for p in &points {
                if p.dim() != dim {
                    return Err(WorldError::DimensionMismatch {
                        expected: dim,
                        got: p.dim(),
                    });
                }
            }
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Dimensionality of the waypoints, `None` when empty.
    pub fn dim(&self) -> Option<usize> {
        self.points.first().map(Vector::dim)
    }

    pub fn get(&self, idx: usize) -> Option<&Vector> {
        self.points.get(idx)
    }

    pub fn head(&self) -> Option<&Vector> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Vector> {
        self.points.last()
    }

    /// Everything after the first point, `None` when there is nothing left.
    pub fn tail(&self) -> Option<Path> {
        if self.points.len() <= 1 {
            return None;
        }
        Some(Self {
            points: self.points[1..].to_vec(),
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vector> {
        self.points.iter()
    }

    /// Append a point.
    pub fn push(&mut self, point: Vector) -> WorldResult<()> {
        self.check_dim(&point)?;
        self.points.push(point);
        Ok(())
    }

    /// Insert a point at `index`.
    pub fn insert(&mut self, index: usize, point: Vector) -> WorldResult<()> {
        self.check_dim(&point)?;
        self.points.insert(index.min(self.points.len()), point);
        Ok(())
    }

    /// Remove and return the point at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Vector> {
        if index < self.points.len() {
            Some(self.points.remove(index))
        } else {
            None
        }
    }

    /// Append all points of another path.
    pub fn extend(&mut self, other: &Path) -> WorldResult<()> {
        for p in other.iter() {
            self.push(p.clone())?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Total length: the sum of segment norms.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }

    /// Index of the waypoint closest to `point`, `None` when empty.
    pub fn nearest_point_index(&self, point: &Vector) -> Option<usize> {
        self.points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_squared(point)
                    .partial_cmp(&b.distance_squared(point))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// A new path with the points in reverse order.
    pub fn reverse(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self { points }
    }

    /// Resample at an approximately uniform `spacing`, keeping endpoints.
    pub fn resample(&self, spacing: f64) -> Self {
        if self.points.len() < 2 || spacing <= 0.0 {
            return self.clone();
        }

        let mut resampled = vec![self.points[0].clone()];
        let mut carried = 0.0;

        for window in self.points.windows(2) {
            let mut prev = window[0].clone();
            let segment = &window[1] - &window[0];
            let mut remaining = segment.length();
            if remaining < 1e-10 {
                continue;
            }
            let direction = segment.normalize();

            while carried + remaining >= spacing {
                let step = spacing - carried;
                let next = &prev + &(&direction * step);
                resampled.push(next.clone());
                prev = next;
                remaining -= step;
                carried = 0.0;
            }
            carried += remaining;
        }

        if let Some(last) = self.points.last() {
            if resampled.last() != Some(last) {
                resampled.push(last.clone());
            }
        }

        Self { points: resampled }
    }

    /// Ramer-Douglas-Peucker simplification. Idempotent for a fixed
    /// tolerance.
    pub fn simplify(&self, tolerance: f64) -> Self {
        if self.points.len() <= 2 {
            return self.clone();
        }

        let mut keep = vec![false; self.points.len()];
        keep[0] = true;
        keep[self.points.len() - 1] = true;
        self.rdp(0, self.points.len() - 1, tolerance, &mut keep);

        Self {
            points: self
                .points
                .iter()
                .zip(keep.iter())
                .filter(|(_, k)| **k)
                .map(|(p, _)| p.clone())
                .collect(),
        }
    }

    fn rdp(&self, start: usize, end: usize, tolerance: f64, keep: &mut [bool]) {
        if end <= start + 1 {
            return;
        }

        let line = &self.points[end] - &self.points[start];
        let line_len = line.length();

        let mut max_dist = 0.0;
        let mut max_idx = start;
        for i in (start + 1)..end {
            let dist = if line_len < 1e-10 {
                self.points[i].distance(&self.points[start])
            } else {
                let offset = &self.points[i] - &self.points[start];
                let projected = offset.project(&line);
                (&offset - &projected).length()
            };
            if dist > max_dist {
                max_dist = dist;
                max_idx = i;
            }
        }

        if max_dist > tolerance {
            keep[max_idx] = true;
            self.rdp(start, max_idx, tolerance, keep);
            self.rdp(max_idx, end, tolerance, keep);
        }
    }

    /// Endpoint-preserving weighted moving average.
    ///
    /// `weight` is how much each interior point leans toward the mean of
    /// its neighbors; `iterations` passes are applied.
    pub fn smooth(&self, weight: f64, iterations: usize) -> Self {
        if self.points.len() <= 2 || weight <= 0.0 || iterations == 0 {
            return self.clone();
        }

        let mut points = self.points.clone();
        for _ in 0..iterations {
            let mut next = points.clone();
            for i in 1..points.len() - 1 {
                let neighbors = (&points[i - 1] + &points[i + 1]) * 0.5;
                next[i] = &(&points[i] * (1.0 - weight)) + &(&neighbors * weight);
            }
            points = next;
        }

        Self { points }
    }

    fn check_dim(&self, point: &Vector) -> WorldResult<()> {
        if let Some(dim) = self.dim() {
            if point.dim() != dim {
                return Err(WorldError::DimensionMismatch {
                    expected: dim,
                    got: point.dim(),
                });
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Vector;
    type IntoIter = std::slice::Iter<'a, Vector>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag() -> Path {
        Path::from_points(vec![
            Vector::xy(0.0, 0.0),
            Vector::xy(1.0, 0.02),
            Vector::xy(2.0, -0.01),
            Vector::xy(3.0, 0.0),
            Vector::xy(3.0, 3.0),
        ])
        .unwrap()
    }

    #[test]
    fn length_sums_segments() {
        let p = Path::from_points(vec![
            Vector::xy(0.0, 0.0),
            Vector::xy(3.0, 0.0),
            Vector::xy(3.0, 4.0),
        ])
        .unwrap();
        assert!((p.length() - 7.0).abs() < 1e-12);
        assert_eq!(Path::new().length(), 0.0);
    }

    #[test]
    fn push_enforces_dimensionality() {
        let mut p = Path::new();
        p.push(Vector::xy(0.0, 0.0)).unwrap();
        assert!(p.push(Vector::xyz(1.0, 1.0, 1.0)).is_err());
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn simplify_removes_collinear_noise() {
        let simplified = zigzag().simplify(0.1);
        assert_eq!(simplified.len(), 3);
        assert_eq!(simplified.head(), Some(&Vector::xy(0.0, 0.0)));
        assert_eq!(simplified.last(), Some(&Vector::xy(3.0, 3.0)));
    }

    #[test]
    fn simplify_is_idempotent() {
        let once = zigzag().simplify(0.1);
        let twice = once.simplify(0.1);
        assert_eq!(once, twice);
    }

    #[test]
    fn resample_spacing() {
        let p = Path::from_points(vec![Vector::xy(0.0, 0.0), Vector::xy(4.0, 0.0)]).unwrap();
        let resampled = p.resample(1.0);
        assert_eq!(resampled.len(), 5);
        for (i, point) in resampled.iter().enumerate() {
            assert!((point.x() - i as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn resample_keeps_final_point() {
        let p = Path::from_points(vec![Vector::xy(0.0, 0.0), Vector::xy(2.5, 0.0)]).unwrap();
        let resampled = p.resample(1.0);
        assert_eq!(resampled.last(), Some(&Vector::xy(2.5, 0.0)));
    }

    #[test]
    fn smooth_keeps_endpoints() {
        let smoothed = zigzag().smooth(0.5, 2);
        assert_eq!(smoothed.head(), Some(&Vector::xy(0.0, 0.0)));
        assert_eq!(smoothed.last(), Some(&Vector::xy(3.0, 3.0)));
        assert_eq!(smoothed.len(), zigzag().len());
    }

    #[test]
    fn nearest_point() {
        let p = zigzag();
        assert_eq!(p.nearest_point_index(&Vector::xy(2.9, 2.9)), Some(4));
        assert_eq!(Path::new().nearest_point_index(&Vector::xy(0.0, 0.0)), None);
    }

    #[test]
    fn reverse_and_tail() {
        let p = zigzag();
        let r = p.reverse();
        assert_eq!(r.head(), p.last());
        assert_eq!(p.tail().unwrap().len(), p.len() - 1);
        assert!(Path::new().tail().is_none());
    }
}
