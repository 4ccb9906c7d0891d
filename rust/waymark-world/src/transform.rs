//! Frame transforms and the transform-lookup capability.
//!
//! The [`TransformTree`] buffers the most recent transform per edge of
//! the kinematic tree (`map -> odom -> base_link`, camera frames, ...).
//! Lookups compose edges through the closest common ancestor and fail
//! with [`WorldError::TransformUnavailable`] when the frames are not
//! connected.

use crate::error::{WorldError, WorldResult};
use crate::path::Path;
use crate::quat::Quat;
use crate::vector::Vector;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

/// A rigid transform: rotation followed by translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vector,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector::xyz(0.0, 0.0, 0.0),
            rotation: Quat::identity(),
        }
    }

    pub fn new(translation: Vector, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Planar transform from a position and heading.
    pub fn from_xy_yaw(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            translation: Vector::xyz(x, y, 0.0),
            rotation: Quat::from_yaw(yaw),
        }
    }

    /// Apply to a point, preserving the input dimensionality.
    pub fn apply(&self, point: &Vector) -> Vector {
        let rotated = self.rotation.rotate(point);
        let moved = &rotated + &self.translation;
        if point.dim() <= 2 {
            moved.to_2d()
        } else {
            moved
        }
    }

    /// `self.compose(other)` applies `other` first, then `self`.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            translation: &self.rotation.rotate(&other.translation) + &self.translation,
            rotation: self.rotation.mul(&other.rotation),
        }
    }

    pub fn inverse(&self) -> Transform {
        let inv_rot = self.rotation.conjugate();
        Transform {
            translation: -inv_rot.rotate(&self.translation),
            rotation: inv_rot,
        }
    }
}

/// Capability for resolving geometry between coordinate frames.
pub trait TransformSource: Send + Sync {
    /// Transform mapping `source`-frame coordinates into `target`-frame
    /// coordinates.
    fn lookup(&self, source: &str, target: &str) -> WorldResult<Transform>;

    fn transform_point(&self, point: &Vector, source: &str, target: &str) -> WorldResult<Vector> {
        Ok(self.lookup(source, target)?.apply(point))
    }

    /// Compose an Euler rotation with the frame rotation.
    fn transform_rot(&self, rpy: &Vector, source: &str, target: &str) -> WorldResult<Vector> {
        let transform = self.lookup(source, target)?;
        let rotated = transform
            .rotation
            .mul(&Quat::from_euler(rpy.x(), rpy.y(), rpy.z()));
        let (roll, pitch, yaw) = rotated.to_euler();
        Ok(Vector::xyz(roll, pitch, yaw))
    }

    /// Transform a path element-wise, dropping points whose lookup fails.
    fn transform_path(&self, path: &Path, source: &str, target: &str) -> Path {
        let mut out = Path::new();
        let mut dropped = 0usize;
        for point in path.iter() {
            match self.transform_point(point, source, target) {
                Ok(p) => {
                    if out.push(p).is_err() {
                        dropped += 1;
                    }
                }
                Err(_) => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(source, target, dropped, "dropped path points during transform");
        }
        out
    }

    /// Pose of the `source` frame expressed in `target`: `(position, rpy)`.
    fn transform_euler(&self, source: &str, target: &str) -> WorldResult<(Vector, Vector)> {
        let transform = self.lookup(source, target)?;
        let (roll, pitch, yaw) = transform.rotation.to_euler();
        let t = &transform.translation;
        Ok((
            Vector::xyz(t.x(), t.y(), t.z()),
            Vector::xyz(roll, pitch, yaw),
        ))
    }
}

/// Buffered tree of stamped transforms keyed by child frame.
#[derive(Default)]
pub struct TransformTree {
    // child -> (parent, transform mapping child coords into parent coords)
    edges: RwLock<HashMap<String, (String, Transform)>>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the `parent -> child` edge. `transform` maps
    /// child-frame coordinates into the parent frame.
    pub fn set_transform(&self, parent: &str, child: &str, transform: Transform) {
        self.edges
            .write()
            .insert(child.to_string(), (parent.to_string(), transform));
    }

    /// Ancestor chain of `frame` as `(ancestor, frame -> ancestor)`.
    fn ancestors(&self, frame: &str) -> Vec<(String, Transform)> {
        let edges = self.edges.read();
        let mut chain = vec![(frame.to_string(), Transform::identity())];
        let mut current = frame.to_string();
        let mut acc = Transform::identity();
        // Bounded walk guards against a malformed cyclic buffer.
        for _ in 0..edges.len() + 1 {
            match edges.get(&current) {
                Some((parent, up)) => {
                    acc = up.compose(&acc);
                    chain.push((parent.clone(), acc.clone()));
                    current = parent.clone();
                }
                None => break,
            }
        }
        chain
    }
}

impl TransformSource for TransformTree {
    fn lookup(&self, source: &str, target: &str) -> WorldResult<Transform> {
        let source_chain = self.ancestors(source);
        let target_chain = self.ancestors(target);

        for (ancestor, target_to_ancestor) in &target_chain {
            if let Some((_, source_to_ancestor)) =
                source_chain.iter().find(|(frame, _)| frame == ancestor)
            {
                return Ok(target_to_ancestor.inverse().compose(source_to_ancestor));
            }
        }

        Err(WorldError::TransformUnavailable {
            from: source.to_string(),
            to: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn tree() -> TransformTree {
        let tree = TransformTree::new();
        tree.set_transform("map", "odom", Transform::from_xy_yaw(10.0, 0.0, 0.0));
        tree.set_transform("odom", "base_link", Transform::from_xy_yaw(2.0, 1.0, FRAC_PI_2));
        tree
    }

    #[test]
    fn lookup_composes_up_the_chain() {
        let tree = tree();
        let t = tree.lookup("base_link", "map").unwrap();
        // base_link origin sits at odom (2,1), odom at map (10,0).
        let p = t.apply(&Vector::xy(0.0, 0.0));
        assert!((p.x() - 12.0).abs() < 1e-9);
        assert!((p.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_transform_applies_rotation() {
        let tree = tree();
        // One meter ahead of the robot points along +y in odom.
        let p = tree
            .transform_point(&Vector::xy(1.0, 0.0), "base_link", "odom")
            .unwrap();
        assert!((p.x() - 2.0).abs() < 1e-9);
        assert!((p.y() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_lookup_roundtrips() {
        let tree = tree();
        let forward = tree.lookup("base_link", "map").unwrap();
        let backward = tree.lookup("map", "base_link").unwrap();
        let round = backward.compose(&forward);
        assert!(round.translation.length() < 1e-9);
    }

    #[test]
    fn unknown_frame_fails() {
        let tree = tree();
        assert!(matches!(
            tree.lookup("base_link", "gripper"),
            Err(WorldError::TransformUnavailable { .. })
        ));
    }

    #[test]
    fn transform_euler_reports_pose() {
        let tree = tree();
        let (pos, rot) = tree.transform_euler("base_link", "odom").unwrap();
        assert!((pos.x() - 2.0).abs() < 1e-9);
        assert!((pos.y() - 1.0).abs() < 1e-9);
        assert!((rot.z() - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn transform_path_drops_unreachable_points() {
        let tree = tree();
        let path =
            Path::from_points(vec![Vector::xy(0.0, 0.0), Vector::xy(1.0, 0.0)]).unwrap();
        let out = tree.transform_path(&path, "base_link", "odom");
        assert_eq!(out.len(), 2);

        let disconnected = tree.transform_path(&path, "base_link", "gripper");
        assert!(disconnected.is_empty());
    }

    #[test]
    fn transform_rot_composes_yaw() {
        let tree = tree();
        let rot = tree
            .transform_rot(&Vector::xyz(0.0, 0.0, FRAC_PI_2), "base_link", "odom")
            .unwrap();
        assert!((rot.z() - std::f64::consts::PI).abs() < 1e-9);
    }
}
