//! Frustum-based visibility oracle
//!
//! Holds one world-space bounding sphere per drawable and reports the ones
//! touching the viewpoint's frustum. Useful when the frontend has no spatial
//! structure of its own.

use super::bounds::{BoundingSphere, Frustum};
use super::cull_pass::{RenderMode, Viewpoint, VisibilityOracle};
use super::ids::DrawableId;
use crate::foundation::math::Mat4;
use std::collections::{HashMap, HashSet};

/// Sphere-vs-frustum visibility oracle
#[derive(Debug, Clone, Default)]
pub struct FrustumCuller {
    bounds: HashMap<DrawableId, BoundingSphere>,
}

impl FrustumCuller {
    /// Create an oracle with no bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a drawable's world-space bound, replacing any previous one
    pub fn set_bounds(&mut self, drawable: DrawableId, bounds: BoundingSphere) {
        self.bounds.insert(drawable, bounds);
    }

    /// Set a drawable's bound from a local-space sphere and its world transform
    pub fn set_local_bounds(&mut self, drawable: DrawableId, local: BoundingSphere, world: &Mat4) {
        self.set_bounds(drawable, local.transformed(world));
    }

    /// Forget a drawable. Returns its last bound.
    pub fn remove(&mut self, drawable: DrawableId) -> Option<BoundingSphere> {
        self.bounds.remove(&drawable)
    }

    /// Number of tracked drawables
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether no drawable is tracked
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

impl VisibilityOracle for FrustumCuller {
    fn query_visible(&self, viewpoint: &Viewpoint, _mode: RenderMode) -> HashSet<DrawableId> {
        let frustum = Frustum::from_matrix(&viewpoint.view_projection);
        self.bounds
            .iter()
            .filter(|(_, sphere)| frustum.intersects_sphere(sphere))
            .map(|(&drawable, _)| drawable)
            .collect()
    }
}
