//! # Cull Pass
//!
//! Per-frame join of every registered render node with the set of drawables
//! the visibility oracle reports for the current viewpoint.
//!
//! The culled subset is cleared and rebuilt on every run. Nothing carries
//! over between frames, so stale nodes of unregistered drawables can never
//! survive in it.

use super::ids::DrawableId;
use super::node_bucket::RenderNodeBucket;
use crate::foundation::math::{Mat4, Vec3};
use log::trace;
use std::collections::HashSet;

/// Nodes that survived culling, grouped exactly like the full bucket
pub type CulledSubset = RenderNodeBucket;

/// What the frame renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    /// Regular camera view
    #[default]
    MainView,
    /// Depth-only view from a light
    ShadowMap,
    /// Cube-face captures for reflections
    EnvironmentMap,
}

/// Camera state the oracle tests against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    /// Projection times view
    pub view_projection: Mat4,
    /// Eye position in world space
    pub position: Vec3,
}

impl Viewpoint {
    /// Create a viewpoint
    pub fn new(view_projection: Mat4, position: Vec3) -> Self {
        Self {
            view_projection,
            position,
        }
    }
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self::new(Mat4::identity(), Vec3::zeros())
    }
}

/// External visibility test
pub trait VisibilityOracle {
    /// Drawables visible from `viewpoint` when rendering in `mode`
    fn query_visible(&self, viewpoint: &Viewpoint, mode: RenderMode) -> HashSet<DrawableId>;
}

/// A fixed set is an oracle that ignores the viewpoint
impl VisibilityOracle for HashSet<DrawableId> {
    fn query_visible(&self, _viewpoint: &Viewpoint, _mode: RenderMode) -> HashSet<DrawableId> {
        self.clone()
    }
}

/// Counters from the last run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Nodes in the full bucket
    pub total_nodes: usize,
    /// Nodes copied into the culled subset
    pub visible_nodes: usize,
    /// Size of the oracle's visible set
    pub visible_drawables: usize,
}

/// Produces the culled subset each frame
#[derive(Debug, Default)]
pub struct CullPass {
    culled: CulledSubset,
    stats: CullStats,
}

impl CullPass {
    /// Create a cull pass with an empty subset
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the culled subset from `full`
    ///
    /// Only nodes whose drawable the oracle reports visible are copied.
    /// Leaves keep their kind, culling, pipeline, pass and geometry keys, and
    /// a leaf with no visible node is not created.
    pub fn run(
        &mut self,
        full: &RenderNodeBucket,
        oracle: &dyn VisibilityOracle,
        viewpoint: &Viewpoint,
        mode: RenderMode,
    ) -> &CulledSubset {
        let visible = oracle.query_visible(viewpoint, mode);
        self.culled.clear();

        let mut stats = CullStats {
            visible_drawables: visible.len(),
            ..CullStats::default()
        };

        for leaf in full.leaves() {
            stats.total_nodes += leaf.nodes.len();
            if visible.is_empty() {
                continue;
            }

            let mut survivors = leaf
                .nodes
                .iter()
                .filter(|node| visible.contains(&node.drawable))
                .peekable();
            if survivors.peek().is_none() {
                continue;
            }

            let target = self
                .culled
                .leaf_entry(leaf.kind, leaf.culling, leaf.pipeline, leaf.pass, leaf.geometry);
            let before = target.len();
            target.extend(survivors);
            stats.visible_nodes += target.len() - before;
        }

        trace!(
            "Cull pass ({:?}): {}/{} nodes visible from {} drawables",
            mode,
            stats.visible_nodes,
            stats.total_nodes,
            stats.visible_drawables
        );

        self.stats = stats;
        &self.culled
    }

    /// Subset produced by the last run
    pub fn culled(&self) -> &CulledSubset {
        &self.culled
    }

    /// Counters from the last run
    pub fn stats(&self) -> CullStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ids::{GeometryId, PassId, PipelineId, TransformId};
    use crate::scene::render_node::{DrawableKind, FaceCulling, RenderNode};
    use slotmap::KeyData;

    fn drawable(n: u64) -> DrawableId {
        DrawableId::from(KeyData::from_ffi(n))
    }

    fn node(drawable_id: u64, pipeline: u32, geometry: u64) -> RenderNode {
        RenderNode {
            drawable: drawable(drawable_id),
            geometry: GeometryId::from(KeyData::from_ffi(geometry)),
            pass: PassId(0),
            pipeline: PipelineId(pipeline),
            transform: TransformId(drawable_id as u32),
        }
    }

    fn full_bucket() -> RenderNodeBucket {
        let mut bucket = RenderNodeBucket::new();
        bucket.insert(DrawableKind::Static, FaceCulling::Back, node(1, 1, 1));
        bucket.insert(DrawableKind::Static, FaceCulling::Front, node(1, 1, 1));
        bucket.insert(DrawableKind::InstancedStatic, FaceCulling::Back, node(2, 1, 2));
        bucket.insert(DrawableKind::InstancedStatic, FaceCulling::Back, node(3, 1, 2));
        bucket.insert(DrawableKind::Skinned, FaceCulling::Back, node(4, 2, 3));
        bucket
    }

    #[test]
    fn test_empty_oracle_culls_everything() {
        let full = full_bucket();
        let mut pass = CullPass::new();

        let culled = pass.run(&full, &HashSet::new(), &Viewpoint::default(), RenderMode::MainView);

        assert!(culled.is_empty());
        assert_eq!(culled.leaf_count(), 0);
        assert_eq!(pass.stats().total_nodes, 5);
        assert_eq!(pass.stats().visible_nodes, 0);
    }

    #[test]
    fn test_full_oracle_reproduces_bucket() {
        let full = full_bucket();
        let everything: HashSet<_> = (1..=4).map(drawable).collect();
        let mut pass = CullPass::new();

        let culled = pass.run(&full, &everything, &Viewpoint::default(), RenderMode::MainView);

        assert_eq!(culled, &full);
        assert_eq!(pass.stats().visible_nodes, 5);
    }

    #[test]
    fn test_partial_visibility_keeps_grouping() {
        let full = full_bucket();
        let visible: HashSet<_> = [drawable(3), drawable(4)].into_iter().collect();
        let mut pass = CullPass::new();

        let culled = pass.run(&full, &visible, &Viewpoint::default(), RenderMode::ShadowMap);

        assert_eq!(culled.node_count(), 2);
        let instanced = culled
            .leaf(
                DrawableKind::InstancedStatic,
                FaceCulling::Back,
                PipelineId(1),
                PassId(0),
                GeometryId::from(KeyData::from_ffi(2)),
            )
            .unwrap();
        assert_eq!(instanced.len(), 1);
        assert_eq!(instanced[0].drawable, drawable(3));
        assert!(culled.nodes(DrawableKind::Static, FaceCulling::Back).is_empty());
    }

    #[test]
    fn test_each_run_starts_from_scratch() {
        let full = full_bucket();
        let mut pass = CullPass::new();

        let first: HashSet<_> = [drawable(1)].into_iter().collect();
        pass.run(&full, &first, &Viewpoint::default(), RenderMode::MainView);
        assert_eq!(pass.culled().node_count(), 2);

        let second: HashSet<_> = [drawable(4)].into_iter().collect();
        let culled = pass.run(&full, &second, &Viewpoint::default(), RenderMode::MainView);
        assert_eq!(culled.node_count(), 1);
        assert!(culled.nodes(DrawableKind::Static, FaceCulling::Front).is_empty());
    }
}
