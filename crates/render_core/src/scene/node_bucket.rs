//! # Render Node Buckets
//!
//! Groups render nodes so that everything drawn with the same pipeline,
//! pass and geometry sits in one leaf:
//!
//! ```text
//! [DrawableKind][FaceCulling] → PipelineId → PassId → GeometryId → Vec<RenderNode>
//! ```
//!
//! Maps are ordered, so traversal order is deterministic across frames.
//! A leaf's length is its instance count.

use super::ids::{DrawableId, GeometryId, PassId, PipelineId};
use super::render_node::{DrawableKind, FaceCulling, RenderNode};
use std::collections::{BTreeMap, BTreeSet};

/// Nodes per geometry under one pass
pub type GeometryNodes = BTreeMap<GeometryId, Vec<RenderNode>>;

/// Geometry buckets per pass under one pipeline
pub type PassNodes = BTreeMap<PassId, GeometryNodes>;

/// Pass buckets per pipeline
pub type PipelineNodes = BTreeMap<PipelineId, PassNodes>;

/// A borrowed leaf together with its full key
#[derive(Debug, Clone, Copy)]
pub struct BucketLeaf<'a> {
    /// Drawable kind
    pub kind: DrawableKind,
    /// Face culling variant
    pub culling: FaceCulling,
    /// Pipeline key
    pub pipeline: PipelineId,
    /// Pass key
    pub pass: PassId,
    /// Geometry key
    pub geometry: GeometryId,
    /// Nodes in the leaf
    pub nodes: &'a [RenderNode],
}

/// Keyed container of render nodes, per kind and face-culling mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderNodeBucket {
    maps: [[PipelineNodes; 2]; 6],
}

impl RenderNodeBucket {
    /// Create an empty bucket set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the leaf keyed by its pipeline, pass and geometry,
    /// creating the leaf on first use. Returns the leaf's instance count.
    pub fn insert(&mut self, kind: DrawableKind, culling: FaceCulling, node: RenderNode) -> usize {
        let leaf = self.leaf_entry(kind, culling, node.pipeline, node.pass, node.geometry);
        leaf.push(node);
        leaf.len()
    }

    /// Leaf for a key, created empty when missing
    pub(crate) fn leaf_entry(
        &mut self,
        kind: DrawableKind,
        culling: FaceCulling,
        pipeline: PipelineId,
        pass: PassId,
        geometry: GeometryId,
    ) -> &mut Vec<RenderNode> {
        self.maps[kind.index()][culling.index()]
            .entry(pipeline)
            .or_default()
            .entry(pass)
            .or_default()
            .entry(geometry)
            .or_default()
    }

    /// Pipeline map of one kind and culling mode
    pub fn nodes(&self, kind: DrawableKind, culling: FaceCulling) -> &PipelineNodes {
        &self.maps[kind.index()][culling.index()]
    }

    /// Geometry buckets under one (pipeline, pass)
    pub fn geometries(
        &self,
        kind: DrawableKind,
        culling: FaceCulling,
        pipeline: PipelineId,
        pass: PassId,
    ) -> Option<&GeometryNodes> {
        self.nodes(kind, culling).get(&pipeline)?.get(&pass)
    }

    /// Nodes of one leaf
    pub fn leaf(
        &self,
        kind: DrawableKind,
        culling: FaceCulling,
        pipeline: PipelineId,
        pass: PassId,
        geometry: GeometryId,
    ) -> Option<&[RenderNode]> {
        self.geometries(kind, culling, pipeline, pass)?
            .get(&geometry)
            .map(Vec::as_slice)
    }

    /// Every leaf in kind, culling, pipeline, pass, geometry order
    pub fn leaves(&self) -> impl Iterator<Item = BucketLeaf<'_>> {
        DrawableKind::ALL.into_iter().flat_map(move |kind| {
            FaceCulling::ALL.into_iter().flat_map(move |culling| {
                self.nodes(kind, culling).iter().flat_map(move |(&pipeline, passes)| {
                    passes.iter().flat_map(move |(&pass, geometries)| {
                        geometries.iter().map(move |(&geometry, nodes)| BucketLeaf {
                            kind,
                            culling,
                            pipeline,
                            pass,
                            geometry,
                            nodes,
                        })
                    })
                })
            })
        })
    }

    /// Pipelines used by any kind or culling mode, in key order
    pub fn pipelines(&self) -> BTreeSet<PipelineId> {
        self.maps
            .iter()
            .flatten()
            .flat_map(|pipelines| pipelines.keys().copied())
            .collect()
    }

    /// Passes used under a pipeline by any kind or culling mode, in key order
    pub fn passes(&self, pipeline: PipelineId) -> BTreeSet<PassId> {
        self.maps
            .iter()
            .flatten()
            .filter_map(|pipelines| pipelines.get(&pipeline))
            .flat_map(|passes| passes.keys().copied())
            .collect()
    }

    /// Remove every node of a drawable, pruning emptied levels.
    /// Returns the number of nodes removed.
    pub fn remove_drawable(&mut self, drawable: DrawableId) -> usize {
        let mut removed = 0;
        for pipelines in self.maps.iter_mut().flatten() {
            pipelines.retain(|_, passes| {
                passes.retain(|_, geometries| {
                    geometries.retain(|_, nodes| {
                        let before = nodes.len();
                        nodes.retain(|node| node.drawable != drawable);
                        removed += before - nodes.len();
                        !nodes.is_empty()
                    });
                    !geometries.is_empty()
                });
                !passes.is_empty()
            });
        }
        removed
    }

    /// Drop every node
    pub fn clear(&mut self) {
        for pipelines in self.maps.iter_mut().flatten() {
            pipelines.clear();
        }
    }

    /// Whether no leaf holds a node
    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        self.leaves().map(|leaf| leaf.nodes.len()).sum()
    }

    /// Total number of leaves
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }
}
