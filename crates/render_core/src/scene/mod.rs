//! # Scene Side
//!
//! Render nodes, their buckets, and the per-frame culling that feeds the
//! command emitter.
//!
//! ## Architecture
//!
//! ```text
//! RenderScene (drawables, geometry bindings)
//!      ↓  RenderQueue::sort_nodes      (on scene change)
//! RenderNodeBucket (all registered nodes)
//!      ↓  CullPass::run + VisibilityOracle   (every frame)
//! CulledSubset
//!      ↓  CommandEmitter::emit
//! CommandSink
//! ```
//!
//! Nodes hold arena handles only. Drawables and geometries live in
//! [`RenderScene`]; pipelines, passes and transforms are numbered by
//! collaborators outside the crate.

pub mod bounds;
mod cull_pass;
mod frustum_culler;
mod ids;
mod node_bucket;
mod render_node;
mod render_queue;
mod render_scene;

pub use bounds::{Aabb, BoundingSphere, Frustum, Plane};
pub use cull_pass::{CullPass, CullStats, CulledSubset, RenderMode, Viewpoint, VisibilityOracle};
pub use frustum_culler::FrustumCuller;
pub use ids::{DrawableId, GeometryId, PassId, PipelineId, TransformId};
pub use node_bucket::{BucketLeaf, GeometryNodes, PassNodes, PipelineNodes, RenderNodeBucket};
pub use render_node::{DrawableKind, FaceCulling, ProgramFlags, RenderNode};
pub use render_queue::{PipelineRegistry, RenderQueue, SortStats};
pub use render_scene::{DrawableDesc, GeometryBinding, PassDesc, RenderScene};
