//! Identity handles used as bucket keys
//!
//! Drawables and geometries are slot-map keys owned by
//! [`RenderScene`](super::RenderScene). Pipelines, passes and transforms are
//! owned by collaborators outside this crate, which hand out plain numeric
//! ids that stay stable for at least one frame.

use crate::foundation::collections::new_key_type;

new_key_type! {
    /// A placed, visibility-tested instance of some geometry
    pub struct DrawableId;

    /// Submesh or billboard list whose buffers a node binds
    pub struct GeometryId;
}

/// Pipeline identity, as issued by the pipeline registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u32);

/// Material pass identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub u32);

/// Slot of a world transform in the frontend's transform storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformId(pub u32);
