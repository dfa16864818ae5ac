//! Render nodes and the tags they are bucketed by

use super::ids::{DrawableId, GeometryId, PassId, PipelineId, TransformId};
use bitflags::bitflags;

/// How a drawable is fed to the GPU
///
/// The declaration order is the order the command emitter visits kinds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrawableKind {
    /// Rigid submesh, one draw per instance
    Static,
    /// Skeleton-animated submesh, one draw per instance
    Skinned,
    /// Morph-target animated submesh, one draw per instance
    Morphing,
    /// Rigid submesh shared by several instances, one instanced draw
    InstancedStatic,
    /// Skinned submesh shared by several instances, one instanced draw
    InstancedSkinned,
    /// Camera-facing quads, one instanced draw per billboard list
    Billboard,
}

impl DrawableKind {
    /// Every kind, in traversal order
    pub const ALL: [Self; 6] = [
        Self::Static,
        Self::Skinned,
        Self::Morphing,
        Self::InstancedStatic,
        Self::InstancedSkinned,
        Self::Billboard,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Static => 0,
            Self::Skinned => 1,
            Self::Morphing => 2,
            Self::InstancedStatic => 3,
            Self::InstancedSkinned => 4,
            Self::Billboard => 5,
        }
    }

    /// Whether a bucket of this kind is drawn with a single instanced call
    pub fn is_instanced(self) -> bool {
        matches!(self, Self::InstancedStatic | Self::InstancedSkinned | Self::Billboard)
    }

    /// Shader program features this kind needs
    pub fn program_flags(self) -> ProgramFlags {
        match self {
            Self::Static => ProgramFlags::empty(),
            Self::Skinned => ProgramFlags::SKINNING,
            Self::Morphing => ProgramFlags::MORPHING,
            Self::InstancedStatic => ProgramFlags::INSTANTIATION,
            Self::InstancedSkinned => ProgramFlags::INSTANTIATION | ProgramFlags::SKINNING,
            Self::Billboard => ProgramFlags::BILLBOARDS,
        }
    }
}

/// Which faces the pipeline variant culls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaceCulling {
    /// Front faces culled: used to draw the back side of two-sided or blended passes
    Front,
    /// Back faces culled: the regular variant
    Back,
}

impl FaceCulling {
    /// Both variants, in traversal order
    pub const ALL: [Self; 2] = [Self::Front, Self::Back];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Front => 0,
            Self::Back => 1,
        }
    }
}

bitflags! {
    /// Program features a pipeline is selected by
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProgramFlags: u32 {
        /// Per-instance transforms come from an instance buffer
        const INSTANTIATION = 1 << 0;
        /// Vertex skinning
        const SKINNING = 1 << 1;
        /// Morph target blending
        const MORPHING = 1 << 2;
        /// Camera-facing quads
        const BILLBOARDS = 1 << 3;
        /// Blended output
        const ALPHA_BLENDING = 1 << 4;
        /// Depth-only shadow map output
        const SHADOW_MAP = 1 << 5;
        /// Pipeline culls front faces
        const INVERT_NORMALS = 1 << 6;
    }
}

/// One drawable/pass combination eligible for drawing.
///
/// Built when the combination is registered and reused every frame.
/// All fields are handles; the node owns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderNode {
    /// Visibility-tested instance
    pub drawable: DrawableId,
    /// Geometry whose buffers are bound
    pub geometry: GeometryId,
    /// Material pass
    pub pass: PassId,
    /// Pipeline the pass renders with
    pub pipeline: PipelineId,
    /// World transform slot
    pub transform: TransformId,
}
