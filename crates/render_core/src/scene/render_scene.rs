//! # Render Scene
//!
//! The slice of scene state the render core reads: which geometries exist,
//! where their buffers live, and which drawables use them with which passes.
//! Transforms, animation and hierarchy belong to the frontend.
//!
//! Every mutation bumps [`RenderScene::revision`], which is how a
//! [`RenderQueue`](super::RenderQueue) notices it must re-register nodes.

use super::ids::{DrawableId, GeometryId, PassId, TransformId};
use crate::foundation::collections::HandleMap;
use crate::render::memory::BufferHandle;
use log::debug;

/// Where a geometry's data lives and how much of it to draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBinding {
    /// Pool allocation holding the data
    pub buffers: BufferHandle,
    /// Vertices to draw
    pub vertex_count: u32,
    /// Indices to draw, zero for non-indexed geometry
    pub index_count: u32,
}

impl GeometryBinding {
    /// Binding for indexed geometry
    pub fn indexed(buffers: BufferHandle, vertex_count: u32, index_count: u32) -> Self {
        Self {
            buffers,
            vertex_count,
            index_count,
        }
    }

    /// Binding for non-indexed geometry
    pub fn non_indexed(buffers: BufferHandle, vertex_count: u32) -> Self {
        Self::indexed(buffers, vertex_count, 0)
    }

    /// Whether draws use the index buffer
    pub fn is_indexed(&self) -> bool {
        self.index_count > 0 && self.buffers.index.is_some()
    }
}

/// Material pass state that affects node registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassDesc {
    /// Pass identity
    pub id: PassId,
    /// Both faces are visible
    pub two_sided: bool,
    /// Output is blended
    pub alpha_blending: bool,
}

impl PassDesc {
    /// Opaque single-sided pass
    pub fn opaque(id: PassId) -> Self {
        Self {
            id,
            two_sided: false,
            alpha_blending: false,
        }
    }

    /// Blended pass
    pub fn blended(id: PassId) -> Self {
        Self {
            alpha_blending: true,
            ..Self::opaque(id)
        }
    }

    /// Mark the pass as two-sided
    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.two_sided = two_sided;
        self
    }
}

/// A placed instance of some geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawableDesc {
    /// Geometry drawn
    pub geometry: GeometryId,
    /// World transform slot
    pub transform: TransformId,
    /// Material passes, each registered separately
    pub passes: Vec<PassDesc>,
    /// Has a skeleton
    pub skinned: bool,
    /// Has morph targets
    pub morphing: bool,
    /// Geometry is a billboard list
    pub billboard: bool,
    /// Rendered into shadow maps
    pub shadow_caster: bool,
    /// Considered at all
    pub visible: bool,
}

impl DrawableDesc {
    /// Visible, shadow-casting static drawable
    pub fn new(geometry: GeometryId, transform: TransformId) -> Self {
        Self {
            geometry,
            transform,
            passes: Vec::new(),
            skinned: false,
            morphing: false,
            billboard: false,
            shadow_caster: true,
            visible: true,
        }
    }

    /// Add a pass
    pub fn with_pass(mut self, pass: PassDesc) -> Self {
        self.passes.push(pass);
        self
    }

    /// Attach a skeleton
    pub fn with_skinning(mut self, skinned: bool) -> Self {
        self.skinned = skinned;
        self
    }

    /// Enable morph targets
    pub fn with_morphing(mut self, morphing: bool) -> Self {
        self.morphing = morphing;
        self
    }

    /// Mark as billboard list
    pub fn with_billboard(mut self, billboard: bool) -> Self {
        self.billboard = billboard;
        self
    }

    /// Set shadow casting
    pub fn with_shadow_caster(mut self, shadow_caster: bool) -> Self {
        self.shadow_caster = shadow_caster;
        self
    }

    /// Set initial visibility
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// Geometry and drawable arenas
#[derive(Debug, Default)]
pub struct RenderScene {
    geometries: HandleMap<GeometryId, GeometryBinding>,
    drawables: HandleMap<DrawableId, DrawableDesc>,
    revision: u64,
}

impl RenderScene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Register geometry
    pub fn add_geometry(&mut self, binding: GeometryBinding) -> GeometryId {
        self.revision += 1;
        self.geometries.insert(binding)
    }

    /// Unregister geometry. Drawables still pointing at it are skipped when
    /// commands are emitted. The caller returns the buffers to their pool.
    pub fn remove_geometry(&mut self, id: GeometryId) -> Option<GeometryBinding> {
        let removed = self.geometries.remove(id);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Look up geometry
    pub fn geometry(&self, id: GeometryId) -> Option<&GeometryBinding> {
        self.geometries.get(id)
    }

    /// Register a drawable
    pub fn add_drawable(&mut self, desc: DrawableDesc) -> DrawableId {
        self.revision += 1;
        let id = self.drawables.insert(desc);
        debug!("Added drawable {:?}", id);
        id
    }

    /// Unregister a drawable
    pub fn remove_drawable(&mut self, id: DrawableId) -> Option<DrawableDesc> {
        let removed = self.drawables.remove(id);
        if removed.is_some() {
            self.revision += 1;
            debug!("Removed drawable {:?}", id);
        }
        removed
    }

    /// Look up a drawable
    pub fn drawable(&self, id: DrawableId) -> Option<&DrawableDesc> {
        self.drawables.get(id)
    }

    /// Show or hide a drawable. Returns false for unknown ids.
    pub fn set_visible(&mut self, id: DrawableId, visible: bool) -> bool {
        match self.drawables.get_mut(id) {
            Some(desc) => {
                if desc.visible != visible {
                    desc.visible = visible;
                    self.revision += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Every drawable, in arena order
    pub fn drawables(&self) -> impl Iterator<Item = (DrawableId, &DrawableDesc)> {
        self.drawables.iter()
    }

    /// Every geometry, in arena order
    pub fn geometries(&self) -> impl Iterator<Item = (GeometryId, &GeometryBinding)> {
        self.geometries.iter()
    }

    /// Number of drawables
    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    /// Number of geometries
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Bumped on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
