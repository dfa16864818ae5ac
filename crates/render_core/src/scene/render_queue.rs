//! # Render Queue
//!
//! Owns the full node bucket for one kind of view and keeps it in sync with
//! the scene. Each frame it culls the bucket and hands the result to the
//! command emitter.
//!
//! ## Registration
//!
//! Every visible drawable contributes one node per accepted pass and face
//! culling variant:
//!
//! - opaque queues take opaque passes, transparent queues blended ones
//! - shadow queues only take shadow casters and never billboards
//! - a geometry+pass used by several drawables is drawn instanced, unless
//!   the drawable morphs, is a billboard, or blends without
//!   order-independent transparency
//! - two-sided and blended passes also get a front-face-culled variant

use super::cull_pass::{CullPass, CullStats, CulledSubset, RenderMode, Viewpoint, VisibilityOracle};
use super::ids::{DrawableId, GeometryId, PassId, PipelineId};
use super::node_bucket::RenderNodeBucket;
use super::render_node::{DrawableKind, FaceCulling, ProgramFlags, RenderNode};
use super::render_scene::{DrawableDesc, GeometryBinding, PassDesc, RenderScene};
use crate::config::QueueConfig;
use crate::render::command_emitter::{CommandEmitter, CommandSink, EmittedFrame};
use log::{debug, warn};
use std::collections::HashMap;

/// Hands out pipelines for pass and program feature combinations
pub trait PipelineRegistry {
    /// Pipeline for a pass drawn with the given features and culling mode.
    ///
    /// `None` means no such pipeline can be made right now; the node is
    /// skipped until the next registration.
    fn get_pipeline(&mut self, pass: &PassDesc, flags: ProgramFlags, culling: FaceCulling) -> Option<PipelineId>;
}

/// Registration result counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Drawables that contributed at least one node
    pub drawables: usize,
    /// Nodes inserted
    pub nodes: usize,
    /// Variants dropped because no pipeline was available
    pub missing_pipelines: usize,
}

/// Node registration and per-frame culling for one view
#[derive(Debug)]
pub struct RenderQueue {
    opaque: bool,
    mode: RenderMode,
    ignored: Option<DrawableId>,
    config: QueueConfig,
    nodes: RenderNodeBucket,
    cull: CullPass,
    emitter: CommandEmitter,
    sorted_revision: Option<u64>,
    sort_stats: SortStats,
}

impl RenderQueue {
    /// Create a queue for opaque or blended passes in the given mode
    pub fn new(opaque: bool, mode: RenderMode, config: &QueueConfig) -> Self {
        Self {
            opaque,
            mode,
            ignored: None,
            config: config.clone(),
            nodes: RenderNodeBucket::new(),
            cull: CullPass::new(),
            emitter: CommandEmitter::new(),
            sorted_revision: None,
            sort_stats: SortStats::default(),
        }
    }

    /// Leave one drawable out, e.g. the object an environment map is
    /// captured around
    pub fn with_ignored(mut self, drawable: DrawableId) -> Self {
        self.ignored = Some(drawable);
        self.sorted_revision = None;
        self
    }

    /// Whether this queue takes opaque passes
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// What the queue renders into
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Rebuild the full bucket from the scene
    pub fn sort_nodes(&mut self, scene: &RenderScene, pipelines: &mut dyn PipelineRegistry) {
        self.nodes.clear();
        let mut stats = SortStats::default();

        let opaque = self.opaque;
        let accepts_pass = |pass: &&PassDesc| pass.alpha_blending != opaque;

        // Users per geometry+pass decide instancing
        let mut users: HashMap<(GeometryId, PassId), usize> = HashMap::new();
        for (id, desc) in scene.drawables() {
            if !self.accepts_drawable(id, desc) {
                continue;
            }
            for pass in desc.passes.iter().filter(accepts_pass) {
                *users.entry((desc.geometry, pass.id)).or_default() += 1;
            }
        }

        for (id, desc) in scene.drawables() {
            if !self.accepts_drawable(id, desc) {
                continue;
            }
            let Some(geometry) = scene.geometry(desc.geometry) else {
                warn!("Drawable {:?} references missing geometry {:?}", id, desc.geometry);
                continue;
            };

            let before = stats.nodes;
            for pass in desc.passes.iter().filter(accepts_pass) {
                let shared = users.get(&(desc.geometry, pass.id)).copied().unwrap_or(0) > 1;
                let kind = self.drawable_kind(desc, geometry, pass, shared);
                let node = |pipeline| RenderNode {
                    drawable: id,
                    geometry: desc.geometry,
                    pass: pass.id,
                    pipeline,
                    transform: desc.transform,
                };

                for &culling in Self::culling_variants(pass) {
                    match pipelines.get_pipeline(pass, self.program_flags(kind, pass, culling), culling) {
                        Some(pipeline) => {
                            self.nodes.insert(kind, culling, node(pipeline));
                            stats.nodes += 1;
                        }
                        None => stats.missing_pipelines += 1,
                    }
                }
            }
            if stats.nodes > before {
                stats.drawables += 1;
            }
        }

        if stats.missing_pipelines > 0 {
            warn!("{} node variants skipped: no pipeline available", stats.missing_pipelines);
        }
        debug!(
            "Sorted {} nodes from {} drawables ({:?}, opaque: {})",
            stats.nodes, stats.drawables, self.mode, self.opaque
        );

        self.sorted_revision = Some(scene.revision());
        self.sort_stats = stats;
    }

    /// Re-register if the scene changed, then cull for this frame
    pub fn update(
        &mut self,
        scene: &RenderScene,
        pipelines: &mut dyn PipelineRegistry,
        oracle: &dyn VisibilityOracle,
        viewpoint: &Viewpoint,
    ) -> &CulledSubset {
        if self.sorted_revision != Some(scene.revision()) {
            self.sort_nodes(scene, pipelines);
        }
        self.cull.run(&self.nodes, oracle, viewpoint, self.mode)
    }

    /// Record draw commands for the last culled subset
    pub fn emit(&self, scene: &RenderScene, sink: &mut dyn CommandSink) -> EmittedFrame {
        self.emitter.emit(self.cull.culled(), scene, sink)
    }

    /// Every registered node
    pub fn nodes(&self) -> &RenderNodeBucket {
        &self.nodes
    }

    /// Nodes that survived the last cull
    pub fn culled(&self) -> &CulledSubset {
        self.cull.culled()
    }

    /// Counters from the last registration
    pub fn sort_stats(&self) -> SortStats {
        self.sort_stats
    }

    /// Counters from the last cull
    pub fn cull_stats(&self) -> CullStats {
        self.cull.stats()
    }

    fn accepts_drawable(&self, id: DrawableId, desc: &DrawableDesc) -> bool {
        if !desc.visible || self.ignored == Some(id) {
            return false;
        }
        if self.mode == RenderMode::ShadowMap {
            return desc.shadow_caster && !desc.billboard;
        }
        true
    }

    fn drawable_kind(
        &self,
        desc: &DrawableDesc,
        geometry: &GeometryBinding,
        pass: &PassDesc,
        shared: bool,
    ) -> DrawableKind {
        if desc.billboard {
            return DrawableKind::Billboard;
        }

        let instanced = shared
            && !desc.morphing
            && (!pass.alpha_blending || self.config.order_independent)
            && self.config.instancing_supported;
        let skinned = desc.skinned && geometry.buffers.components.has_bones();

        match (skinned, desc.morphing, instanced) {
            (true, _, true) => DrawableKind::InstancedSkinned,
            (true, _, false) => DrawableKind::Skinned,
            (false, true, _) => DrawableKind::Morphing,
            (false, false, true) => DrawableKind::InstancedStatic,
            (false, false, false) => DrawableKind::Static,
        }
    }

    fn program_flags(&self, kind: DrawableKind, pass: &PassDesc, culling: FaceCulling) -> ProgramFlags {
        let mut flags = kind.program_flags();
        flags.set(ProgramFlags::ALPHA_BLENDING, pass.alpha_blending);
        flags.set(ProgramFlags::SHADOW_MAP, self.mode == RenderMode::ShadowMap);
        flags.set(ProgramFlags::INVERT_NORMALS, culling == FaceCulling::Front);
        flags
    }

    fn culling_variants(pass: &PassDesc) -> &'static [FaceCulling] {
        if pass.two_sided || pass.alpha_blending {
            &FaceCulling::ALL
        } else {
            &[FaceCulling::Back]
        }
    }
}
