//! # Render Core
//!
//! GPU buffer pooling and render-node dispatch for a Vulkan renderer.
//!
//! ## Features
//!
//! - **Slab Pools**: vertex, index and object buffers sub-allocated from a
//!   few large GPU buffers
//! - **Render Node Buckets**: nodes grouped by kind, face culling, pipeline,
//!   pass and geometry
//! - **Cull Pass**: per-frame join of registered nodes with an external
//!   visibility oracle
//! - **Command Emitter**: ordered draw recording with minimal state changes,
//!   direct or into indirect batches
//!
//! ## Quick Start
//!
//! ```rust
//! use render_core::prelude::*;
//!
//! # fn main() -> Result<(), RenderError> {
//! let config = RenderCoreConfig::default();
//! let mut device = HostDevice::new();
//! let mut pool = ObjectBufferPool::new("meshes", &config.pools);
//!
//! let components = SubmeshComponents::standard();
//! let handle = pool
//!     .get_buffer(&mut device, ObjectRequest::new(3, 3), components)?
//!     .expect("non-empty request");
//! pool.write_indices(&handle, &[0, 1, 2]);
//! pool.upload(&mut device)?;
//!
//! let mut scene = RenderScene::new();
//! let geometry = scene.add_geometry(GeometryBinding::indexed(handle, 3, 3));
//! let drawable = scene.add_drawable(
//!     DrawableDesc::new(geometry, TransformId(0)).with_pass(PassDesc::opaque(PassId(0))),
//! );
//!
//! struct OnePipeline;
//! impl PipelineRegistry for OnePipeline {
//!     fn get_pipeline(&mut self, _: &PassDesc, _: ProgramFlags, _: FaceCulling) -> Option<PipelineId> {
//!         Some(PipelineId(0))
//!     }
//! }
//!
//! let mut queue = RenderQueue::new(true, RenderMode::MainView, &config.queue);
//! let visible: std::collections::HashSet<_> = [drawable].into_iter().collect();
//! queue.update(&scene, &mut OnePipeline, &visible, &Viewpoint::default());
//!
//! let mut recorder = CommandRecorder::new();
//! let frame = queue.emit(&scene, &mut recorder);
//! assert_eq!(frame.stats.draw_calls, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

#[cfg(test)]
mod tests;

pub use render::{RenderError, RenderResult};

/// Common imports for render core users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PoolConfig, QueueConfig, RenderCoreConfig},
        render::{
            BufferHandle, CommandEmitter, CommandRecorder, CommandSink, EmittedFrame, GpuResourceFactory,
            HostDevice, IndexBufferPool, IndirectCommandBuilder, ObjectBufferPool, ObjectRequest, RenderError,
            RenderResult, SubmeshComponents, UploadContext, VertexBufferPool,
        },
        scene::{
            CullPass, CulledSubset, DrawableDesc, DrawableId, DrawableKind, FaceCulling, FrustumCuller,
            GeometryBinding, GeometryId, PassDesc, PassId, PipelineId, PipelineRegistry, ProgramFlags, RenderMode,
            RenderNode, RenderNodeBucket, RenderQueue, RenderScene, TransformId, Viewpoint, VisibilityOracle,
        },
    };
}
