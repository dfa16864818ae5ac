//! # Rendering Core
//!
//! GPU-facing half of the crate: slab-backed buffer pools, the contracts
//! for the external graphics backend, and the command emitter that turns a
//! culled node set into draw calls.
//!
//! ## Architecture
//!
//! ```text
//! Mesh load/unload ──► ObjectBufferPool / VertexBufferPool / IndexBufferPool
//!                              │  (slabs, each backed by ChunkAllocators)
//!                              ▼
//!                      GpuResourceFactory + UploadContext   (backend)
//!
//! CulledSubset ──► CommandEmitter ──► CommandSink           (backend)
//! ```

pub mod command_emitter;
pub mod gpu;
pub mod indirect;
pub mod memory;

pub use command_emitter::{CommandEmitter, CommandRecorder, CommandSink, EmitStats, EmittedFrame, RecordedCommand};
pub use gpu::{BufferResource, GpuResourceFactory, HostDevice, UploadContext, UploadRequest};
pub use indirect::{IndirectBatch, IndirectCommandBuilder};
pub use memory::{
    BufferHandle, ChunkAllocator, GpuBufferChunk, IndexBufferPool, MemChunk, ObjectBufferPool,
    ObjectRequest, PoolStats, SlabId, SubmeshComponents, VertexBufferPool,
};

/// Errors that can occur while talking to the graphics backend
///
/// Internal bookkeeping violations (double free, exhausted arena, unknown
/// handle) are not represented here: they are programming errors and
/// panic at the point of detection.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Resource creation or management failed
    ///
    /// Occurs when the backend cannot create a buffer for a new slab,
    /// typically due to memory constraints.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// An upload request could not be recorded or flushed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
