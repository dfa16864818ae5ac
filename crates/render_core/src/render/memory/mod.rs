//! # GPU Buffer Memory
//!
//! Sub-allocation of large GPU buffers. Thousands of meshes share a handful
//! of big buffers ("slabs") instead of each owning buffer objects of its own.
//!
//! ## Architecture
//!
//! - **ChunkAllocator**: byte-range bookkeeping for one buffer
//! - **SlabList**: slab selection and growth, shared by all pool flavours
//! - **VertexBufferPool / IndexBufferPool**: single-buffer slabs
//! - **ObjectBufferPool**: vertex + index (+ bone) slabs keyed by components
//!
//! None of these types lock. Loading and unloading must be funnelled
//! through one owner, which `&mut self` on every mutating call enforces.

mod buffer_pool;
mod chunk_allocator;
mod components;
mod handle;
mod object_pool;
mod slab;

pub use buffer_pool::{IndexBufferPool, VertexBufferPool};
pub use chunk_allocator::{align_up, ChunkAllocator, MemChunk};
pub use components::{SubmeshComponents, VertexBoneData, ATTRIBUTE_SIZE, BONE_DATA_SIZE, INDEX_SIZE};
pub use handle::{BufferHandle, GpuBufferChunk, SlabId};
pub(crate) use handle::draw_param;
pub use object_pool::{ObjectBufferPool, ObjectRequest};
pub use slab::{PoolStats, SubBuffer};
