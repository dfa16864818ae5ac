//! Handles returned by the buffer pools
//!
//! Handles are plain `Copy` values. They reference slab memory but own
//! nothing: whoever requested a handle must give it back to the issuing
//! pool before dropping the geometry that uses it.

use super::chunk_allocator::MemChunk;
use super::components::{SubmeshComponents, INDEX_SIZE};
use crate::render::gpu::BufferResource;

/// Index of a slab inside the slab list that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlabId(pub(crate) u32);

impl SlabId {
    /// Position of the slab in creation order
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A chunk together with the buffer it lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBufferChunk {
    /// Slab the chunk was carved from
    pub slab: SlabId,
    /// Buffer backing the slab's sub-buffer
    pub buffer: BufferResource,
    /// Byte range inside `buffer`
    pub chunk: MemChunk,
}

impl GpuBufferChunk {
    /// Index of the first element for a given element size
    pub fn first_element(&self, element_size: u32) -> u32 {
        debug_assert!(element_size > 0);
        debug_assert_eq!(
            self.chunk.offset % u64::from(element_size),
            0,
            "chunk at {} does not start on a {element_size}-byte element",
            self.chunk.offset
        );
        draw_param(self.chunk.offset / u64::from(element_size), "first element")
    }
}

/// Narrow a value for a 32-bit draw parameter. Out-of-range values clamp to
/// `u32::MAX` with a warning.
pub(crate) fn draw_param(value: u64, what: &str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        log::warn!("{what} {value} does not fit a draw parameter, clamped to {}", u32::MAX);
        u32::MAX
    })
}

/// Sub-allocation of one drawable inside an object pool slab
///
/// `index` and `bone` are `None` when the drawable has no such data; an
/// empty field never stands for a zero-sized allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    /// Component key the vertex data was laid out with
    pub components: SubmeshComponents,
    /// Vertex range
    pub vertex: GpuBufferChunk,
    /// Index range, owned or shared
    pub index: Option<GpuBufferChunk>,
    /// Bone data range
    pub bone: Option<GpuBufferChunk>,
    pub(crate) shared_index: bool,
}

impl BufferHandle {
    /// Combine separately pooled vertex and index ranges into one binding.
    ///
    /// The index range is marked shared: releasing such a handle through an
    /// object pool never frees it.
    pub fn from_chunks(components: SubmeshComponents, vertex: GpuBufferChunk, index: Option<GpuBufferChunk>) -> Self {
        Self {
            components,
            vertex,
            index,
            bone: None,
            shared_index: true,
        }
    }

    /// Slab holding the vertex range
    pub fn slab(&self) -> SlabId {
        self.vertex.slab
    }

    /// Bytes per vertex
    pub fn vertex_stride(&self) -> u32 {
        self.components.vertex_stride()
    }

    /// Whether the index range belongs to someone else
    pub fn has_shared_index(&self) -> bool {
        self.shared_index
    }

    /// Vertex offset to pass to an indexed draw
    pub fn vertex_offset(&self) -> u32 {
        self.vertex.first_element(self.vertex_stride())
    }

    /// First index to pass to an indexed draw
    pub fn first_index(&self) -> Option<u32> {
        self.index.map(|index| index.first_element(INDEX_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_param_clamps_out_of_range_values() {
        assert_eq!(draw_param(7, "count"), 7);
        assert_eq!(draw_param(u64::from(u32::MAX) + 1, "count"), u32::MAX);
    }
}
