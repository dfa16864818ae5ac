//! # Vertex and Index Buffer Pools
//!
//! Single-buffer pools: every slab holds one vertex buffer (vertex pool) or
//! one index buffer (index pool). Requests return a [`GpuBufferChunk`] that
//! callers can bind directly, or combine with [`BufferHandle::from_chunks`]
//! when vertex and index data come from separate pools.
//!
//! [`BufferHandle::from_chunks`]: super::BufferHandle::from_chunks
//!
//! ## Usage
//!
//! ```rust
//! use render_core::config::PoolConfig;
//! use render_core::render::{HostDevice, SubmeshComponents, VertexBufferPool};
//!
//! let mut device = HostDevice::new();
//! let mut pool = VertexBufferPool::new("billboards", &PoolConfig::default());
//!
//! let chunk = pool
//!     .get_buffer(&mut device, 4, SubmeshComponents::POSITIONS)?
//!     .expect("non-empty request");
//! pool.write_vertices(&chunk, &[[0.0f32; 4]; 4]);
//! pool.upload(&mut device)?;
//! pool.put_buffer(&chunk);
//! # Ok::<(), render_core::render::RenderError>(())
//! ```

use super::components::{SubmeshComponents, INDEX_SIZE};
use super::handle::GpuBufferChunk;
use super::slab::{PoolStats, SlabList, SubBuffer, SubBufferSizes};
use crate::config::PoolConfig;
use crate::render::gpu::{GpuResourceFactory, UploadContext};
use crate::render::RenderResult;
use bytemuck::Pod;
use std::collections::HashMap;

/// Forward staged writes of several slab lists and flush once
pub(crate) fn upload_lists<'a>(
    name: &str,
    lists: impl IntoIterator<Item = &'a mut SlabList>,
    context: &mut dyn UploadContext,
) -> RenderResult<usize> {
    let mut written = 0;
    for list in lists {
        written += list.upload(context)?;
    }
    if written > 0 {
        context.flush()?;
        log::debug!("{name}: uploaded {written} staged writes");
    }
    Ok(written)
}

/// Pool of vertex-only slabs, one slab list per component key
#[derive(Debug)]
pub struct VertexBufferPool {
    name: String,
    config: PoolConfig,
    lists: HashMap<SubmeshComponents, SlabList>,
}

impl VertexBufferPool {
    /// Create an empty pool; no GPU memory is reserved until the first request
    pub fn new(name: impl Into<String>, config: &PoolConfig) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
            lists: HashMap::new(),
        }
    }

    /// Reserve room for `vertex_count` vertices laid out as `components`.
    ///
    /// Returns `None` for an empty request.
    pub fn get_buffer(
        &mut self,
        factory: &mut dyn GpuResourceFactory,
        vertex_count: u32,
        components: SubmeshComponents,
    ) -> RenderResult<Option<GpuBufferChunk>> {
        if vertex_count == 0 {
            return Ok(None);
        }
        let stride = u64::from(components.vertex_stride());
        assert!(stride > 0, "{}: {components:?} has no vertex attributes", self.name);

        let name = &self.name;
        let config = &self.config;
        let list = self.lists.entry(components).or_insert_with(|| {
            SlabList::new(
                format!("{name}[{:#x}]", components.bits()),
                config.alignment,
                SubBufferSizes::new(u64::from(config.vertex_slab_elements) * stride, 0, 0),
            )
            .with_vertex_stride(stride)
        });

        let size = list.vertex_bytes(vertex_count, stride);
        let slab = list.select(factory, SubBufferSizes::new(size, 0, 0))?;
        let chunk = list.allocate(slab, SubBuffer::Vertex, size);
        list.handle_issued();
        Ok(Some(chunk))
    }

    /// Release a chunk obtained from [`Self::get_buffer`].
    ///
    /// # Panics
    /// If no slab of this pool owns the chunk's buffer.
    pub fn put_buffer(&mut self, chunk: &GpuBufferChunk) {
        let owner = self.lists.values_mut().find_map(|list| {
            let slab = list.find_slab(SubBuffer::Vertex, chunk.buffer.raw)?;
            Some((list, slab))
        });
        let Some((list, slab)) = owner else {
            panic!("{}: no slab owns vertex buffer {:?}", self.name, chunk.buffer.raw);
        };
        list.release(slab, SubBuffer::Vertex, chunk);
        list.handle_released();
    }

    /// Stage vertex data at the start of a chunk
    pub fn write_vertices<T: Pod>(&mut self, chunk: &GpuBufferChunk, vertices: &[T]) {
        let bytes = bytemuck::cast_slice::<T, u8>(vertices).to_vec();
        let list = self
            .lists
            .values_mut()
            .find(|list| list.find_slab(SubBuffer::Vertex, chunk.buffer.raw).is_some())
            .unwrap_or_else(|| panic!("{}: chunk does not belong to this pool", self.name));
        list.stage(SubBuffer::Vertex, chunk, bytes);
    }

    /// Push every staged write through `context` and flush it
    pub fn upload(&mut self, context: &mut dyn UploadContext) -> RenderResult<usize> {
        upload_lists(&self.name, self.lists.values_mut(), context)
    }

    /// Number of slabs created for a component key
    pub fn slab_count(&self, components: SubmeshComponents) -> usize {
        self.lists.get(&components).map_or(0, SlabList::len)
    }

    /// Memory statistics across every component key
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for list in self.lists.values() {
            stats.accumulate(&list.stats());
        }
        stats
    }
}

/// Pool of index-only slabs
#[derive(Debug)]
pub struct IndexBufferPool {
    name: String,
    slabs: SlabList,
}

impl IndexBufferPool {
    /// Create an empty pool
    pub fn new(name: impl Into<String>, config: &PoolConfig) -> Self {
        let name = name.into();
        let slabs = SlabList::new(
            name.clone(),
            config.alignment,
            SubBufferSizes::new(0, u64::from(config.index_slab_elements) * u64::from(INDEX_SIZE), 0),
        );
        Self { name, slabs }
    }

    /// Reserve room for `index_count` 32-bit indices.
    ///
    /// Returns `None` for an empty request.
    pub fn get_buffer(
        &mut self,
        factory: &mut dyn GpuResourceFactory,
        index_count: u32,
    ) -> RenderResult<Option<GpuBufferChunk>> {
        if index_count == 0 {
            return Ok(None);
        }
        let size = self.slabs.aligned(u64::from(index_count) * u64::from(INDEX_SIZE));
        let slab = self.slabs.select(factory, SubBufferSizes::new(0, size, 0))?;
        let chunk = self.slabs.allocate(slab, SubBuffer::Index, size);
        self.slabs.handle_issued();
        Ok(Some(chunk))
    }

    /// Release a chunk obtained from [`Self::get_buffer`].
    ///
    /// # Panics
    /// If no slab of this pool owns the chunk's buffer.
    pub fn put_buffer(&mut self, chunk: &GpuBufferChunk) {
        let slab = self
            .slabs
            .find_slab(SubBuffer::Index, chunk.buffer.raw)
            .unwrap_or_else(|| panic!("{}: no slab owns index buffer {:?}", self.name, chunk.buffer.raw));
        self.slabs.release(slab, SubBuffer::Index, chunk);
        self.slabs.handle_released();
    }

    /// Stage index data at the start of a chunk
    pub fn write_indices(&mut self, chunk: &GpuBufferChunk, indices: &[u32]) {
        self.slabs
            .stage(SubBuffer::Index, chunk, bytemuck::cast_slice::<u32, u8>(indices).to_vec());
    }

    /// Push every staged write through `context` and flush it
    pub fn upload(&mut self, context: &mut dyn UploadContext) -> RenderResult<usize> {
        upload_lists(&self.name, std::iter::once(&mut self.slabs), context)
    }

    /// Number of slabs created so far
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Memory statistics
    pub fn stats(&self) -> PoolStats {
        self.slabs.stats()
    }
}
