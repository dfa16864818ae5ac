//! Slab bookkeeping shared by every pool flavour
//!
//! A slab is a set of GPU buffers created together, each with its own
//! [`ChunkAllocator`]. A [`SlabList`] owns the slabs for one pool (or one
//! component key of a pool) and does slab selection, growth, release and
//! staged uploads. Slabs are only ever appended.

use super::chunk_allocator::{align_up, ChunkAllocator, MemChunk};
use super::handle::{GpuBufferChunk, SlabId};
use crate::render::gpu::{BufferResource, GpuResourceFactory, UploadContext, UploadRequest};
use crate::render::RenderResult;
use ash::vk;
use std::collections::VecDeque;

/// The sub-buffers a slab can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubBuffer {
    /// Interleaved vertex attributes
    Vertex,
    /// 32-bit indices
    Index,
    /// Per-vertex bone ids and weights
    Bone,
}

impl SubBuffer {
    /// All sub-buffers in slot order
    pub const ALL: [Self; 3] = [Self::Vertex, Self::Index, Self::Bone];

    fn slot(self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Index => 1,
            Self::Bone => 2,
        }
    }

    /// Usage flags the backing buffer is created with
    pub fn usage(self) -> vk::BufferUsageFlags {
        let usage = match self {
            Self::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            Self::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            Self::Bone => vk::BufferUsageFlags::STORAGE_BUFFER,
        };
        usage | vk::BufferUsageFlags::TRANSFER_DST
    }

    /// How uploaded data is consumed
    pub fn access(self) -> vk::AccessFlags {
        match self {
            Self::Vertex => vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
            Self::Index => vk::AccessFlags::INDEX_READ,
            Self::Bone => vk::AccessFlags::SHADER_READ,
        }
    }

    /// Where uploaded data is consumed
    pub fn stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Vertex | Self::Index => vk::PipelineStageFlags::VERTEX_INPUT,
            Self::Bone => vk::PipelineStageFlags::VERTEX_SHADER,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Index => "index",
            Self::Bone => "bone",
        }
    }
}

/// Byte sizes per sub-buffer; zero means "none"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SubBufferSizes([u64; 3]);

impl SubBufferSizes {
    pub(crate) fn new(vertex: u64, index: u64, bone: u64) -> Self {
        Self([vertex, index, bone])
    }

    pub(crate) fn get(&self, kind: SubBuffer) -> u64 {
        self.0[kind.slot()]
    }

    fn requested(&self) -> impl Iterator<Item = (SubBuffer, u64)> + '_ {
        SubBuffer::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .filter(|&(_, size)| size > 0)
    }
}

/// Counters describing a pool's memory use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Slabs created so far
    pub slab_count: usize,
    /// Handles issued and not yet released
    pub live_handles: usize,
    /// Bytes held by live chunks across all slabs
    pub allocated_bytes: u64,
    /// Bytes of GPU buffer memory across all slabs
    pub capacity_bytes: u64,
    /// Staged writes waiting for the next upload
    pub pending_writes: usize,
}

impl PoolStats {
    /// Fraction of slab memory in use
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.allocated_bytes as f64 / self.capacity_bytes as f64
        }
    }

    pub(crate) fn accumulate(&mut self, other: &Self) {
        self.slab_count += other.slab_count;
        self.live_handles += other.live_handles;
        self.allocated_bytes += other.allocated_bytes;
        self.capacity_bytes += other.capacity_bytes;
        self.pending_writes += other.pending_writes;
    }
}

#[derive(Debug)]
struct PendingWrite {
    offset: u64,
    data: Vec<u8>,
}

#[derive(Debug)]
struct SlabBuffer {
    resource: BufferResource,
    allocator: ChunkAllocator,
    pending: VecDeque<PendingWrite>,
}

impl SlabBuffer {
    fn fits(&self, size: u64) -> bool {
        self.allocator.has_available(size) && self.allocator.can_allocate(size)
    }
}

/// One set of same-lifetime buffers
#[derive(Debug)]
pub(crate) struct Slab {
    id: SlabId,
    buffers: [Option<SlabBuffer>; 3],
}

impl Slab {
    fn buffer(&self, kind: SubBuffer) -> Option<&SlabBuffer> {
        self.buffers[kind.slot()].as_ref()
    }

    fn buffer_mut(&mut self, kind: SubBuffer) -> Option<&mut SlabBuffer> {
        self.buffers[kind.slot()].as_mut()
    }

    fn fits(&self, request: &SubBufferSizes) -> bool {
        request
            .requested()
            .all(|(kind, size)| self.buffer(kind).is_some_and(|buffer| buffer.fits(size)))
    }

    /// Backend buffer of a sub-buffer, if the slab has one
    pub(crate) fn resource(&self, kind: SubBuffer) -> Option<BufferResource> {
        self.buffer(kind).map(|buffer| buffer.resource)
    }

    /// Allocator of a sub-buffer, if the slab has one
    pub(crate) fn allocator(&self, kind: SubBuffer) -> Option<&ChunkAllocator> {
        self.buffer(kind).map(|buffer| &buffer.allocator)
    }
}

/// Capacity for a new sub-buffer: the configured size, or room for the
/// request plus one granule when the request does not fit it.
fn slab_capacity(default: u64, need: u64, alignment: u64) -> u64 {
    if need < default {
        default
    } else {
        align_up(need, alignment) + alignment
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Growable list of slabs sharing one layout
#[derive(Debug)]
pub(crate) struct SlabList {
    name: String,
    alignment: u64,
    /// Vertex chunks are sized in multiples of this, so every chunk starts
    /// on a whole vertex
    vertex_granule: u64,
    layout: SubBufferSizes,
    slabs: Vec<Slab>,
    live_handles: usize,
}

impl SlabList {
    /// `layout` holds the default capacity of every sub-buffer the slabs
    /// carry; a zero entry leaves that sub-buffer out.
    pub(crate) fn new(name: impl Into<String>, alignment: u64, layout: SubBufferSizes) -> Self {
        Self {
            name: name.into(),
            alignment,
            vertex_granule: alignment,
            layout,
            slabs: Vec::new(),
            live_handles: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slabs.len()
    }

    pub(crate) fn slab(&self, id: SlabId) -> Option<&Slab> {
        self.slabs.get(id.index())
    }

    /// Lay vertex chunks out for a fixed vertex stride: chunk sizes become
    /// multiples of `lcm(alignment, stride)`.
    pub(crate) fn with_vertex_stride(mut self, stride: u64) -> Self {
        debug_assert!(stride > 0);
        self.vertex_granule = self.alignment / gcd(self.alignment, stride) * stride;
        self
    }

    /// Round a byte count to this list's alignment
    pub(crate) fn aligned(&self, bytes: u64) -> u64 {
        align_up(bytes, self.alignment)
    }

    /// Bytes reserved for `count` vertices of `stride` bytes
    pub(crate) fn vertex_bytes(&self, count: u32, stride: u64) -> u64 {
        (u64::from(count) * stride).div_ceil(self.vertex_granule) * self.vertex_granule
    }

    /// First slab in creation order where every requested sub-buffer has
    /// room, or a new slab sized for the request.
    pub(crate) fn select(
        &mut self,
        factory: &mut dyn GpuResourceFactory,
        request: SubBufferSizes,
    ) -> RenderResult<SlabId> {
        for (kind, _) in request.requested() {
            assert!(
                self.layout.get(kind) > 0,
                "{}: slabs carry no {} sub-buffer",
                self.name,
                kind.label()
            );
        }

        if let Some(slab) = self.slabs.iter().find(|slab| slab.fits(&request)) {
            return Ok(slab.id);
        }
        self.create_slab(factory, request)
    }

    fn create_slab(&mut self, factory: &mut dyn GpuResourceFactory, request: SubBufferSizes) -> RenderResult<SlabId> {
        let id = SlabId(u32::try_from(self.slabs.len()).unwrap_or(u32::MAX));
        let mut buffers: [Option<SlabBuffer>; 3] = [None, None, None];

        for kind in SubBuffer::ALL {
            let default = self.layout.get(kind);
            if default == 0 {
                continue;
            }
            let need = request.get(kind);
            if need >= default {
                log::warn!(
                    "{}: {} request of {need} bytes exceeds the configured slab size of {default} bytes",
                    self.name,
                    kind.label()
                );
            }
            let capacity = slab_capacity(default, need, self.alignment);
            let debug_name = format!("{}/slab{}/{}", self.name, id.index(), kind.label());
            let resource = match factory.create_buffer(kind.usage(), capacity, &debug_name) {
                Ok(resource) => resource,
                Err(err) => {
                    // A half-built slab is never stored, so give back what it got
                    for buffer in buffers.iter_mut().filter_map(Option::take) {
                        factory.destroy_buffer(buffer.resource);
                    }
                    log::warn!("{}: slab {} not created: {err}", self.name, id.index());
                    return Err(err);
                }
            };
            buffers[kind.slot()] = Some(SlabBuffer {
                resource,
                allocator: ChunkAllocator::new(capacity, self.alignment),
                pending: VecDeque::new(),
            });
        }

        log::info!("{}: created slab {} ({} total)", self.name, id.index(), self.slabs.len() + 1);
        self.slabs.push(Slab { id, buffers });
        Ok(id)
    }

    /// Carve `size` bytes from one sub-buffer of a slab
    pub(crate) fn allocate(&mut self, slab: SlabId, kind: SubBuffer, size: u64) -> GpuBufferChunk {
        let buffer = self
            .slabs
            .get_mut(slab.index())
            .and_then(|slab| slab.buffer_mut(kind))
            .unwrap_or_else(|| panic!("slab {} has no {} sub-buffer", slab.index(), kind.label()));
        let offset = buffer.allocator.allocate(size);

        GpuBufferChunk {
            slab,
            buffer: buffer.resource,
            chunk: MemChunk {
                offset,
                size: buffer.allocator.aligned_size(size),
                alignment: buffer.allocator.alignment(),
            },
        }
    }

    /// Linear scan for the slab whose `kind` sub-buffer is `buffer`
    pub(crate) fn find_slab(&self, kind: SubBuffer, buffer: vk::Buffer) -> Option<SlabId> {
        self.slabs
            .iter()
            .find(|slab| slab.resource(kind).is_some_and(|resource| resource.raw == buffer))
            .map(|slab| slab.id)
    }

    /// Give a chunk back to the slab that owns its buffer.
    ///
    /// # Panics
    /// If no slab of this list owns the chunk's buffer, or the chunk is not live.
    pub(crate) fn release(&mut self, slab: SlabId, kind: SubBuffer, chunk: &GpuBufferChunk) {
        let name = &self.name;
        let buffer = self
            .slabs
            .get_mut(slab.index())
            .and_then(|slab| slab.buffer_mut(kind))
            .filter(|buffer| buffer.resource.raw == chunk.buffer.raw)
            .unwrap_or_else(|| {
                panic!(
                    "{name}: {} chunk {:?} does not belong to slab {}",
                    kind.label(),
                    chunk.chunk,
                    slab.index()
                )
            });

        let freed = buffer.allocator.deallocate(chunk.chunk.offset);
        buffer
            .pending
            .retain(|write| write.offset < freed.offset || write.offset >= freed.end());
    }

    /// Queue host bytes for a chunk; they reach the GPU on the next upload.
    ///
    /// # Panics
    /// If `data` is larger than the chunk or the chunk's buffer is unknown.
    pub(crate) fn stage(&mut self, kind: SubBuffer, chunk: &GpuBufferChunk, data: Vec<u8>) {
        assert!(
            data.len() as u64 <= chunk.chunk.size,
            "{}: {} bytes staged into a {} byte {} chunk",
            self.name,
            data.len(),
            chunk.chunk.size,
            kind.label()
        );
        let slab = self
            .find_slab(kind, chunk.buffer.raw)
            .unwrap_or_else(|| panic!("{}: staging into a buffer this pool does not own", self.name));
        if let Some(buffer) = self.slabs[slab.index()].buffer_mut(kind) {
            buffer.pending.push_back(PendingWrite {
                offset: chunk.chunk.offset,
                data,
            });
        }
    }

    /// Forward every pending write to `context`, oldest first.
    ///
    /// Writes the context rejects stay queued for the next attempt.
    pub(crate) fn upload(&mut self, context: &mut dyn UploadContext) -> RenderResult<usize> {
        let mut written = 0;
        for slab in &mut self.slabs {
            for kind in SubBuffer::ALL {
                let Some(buffer) = slab.buffer_mut(kind) else {
                    continue;
                };
                while let Some(write) = buffer.pending.front() {
                    context.write(UploadRequest {
                        data: &write.data,
                        buffer: buffer.resource.raw,
                        offset: write.offset,
                        access: kind.access(),
                        stage: kind.stage(),
                    })?;
                    buffer.pending.pop_front();
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    pub(crate) fn handle_issued(&mut self) {
        self.live_handles += 1;
    }

    pub(crate) fn handle_released(&mut self) {
        self.live_handles = self.live_handles.saturating_sub(1);
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            slab_count: self.slabs.len(),
            live_handles: self.live_handles,
            ..PoolStats::default()
        };
        for buffer in self.slabs.iter().flat_map(|slab| slab.buffers.iter().flatten()) {
            stats.allocated_bytes += buffer.allocator.allocated_size();
            stats.capacity_bytes += buffer.allocator.capacity();
            stats.pending_writes += buffer.pending.len();
        }
        stats
    }
}
