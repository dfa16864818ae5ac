//! # Object Buffer Pool
//!
//! Combined pool for submesh geometry. Every slab carries a vertex buffer
//! and an index buffer, plus a bone buffer when its component key includes
//! [`SubmeshComponents::BONES`]. Slabs are grouped by component key because
//! the key decides the vertex layout.
//!
//! ## Architecture
//!
//! ```text
//! ObjectBufferPool
//!     ├── [POSITIONS|NORMALS|...]      → SlabList → Slab 0, Slab 1, ...
//!     └── [POSITIONS|...|BONES]        → SlabList → Slab 0, ...
//!                                          each slab: vertex + index (+ bone)
//! ```
//!
//! A request lands in the first slab of its key where every needed
//! sub-buffer has room. Otherwise a new slab is created and appended.

use super::buffer_pool::upload_lists;
use super::components::{SubmeshComponents, VertexBoneData, BONE_DATA_SIZE, INDEX_SIZE};
use super::handle::{BufferHandle, GpuBufferChunk};
use super::slab::{PoolStats, SlabList, SubBuffer, SubBufferSizes};
use crate::config::PoolConfig;
use crate::render::gpu::{GpuResourceFactory, UploadContext};
use crate::render::RenderResult;
use bytemuck::Pod;
use std::collections::HashMap;

/// Element counts for one object allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectRequest {
    /// Vertices to reserve
    pub vertex_count: u32,
    /// Indices to reserve; zero for non-indexed geometry
    pub index_count: u32,
    /// Bone data entries to reserve; zero for unskinned geometry
    pub bone_count: u32,
}

impl ObjectRequest {
    /// Indexed geometry without skinning
    pub fn new(vertex_count: u32, index_count: u32) -> Self {
        Self {
            vertex_count,
            index_count,
            bone_count: 0,
        }
    }

    /// Reserve one bone entry per vertex
    pub fn with_bones(mut self) -> Self {
        self.bone_count = self.vertex_count;
        self
    }
}

/// Combined vertex + index (+ bone) pool
#[derive(Debug)]
pub struct ObjectBufferPool {
    name: String,
    config: PoolConfig,
    lists: HashMap<SubmeshComponents, SlabList>,
}

impl ObjectBufferPool {
    /// Create an empty pool
    pub fn new(name: impl Into<String>, config: &PoolConfig) -> Self {
        Self {
            name: name.into(),
            config: config.clone(),
            lists: HashMap::new(),
        }
    }

    fn list_for(&mut self, components: SubmeshComponents) -> &mut SlabList {
        let stride = u64::from(components.vertex_stride());
        assert!(stride > 0, "{}: {components:?} has no vertex attributes", self.name);

        let name = &self.name;
        let config = &self.config;
        self.lists.entry(components).or_insert_with(|| {
            let vertices = u64::from(config.vertex_slab_elements);
            let bones = if components.has_bones() {
                vertices * u64::from(BONE_DATA_SIZE)
            } else {
                0
            };
            SlabList::new(
                format!("{name}[{:#x}]", components.bits()),
                config.alignment,
                SubBufferSizes::new(
                    vertices * stride,
                    u64::from(config.index_slab_elements) * u64::from(INDEX_SIZE),
                    bones,
                ),
            )
            .with_vertex_stride(stride)
        })
    }

    /// Reserve vertex, index and bone ranges for one drawable.
    ///
    /// Zero index or bone counts leave the matching handle field empty. A
    /// request without vertices returns `None`.
    ///
    /// # Panics
    /// If bones are requested for a key without [`SubmeshComponents::BONES`].
    pub fn get_buffer(
        &mut self,
        factory: &mut dyn GpuResourceFactory,
        request: ObjectRequest,
        components: SubmeshComponents,
    ) -> RenderResult<Option<BufferHandle>> {
        if request.vertex_count == 0 {
            return Ok(None);
        }
        let stride = u64::from(components.vertex_stride());
        let list = self.list_for(components);
        let sizes = SubBufferSizes::new(
            list.vertex_bytes(request.vertex_count, stride),
            list.aligned(u64::from(request.index_count) * u64::from(INDEX_SIZE)),
            list.aligned(u64::from(request.bone_count) * u64::from(BONE_DATA_SIZE)),
        );

        let slab = list.select(factory, sizes)?;
        let vertex = list.allocate(slab, SubBuffer::Vertex, sizes.get(SubBuffer::Vertex));
        let index = (sizes.get(SubBuffer::Index) > 0)
            .then(|| list.allocate(slab, SubBuffer::Index, sizes.get(SubBuffer::Index)));
        let bone = (sizes.get(SubBuffer::Bone) > 0)
            .then(|| list.allocate(slab, SubBuffer::Bone, sizes.get(SubBuffer::Bone)));
        list.handle_issued();

        log::trace!(
            "{}: {} vertices / {} indices in slab {}",
            self.name,
            request.vertex_count,
            request.index_count,
            slab.index()
        );
        Ok(Some(BufferHandle {
            components,
            vertex,
            index,
            bone,
            shared_index: false,
        }))
    }

    /// Reserve vertex (and bone) ranges while reusing an index range owned
    /// elsewhere. Only vertex and bone room count for slab selection.
    pub fn get_buffer_shared_indices(
        &mut self,
        factory: &mut dyn GpuResourceFactory,
        vertex_count: u32,
        bone_count: u32,
        components: SubmeshComponents,
        shared_index: GpuBufferChunk,
    ) -> RenderResult<Option<BufferHandle>> {
        if vertex_count == 0 {
            return Ok(None);
        }
        let stride = u64::from(components.vertex_stride());
        let list = self.list_for(components);
        let sizes = SubBufferSizes::new(
            list.vertex_bytes(vertex_count, stride),
            0,
            list.aligned(u64::from(bone_count) * u64::from(BONE_DATA_SIZE)),
        );

        let slab = list.select(factory, sizes)?;
        let vertex = list.allocate(slab, SubBuffer::Vertex, sizes.get(SubBuffer::Vertex));
        let bone = (sizes.get(SubBuffer::Bone) > 0)
            .then(|| list.allocate(slab, SubBuffer::Bone, sizes.get(SubBuffer::Bone)));
        list.handle_issued();

        Ok(Some(BufferHandle {
            components,
            vertex,
            index: Some(shared_index),
            bone,
            shared_index: true,
        }))
    }

    fn owning_list(&mut self, handle: &BufferHandle) -> &mut SlabList {
        let name = &self.name;
        self.lists
            .get_mut(&handle.components)
            .filter(|list| list.find_slab(SubBuffer::Vertex, handle.vertex.buffer.raw).is_some())
            .unwrap_or_else(|| {
                panic!(
                    "{name}: no slab owns vertex buffer {:?}; handle outlived its pool or came from another one",
                    handle.vertex.buffer.raw
                )
            })
    }

    /// Release every range the handle owns. A shared index range is left
    /// to its owner.
    ///
    /// # Panics
    /// If no slab of this pool owns the handle's vertex buffer.
    pub fn put_buffer(&mut self, handle: &BufferHandle) {
        let list = self.owning_list(handle);
        let slab = list
            .find_slab(SubBuffer::Vertex, handle.vertex.buffer.raw)
            .unwrap_or(handle.vertex.slab);

        list.release(slab, SubBuffer::Vertex, &handle.vertex);
        if let Some(index) = handle.index.filter(|_| !handle.shared_index) {
            list.release(slab, SubBuffer::Index, &index);
        }
        if let Some(bone) = &handle.bone {
            list.release(slab, SubBuffer::Bone, bone);
        }
        list.handle_released();
    }

    /// Stage interleaved vertex data
    pub fn write_vertices<T: Pod>(&mut self, handle: &BufferHandle, vertices: &[T]) {
        let bytes = bytemuck::cast_slice::<T, u8>(vertices).to_vec();
        self.owning_list(handle).stage(SubBuffer::Vertex, &handle.vertex, bytes);
    }

    /// Stage index data.
    ///
    /// # Panics
    /// If the handle has no index range, or the range is shared.
    pub fn write_indices(&mut self, handle: &BufferHandle, indices: &[u32]) {
        assert!(!handle.shared_index, "{}: shared indices are written through their owning pool", self.name);
        let index = handle
            .index
            .unwrap_or_else(|| panic!("{}: handle has no index range", self.name));
        let bytes = bytemuck::cast_slice::<u32, u8>(indices).to_vec();
        self.owning_list(handle).stage(SubBuffer::Index, &index, bytes);
    }

    /// Stage skinning data.
    ///
    /// # Panics
    /// If the handle has no bone range.
    pub fn write_bones(&mut self, handle: &BufferHandle, bones: &[VertexBoneData]) {
        let bone = handle
            .bone
            .unwrap_or_else(|| panic!("{}: handle has no bone range", self.name));
        let bytes = bones.iter().flat_map(VertexBoneData::to_bytes).collect();
        self.owning_list(handle).stage(SubBuffer::Bone, &bone, bytes);
    }

    /// Push every staged write through `context` and flush it
    pub fn upload(&mut self, context: &mut dyn UploadContext) -> RenderResult<usize> {
        upload_lists(&self.name, self.lists.values_mut(), context)
    }

    /// Number of slabs created for a component key
    pub fn slab_count(&self, components: SubmeshComponents) -> usize {
        self.lists.get(&components).map_or(0, SlabList::len)
    }

    /// Bytes in use in one slab's vertex buffer
    pub fn vertex_bytes_in_use(&self, components: SubmeshComponents, slab: super::SlabId) -> Option<u64> {
        let slab = self.lists.get(&components)?.slab(slab)?;
        slab.allocator(SubBuffer::Vertex).map(super::ChunkAllocator::allocated_size)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::HostDevice;
    use crate::render::memory::IndexBufferPool;

    const KEY: SubmeshComponents = SubmeshComponents::POSITIONS;

    fn config_4096() -> PoolConfig {
        PoolConfig::default()
            .with_vertex_slab_elements(4096)
            .with_index_slab_elements(16384)
    }

    #[test]
    fn test_zero_indices_leave_field_empty() {
        let mut device = HostDevice::new();
        let mut pool = ObjectBufferPool::new("objects", &config_4096());

        let handle = pool
            .get_buffer(&mut device, ObjectRequest::new(8, 0), KEY)
            .unwrap()
            .unwrap();

        assert!(handle.index.is_none());
        assert!(handle.bone.is_none());
        assert_eq!(handle.first_index(), None);
    }

    #[test]
    fn test_second_slab_is_chosen_before_creating_third() {
        let mut device = HostDevice::new();
        let mut pool = ObjectBufferPool::new("objects", &config_4096());

        let a = pool.get_buffer(&mut device, ObjectRequest::new(4000, 0), KEY).unwrap().unwrap();
        let b = pool.get_buffer(&mut device, ObjectRequest::new(4000, 0), KEY).unwrap().unwrap();
        assert_eq!(a.slab().index(), 0);
        assert_eq!(b.slab().index(), 1);

        pool.put_buffer(&b);
        let c = pool.get_buffer(&mut device, ObjectRequest::new(1000, 0), KEY).unwrap().unwrap();

        assert_eq!(c.slab().index(), 1);
        assert_eq!(c.vertex.buffer.raw, b.vertex.buffer.raw);
        assert_eq!(pool.slab_count(KEY), 2);
    }

    #[test]
    fn test_slab_is_picked_only_when_every_sub_buffer_fits() {
        let mut device = HostDevice::new();
        let config = config_4096().with_index_slab_elements(1024);
        let mut pool = ObjectBufferPool::new("objects", &config);

        let a = pool.get_buffer(&mut device, ObjectRequest::new(10, 1000), KEY).unwrap().unwrap();
        // Plenty of vertex room left in slab 0, but not enough index room.
        let b = pool.get_buffer(&mut device, ObjectRequest::new(10, 100), KEY).unwrap().unwrap();

        assert_eq!(a.slab().index(), 0);
        assert_eq!(b.slab().index(), 1);
    }

    #[test]
    fn test_put_buffer_restores_slab_usage() {
        let mut device = HostDevice::new();
        let mut pool = ObjectBufferPool::new("objects", &config_4096());
        let key = SubmeshComponents::standard() | SubmeshComponents::BONES;

        let handle = pool
            .get_buffer(&mut device, ObjectRequest::new(64, 96).with_bones(), key)
            .unwrap()
            .unwrap();
        assert!(handle.bone.is_some());
        assert_eq!(pool.vertex_bytes_in_use(key, handle.slab()), Some(64 * 64));

        pool.put_buffer(&handle);
        assert_eq!(pool.vertex_bytes_in_use(key, handle.slab()), Some(0));
        assert_eq!(pool.stats().allocated_bytes, 0);
        assert_eq!(pool.stats().live_handles, 0);
    }

    #[test]
    fn test_shared_indices_are_not_released() {
        let mut device = HostDevice::new();
        let mut indices = IndexBufferPool::new("shared", &config_4096());
        let mut pool = ObjectBufferPool::new("objects", &config_4096());
        let shared = indices.get_buffer(&mut device, 36).unwrap().unwrap();

        let first = pool
            .get_buffer_shared_indices(&mut device, 24, 0, KEY, shared)
            .unwrap()
            .unwrap();
        let second = pool
            .get_buffer_shared_indices(&mut device, 24, 0, KEY, shared)
            .unwrap()
            .unwrap();
        assert_eq!(first.index, second.index);
        assert!(first.has_shared_index());

        pool.put_buffer(&first);
        pool.put_buffer(&second);
        assert_eq!(pool.stats().allocated_bytes, 0);
        assert_eq!(indices.stats().live_handles, 1);
        indices.put_buffer(&shared);
    }

    #[test]
    fn test_bone_data_upload() {
        let mut device = HostDevice::new();
        let mut pool = ObjectBufferPool::new("objects", &config_4096());
        let key = SubmeshComponents::POSITIONS | SubmeshComponents::BONES;
        let handle = pool
            .get_buffer(&mut device, ObjectRequest::new(1, 3).with_bones(), key)
            .unwrap()
            .unwrap();

        let bone = VertexBoneData { ids: [7, 0, 0, 0], weights: [1.0, 0.0, 0.0, 0.0] };
        pool.write_vertices(&handle, &[[0.0f32, 1.0, 0.0, 1.0]]);
        pool.write_indices(&handle, &[0, 0, 0]);
        pool.write_bones(&handle, &[bone]);
        assert_eq!(pool.upload(&mut device).unwrap(), 3);

        let bone_chunk = handle.bone.unwrap();
        let bytes = device.read(bone_chunk.buffer.raw, bone_chunk.chunk.offset, 32).unwrap();
        assert_eq!(bytes, &bone.to_bytes()[..]);
    }

    #[test]
    fn test_creation_failure_propagates() {
        let mut device = HostDevice::with_memory_budget(1024);
        let mut pool = ObjectBufferPool::new("objects", &config_4096());

        let result = pool.get_buffer(&mut device, ObjectRequest::new(16, 16), KEY);
        assert!(result.is_err());
        assert_eq!(pool.slab_count(KEY), 0);
    }

    #[test]
    #[should_panic(expected = "no slab owns vertex buffer")]
    fn test_releasing_foreign_handle_panics() {
        let mut device = HostDevice::new();
        let mut pool = ObjectBufferPool::new("objects", &config_4096());
        let mut other = ObjectBufferPool::new("other", &config_4096());
        let handle = other.get_buffer(&mut device, ObjectRequest::new(3, 3), KEY).unwrap().unwrap();
        let _ = pool.get_buffer(&mut device, ObjectRequest::new(3, 3), KEY).unwrap();

        pool.put_buffer(&handle);
    }
}
