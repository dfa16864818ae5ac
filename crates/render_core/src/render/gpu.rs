//! # GPU Backend Contracts
//!
//! The pools never talk to a graphics API directly. They create buffers
//! through a [`GpuResourceFactory`] and push staged bytes through an
//! [`UploadContext`]; fences, queues and memory types stay on the
//! backend's side of this line.
//!
//! [`HostDevice`] implements both traits over plain host memory. It is what
//! headless tools and the test-suite run against.

use super::{RenderError, RenderResult};
use ash::vk::{self, Handle};
use std::collections::HashMap;

/// A GPU buffer as the pools see it: identity, size and usage.
///
/// Copyable, so handles can carry it around without a second lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferResource {
    /// Backend buffer identity
    pub raw: vk::Buffer,
    /// Size of the buffer in bytes
    pub size: vk::DeviceSize,
    /// Usage the buffer was created with
    pub usage: vk::BufferUsageFlags,
}

/// Creates GPU buffers on behalf of the pools
pub trait GpuResourceFactory {
    /// Create a buffer of `size` bytes.
    ///
    /// # Arguments
    /// * `usage` - How the buffer will be bound
    /// * `size` - Size in bytes
    /// * `debug_name` - Label for debugging tools
    fn create_buffer(
        &mut self,
        usage: vk::BufferUsageFlags,
        size: vk::DeviceSize,
        debug_name: &str,
    ) -> RenderResult<BufferResource>;

    /// Release a buffer created by [`Self::create_buffer`]
    fn destroy_buffer(&mut self, buffer: BufferResource);
}

/// One staged write, as forwarded by a pool during upload
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Source bytes
    pub data: &'a [u8],
    /// Destination buffer
    pub buffer: vk::Buffer,
    /// Destination offset in bytes
    pub offset: vk::DeviceSize,
    /// Access mask the data is consumed with
    pub access: vk::AccessFlags,
    /// Pipeline stage the data is consumed in
    pub stage: vk::PipelineStageFlags,
}

/// Receives staged writes and makes them GPU-visible on flush
pub trait UploadContext {
    /// Record one write
    fn write(&mut self, request: UploadRequest<'_>) -> RenderResult<()>;

    /// Submit everything recorded since the last flush
    fn flush(&mut self) -> RenderResult<()>;
}

/// Counters kept by [`HostDevice`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDeviceStats {
    /// Buffers created so far
    pub buffers_created: usize,
    /// Buffers destroyed so far
    pub buffers_destroyed: usize,
    /// Bytes made visible by flushes
    pub bytes_uploaded: u64,
    /// Number of flushes
    pub flushes: usize,
}

#[derive(Debug)]
struct HostBuffer {
    name: String,
    usage: vk::BufferUsageFlags,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct StagedWrite {
    buffer: vk::Buffer,
    offset: usize,
    data: Vec<u8>,
}

/// Software backend keeping every buffer in host memory.
///
/// Writes are staged and only land in buffer memory on [`UploadContext::flush`],
/// which mirrors the copy-on-submit behaviour of a real transfer queue.
#[derive(Debug, Default)]
pub struct HostDevice {
    buffers: HashMap<vk::Buffer, HostBuffer>,
    staged: Vec<StagedWrite>,
    next_raw: u64,
    memory_budget: Option<u64>,
    memory_used: u64,
    stats: HostDeviceStats,
}

impl HostDevice {
    /// Create a device with unlimited memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a device that refuses buffers beyond `bytes` in total
    pub fn with_memory_budget(bytes: u64) -> Self {
        Self {
            memory_budget: Some(bytes),
            ..Self::default()
        }
    }

    /// Read back flushed buffer contents
    pub fn read(&self, buffer: vk::Buffer, offset: u64, len: u64) -> Option<&[u8]> {
        let host = self.buffers.get(&buffer)?;
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        host.bytes.get(start..end)
    }

    /// Debug name a buffer was created with
    pub fn buffer_name(&self, buffer: vk::Buffer) -> Option<&str> {
        self.buffers.get(&buffer).map(|host| host.name.as_str())
    }

    /// Usage a buffer was created with
    pub fn buffer_usage(&self, buffer: vk::Buffer) -> Option<vk::BufferUsageFlags> {
        self.buffers.get(&buffer).map(|host| host.usage)
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Writes recorded but not yet flushed
    pub fn staged_writes(&self) -> usize {
        self.staged.len()
    }

    /// Bytes of buffer memory in use
    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    /// Counters since creation
    pub fn stats(&self) -> &HostDeviceStats {
        &self.stats
    }
}

impl GpuResourceFactory for HostDevice {
    fn create_buffer(
        &mut self,
        usage: vk::BufferUsageFlags,
        size: vk::DeviceSize,
        debug_name: &str,
    ) -> RenderResult<BufferResource> {
        if let Some(budget) = self.memory_budget {
            if self.memory_used + size > budget {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "{debug_name}: {size} bytes requested, {} of {budget} bytes left",
                    budget - self.memory_used
                )));
            }
        }
        let len = usize::try_from(size).map_err(|_| {
            RenderError::ResourceCreationFailed(format!("{debug_name}: {size} bytes does not fit host memory"))
        })?;

        // Raw handle 0 is VK_NULL_HANDLE, so start counting at 1.
        self.next_raw += 1;
        let raw = vk::Buffer::from_raw(self.next_raw);
        self.buffers.insert(
            raw,
            HostBuffer {
                name: debug_name.to_string(),
                usage,
                bytes: vec![0; len],
            },
        );
        self.memory_used += size;
        self.stats.buffers_created += 1;
        log::debug!("HostDevice: created buffer {debug_name} ({size} bytes, {usage:?})");

        Ok(BufferResource { raw, size, usage })
    }

    fn destroy_buffer(&mut self, buffer: BufferResource) {
        let Some(host) = self.buffers.remove(&buffer.raw) else {
            log::warn!("HostDevice: destroy of unknown buffer {:?}", buffer.raw);
            return;
        };
        self.staged.retain(|write| write.buffer != buffer.raw);
        self.memory_used -= host.bytes.len() as u64;
        self.stats.buffers_destroyed += 1;
        log::debug!("HostDevice: destroyed buffer {}", host.name);
    }
}

impl UploadContext for HostDevice {
    fn write(&mut self, request: UploadRequest<'_>) -> RenderResult<()> {
        let host = self
            .buffers
            .get(&request.buffer)
            .ok_or_else(|| RenderError::UploadFailed(format!("unknown buffer {:?}", request.buffer)))?;
        let offset = usize::try_from(request.offset)
            .map_err(|_| RenderError::UploadFailed(format!("offset {} out of range", request.offset)))?;
        if offset + request.data.len() > host.bytes.len() {
            return Err(RenderError::UploadFailed(format!(
                "write of {} bytes at {} overruns {} ({} bytes)",
                request.data.len(),
                offset,
                host.name,
                host.bytes.len()
            )));
        }

        self.staged.push(StagedWrite {
            buffer: request.buffer,
            offset,
            data: request.data.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self) -> RenderResult<()> {
        for write in self.staged.drain(..) {
            let host = self
                .buffers
                .get_mut(&write.buffer)
                .ok_or_else(|| RenderError::BackendError(format!("buffer {:?} vanished", write.buffer)))?;
            host.bytes[write.offset..write.offset + write.data.len()].copy_from_slice(&write.data);
            self.stats.bytes_uploaded += write.data.len() as u64;
        }
        self.stats.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_buffers_have_distinct_identities() {
        let mut device = HostDevice::new();
        let a = device.create_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, 64, "a").unwrap();
        let b = device.create_buffer(vk::BufferUsageFlags::INDEX_BUFFER, 64, "b").unwrap();

        assert_ne!(a.raw, b.raw);
        assert_ne!(a.raw, vk::Buffer::null());
        assert_eq!(device.buffer_name(b.raw), Some("b"));
        assert_eq!(device.buffer_usage(a.raw), Some(vk::BufferUsageFlags::VERTEX_BUFFER));
        assert_eq!(device.memory_used(), 128);
    }

    #[test]
    fn test_writes_land_only_after_flush() {
        let mut device = HostDevice::new();
        let buffer = device.create_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, 16, "vb").unwrap();
        device
            .write(UploadRequest {
                data: &[1, 2, 3, 4],
                buffer: buffer.raw,
                offset: 4,
                access: vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
                stage: vk::PipelineStageFlags::VERTEX_INPUT,
            })
            .unwrap();

        assert_eq!(device.read(buffer.raw, 4, 4), Some(&[0u8, 0, 0, 0][..]));
        device.flush().unwrap();
        assert_eq!(device.read(buffer.raw, 4, 4), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(device.stats().bytes_uploaded, 4);
    }

    #[test]
    fn test_out_of_bounds_write_is_rejected() {
        let mut device = HostDevice::new();
        let buffer = device.create_buffer(vk::BufferUsageFlags::INDEX_BUFFER, 8, "ib").unwrap();
        let result = device.write(UploadRequest {
            data: &[0; 12],
            buffer: buffer.raw,
            offset: 0,
            access: vk::AccessFlags::INDEX_READ,
            stage: vk::PipelineStageFlags::VERTEX_INPUT,
        });
        assert!(matches!(result, Err(RenderError::UploadFailed(_))));
    }

    #[test]
    fn test_memory_budget_refuses_large_buffers() {
        let mut device = HostDevice::with_memory_budget(100);
        assert!(device.create_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, 64, "fits").is_ok());
        let result = device.create_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, 64, "too big");
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
        assert_eq!(device.buffer_count(), 1);
    }

    #[test]
    fn test_destroy_returns_memory_and_drops_staged_writes() {
        let mut device = HostDevice::with_memory_budget(100);
        let first = device.create_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, 64, "first").unwrap();
        device
            .write(UploadRequest {
                data: &[7; 4],
                buffer: first.raw,
                offset: 0,
                access: vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
                stage: vk::PipelineStageFlags::VERTEX_INPUT,
            })
            .unwrap();

        device.destroy_buffer(first);
        assert_eq!(device.buffer_count(), 0);
        assert_eq!(device.memory_used(), 0);
        assert_eq!(device.staged_writes(), 0);
        assert_eq!(device.stats().buffers_destroyed, 1);

        // The freed budget is usable again
        assert!(device.create_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, 64, "second").is_ok());
        device.flush().unwrap();
    }
}
