//! # Indirect Command Building
//!
//! A [`CommandSink`] that turns draws into indirect command records instead
//! of issuing them. Consecutive draws sharing pipeline, pass and buffers land
//! in one [`IndirectBatch`], which the backend replays with a single
//! `vkCmdDrawIndexedIndirect` / `vkCmdDrawIndirect` per batch.

use super::command_emitter::CommandSink;
use crate::scene::{PassId, PipelineId};
use ash::vk;

/// Byte size of one `VkDrawIndexedIndirectCommand`
pub const DRAW_INDEXED_INDIRECT_SIZE: usize = 20;

/// Byte size of one `VkDrawIndirectCommand`
pub const DRAW_INDIRECT_SIZE: usize = 16;

/// Draws that can be replayed under one set of bindings
#[derive(Debug, Clone)]
pub struct IndirectBatch {
    /// Pipeline bound for the batch
    pub pipeline: PipelineId,
    /// Pass bound for the batch
    pub pass: PassId,
    /// Vertex buffer bound at binding 0
    pub vertex_buffer: Option<vk::Buffer>,
    /// Index buffer bound for indexed draws
    pub index_buffer: Option<vk::Buffer>,
    /// Indexed draws
    pub indexed: Vec<vk::DrawIndexedIndirectCommand>,
    /// Non-indexed draws
    pub non_indexed: Vec<vk::DrawIndirectCommand>,
}

impl IndirectBatch {
    fn matches(&self, key: &BatchKey) -> bool {
        self.pipeline == key.pipeline
            && self.pass == key.pass
            && self.vertex_buffer == key.vertex_buffer
            && self.index_buffer == key.index_buffer
    }

    /// Draws in the batch
    pub fn draw_count(&self) -> usize {
        self.indexed.len() + self.non_indexed.len()
    }

    /// Indexed draws as bytes, laid out for an indirect buffer
    pub fn indexed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.indexed.len() * DRAW_INDEXED_INDIRECT_SIZE);
        for command in &self.indexed {
            bytes.extend_from_slice(&command.index_count.to_ne_bytes());
            bytes.extend_from_slice(&command.instance_count.to_ne_bytes());
            bytes.extend_from_slice(&command.first_index.to_ne_bytes());
            bytes.extend_from_slice(&command.vertex_offset.to_ne_bytes());
            bytes.extend_from_slice(&command.first_instance.to_ne_bytes());
        }
        bytes
    }

    /// Non-indexed draws as bytes, laid out for an indirect buffer
    pub fn non_indexed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.non_indexed.len() * DRAW_INDIRECT_SIZE);
        for command in &self.non_indexed {
            bytes.extend_from_slice(&command.vertex_count.to_ne_bytes());
            bytes.extend_from_slice(&command.instance_count.to_ne_bytes());
            bytes.extend_from_slice(&command.first_vertex.to_ne_bytes());
            bytes.extend_from_slice(&command.first_instance.to_ne_bytes());
        }
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchKey {
    pipeline: PipelineId,
    pass: PassId,
    vertex_buffer: Option<vk::Buffer>,
    index_buffer: Option<vk::Buffer>,
}

/// Collects draws into indirect batches
#[derive(Debug, Default)]
pub struct IndirectCommandBuilder {
    pipeline: Option<PipelineId>,
    pass: Option<PassId>,
    vertex_buffer: Option<vk::Buffer>,
    index_buffer: Option<vk::Buffer>,
    batches: Vec<IndirectBatch>,
}

impl IndirectCommandBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches in recording order
    pub fn batches(&self) -> &[IndirectBatch] {
        &self.batches
    }

    /// Draws over all batches
    pub fn draw_count(&self) -> usize {
        self.batches.iter().map(IndirectBatch::draw_count).sum()
    }

    /// Drop all batches and bindings, ready for the next frame
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Batch for the current bindings. Bindings only stick to a batch when a
    /// draw is recorded under them.
    fn current_batch(&mut self, indexed: bool) -> &mut IndirectBatch {
        let (Some(pipeline), Some(pass)) = (self.pipeline, self.pass) else {
            panic!("indirect draw recorded before a pipeline and pass were bound");
        };
        let key = BatchKey {
            pipeline,
            pass,
            vertex_buffer: self.vertex_buffer,
            index_buffer: if indexed { self.index_buffer } else { None },
        };

        let reuse = self.batches.last().is_some_and(|batch| batch.matches(&key));
        if !reuse {
            self.batches.push(IndirectBatch {
                pipeline,
                pass,
                vertex_buffer: key.vertex_buffer,
                index_buffer: key.index_buffer,
                indexed: Vec::new(),
                non_indexed: Vec::new(),
            });
        }
        let last = self.batches.len() - 1;
        &mut self.batches[last]
    }
}

impl CommandSink for IndirectCommandBuilder {
    fn cmd_bind_pipeline(&mut self, pipeline: PipelineId) {
        self.pipeline = Some(pipeline);
        self.pass = None;
    }

    fn cmd_bind_pass(&mut self, pipeline: PipelineId, pass: PassId) {
        self.pipeline = Some(pipeline);
        self.pass = Some(pass);
    }

    fn cmd_bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], _offsets: &[vk::DeviceSize]) {
        if first_binding == 0 {
            self.vertex_buffer = buffers.first().copied();
        }
    }

    fn cmd_bind_index_buffer(&mut self, buffer: vk::Buffer, _offset: vk::DeviceSize, _index_type: vk::IndexType) {
        self.index_buffer = Some(buffer);
    }

    fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.current_batch(false).non_indexed.push(vk::DrawIndirectCommand {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn cmd_draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.current_batch(true).indexed.push(vk::DrawIndexedIndirectCommand {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }
}
