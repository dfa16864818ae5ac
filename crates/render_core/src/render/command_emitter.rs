//! # Command Emitter
//!
//! Walks a culled node subset and records draw commands with as few state
//! changes as possible.
//!
//! ## Traversal
//!
//! ```text
//! pipeline → pass → drawable kind → face culling → geometry → nodes
//! ```
//!
//! - Pipeline and pass are bound lazily, right before their first draw, so a
//!   pipeline whose leaves are all empty is never bound
//! - Vertex and index buffers are re-bound only when the buffer changes
//! - Instanced kinds issue one draw per leaf; other kinds one draw per node
//!
//! Each draw's instances occupy a contiguous range of
//! [`EmittedFrame::instances`] starting at the draw's `first_instance`. The
//! frontend uploads the matching transforms into its instance buffer.

use crate::render::memory::{draw_param, INDEX_SIZE};
use crate::scene::{
    CulledSubset, DrawableKind, FaceCulling, GeometryBinding, PassId, PipelineId, RenderNode, RenderScene, TransformId,
};
use ash::vk;
use log::{trace, warn};

/// Receiver of the emitted commands, normally a command buffer wrapper
pub trait CommandSink {
    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&mut self, pipeline: PipelineId);

    /// Bind the per-pass state (descriptor sets, push constants) for a pipeline
    fn cmd_bind_pass(&mut self, pipeline: PipelineId, pass: PassId);

    /// Bind vertex buffers
    fn cmd_bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]);

    /// Bind index buffer
    fn cmd_bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType);

    /// Draw non-indexed
    fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    /// Draw indexed
    fn cmd_draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
}

/// One recorded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// `cmd_bind_pipeline`
    BindPipeline(PipelineId),
    /// `cmd_bind_pass`
    BindPass {
        /// Pipeline bound at the time
        pipeline: PipelineId,
        /// Pass bound
        pass: PassId,
    },
    /// `cmd_bind_vertex_buffers`
    BindVertexBuffers {
        /// First binding slot
        first_binding: u32,
        /// Buffers, one per slot
        buffers: Vec<vk::Buffer>,
        /// Byte offsets, one per slot
        offsets: Vec<vk::DeviceSize>,
    },
    /// `cmd_bind_index_buffer`
    BindIndexBuffer {
        /// Buffer bound
        buffer: vk::Buffer,
        /// Byte offset
        offset: vk::DeviceSize,
        /// Index width
        index_type: vk::IndexType,
    },
    /// `cmd_draw`
    Draw {
        /// Vertices per instance
        vertex_count: u32,
        /// Instances
        instance_count: u32,
        /// First vertex
        first_vertex: u32,
        /// First instance
        first_instance: u32,
    },
    /// `cmd_draw_indexed`
    DrawIndexed {
        /// Indices per instance
        index_count: u32,
        /// Instances
        instance_count: u32,
        /// First index
        first_index: u32,
        /// Added to every index
        vertex_offset: i32,
        /// First instance
        first_instance: u32,
    },
}

impl RecordedCommand {
    /// Whether this is a draw
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw { .. } | Self::DrawIndexed { .. })
    }
}

/// Sink that keeps every command, for tests and debugging tools
#[derive(Debug, Default, Clone)]
pub struct CommandRecorder {
    commands: Vec<RecordedCommand>,
}

impl CommandRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands in recording order
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Only the draws
    pub fn draws(&self) -> impl Iterator<Item = &RecordedCommand> {
        self.commands.iter().filter(|command| command.is_draw())
    }

    /// Take the commands, leaving the recorder empty
    pub fn take(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl CommandSink for CommandRecorder {
    fn cmd_bind_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::BindPipeline(pipeline));
    }

    fn cmd_bind_pass(&mut self, pipeline: PipelineId, pass: PassId) {
        self.commands.push(RecordedCommand::BindPass { pipeline, pass });
    }

    fn cmd_bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        self.commands.push(RecordedCommand::BindVertexBuffers {
            first_binding,
            buffers: buffers.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn cmd_bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        self.commands.push(RecordedCommand::BindIndexBuffer {
            buffer,
            offset,
            index_type,
        });
    }

    fn cmd_draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.commands.push(RecordedCommand::Draw {
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
        self.commands.push(RecordedCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
    }
}

/// Counters for one emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    /// Pipeline binds issued
    pub pipeline_binds: usize,
    /// Pass binds issued
    pub pass_binds: usize,
    /// Vertex and index buffer binds issued
    pub buffer_binds: usize,
    /// Draw calls issued
    pub draw_calls: usize,
    /// Instances drawn over all draws
    pub instances: usize,
}

/// Per-frame output beside the recorded commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmittedFrame {
    /// Transform of every drawn instance, addressed by `first_instance`
    pub instances: Vec<TransformId>,
    /// Counters
    pub stats: EmitStats,
}

#[derive(Debug, Default)]
struct BindState {
    vertex_buffer: Option<vk::Buffer>,
    index_buffer: Option<vk::Buffer>,
}

/// Turns a culled subset into commands on a [`CommandSink`]
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandEmitter;

impl CommandEmitter {
    /// Create an emitter
    pub fn new() -> Self {
        Self
    }

    /// Record every visible node of `culled`
    ///
    /// Leaves whose geometry is no longer in `scene` are skipped.
    pub fn emit(&self, culled: &CulledSubset, scene: &RenderScene, sink: &mut dyn CommandSink) -> EmittedFrame {
        let mut frame = EmittedFrame::default();
        let mut state = BindState::default();

        for pipeline in culled.pipelines() {
            let mut pipeline_bound = false;

            for pass in culled.passes(pipeline) {
                let mut pass_bound = false;

                for kind in DrawableKind::ALL {
                    for culling in FaceCulling::ALL {
                        let Some(geometries) = culled.geometries(kind, culling, pipeline, pass) else {
                            continue;
                        };

                        for (&geometry_id, nodes) in geometries {
                            if nodes.is_empty() {
                                continue;
                            }
                            let Some(geometry) = scene.geometry(geometry_id) else {
                                warn!("Skipping {} nodes of removed geometry {:?}", nodes.len(), geometry_id);
                                continue;
                            };
                            if Self::element_count(geometry) == 0 {
                                continue;
                            }

                            if !pipeline_bound {
                                sink.cmd_bind_pipeline(pipeline);
                                frame.stats.pipeline_binds += 1;
                                pipeline_bound = true;
                            }
                            if !pass_bound {
                                sink.cmd_bind_pass(pipeline, pass);
                                frame.stats.pass_binds += 1;
                                pass_bound = true;
                            }

                            Self::bind_buffers(geometry, &mut state, sink, &mut frame.stats);

                            if kind.is_instanced() {
                                Self::draw(geometry, nodes, sink, &mut frame);
                            } else {
                                for node in nodes {
                                    Self::draw(geometry, std::slice::from_ref(node), sink, &mut frame);
                                }
                            }
                        }
                    }
                }
            }
        }

        trace!(
            "Emitted {} draws ({} instances, {} pipeline binds, {} buffer binds)",
            frame.stats.draw_calls,
            frame.stats.instances,
            frame.stats.pipeline_binds,
            frame.stats.buffer_binds
        );
        frame
    }

    fn element_count(geometry: &GeometryBinding) -> u32 {
        if geometry.is_indexed() {
            geometry.index_count
        } else {
            geometry.vertex_count
        }
    }

    fn bind_buffers(geometry: &GeometryBinding, state: &mut BindState, sink: &mut dyn CommandSink, stats: &mut EmitStats) {
        let vertex_buffer = geometry.buffers.vertex.buffer.raw;
        if state.vertex_buffer != Some(vertex_buffer) {
            sink.cmd_bind_vertex_buffers(0, &[vertex_buffer], &[0]);
            state.vertex_buffer = Some(vertex_buffer);
            stats.buffer_binds += 1;
        }

        if !geometry.is_indexed() {
            return;
        }
        if let Some(index) = geometry.buffers.index {
            if state.index_buffer != Some(index.buffer.raw) {
                sink.cmd_bind_index_buffer(index.buffer.raw, 0, vk::IndexType::UINT32);
                state.index_buffer = Some(index.buffer.raw);
                stats.buffer_binds += 1;
            }
        }
    }

    fn draw(geometry: &GeometryBinding, nodes: &[RenderNode], sink: &mut dyn CommandSink, frame: &mut EmittedFrame) {
        let instance_count = draw_param(nodes.len() as u64, "instance count");
        let first_instance = draw_param(frame.instances.len() as u64, "first instance");
        let buffers = &geometry.buffers;

        match buffers.index {
            Some(index) if geometry.is_indexed() => {
                let vertex_offset = i32::try_from(buffers.vertex_offset()).unwrap_or_else(|_| {
                    warn!("vertex offset {} does not fit a draw parameter", buffers.vertex_offset());
                    i32::MAX
                });
                sink.cmd_draw_indexed(
                    geometry.index_count,
                    instance_count,
                    index.first_element(INDEX_SIZE),
                    vertex_offset,
                    first_instance,
                );
            }
            _ => {
                sink.cmd_draw(geometry.vertex_count, instance_count, buffers.vertex_offset(), first_instance);
            }
        }

        frame.instances.extend(nodes.iter().map(|node| node.transform));
        frame.stats.draw_calls += 1;
        frame.stats.instances += nodes.len();
    }
}
