//! Whole-frame scenarios: pools → scene → queue → cull → emit

use super::SequentialPipelines;
use crate::config::{PoolConfig, QueueConfig};
use crate::foundation::logging;
use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::render::command_emitter::{CommandRecorder, RecordedCommand};
use crate::render::gpu::HostDevice;
use crate::render::indirect::IndirectCommandBuilder;
use crate::render::memory::{ObjectBufferPool, ObjectRequest, SubmeshComponents};
use crate::scene::{
    BoundingSphere, DrawableDesc, DrawableId, FrustumCuller, GeometryBinding, GeometryId, PassDesc, PassId,
    PipelineId, RenderMode, RenderQueue, RenderScene, TransformId, Viewpoint,
};
use std::collections::HashSet;

struct World {
    device: HostDevice,
    pool: ObjectBufferPool,
    scene: RenderScene,
}

impl World {
    fn new() -> Self {
        logging::init_for_tests();
        Self {
            device: HostDevice::new(),
            pool: ObjectBufferPool::new("meshes", &PoolConfig::default()),
            scene: RenderScene::new(),
        }
    }

    fn quad(&mut self) -> GeometryId {
        let handle = self
            .pool
            .get_buffer(&mut self.device, ObjectRequest::new(4, 6), SubmeshComponents::standard())
            .unwrap()
            .unwrap();
        self.pool.write_indices(&handle, &[0, 1, 2, 2, 3, 0]);
        self.scene.add_geometry(GeometryBinding::indexed(handle, 4, 6))
    }

    fn place(&mut self, geometry: GeometryId, slot: u32, pass: PassDesc) -> DrawableId {
        self.scene
            .add_drawable(DrawableDesc::new(geometry, TransformId(slot)).with_pass(pass))
    }
}

fn camera() -> Viewpoint {
    let eye = Point3::new(0.0, 0.0, 10.0);
    let projection = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_4, 0.1, 100.0);
    let view = Mat4::look_at_rh(&eye, &Point3::origin(), &Vec3::y());
    Viewpoint::new(projection * view, eye.coords)
}

#[test]
fn test_two_of_three_visible_nodes_are_drawn() {
    let mut world = World::new();
    let pass = PassDesc::opaque(PassId(4));
    let drawables: Vec<_> = (0..3)
        .map(|slot| {
            let geometry = world.quad();
            world.place(geometry, slot, pass)
        })
        .collect();
    world.pool.upload(&mut world.device).unwrap();

    let mut pipelines = SequentialPipelines::default();
    let mut queue = RenderQueue::new(true, RenderMode::MainView, &QueueConfig::default());
    let visible: HashSet<_> = [drawables[0], drawables[2]].into_iter().collect();
    let culled = queue.update(&world.scene, &mut pipelines, &visible, &Viewpoint::default());
    assert_eq!(culled.node_count(), 2);

    let mut recorder = CommandRecorder::new();
    let frame = queue.emit(&world.scene, &mut recorder);

    // All three quads share one (pipeline, pass): bound once each
    assert_eq!(pipelines.count(), 1);
    assert_eq!(frame.stats.pipeline_binds, 1);
    assert_eq!(frame.stats.pass_binds, 1);
    assert_eq!(frame.stats.draw_calls, 2);
    assert_eq!(recorder.draws().count(), 2);
    assert_eq!(frame.instances, vec![TransformId(0), TransformId(2)]);

    // Quads sit back to back in one slab, so the second visible draw starts
    // two quads further in
    let first_indices: Vec<_> = recorder
        .draws()
        .filter_map(|command| match command {
            RecordedCommand::DrawIndexed {
                first_index,
                vertex_offset,
                ..
            } => Some((*first_index, *vertex_offset)),
            _ => None,
        })
        .collect();
    assert_eq!(first_indices, vec![(0, 0), (16, 8)]);
    assert_eq!(recorder.commands().len(), 6);
}

#[test]
fn test_frustum_culled_instances_collapse_into_one_indirect_draw() {
    let mut world = World::new();
    let quad = world.quad();
    let pass = PassDesc::opaque(PassId(0));
    let mut culler = FrustumCuller::new();

    // Five copies along x; only the three nearest the axis are in view
    for (slot, x) in [-40.0f32, -2.0, 0.0, 2.0, 40.0].into_iter().enumerate() {
        let slot = u32::try_from(slot).unwrap();
        let drawable = world.place(quad, slot, pass);
        culler.set_local_bounds(
            drawable,
            BoundingSphere::new(Vec3::zeros(), 1.0),
            &Mat4::new_translation(&Vec3::new(x, 0.0, 0.0)),
        );
    }

    let mut queue = RenderQueue::new(true, RenderMode::MainView, &QueueConfig::default());
    let culled = queue.update(&world.scene, &mut SequentialPipelines::default(), &culler, &camera());
    assert_eq!(culled.node_count(), 3);
    assert_eq!(queue.cull_stats().total_nodes, 5);

    let mut builder = IndirectCommandBuilder::new();
    let frame = queue.emit(&world.scene, &mut builder);

    assert_eq!(builder.batches().len(), 1);
    let batch = &builder.batches()[0];
    assert_eq!(batch.indexed.len(), 1);
    assert_eq!(batch.indexed[0].instance_count, 3);
    assert_eq!(batch.indexed[0].index_count, 6);
    assert_eq!(frame.instances, vec![TransformId(1), TransformId(2), TransformId(3)]);
}

#[test]
fn test_blended_two_sided_pass_draws_back_faces_first() {
    let mut world = World::new();
    let quad = world.quad();
    let glass = world.place(quad, 0, PassDesc::blended(PassId(1)).with_two_sided(true));

    let mut pipelines = SequentialPipelines::default();
    let mut opaque = RenderQueue::new(true, RenderMode::MainView, &QueueConfig::default());
    let mut blended = RenderQueue::new(false, RenderMode::MainView, &QueueConfig::default());
    let visible: HashSet<_> = [glass].into_iter().collect();

    assert!(opaque
        .update(&world.scene, &mut pipelines, &visible, &Viewpoint::default())
        .is_empty());
    assert_eq!(
        blended
            .update(&world.scene, &mut pipelines, &visible, &Viewpoint::default())
            .node_count(),
        2
    );

    let mut recorder = CommandRecorder::new();
    let frame = blended.emit(&world.scene, &mut recorder);

    // Front-culled variant got the first pipeline id, so it is drawn first
    assert_eq!(frame.stats.pipeline_binds, 2);
    assert_eq!(recorder.commands()[0], RecordedCommand::BindPipeline(PipelineId(0)));
    assert_eq!(frame.stats.draw_calls, 2);
    assert_eq!(frame.stats.buffer_binds, 2);
}

#[test]
fn test_unregistered_drawable_disappears_next_frame() {
    let mut world = World::new();
    let quad = world.quad();
    let pass = PassDesc::opaque(PassId(0));
    let first = world.place(quad, 0, pass);
    let second = world.place(quad, 1, pass);

    let mut pipelines = SequentialPipelines::default();
    let mut queue = RenderQueue::new(true, RenderMode::MainView, &QueueConfig::default());
    let everyone: HashSet<_> = [first, second].into_iter().collect();

    queue.update(&world.scene, &mut pipelines, &everyone, &Viewpoint::default());
    assert_eq!(queue.emit(&world.scene, &mut CommandRecorder::new()).stats.instances, 2);

    world.scene.remove_drawable(second);
    queue.update(&world.scene, &mut pipelines, &everyone, &Viewpoint::default());
    let frame = queue.emit(&world.scene, &mut CommandRecorder::new());

    assert_eq!(frame.stats.instances, 1);
    assert_eq!(frame.instances, vec![TransformId(0)]);
}
