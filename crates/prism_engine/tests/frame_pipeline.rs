//! End-to-end frame pipeline tests against the recording device

use nalgebra::Matrix4;

use prism_engine::config::{RendererConfig, ShaderPaths};
use prism_engine::ecs::{
    GeometryKind, MaterialComponent, MeshComponent, TransformComponent,
};
use prism_engine::render::{
    BufferHandle, DescriptorId, DeviceEvent, Extent2d, FrameSubmission, RecordingDevice, Renderer,
    ResizeState, ResourceKind, ShaderId,
};

fn mesh(id: i32) -> MeshComponent {
    MeshComponent {
        vertex_buffer: BufferHandle(1000 + id * 2),
        index_buffer: BufferHandle(1001 + id * 2),
        index_count: 36,
        geometry: GeometryKind::Triangles,
    }
}

/// One shadow-casting opaque entity, one non-casting opaque entity, one
/// translucent entity, already in submission order (caster prefix first).
fn three_entity_scene() -> (Vec<MeshComponent>, Vec<MaterialComponent>, Vec<TransformComponent>) {
    let meshes = vec![mesh(0), mesh(1), mesh(2)];
    let mut plain = MaterialComponent::opaque(ShaderId(900), DescriptorId(901));
    plain.capabilities -= prism_engine::ecs::MaterialCapabilities::CASTS_SHADOWS;
    let materials = vec![
        MaterialComponent::opaque(ShaderId(900), DescriptorId(900)),
        plain,
        MaterialComponent::translucent(ShaderId(902), DescriptorId(902)),
    ];
    let transforms = vec![TransformComponent::identity(); 3];
    (meshes, materials, transforms)
}

fn submission<'a>(
    meshes: &'a [MeshComponent],
    materials: &'a [MaterialComponent],
    transforms: &'a [TransformComponent],
) -> FrameSubmission<'a> {
    FrameSubmission {
        meshes,
        materials,
        transforms,
        shadow_caster_count: 1,
        light_view_proj: Matrix4::identity(),
        camera_view_proj: Matrix4::identity(),
    }
}

fn pass_labels(device: &RecordingDevice) -> Vec<&'static str> {
    device
        .events()
        .iter()
        .filter_map(|event| match event {
            DeviceEvent::BeginPass { label, .. } => Some(*label),
            _ => None,
        })
        .collect()
}

#[test]
fn test_frame_records_passes_in_program_order() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();
    renderer.device_mut().clear_events();

    let (meshes, materials, transforms) = three_entity_scene();
    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();

    assert!(stats.presented);
    assert_eq!(stats.instances, 3);
    // Shadow (1 run) + opaque (2 runs) + translucent (1 run) + the
    // lighting full-screen resolve.
    assert_eq!(stats.draws, 5);

    assert_eq!(pass_labels(renderer.device()), vec!["shadow", "geometry", "lighting"]);

    let draws: Vec<(u32, u32)> = renderer
        .device()
        .events()
        .iter()
        .filter_map(|event| match event {
            DeviceEvent::DrawInstanced {
                first_instance,
                instance_count,
            } => Some((*first_instance, *instance_count)),
            _ => None,
        })
        .collect();
    // Shadow draws only the caster prefix; geometry draws both opaque
    // entities as separate key runs; the translucent entity is forward
    // drawn last with its submission index as instance start.
    assert_eq!(draws, vec![(0, 1), (0, 1), (1, 1), (2, 1)]);

    let fullscreen = renderer
        .device()
        .events()
        .iter()
        .filter(|event| matches!(event, DeviceEvent::DrawFullscreen))
        .count();
    assert_eq!(fullscreen, 1);

    renderer.shutdown().unwrap();
}

#[test]
fn test_translucent_draw_follows_lighting_resolve() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();
    renderer.device_mut().clear_events();

    let (meshes, materials, transforms) = three_entity_scene();
    renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();

    let events = renderer.device().events();
    let resolve = events
        .iter()
        .position(|event| matches!(event, DeviceEvent::DrawFullscreen))
        .unwrap();
    let forward = events
        .iter()
        .position(|event| {
            matches!(
                event,
                DeviceEvent::DrawInstanced {
                    first_instance: 2,
                    ..
                }
            )
        })
        .unwrap();
    assert!(resolve < forward);

    renderer.shutdown().unwrap();
}

#[test]
fn test_frame_pacing_waits_only_on_slot_reuse() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let config = RendererConfig::default().with_max_frames_in_flight(2);
    let mut renderer = Renderer::new(device, &config).unwrap();
    renderer.device_mut().clear_events();

    let (meshes, materials, transforms) = three_entity_scene();
    for _ in 0..6 {
        let stats = renderer
            .submit_frame(&submission(&meshes, &materials, &transforms))
            .unwrap();
        assert!(stats.presented);
    }
    assert_eq!(renderer.frame_index(), 6);

    // The first two frames find fresh slots; every later frame must wait
    // for the frame that used its slot two frames earlier.
    let waits = renderer
        .device()
        .events()
        .iter()
        .filter(|event| matches!(event, DeviceEvent::WaitFence(_)))
        .count();
    assert_eq!(waits, 4);

    renderer.shutdown().unwrap();
}

#[test]
fn test_out_of_date_acquire_skips_then_rebuilds() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();
    let (meshes, materials, transforms) = three_entity_scene();

    renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();

    renderer.device_mut().force_out_of_date_on_acquire();
    renderer.device_mut().set_surface_extent(Extent2d::new(1920, 1080));

    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();
    assert!(!stats.presented);
    assert_eq!(renderer.resize_state(), ResizeState::Draining);

    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();
    assert!(stats.presented);
    assert_eq!(renderer.resize_state(), ResizeState::Normal);
    assert_eq!(renderer.target_extent(), Extent2d::new(1920, 1080));

    renderer.shutdown().unwrap();
    let device = renderer.device();
    for kind in [
        ResourceKind::Attachment,
        ResourceKind::Framebuffer,
        ResourceKind::Semaphore,
        ResourceKind::Fence,
        ResourceKind::CommandBuffer,
        ResourceKind::Descriptor,
    ] {
        assert_eq!(device.live(kind), 0, "leaked {kind:?}");
    }
}

#[test]
fn test_explicit_resize_rebuilds_at_reported_extent() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();
    let (meshes, materials, transforms) = three_entity_scene();

    renderer.notify_resize(Extent2d::new(640, 360));
    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();
    assert!(stats.presented);
    assert_eq!(renderer.target_extent(), Extent2d::new(640, 360));

    renderer.shutdown().unwrap();
}

#[test]
fn test_zero_extent_window_skips_frames_until_restored() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();
    let (meshes, materials, transforms) = three_entity_scene();

    renderer.notify_resize(Extent2d::new(0, 0));
    for _ in 0..3 {
        let stats = renderer
            .submit_frame(&submission(&meshes, &materials, &transforms))
            .unwrap();
        assert!(!stats.presented);
        assert_eq!(renderer.resize_state(), ResizeState::Draining);
    }

    renderer.notify_resize(Extent2d::new(800, 600));
    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();
    assert!(stats.presented);
    assert_eq!(renderer.resize_state(), ResizeState::Normal);
    assert_eq!(renderer.target_extent(), Extent2d::new(800, 600));

    renderer.shutdown().unwrap();
}

#[test]
fn test_suboptimal_present_schedules_rebuild_without_dropping_frame() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();
    let (meshes, materials, transforms) = three_entity_scene();

    renderer.device_mut().force_suboptimal_on_present();
    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();
    assert!(stats.presented);
    assert_eq!(renderer.resize_state(), ResizeState::Draining);

    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();
    assert!(stats.presented);
    assert_eq!(renderer.resize_state(), ResizeState::Normal);

    renderer.shutdown().unwrap();
}

#[test]
fn test_post_chain_appends_fullscreen_passes() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let config = RendererConfig::default()
        .with_post_effect(
            "bloom",
            ShaderPaths::new("shaders/fs.vert.spv", "shaders/bloom.frag.spv"),
        )
        .with_post_effect(
            "tonemap",
            ShaderPaths::new("shaders/fs.vert.spv", "shaders/tonemap.frag.spv"),
        );
    let mut renderer = Renderer::new(device, &config).unwrap();
    renderer.device_mut().clear_events();

    let (meshes, materials, transforms) = three_entity_scene();
    let stats = renderer
        .submit_frame(&submission(&meshes, &materials, &transforms))
        .unwrap();

    assert_eq!(
        pass_labels(renderer.device()),
        vec!["shadow", "geometry", "lighting", "post", "post"]
    );
    let fullscreen = renderer
        .device()
        .events()
        .iter()
        .filter(|event| matches!(event, DeviceEvent::DrawFullscreen))
        .count();
    assert_eq!(fullscreen, 3);
    assert_eq!(stats.draws, 4 + 3);

    renderer.shutdown().unwrap();
}

#[test]
fn test_empty_scene_still_presents() {
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &RendererConfig::default()).unwrap();

    let stats = renderer
        .submit_frame(&submission(&[], &[], &[]))
        .unwrap();
    assert!(stats.presented);
    assert_eq!(stats.instances, 0);
    // The lighting resolve always runs.
    assert_eq!(stats.draws, 1);

    renderer.shutdown().unwrap();
}
