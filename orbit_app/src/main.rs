//! Headless orbit demo
//!
//! Drives the full frame pipeline against the recording device: three
//! entities (an orbiting shadow-casting cube, a ground plane, a
//! translucent glass panel), per-frame transform updates fanned out to
//! the job pool, and a window resize halfway through the run.

use std::sync::{Arc, Mutex};

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

use prism_engine::prelude::*;

const FRAME_COUNT: u64 = 10;
const RESIZE_AT_FRAME: u64 = 5;

struct Scene {
    entities: EntityManager,
    components: Components,
    /// Length of the shadow-casting prefix in the component streams
    shadow_caster_count: usize,
    cube: Entity,
    glass: Entity,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RendererConfig::new()
        .with_max_frames_in_flight(2)
        .with_shadow_map_size(1024)
        .with_post_effect(
            "tonemap",
            ShaderPaths::new("shaders/fullscreen.vert.spv", "shaders/tonemap.frag.spv"),
        );
    let device = RecordingDevice::new(Extent2d::new(1280, 720));
    let mut renderer = Renderer::new(device, &config)?;

    let mut scene = build_scene(&mut renderer)?;
    let workers = std::thread::available_parallelism().map_or(2, |n| n.get().min(4));
    let pool = JobPool::new(workers);

    let light_view_proj = Matrix4::new_orthographic(-10.0, 10.0, -10.0, 10.0, 0.1, 50.0)
        * Matrix4::look_at_rh(
            &Point3::new(8.0, 12.0, 8.0),
            &Point3::origin(),
            &Vector3::y(),
        );

    for frame in 0..FRAME_COUNT {
        if frame == RESIZE_AT_FRAME {
            let extent = Extent2d::new(1600, 900);
            renderer.device_mut().set_surface_extent(extent);
            renderer.notify_resize(extent);
            log::info!("window resized to {}x{}", extent.width, extent.height);
        }

        let time = frame as f32 * (1.0 / 60.0);
        update_transforms(&pool, &mut scene, time);

        let extent = renderer.target_extent();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let camera_view_proj =
            Matrix4::new_perspective(aspect, std::f32::consts::FRAC_PI_4, 0.1, 100.0)
                * Matrix4::look_at_rh(
                    &Point3::new(0.0, 4.0, 10.0),
                    &Point3::origin(),
                    &Vector3::y(),
                );

        let submission = FrameSubmission {
            meshes: scene.components.meshes().components(),
            materials: scene.components.materials().components(),
            transforms: scene.components.transforms().components(),
            shadow_caster_count: scene.shadow_caster_count,
            light_view_proj,
            camera_view_proj,
        };

        let stats = renderer.submit_frame(&submission)?;
        log::info!(
            "frame {}: presented={} instances={} draws={} state_changes={}",
            stats.frame_index,
            stats.presented,
            stats.instances,
            stats.draws,
            stats.state_changes,
        );
    }

    renderer.shutdown()?;
    log::info!("demo finished with {} live entities", scene.entities.live_count());
    Ok(())
}

/// Create the three demo entities, in submission order: shadow casters
/// first, then the remaining opaque geometry, translucent last
fn build_scene<D: GpuDevice>(renderer: &mut Renderer<D>) -> Result<Scene, RenderError> {
    let mut entities = EntityManager::new();
    let mut components = Components::new();

    let mesh_shader = renderer.create_shader("shaders/mesh.vert.spv", "shaders/mesh.frag.spv")?;
    let glass_shader =
        renderer.create_shader("shaders/glass.vert.spv", "shaders/glass.frag.spv")?;

    let cube_mesh = renderer.create_mesh_component("assets/models/cube.obj")?;
    let plane_mesh = renderer.create_mesh_component("assets/models/plane.obj")?;
    let panel_mesh = renderer.create_mesh_component("assets/models/panel.obj")?;

    let stone = renderer.create_texture("assets/textures/stone.png")?;
    let stone_descriptor = renderer.create_material_descriptor(mesh_shader, &[stone])?;
    let glass_descriptor = renderer.create_material_descriptor(glass_shader, &[])?;

    let cube = entities.create();
    components.add_component(cube, cube_mesh)?;
    components.add_component(cube, MaterialComponent::opaque(mesh_shader, stone_descriptor))?;
    components.add_component(cube, TransformComponent::identity())?;

    let ground = entities.create();
    let mut ground_material = MaterialComponent::opaque(mesh_shader, stone_descriptor);
    ground_material.capabilities -= prism_engine::ecs::MaterialCapabilities::CASTS_SHADOWS;
    components.add_component(ground, plane_mesh)?;
    components.add_component(ground, ground_material)?;
    components.add_component(
        ground,
        TransformComponent::new(
            Vector3::new(0.0, -1.0, 0.0),
            UnitQuaternion::identity(),
            Vector3::new(10.0, 1.0, 10.0),
        ),
    )?;

    let glass = entities.create();
    components.add_component(glass, panel_mesh)?;
    components.add_component(
        glass,
        MaterialComponent::translucent(glass_shader, glass_descriptor),
    )?;
    components.add_component(glass, TransformComponent::identity())?;

    log::info!("scene built: {} entities", entities.live_count());
    Ok(Scene {
        entities,
        components,
        shadow_caster_count: 1,
        cube,
        glass,
    })
}

/// What an animated entity does each frame
#[derive(Clone, Copy)]
enum Animation {
    Orbit,
    Spin,
}

/// Fan the per-entity transform computation out to the pool, join, and
/// write the results back into component storage
///
/// The ground plane is static and never gets a job.
fn update_transforms(pool: &JobPool, scene: &mut Scene, time: f32) {
    let updates: Arc<Mutex<Vec<(Entity, TransformComponent)>>> =
        Arc::new(Mutex::new(Vec::new()));

    for (entity, animation) in [(scene.cube, Animation::Orbit), (scene.glass, Animation::Spin)] {
        let updates = Arc::clone(&updates);
        if let Err(e) = pool.dispatch(move || {
            let transform = animate(animation, time);
            if let Ok(mut pending) = updates.lock() {
                pending.push((entity, transform));
            }
        }) {
            log::warn!("transform job dropped: {e}");
        }
    }
    pool.join_epoch();

    let Ok(computed) = updates.lock() else {
        return;
    };
    for &(entity, transform) in computed.iter() {
        if let Err(e) = scene.components.set_component(entity, transform) {
            log::warn!("transform update for entity {} failed: {e}", entity.id());
        }
    }
}

fn animate(animation: Animation, time: f32) -> TransformComponent {
    match animation {
        Animation::Orbit => {
            let angle = time * std::f32::consts::TAU * 0.25;
            TransformComponent::new(
                Vector3::new(angle.cos() * 4.0, 1.0, angle.sin() * 4.0),
                UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle),
                Vector3::new(1.0, 1.0, 1.0),
            )
        }
        Animation::Spin => TransformComponent::new(
            Vector3::new(0.0, 1.5, -2.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), time * 0.5),
            Vector3::new(2.0, 2.0, 0.1),
        ),
    }
}
