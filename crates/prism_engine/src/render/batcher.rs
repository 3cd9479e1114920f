//! Draw batching
//!
//! Collapses the pre-sorted per-entity (mesh, material) streams into
//! maximal runs sharing (shader, descriptor, mesh) state, one instanced
//! draw per run. The caller's sort guarantees shadow casters form a
//! contiguous prefix and key-identical entries within a layer are
//! contiguous; the batcher's job is only to find the run boundaries in
//! one linear pass. The number of emitted runs equals the number of key
//! transitions, which is exactly the minimum number of draws.

use super::handles::{BufferHandle, DescriptorId, ShaderId};
use crate::ecs::{MaterialComponent, MeshComponent, RenderLayer};

/// The state tuple a draw batch shares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchKey {
    /// Shader pipeline
    pub shader: ShaderId,
    /// Descriptor set
    pub descriptor: DescriptorId,
    /// Mesh vertex buffer
    pub vertex_buffer: BufferHandle,
    /// Mesh index buffer
    pub index_buffer: BufferHandle,
}

impl BatchKey {
    fn of(material: &MaterialComponent, mesh: &MeshComponent) -> Self {
        Self {
            shader: material.shader,
            descriptor: material.descriptor,
            vertex_buffer: mesh.vertex_buffer,
            index_buffer: mesh.index_buffer,
        }
    }
}

/// A maximal contiguous run of key-identical entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRun {
    /// Index of the run's first entity in the submitted stream; doubles
    /// as the instance-start the vertex shader uses to fetch transforms
    pub start: u32,
    /// Number of entities (instances) in the run
    pub count: u32,
    /// Shared state of the run
    pub key: BatchKey,
}

/// The three per-phase run lists of one frame
#[derive(Debug, Default)]
pub struct FrameBatches {
    /// Runs drawn into the shadow map (shadow-casting prefix only)
    pub shadow: Vec<BatchRun>,
    /// Opaque-layer runs for the deferred geometry pass
    pub opaque: Vec<BatchRun>,
    /// Translucent-layer runs for the forward sub-step, caller-sorted
    /// back-to-front
    pub translucent: Vec<BatchRun>,
}

impl FrameBatches {
    /// Total number of instanced draws this frame will issue
    pub fn draw_count(&self) -> usize {
        self.shadow.len() + self.opaque.len() + self.translucent.len()
    }
}

/// Accumulates one phase's runs during the linear pass
#[derive(Debug, Default)]
struct RunBuilder {
    runs: Vec<BatchRun>,
    current: Option<BatchRun>,
}

impl RunBuilder {
    /// Extend the current run or start a new one
    ///
    /// A new run starts on a key change or on a gap in the index stream
    /// (an interleaved entity that belongs to another phase or has no
    /// geometry), so an opaque interlude always splits translucent runs
    /// even when the keys around it match.
    fn push(&mut self, index: u32, key: BatchKey) {
        if let Some(run) = &mut self.current {
            if run.key == key && run.start + run.count == index {
                run.count += 1;
                return;
            }
        }
        self.break_run();
        self.current = Some(BatchRun {
            start: index,
            count: 1,
            key,
        });
    }

    fn break_run(&mut self) {
        if let Some(run) = self.current.take() {
            self.runs.push(run);
        }
    }

    fn finish(mut self) -> Vec<BatchRun> {
        // The final run is emitted unconditionally, single-element runs
        // included.
        self.break_run();
        self.runs
    }
}

/// Turns sorted component streams into minimal instanced-draw runs
#[derive(Debug, Default)]
pub struct DrawBatcher;

impl DrawBatcher {
    /// Create a batcher
    pub fn new() -> Self {
        Self
    }

    /// Batch one frame's parallel mesh/material streams
    ///
    /// `shadow_caster_count` is the length of the caller-sorted
    /// shadow-casting prefix; entries past it never reach the shadow
    /// list, even mid-run. Entities without geometry contribute no draws
    /// and terminate any run they interrupt.
    pub fn batch(
        &self,
        meshes: &[MeshComponent],
        materials: &[MaterialComponent],
        shadow_caster_count: usize,
    ) -> FrameBatches {
        debug_assert_eq!(meshes.len(), materials.len());

        let mut shadow = RunBuilder::default();
        let mut opaque = RunBuilder::default();
        let mut translucent = RunBuilder::default();

        for (i, (mesh, material)) in meshes.iter().zip(materials).enumerate() {
            if !mesh.has_geometry() {
                continue;
            }
            let index = i as u32;
            let key = BatchKey::of(material, mesh);

            if i < shadow_caster_count && material.casts_shadows() {
                shadow.push(index, key);
            }
            match material.layer {
                RenderLayer::Opaque => opaque.push(index, key),
                RenderLayer::Translucent => translucent.push(index, key),
            }
        }

        FrameBatches {
            shadow: shadow.finish(),
            opaque: opaque.finish(),
            translucent: translucent.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::GeometryKind;

    fn mesh(id: i32) -> MeshComponent {
        MeshComponent {
            vertex_buffer: BufferHandle(id * 2),
            index_buffer: BufferHandle(id * 2 + 1),
            index_count: 36,
            geometry: GeometryKind::Triangles,
        }
    }

    fn opaque_mat(shader: u32) -> MaterialComponent {
        MaterialComponent::opaque(ShaderId(shader), DescriptorId(shader))
    }

    #[test]
    fn test_empty_input_emits_no_runs() {
        let batches = DrawBatcher::new().batch(&[], &[], 0);
        assert_eq!(batches.draw_count(), 0);
    }

    #[test]
    fn test_runs_are_maximal_not_merged() {
        // Keys A A A B B A must yield three runs [3, 2, 1], never two.
        let meshes = vec![mesh(0); 6];
        let materials = vec![
            opaque_mat(0),
            opaque_mat(0),
            opaque_mat(0),
            opaque_mat(1),
            opaque_mat(1),
            opaque_mat(0),
        ];
        let batches = DrawBatcher::new().batch(&meshes, &materials, 0);
        let counts: Vec<u32> = batches.opaque.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        let starts: Vec<u32> = batches.opaque.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 3, 5]);
    }

    #[test]
    fn test_single_element_final_run_is_emitted() {
        let meshes = vec![mesh(0)];
        let materials = vec![opaque_mat(0)];
        let batches = DrawBatcher::new().batch(&meshes, &materials, 1);
        assert_eq!(batches.opaque.len(), 1);
        assert_eq!(batches.shadow.len(), 1);
        assert_eq!(batches.opaque[0].count, 1);
    }

    #[test]
    fn test_shadow_prefix_boundary_cuts_mid_run() {
        // Four key-identical entities, but only the first two are in the
        // shadow-casting prefix: the shadow run must stop at the boundary.
        let meshes = vec![mesh(0); 4];
        let materials = vec![opaque_mat(0); 4];
        let batches = DrawBatcher::new().batch(&meshes, &materials, 2);
        assert_eq!(batches.shadow.len(), 1);
        assert_eq!(batches.shadow[0].count, 2);
        // The geometry pass still sees all four as one run.
        assert_eq!(batches.opaque.len(), 1);
        assert_eq!(batches.opaque[0].count, 4);
    }

    #[test]
    fn test_layer_change_always_starts_new_run() {
        // Same key throughout, but the middle entity is translucent: the
        // opaque run must split and the translucent entity stands alone.
        let meshes = vec![mesh(0); 3];
        let shader = ShaderId(0);
        let descriptor = DescriptorId(0);
        let mut glass = MaterialComponent::translucent(shader, descriptor);
        glass.shader = shader;
        let materials = vec![
            MaterialComponent::opaque(shader, descriptor),
            glass,
            MaterialComponent::opaque(shader, descriptor),
        ];
        let batches = DrawBatcher::new().batch(&meshes, &materials, 0);
        assert_eq!(batches.opaque.len(), 2);
        assert_eq!(batches.translucent.len(), 1);
        assert_eq!(batches.opaque[0].count, 1);
        assert_eq!(batches.opaque[1].count, 1);
    }

    #[test]
    fn test_geometryless_entities_contribute_nothing_and_split_runs() {
        let meshes = vec![mesh(0), MeshComponent::EMPTY, mesh(0)];
        let materials = vec![opaque_mat(0); 3];
        let batches = DrawBatcher::new().batch(&meshes, &materials, 0);
        // The hole splits what would otherwise be one contiguous run.
        assert_eq!(batches.opaque.len(), 2);
        assert_eq!(batches.opaque[0].start, 0);
        assert_eq!(batches.opaque[1].start, 2);
    }

    #[test]
    fn test_non_caster_in_prefix_splits_shadow_run() {
        let meshes = vec![mesh(0); 3];
        let mut no_shadow = opaque_mat(0);
        no_shadow.capabilities = crate::ecs::MaterialCapabilities::RECEIVES_SHADOWS;
        let materials = vec![opaque_mat(0), no_shadow, opaque_mat(0)];
        let batches = DrawBatcher::new().batch(&meshes, &materials, 3);
        assert_eq!(batches.shadow.len(), 2);
        assert_eq!(batches.opaque.len(), 1);
    }
}
