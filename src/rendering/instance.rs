use std::collections::{HashMap, HashSet};

use id_arena::Arena;
use wgpu::BufferUsages;

use crate::{
    model::Instance,
    rendering::render_model::RenderModel,
    scene_graph::{ObjectKind, Scene, SceneModelId},
};

pub struct Instances {
    instances: Vec<Instance>,
    dirty: bool,
}

impl Instances {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            dirty: true,
        }
    }

    pub fn replace(&mut self, instances: Vec<Instance>) {
        self.instances = instances;
        self.dirty = true;
    }

    pub fn write_to_buffer(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        instance_buffer: &mut InstanceBuffer,
    ) {
        if !self.dirty {
            return;
        }

        instance_buffer.ensure_capacity(device, self.instances.len());
        queue.write_buffer(
            instance_buffer.buffer(),
            0,
            bytemuck::cast_slice(&self.instances),
        );
        self.dirty = false;
    }

    pub fn should_render(&self) -> bool {
        !self.instances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }
}

/// Per-instance vertex buffer that grows to the next power of two when it runs out of room.
pub struct InstanceBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
    name: String,
}

impl InstanceBuffer {
    const INITIAL_CAPACITY: usize = 128;

    pub fn new(device: &wgpu::Device, name: impl Into<String>) -> Self {
        let name: String = name.into();
        let buffer = Self::create(device, &name, Self::INITIAL_CAPACITY);

        Self {
            buffer,
            capacity: Self::INITIAL_CAPACITY,
            name,
        }
    }

    fn create(device: &wgpu::Device, name: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Instance buffer ({})", name)),
            size: (std::mem::size_of::<Instance>() * capacity) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn ensure_capacity(&mut self, device: &wgpu::Device, count: usize) {
        if count <= self.capacity {
            return;
        }

        self.capacity = count.next_power_of_two();
        self.buffer = Self::create(device, &self.name, self.capacity);
        log::debug!(
            "Grew instance buffer ({}) to {} instances",
            self.name,
            self.capacity
        );
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(1, self.buffer.slice(..));
    }
}

/// Models with at least one mesh whose world matrix or instance matrices changed since the
/// previous frame. Consumes the instanced meshes' update flags.
pub fn changed_models(scene: &Scene) -> HashSet<SceneModelId> {
    let mut changed = HashSet::new();

    for (_, object) in scene.objects() {
        match &object.kind {
            ObjectKind::Mesh { model_id } => {
                if object.transform.has_changed() {
                    changed.insert(*model_id);
                }
            }
            ObjectKind::InstancedMesh(mesh) => {
                // Both flags must be read so the instanced one is always reset
                if mesh.take_needs_update() | object.transform.has_changed() {
                    changed.insert(mesh.model_id);
                }
            }
            _ => {}
        }
    }

    changed
}

/// Collects world-space instance matrices for the given models.
pub fn collect_instances(
    scene: &Scene,
    models: &HashSet<SceneModelId>,
) -> HashMap<SceneModelId, Vec<Instance>> {
    let mut instances: HashMap<SceneModelId, Vec<Instance>> =
        models.iter().map(|&id| (id, Vec::new())).collect();

    for (_, object) in scene.objects() {
        match &object.kind {
            ObjectKind::Mesh { model_id } => {
                if let Some(list) = instances.get_mut(model_id) {
                    list.push(Instance {
                        model: object.transform.world_matrix(),
                    });
                }
            }
            ObjectKind::InstancedMesh(mesh) => {
                if let Some(list) = instances.get_mut(&mesh.model_id) {
                    let world = object.transform.world_matrix();
                    list.extend(mesh.matrices().iter().map(|matrix| Instance {
                        model: world * *matrix,
                    }));
                }
            }
            _ => {}
        }
    }

    instances
}

/// Rebuilds the instance lists of models whose meshes changed and uploads them.
pub fn gather_instances(
    scene: &Scene,
    render_models: &mut Arena<RenderModel>,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) {
    let changed = changed_models(scene);

    if !changed.is_empty() {
        replace_instances(scene, render_models, &changed);
    }

    for (_, render_model) in render_models.iter_mut() {
        render_model
            .instances
            .write_to_buffer(device, queue, &mut render_model.instance_buffer);
    }
}

/// Fills the instance lists of every model regardless of change flags. Used once after the
/// render models are created, since static meshes only report a change on their first update.
pub fn gather_all_instances(scene: &Scene, render_models: &mut Arena<RenderModel>) {
    let all_models = scene.models.iter().map(|(id, _)| id).collect();
    replace_instances(scene, render_models, &all_models);
}

fn replace_instances(
    scene: &Scene,
    render_models: &mut Arena<RenderModel>,
    models: &HashSet<SceneModelId>,
) {
    for (model_id, instances) in collect_instances(scene, models) {
        let render_model = scene
            .get_model(model_id)
            .and_then(|model| model.render_model)
            .and_then(|id| render_models.get_mut(id));

        match render_model {
            Some(render_model) => {
                log::debug!(
                    "Gathered {} instances of {}",
                    instances.len(),
                    render_model.name
                );
                render_model.instances.replace(instances);
            }
            None => log::warn!("Model {:?} has no render model, skipping", model_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::{
        color::Color,
        geometry::box_model,
        model::PhongMaterial,
        scene_graph::{InstancedMesh, Object3D, SceneModel, Transform},
    };

    fn scene_with_model() -> (Scene, SceneModelId) {
        let mut scene = Scene::new(Color::BLACK);
        let model = scene.add_model(SceneModel::new(box_model("Box", 1.0), PhongMaterial::default()));
        (scene, model)
    }

    fn frame(scene: &mut Scene) -> HashSet<SceneModelId> {
        scene.early_update();
        scene.late_update();
        changed_models(scene)
    }

    #[test]
    fn individual_meshes_are_gathered_once() {
        let (mut scene, model) = scene_with_model();
        for x in 0..3 {
            scene.add_object(
                Object3D::new(format!("box {x}"), ObjectKind::Mesh { model_id: model })
                    .with_transform(Transform::from_translation(Vec3::new(x as f32, 0.0, 0.0))),
            );
        }

        let changed = frame(&mut scene);
        assert_eq!(changed, HashSet::from([model]));

        let instances = collect_instances(&scene, &changed);
        let translations: Vec<_> = instances[&model]
            .iter()
            .map(|instance| instance.model.w_axis.truncate())
            .collect();
        assert_eq!(
            translations,
            vec![Vec3::ZERO, Vec3::X, Vec3::new(2.0, 0.0, 0.0)]
        );

        // Static boxes are not rebuilt
        assert!(frame(&mut scene).is_empty());
    }

    #[test]
    fn instanced_mesh_matrices_are_relative_to_the_object() {
        let (mut scene, model) = scene_with_model();
        let mut mesh = InstancedMesh::new(model, 2);
        mesh.set_matrix_at(1, Mat4::from_translation(Vec3::Y));
        scene.add_object(
            Object3D::new("boxes", ObjectKind::InstancedMesh(mesh))
                .with_transform(Transform::from_translation(Vec3::Z)),
        );

        let changed = frame(&mut scene);
        let instances = collect_instances(&scene, &changed);
        assert_eq!(instances[&model].len(), 2);
        assert_eq!(instances[&model][0].model.w_axis.truncate(), Vec3::Z);
        assert_eq!(instances[&model][1].model.w_axis.truncate(), Vec3::Y + Vec3::Z);

        assert!(frame(&mut scene).is_empty());
    }

    #[test]
    fn unchanged_models_are_not_collected() {
        let (mut scene, model) = scene_with_model();
        scene.add_object(Object3D::new("box", ObjectKind::Mesh { model_id: model }));
        frame(&mut scene);

        assert!(collect_instances(&scene, &HashSet::new()).is_empty());
    }
}
