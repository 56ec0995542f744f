use std::cell::Cell;

use glam::Mat4;
use id_arena::Id;

use crate::lens_flare::LensFlare;
use crate::lights::{AmbientLight, DirectionalLight, PointLight};
use crate::scene_graph::scene::Scene;
use crate::scene_graph::scene_model::SceneModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

/// Many copies of one model, each placed by its own matrix relative to the owning object.
pub struct InstancedMesh {
    pub model_id: SceneModelId,
    matrices: Vec<Mat4>,
    needs_update: Cell<bool>,
}

impl InstancedMesh {
    pub fn new(model_id: SceneModelId, count: usize) -> Self {
        Self {
            model_id,
            matrices: vec![Mat4::IDENTITY; count],
            needs_update: Cell::new(true),
        }
    }

    pub fn set_matrix_at(&mut self, index: usize, matrix: Mat4) {
        self.matrices[index] = matrix;
        self.needs_update.set(true);
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    /// Returns whether the matrices changed since the last call.
    pub fn take_needs_update(&self) -> bool {
        self.needs_update.replace(false)
    }
}

pub enum ObjectKind {
    Group,
    Mesh { model_id: SceneModelId },
    InstancedMesh(InstancedMesh),
    AmbientLight(AmbientLight),
    DirectionalLight(DirectionalLight),
    PointLight(PointLight),
    LensFlare(LensFlare),
}

pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub kind: ObjectKind,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
}

impl Object3D {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn children<'a, 'b>(&'a self, scene: &'b Scene) -> impl Iterator<Item = &'b Object3D> + 'b
    where
        'a: 'b,
    {
        self.child_ids
            .iter()
            .filter_map(move |id| scene.get_object(*id))
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            kind: ObjectKind::Group,
            parent_id: None,
            child_ids: Vec::new(),
        }
    }
}
