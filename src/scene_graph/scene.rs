use glam::{Mat4, Vec3};
use id_arena::Arena;

use crate::color::Color;
use crate::scene_graph::object3d::{Object3D, ObjectId, ObjectKind};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};

/// Linear distance fog blending towards `color` between `near` and `far` view depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    pub background: Color,
    pub fog: Option<Fog>,
}

impl Scene {
    pub fn new(background: Color) -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            background,
            fog: None,
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    pub fn add_child(&mut self, parent_id: ObjectId, object: Object3D) -> ObjectId {
        let child_id = self.add_object(object);
        self.set_object_parent(child_id, Some(parent_id));
        child_id
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    pub fn get_model(&self, id: SceneModelId) -> Option<&SceneModel> {
        self.models.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object3D)> {
        self.objects.iter()
    }

    pub fn objects_of_kind<'a, T: 'a>(
        &'a self,
        select: impl Fn(&'a ObjectKind) -> Option<&'a T> + 'a,
    ) -> impl Iterator<Item = (&'a Object3D, &'a T)> + 'a {
        self.objects
            .iter()
            .filter_map(move |(_, object)| select(&object.kind).map(|kind| (object, kind)))
    }

    pub fn world_position(&self, object_id: ObjectId) -> Option<Vec3> {
        self.objects
            .get(object_id)
            .map(|object| object.transform.world_position())
    }

    /// Updates all object transforms in hierarchical order
    fn update_transforms(&self) {
        let root_objects = self.objects.iter().filter_map(|(id, object)| {
            if object.parent_id.is_none() {
                Some(id)
            } else {
                None
            }
        });

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY);
        }
    }

    fn update_object_transform_recursive(&self, object_id: ObjectId, parent_world_matrix: Mat4) {
        if let Some(object) = self.objects.get(object_id) {
            if object.transform.is_world_dirty() {
                let local_matrix = object.transform.local_matrix();
                let world_matrix = parent_world_matrix * local_matrix;
                object.transform.set_world_matrix(world_matrix);
            }

            let world_matrix = object.transform.world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix);
            }
        }
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.objects.get(child_id).and_then(|child| child.parent_id) {
            if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;

            if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
                new_parent.child_ids.push(child_id);
            }
        }

        self.invalidate_object_hierarchy(child_id);
    }

    pub fn early_update(&mut self) {
        for (_, object) in self.objects.iter() {
            object.transform.clear_changed();
        }
    }

    pub fn late_update(&mut self) {
        self.update_transforms();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    use super::*;
    use crate::lens_flare::LensFlare;
    use crate::scene_graph::transform::Transform;
    use crate::lights::PointLight;

    fn point_light() -> ObjectKind {
        ObjectKind::PointLight(PointLight {
            color: Color::WHITE,
            intensity: 1.5,
            distance: 2000.0,
            decay: 0.0,
        })
    }

    #[test]
    fn children_inherit_parent_world_transform() {
        let mut scene = Scene::new(Color::BLACK);
        let light = scene.add_object(
            Object3D::new("light", point_light())
                .with_transform(Transform::from_translation(Vec3::new(5000.0, 0.0, -1000.0))),
        );
        let flare = scene.add_child(light, Object3D::new("flare", ObjectKind::LensFlare(LensFlare::new())));

        scene.late_update();

        assert_eq!(scene.world_position(flare), Some(Vec3::new(5000.0, 0.0, -1000.0)));

        let other_light = scene.add_object(
            Object3D::new("other light", point_light())
                .with_transform(Transform::from_translation(Vec3::new(0.0, 10.0, 0.0))),
        );
        scene.set_object_parent(flare, Some(other_light));
        scene.late_update();
        assert_eq!(scene.world_position(flare), Some(Vec3::new(0.0, 10.0, 0.0)));
    }

    #[test]
    fn world_matrix_composes_rotation_and_translation() {
        let mut scene = Scene::new(Color::BLACK);
        let parent = scene.add_object(Object3D::new("parent", ObjectKind::Group).with_transform(
            Transform::from_translation_rotation(
                Vec3::new(10.0, 0.0, 0.0),
                Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            ),
        ));
        let child = scene.add_child(
            parent,
            Object3D::new("child", ObjectKind::Group)
                .with_transform(Transform::from_translation(Vec3::new(1.0, 0.0, 0.0))),
        );

        scene.late_update();

        let position = scene.world_position(child).unwrap();
        assert_abs_diff_eq!(position.x, 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(position.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn reparenting_updates_child_lists() {
        let mut scene = Scene::new(Color::BLACK);
        let a = scene.add_object(Object3D::new("a", ObjectKind::Group));
        let b = scene.add_object(Object3D::new("b", ObjectKind::Group));
        let child = scene.add_child(a, Object3D::new("child", ObjectKind::Group));

        scene.set_object_parent(child, Some(b));

        assert!(scene.get_object(a).unwrap().child_ids.is_empty());
        assert_eq!(scene.get_object(b).unwrap().child_ids, vec![child]);
        let children: Vec<_> = scene
            .get_object(b)
            .unwrap()
            .children(&scene)
            .map(|object| object.name.as_str())
            .collect();
        assert_eq!(children, vec!["child"]);
    }

    #[test]
    fn static_objects_stop_reporting_changes() {
        let mut scene = Scene::new(Color::BLACK);
        let object = scene.add_object(Object3D::new("box", ObjectKind::Group));

        scene.early_update();
        scene.late_update();
        assert!(scene.get_object(object).unwrap().transform.has_changed());

        scene.early_update();
        scene.late_update();
        assert!(!scene.get_object(object).unwrap().transform.has_changed());
    }
}
