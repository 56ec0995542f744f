use std::cell::Cell;

use glam::{Mat4, Quat, Vec3};

/// Placement of an object relative to its parent.
///
/// Objects in this scene never move after construction, so the local matrix is baked when the
/// transform is created. Only the world matrix is recomputed, when the parent chain changes.
#[derive(Debug, Clone)]
pub struct Transform {
    local: Mat4,
    world: Cell<Mat4>,
    world_dirty: Cell<bool>,
    // Set whenever the world matrix is rewritten, cleared at the start of each frame
    changed: Cell<bool>,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_translation_rotation(translation, Quat::IDENTITY)
    }

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self::from_local_matrix(Mat4::from_rotation_translation(rotation, translation))
    }

    pub fn from_local_matrix(local: Mat4) -> Self {
        Self {
            local,
            world: Cell::new(local),
            world_dirty: Cell::new(true),
            changed: Cell::new(true),
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        self.local
    }

    /// Valid after the scene's `late_update`.
    pub fn world_matrix(&self) -> Mat4 {
        self.world.get()
    }

    pub fn world_position(&self) -> Vec3 {
        self.world.get().w_axis.truncate()
    }

    pub fn set_world_matrix(&self, world: Mat4) {
        self.world.set(world);
        self.world_dirty.set(false);
        self.changed.set(true);
    }

    pub fn invalidate_world(&self) {
        self.world_dirty.set(true);
    }

    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }

    pub fn clear_changed(&self) {
        self.changed.set(false);
    }

    pub fn has_changed(&self) -> bool {
        self.changed.get()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_local_matrix(Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_matrix_is_baked_from_translation_and_rotation() {
        let rotation = Quat::from_rotation_y(1.0);
        let transform = Transform::from_translation_rotation(Vec3::new(1.0, 2.0, 3.0), rotation);

        let expected = Mat4::from_rotation_translation(rotation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.local_matrix(), expected);
        assert!(transform.is_world_dirty());
        assert!(transform.has_changed());
    }

    #[test]
    fn writing_the_world_matrix_marks_a_change() {
        let transform = Transform::default();
        transform.clear_changed();
        assert!(!transform.has_changed());

        transform.set_world_matrix(Mat4::from_translation(Vec3::X));
        assert!(transform.has_changed());
        assert!(!transform.is_world_dirty());
        assert_eq!(transform.world_position(), Vec3::X);
    }
}
