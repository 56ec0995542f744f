use glam::{Mat4, Quat, Vec3, Vec4};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::config::CameraConfig;

/// Right-handed perspective camera looking down its local -Z axis.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub orientation: Quat,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            fov,
            aspect,
            near,
            far,
        }
    }

    pub fn from_config(config: &CameraConfig, size: PhysicalSize<u32>) -> Self {
        let mut camera = Self::new(config.fov, 1.0, config.near, config.far);
        camera.position = Vec3::from_array(config.position);
        camera.set_viewport_size(size);
        camera
    }

    /// Updates the aspect ratio from a viewport size. Zero-sized viewports are ignored.
    pub fn set_viewport_size(&mut self, size: PhysicalSize<u32>) -> bool {
        if size.width == 0 || size.height == 0 {
            return false;
        }

        self.aspect = size.width as f32 / size.height as f32;
        true
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
    view: Mat4,
    position: Vec4,
}

impl CameraUniform {
    pub fn update(&mut self, camera: &PerspectiveCamera) {
        self.view_proj = camera.view_projection_matrix();
        self.view = camera.view_matrix();
        self.position = camera.position.extend(1.0);
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn aspect_follows_viewport() {
        let mut camera = PerspectiveCamera::new(40.0, 1.0, 1.0, 15000.0);

        assert!(camera.set_viewport_size(PhysicalSize::new(1600, 900)));
        assert_abs_diff_eq!(camera.aspect, 16.0 / 9.0);

        assert!(!camera.set_viewport_size(PhysicalSize::new(0, 900)));
        assert!(!camera.set_viewport_size(PhysicalSize::new(1600, 0)));
        assert_abs_diff_eq!(camera.aspect, 16.0 / 9.0);
    }

    #[test]
    fn point_in_front_projects_to_center() {
        let mut camera = PerspectiveCamera::new(40.0, 1.0, 1.0, 15000.0);
        camera.position = Vec3::new(0.0, 0.0, 250.0);

        let clip = camera.view_projection_matrix() * Vec4::new(0.0, 0.0, -1000.0, 1.0);
        let ndc = clip / clip.w;

        assert_abs_diff_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
