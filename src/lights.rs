use glam::Vec3;

use crate::color::Color;

pub const MAX_POINT_LIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Infinitely distant light shining from `position` towards the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
}

impl DirectionalLight {
    /// Unit vector pointing from the lit surface towards the light.
    pub fn direction_to_light(&self) -> Vec3 {
        self.position.normalize_or(Vec3::Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    /// Cutoff distance. Zero means unlimited range.
    pub distance: f32,
    pub decay: f32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub distance: f32,
    pub color: [f32; 3],
    pub decay: f32,
}

/// Matches `Lights` in `assets/shaders/shared/lighting.wgsl`. Intensities are premultiplied
/// into the colors.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub ambient: [f32; 4],
    pub directional_direction: [f32; 4],
    pub directional_color: [f32; 4],
    pub point_lights: [GpuPointLight; MAX_POINT_LIGHTS],
    pub point_light_count: u32,
    _padding: [u32; 3],
}

impl LightsUniform {
    pub fn add_ambient(&mut self, light: &AmbientLight) {
        let color = light.color.scaled(light.intensity);
        self.ambient[0] += color.r;
        self.ambient[1] += color.g;
        self.ambient[2] += color.b;
    }

    pub fn set_directional(&mut self, light: &DirectionalLight) {
        self.directional_direction = light.direction_to_light().extend(0.0).to_array();
        self.directional_color = light.color.scaled(light.intensity).to_vec3().extend(1.0).to_array();
    }

    /// Returns false when the light table is full.
    pub fn push_point_light(&mut self, light: &PointLight, world_position: Vec3) -> bool {
        let index = self.point_light_count as usize;
        if index >= MAX_POINT_LIGHTS {
            return false;
        }

        self.point_lights[index] = GpuPointLight {
            position: world_position.to_array(),
            distance: light.distance,
            color: light.color.scaled(light.intensity).to_array(),
            decay: light.decay,
        };
        self.point_light_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn flare_light() -> PointLight {
        PointLight {
            color: Color::WHITE,
            intensity: 1.5,
            distance: 2000.0,
            decay: 0.0,
        }
    }

    #[test]
    fn point_light_table_is_bounded() {
        let mut uniform = LightsUniform::default();
        for i in 0..MAX_POINT_LIGHTS {
            assert!(uniform.push_point_light(&flare_light(), Vec3::splat(i as f32)));
        }
        assert!(!uniform.push_point_light(&flare_light(), Vec3::ZERO));
        assert_eq!(uniform.point_light_count as usize, MAX_POINT_LIGHTS);
        assert_eq!(uniform.point_lights[0].color, [1.5, 1.5, 1.5]);
    }

    #[test]
    fn directional_light_is_normalized() {
        let mut uniform = LightsUniform::default();
        uniform.set_directional(&DirectionalLight {
            color: Color::WHITE,
            intensity: 0.15,
            position: Vec3::new(0.0, -5.0, 0.0),
        });
        assert_eq!(uniform.directional_direction, [0.0, -1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(uniform.directional_color[0], 0.15);
    }

    #[test]
    fn uniform_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<GpuPointLight>(), 32);
        assert_eq!(std::mem::size_of::<LightsUniform>(), 192);
    }
}
