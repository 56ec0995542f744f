use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::scene_graph::Fog;

/// Matches `Globals` in `assets/shaders/shared/globals.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GlobalUniformState {
    pub fog_color: [f32; 4],
    pub fog_near: f32,
    pub fog_far: f32,
    pub fog_enabled: f32,
    _padding: f32,
}

impl GlobalUniformState {
    pub fn new(fog: Option<&Fog>) -> Self {
        let (fog_enabled, fog_color, fog_near, fog_far) = match fog {
            Some(fog) => (1.0, fog.color.to_vec3().extend(1.0).to_array(), fog.near, fog.far),
            None => (0.0, [0.0; 4], 0.0, 1.0),
        };

        Self {
            fog_color,
            fog_near,
            fog_far,
            fog_enabled,
            _padding: 0.0,
        }
    }
}

pub struct GlobalUniform {
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl GlobalUniform {
    pub fn new(device: &wgpu::Device, initial_state: GlobalUniformState) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Global uniform buffer"),
            contents: bytemuck::cast_slice(&[initial_state]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Global uniform bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Global uniform bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, state: GlobalUniformState) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[state]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn layout_matches_shader() {
        assert_eq!(std::mem::size_of::<GlobalUniformState>(), 32);
    }

    #[test]
    fn fog_is_packed_when_present() {
        let fog = Fog {
            color: Color::new(0.1, 0.2, 0.3),
            near: 3500.0,
            far: 15000.0,
        };

        let state = GlobalUniformState::new(Some(&fog));
        assert_eq!(state.fog_enabled, 1.0);
        assert_eq!(state.fog_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!((state.fog_near, state.fog_far), (3500.0, 15000.0));

        let state = GlobalUniformState::new(None);
        assert_eq!(state.fog_enabled, 0.0);
        assert!(state.fog_far > state.fog_near);
    }
}
