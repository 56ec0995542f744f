use std::mem::offset_of;

use id_arena::Id;
use wgpu::util::DeviceExt;

use crate::{
    model::{Model, ModelPrimitive, PhongMaterial, Vertex},
    rendering::instance::{InstanceBuffer, Instances},
    scene_graph::SceneModel,
};

pub type RenderModelId = Id<RenderModel>;

pub struct RenderPrimitive {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl RenderPrimitive {
    fn from_primitive(device: &wgpu::Device, model: &Model, primitive: &ModelPrimitive) -> Self {
        let vertex_buffer_name = format!(
            "Vertex buffer ({}, primitive {})",
            model.name, primitive.index
        );
        let index_buffer_name = format!(
            "Index buffer ({}, primitive {})",
            model.name, primitive.index
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&vertex_buffer_name),
            contents: bytemuck::cast_slice(&primitive.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&index_buffer_name),
            contents: bytemuck::cast_slice(&primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_indices: primitive.indices.len() as u32,
        }
    }
}

/// Matches `Material` in `assets/shaders/shared/lighting.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub specular: [f32; 3],
    pub shininess: f32,
}

impl From<&PhongMaterial> for MaterialUniform {
    fn from(material: &PhongMaterial) -> Self {
        Self {
            color: material.color.to_vec3().extend(1.0).to_array(),
            specular: material.specular.to_array(),
            shininess: material.shininess,
        }
    }
}

/// GPU side of a [`SceneModel`]: geometry, material and the instances gathered this frame.
pub struct RenderModel {
    pub name: String,
    pub primitives: Vec<RenderPrimitive>,
    pub instances: Instances,
    pub instance_buffer: InstanceBuffer,
    _material_buffer: wgpu::Buffer,
    pub material_bind_group: wgpu::BindGroup,
}

impl RenderModel {
    pub fn from_scene_model(
        device: &wgpu::Device,
        scene_model: &SceneModel,
        material_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let model = &scene_model.model;

        let primitives = model
            .primitives
            .iter()
            .map(|primitive| RenderPrimitive::from_primitive(device, model, primitive))
            .collect();

        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Material buffer ({})", model.name)),
            contents: bytemuck::cast_slice(&[MaterialUniform::from(&scene_model.material)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Material bind group ({})", model.name)),
            layout: material_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buffer.as_entire_binding(),
            }],
        });

        RenderModel {
            name: model.name.clone(),
            primitives,
            instances: Instances::new(),
            instance_buffer: InstanceBuffer::new(device, &model.name),
            _material_buffer: material_buffer,
            material_bind_group,
        }
    }
}

pub fn material_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Material bind group layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};

pub const MODEL_PRIMITIVE_STATE: wgpu::PrimitiveState = wgpu::PrimitiveState {
    topology: wgpu::PrimitiveTopology::TriangleList,
    strip_index_format: None,
    front_face: wgpu::FrontFace::Ccw,
    cull_mode: Some(wgpu::Face::Back),
    unclipped_depth: false,
    polygon_mode: wgpu::PolygonMode::Fill,
    conservative: false,
};

/// Draws every primitive of the model once per gathered instance. Expects the mesh pipeline
/// to be bound, with the material at group 3.
pub fn render_model_instances(render_pass: &mut wgpu::RenderPass<'_>, render_model: &RenderModel) {
    let instance_count = render_model.instances.len() as u32;
    if instance_count == 0 {
        return;
    }

    render_pass.set_bind_group(3, &render_model.material_bind_group, &[]);
    render_model.instance_buffer.bind(render_pass);

    for primitive in &render_model.primitives {
        render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
        render_pass.set_index_buffer(primitive.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..primitive.num_indices, 0, 0..instance_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn material_uniform_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 32);
        assert_eq!(offset_of!(MaterialUniform, shininess), 28);
    }

    #[test]
    fn material_uniform_copies_phong_parameters() {
        let uniform = MaterialUniform::from(&PhongMaterial {
            color: Color::WHITE,
            specular: Color::new(0.5, 0.5, 0.5),
            shininess: 50.0,
        });

        assert_eq!(uniform.color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniform.specular, [0.5, 0.5, 0.5]);
        assert_eq!(uniform.shininess, 50.0);
    }

    #[test]
    fn vertex_layout_covers_the_whole_vertex() {
        let last = RENDER_MODEL_VBL.attributes.last().unwrap();
        assert_eq!(
            last.offset + last.format.size(),
            RENDER_MODEL_VBL.array_stride
        );
    }
}
