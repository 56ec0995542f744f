use glam::{Vec2, Vec3};

use crate::model::{Model, Vertex};

// (normal, u, v) with u x v == normal so that faces wind counter-clockwise from outside.
const BOX_FACES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Z, Vec3::Y),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
];

/// Axis-aligned cube centered on the origin with flat per-face normals.
pub fn box_geometry(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let half = size * 0.5;
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in BOX_FACES {
        let base = vertices.len() as u32;

        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push(Vertex {
                position: (normal + u * su + v * sv) * half,
                normal,
                tex_coords: Vec2::new((su + 1.0) * 0.5, (1.0 - sv) * 0.5),
            });
        }

        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

pub fn box_model(name: impl Into<String>, size: f32) -> Model {
    let (vertices, indices) = box_geometry(size);
    Model::from_primitive(name, vertices, indices)
}
