use crate::{
    lights::{LightsUniform, MAX_POINT_LIGHTS},
    scene_graph::{ObjectKind, Scene},
};

/// Packs every light in the scene into the uniform read by the mesh shader. Point lights
/// beyond the table size are dropped.
pub fn gather_lights(scene: &Scene) -> LightsUniform {
    let mut uniform = LightsUniform::default();
    let mut dropped = 0;

    for (_, object) in scene.objects() {
        match &object.kind {
            ObjectKind::AmbientLight(light) => uniform.add_ambient(light),
            ObjectKind::DirectionalLight(light) => uniform.set_directional(light),
            ObjectKind::PointLight(light) => {
                if !uniform.push_point_light(light, object.transform.world_position()) {
                    dropped += 1;
                }
            }
            _ => {}
        }
    }

    if dropped > 0 {
        log::trace!(
            "Dropped {} point lights over the limit of {}",
            dropped,
            MAX_POINT_LIGHTS
        );
    }

    uniform
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use winit::dpi::PhysicalSize;

    use super::*;
    use crate::{
        color::Color,
        config::{DemoConfig, Variant},
        demo::DemoState,
    };

    fn lights_for(variant: Variant) -> LightsUniform {
        let config = DemoConfig {
            variant,
            seed: Some(7),
            ..Default::default()
        };
        let demo = DemoState::new(&config, PhysicalSize::new(800, 600)).unwrap();
        gather_lights(&demo.scene)
    }

    #[test]
    fn demo_scene_lights_are_packed() {
        let lights = lights_for(Variant::Instanced);

        assert_eq!(lights.point_light_count, 3);
        assert_eq!(lights.point_lights[1].position, [0.0, 0.0, -1000.0]);
        assert_eq!(lights.directional_direction, [0.0, -1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(lights.ambient[0], 0.2);
    }

    #[test]
    fn point_lights_carry_cutoff_and_decay_for_the_shader() {
        let lights = lights_for(Variant::Instanced);

        for light in &lights.point_lights[..3] {
            assert_eq!(light.distance, 2000.0);
            // Zero decay skips the inverse power falloff in the shader
            assert_eq!(light.decay, 0.0);
        }

        let expected = Color::from_hsl(0.55, 0.9, 0.5).scaled(1.5).to_array();
        assert_eq!(lights.point_lights[0].color, expected);
        assert_abs_diff_eq!(lights.point_lights[0].color[2], 1.425, epsilon = 1e-5);

        // Unused slots stay zeroed
        assert_eq!(lights.point_lights[3].color, [0.0; 3]);
    }

    #[test]
    fn individual_variant_has_no_ambient_term() {
        let lights = lights_for(Variant::Individual);
        assert_eq!(lights.ambient, [0.0; 4]);
        assert_eq!(lights.point_light_count, 3);
    }
}
