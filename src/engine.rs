use crate::demo::DemoState;

/// Advances the demo by `delta` seconds: moves the camera, then refreshes world transforms.
pub fn update(state: &mut DemoState, delta: f32) {
    state.scene.early_update();
    state.update(delta);
    state.scene.late_update();
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use winit::{dpi::PhysicalSize, keyboard::KeyCode};

    use super::*;
    use crate::config::DemoConfig;

    #[test]
    fn held_key_moves_the_camera_forward() {
        let config = DemoConfig {
            seed: Some(1),
            ..Default::default()
        };
        let mut state = DemoState::new(&config, PhysicalSize::new(800, 600)).unwrap();

        update(&mut state, 0.1);
        assert_eq!(state.camera.position, Vec3::new(0.0, 0.0, 250.0));

        state.controls.handle_key(KeyCode::KeyW, true);
        update(&mut state, 0.1);
        assert!((state.camera.position.z - 0.0).abs() < 1e-2);
        assert_eq!(state.camera.position.x, 0.0);
    }
}
