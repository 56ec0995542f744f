//! Free-flight camera controls: keyboard translation and roll, cursor-driven yaw and pitch.

use glam::{Quat, Vec2, Vec3};
use winit::{event::MouseButton, keyboard::KeyCode};

use crate::{camera::PerspectiveCamera, config::ControlsConfig};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct MoveState {
    up: f32,
    down: f32,
    left: f32,
    right: f32,
    forward: f32,
    back: f32,
    pitch_up: f32,
    pitch_down: f32,
    yaw_left: f32,
    yaw_right: f32,
    roll_left: f32,
    roll_right: f32,
}

#[derive(Debug, Clone)]
pub struct FlyControls {
    pub movement_speed: f32,
    pub roll_speed: f32,
    pub drag_to_look: bool,
    pub auto_forward: bool,

    move_state: MoveState,
    movement_speed_multiplier: f32,
    // Mouse buttons currently held while drag_to_look is on
    drag_count: u32,
    move_vector: Vec3,
    rotation_vector: Vec3,
}

impl FlyControls {
    pub fn new(movement_speed: f32, roll_speed: f32) -> Self {
        Self {
            movement_speed,
            roll_speed,
            drag_to_look: false,
            auto_forward: false,
            move_state: MoveState::default(),
            movement_speed_multiplier: 1.0,
            drag_count: 0,
            move_vector: Vec3::ZERO,
            rotation_vector: Vec3::ZERO,
        }
    }

    pub fn from_config(config: &ControlsConfig) -> Self {
        let mut controls = Self::new(config.movement_speed, config.roll_speed);
        controls.drag_to_look = config.drag_to_look;
        controls.auto_forward = config.auto_forward;
        controls.update_movement_vector();
        controls
    }

    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        let value = if pressed { 1.0 } else { 0.0 };
        let state = &mut self.move_state;

        match key {
            KeyCode::ShiftLeft | KeyCode::ShiftRight => {
                self.movement_speed_multiplier = if pressed { 0.1 } else { 1.0 };
            }
            KeyCode::KeyW => state.forward = value,
            KeyCode::KeyS => state.back = value,
            KeyCode::KeyA => state.left = value,
            KeyCode::KeyD => state.right = value,
            KeyCode::KeyR => state.up = value,
            KeyCode::KeyF => state.down = value,
            KeyCode::ArrowUp => state.pitch_up = value,
            KeyCode::ArrowDown => state.pitch_down = value,
            KeyCode::ArrowLeft => state.yaw_left = value,
            KeyCode::ArrowRight => state.yaw_right = value,
            KeyCode::KeyQ => state.roll_left = value,
            KeyCode::KeyE => state.roll_right = value,
            _ => return,
        }

        self.update_movement_vector();
        self.update_rotation_vector();
    }

    pub fn handle_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if self.drag_to_look {
            if pressed {
                self.drag_count += 1;
            } else {
                self.drag_count = self.drag_count.saturating_sub(1);
                self.move_state.yaw_left = 0.0;
                self.move_state.pitch_down = 0.0;
            }
        } else {
            let value = if pressed { 1.0 } else { 0.0 };
            match button {
                MouseButton::Left => self.move_state.forward = value,
                MouseButton::Right => self.move_state.back = value,
                _ => return,
            }
        }

        self.update_movement_vector();
        self.update_rotation_vector();
    }

    /// `position` is the cursor in physical pixels, `viewport` the window size.
    pub fn handle_cursor_moved(&mut self, position: Vec2, viewport: Vec2) {
        if self.drag_to_look && self.drag_count == 0 {
            return;
        }

        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }

        let half = viewport * 0.5;
        self.move_state.yaw_left = -(position.x - half.x) / half.x;
        self.move_state.pitch_down = (position.y - half.y) / half.y;

        self.update_rotation_vector();
    }

    /// Releases every held key and button, e.g. when the window loses focus.
    pub fn reset(&mut self) {
        self.move_state = MoveState::default();
        self.movement_speed_multiplier = 1.0;
        self.drag_count = 0;
        self.update_movement_vector();
        self.update_rotation_vector();
    }

    pub fn update(&self, camera: &mut PerspectiveCamera, delta: f32) {
        let move_mult = delta * self.movement_speed * self.movement_speed_multiplier;
        let rot_mult = delta * self.roll_speed;

        camera.position += camera.orientation * (self.move_vector * move_mult);

        let rotation_delta = self.rotation_vector * rot_mult;
        let rotation = Quat::from_xyzw(rotation_delta.x, rotation_delta.y, rotation_delta.z, 1.0)
            .normalize();
        camera.orientation = (camera.orientation * rotation).normalize();
    }

    fn update_movement_vector(&mut self) {
        let state = &self.move_state;
        let forward = if state.forward > 0.0 || (self.auto_forward && state.back == 0.0) {
            1.0
        } else {
            0.0
        };

        self.move_vector = Vec3::new(
            state.right - state.left,
            state.up - state.down,
            state.back - forward,
        );
    }

    fn update_rotation_vector(&mut self) {
        let state = &self.move_state;

        self.rotation_vector = Vec3::new(
            state.pitch_up - state.pitch_down,
            state.yaw_left - state.yaw_right,
            state.roll_left - state.roll_right,
        );
    }
}
