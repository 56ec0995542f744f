use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    config::DemoConfig, demo::DemoState, engine, frame_stats::FrameStats,
    rendering::renderer::Renderer,
};

const WINDOW_TITLE: &str = "Lens flares";

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

/// Where the app is between creation and exit. A torn down app never mounts again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unmounted,
    Mounted,
    TornDown,
}

struct App {
    config: DemoConfig,
    demo_state: DemoState,
    lifecycle: Lifecycle,
    renderer: Option<Renderer>,
    imgui: Option<ImguiState>,
    stats: FrameStats,
    last_frame: Instant,
    fatal_error: Option<anyhow::Error>,
}

impl App {
    fn new(config: DemoConfig, demo_state: DemoState) -> Self {
        Self {
            config,
            demo_state,
            lifecycle: Lifecycle::Unmounted,
            renderer: None,
            imgui: None,
            stats: FrameStats::new(),
            last_frame: Instant::now(),
            fatal_error: None,
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let platform = WinitPlatform::new(&mut context);

        let font_size = 13.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // The stats window has a fixed position, nothing worth saving
        context.set_ini_filename(None);

        let mut imgui = ImguiState { context, platform };
        Self::attach_imgui(&mut imgui, window);
        imgui
    }

    /// Binds the imgui platform to `window`, picking up its scale factor and size.
    fn attach_imgui(imgui: &mut ImguiState, window: &Window) {
        imgui.platform.attach_window(
            imgui.context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );
    }

    /// Creates the window, the rendering surface and the GPU resources.
    fn mount(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        if self.lifecycle != Lifecycle::Unmounted {
            return Ok(());
        }

        let window_attributes = Window::default_attributes().with_title(WINDOW_TITLE);
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;
        let window = Arc::new(window);

        // A context kept from an earlier mount still points at the old window
        let mut imgui = match self.imgui.take() {
            Some(mut imgui) => {
                Self::attach_imgui(&mut imgui, &window);
                imgui
            }
            None => Self::setup_imgui(&window),
        };

        let mut renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &self.config,
            &mut imgui.context,
        ))
        .context("Failed to create renderer")?;

        renderer.load_models(&mut self.demo_state);
        self.demo_state.camera.set_viewport_size(renderer.size);

        self.imgui = Some(imgui);
        self.renderer = Some(renderer);
        self.lifecycle = Lifecycle::Mounted;
        self.last_frame = Instant::now();

        log::info!("Mounted {:?} demo", self.demo_state.variant);
        window.request_redraw();

        Ok(())
    }

    /// Drops the surface and stops the frame loop. The app can mount again afterwards.
    fn unmount(&mut self) {
        if self.lifecycle == Lifecycle::Mounted {
            self.renderer = None;
            self.lifecycle = Lifecycle::Unmounted;
            self.demo_state.controls.reset();
            log::info!("Unmounted");
        }
    }

    /// Releases the surface for good. Safe to call more than once.
    fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }

        self.renderer = None;
        self.imgui = None;
        self.lifecycle = Lifecycle::TornDown;
        log::info!("Torn down");
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        let Some(renderer) = self.renderer.as_mut() else {
            return false;
        };

        if !renderer.resize(new_size) {
            return false;
        }

        self.demo_state.camera.set_viewport_size(new_size)
    }

    fn viewport(&self) -> Vec2 {
        self.renderer
            .as_ref()
            .map(|renderer| Vec2::new(renderer.size.width as f32, renderer.size.height as f32))
            .unwrap_or(Vec2::ZERO)
    }

    fn wants_keyboard(&self) -> bool {
        self.imgui
            .as_ref()
            .is_some_and(|imgui| imgui.context.io().want_capture_keyboard)
    }

    fn wants_mouse(&self) -> bool {
        self.imgui
            .as_ref()
            .is_some_and(|imgui| imgui.context.io().want_capture_mouse)
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        let now = Instant::now();
        let delta_time = now - self.last_frame;
        self.last_frame = now;

        self.stats.record_frame(delta_time);
        imgui.context.io_mut().update_delta_time(delta_time);

        engine::update(&mut self.demo_state, delta_time.as_secs_f32());

        if let Err(e) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::error!("Failed to prepare imgui frame: {}", e);
        }

        let ui = imgui.context.new_frame();
        if self.config.stats.enabled {
            self.stats.draw_ui(ui);
        }
        imgui.platform.prepare_render(ui, &renderer.window);

        match renderer.render(&self.demo_state, &mut imgui.context) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = renderer.size;
                renderer.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                self.teardown();
                event_loop.exit();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout");
            }
            Err(other) => {
                log::error!("Unexpected surface error: {:?}", other);
            }
        }

        if self.lifecycle == Lifecycle::Mounted {
            if let Some(renderer) = &self.renderer {
                renderer.window.request_redraw();
            }
        }
    }

    fn handle_keyboard(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };

        let pressed = event.state == ElementState::Pressed;

        if code == KeyCode::Escape && pressed {
            self.teardown();
            event_loop.exit();
            return;
        }

        // Releases always reach the controls so no key stays stuck
        if pressed && self.wants_keyboard() {
            return;
        }

        self.demo_state.controls.handle_key(code, pressed);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.mount(event_loop) {
            log::error!("{:#}", e);
            self.fatal_error = Some(e);
            self.teardown();
            event_loop.exit();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.unmount();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(imgui), Some(renderer)) = (self.imgui.as_mut(), self.renderer.as_ref()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent {
                    window_id,
                    event: event.clone(),
                },
            );
        }

        match event {
            WindowEvent::CloseRequested => {
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if !self.handle_resize(new_size) {
                    log::debug!("Ignored resize to {:?}", new_size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(event_loop, &event),
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                if !(pressed && self.wants_mouse()) {
                    self.demo_state.controls.handle_mouse_button(button, pressed);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let viewport = self.viewport();
                if !self.wants_mouse() {
                    self.demo_state.controls.handle_cursor_moved(
                        Vec2::new(position.x as f32, position.y as f32),
                        viewport,
                    );
                }
            }
            WindowEvent::Focused(false) => self.demo_state.controls.reset(),
            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

pub async fn run(config: DemoConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;

    // The real size is applied once the window exists
    let demo_state = DemoState::new(&config, PhysicalSize::new(1280, 720))
        .context("Failed to create demo state")?;

    let mut app = App::new(config, demo_state);
    event_loop.run_app(&mut app)?;

    match app.fatal_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let config = DemoConfig {
            seed: Some(5),
            ..Default::default()
        };
        let demo_state = DemoState::new(&config, PhysicalSize::new(800, 600)).unwrap();
        App::new(config, demo_state)
    }

    #[test]
    fn resize_is_ignored_while_unmounted() {
        let mut app = app();
        assert!(!app.handle_resize(PhysicalSize::new(1024, 768)));
        assert_eq!(app.demo_state.camera.aspect, 800.0 / 600.0);
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut app = app();
        app.teardown();
        assert_eq!(app.lifecycle, Lifecycle::TornDown);
        assert!(app.renderer.is_none());

        app.teardown();
        assert_eq!(app.lifecycle, Lifecycle::TornDown);

        // Suspend after teardown does not resurrect the app
        app.unmount();
        assert_eq!(app.lifecycle, Lifecycle::TornDown);
        assert!(!app.handle_resize(PhysicalSize::new(640, 480)));
    }

    #[test]
    fn unmount_keeps_imgui_for_the_next_mount() {
        let mut app = app();
        let mut context = imgui::Context::create();
        context.set_ini_filename(None);
        let platform = WinitPlatform::new(&mut context);
        app.imgui = Some(ImguiState { context, platform });
        app.lifecycle = Lifecycle::Mounted;

        app.unmount();

        assert_eq!(app.lifecycle, Lifecycle::Unmounted);
        assert!(app.renderer.is_none());
        assert!(app.imgui.is_some());

        app.teardown();
        assert!(app.imgui.is_none());
    }

    #[test]
    fn unmounted_app_reports_no_viewport() {
        let app = app();
        assert_eq!(app.viewport(), Vec2::ZERO);
        assert!(!app.wants_mouse());
        assert!(!app.wants_keyboard());
    }
}
