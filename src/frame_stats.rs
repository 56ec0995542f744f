use std::{collections::VecDeque, time::Duration};

const FPS_WINDOW: Duration = Duration::from_secs(1);
const HISTORY_LEN: usize = 120;

/// Frame timing counters for the stats overlay.
///
/// FPS is averaged over one-second windows, frame time is reported per frame.
#[derive(Debug, Clone)]
pub struct FrameStats {
    frames_in_window: u32,
    window_elapsed: Duration,
    fps: Option<f32>,
    min_fps: f32,
    max_fps: f32,
    last_frame_ms: f32,
    frame_ms_history: VecDeque<f32>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frames_in_window: 0,
            window_elapsed: Duration::ZERO,
            fps: None,
            min_fps: f32::INFINITY,
            max_fps: 0.0,
            last_frame_ms: 0.0,
            frame_ms_history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn record_frame(&mut self, frame_time: Duration) {
        let frame_ms = frame_time.as_secs_f32() * 1000.0;
        self.last_frame_ms = frame_ms;

        if self.frame_ms_history.len() == HISTORY_LEN {
            self.frame_ms_history.pop_front();
        }
        self.frame_ms_history.push_back(frame_ms);

        self.frames_in_window += 1;
        self.window_elapsed += frame_time;

        if self.window_elapsed >= FPS_WINDOW {
            let fps = self.frames_in_window as f32 / self.window_elapsed.as_secs_f32();
            self.fps = Some(fps);
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.frames_in_window = 0;
            self.window_elapsed = Duration::ZERO;
        }
    }

    /// `None` until the first full window has elapsed.
    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn fps_range(&self) -> Option<(f32, f32)> {
        self.fps.map(|_| (self.min_fps, self.max_fps))
    }

    pub fn last_frame_ms(&self) -> f32 {
        self.last_frame_ms
    }

    /// Contiguous copy of the recent frame times, oldest first.
    pub fn frame_ms_history(&self) -> Vec<f32> {
        self.frame_ms_history.iter().copied().collect()
    }

    pub fn draw_ui(&self, ui: &imgui::Ui) {
        ui.window("Stats")
            .position([8.0, 8.0], imgui::Condition::FirstUseEver)
            .always_auto_resize(true)
            .resizable(false)
            .collapsible(false)
            .build(|| {
                match self.fps() {
                    Some(fps) => ui.text(format!("{fps:.0} FPS")),
                    None => ui.text("-- FPS"),
                }

                if let Some((min, max)) = self.fps_range() {
                    ui.text(format!("min {min:.0} / max {max:.0}"));
                }

                ui.text(format!("{:.2} ms", self.last_frame_ms()));

                let history = self.frame_ms_history();
                ui.plot_lines("##frame_ms", &history)
                    .scale_min(0.0)
                    .graph_size([160.0, 40.0])
                    .build();
            });
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn fps_is_reported_after_a_full_window() {
        let mut stats = FrameStats::new();

        for _ in 0..59 {
            stats.record_frame(Duration::from_micros(16_667));
        }
        assert_eq!(stats.fps(), None);

        stats.record_frame(Duration::from_micros(16_667));
        assert_abs_diff_eq!(stats.fps().unwrap(), 60.0, epsilon = 0.1);
        assert_abs_diff_eq!(stats.last_frame_ms(), 16.667, epsilon = 1e-3);
    }

    #[test]
    fn tracks_min_and_max_across_windows() {
        let mut stats = FrameStats::new();

        for _ in 0..30 {
            stats.record_frame(Duration::from_micros(33_334));
        }
        for _ in 0..60 {
            stats.record_frame(Duration::from_micros(16_667));
        }

        let (min, max) = stats.fps_range().unwrap();
        assert_abs_diff_eq!(min, 30.0, epsilon = 0.1);
        assert_abs_diff_eq!(max, 60.0, epsilon = 0.1);
    }

    #[test]
    fn history_is_bounded() {
        let mut stats = FrameStats::new();

        for i in 0..(HISTORY_LEN + 10) {
            stats.record_frame(Duration::from_millis(i as u64));
        }

        let history = stats.frame_ms_history();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0], 10.0);
    }
}
