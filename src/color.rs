use glam::Vec3;

/// Linear RGB color in the renderer's working color space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// HSL taken as already being in the linear working space.
    pub fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let [r, g, b] = hsl_to_rgb(h, s, l);
        Self::new(r, g, b)
    }

    /// HSL in sRGB space, converted to linear.
    pub fn from_srgb_hsl(h: f32, s: f32, l: f32) -> Self {
        let [r, g, b] = hsl_to_rgb(h, s, l);
        Self::new(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b))
    }

    /// `0xRRGGBB` in sRGB space, converted to linear.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: 1.0,
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let h = h.rem_euclid(1.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s == 0.0 {
        return [l, l, l];
    }

    let p = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let q = 2.0 * l - p;

    [
        hue_to_rgb(q, p, h + 1.0 / 3.0),
        hue_to_rgb(q, p, h),
        hue_to_rgb(q, p, h - 1.0 / 3.0),
    ]
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.077_399_38
    } else {
        (c * 0.947_867_3 + 0.052_132_7).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn primary_hues() {
        let red = Color::from_hsl(0.0, 1.0, 0.5);
        assert_abs_diff_eq!(red.r, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(red.g, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(red.b, 0.0, epsilon = 1e-5);

        let green = Color::from_hsl(1.0 / 3.0, 1.0, 0.5);
        assert_abs_diff_eq!(green.r, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(green.g, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(green.b, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_saturation_is_grey() {
        assert_eq!(Color::from_hsl(0.7, 0.0, 0.25), Color::new(0.25, 0.25, 0.25));
    }

    #[test]
    fn hue_wraps_and_inputs_clamp() {
        assert_eq!(Color::from_hsl(1.25, 1.0, 0.5), Color::from_hsl(0.25, 1.0, 0.5));
        assert_eq!(Color::from_hsl(-0.75, 1.0, 0.5), Color::from_hsl(0.25, 1.0, 0.5));
        assert_eq!(Color::from_hsl(0.3, 2.0, 1.5), Color::WHITE);
    }

    #[test]
    fn orange_light_color() {
        // hsl(0.08, 0.8, 0.5)
        let color = Color::from_hsl(0.08, 0.8, 0.5);
        assert_abs_diff_eq!(color.r, 0.9, epsilon = 1e-5);
        assert_abs_diff_eq!(color.g, 0.484, epsilon = 1e-5);
        assert_abs_diff_eq!(color.b, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn srgb_conversion() {
        assert_abs_diff_eq!(srgb_to_linear(0.0), 0.0);
        assert_abs_diff_eq!(srgb_to_linear(1.0), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(srgb_to_linear(0.5), 0.214_041, epsilon = 1e-4);
        assert_abs_diff_eq!(srgb_to_linear(0.02), 0.02 * 0.077_399_38, epsilon = 1e-7);

        let background = Color::from_srgb_hsl(0.51, 0.4, 0.01);
        let unconverted = Color::from_hsl(0.51, 0.4, 0.01);
        assert!(background.b < unconverted.b);
    }

    #[test]
    fn hex_white_is_linear_white() {
        let white = Color::from_hex(0xffffff);
        assert_abs_diff_eq!(white.r, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(white.g, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(white.b, 1.0, epsilon = 1e-5);
        assert_eq!(Color::from_hex(0x000000), Color::BLACK);
    }
}
