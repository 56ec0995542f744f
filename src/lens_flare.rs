//! Lens flares: textured sprites strung along the line from a light's screen position
//! through the screen center.

use glam::{Vec2, Vec3};

use crate::{camera::PerspectiveCamera, color::Color};

/// Flares are skipped when the light is within this many pixels of the viewport edge.
const EDGE_MARGIN_PX: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlareTexture {
    /// Large soft glow around the light.
    Main,
    /// Small ring ghost.
    Ring,
}

impl FlareTexture {
    pub const ALL: [FlareTexture; 2] = [FlareTexture::Main, FlareTexture::Ring];

    pub fn index(self) -> usize {
        match self {
            FlareTexture::Main => 0,
            FlareTexture::Ring => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensFlareElement {
    pub texture: FlareTexture,
    /// Sprite size in pixels.
    pub size: f32,
    /// 0 places the sprite on the light, 1 mirrors it through the screen center. Values
    /// outside `[0, 1]` extrapolate along the same line.
    pub distance: f32,
    pub color: Color,
}

impl LensFlareElement {
    pub fn new(texture: FlareTexture, size: f32, distance: f32) -> Self {
        Self::with_color(texture, size, distance, Color::WHITE)
    }

    pub fn with_color(texture: FlareTexture, size: f32, distance: f32, color: Color) -> Self {
        Self {
            texture,
            size,
            distance,
            color,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LensFlare {
    elements: Vec<LensFlareElement>,
}

/// Light position after projection, for a light that passed the visibility checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlareProjection {
    /// Normalized device coordinates; `z` is the depth in `[0, 1]`.
    pub ndc: Vec3,
}

/// One element ready to draw, in normalized device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlareSprite {
    pub texture: FlareTexture,
    pub center: Vec2,
    /// Half extents of the sprite quad.
    pub scale: Vec2,
    pub color: Color,
}

impl LensFlare {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(&mut self, element: LensFlareElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[LensFlareElement] {
        &self.elements
    }

    /// Projects the light into the viewport. Returns `None` when the light is behind the
    /// camera or too close to the viewport edge.
    pub fn project(
        light_position: Vec3,
        camera: &PerspectiveCamera,
        viewport: Vec2,
    ) -> Option<FlareProjection> {
        if viewport.x <= 2.0 * EDGE_MARGIN_PX || viewport.y <= 2.0 * EDGE_MARGIN_PX {
            return None;
        }

        let view_position = camera.view_matrix().transform_point3(light_position);
        if view_position.z > 0.0 {
            return None;
        }

        let ndc = camera.projection_matrix().project_point3(view_position);
        if !ndc.is_finite() {
            return None;
        }

        let half_viewport = viewport * 0.5;
        let pixel = ndc.truncate() * half_viewport + half_viewport - Vec2::splat(EDGE_MARGIN_PX);
        let valid_max = viewport - Vec2::splat(2.0 * EDGE_MARGIN_PX);

        let inside = pixel.cmpge(Vec2::ZERO).all() && pixel.cmple(valid_max).all();
        inside.then_some(FlareProjection { ndc })
    }

    pub fn sprites<'a>(
        &'a self,
        projection: &FlareProjection,
        viewport: Vec2,
    ) -> impl Iterator<Item = FlareSprite> + 'a {
        let origin = projection.ndc.truncate();
        let mirror = origin * -2.0;

        self.elements.iter().map(move |element| FlareSprite {
            texture: element.texture,
            center: origin + mirror * element.distance,
            scale: Vec2::splat(element.size) / viewport,
            color: element.color,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(40.0, 4.0 / 3.0, 1.0, 15000.0);
        camera.position = Vec3::new(0.0, 0.0, 250.0);
        camera
    }

    const VIEWPORT: Vec2 = Vec2::new(800.0, 600.0);

    fn flare() -> LensFlare {
        let mut flare = LensFlare::new();
        flare.add_element(LensFlareElement::with_color(
            FlareTexture::Main,
            700.0,
            0.0,
            Color::from_hsl(0.08, 0.8, 0.5),
        ));
        flare.add_element(LensFlareElement::new(FlareTexture::Ring, 60.0, 0.6));
        flare.add_element(LensFlareElement::new(FlareTexture::Ring, 70.0, 1.0));
        flare
    }

    #[test]
    fn light_ahead_projects_to_center() {
        let projection =
            LensFlare::project(Vec3::new(0.0, 0.0, -1000.0), &camera(), VIEWPORT).unwrap();
        assert_abs_diff_eq!(projection.ndc.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(projection.ndc.y, 0.0, epsilon = 1e-5);
        assert!(projection.ndc.z > 0.0 && projection.ndc.z < 1.0);
    }

    #[test]
    fn light_behind_camera_is_skipped() {
        assert_eq!(
            LensFlare::project(Vec3::new(0.0, 0.0, 1000.0), &camera(), VIEWPORT),
            None
        );
    }

    #[test]
    fn light_off_screen_or_at_the_edge_is_skipped() {
        // Far to the right of the frustum
        assert_eq!(
            LensFlare::project(Vec3::new(5000.0, 0.0, -1000.0), &camera(), VIEWPORT),
            None
        );

        let camera = camera();
        let inverse_view_projection = camera.view_projection_matrix().inverse();
        let at_ndc = |x: f32| inverse_view_projection.project_point3(Vec3::new(x, 0.0, 0.5));

        // 796px from the left edge is inside the 8px margin
        assert_eq!(LensFlare::project(at_ndc(0.99), &camera, VIEWPORT), None);
        // 788px is not
        assert!(LensFlare::project(at_ndc(0.97), &camera, VIEWPORT).is_some());
    }

    #[test]
    fn sprites_are_mirrored_through_the_center() {
        let projection = FlareProjection {
            ndc: Vec3::new(0.5, -0.25, 0.9),
        };
        let sprites: Vec<_> = flare().sprites(&projection, VIEWPORT).collect();

        assert_eq!(sprites.len(), 3);
        assert!(sprites[0].center.abs_diff_eq(Vec2::new(0.5, -0.25), 1e-6));
        assert!(sprites[1].center.abs_diff_eq(Vec2::new(-0.1, 0.05), 1e-6));
        assert!(sprites[2].center.abs_diff_eq(Vec2::new(-0.5, 0.25), 1e-6));

        assert_eq!(sprites[0].texture, FlareTexture::Main);
        assert_eq!(sprites[0].color, Color::from_hsl(0.08, 0.8, 0.5));
        assert_eq!(sprites[1].color, Color::WHITE);
    }

    #[test]
    fn sprite_scale_is_in_pixels() {
        let projection = FlareProjection { ndc: Vec3::ZERO };
        let sprites: Vec<_> = flare().sprites(&projection, VIEWPORT).collect();

        // A 60px sprite spans 60px: half extent in NDC is 60 / 800 horizontally
        assert!(sprites[1].scale.abs_diff_eq(Vec2::new(60.0 / 800.0, 60.0 / 600.0), 1e-6));
    }

    #[test]
    fn distance_past_one_extrapolates_beyond_the_mirror_point() {
        let mut flare = LensFlare::new();
        flare.add_element(LensFlareElement::new(FlareTexture::Ring, 10.0, 1.5));
        flare.add_element(LensFlareElement::new(FlareTexture::Ring, 10.0, -0.5));

        let projection = FlareProjection {
            ndc: Vec3::new(0.5, -0.25, 0.9),
        };
        let sprites: Vec<_> = flare.sprites(&projection, VIEWPORT).collect();

        assert!(sprites[0].center.abs_diff_eq(Vec2::new(-1.0, 0.5), 1e-6));
        assert!(sprites[1].center.abs_diff_eq(Vec2::new(1.0, -0.5), 1e-6));
    }
}
