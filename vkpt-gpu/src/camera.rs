use glam::{vec2, Mat4, UVec2, Vec2, Vec3, Vec4Swizzles};

use crate::{GlobalUbo, Ray};

/// View of the camera-related fields of [`GlobalUbo`].
#[derive(Clone, Copy)]
pub struct Camera<'a> {
    ubo: &'a GlobalUbo,
}

impl<'a> Camera<'a> {
    pub fn new(ubo: &'a GlobalUbo) -> Self {
        Self { ubo }
    }

    pub fn screen_size(&self) -> Vec2 {
        self.ubo.size().as_vec2()
    }

    pub fn position(&self) -> Vec3 {
        self.ubo.camera_position()
    }

    /// Casts a ray through given pixel, offset by the frame's sub-pixel
    /// jitter.
    pub fn ray(&self, pixel: UVec2) -> Ray {
        let screen_pos = pixel.as_vec2() + vec2(0.5, 0.5) + self.ubo.sub_pixel_jitter;

        self.ray_through(screen_pos)
    }

    /// Casts a ray through given screen-coordinates.
    pub fn ray_through(&self, screen_pos: Vec2) -> Ray {
        let ndc = screen_pos / self.screen_size() * 2.0 - Vec2::ONE;
        let ndc = vec2(ndc.x, -ndc.y);
        let origin = self.position();
        let far = self.ubo.inv_view_proj.project_point3(ndc.extend(1.0));
        let near = self.ubo.inv_view_proj.project_point3(ndc.extend(0.0));

        let direction = (far - near).try_normalize().unwrap_or(Vec3::Z);

        Ray::new(origin, direction)
    }

    /// Given a point in world-coordinates, returns it in screen-coordinates
    /// of the current frame; `None` if it's behind the camera.
    pub fn world_to_screen(&self, pos: Vec3) -> Option<Vec2> {
        project(self.ubo.view_proj, self.screen_size(), pos)
    }

    /// Same as [`Self::world_to_screen()`], but for the previous frame's
    /// camera.
    pub fn prev_world_to_screen(&self, pos: Vec3) -> Option<Vec2> {
        project(self.ubo.prev_view_proj, self.screen_size(), pos)
    }

    /// Screen-space motion (in pixels, from previous to current frame) of a
    /// point currently at `pos` and previously at `prev_pos`.
    pub fn motion(&self, pos: Vec3, prev_pos: Vec3) -> Vec2 {
        match (self.world_to_screen(pos), self.prev_world_to_screen(prev_pos)) {
            (Some(curr), Some(prev)) => curr - prev,
            _ => Vec2::ZERO,
        }
    }

    /// Distance of a point along the view direction.
    pub fn view_depth(&self, pos: Vec3) -> f32 {
        (pos - self.position()).length()
    }
}

fn project(view_proj: Mat4, screen_size: Vec2, pos: Vec3) -> Option<Vec2> {
    let clip = view_proj * pos.extend(1.0);

    if clip.w <= 0.0 {
        return None;
    }

    let ndc = clip.xy() / clip.w;
    let ndc = vec2(ndc.x, -ndc.y);

    Some((0.5 * ndc + 0.5) * screen_size)
}
