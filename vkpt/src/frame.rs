use glam::{vec2, Mat4, UVec2, Vec2, Vec3, Vec4};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{gpu, CvarRegistry, Error, Result};

/// Number of distinct sub-pixel offsets primary rays cycle through.
const JITTER_SEQUENCE_LEN: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Camera {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Sun as seen by the renderer; `None` when it's below the horizon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sun {
    pub direction: Vec3,
    pub color: Vec3,
    pub angular_radius: f32,
}

/// Things that change between frames, apart from the scene itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameParams {
    pub camera: Camera,
    pub sun: Option<Sun>,
    pub environment: gpu::EnvironmentType,

    /// Size of the path-traced image
    pub render_size: UVec2,

    /// Size of the image after temporal upscaling
    pub output_size: UVec2,

    /// Seconds since the previous frame
    pub frame_time: f32,
}

/// Advances the frame counter and keeps the frame-related parts of
/// [`gpu::GlobalUbo`] up to date.
#[derive(Debug)]
pub struct FrameState {
    ubo: gpu::GlobalUbo,
    next_frame: u32,
    rng: StdRng,
}

impl FrameState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates state whose RNG salts are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            ubo: Default::default(),
            next_frame: 0,
            rng,
        }
    }

    /// Starts a new frame; returns its index.
    pub fn begin(&mut self, params: &FrameParams, cvars: &CvarRegistry) -> Result<u32> {
        for size in [params.render_size, params.output_size] {
            if size.x == 0 || size.y == 0 {
                return Err(Error::EmptyViewport(size));
            }
        }

        // Checkerboard fields are flattened into halves of the render width
        if params.render_size.x % 2 != 0 {
            return Err(Error::OddRenderWidth(params.render_size.x));
        }

        let frame = self.next_frame;
        let ubo = &mut self.ubo;
        let resized = ubo.size() != params.render_size || ubo.output_size() != params.output_size;

        if resized {
            info!(
                "Viewport resized; render={:?}, output={:?}",
                params.render_size, params.output_size
            );
        }

        let view_proj = params.camera.view_proj();

        if frame == 0 || resized {
            ubo.prev_view_proj = view_proj;
            ubo.prev_inv_view_proj = view_proj.inverse();
            ubo.prev_cam_pos = params.camera.position.extend(0.0);
        } else {
            ubo.prev_view_proj = ubo.view_proj;
            ubo.prev_inv_view_proj = ubo.inv_view_proj;
            ubo.prev_cam_pos = ubo.cam_pos;
        }

        ubo.view_proj = view_proj;
        ubo.inv_view_proj = view_proj.inverse();
        ubo.cam_pos = params.camera.position.extend(0.0);

        match params.sun {
            Some(sun) => {
                ubo.sun_direction = sun
                    .direction
                    .normalize_or_zero()
                    .extend(sun.angular_radius.cos());

                ubo.sun_color = sun.color.extend(1.0);
            }
            None => {
                ubo.sun_color = Vec4::ZERO;
            }
        }

        ubo.width = params.render_size.x;
        ubo.height = params.render_size.y;
        ubo.taa_output_width = params.output_size.x;
        ubo.taa_output_height = params.output_size.y;
        ubo.current_frame_idx = frame;
        ubo.pt_swap_checkerboard = gpu::checkerboard_parity(frame);
        ubo.environment_type = params.environment as u32;
        ubo.rng_salt = self.rng.gen();
        ubo.frame_time = params.frame_time;
        ubo.cvars = *cvars.cvars();

        ubo.sub_pixel_jitter = if ubo.cvars.flt_taa > 0.0 {
            jitter(frame)
        } else {
            Vec2::ZERO
        };

        debug!("Frame started; frame={frame}, checkerboard={}", ubo.pt_swap_checkerboard);

        self.next_frame = self.next_frame.wrapping_add(1);

        Ok(frame)
    }

    pub fn ubo(&self) -> &gpu::GlobalUbo {
        &self.ubo
    }

    pub fn ubo_mut(&mut self) -> &mut gpu::GlobalUbo {
        &mut self.ubo
    }

    pub fn sizes(&self) -> gpu::FrameSizes {
        gpu::FrameSizes::new(self.ubo.size(), self.ubo.output_size())
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Sub-pixel offset of given frame, in `<-0.5, 0.5>`; follows the (2, 3)
/// Halton sequence.
pub fn jitter(frame: u32) -> Vec2 {
    let idx = frame % JITTER_SEQUENCE_LEN + 1;

    vec2(halton(idx, 2), halton(idx, 3)) - 0.5
}

fn halton(mut idx: u32, base: u32) -> f32 {
    let mut f = 1.0;
    let mut r = 0.0;

    while idx > 0 {
        f /= base as f32;
        r += f * (idx % base) as f32;
        idx /= base;
    }

    r
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::uvec2;

    use super::*;

    fn params() -> FrameParams {
        FrameParams {
            camera: Default::default(),
            sun: None,
            environment: gpu::EnvironmentType::None,
            render_size: uvec2(8, 4),
            output_size: uvec2(16, 8),
            frame_time: 0.016,
        }
    }

    #[test]
    fn frames_advance() {
        let mut target = FrameState::with_seed(0);
        let cvars = CvarRegistry::new();

        for expected in 0..4 {
            let frame = target.begin(&params(), &cvars).unwrap();
            let ubo = target.ubo();

            assert_eq!(expected, frame);
            assert_eq!(frame, ubo.current_frame_idx);
            assert_eq!(frame & 1, ubo.pt_swap_checkerboard);
            assert_eq!(uvec2(8, 4), ubo.size());
            assert_eq!(uvec2(16, 8), ubo.output_size());
        }
    }

    #[test]
    fn empty_viewports_are_rejected() {
        let mut target = FrameState::with_seed(0);
        let cvars = CvarRegistry::new();

        let params = FrameParams {
            render_size: uvec2(0, 4),
            ..params()
        };

        assert!(matches!(
            target.begin(&params, &cvars),
            Err(Error::EmptyViewport(_))
        ));

        // Failed frames don't count
        assert_eq!(0, target.begin(&super::tests::params(), &cvars).unwrap());
    }

    #[test]
    fn odd_render_widths_are_rejected() {
        let mut target = FrameState::with_seed(0);
        let cvars = CvarRegistry::new();

        let params = FrameParams {
            render_size: uvec2(5, 4),
            ..params()
        };

        assert!(matches!(
            target.begin(&params, &cvars),
            Err(Error::OddRenderWidth(5))
        ));

        // Odd heights and output sizes are fine
        let params = FrameParams {
            render_size: uvec2(8, 5),
            output_size: uvec2(15, 9),
            ..super::tests::params()
        };

        assert_eq!(0, target.begin(&params, &cvars).unwrap());
    }

    #[test]
    fn previous_camera_is_kept() {
        let mut target = FrameState::with_seed(0);
        let cvars = CvarRegistry::new();

        let mut params = params();

        params.camera.view = Mat4::from_translation(Vec3::X);
        target.begin(&params, &cvars).unwrap();

        assert_eq!(target.ubo().view_proj, target.ubo().prev_view_proj);

        params.camera.view = Mat4::from_translation(Vec3::Y);
        target.begin(&params, &cvars).unwrap();

        assert_eq!(Mat4::from_translation(Vec3::X), target.ubo().prev_view_proj);
        assert_eq!(Mat4::from_translation(Vec3::Y), target.ubo().view_proj);
    }

    #[test]
    fn jitter_stays_within_pixel() {
        for frame in 0..32 {
            let j = jitter(frame);

            assert!(j.x.abs() <= 0.5 && j.y.abs() <= 0.5);
        }

        assert_relative_eq!(0.0, jitter(0).x);
        assert_eq!(jitter(3), jitter(3 + JITTER_SEQUENCE_LEN));
    }

    #[test]
    fn jitter_follows_taa() {
        let mut target = FrameState::with_seed(0);
        let mut cvars = CvarRegistry::new();

        cvars.set("flt_taa", 0.0).unwrap();
        target.begin(&params(), &cvars).unwrap();

        assert_eq!(Vec2::ZERO, target.ubo().sub_pixel_jitter);
    }
}
