//! Temporal anti-aliasing with optional upscaling from the render to the
//! output resolution.

use glam::{ivec2, IVec2, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::{
    lerp, pixel_center, rgb_to_ycocg, ycocg_to_rgb, AbImageId, BilinearFilter,
    Image, ImageId, PassContext, Role, Vec3Ext,
};

/// Mode selected by `flt_taa`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaaMode {
    /// Color is copied (and resampled, if the sizes differ)
    Off,

    Regular,

    /// Accumulates into the output resolution, which may exceed the render
    /// one
    Upscale,
}

impl TaaMode {
    pub fn from_cvar(value: f32) -> Self {
        if value < 0.5 {
            TaaMode::Off
        } else if value < 1.5 {
            TaaMode::Regular
        } else {
            TaaMode::Upscale
        }
    }
}

fn sample_bilinear(image: &Image, pos: Vec2) -> Vec4 {
    BilinearFilter::gather(pos, |tap| Some(image.read_clamped(tap))).eval()
}

/// Runs TAA for given pixel of the output image; the result is written both
/// into the TAA output and the TAA history.
pub fn taa(ctx: &PassContext, pixel: UVec2) -> Vec4 {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;
    let sizes = images.sizes();
    let color = images.image(ImageId::Color);
    let scale = sizes.render.as_vec2() / sizes.output.as_vec2();
    let render_pos = pixel_center(pixel) * scale;

    let current = if sizes.render == sizes.output {
        color.read(pixel).xyz()
    } else {
        sample_bilinear(color, render_pos).xyz()
    };

    if TaaMode::from_cvar(cvars.flt_taa) == TaaMode::Off {
        return current.sanitize().extend(1.0);
    }

    // Neighbourhood statistics, in YCoCg
    let center = render_pos.floor().as_ivec2();
    let mut m1 = Vec3::ZERO;
    let mut m2 = Vec3::ZERO;
    let mut nmin = Vec3::splat(f32::MAX);
    let mut nmax = Vec3::splat(f32::MIN);

    for dy in -1..=1 {
        for dx in -1..=1 {
            let offset = ivec2(dx, dy);
            let tap = rgb_to_ycocg(color.read_clamped(center + offset).xyz());

            m1 += tap;
            m2 += tap * tap;

            if offset != IVec2::ZERO {
                nmin = nmin.min(tap);
                nmax = nmax.max(tap);
            }
        }
    }

    let mean = m1 / 9.0;
    let var = (m2 / 9.0 - mean * mean).max(Vec3::ZERO);
    let std = Vec3::new(var.x.sqrt(), var.y.sqrt(), var.z.sqrt());

    // A pixel brighter than all its neighbours is most likely a firefly
    let current = rgb_to_ycocg(current);
    let current = lerp(current, current.clamp(nmin, nmax), cvars.flt_taa_anti_sparkle);

    let motion = images
        .read(ImageId::PtMotion, center.max(IVec2::ZERO).as_uvec2())
        .xy()
        / scale;

    let prev_pos = pixel_center(pixel) - motion;
    let history_image = images.ab(AbImageId::TaaHistory, Role::History);

    let history = BilinearFilter::gather(prev_pos, |tap| history_image.read_checked(tap))
        .eval()
        .xyz();

    let has_history = prev_pos.cmpge(Vec2::ZERO).all()
        && prev_pos.cmplt(sizes.output.as_vec2()).all()
        && history != Vec3::ZERO;

    let result = if has_history {
        let variance = cvars.flt_taa_variance;
        let history = rgb_to_ycocg(history).clip(mean - variance * std, mean + variance * std);

        lerp(current, history, cvars.flt_taa_history_weight)
    } else {
        current
    };

    ycocg_to_rgb(result).max(Vec3::ZERO).sanitize().extend(1.0)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec3};

    use super::*;
    use crate::{FrameImages, FrameSizes, GlobalUbo};

    fn run(
        render: UVec2,
        output: UVec2,
        color: impl FnMut(UVec2) -> Vec4,
        history: Option<Vec4>,
        mode: f32,
        pixel: UVec2,
    ) -> Vec4 {
        let mut images = FrameImages::new(FrameSizes::new(render, output));

        images.set_frame(0);

        if let Some(history) = history {
            images.store_ab(AbImageId::TaaHistory, Image::from_fn(output, |_| history));
        }

        images.set_frame(1);
        images.store(ImageId::Color, Image::from_fn(render, color));

        let mut ubo = GlobalUbo {
            width: render.x,
            height: render.y,
            taa_output_width: output.x,
            taa_output_height: output.y,
            current_frame_idx: 1,
            ..Default::default()
        };

        ubo.cvars.flt_taa = mode;

        taa(&PassContext::new(&ubo, &images), pixel)
    }

    #[test]
    fn off_copies() {
        let size = uvec2(4, 4);
        let actual = run(
            size,
            size,
            |pos| Vec4::splat(pos.x as f32),
            Some(Vec4::splat(100.0)),
            0.0,
            uvec2(2, 1),
        );

        assert_eq!(vec3(2.0, 2.0, 2.0), actual.xyz());
    }

    #[test]
    fn off_resamples() {
        let actual = run(
            uvec2(2, 2),
            uvec2(4, 4),
            |pos| Vec4::splat(pos.x as f32),
            None,
            0.0,
            uvec2(1, 0),
        );

        // Output pixel (1, 0) sits at render position (0.75, 0.25)
        assert_relative_eq!(0.25, actual.x, epsilon = 1e-5);
    }

    #[test]
    fn stable_history_is_kept() {
        let size = uvec2(4, 4);
        let actual = run(
            size,
            size,
            |_| Vec4::splat(0.5),
            Some(Vec4::splat(0.5)),
            1.0,
            uvec2(1, 1),
        );

        assert_relative_eq!(0.5, actual.x, epsilon = 1e-5);
    }

    #[test]
    fn outlying_history_gets_clipped() {
        let size = uvec2(4, 4);
        let actual = run(
            size,
            size,
            |_| Vec4::splat(0.5),
            Some(Vec4::splat(50.0)),
            1.0,
            uvec2(1, 1),
        );

        assert_relative_eq!(0.5, actual.x, epsilon = 1e-3);
    }

    #[test]
    fn sparkles_are_suppressed() {
        let size = uvec2(5, 5);
        let color = |pos: UVec2| {
            if pos == uvec2(2, 2) {
                Vec4::splat(100.0)
            } else {
                Vec4::splat(1.0)
            }
        };

        let actual = run(size, size, color, None, 1.0, uvec2(2, 2));

        // Default anti-sparkle strength of 0.25 pulls it a quarter of the way
        // towards its neighbours
        assert_relative_eq!(75.25, actual.x, epsilon = 1e-2);
    }

    #[test]
    fn output_is_finite() {
        let size = uvec2(3, 3);
        let actual = run(
            size,
            size,
            |_| Vec4::splat(f32::NAN),
            Some(Vec4::splat(1.0)),
            2.0,
            uvec2(1, 1),
        );

        assert!(actual.is_finite());
    }

    #[test]
    fn modes() {
        assert_eq!(TaaMode::Off, TaaMode::from_cvar(0.0));
        assert_eq!(TaaMode::Regular, TaaMode::from_cvar(1.0));
        assert_eq!(TaaMode::Upscale, TaaMode::from_cvar(2.0));
    }
}
