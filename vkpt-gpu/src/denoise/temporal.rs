use glam::{ivec2, IVec2, UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::{
    antilag_alpha, flat_pos, gradient_output, gradient_stratum, is_traced,
    pixel_center, traced_field, AbImageId, BilinearFilter, FrameImages, ImageId,
    NoisySample, PassContext, Role, Sh, SurfaceSignature, Vec3Ext,
};

/// History length below which the HF variance is estimated spatially.
const MIN_TEMPORAL_VARIANCE_LEN: f32 = 4.0;

/// What the temporal pass writes at a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TemporalOutput {
    /// Accumulated lighting, i.e. the input of the a-trous iterations
    pub lf_sh: Vec4,
    pub lf_cocg: Vec4,
    pub hf: Vec4,
    pub spec: Vec4,

    /// HF moments: `(m1, m2, history length, variance)`
    pub moments: Vec4,

    /// Histories carried into the next frame
    pub hist_lf_sh: Vec4,
    pub hist_lf_cocg: Vec4,
    pub hist_moments_hf: Vec4,
}

/// Reprojected history of a pixel; `None` when every tap got rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
struct History {
    lf: Sh,
    lf_len: f32,
    hf: Vec3,
    moments: Vec4,
    spec: Vec3,
    spec_len: f32,
}

impl History {
    fn reproject(ctx: &PassContext, pixel: UVec2, curr: &SurfaceSignature) -> Option<Self> {
        let images = ctx.images;
        let cvars = &ctx.ubo.cvars;
        let size = images.sizes().render.as_ivec2();
        let motion = images.read(ImageId::PtMotion, pixel).xy();
        let prev_pos = pixel_center(pixel) - motion;

        let is_valid = |tap: IVec2| {
            if tap.cmplt(ivec2(0, 0)).any() || tap.cmpge(size).any() {
                return false;
            }

            let prev = SurfaceSignature::read(images, Role::History, tap.as_uvec2());

            curr.matches(&prev, cvars.flt_reproject_depth, cvars.flt_reproject_normal)
        };

        let gather = |read: &dyn Fn(UVec2) -> Vec4| {
            BilinearFilter::gather(prev_pos, |tap| {
                is_valid(tap).then(|| read(tap.as_uvec2()))
            })
        };

        let lf_sh = gather(&|tap| images.read_ab(AbImageId::HistColorLfSh, Role::History, tap));

        if !lf_sh.is_valid() {
            return None;
        }

        let lf_cocg =
            gather(&|tap| images.read_ab(AbImageId::HistColorLfCocg, Role::History, tap)).eval();

        let hf = gather(&|tap| images.read(ImageId::HistColorHf, tap)).eval();
        let moments =
            gather(&|tap| images.read_ab(AbImageId::HistMomentsHf, Role::History, tap)).eval();

        let spec =
            gather(&|tap| images.read_ab(AbImageId::FilteredSpec, Role::History, tap)).eval();

        Some(Self {
            lf: Sh::unpack(lf_sh.eval(), lf_cocg),
            lf_len: lf_cocg.w,
            hf: hf.xyz(),
            moments,
            spec: spec.xyz(),
            spec_len: spec.w,
        })
    }
}

/// Blend factor of a new sample, together with the updated history length.
fn accumulate(hist_len: f32, antilag: f32, min_alpha: f32, enabled: f32, max_len: f32) -> (f32, f32) {
    if enabled == 0.0 {
        return (1.0, 1.0);
    }

    let len = hist_len * (1.0 - antilag);
    let alpha = min_alpha.max(1.0 / (len + 1.0));

    (alpha, (len + 1.0).min(max_len))
}

/// Accumulates a pixel's noisy sample into its reprojected history, after
/// shortening the history according to temporal gradients.
///
/// Pixels not traced this frame keep their (reprojected) history unchanged;
/// when there's none, they are reconstructed from their traced neighbours.
pub fn temporal(ctx: &PassContext, pixel: UVec2) -> TemporalOutput {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;
    let curr = SurfaceSignature::read(images, Role::Current, pixel);

    if !curr.is_some() {
        return TemporalOutput::default();
    }

    let field = traced_field(ctx.ubo);
    let history = History::reproject(ctx, pixel, &curr);

    let (lf, lf_len, hf, hf_len, m1, m2, spec, spec_len) =
        match (is_traced(pixel, field), history) {
            (false, Some(hist)) => (
                hist.lf,
                hist.lf_len,
                hist.hf,
                hist.moments.z,
                hist.moments.x,
                hist.moments.y,
                hist.spec,
                hist.spec_len,
            ),

            (traced, history) => {
                let sample = if traced {
                    NoisySample::read(images, pixel)
                } else {
                    NoisySample::reconstruct(images, pixel, field)
                };

                let hf_luma = sample.hf.luma();

                let Some(hist) = history else {
                    return output(
                        images,
                        pixel,
                        sample.lf,
                        1.0,
                        sample.hf,
                        Vec4::new(hf_luma, hf_luma * hf_luma, 1.0, 0.0),
                        sample.spec,
                        1.0,
                    );
                };

                let stratum = gradient_stratum(pixel);
                let grad_lf = images.read(gradient_output(true), stratum);
                let grad_hf_spec = images.read(gradient_output(false), stratum);
                let max_len = cvars.flt_history_length_max;

                let (alpha_lf, lf_len) = accumulate(
                    hist.lf_len,
                    antilag_alpha(grad_lf.x, grad_lf.y, cvars.flt_antilag_lf),
                    cvars.flt_min_alpha_color_lf,
                    cvars.flt_temporal_lf,
                    max_len,
                );

                let antilag_hf =
                    antilag_alpha(grad_hf_spec.x, grad_hf_spec.y, cvars.flt_antilag_hf);

                let (alpha_hf, hf_len) = accumulate(
                    hist.moments.z,
                    antilag_hf,
                    cvars.flt_min_alpha_color_hf,
                    cvars.flt_temporal_hf,
                    max_len,
                );

                let (alpha_moments, _) = accumulate(
                    hist.moments.z,
                    antilag_hf,
                    cvars.flt_min_alpha_moments_hf,
                    cvars.flt_temporal_hf,
                    max_len,
                );

                let (alpha_spec, spec_len) = accumulate(
                    hist.spec_len,
                    antilag_alpha(grad_hf_spec.z, grad_hf_spec.w, cvars.flt_antilag_spec),
                    cvars.flt_min_alpha_color_spec,
                    cvars.flt_temporal_spec,
                    max_len,
                );

                (
                    hist.lf.lerp(sample.lf, alpha_lf),
                    lf_len,
                    hist.hf.lerp(sample.hf, alpha_hf),
                    hf_len,
                    hist.moments.x + (hf_luma - hist.moments.x) * alpha_moments,
                    hist.moments.y + (hf_luma * hf_luma - hist.moments.y) * alpha_moments,
                    hist.spec.lerp(sample.spec, alpha_spec),
                    spec_len,
                )
            }
        };

    output(
        images,
        pixel,
        lf,
        lf_len,
        hf,
        Vec4::new(m1, m2, hf_len, 0.0),
        spec,
        spec_len,
    )
}

fn output(
    images: &FrameImages,
    pixel: UVec2,
    lf: Sh,
    lf_len: f32,
    hf: Vec3,
    moments: Vec4,
    spec: Vec3,
    spec_len: f32,
) -> TemporalOutput {
    let variance = if moments.z < MIN_TEMPORAL_VARIANCE_LEN {
        spatial_variance(images, pixel)
    } else {
        (moments.y - moments.x * moments.x).max(0.0)
    };

    let hf = hf.sanitize();
    let spec = spec.sanitize();

    TemporalOutput {
        lf_sh: lf.y,
        lf_cocg: lf.pack_co_cg(lf_len),
        hf: hf.extend(0.0),
        spec: spec.extend(spec_len),
        moments: Vec4::new(moments.x, moments.y, moments.z, variance),
        hist_lf_sh: lf.y,
        hist_lf_cocg: lf.pack_co_cg(lf_len),
        hist_moments_hf: moments.truncate().extend(0.0),
    }
}

/// HF luminance variance of the traced pixels in a 3x3 neighbourhood.
fn spatial_variance(images: &FrameImages, pixel: UVec2) -> f32 {
    let size = images.sizes().render;
    let mut m1 = 0.0;
    let mut m2 = 0.0;
    let mut count = 0.0;

    for dy in -1..=1 {
        for dx in -1..=1 {
            let tap = pixel.as_ivec2() + ivec2(dx, dy);

            if tap.x < 0 || tap.y < 0 || tap.x as u32 >= size.x || tap.y as u32 >= size.y {
                continue;
            }

            let luma = images
                .read(ImageId::PtColorHf, flat_pos(tap.as_uvec2(), size.x))
                .xyz()
                .luma();

            m1 += luma;
            m2 += luma * luma;
            count += 1.0;
        }
    }

    if count == 0.0 {
        return 0.0;
    }

    (m2 / count - (m1 / count) * (m1 / count)).max(0.0)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec4};

    use super::*;
    use crate::{FrameSizes, GlobalUbo, Image, Normal};

    const SIZE: UVec2 = UVec2::new(4, 4);

    struct Scene {
        ubo: GlobalUbo,
        images: FrameImages,
    }

    /// Flat, static surface seen by every pixel during both frames; history
    /// stores `hist_hf` accumulated over `hist_len` frames, while the path
    /// tracer now returns `curr_hf`.
    fn scene(hist_hf: f32, hist_len: f32, curr_hf: f32, hist_depth: f32) -> Scene {
        let mut images = FrameImages::new(FrameSizes::new(SIZE, SIZE));
        let normal = Vec4::new(f32::from_bits(Normal::encode_u32(Vec3::Z)), 0.0, 0.0, 0.0);
        let fill = |value: Vec4| Image::from_fn(SIZE, |_| value);

        images.set_frame(0);
        images.store_ab(AbImageId::ViewDepth, fill(Vec4::splat(hist_depth)));
        images.store_ab(AbImageId::Normal, fill(normal));
        images.store_ab(
            AbImageId::HistMomentsHf,
            fill(vec4(hist_hf, hist_hf * hist_hf, hist_len, 0.0)),
        );
        images.store_ab(AbImageId::HistColorLfCocg, fill(vec4(0.0, 0.0, 0.0, hist_len)));
        images.store_ab(
            AbImageId::FilteredSpec,
            fill(Vec3::splat(hist_hf).extend(hist_len)),
        );

        images.store(ImageId::HistColorHf, fill(Vec4::splat(hist_hf)));

        images.set_frame(1);
        images.store_ab(AbImageId::ViewDepth, fill(Vec4::splat(10.0)));
        images.store_ab(AbImageId::Normal, fill(normal));
        images.store(ImageId::PtColorHf, fill(Vec4::splat(curr_hf)));
        images.store(ImageId::PtColorSpec, fill(Vec4::splat(curr_hf)));

        let ubo = GlobalUbo {
            width: SIZE.x,
            height: SIZE.y,
            current_frame_idx: 1,
            pt_swap_checkerboard: 1,
            ..Default::default()
        };

        Scene { ubo, images }
    }

    impl Scene {
        fn run(&self, pixel: UVec2) -> TemporalOutput {
            temporal(&PassContext::new(&self.ubo, &self.images), pixel)
        }
    }

    #[test]
    fn traced_pixels_accumulate() {
        let scene = scene(2.0, 3.0, 4.0, 10.0);

        // (1, 0) belongs to the traced field
        let out = scene.run(uvec2(1, 0));

        assert_relative_eq!(2.5, out.hf.x, epsilon = 1e-5);
        assert_relative_eq!(4.0, out.moments.z);
        assert_relative_eq!(4.0, out.hist_moments_hf.z);
        assert_relative_eq!(2.5, out.spec.x, epsilon = 1e-5);
        assert_relative_eq!(4.0, out.spec.w);
    }

    #[test]
    fn history_length_is_bounded() {
        let mut scene = scene(2.0, 300.0, 2.0, 10.0);

        scene.ubo.cvars.flt_history_length_max = 16.0;

        let out = scene.run(uvec2(1, 0));

        assert_eq!(16.0, out.moments.z);
        assert_relative_eq!(2.0, out.hf.x, epsilon = 1e-5);
    }

    #[test]
    fn gradients_discard_history() {
        let mut scene = scene(2.0, 3.0, 4.0, 10.0);

        scene.images.store(
            gradient_output(false),
            Image::from_fn(scene.images.sizes().gradient(), |_| vec4(2.0, 2.0, 0.0, 0.0)),
        );

        let out = scene.run(uvec2(1, 0));

        // HF lost its history, specular didn't
        assert_relative_eq!(4.0, out.hf.x, epsilon = 1e-5);
        assert_relative_eq!(1.0, out.moments.z);
        assert_relative_eq!(2.5, out.spec.x, epsilon = 1e-5);
    }

    #[test]
    fn disabled_accumulation_takes_new_samples() {
        let mut scene = scene(2.0, 3.0, 4.0, 10.0);

        scene.ubo.cvars.flt_temporal_hf = 0.0;

        let out = scene.run(uvec2(1, 0));

        assert_relative_eq!(4.0, out.hf.x);
        assert_relative_eq!(1.0, out.moments.z);
    }

    #[test]
    fn untraced_pixels_keep_history() {
        let scene = scene(2.0, 3.0, 4.0, 10.0);
        let out = scene.run(uvec2(0, 0));

        assert_relative_eq!(2.0, out.hf.x, epsilon = 1e-5);
        assert_relative_eq!(3.0, out.moments.z);
    }

    #[test]
    fn untraced_pixels_without_history_are_reconstructed() {
        // History was recorded for a surface much farther away
        let scene = scene(2.0, 3.0, 4.0, 100.0);
        let out = scene.run(uvec2(0, 0));

        assert_relative_eq!(4.0, out.hf.x, epsilon = 1e-5);
        assert_relative_eq!(1.0, out.moments.z);
    }

    #[test]
    fn misses_produce_nothing() {
        let mut scene = scene(2.0, 3.0, 4.0, 10.0);

        scene
            .images
            .store_ab(AbImageId::ViewDepth, Image::new(SIZE));

        assert_eq!(TemporalOutput::default(), scene.run(uvec2(1, 0)));
    }

    #[test]
    fn short_histories_estimate_variance_spatially() {
        let mut scene = scene(2.0, 0.0, 4.0, 100.0);

        scene.images.store(
            ImageId::PtColorHf,
            Image::from_fn(SIZE, |pos| Vec4::splat((pos.x % 2) as f32)),
        );

        let out = scene.run(uvec2(1, 1));

        assert!(out.moments.w > 0.0);
    }
}
