//! Edge-avoiding a-trous wavelet filter applied to the temporally
//! accumulated lighting; every iteration doubles the kernel's footprint.

use glam::{ivec2, IVec2, UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::{
    AbImageId, AtrousChannel, FrameImages, PassContext, PingPong, Role, Sh,
    SurfaceSignature, Vec3Ext, VKPT_EPSILON,
};

const KERNEL: [f32; 3] = [0.25, 0.5, 0.25];

/// Relative depth difference corresponding to a unit of
/// `flt_atrous_depth`.
const DEPTH_SCALE: f32 = 100.0;

/// Geometry of a filter tap, compared against the center's.
#[derive(Clone, Copy, Debug)]
struct Tap {
    pos: UVec2,
    kernel: f32,
    signature: SurfaceSignature,
}

impl Tap {
    fn read(images: &FrameImages, pos: IVec2, kernel: f32) -> Option<Self> {
        let size = images.sizes().render.as_ivec2();

        if pos.x < 0 || pos.y < 0 || pos.x >= size.x || pos.y >= size.y {
            return None;
        }

        let pos = pos.as_uvec2();
        let signature = SurfaceSignature::read(images, Role::Current, pos);

        signature.is_some().then_some(Self {
            pos,
            kernel,
            signature,
        })
    }

    fn geometry_weight(&self, center: &SurfaceSignature, step: u32, depth: f32, normal_exp: f32) -> f32 {
        let rel = (center.depth - self.signature.depth).abs() / center.depth.max(VKPT_EPSILON);
        let w_depth = (-rel * depth * DEPTH_SCALE / step as f32).exp();
        let w_normal = center.normal.dot(self.signature.normal).max(0.0).powf(normal_exp);

        self.kernel * w_depth * w_normal
    }
}

/// Visits the taps of given iteration around `pixel`, center included.
fn for_each_tap(images: &FrameImages, pixel: UVec2, iteration: u32, mut f: impl FnMut(Tap)) {
    let step = 1 << iteration;

    for dy in -1..=1 {
        for dx in -1..=1 {
            let pos = pixel.as_ivec2() + ivec2(dx, dy) * step;
            let kernel = KERNEL[(dx + 1) as usize] * KERNEL[(dy + 1) as usize];

            if let Some(tap) = Tap::read(images, pos, kernel) {
                f(tap);
            }
        }
    }
}

/// Filters the LF channel; returns the `(sh, cocg)` texels.
pub fn atrous_lf(ctx: &PassContext, src: PingPong, iteration: u32, pixel: UVec2) -> (Vec4, Vec4) {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;
    let sh_image = images.image(AtrousChannel::LfSh.image(src));
    let cocg_image = images.image(AtrousChannel::LfCocg.image(src));
    let read = |pos| Sh::unpack(sh_image.read(pos), cocg_image.read(pos));

    let center = SurfaceSignature::read(images, Role::Current, pixel);
    let center_cocg = cocg_image.read(pixel);

    if !center.is_some() {
        return (sh_image.read(pixel), center_cocg);
    }

    let center_lum = read(pixel).luminance();
    let max_lum = center_lum * cvars.flt_atrous_deflicker_lf;
    let mut sum = Sh::default();
    let mut weight_sum = 0.0;

    for_each_tap(images, pixel, iteration, |tap| {
        let w = tap.geometry_weight(
            &center,
            1 << iteration,
            cvars.flt_atrous_depth,
            cvars.flt_atrous_normal_lf,
        );

        if w <= 0.0 {
            return;
        }

        let mut sh = read(tap.pos);

        // Taps much brighter than the center are pulled down, so that a single
        // firefly doesn't spread over the whole kernel
        if tap.pos != pixel && max_lum > 0.0 && sh.luminance() > max_lum {
            sh = sh.scale(max_lum / sh.luminance());
        }

        sum += sh.scale(w);
        weight_sum += w;
    });

    if weight_sum <= 0.0 {
        return (sh_image.read(pixel), center_cocg);
    }

    let sh = sum.scale(1.0 / weight_sum);

    (sh.y, sh.pack_co_cg(center_cocg.w))
}

/// Filters the HF channel; returns the `(color, moments)` texels.
///
/// Taps are additionally weighted by their luminance difference relative to
/// the center's standard deviation; the variance is filtered along.
pub fn atrous_hf(ctx: &PassContext, src: PingPong, iteration: u32, pixel: UVec2) -> (Vec4, Vec4) {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;
    let color_image = images.image(AtrousChannel::Hf.image(src));
    let moments_image = images.image(AtrousChannel::Moments.image(src));

    let center = SurfaceSignature::read(images, Role::Current, pixel);
    let center_color = color_image.read(pixel);
    let center_moments = moments_image.read(pixel);

    if !center.is_some() {
        return (center_color, center_moments);
    }

    let center_lum = center_color.xyz().luma();
    let sigma = cvars.flt_atrous_lum_hf * center_moments.w.max(0.0).sqrt() + VKPT_EPSILON;
    let mut color_sum = Vec3::ZERO;
    let mut variance_sum = 0.0;
    let mut weight_sum = 0.0;

    for_each_tap(images, pixel, iteration, |tap| {
        let color = color_image.read(tap.pos).xyz();
        let w_lum = (-(color.luma() - center_lum).abs() / sigma).exp();

        let w = w_lum
            * tap.geometry_weight(
                &center,
                1 << iteration,
                cvars.flt_atrous_depth,
                cvars.flt_atrous_normal_hf,
            );

        color_sum += color * w;
        variance_sum += moments_image.read(tap.pos).w * w * w;
        weight_sum += w;
    });

    if weight_sum <= 0.0 {
        return (center_color, center_moments);
    }

    (
        (color_sum / weight_sum).extend(center_color.w),
        center_moments
            .xyz()
            .extend(variance_sum / (weight_sum * weight_sum)),
    )
}

/// Filters the specular channel; taps are weighted by luminance and
/// roughness similarity besides the geometry.
pub fn atrous_spec(ctx: &PassContext, src: PingPong, iteration: u32, pixel: UVec2) -> Vec4 {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;
    let image = images.image(AtrousChannel::Spec.image(src));
    let roughness = |pos| images.read_ab(AbImageId::MetallicRoughness, Role::Current, pos).y;

    let center = SurfaceSignature::read(images, Role::Current, pixel);
    let center_color = image.read(pixel);

    if !center.is_some() {
        return center_color;
    }

    let center_lum = center_color.xyz().luma();
    let center_roughness = roughness(pixel);
    let mut sum = Vec3::ZERO;
    let mut weight_sum = 0.0;

    for_each_tap(images, pixel, iteration, |tap| {
        let color = image.read(tap.pos).xyz();
        let lum = color.luma();
        let sigma = cvars.flt_atrous_lum_spec * 0.05 * (lum + center_lum) + VKPT_EPSILON;
        let w_lum = (-(lum - center_lum).abs() / sigma).exp();

        let w_roughness = (-(roughness(tap.pos) - center_roughness).abs()
            * cvars.flt_atrous_roughness_spec)
            .exp();

        let w = w_lum
            * w_roughness
            * tap.geometry_weight(
                &center,
                1 << iteration,
                cvars.flt_atrous_depth,
                cvars.flt_atrous_normal_spec,
            );

        sum += color * w;
        weight_sum += w;
    });

    if weight_sum <= 0.0 {
        return center_color;
    }

    (sum / weight_sum).extend(center_color.w)
}
