//! Temporal gradients: a few pixels per frame re-trace the previous frame's
//! sample (same surface, same random numbers) under the current lighting; the
//! difference tells how much the history can be trusted.

use glam::{ivec2, uvec2, vec4, UVec2, Vec3, Vec4};

use crate::{
    field_of, gradient_stratum, nearest_in_field, stratum_offset, stratum_pixel,
    traced_field, AbImageId, Camera, FrameImages, Image, NoisySample,
    PassContext, Role, SceneView, VisBuffer, GRAD_DWN,
};

const VALID_BIT: u32 = 1 << 31;
const OFFSET_SHIFT: u32 = 26;
const PREV_Y_SHIFT: u32 = 13;
const COORD_MASK: u32 = (1 << 13) - 1;

/// Gradient sample of a stratum, as stored in the gradient-position image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientSample {
    /// Position of the sample within its stratum
    pub offset: u32,

    /// Pixel the sample was traced at during the previous frame
    pub prev_pixel: UVec2,

    /// Luminances (LF, HF, specular) of the previous frame's sample
    pub prev_luminance: Vec3,
}

impl GradientSample {
    pub fn pack(&self) -> Vec4 {
        let word = VALID_BIT
            | (self.offset << OFFSET_SHIFT)
            | ((self.prev_pixel.y & COORD_MASK) << PREV_Y_SHIFT)
            | (self.prev_pixel.x & COORD_MASK);

        vec4(
            f32::from_bits(word),
            self.prev_luminance.x,
            self.prev_luminance.y,
            self.prev_luminance.z,
        )
    }

    pub fn unpack(texel: Vec4) -> Option<Self> {
        let word = texel.x.to_bits();

        if word & VALID_BIT == 0 {
            return None;
        }

        Some(Self {
            offset: (word >> OFFSET_SHIFT) & 0xf,
            prev_pixel: uvec2(word & COORD_MASK, (word >> PREV_Y_SHIFT) & COORD_MASK),
            prev_luminance: Vec3::new(texel.y, texel.z, texel.w),
        })
    }

    pub fn read(images: &FrameImages, role: Role, stratum: UVec2) -> Option<Self> {
        Self::unpack(images.read_ab(AbImageId::GradSmplPos, role, stratum))
    }

    /// Returns the gradient sample traced at given pixel during this frame,
    /// if that pixel has been chosen for one.
    pub fn at_pixel(images: &FrameImages, pixel: UVec2) -> Option<Self> {
        let stratum = gradient_stratum(pixel);

        Self::read(images, Role::Current, stratum)
            .filter(|sample| sample.pixel(stratum) == pixel)
    }

    /// Pixel of the stratum this sample lives at.
    pub fn pixel(&self, stratum: UVec2) -> UVec2 {
        stratum_pixel(stratum, self.offset)
    }
}

/// Picks the gradient samples of this frame.
///
/// Every stratum nominates the brightest of its pixels traced during the
/// previous frame (skipping the one that was a gradient sample itself, as
/// that one only replayed older data), whose surface is then projected
/// onto the current frame. The projected position gets snapped to the field
/// traced this frame; when two samples land in the same stratum, the first
/// one wins.
pub fn reproject_gradients(ctx: &PassContext, scene: &SceneView) -> Image {
    let images = ctx.images;
    let size = images.sizes().gradient();
    let render = images.sizes().render;
    let field = traced_field(ctx.ubo);
    let prev_field = field ^ 1;
    let camera = Camera::new(ctx.ubo);
    let mut out = Image::new(size);

    for stratum in Image::<Vec4>::pixels(size) {
        let excluded = GradientSample::read(images, Role::History, stratum)
            .map(|sample| sample.pixel(stratum));

        let mut best: Option<(UVec2, Vec3)> = None;

        for offset in 0..GRAD_DWN * GRAD_DWN {
            let pixel = stratum_pixel(stratum, offset);

            if pixel.x >= render.x
                || pixel.y >= render.y
                || field_of(pixel) != prev_field
                || Some(pixel) == excluded
            {
                continue;
            }

            if !VisBuffer::read(images, Role::History, pixel).is_some() {
                continue;
            }

            let lum = NoisySample::read(images, pixel).luminances();
            let is_brighter = best.map_or(true, |(_, best)| {
                lum.dot(Vec3::ONE) > best.dot(Vec3::ONE)
            });

            if is_brighter {
                best = Some((pixel, lum));
            }
        }

        let Some((prev_pixel, prev_luminance)) = best else {
            continue;
        };

        let Some(hit) = VisBuffer::read(images, Role::History, prev_pixel)
            .to_current(scene.instances)
            .and_then(|visbuf| visbuf.to_hit(0.0))
        else {
            continue;
        };

        let position = scene.fetch(&hit).position(hit.bary());

        let Some(target) = camera
            .world_to_screen(position)
            .and_then(|screen| nearest_in_field(screen, render, field))
        else {
            continue;
        };

        let target_stratum = gradient_stratum(target);

        if GradientSample::unpack(out.read(target_stratum)).is_some() {
            continue;
        }

        let sample = GradientSample {
            offset: stratum_offset(target),
            prev_pixel,
            prev_luminance,
        };

        out.write(target_stratum, sample.pack());
    }

    out
}

/// Computes raw gradients of a stratum: returns `(lf, hf_spec)` texels,
/// where every channel is a `(curr - prev, max(curr, prev))` pair.
pub fn gradient_image(ctx: &PassContext, stratum: UVec2) -> (Vec4, Vec4) {
    let Some(sample) = GradientSample::read(ctx.images, Role::Current, stratum) else {
        return (Vec4::ZERO, Vec4::ZERO);
    };

    let curr = NoisySample::read(ctx.images, sample.pixel(stratum)).luminances();
    let prev = sample.prev_luminance;
    let grad = curr - prev;
    let max = curr.max(prev);

    (
        vec4(grad.x, max.x, 0.0, 0.0),
        vec4(grad.y, max.y, grad.z, max.z),
    )
}

/// One a-trous iteration over the gradient images; strata without gradient
/// samples don't contribute.
pub fn gradient_atrous(lf: &Image, hf_spec: &Image, stratum: UVec2, iteration: u32) -> (Vec4, Vec4) {
    const KERNEL: [f32; 3] = [0.25, 0.5, 0.25];

    let step = 1 << iteration;
    let mut lf_sum = Vec4::ZERO;
    let mut lf_weight = 0.0;
    let mut hf_sum = Vec4::ZERO;
    let mut hf_weight = 0.0;
    let mut spec_sum = Vec4::ZERO;
    let mut spec_weight = 0.0;

    for dy in -1..=1 {
        for dx in -1..=1 {
            let pos = stratum.as_ivec2() + ivec2(dx, dy) * step;
            let w = KERNEL[(dx + 1) as usize] * KERNEL[(dy + 1) as usize];

            if let Some(texel) = lf.read_checked(pos) {
                if texel.y > 0.0 {
                    lf_sum += texel * w;
                    lf_weight += w;
                }
            }

            if let Some(texel) = hf_spec.read_checked(pos) {
                if texel.y > 0.0 {
                    hf_sum += texel * w;
                    hf_weight += w;
                }

                if texel.w > 0.0 {
                    spec_sum += texel * w;
                    spec_weight += w;
                }
            }
        }
    }

    let lf = if lf_weight > 0.0 {
        lf_sum / lf_weight
    } else {
        Vec4::ZERO
    };

    let hf = if hf_weight > 0.0 {
        hf_sum / hf_weight
    } else {
        Vec4::ZERO
    };

    let spec = if spec_weight > 0.0 {
        spec_sum / spec_weight
    } else {
        Vec4::ZERO
    };

    (lf, vec4(hf.x, hf.y, spec.z, spec.w))
}

/// Anti-lag factor of a single channel: `0.0` keeps the history, `1.0`
/// discards it.
pub fn antilag_alpha(grad: f32, max: f32, strength: f32) -> f32 {
    if max <= 0.0 {
        return 0.0;
    }

    (grad.abs() / max * strength).clamp(0.0, 1.0)
}
