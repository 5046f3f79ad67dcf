use glam::{vec4, UVec2, Vec4};

use crate::{AbImageId, GradientSample, Noise, PassContext, Role};

/// Picks the random seed of given pixel.
///
/// Gradient samples take over the seed of the pixel they replay, so that
/// the replayed path makes the same random decisions as the original one;
/// everything else gets a fresh seed.
pub fn seed_rng(ctx: &PassContext, pixel: UVec2) -> Vec4 {
    let seed = match GradientSample::at_pixel(ctx.images, pixel) {
        Some(sample) => ctx
            .images
            .read_ab(AbImageId::RngSeed, Role::History, sample.prev_pixel)
            .x
            .to_bits(),

        None => Noise::seed(pixel, ctx.ubo.current_frame_idx, ctx.ubo.rng_salt),
    };

    vec4(f32::from_bits(seed), 0.0, 0.0, 0.0)
}

/// Random-number generator of given pixel, as seeded by [`seed_rng()`].
pub fn pixel_noise(ctx: &PassContext, pixel: UVec2) -> Noise {
    Noise::from_seed(
        ctx.images
            .read_ab(AbImageId::RngSeed, Role::Current, pixel)
            .x
            .to_bits(),
    )
}
