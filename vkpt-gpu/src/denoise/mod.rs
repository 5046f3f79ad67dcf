//! Denoiser: temporal gradients, temporal accumulation with anti-lag,
//! a-trous filtering, composition, TAA and tone mapping.
//!
//! Every kernel is a function of a single pixel that reads [`FrameImages`]
//! and returns what the pass writes there.

mod atrous;
mod compose;
mod gradient;
mod sh;
mod taa;
mod temporal;
mod tonemap;

use glam::{UVec2, Vec3};

pub use self::atrous::*;
pub use self::compose::*;
pub use self::gradient::*;
pub use self::sh::*;
pub use self::taa::*;
pub use self::temporal::*;
pub use self::tonemap::*;
use crate::{
    flat_pos, is_traced, traced_neighbours, FrameImages, GlobalUbo, ImageId,
    Vec3Ext,
};

/// What every denoiser kernel gets to see.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    pub ubo: &'a GlobalUbo,
    pub images: &'a FrameImages,
}

impl<'a> PassContext<'a> {
    pub fn new(ubo: &'a GlobalUbo, images: &'a FrameImages) -> Self {
        Self { ubo, images }
    }
}

/// Path tracer's output for a single pixel, before any filtering.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoisySample {
    pub lf: Sh,
    pub hf: Vec3,
    pub spec: Vec3,
}

impl NoisySample {
    /// Reads the most recent sample of given pixel.
    pub fn read(images: &FrameImages, pixel: UVec2) -> Self {
        let pos = flat_pos(pixel, images.sizes().render.x);

        Self {
            lf: Sh::unpack(
                images.read(ImageId::PtColorLfSh, pos),
                images.read(ImageId::PtColorLfCocg, pos),
            ),
            hf: images.read(ImageId::PtColorHf, pos).truncate(),
            spec: images.read(ImageId::PtColorSpec, pos).truncate(),
        }
    }

    /// Reads sample of given pixel if it has been traced during this frame,
    /// otherwise averages its traced horizontal neighbours.
    pub fn reconstruct(images: &FrameImages, pixel: UVec2, field: u32) -> Self {
        if is_traced(pixel, field) {
            return Self::read(images, pixel);
        }

        let size = images.sizes().render;
        let mut sum = Self::default();
        let mut count = 0.0;

        for neighbour in traced_neighbours(pixel) {
            if neighbour.x < 0 || neighbour.x as u32 >= size.x {
                continue;
            }

            let sample = Self::read(images, neighbour.as_uvec2());

            sum.lf += sample.lf;
            sum.hf += sample.hf;
            sum.spec += sample.spec;
            count += 1.0;
        }

        if count > 0.0 {
            Self {
                lf: sum.lf.scale(1.0 / count),
                hf: sum.hf / count,
                spec: sum.spec / count,
            }
        } else {
            sum
        }
    }

    /// Luminances of the LF, HF and specular channels.
    pub fn luminances(&self) -> Vec3 {
        Vec3::new(self.lf.luminance(), self.hf.luma(), self.spec.luma())
    }
}

#[cfg(test)]
mod tests {
    use glam::{uvec2, vec3, Vec4};

    use super::*;
    use crate::{FrameSizes, Image};

    #[test]
    fn untraced_pixels_average_their_neighbours() {
        let size = uvec2(8, 2);
        let mut images = FrameImages::new(FrameSizes::new(size, size));

        let hf = Image::from_fn(size, |pos| {
            // `pos` is a flattened position; store the pixel's x
            let pixel = crate::unflat_pos(pos, size.x);

            Vec4::new(pixel.x as f32, 0.0, 0.0, 0.0)
        });

        images.store(ImageId::PtColorHf, hf);

        // (3, 0) belongs to field 1
        let traced = NoisySample::reconstruct(&images, uvec2(3, 0), 1);
        let filled = NoisySample::reconstruct(&images, uvec2(3, 0), 0);

        assert_eq!(vec3(3.0, 0.0, 0.0), traced.hf);
        assert_eq!(vec3(3.0, 0.0, 0.0), filled.hf);

        // Left edge has a single neighbour
        let filled = NoisySample::reconstruct(&images, uvec2(0, 0), 1);

        assert_eq!(vec3(1.0, 0.0, 0.0), filled.hf);
    }
}
