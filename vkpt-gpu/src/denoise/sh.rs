use glam::{vec3, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use crate::{rgb_to_ycocg, ycocg_to_rgb};

const SH_L0: f32 = 0.282095;
const SH_L1: f32 = 0.488603;

/// Low-frequency lighting: first-order spherical harmonics of luminance plus
/// a single chroma pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sh {
    /// xyz: L1 coefficients, w: L0 coefficient
    pub y: Vec4,

    pub co_cg: Vec2,
}

impl Sh {
    /// Encodes radiance arriving from `dir`.
    pub fn from_radiance(color: Vec3, dir: Vec3) -> Self {
        let ycocg = rgb_to_ycocg(color);
        let lum = ycocg.x.max(0.0);

        Self {
            y: Vec4::new(SH_L1 * dir.x, SH_L1 * dir.y, SH_L1 * dir.z, SH_L0) * lum,
            co_cg: ycocg.yz(),
        }
    }

    /// Reads SH from the luminance and chroma images' texels.
    pub fn unpack(y: Vec4, co_cg: Vec4) -> Self {
        Self {
            y,
            co_cg: co_cg.xy(),
        }
    }

    /// Returns the chroma texel; `w` is free for the caller.
    pub fn pack_co_cg(&self, w: f32) -> Vec4 {
        self.co_cg.extend(0.0).extend(w)
    }

    /// Luminance of the L0 band, i.e. the direction-agnostic part.
    pub fn luminance(&self) -> f32 {
        self.y.w / SH_L0
    }

    /// Irradiance (over PI) of a surface with given normal.
    pub fn project(&self, n: Vec3) -> Vec3 {
        let d = self.y.xyz().dot(n);
        let lum = (2.0 * (1.023326 * d + 0.886226 * self.y.w)).max(0.0);
        let co_cg = self.co_cg * (lum * SH_L0 / (self.y.w + 1e-6));

        ycocg_to_rgb(vec3(lum, co_cg.x, co_cg.y)).max(Vec3::ZERO)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self {
            y: self.y * factor,
            co_cg: self.co_cg * factor,
        }
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            y: self.y.lerp(other.y, t),
            co_cg: self.co_cg.lerp(other.co_cg, t),
        }
    }
}

impl core::ops::Add for Sh {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            y: self.y + rhs.y,
            co_cg: self.co_cg + rhs.co_cg,
        }
    }
}

impl core::ops::AddAssign for Sh {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
