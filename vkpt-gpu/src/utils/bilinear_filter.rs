use glam::{ivec2, vec2, vec4, IVec2, Vec2, Vec4};

/// Four-tap bilinear filter where every tap can be individually rejected;
/// used to read history images at reprojected, fractional positions.
#[derive(Clone, Copy, Default)]
pub struct BilinearFilter {
    /// Sample at `f(x=0, y=0)`
    pub s00: Vec4,

    /// Sample at `f(x=1, y=0)`
    pub s10: Vec4,

    /// Sample at `f(x=0, y=1)`
    pub s01: Vec4,

    /// Sample at `f(x=1, y=1)`
    pub s11: Vec4,

    /// Validity of each sample (`0.0` or `1.0`)
    pub weights: Vec4,

    /// Fractional part of the position
    pub uv: Vec2,
}

impl BilinearFilter {
    /// Gathers taps around `pos` (in pixel-center coordinates); `sample`
    /// returns `None` for rejected or out-of-bounds taps.
    pub fn gather(pos: Vec2, sample: impl Fn(IVec2) -> Option<Vec4>) -> Self {
        let base = pos - vec2(0.5, 0.5);
        let p00 = ivec2(base.x.floor() as i32, base.y.floor() as i32);
        let uv = base - p00.as_vec2();

        let mut this = Self {
            uv,
            ..Default::default()
        };

        for (idx, offset) in Self::offsets().into_iter().enumerate() {
            if let Some(value) = sample(p00 + offset) {
                match idx {
                    0 => this.s00 = value,
                    1 => this.s10 = value,
                    2 => this.s01 = value,
                    _ => this.s11 = value,
                }

                this.weights[idx] = 1.0;
            }
        }

        this
    }

    pub fn offsets() -> [IVec2; 4] {
        [ivec2(0, 0), ivec2(1, 0), ivec2(0, 1), ivec2(1, 1)]
    }

    pub fn is_valid(&self) -> bool {
        self.weight_sum() > 0.0
    }

    /// Sum of bilinear weights of the accepted taps; `1.0` when all taps
    /// were accepted.
    pub fn weight_sum(&self) -> f32 {
        self.bilinear_weights().dot(Vec4::ONE)
    }

    pub fn eval(&self) -> Vec4 {
        let weights = self.bilinear_weights();
        let w_sum = weights.dot(Vec4::ONE);

        if w_sum <= 0.0 {
            Vec4::ZERO
        } else {
            (self.s00 * weights.x
                + self.s10 * weights.y
                + self.s01 * weights.z
                + self.s11 * weights.w)
                / w_sum
        }
    }

    fn bilinear_weights(&self) -> Vec4 {
        let uv = self.uv;

        self.weights
            * vec4(
                (1.0 - uv.x) * (1.0 - uv.y),
                uv.x * (1.0 - uv.y),
                (1.0 - uv.x) * uv.y,
                uv.x * uv.y,
            )
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn exact_position() {
        let filter = BilinearFilter::gather(vec2(2.5, 3.5), |pos| {
            Some(Vec4::splat((pos.x + 10 * pos.y) as f32))
        });

        assert_relative_eq!(32.0, filter.eval().x);
        assert_relative_eq!(1.0, filter.weight_sum());
    }

    #[test]
    fn interpolation() {
        let filter = BilinearFilter::gather(vec2(1.0, 0.5), |pos| {
            Some(Vec4::splat(pos.x as f32))
        });

        assert_relative_eq!(0.5, filter.eval().x);
    }

    #[test]
    fn rejected_taps_are_renormalized() {
        let filter = BilinearFilter::gather(vec2(1.0, 0.5), |pos| {
            (pos.x == 1).then(|| Vec4::splat(7.0))
        });

        assert_relative_eq!(7.0, filter.eval().x);
        assert_relative_eq!(0.5, filter.weight_sum());
    }

    #[test]
    fn all_taps_rejected() {
        let filter = BilinearFilter::gather(vec2(1.0, 1.0), |_| None);

        assert!(!filter.is_valid());
        assert_eq!(Vec4::ZERO, filter.eval());
    }
}
