use core::f32::consts::PI;

use glam::{vec2, vec3, UVec2, Vec2, Vec3};

/// Per-pixel pseudo-random number generator (PCG).
///
/// The whole state is a single word, so that it can be stored in the RNG-seed
/// image and replayed by gradient samples in the next frame.
#[derive(Copy, Clone, Debug)]
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32, id: UVec2) -> Self {
        Self {
            state: seed
                ^ 48619u32.wrapping_mul(id.x)
                ^ 95461u32.wrapping_mul(id.y),
        }
    }

    pub fn from_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Derives the per-pixel seed for given frame.
    pub fn seed(pixel: UVec2, frame: u32, salt: u32) -> u32 {
        let mut noise = Self::new(salt ^ frame.wrapping_mul(0x9e37_79b9), pixel);

        noise.sample_int()
    }

    /// Generates a uniform sample in range `<0.0, 1.0)`.
    pub fn sample(&mut self) -> f32 {
        (self.sample_int() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Generates a uniform sample in range `<0, u32::MAX>`.
    pub fn sample_int(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(747796405)
            .wrapping_add(2891336453);

        let word = ((self.state >> ((self.state >> 28) + 4)) ^ self.state)
            .wrapping_mul(277803737);

        (word >> 22) ^ word
    }

    /// Generates a uniform sample in range `<0, n)`.
    pub fn sample_index(&mut self, n: u32) -> u32 {
        ((self.sample() * n as f32) as u32).min(n.saturating_sub(1))
    }

    pub fn sample2(&mut self) -> Vec2 {
        vec2(self.sample(), self.sample())
    }

    /// Generates a uniform sample on a circle.
    pub fn sample_circle(&mut self) -> Vec2 {
        let angle = self.sample() * PI * 2.0;

        vec2(angle.cos(), angle.sin())
    }

    /// Generates a uniform sample inside of a disk.
    pub fn sample_disk(&mut self) -> Vec2 {
        let radius = self.sample().sqrt();

        self.sample_circle() * radius
    }

    /// Generates a cosine-weighted sample on a hemisphere around given
    /// normal; pdf is `cos(theta) / PI`.
    pub fn sample_cosine_hemisphere(&mut self, normal: Vec3) -> Vec3 {
        let disk = self.sample_disk();
        let z = (1.0 - disk.length_squared()).max(0.0).sqrt();
        let (t, b) = normal.any_orthonormal_pair();

        (t * disk.x + b * disk.y + normal * z).normalize()
    }

    /// Generates a uniform sample within a cone around `axis`; pdf is
    /// `1 / (2 * PI * (1 - cos_max))`.
    pub fn sample_cone(&mut self, axis: Vec3, cos_max: f32) -> Vec3 {
        let u = self.sample2();
        let cos_theta = 1.0 - u.x * (1.0 - cos_max);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = 2.0 * PI * u.y;
        let (t, b) = axis.any_orthonormal_pair();

        (t * (phi.cos() * sin_theta) + b * (phi.sin() * sin_theta) + axis * cos_theta)
            .normalize()
    }

    /// Generates uniformly distributed barycentric coordinates.
    pub fn sample_triangle(&mut self) -> Vec3 {
        let u = self.sample2();
        let su = u.x.sqrt();
        let b0 = 1.0 - su;
        let b1 = u.y * su;

        vec3(b0, b1, 1.0 - b0 - b1)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn samples_are_in_range() {
        let mut noise = Noise::new(0xcafebabe, UVec2::new(12, 34));

        for _ in 0..10_000 {
            let x = noise.sample();

            assert!((0.0..1.0).contains(&x));
            assert!(noise.sample_index(3) < 3);
        }
    }

    #[test]
    fn mean_is_one_half() {
        let mut noise = Noise::from_seed(1234);
        let mean = (0..100_000).map(|_| noise.sample()).sum::<f32>() / 100_000.0;

        assert_relative_eq!(0.5, mean, epsilon = 0.01);
    }

    #[test]
    fn replaying_seed_replays_sequence() {
        let seed = Noise::seed(UVec2::new(5, 7), 42, 0);
        let mut a = Noise::from_seed(seed);
        let mut b = Noise::from_seed(seed);

        for _ in 0..16 {
            assert_eq!(a.sample_int(), b.sample_int());
        }
    }

    #[test]
    fn barycentrics_sum_to_one() {
        let mut noise = Noise::from_seed(99);

        for _ in 0..1000 {
            let b = noise.sample_triangle();

            assert_relative_eq!(1.0, b.x + b.y + b.z, epsilon = 1e-5);
            assert!(b.min_element() >= -1e-6);
        }
    }
}
