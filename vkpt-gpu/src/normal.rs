use glam::{vec2, vec3, Quat, Vec2, Vec3, Vec3Swizzles};

pub struct Normal;

impl Normal {
    /// Compresses normal from Vec3 into Vec2 using octahedron-normal mapping.
    pub fn encode(n: Vec3) -> Vec2 {
        let n = n / (n.x.abs() + n.y.abs() + n.z.abs()).max(crate::VKPT_EPSILON);

        let n = if n.z >= 0.0 {
            n.xy()
        } else {
            let mut t = 1.0 - n.yx().abs();

            t.x = t.x.copysign(n.x);
            t.y = t.y.copysign(n.y);
            t
        };

        n * 0.5 + 0.5
    }

    /// See: [`Self::encode()`].
    pub fn decode(n: Vec2) -> Vec3 {
        let n = n * 2.0 - 1.0;
        let mut n = vec3(n.x, n.y, 1.0 - n.x.abs() - n.y.abs());
        let t = (-n.z).max(0.0);

        n.x -= t.copysign(n.x);
        n.y -= t.copysign(n.y);
        n.normalize()
    }

    /// Packs normal into a single word as two 16-bit unorms.
    pub fn encode_u32(n: Vec3) -> u32 {
        let n = (Self::encode(n).clamp(Vec2::ZERO, Vec2::ONE) * 65535.0)
            .round()
            .as_uvec2();

        n.x | (n.y << 16)
    }

    /// See: [`Self::encode_u32()`].
    pub fn decode_u32(n: u32) -> Vec3 {
        let x = (n & 0xffff) as f32 / 65535.0;
        let y = (n >> 16) as f32 / 65535.0;

        Self::decode(vec2(x, y))
    }

    /// Returns which of the eight octants given normal points into; octant's
    /// bits are the signs of the normal's components.
    pub fn octant(n: Vec3) -> u32 {
        (n.x < 0.0) as u32 | (((n.y < 0.0) as u32) << 1) | (((n.z < 0.0) as u32) << 2)
    }
}

/// Tangent frame stored as a quaternion packed into a single word (four
/// signed bytes); the frame's `z` axis is the shading normal.
pub struct TangentFrame;

impl TangentFrame {
    pub fn encode(normal: Vec3, tangent: Vec3) -> u32 {
        let bitangent = normal.cross(tangent);
        let quat = Quat::from_mat3(&glam::Mat3::from_cols(tangent, bitangent, normal));
        let quat = if quat.w < 0.0 { -quat } else { quat };
        let quat = (glam::Vec4::from(quat).clamp(-glam::Vec4::ONE, glam::Vec4::ONE) * 127.0)
            .round()
            .as_ivec4();

        (quat.x as u8 as u32)
            | ((quat.y as u8 as u32) << 8)
            | ((quat.z as u8 as u32) << 16)
            | ((quat.w as u8 as u32) << 24)
    }

    /// Returns `(tangent, bitangent, normal)`.
    pub fn decode(packed: u32) -> (Vec3, Vec3, Vec3) {
        let byte = |shift: u32| ((packed >> shift) as u8 as i8) as f32 / 127.0;
        let quat = Quat::from_xyzw(byte(0), byte(8), byte(16), byte(24));

        let quat = if quat.length_squared() > crate::VKPT_EPSILON {
            quat.normalize()
        } else {
            Quat::IDENTITY
        };

        (quat * Vec3::X, quat * Vec3::Y, quat * Vec3::Z)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn encode_decode() {
        for n in [
            vec3(0.26, 0.53, 0.80),
            vec3(-0.26, 0.53, -0.80),
            vec3(0.0, 0.0, -1.0),
            vec3(1.0, 0.0, 0.0),
        ] {
            let n = n.normalize();
            let actual = Normal::decode_u32(Normal::encode_u32(n));

            assert_relative_eq!(n.x, actual.x, epsilon = 1e-3);
            assert_relative_eq!(n.y, actual.y, epsilon = 1e-3);
            assert_relative_eq!(n.z, actual.z, epsilon = 1e-3);
        }
    }

    #[test]
    fn octant() {
        assert_eq!(0, Normal::octant(vec3(1.0, 1.0, 1.0)));
        assert_eq!(1, Normal::octant(vec3(-1.0, 1.0, 1.0)));
        assert_eq!(6, Normal::octant(vec3(1.0, -1.0, -1.0)));
        assert_eq!(7, Normal::octant(vec3(-1.0, -1.0, -1.0)));
    }

    #[test]
    fn tangent_frame() {
        let normal = vec3(0.0, 1.0, 0.0);
        let tangent = vec3(1.0, 0.0, 0.0);
        let (t, _, n) = TangentFrame::decode(TangentFrame::encode(normal, tangent));

        assert!(t.dot(tangent) > 0.99);
        assert!(n.dot(normal) > 0.99);
    }
}
