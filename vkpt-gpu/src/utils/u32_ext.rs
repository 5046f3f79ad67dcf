use glam::{vec4, Vec4};

pub trait U32Ext
where
    Self: Sized,
{
    fn from_bytes(bytes: [u32; 4]) -> Self;
    fn to_bytes(self) -> [u32; 4];

    /// Packs a color with components in `<0.0, 1.0>` as RGBA8.
    fn from_unorm4x8(color: Vec4) -> Self;

    /// See: [`Self::from_unorm4x8()`].
    fn to_unorm4x8(self) -> Vec4;
}

impl U32Ext for u32 {
    fn from_bytes([a, b, c, d]: [u32; 4]) -> Self {
        a | (b << 8) | (c << 16) | (d << 24)
    }

    fn to_bytes(mut self) -> [u32; 4] {
        let a = self & 0xff;
        self >>= 8;
        let b = self & 0xff;
        self >>= 8;
        let c = self & 0xff;
        self >>= 8;
        let d = self & 0xff;

        [a, b, c, d]
    }

    fn from_unorm4x8(color: Vec4) -> Self {
        let color = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();

        u32::from_bytes([
            color.x as u32,
            color.y as u32,
            color.z as u32,
            color.w as u32,
        ])
    }

    fn to_unorm4x8(self) -> Vec4 {
        let [x, y, z, w] = self.to_bytes();

        vec4(x as f32, y as f32, z as f32, w as f32) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_to_bytes() {
        assert_eq!(0xcafebabe, u32::from_bytes(u32::to_bytes(0xcafebabe)));
    }

    #[test]
    fn unorm4x8() {
        let color = vec4(1.0, 0.0, 0.5, 0.25).clamp(Vec4::ZERO, Vec4::ONE);
        let actual = u32::from_unorm4x8(color).to_unorm4x8();

        assert!((actual - color).abs().max_element() < 1.0 / 255.0);
    }
}
