use glam::{ivec2, uvec2, IVec2, UVec2, Vec4};

/// Storage image living in host memory.
///
/// Plays the role of a storage texture for the reference executor: per-pixel
/// kernels read from `&Image`s and return their outputs, so writes happen
/// only once a whole pass has finished.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T = Vec4> {
    size: UVec2,
    data: Vec<T>,
}

impl<T> Image<T>
where
    T: Copy + Default,
{
    pub fn new(size: UVec2) -> Self {
        Self {
            size,
            data: vec![T::default(); (size.x * size.y) as usize],
        }
    }

    pub fn from_fn(size: UVec2, f: impl FnMut(UVec2) -> T) -> Self {
        Self {
            size,
            data: Self::pixels(size).map(f).collect(),
        }
    }

    pub fn from_data(size: UVec2, data: Vec<T>) -> Self {
        assert_eq!((size.x * size.y) as usize, data.len());

        Self { size, data }
    }

    /// Iterates over all pixel coordinates of an image of given size, in
    /// row-major order.
    pub fn pixels(size: UVec2) -> impl Iterator<Item = UVec2> {
        (0..size.y).flat_map(move |y| (0..size.x).map(move |x| uvec2(x, y)))
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn contains(&self, pos: IVec2) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as u32) < self.size.x
            && (pos.y as u32) < self.size.y
    }

    /// Reads given pixel; coordinates are clamped to the image's edges.
    pub fn read(&self, pos: UVec2) -> T {
        let pos = uvec2(
            pos.x.min(self.size.x.saturating_sub(1)),
            pos.y.min(self.size.y.saturating_sub(1)),
        );

        self.data
            .get((pos.y * self.size.x + pos.x) as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Reads given pixel; out-of-bounds coordinates yield `None`.
    pub fn read_checked(&self, pos: IVec2) -> Option<T> {
        if self.contains(pos) {
            Some(self.read(pos.as_uvec2()))
        } else {
            None
        }
    }

    /// Reads given pixel, clamping signed coordinates to the image's edges.
    pub fn read_clamped(&self, pos: IVec2) -> T {
        let max = self.size.as_ivec2() - ivec2(1, 1);

        self.read(pos.clamp(IVec2::ZERO, max.max(IVec2::ZERO)).as_uvec2())
    }

    pub fn write(&mut self, pos: UVec2, value: T) {
        if pos.x < self.size.x && pos.y < self.size.y {
            self.data[(pos.y * self.size.x + pos.x) as usize] = value;
        }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }
}
