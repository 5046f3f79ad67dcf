use glam::UVec2;
use rayon::prelude::*;

use crate::gpu::Image;

/// Evaluates `f` for every pixel of an image, in parallel.
pub fn par_image<T, F>(size: UVec2, f: F) -> Image<T>
where
    T: Copy + Default + Send,
    F: Fn(UVec2) -> T + Sync,
{
    Image::from_data(size, par_map(size, f))
}

/// Evaluates `f` for every pixel, in parallel; returns results in row-major
/// order.
pub fn par_map<T, F>(size: UVec2, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(UVec2) -> T + Sync,
{
    (0..size.x * size.y)
        .into_par_iter()
        .map(|idx| f(UVec2::new(idx % size.x, idx / size.x)))
        .collect()
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;

    #[test]
    fn par_image_is_row_major() {
        let size = uvec2(3, 2);
        let image = par_image(size, |pos| pos.x + 10 * pos.y);

        assert_eq!(0, image.read(uvec2(0, 0)));
        assert_eq!(2, image.read(uvec2(2, 0)));
        assert_eq!(12, image.read(uvec2(2, 1)));
    }
}
