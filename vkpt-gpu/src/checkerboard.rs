//! Checkerboard interleaving: every frame traces only one of the two
//! checkerboard fields, the other one gets reconstructed from history.
//!
//! Noisy lighting images are stored "flattened": pixels of field 0 occupy
//! the left half of the image and pixels of field 1 the right one, so that a
//! frame's samples are contiguous. Both halves are `div_ceil(width, 2)` wide,
//! which matches the image's width only when that width is even.

use glam::{uvec2, IVec2, UVec2, Vec2};

use crate::GlobalUbo;

/// Returns the field (`0` or `1`) given pixel belongs to.
pub fn field_of(pixel: UVec2) -> u32 {
    (pixel.x + pixel.y) & 1
}

/// Returns the field traced during given frame.
pub fn traced_field(ubo: &GlobalUbo) -> u32 {
    ubo.pt_swap_checkerboard & 1
}

/// Value of `pt_swap_checkerboard` for given frame.
pub fn checkerboard_parity(frame: u32) -> u32 {
    frame & 1
}

/// Number of launches per frame (half the screen, rounded up).
pub fn launch_size(size: UVec2) -> UVec2 {
    uvec2(crate::div_ceil(size.x, 2), size.y)
}

/// Maps launch index of the ray-generation stage into a screen pixel of
/// given field.
pub fn launch_to_pixel(launch: UVec2, field: u32) -> UVec2 {
    uvec2(2 * launch.x + ((launch.y + field) & 1), launch.y)
}

/// Inverse of [`launch_to_pixel()`].
pub fn pixel_to_launch(pixel: UVec2) -> UVec2 {
    uvec2(pixel.x / 2, pixel.y)
}

/// Position of given pixel within a flattened image of given width.
pub fn flat_pos(pixel: UVec2, width: u32) -> UVec2 {
    uvec2(pixel.x / 2 + field_of(pixel) * flat_half(width), pixel.y)
}

/// Inverse of [`flat_pos()`].
pub fn unflat_pos(pos: UVec2, width: u32) -> UVec2 {
    let half = flat_half(width);
    let (field, x) = if pos.x >= half {
        (1, pos.x - half)
    } else {
        (0, pos.x)
    };

    launch_to_pixel(uvec2(x, pos.y), field)
}

fn flat_half(width: u32) -> u32 {
    crate::div_ceil(width, 2)
}

/// Returns whether given pixel gets path-traced during a frame tracing
/// `field`.
pub fn is_traced(pixel: UVec2, field: u32) -> bool {
    field_of(pixel) == field
}

/// Horizontal neighbours of an untraced pixel; both belong to the traced
/// field.
pub fn traced_neighbours(pixel: UVec2) -> [IVec2; 2] {
    let pixel = pixel.as_ivec2();

    [pixel - IVec2::X, pixel + IVec2::X]
}

/// Pixel of given field nearest to a screen position; when the pixel under
/// the position belongs to the other field, its horizontal neighbour on the
/// closer side is taken.
pub fn nearest_in_field(screen_pos: Vec2, size: UVec2, field: u32) -> Option<UVec2> {
    if screen_pos.x < 0.0 || screen_pos.y < 0.0 {
        return None;
    }

    let pixel = screen_pos.floor().as_uvec2();

    if pixel.x >= size.x || pixel.y >= size.y {
        return None;
    }

    if field_of(pixel) == field {
        return Some(pixel);
    }

    let right = pixel.x + 1 < size.x;
    let left = pixel.x > 0;

    let x = match (screen_pos.x - pixel.x as f32 >= 0.5, left, right) {
        (true, _, true) | (false, false, true) => pixel.x + 1,
        (false, true, _) | (true, true, false) => pixel.x - 1,
        _ => return None,
    };

    Some(uvec2(x, pixel.y))
}
