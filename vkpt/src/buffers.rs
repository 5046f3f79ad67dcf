mod bind_group;
mod double_buffered;
mod mapped_storage_buffer;
mod mapped_uniform_buffer;
mod texture;
mod unmapped_storage_buffer;

pub use self::bind_group::*;
pub use self::double_buffered::*;
pub use self::mapped_storage_buffer::*;
pub use self::mapped_uniform_buffer::*;
pub use self::texture::*;
pub use self::unmapped_storage_buffer::*;

/// Rounds buffer's size up, so that it's a valid (non-empty, 4-byte aligned)
/// binding.
fn pad_size(size: usize) -> usize {
    (size.max(16) + 15) & !15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_size() {
        assert_eq!(16, super::pad_size(0));
        assert_eq!(16, super::pad_size(4));
        assert_eq!(32, super::pad_size(17));
        assert_eq!(64, super::pad_size(64));
    }
}
