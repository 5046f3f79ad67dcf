mod allocator;
mod bounding_box;
mod par;

pub use self::allocator::*;
pub use self::bounding_box::*;
pub use self::par::*;
