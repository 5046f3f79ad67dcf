//! Host side of vkpt's path tracer: scene tables, GPU resources, the pass
//! graph and a CPU reference renderer running the very same kernels.

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]

mod buffers;
mod bvh;
mod cvars;
mod error;
mod frame;
mod frame_resources;
mod geometry;
mod instances;
mod light_stats;
mod lights;
mod materials;
mod pass;
mod reference;
mod renderer;
mod scene;
mod shaders;
mod utils;

pub use vkpt_gpu as gpu;

pub use self::buffers::*;
pub use self::bvh::*;
pub use self::cvars::*;
pub use self::error::*;
pub use self::frame::*;
pub use self::frame_resources::*;
pub use self::geometry::*;
pub use self::instances::*;
pub use self::light_stats::*;
pub use self::lights::*;
pub use self::materials::*;
pub use self::pass::*;
pub use self::reference::*;
pub use self::renderer::*;
pub use self::scene::*;
pub use self::shaders::*;
pub use self::utils::*;
