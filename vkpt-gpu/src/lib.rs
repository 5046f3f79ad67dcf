//! Common structs, layouts and algorithms used by vkpt's shaders and host.
//!
//! Everything here is written against plain slices and [`Image`]s, so the
//! same code drives the reference executor and the tests.

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::too_many_arguments)]

mod bindings;
mod brdf;
mod camera;
mod checkerboard;
mod cvars;
mod denoise;
mod environment;
mod frame;
mod gbuffer;
mod geometry;
mod global_ubo;
mod instance;
mod layout;
mod light;
mod light_stats;
mod material;
mod noise;
mod normal;
mod path_tracer;
mod registry;
mod render_mode;
mod scene;
mod surface;
mod utils;

pub use self::bindings::*;
pub use self::brdf::*;
pub use self::camera::*;
pub use self::checkerboard::*;
pub use self::cvars::*;
pub use self::denoise::*;
pub use self::environment::*;
pub use self::frame::*;
pub use self::gbuffer::*;
pub use self::geometry::*;
pub use self::global_ubo::*;
pub use self::instance::*;
pub use self::layout::*;
pub use self::light::*;
pub use self::light_stats::*;
pub use self::material::*;
pub use self::noise::*;
pub use self::normal::*;
pub use self::path_tracer::*;
pub use self::registry::*;
pub use self::render_mode::*;
pub use self::scene::*;
pub use self::surface::*;
pub use self::utils::*;

pub mod prelude {
    pub use core::f32::consts::PI;

    pub use glam::*;

    pub use crate::*;
}

/// Largest value a path tracer's output channel may carry.
pub const MAX_OUTPUT_VALUE: f32 = 1000.0;

/// Size of a gradient stratum (in pixels, along each axis).
pub const GRAD_DWN: u32 = 3;

/// Number of a-trous iterations applied to the gradient images.
pub const GRAD_ITERATIONS: u32 = 4;

/// Number of rotating light-statistics buffers.
pub const NUM_LIGHT_STATS_BUFFERS: u32 = 3;

/// Number of frames for which per-cluster light counts are retained: the
/// frame being rendered, the previous one and the upload in flight.
pub const LIGHT_COUNT_HISTORY: u32 = 3;

pub const VKPT_EPSILON: f32 = 0.0001;
