//! Path tracer: primary visibility, next-event estimation and a single
//! bounce of indirect lighting, written into the noisy channels the
//! denoiser consumes.

mod direct;
mod path_tracing;
mod primary_rays;
mod seed_rng;

#[cfg(test)]
mod test_scene;

use glam::Vec3;

pub use self::direct::*;
pub use self::path_tracing::*;
pub use self::primary_rays::*;
pub use self::seed_rng::*;
use crate::{
    Camera, FrameImages, GlobalUbo, HitPayload, LightSampler, LightStatsView,
    LightsView, SceneView, Surface, Triangle, Vec3Ext, MAX_OUTPUT_VALUE,
};

/// Everything the path-tracer kernels need to look at.
#[derive(Clone, Copy)]
pub struct TraceContext<'a> {
    pub ubo: &'a GlobalUbo,
    pub scene: SceneView<'a>,
    pub lights: LightSampler<'a>,
    pub images: &'a FrameImages,
}

impl<'a> TraceContext<'a> {
    pub fn new(
        ubo: &'a GlobalUbo,
        scene: SceneView<'a>,
        lights: LightsView<'a>,
        stats: Option<&'a LightStatsView<'a>>,
        images: &'a FrameImages,
    ) -> Self {
        Self {
            ubo,
            scene,
            lights: LightSampler {
                ubo,
                lights,
                stats,
                textures: scene.textures,
            },
            images,
        }
    }

    pub fn camera(&self) -> Camera<'a> {
        Camera::new(self.ubo)
    }

    /// Fetches the triangle of a hit and resolves its surface, as seen by a
    /// ray going in `direction`.
    pub fn resolve(&self, hit: &HitPayload, direction: Vec3) -> (Triangle, Surface) {
        let tri = self.scene.fetch(hit);
        let surface = self.surface(&tri, hit.bary(), direction);

        (tri, surface)
    }

    pub fn surface(&self, tri: &Triangle, bary: Vec3, direction: Vec3) -> Surface {
        Surface::resolve(
            tri,
            bary,
            direction,
            self.ubo.current_frame_idx,
            self.scene.materials,
            self.scene.textures,
            &self.ubo.cvars,
        )
    }
}

/// Clamps a color written into a noisy channel: non-finite components
/// become zero and the rest lands within `[0, MAX_OUTPUT_VALUE]`.
pub fn clamp_output(color: Vec3) -> Vec3 {
    color
        .sanitize()
        .clamp(Vec3::ZERO, Vec3::splat(MAX_OUTPUT_VALUE))
}
