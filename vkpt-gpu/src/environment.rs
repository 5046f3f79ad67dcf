use core::f32::consts::PI;

use glam::Vec3;

use crate::{lerp, EnvironmentType, GlobalUbo, Noise, Textures, Vec3Ext};

/// Radiance arriving from the environment along `direction`.
///
/// Primary rays of the dynamic sky get the sun disk suppressed (by
/// `pt_sun_disk_suppression`), since the sun is accounted for by its own
/// light samples.
pub fn environment_radiance(
    ubo: &GlobalUbo,
    textures: &dyn Textures,
    direction: Vec3,
    is_primary: bool,
) -> Vec3 {
    let cvars = &ubo.cvars;

    let radiance = match ubo.environment() {
        EnvironmentType::None => Vec3::ZERO,

        EnvironmentType::Static => {
            let color = textures.sample_envmap(direction);

            lerp(Vec3::splat(color.luma()), color, cvars.pt_envmap_saturation)
        }

        EnvironmentType::Dynamic => {
            let sky = textures.sample_sky(direction);

            if is_primary && is_inside_sun_disk(ubo, direction) {
                let edge = textures.sample_sky(sun_disk_edge(ubo, direction));

                lerp(sky, edge, cvars.pt_sun_disk_suppression)
            } else {
                sky
            }
        }
    };

    radiance.max(Vec3::ZERO) * cvars.pt_envmap_brightness
}

pub fn is_inside_sun_disk(ubo: &GlobalUbo, direction: Vec3) -> bool {
    ubo.is_sun_visible() && direction.dot(ubo.sun_dir()) >= ubo.sun_cos_radius()
}

/// Direction just outside the sun disk, nearest to `direction`.
fn sun_disk_edge(ubo: &GlobalUbo, direction: Vec3) -> Vec3 {
    let axis = ubo.sun_dir();
    let cos = ubo.sun_cos_radius().clamp(-1.0, 1.0);
    let sin = (1.0 - cos * cos).max(0.0).sqrt();

    let side = (direction - axis * direction.dot(axis)).safe_normalize();
    let side = if side == Vec3::ZERO {
        axis.any_orthonormal_vector()
    } else {
        side
    };

    // A bit past the edge
    let cos = cos - 0.1 * (1.0 - cos).max(1e-4);
    let sin = sin.max((1.0 - cos * cos).max(0.0).sqrt());

    (axis * cos + side * sin).normalize()
}

/// Sample of the sun disk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunSample {
    pub direction: Vec3,
    pub radiance: Vec3,

    /// Solid-angle density of `direction`
    pub pdf: f32,
}

/// Samples a direction within the sun disk, whose radiance comes from the
/// environment, so that clouds and terrain shape the sun's light.
pub fn sample_sun(ubo: &GlobalUbo, textures: &dyn Textures, noise: &mut Noise) -> Option<SunSample> {
    if ubo.environment() != EnvironmentType::Dynamic || !ubo.is_sun_visible() {
        return None;
    }

    let axis = ubo.sun_dir().safe_normalize();

    if axis == Vec3::ZERO {
        return None;
    }

    let cos_max = ubo.sun_cos_radius().clamp(-1.0, 1.0 - 1e-6);
    let direction = noise.sample_cone(axis, cos_max);
    let pdf = 1.0 / (2.0 * PI * (1.0 - cos_max));

    let radiance = environment_radiance(ubo, textures, direction, false)
        * ubo.cvars.pt_sun_intensity;

    Some(SunSample {
        direction,
        radiance,
        pdf,
    })
}
