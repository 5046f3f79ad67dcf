use glam::Vec3;

use crate::{
    lerp, light_mis_weight, light_stats_key, material_kind, sample_sun,
    Cvars, F32Ext, LightSource, Noise, Ray, ShadingPoint, TraceContext,
    AS_FLAG_TRANSPARENT, MATERIAL_KIND_GLASS, MATERIAL_KIND_WATER,
    SHADOW_RAY_MASK,
};

/// Which light sources get sampled at a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightFlags {
    pub polygonal: bool,
    pub spherical: bool,
    pub sun: bool,
}

impl LightFlags {
    /// Light sources sampled at primary surfaces.
    pub fn direct(cvars: &Cvars) -> Self {
        Self {
            polygonal: cvars.pt_direct_polygon_lights > 0.0,
            spherical: cvars.pt_direct_dyn_lights > 0.0,
            sun: cvars.pt_direct_sun_light > 0.0,
        }
    }

    /// Light sources sampled at surfaces found by bounce rays.
    pub fn indirect(cvars: &Cvars) -> Self {
        Self {
            polygonal: cvars.pt_indirect_polygon_lights > 0.0,
            spherical: cvars.pt_indirect_dyn_lights > 0.0,
            sun: cvars.pt_indirect_sun_light > 0.0,
        }
    }
}

/// Light gathered by next-event estimation at a single surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DirectLight {
    /// Irradiance over PI, not multiplied by the albedo
    pub diffuse: Vec3,

    pub specular: Vec3,

    /// Statistics factor of the sampled polygonal light, if any
    pub stats_factor: Option<f32>,
}

/// Samples one light (polygonal or spherical) and the sun for given point,
/// tracing a shadow ray for each.
///
/// With `record_stats`, the visibility of a polygonal sample is fed into
/// the light statistics.
pub fn direct_lighting(
    ctx: &TraceContext,
    point: &ShadingPoint,
    flags: LightFlags,
    record_stats: bool,
    noise: &mut Noise,
) -> DirectLight {
    let cvars = &ctx.ubo.cvars;
    let surface = point.surface;
    let mut out = DirectLight::default();

    let choice = ctx
        .lights
        .sample(point, flags.polygonal, flags.spherical, noise);

    if let Some(sample) = choice.sample {
        let transmission = shadow_transmission(ctx, point, sample.direction, sample.distance);

        if let (Some((entry, octant)), Some(stats)) =
            (light_stats_key(&sample, surface), ctx.lights.stats)
        {
            out.stats_factor = Some(stats.factor(entry, octant));

            if record_stats && !point.is_gradient {
                stats.record(entry, octant, transmission != Vec3::ZERO);
            }
        }

        let spec_weight = if cvars.pt_specular_mis > 0.0 && matches!(sample.source, LightSource::Polygon { .. }) {
            light_mis_weight(
                surface,
                &sample,
                point.view,
                cvars.pt_direct_roughness_threshold,
            )
        } else {
            1.0
        };

        out.diffuse += sample.diffuse * transmission;
        out.specular += sample.specular * transmission * spec_weight;
    }

    if flags.sun {
        if let Some(sun) = sample_sun(ctx.ubo, ctx.scene.textures, noise) {
            let (diffuse, specular) = point.brdf(sun.direction);

            if diffuse != Vec3::ZERO || specular != Vec3::ZERO {
                let transmission =
                    shadow_transmission(ctx, point, sun.direction, cvars.pt_max_ray_distance);

                out.diffuse += sun.radiance * diffuse * transmission / sun.pdf;
                out.specular += sun.radiance * specular * transmission / sun.pdf;
            }
        }
    }

    out.diffuse = out.diffuse.max(Vec3::ZERO);
    out.specular = out.specular.max(Vec3::ZERO);
    out
}

/// How much light travelling from `origin` along `direction` makes it
/// through `distance`.
///
/// Opaque occluders block the light; water and glass let it through, tinted
/// by their color and modulated by how their normal maps focus it.
pub fn shadow_transmission(
    ctx: &TraceContext,
    point: &ShadingPoint,
    direction: Vec3,
    distance: f32,
) -> Vec3 {
    let cvars = &ctx.ubo.cvars;
    let origin = point.surface.ray_origin(cvars.pt_shadow_bias);
    let target = point.surface.position + direction * distance;
    let ray = Ray::new(origin, direction);

    // Stops short of the light itself
    let t_max = ((target - origin).length() - cvars.pt_shadow_bias).max(0.0);

    if ctx.scene.tracer.trace_shadow(ray, t_max, SHADOW_RAY_MASK) {
        return Vec3::ZERO;
    }

    if cvars.pt_caustics <= 0.0 {
        return Vec3::ONE;
    }

    let Some(hit) = ctx.scene.tracer.trace_closest(ray, t_max, AS_FLAG_TRANSPARENT) else {
        return Vec3::ONE;
    };

    let (tri, medium) = ctx.resolve(&hit, direction);

    let strength = match material_kind(tri.material_id) {
        MATERIAL_KIND_GLASS => cvars.pt_glass_tint,
        MATERIAL_KIND_WATER => cvars.pt_water_density.saturate(),
        _ => return Vec3::ONE,
    };

    let tint = lerp(Vec3::ONE, medium.base_color, strength);

    // Ripples of the shading normal against the geometric one bunch the
    // light up or spread it out
    let focus = (1.0
        + cvars.pt_caustic_contrast
            * (medium.normal.dot(direction).abs() - medium.geo_normal.dot(direction).abs()))
    .clamp(0.0, 2.0);

    lerp(Vec3::ONE, tint * focus, cvars.pt_caustics)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;
    use crate::path_tracer::test_scene::TestScene;
    use crate::{Surface, MATERIAL_KIND_REGULAR};

    fn floor_point(surface: &Surface) -> ShadingPoint<'_> {
        ShadingPoint {
            surface,
            view: Vec3::Y,
            is_gradient: false,
        }
    }

    fn floor() -> Surface {
        Surface {
            position: vec3(0.0, 0.0, -3.0),
            normal: Vec3::Y,
            geo_normal: Vec3::Y,
            tangent: Vec3::X,
            base_color: Vec3::ONE,
            roughness: 1.0,
            cluster: 0,
            ..Default::default()
        }
    }

    #[test]
    fn occluders_cast_shadows() {
        let mut scene = TestScene::new();

        scene.light_quad(2.0, vec3(0.0, 0.0, -3.0), 10.0);

        let lit = scene.with(|ctx| {
            let surface = floor();
            let mut noise = Noise::from_seed(1);

            direct_lighting(ctx, &floor_point(&surface), LightFlags::direct(&ctx.ubo.cvars), false, &mut noise)
        });

        assert!(lit.diffuse.x > 0.0);

        scene.horizontal_quad(1.0, vec3(0.0, 0.0, -3.0), 4.0, MATERIAL_KIND_REGULAR);

        let shadowed = scene.with(|ctx| {
            let surface = floor();
            let mut noise = Noise::from_seed(1);

            direct_lighting(ctx, &floor_point(&surface), LightFlags::direct(&ctx.ubo.cvars), false, &mut noise)
        });

        assert_eq!(Vec3::ZERO, shadowed.diffuse);
        assert_eq!(Vec3::ZERO, shadowed.specular);
    }

    #[test]
    fn glass_tints_light() {
        let mut scene = TestScene::new();

        scene.light_quad(2.0, vec3(0.0, 0.0, -3.0), 10.0);
        scene.horizontal_quad(1.0, vec3(0.0, 0.0, -3.0), 4.0, MATERIAL_KIND_GLASS);
        scene.base_color = vec3(1.0, 0.5, 0.25);

        let transmission = scene.with(|ctx| {
            let surface = floor();

            shadow_transmission(ctx, &floor_point(&surface), Vec3::Y, 2.0)
        });

        // Flat glass doesn't focus anything
        assert_relative_eq!(1.0, transmission.x, epsilon = 1e-5);
        assert_relative_eq!(0.5, transmission.y, epsilon = 1e-5);
        assert_relative_eq!(0.25, transmission.z, epsilon = 1e-5);

        scene.ubo.cvars.pt_caustics = 0.0;

        let transmission = scene.with(|ctx| {
            let surface = floor();

            shadow_transmission(ctx, &floor_point(&surface), Vec3::Y, 2.0)
        });

        assert_eq!(Vec3::ONE, transmission);
    }

    #[test]
    fn disabled_lights_contribute_nothing() {
        let mut scene = TestScene::new();

        scene.light_quad(2.0, vec3(0.0, 0.0, -3.0), 10.0);

        let out = scene.with(|ctx| {
            let surface = floor();
            let mut noise = Noise::from_seed(1);
            let flags = LightFlags {
                polygonal: false,
                spherical: false,
                sun: false,
            };

            direct_lighting(ctx, &floor_point(&surface), flags, false, &mut noise)
        });

        assert_eq!(DirectLight::default(), out);
    }

    #[test]
    fn visibility_gets_recorded() {
        let mut scene = TestScene::new();

        scene.light_quad(2.0, vec3(0.0, 0.0, -3.0), 10.0);
        scene.horizontal_quad(1.0, vec3(0.0, 0.0, -3.0), 4.0, MATERIAL_KIND_REGULAR);

        let counters = scene.with_stats(|ctx| {
            let surface = floor();
            let mut noise = Noise::from_seed(7);

            direct_lighting(ctx, &floor_point(&surface), LightFlags::direct(&ctx.ubo.cvars), true, &mut noise);
        });

        // One sample, shadowed
        assert_eq!(1, counters.iter().sum::<u32>());
    }
}
