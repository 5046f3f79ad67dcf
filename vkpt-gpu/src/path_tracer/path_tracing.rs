use glam::{UVec2, Vec3, Vec4};

use crate::{
    clamp_output, direct_lighting, environment_radiance, is_inside_sun_disk,
    material_kind, mis_balance, pixel_noise, GBufferEntry, GradientSample,
    HitPayload, ImageId, LightFlags, Noise, PassContext, Ray, Role,
    ShadingPoint, Sh, SpecularBrdf, Surface, TraceContext, Triangle, Vec3Ext,
    BOUNCE_RAY_MASK, MATERIAL_FLAG_LIGHT, MATERIAL_KIND_SKY, VKPT_EPSILON,
};

/// Images written by [`path_tracing()`], in the order of
/// [`PathOutput::pack()`].
pub const PATH_TRACER_IMAGES: [ImageId; 4] = [
    ImageId::PtColorLfSh,
    ImageId::PtColorLfCocg,
    ImageId::PtColorHf,
    ImageId::PtColorSpec,
];

/// Noisy lighting of a single pixel, demodulated.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PathOutput {
    /// Indirect diffuse
    pub lf: Sh,

    /// Direct diffuse
    pub hf: Vec3,

    /// Direct and indirect specular
    pub spec: Vec3,
}

impl PathOutput {
    pub fn pack(&self) -> [Vec4; 4] {
        [
            self.lf.y,
            self.lf.pack_co_cg(0.0),
            self.hf.extend(0.0),
            self.spec.extend(0.0),
        ]
    }
}

/// Shades the G-buffer surface of given pixel: samples the lights, then
/// follows one diffuse and one specular bounce.
pub fn path_tracing(ctx: &TraceContext, pixel: UVec2) -> PathOutput {
    let images = ctx.images;
    let cvars = &ctx.ubo.cvars;
    let entry = GBufferEntry::read(images, Role::Current, pixel);

    let Some(hit) = entry
        .visbuf
        .to_hit(entry.view_depth)
        .filter(|_| entry.is_some())
    else {
        return PathOutput::default();
    };

    let tri = ctx.scene.fetch(&hit);
    let bary = hit.bary();
    let direction = (tri.position(bary) - ctx.camera().position()).safe_normalize();
    let surface = ctx.surface(&tri, bary, direction);

    let point = ShadingPoint {
        surface: &surface,
        view: -direction,
        is_gradient: GradientSample::at_pixel(images, pixel).is_some(),
    };

    let mut noise = pixel_noise(&PassContext::new(ctx.ubo, images), pixel);
    let direct = direct_lighting(ctx, &point, LightFlags::direct(cvars), true, &mut noise);

    if cvars.pt_show_light_stats > 0.0 {
        return PathOutput {
            hf: Vec3::splat(direct.stats_factor.unwrap_or(1.0)),
            ..Default::default()
        };
    }

    let mut out = PathOutput {
        hf: clamp_output(direct.diffuse),
        spec: direct.specular,
        ..Default::default()
    };

    // Fractional counts trace bounces for a random subset of pixels
    let bounce_chance = cvars.pt_num_bounce_rays;

    if noise.sample() < bounce_chance {
        let weight = 1.0 / bounce_chance;

        if let Some((dir, radiance)) = diffuse_bounce(ctx, &point, &mut noise) {
            out.lf = Sh::from_radiance(clamp_output(radiance * weight), dir);
        }

        out.spec += specular_bounce(ctx, &point, &mut noise) * weight;
    }

    out.spec = clamp_output(out.spec);
    out
}

/// Follows a cosine-distributed ray; returns its direction and the
/// radiance it brings back.
fn diffuse_bounce(ctx: &TraceContext, point: &ShadingPoint, noise: &mut Noise) -> Option<(Vec3, Vec3)> {
    let cvars = &ctx.ubo.cvars;
    let surface = point.surface;
    let dir = noise.sample_cosine_hemisphere(surface.normal);

    if dir.dot(surface.geo_normal) <= 0.0 {
        return None;
    }

    // Lights were sampled already
    let skip_lights = LightFlags::direct(cvars).polygonal;

    let radiance = incoming_radiance(ctx, point, dir, noise, |_, hit_surface, _| {
        if skip_lights && hit_surface.material_id & MATERIAL_FLAG_LIGHT != 0 {
            0.0
        } else {
            1.0
        }
    });

    Some((dir, limit_luminance(radiance, cvars.pt_diffuse_anti_firefly)))
}

/// Follows a ray sampled from the specular lobe; returns the reflected
/// radiance, already weighted by the BRDF.
fn specular_bounce(ctx: &TraceContext, point: &ShadingPoint, noise: &mut Noise) -> Vec3 {
    let cvars = &ctx.ubo.cvars;
    let surface = point.surface;
    let brdf = SpecularBrdf::new(surface);

    let Some(dir) = brdf.sample(point.view, noise.sample2(), cvars.pt_ndf_trim) else {
        return Vec3::ZERO;
    };

    let pdf = brdf.pdf(dir, point.view);

    if pdf <= 0.0 || dir.dot(surface.geo_normal) <= 0.0 {
        return Vec3::ZERO;
    }

    let weight = (brdf.eval(dir, point.view) / pdf).sanitize();
    let light_sampling = LightFlags::direct(cvars).polygonal;
    let mis = cvars.pt_specular_mis > 0.0 && surface.roughness < cvars.pt_direct_roughness_threshold;

    let radiance = incoming_radiance(ctx, point, dir, noise, |tri, hit_surface, hit| {
        if hit_surface.material_id & MATERIAL_FLAG_LIGHT == 0 {
            return if surface.roughness > cvars.pt_fake_roughness_threshold {
                0.0
            } else {
                1.0
            };
        }

        if !light_sampling {
            return 1.0;
        }

        if !mis {
            return 0.0;
        }

        let light_pdf = ctx.lights.polygon_pdf_approx(
            point,
            hit.hit_distance,
            tri.area(),
            tri.geometric_normal().dot(dir),
        );

        mis_balance(pdf, light_pdf)
    });

    let limit = if cvars.pt_specular_anti_flicker > 0.0 {
        cvars.pt_specular_anti_flicker / surface.alpha().max(VKPT_EPSILON)
    } else {
        0.0
    };

    weight * limit_luminance(radiance, limit)
}

/// Radiance arriving at `point` from `dir`: the environment, or the
/// emission and direct lighting of whatever the ray hits.
///
/// `emissive_weight` tells how much of the hit surface's emission counts.
fn incoming_radiance(
    ctx: &TraceContext,
    point: &ShadingPoint,
    dir: Vec3,
    noise: &mut Noise,
    emissive_weight: impl Fn(&Triangle, &Surface, &HitPayload) -> f32,
) -> Vec3 {
    let cvars = &ctx.ubo.cvars;
    let ray = Ray::new(point.surface.ray_origin(cvars.pt_shadow_bias), dir);

    let Some(hit) = ctx
        .scene
        .tracer
        .trace_closest(ray, cvars.pt_max_ray_distance, BOUNCE_RAY_MASK)
    else {
        return miss_radiance(ctx, dir);
    };

    let (tri, surface) = ctx.resolve(&hit, dir);

    if material_kind(surface.material_id) == MATERIAL_KIND_SKY {
        return miss_radiance(ctx, dir);
    }

    let emissive = surface.emissive * emissive_weight(&tri, &surface, &hit);

    let hit_point = ShadingPoint {
        surface: &surface,
        view: -dir,
        is_gradient: point.is_gradient,
    };

    let light = direct_lighting(ctx, &hit_point, LightFlags::indirect(cvars), false, noise);

    emissive + surface.diffuse_albedo() * light.diffuse + light.specular
}

fn miss_radiance(ctx: &TraceContext, dir: Vec3) -> Vec3 {
    // The sun disk gets its own light samples
    if ctx.ubo.cvars.pt_direct_sun_light > 0.0 && is_inside_sun_disk(ctx.ubo, dir) {
        return Vec3::ZERO;
    }

    environment_radiance(ctx.ubo, ctx.scene.textures, dir, false)
}

/// Scales `color` down so that its luminance doesn't exceed `max`; zero
/// disables the limit.
fn limit_luminance(color: Vec3, max: f32) -> Vec3 {
    let luma = color.luma();

    if max > 0.0 && luma > max {
        color * (max / luma)
    } else {
        color
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{vec3, vec4};

    use super::*;
    use crate::path_tracer::test_scene::{TestScene, SIZE};
    use crate::{
        primary_rays, seed_rng, AbImageId, EnvironmentType, Image,
        GBUFFER_IMAGES, AS_FLAG_OPAQUE, MATERIAL_KIND_REGULAR,
    };

    /// Runs the primary rays and the RNG seeding, then path-traces every
    /// pixel.
    fn render(scene: &mut TestScene) -> Vec<PathOutput> {
        let primary: Vec<_> = scene.with(|ctx| {
            Image::<Vec4>::pixels(SIZE)
                .map(|pixel| primary_rays(ctx, pixel))
                .collect()
        });

        for (idx, id) in GBUFFER_IMAGES.into_iter().enumerate() {
            let data = primary.iter().map(|out| out.gbuffer.pack()[idx]).collect();

            scene.images.store_ab(id, Image::from_data(SIZE, data));
        }

        let seeds = {
            let ctx = PassContext::new(&scene.ubo, &scene.images);

            Image::from_fn(SIZE, |pixel| seed_rng(&ctx, pixel))
        };

        scene.images.store_ab(AbImageId::RngSeed, seeds);

        scene.with(|ctx| {
            Image::<Vec4>::pixels(SIZE)
                .map(|pixel| path_tracing(ctx, pixel))
                .collect()
        })
    }

    /// Wall in front of the camera, lit by a light above it; the light is
    /// out of the camera's view.
    fn lit_wall() -> TestScene {
        let mut scene = TestScene::new();

        scene.wall(-5.0, MATERIAL_KIND_REGULAR, AS_FLAG_OPAQUE);
        scene.light_quad(4.0, vec3(0.0, 0.0, -3.0), 10.0);
        scene
    }

    #[test]
    fn lit_surfaces_receive_direct_light() {
        let mut scene = lit_wall();

        for out in render(&mut scene) {
            assert!(out.hf.x > 0.0);
            assert!(out.hf.is_finite());
        }
    }

    #[test]
    fn misses_produce_nothing() {
        let mut scene = TestScene::new();

        scene.light_quad(2.0, vec3(0.0, 0.0, -3.0), 10.0);

        for out in render(&mut scene) {
            assert_eq!(PathOutput::default(), out);
        }
    }

    #[test]
    fn roughness_override_yields_identical_specular_lobes() {
        let mut rough = lit_wall();
        let mut smooth = lit_wall();

        rough.roughness = Some(0.9);
        smooth.roughness = Some(0.1);
        rough.ubo.cvars.pt_roughness_override = 0.4;
        smooth.ubo.cvars.pt_roughness_override = 0.4;

        let rough = render(&mut rough);
        let smooth = render(&mut smooth);

        for (rough, smooth) in rough.iter().zip(&smooth) {
            assert_eq!(rough.spec, smooth.spec);
            assert_eq!(rough.hf, smooth.hf);
        }
    }

    #[test]
    fn outputs_stay_bounded_for_extreme_inputs() {
        let mut scene = lit_wall();

        scene.light_quad(4.0, vec3(0.0, 0.0, -4.0), 1e30);
        scene.environment = Vec3::splat(f32::INFINITY);
        scene.ubo.environment_type = EnvironmentType::Static as u32;
        scene.ubo.cvars.pt_diffuse_anti_firefly = 0.0;
        scene.ubo.cvars.pt_specular_anti_flicker = 0.0;

        for out in render(&mut scene) {
            for channel in [out.hf, out.spec] {
                assert!(channel.is_finite());
                assert!(channel.cmpge(Vec3::ZERO).all());
                assert!(channel.cmple(Vec3::splat(1000.0)).all());
            }

            assert!(out.lf.y.is_finite());
            assert!(out.lf.co_cg.is_finite());
        }
    }

    #[test]
    fn disabled_bounces_leave_indirect_light_empty() {
        let mut scene = lit_wall();

        scene.ubo.cvars.pt_num_bounce_rays = 0.0;

        for out in render(&mut scene) {
            assert_eq!(Sh::default(), out.lf);
        }
    }

    #[test]
    fn light_stats_view() {
        let mut scene = lit_wall();

        scene.ubo.cvars.pt_show_light_stats = 1.0;

        for out in render(&mut scene) {
            // No statistics bound, so every light counts fully
            assert_eq!(Vec3::ONE, out.hf);
            assert_eq!(Vec3::ZERO, out.spec);
        }
    }

    #[test]
    fn luminance_limit() {
        let color = vec3(4.0, 4.0, 4.0);

        assert_relative_eq!(2.0, limit_luminance(color, 2.0).x, epsilon = 1e-5);
        assert_eq!(color, limit_luminance(color, 0.0));
        assert_eq!(color, limit_luminance(color, 8.0));
    }

    #[test]
    fn packing() {
        let out = PathOutput {
            lf: Sh::from_radiance(Vec3::ONE, Vec3::Z),
            hf: vec3(1.0, 2.0, 3.0),
            spec: vec3(4.0, 5.0, 6.0),
        };

        let [sh, cocg, hf, spec] = out.pack();

        assert_eq!(out.lf, Sh::unpack(sh, cocg));
        assert_eq!(vec4(1.0, 2.0, 3.0, 0.0), hf);
        assert_eq!(vec4(4.0, 5.0, 6.0, 0.0), spec);
    }
}
