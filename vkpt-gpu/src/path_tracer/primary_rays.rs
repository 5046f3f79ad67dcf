use glam::{UVec2, Vec2, Vec3, Vec4};

use crate::{
    clamp_output, decode_instance_prim, environment_radiance, material_kind,
    F32Ext, GBufferEntry, GradientSample, HitPayload, Ray, Role, TraceContext,
    Vec3Ext, VisBuffer, AS_FLAG_TRANSPARENT, MATERIAL_KIND_SKY,
    MATERIAL_KIND_TRANSPARENT, PRIMARY_RAY_MASK, VKPT_EPSILON,
};

/// What the primary-rays pass writes for a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PrimaryOutput {
    pub gbuffer: GBufferEntry,

    /// xy: screen-space motion from the previous frame, in pixels
    pub motion: Vec4,

    /// rgb: light that doesn't go through the denoiser (emission of the
    /// primary surface, the environment and the translucent layer in front
    /// of them), a: coverage of the translucent layer
    pub transparent: Vec4,
}

/// Traces the primary ray of given pixel and fills its G-buffer entry.
///
/// Gradient samples don't trace anything: they re-use the surface their
/// pixel has seen during the previous frame, mapped onto this frame's
/// instances.
pub fn primary_rays(ctx: &TraceContext, pixel: UVec2) -> PrimaryOutput {
    let ubo = ctx.ubo;
    let max_distance = ubo.cvars.pt_max_ray_distance;
    let camera = ctx.camera();
    let ray = camera.ray(pixel);

    let hit = match GradientSample::at_pixel(ctx.images, pixel) {
        Some(sample) => VisBuffer::read(ctx.images, Role::History, sample.prev_pixel)
            .to_current(ctx.scene.instances)
            .and_then(|visbuf| visbuf.to_hit(0.0)),

        None => ctx
            .scene
            .tracer
            .trace_closest(ray, max_distance, PRIMARY_RAY_MASK),
    };

    let mut out = PrimaryOutput::default();
    let mut background = None;
    let mut opaque_distance = max_distance;

    if let Some(hit) = hit {
        let tri = ctx.scene.fetch(&hit);
        let bary = hit.bary();
        let position = tri.position(bary);
        let to_hit = position - camera.position();
        let surface = ctx.surface(&tri, bary, to_hit.safe_normalize());

        if material_kind(surface.material_id) != MATERIAL_KIND_SKY {
            out.gbuffer = GBufferEntry {
                visbuf: VisBuffer::from_hit(&hit),
                cluster: surface.cluster,
                base_color: surface.base_color,
                metallic: surface.metallic,
                roughness: surface.roughness,
                specular_scale: surface.specular_scale,
                view_depth: camera.view_depth(position).max(VKPT_EPSILON),
                normal: surface.normal,
                geo_normal: surface.geo_normal,
                tangent: surface.tangent,
            };

            out.motion = motion(camera.motion(position, tri.prev_position(bary)));
            opaque_distance = to_hit.length();
            background = Some(surface.emissive);
        }
    }

    let background = match background {
        Some(emissive) => emissive,

        None => {
            let far = ray.at(max_distance);
            let prev_far = ubo.prev_camera_position() + ray.direction * max_distance;

            out.motion = motion(camera.motion(far, prev_far));

            environment_radiance(ubo, ctx.scene.textures, ray.direction, true)
        }
    };

    let background = clamp_output(background);

    out.transparent = match translucent_layer(ctx, ray, opaque_distance) {
        Some((color, alpha)) => {
            (background * (1.0 - alpha) + clamp_output(color) * alpha).extend(alpha)
        }
        None => background.extend(0.0),
    };

    out
}

fn motion(motion: Vec2) -> Vec4 {
    Vec4::new(motion.x.sanitize(), motion.y.sanitize(), 0.0, 0.0)
}

/// Closest translucent surface in front of the opaque one: transparent
/// materials and entities faded out by their alpha. Water and glass only
/// affect shadows, so they're skipped.
///
/// Returns the layer's color and its coverage.
fn translucent_layer(ctx: &TraceContext, ray: Ray, max_distance: f32) -> Option<(Vec3, f32)> {
    let hit = ctx
        .scene
        .tracer
        .trace_closest(ray, max_distance, AS_FLAG_TRANSPARENT)?;

    let instance_alpha = instance_alpha(ctx, &hit);
    let (tri, surface) = ctx.resolve(&hit, ray.direction);

    if material_kind(surface.material_id) != MATERIAL_KIND_TRANSPARENT && instance_alpha >= 1.0 {
        return None;
    }

    let material = ctx.scene.materials.get_material_info(surface.material_id);

    let coverage = if material.base_texture != 0 {
        ctx.scene
            .textures
            .sample(
                material.base_texture,
                tri.uv(hit.bary(), 0),
                ctx.ubo.cvars.pt_texture_lod_bias,
            )
            .w
    } else {
        1.0
    };

    let alpha = (instance_alpha * coverage).sanitize().saturate();

    if alpha <= 0.0 {
        return None;
    }

    let color = if surface.emissive != Vec3::ZERO {
        surface.emissive
    } else {
        surface.base_color
    };

    Some((color, alpha))
}

fn instance_alpha(ctx: &TraceContext, hit: &HitPayload) -> f32 {
    if decode_instance_prim(hit.instance_prim).1 {
        return 1.0;
    }

    ctx.scene
        .instances
        .get(hit.instance_id)
        .map_or(1.0, |instance| instance.alpha())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, vec4};

    use super::*;
    use crate::path_tracer::test_scene::{TestScene, SIZE};
    use crate::{
        stratum_offset, AbImageId, EnvironmentType, Image, AS_FLAG_OPAQUE,
        MATERIAL_FLAG_LIGHT, MATERIAL_KIND_REGULAR,
    };

    fn trace(scene: &TestScene) -> Vec<PrimaryOutput> {
        scene.with(|ctx| {
            Image::<Vec4>::pixels(SIZE)
                .map(|pixel| primary_rays(ctx, pixel))
                .collect()
        })
    }

    #[test]
    fn walls_fill_the_gbuffer() {
        let mut scene = TestScene::new();

        scene.wall(-5.0, MATERIAL_KIND_REGULAR, AS_FLAG_OPAQUE);

        for out in trace(&scene) {
            assert!(out.gbuffer.is_some());
            assert!(out.gbuffer.view_depth >= 5.0);
            assert_relative_eq!(1.0, out.gbuffer.normal.z, epsilon = 1e-5);
            assert_eq!(Vec4::ZERO, out.motion);
            assert_eq!(Vec4::ZERO, out.transparent);
        }
    }

    #[test]
    fn misses_see_the_environment() {
        let mut scene = TestScene::new();

        scene.environment = Vec3::splat(0.5);
        scene.ubo.environment_type = EnvironmentType::Static as u32;

        for out in trace(&scene) {
            assert!(!out.gbuffer.is_some());
            assert!(!out.gbuffer.visbuf.is_some());
            assert_relative_eq!(0.5, out.transparent.x, epsilon = 1e-5);
            assert_eq!(0.0, out.transparent.w);
        }
    }

    #[test]
    fn emission_goes_around_the_denoiser() {
        let mut scene = TestScene::new();

        scene.wall(-5.0, 1 | MATERIAL_FLAG_LIGHT, AS_FLAG_OPAQUE);

        for out in trace(&scene) {
            assert!(out.gbuffer.is_some());
            assert_eq!(vec4(1.0, 1.0, 1.0, 0.0), out.transparent);
        }
    }

    #[test]
    fn translucent_layers_cover_the_surface_behind() {
        let mut scene = TestScene::new();

        scene.wall(-5.0, 1 | MATERIAL_FLAG_LIGHT, AS_FLAG_OPAQUE);

        let glass = scene.wall(-3.0, MATERIAL_KIND_REGULAR, AS_FLAG_TRANSPARENT);

        // Opaque entity, so nothing to blend
        for out in trace(&scene) {
            assert_eq!(vec4(1.0, 1.0, 1.0, 0.0), out.transparent);
        }

        scene.set_alpha(glass, 0.25);
        scene.base_color = Vec3::splat(0.5);

        for out in trace(&scene) {
            // Emission of the wall behind (0.5) over the layer's color (0.5)
            assert_relative_eq!(0.5, out.transparent.x, epsilon = 1e-5);
            assert_relative_eq!(0.25, out.transparent.w, epsilon = 1e-5);

            // The layer itself isn't part of the G-buffer
            assert!(out.gbuffer.view_depth >= 5.0);
        }
    }

    #[test]
    fn gradient_samples_replay_previous_surfaces() {
        let mut scene = TestScene::new();

        scene.wall(-5.0, MATERIAL_KIND_REGULAR, AS_FLAG_OPAQUE);

        let visbuf = VisBuffer {
            instance_prim: 1,
            instance_id: 0,
            barycentric: vec2(0.1, 0.2),
        };

        scene.images.set_frame(0);

        let [prim, bary] = visbuf.pack();

        scene
            .images
            .store_ab(AbImageId::VisbufPrim, Image::from_fn(SIZE, |_| prim));

        scene
            .images
            .store_ab(AbImageId::VisbufBary, Image::from_fn(SIZE, |_| bary));

        scene.images.set_frame(1);

        let pixel = uvec2(1, 2);

        let sample = GradientSample {
            offset: stratum_offset(pixel),
            prev_pixel: uvec2(2, 2),
            prev_luminance: Vec3::ONE,
        };

        let mut positions = Image::new(scene.images.sizes().gradient());

        positions.write(crate::gradient_stratum(pixel), sample.pack());
        scene.images.store_ab(AbImageId::GradSmplPos, positions);

        let out = scene.with(|ctx| primary_rays(ctx, pixel));

        assert_eq!(visbuf, out.gbuffer.visbuf);
        assert!(out.gbuffer.view_depth >= 5.0);
    }
}
