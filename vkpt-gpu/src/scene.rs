use glam::{Vec2, Vec3, Vec4};

use crate::{GeometryView, HitPayload, InstancesView, MaterialsView, Triangle};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Ray queries against the top-level acceleration structure.
///
/// Provided by the caller; the acceleration structure itself is built
/// outside of this crate.
pub trait RayTracer: Sync {
    /// Returns the closest hit among instances whose cull mask intersects
    /// `cull_mask`.
    fn trace_closest(&self, ray: Ray, t_max: f32, cull_mask: u32) -> Option<HitPayload>;

    /// Returns whether anything blocks the ray before `t_max`.
    fn trace_shadow(&self, ray: Ray, t_max: f32, cull_mask: u32) -> bool;
}

/// Bindless textures and environment maps.
pub trait Textures: Sync {
    /// Samples texture of given non-zero handle; returns linear RGBA.
    fn sample(&self, handle: u32, uv: Vec2, lod: f32) -> Vec4;

    /// Radiance of the dynamic (physical) sky, including the sun disk.
    fn sample_sky(&self, direction: Vec3) -> Vec3;

    /// Radiance of the static environment cubemap.
    fn sample_envmap(&self, direction: Vec3) -> Vec3;
}

/// Textures used when none are bound: every texture is white and the
/// environment is black.
pub struct NoTextures;

impl Textures for NoTextures {
    fn sample(&self, _: u32, _: Vec2, _: f32) -> Vec4 {
        Vec4::ONE
    }

    fn sample_sky(&self, _: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    fn sample_envmap(&self, _: Vec3) -> Vec3 {
        Vec3::ZERO
    }
}

/// Any-hit test of alpha-masked materials: returns whether the hit at
/// given barycentrics should be ignored.
pub fn is_masked_out(
    tri: &Triangle,
    bary: Vec3,
    materials: &MaterialsView,
    textures: &dyn Textures,
) -> bool {
    let material = materials.get_material_info(tri.material_id);

    if material.mask_texture == 0 {
        return false;
    }

    textures.sample(material.mask_texture, tri.uv(bary, 0), 0.0).x < 0.5
}

/// Everything per-pixel kernels need to look at the scene.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub geometry: GeometryView<'a>,
    pub instances: &'a InstancesView<'a>,
    pub materials: &'a MaterialsView<'a>,
    pub textures: &'a dyn Textures,
    pub tracer: &'a dyn RayTracer,
}

impl<'a> SceneView<'a> {
    pub fn fetch(&self, hit: &HitPayload) -> Triangle {
        self.geometry.fetch(self.instances, hit)
    }
}

/// Intersects a ray with a triangle (double-sided); returns the distance and
/// the barycentric weights of the second and third vertex.
pub fn intersect_triangle(ray: &Ray, positions: [Vec3; 3], t_max: f32) -> Option<(f32, Vec2)> {
    let edge1 = positions[1] - positions[0];
    let edge2 = positions[2] - positions[0];
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);

    if det.abs() < f32::EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.origin - positions[0];
    let u = tvec.dot(pvec) * inv_det;

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;

    (t > 0.0 && t < t_max).then_some((t, Vec2::new(u, v)))
}
