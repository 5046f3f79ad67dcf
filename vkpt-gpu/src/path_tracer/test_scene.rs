//! Scenes made of axis-aligned quads, traced by brute force.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::{vec3, Mat4, UVec2, Vec2, Vec3, Vec4};

use crate::{
    encode_instance_prim, intersect_triangle, light_stats_buffer_len,
    FrameImages, FrameSizes, GeometryTable, GeometryTableView, GeometryView,
    GlobalUbo, HitPayload, InstanceRecord, InstanceType, InstancesView,
    LightPolygon, LightStatsView, LightsView, MaterialInfo, MaterialsView,
    PolygonLightType, PrimitiveRecord, Ray, RayTracer, SceneView, TangentFrame,
    Textures, TraceContext, Vertex, AS_FLAG_OPAQUE, AS_FLAG_TRANSPARENT,
    MATERIAL_FLAG_LIGHT, MATERIAL_KIND_REGULAR,
};

pub const SIZE: UVec2 = UVec2::new(4, 4);

/// Material index of emissive quads registered as lights.
const LIGHT_MATERIAL: u32 = 1;

pub struct TestScene {
    pub ubo: GlobalUbo,
    pub images: FrameImages,
    pub base_color: Vec3,
    pub environment: Vec3,

    /// Roughness override of every material
    pub roughness: Option<f32>,

    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    primitives: Vec<PrimitiveRecord>,
    instances: Vec<InstanceRecord>,
    polygons: Vec<LightPolygon>,
}

impl TestScene {
    /// Camera at the origin, looking down -Z, with nothing in front of it.
    pub fn new() -> Self {
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let view_proj = proj * Mat4::look_at_rh(Vec3::ZERO, -Vec3::Z, Vec3::Y);

        let ubo = GlobalUbo {
            view_proj,
            inv_view_proj: view_proj.inverse(),
            prev_view_proj: view_proj,
            prev_inv_view_proj: view_proj.inverse(),
            width: SIZE.x,
            height: SIZE.y,
            taa_output_width: SIZE.x,
            taa_output_height: SIZE.y,
            current_frame_idx: 1,
            num_clusters: 1,
            ..Default::default()
        };

        let mut images = FrameImages::new(FrameSizes::new(SIZE, SIZE));

        images.set_frame(1);

        Self {
            ubo,
            images,
            base_color: Vec3::ONE,
            environment: Vec3::ZERO,
            roughness: None,
            vertices: Vec::new(),
            indices: Vec::new(),
            primitives: Vec::new(),
            instances: Vec::new(),
            polygons: Vec::new(),
        }
    }

    /// Adds a quad made of two triangles, as a separate instance; returns
    /// that instance's index.
    pub fn quad(&mut self, corners: [Vec3; 4], material_id: u32, cull_mask: u32) -> u32 {
        let base = self.vertices.len() as u32;
        let prim_offset = self.primitives.len() as u32;

        let tangent = (corners[1] - corners[0]).normalize();
        let normal = tangent.cross(corners[2] - corners[0]).normalize();
        let tangent_frame = TangentFrame::encode(normal, tangent);

        self.vertices.extend(corners.map(|pos| Vertex {
            position: pos.extend(1.0),
            tangent_frame,
            ..Default::default()
        }));

        self.indices
            .extend([base, base + 1, base + 2, base + 1, base + 3, base + 2]);

        for _ in 0..2 {
            self.primitives.push(PrimitiveRecord {
                material_id,
                cluster: 0,
            });
        }

        let index = self.instances.len() as u32;

        self.instances.push(InstanceRecord {
            transform: Mat4::IDENTITY,
            prev_transform: Mat4::IDENTITY,
            instance_type: InstanceType::WorldStatic as u32,
            cull_mask,
            prim_offset,
            prim_count: 2,
            prev_index: index,
            alpha: 1.0f32.to_bits(),
            ..Default::default()
        });

        index
    }

    /// Adds a square of given size, lying at given height and facing up;
    /// water, glass and transparent kinds go into the transparent mask.
    pub fn horizontal_quad(&mut self, y: f32, center: Vec3, size: f32, kind: u32) -> u32 {
        let mask = if kind == MATERIAL_KIND_REGULAR {
            AS_FLAG_OPAQUE
        } else {
            AS_FLAG_TRANSPARENT
        };

        self.quad(horizontal_corners(y, center, size), kind, mask)
    }

    /// Adds a square facing the camera at given depth, covering the whole
    /// screen.
    pub fn wall(&mut self, z: f32, material_id: u32, cull_mask: u32) -> u32 {
        let s = z.abs() * 2.0;

        self.quad(
            [
                vec3(-s, -s, z),
                vec3(s, -s, z),
                vec3(-s, s, z),
                vec3(s, s, z),
            ],
            material_id,
            cull_mask,
        )
    }

    /// Adds a 2x2 emissive square at given height, facing down, together
    /// with the light polygons covering it.
    pub fn light_quad(&mut self, y: f32, center: Vec3, intensity: f32) {
        let [a, b, c, d] = horizontal_corners(y, center, 2.0);

        self.quad([a, b, c, d], LIGHT_MATERIAL | MATERIAL_FLAG_LIGHT, AS_FLAG_OPAQUE);

        // Wound so that their normals point down
        self.polygons.push(LightPolygon::new(
            [a, c, b],
            [Vec3::ONE; 3],
            intensity,
            PolygonLightType::Regular,
        ));

        self.polygons.push(LightPolygon::new(
            [b, c, d],
            [Vec3::ONE; 3],
            intensity,
            PolygonLightType::Regular,
        ));
    }

    pub fn set_alpha(&mut self, instance: u32, alpha: f32) {
        self.instances[instance as usize].alpha = alpha.to_bits();
    }

    pub fn with<R>(&self, f: impl FnOnce(&TraceContext) -> R) -> R {
        self.run(None, f)
    }

    /// Runs `f` with light statistics enabled; returns the counters it has
    /// written.
    pub fn with_stats(&self, f: impl FnOnce(&TraceContext)) -> Vec<u32> {
        let len = light_stats_buffer_len(self.polygons.len() as u32);
        let read = vec![0; len];
        let write: Vec<_> = (0..len).map(|_| AtomicU32::new(0)).collect();
        let stats = LightStatsView::new(&read, &write);

        self.run(Some(&stats), f);

        write.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    fn run<R>(&self, stats: Option<&LightStatsView>, f: impl FnOnce(&TraceContext) -> R) -> R {
        let materials = self.materials();
        let materials = MaterialsView::new(&materials);
        let instances = InstancesView::new(&self.instances);
        let mut geometry = GeometryView::default();

        geometry.tables[GeometryTable::WorldStatic as usize] = GeometryTableView {
            indices: &self.indices,
            vertices: &self.vertices,
            primitives: &self.primitives,
            prev_positions: None,
        };

        let tracer = BruteForce {
            triangles: self.triangles(),
        };

        let textures = Constant {
            base_color: self.base_color,
            environment: self.environment,
        };

        let list_offsets = [0, self.polygons.len() as u32];
        let list_lights: Vec<_> = (0..self.polygons.len() as u32).collect();
        let counts: &[u32] = &[self.polygons.len() as u32];

        let lights = LightsView {
            polygons: &self.polygons,
            list_offsets: &list_offsets,
            list_lights: &list_lights,
            counts_history: [counts; 3],
            ..Default::default()
        };

        let scene = SceneView {
            geometry,
            instances: &instances,
            materials: &materials,
            textures: &textures,
            tracer: &tracer,
        };

        f(&TraceContext::new(&self.ubo, scene, lights, stats, &self.images))
    }

    /// Both materials sample the base texture; the light's (index 1) emits
    /// its base color.
    fn materials(&self) -> Vec<u32> {
        let material = MaterialInfo {
            base_texture: 1,
            roughness_override: self.roughness.unwrap_or(-1.0),
            ..Default::default()
        };

        [material.serialize(0), material.serialize(0)].concat()
    }

    fn triangles(&self) -> Vec<TracedTriangle> {
        let mut out = Vec::new();

        for (instance_id, instance) in self.instances.iter().enumerate() {
            for prim in 0..instance.prim_count {
                let base = 3 * (instance.prim_offset + prim) as usize;

                let positions = [0, 1, 2].map(|idx| {
                    self.vertices[self.indices[base + idx] as usize]
                        .position
                        .truncate()
                });

                out.push(TracedTriangle {
                    positions,
                    cull_mask: instance.cull_mask,
                    instance_id: instance_id as u32,
                    prim_id: prim,
                });
            }
        }

        out
    }
}

fn horizontal_corners(y: f32, center: Vec3, size: f32) -> [Vec3; 4] {
    let h = size / 2.0;

    [
        vec3(center.x - h, y, center.z + h),
        vec3(center.x + h, y, center.z + h),
        vec3(center.x - h, y, center.z - h),
        vec3(center.x + h, y, center.z - h),
    ]
}

struct TracedTriangle {
    positions: [Vec3; 3],
    cull_mask: u32,
    instance_id: u32,
    prim_id: u32,
}

struct BruteForce {
    triangles: Vec<TracedTriangle>,
}

impl RayTracer for BruteForce {
    fn trace_closest(&self, ray: Ray, t_max: f32, cull_mask: u32) -> Option<HitPayload> {
        let mut best: Option<HitPayload> = None;

        for tri in &self.triangles {
            if tri.cull_mask & cull_mask == 0 {
                continue;
            }

            let t_max = best.map_or(t_max, |hit| hit.hit_distance);

            if let Some((t, barycentric)) = intersect_triangle(&ray, tri.positions, t_max) {
                best = Some(HitPayload {
                    barycentric,
                    instance_prim: encode_instance_prim(tri.prim_id, false),
                    instance_id: tri.instance_id,
                    hit_distance: t,
                });
            }
        }

        best
    }

    fn trace_shadow(&self, ray: Ray, t_max: f32, cull_mask: u32) -> bool {
        self.triangles.iter().any(|tri| {
            tri.cull_mask & cull_mask != 0
                && intersect_triangle(&ray, tri.positions, t_max).is_some()
        })
    }
}

/// Every texture has the same color; the environment is uniform.
struct Constant {
    base_color: Vec3,
    environment: Vec3,
}

impl Textures for Constant {
    fn sample(&self, _: u32, _: Vec2, _: f32) -> Vec4 {
        self.base_color.extend(1.0)
    }

    fn sample_sky(&self, _: Vec3) -> Vec3 {
        self.environment
    }

    fn sample_envmap(&self, _: Vec3) -> Vec3 {
        self.environment
    }
}
