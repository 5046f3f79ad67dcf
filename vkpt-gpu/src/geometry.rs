use glam::{vec2, vec3, Mat4, UVec4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::layout::schema;
use crate::{
    decode_instance_prim, InstanceType, InstancesView, TangentFrame, U32Ext,
    Vec3Ext,
};

pub const GEOMETRY_TABLE_COUNT: usize = 5;

/// One of the index+vertex buffer pairs holding world geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryTable {
    WorldStatic = 0,
    SkyStatic = 1,
    DynamicMaterial = 2,
    DynamicGeometry = 3,
    Submodel = 4,
}

impl GeometryTable {
    pub const ALL: [Self; GEOMETRY_TABLE_COUNT] = [
        Self::WorldStatic,
        Self::SkyStatic,
        Self::DynamicMaterial,
        Self::DynamicGeometry,
        Self::Submodel,
    ];

    /// Returns table holding triangles of given instance type; instanced
    /// types have none.
    pub fn for_instance(ty: InstanceType) -> Option<Self> {
        match ty {
            InstanceType::WorldStatic => Some(Self::WorldStatic),
            InstanceType::Sky => Some(Self::SkyStatic),
            InstanceType::WorldDynamicMaterial => Some(Self::DynamicMaterial),
            InstanceType::WorldDynamicGeometry => Some(Self::DynamicGeometry),
            InstanceType::WorldSubmodel => Some(Self::Submodel),
            InstanceType::EntityStatic | InstanceType::EntityDynamic => None,
        }
    }

    /// Index among the tables that keep previous-frame positions.
    pub fn prev_positions_slot(self) -> Option<usize> {
        match self {
            Self::DynamicMaterial => Some(0),
            Self::DynamicGeometry => Some(1),
            _ => None,
        }
    }
}

schema! {
    #[derive(Debug, Default, PartialEq)]
    pub struct Vertex {
        /// xyz: position
        pub position: Vec4,

        /// Four UV sets, two per vector
        pub uv: [Vec4; 2],

        /// RGBA8 color
        pub color: u32,

        /// See: [`TangentFrame`]
        pub tangent_frame: u32,

        pub _pad: [u32; 2],
    }
}

impl Vertex {
    pub fn uv(&self, set: usize) -> Vec2 {
        let pair = self.uv[(set / 2).min(1)];

        if set % 2 == 0 {
            pair.xy()
        } else {
            pair.zw()
        }
    }
}

schema! {
    #[derive(Debug, Default, PartialEq)]
    pub struct PrimitiveRecord {
        pub material_id: u32,

        /// Visibility cluster of the primitive, -1 for none
        pub cluster: i32,
    }
}

schema! {
    /// Triangle of instanced (entity) geometry, already transformed into
    /// world space.
    #[derive(Debug, Default, PartialEq)]
    pub struct InstancedPrimitive {
        /// xyz: position, w: RGBA8 color (as bits)
        pub positions: [Vec4; 3],

        pub prev_positions: [Vec4; 3],

        /// Two UV sets per vertex
        pub uvs: [Vec4; 3],

        /// xyz: tangent frames of the vertices
        pub tangent_frames: UVec4,

        pub material_id: u32,
        pub cluster: i32,
        pub instance_index: u32,
        pub _pad: u32,
    }
}

/// Triangle fetched from any of the geometry sources.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
    pub positions: [Vec3; 3],
    pub prev_positions: [Vec3; 3],

    /// Per-vertex UV sets
    pub uvs: [[Vec2; 4]; 3],

    /// Per-vertex RGBA8 colors
    pub colors: [u32; 3],

    /// Per-vertex packed tangent frames
    pub tangent_frames: [u32; 3],

    pub material_id: u32,
    pub cluster: i32,
}

impl Triangle {
    pub fn transform(mut self, curr: Mat4, prev: Mat4) -> Self {
        for idx in 0..3 {
            self.positions[idx] = curr.transform_point3(self.positions[idx]);
            self.prev_positions[idx] = prev.transform_point3(self.prev_positions[idx]);
        }

        self
    }

    pub fn area(&self) -> f32 {
        let [p0, p1, p2] = self.positions;

        0.5 * (p1 - p0).cross(p2 - p0).length()
    }

    /// Normal following the counter-clockwise winding; zero for degenerate
    /// triangles.
    pub fn geometric_normal(&self) -> Vec3 {
        let [p0, p1, p2] = self.positions;

        (p1 - p0).cross(p2 - p0).safe_normalize()
    }

    pub fn position(&self, bary: Vec3) -> Vec3 {
        interpolate(self.positions, bary)
    }

    pub fn prev_position(&self, bary: Vec3) -> Vec3 {
        interpolate(self.prev_positions, bary)
    }

    pub fn uv(&self, bary: Vec3, set: usize) -> Vec2 {
        let set = set.min(3);

        self.uvs[0][set] * bary.x + self.uvs[1][set] * bary.y + self.uvs[2][set] * bary.z
    }

    pub fn color(&self, bary: Vec3) -> Vec4 {
        self.colors[0].to_unorm4x8() * bary.x
            + self.colors[1].to_unorm4x8() * bary.y
            + self.colors[2].to_unorm4x8() * bary.z
    }

    /// Returns interpolated `(tangent, normal)` of the vertices' tangent
    /// frames.
    pub fn tangent_frame(&self, bary: Vec3) -> (Vec3, Vec3) {
        let mut tangent = Vec3::ZERO;
        let mut normal = Vec3::ZERO;

        for idx in 0..3 {
            let (t, _, n) = TangentFrame::decode(self.tangent_frames[idx]);

            tangent += t * bary[idx];
            normal += n * bary[idx];
        }

        (tangent.safe_normalize(), normal.safe_normalize())
    }
}

/// Converts hit barycentrics (weights of the second and third vertex) into
/// weights of all three vertices.
pub fn expand_barycentrics(bary: Vec2) -> Vec3 {
    vec3(1.0 - bary.x - bary.y, bary.x, bary.y)
}

fn interpolate(values: [Vec3; 3], bary: Vec3) -> Vec3 {
    values[0] * bary.x + values[1] * bary.y + values[2] * bary.z
}

#[derive(Clone, Copy, Default)]
pub struct GeometryTableView<'a> {
    pub indices: &'a [u32],
    pub vertices: &'a [Vertex],
    pub primitives: &'a [PrimitiveRecord],

    /// Previous-frame positions, parallel to `vertices`; tables without them
    /// reuse the current positions
    pub prev_positions: Option<&'a [Vec4]>,
}

impl<'a> GeometryTableView<'a> {
    pub fn len(&self) -> u32 {
        self.primitives.len() as u32
    }

    pub fn get(&self, prim_id: u32) -> Option<Triangle> {
        let prim = self.primitives.get(prim_id as usize)?;
        let base = 3 * prim_id as usize;
        let indices = self.indices.get(base..base + 3)?;

        let mut tri = Triangle {
            material_id: prim.material_id,
            cluster: prim.cluster,
            ..Default::default()
        };

        for (idx, vertex_id) in indices.iter().enumerate() {
            let vertex = self.vertices.get(*vertex_id as usize)?;

            tri.positions[idx] = vertex.position.xyz();

            tri.prev_positions[idx] = self
                .prev_positions
                .and_then(|prev| prev.get(*vertex_id as usize))
                .map(|prev| prev.xyz())
                .unwrap_or(tri.positions[idx]);

            tri.uvs[idx] = [vertex.uv(0), vertex.uv(1), vertex.uv(2), vertex.uv(3)];
            tri.colors[idx] = vertex.color;
            tri.tangent_frames[idx] = vertex.tangent_frame;
        }

        Some(tri)
    }
}

/// Geometry data reachable from the hit shaders.
#[derive(Clone, Copy, Default)]
pub struct GeometryView<'a> {
    pub tables: [GeometryTableView<'a>; GEOMETRY_TABLE_COUNT],
    pub instanced: &'a [InstancedPrimitive],
}

impl<'a> GeometryView<'a> {
    pub fn table(&self, table: GeometryTable) -> &GeometryTableView<'a> {
        &self.tables[table as usize]
    }

    /// Fetches triangle of given world table.
    ///
    /// Unknown instance types, instanced types and out-of-range primitives
    /// yield a zeroed triangle (material 0, cluster 0).
    pub fn get_triangle(&self, instance_type: u32, prim_id: u32) -> Triangle {
        InstanceType::from_u32(instance_type)
            .and_then(GeometryTable::for_instance)
            .and_then(|table| self.table(table).get(prim_id))
            .unwrap_or_default()
    }

    /// Fetches triangle of the flat per-primitive arrays.
    pub fn get_instanced_triangle(&self, prim_id: u32) -> Triangle {
        let Some(prim) = self.instanced.get(prim_id as usize) else {
            return Default::default();
        };

        let mut tri = Triangle {
            material_id: prim.material_id,
            cluster: prim.cluster,
            ..Default::default()
        };

        for idx in 0..3 {
            tri.positions[idx] = prim.positions[idx].xyz();
            tri.prev_positions[idx] = prim.prev_positions[idx].xyz();
            tri.colors[idx] = prim.positions[idx].w.to_bits();
            tri.tangent_frames[idx] = prim.tangent_frames[idx];

            let uv = prim.uvs[idx];

            tri.uvs[idx] = [uv.xy(), uv.zw(), vec2(0.0, 0.0), vec2(0.0, 0.0)];
        }

        tri
    }

    /// Fetches the triangle a ray has hit, in world space.
    pub fn fetch(&self, instances: &InstancesView, hit: &HitPayload) -> Triangle {
        let (prim_id, is_dynamic) = decode_instance_prim(hit.instance_prim);

        if is_dynamic {
            return self.get_instanced_triangle(prim_id);
        }

        let Some(instance) = instances.get(hit.instance_id) else {
            return Default::default();
        };

        let tri = self.get_triangle(instance.instance_type, instance.prim_offset + prim_id);

        match instance.ty() {
            // Submodels move through their transforms, but aren't given
            // motion vectors
            Some(InstanceType::WorldSubmodel) => {
                tri.transform(instance.transform, instance.transform)
            }
            _ => tri,
        }
    }
}

/// Result of a closest-hit query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitPayload {
    /// Weights of the second and third vertex
    pub barycentric: Vec2,

    /// Primitive id; top bit marks instanced geometry
    pub instance_prim: u32,

    pub instance_id: u32,
    pub hit_distance: f32,
}

impl HitPayload {
    pub fn bary(&self) -> Vec3 {
        expand_barycentrics(self.barycentric)
    }
}
