use glam::{uvec2, vec2, vec4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::{
    decode_instance_prim, AbImageId, FrameImages, HitPayload, InstancesView,
    Normal, Role,
};

/// Primitive word of pixels whose primary ray missed the geometry.
pub const HIT_NONE: u32 = u32::MAX;

/// Images making up the G-buffer, in the order of
/// [`GBufferEntry::pack()`].
pub const GBUFFER_IMAGES: [AbImageId; 9] = [
    AbImageId::VisbufPrim,
    AbImageId::VisbufBary,
    AbImageId::Cluster,
    AbImageId::BaseColor,
    AbImageId::MetallicRoughness,
    AbImageId::ViewDepth,
    AbImageId::Normal,
    AbImageId::GeoNormal,
    AbImageId::Tangent,
];

/// Visibility-buffer entry: what the primary ray of a pixel has hit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisBuffer {
    pub instance_prim: u32,
    pub instance_id: u32,
    pub barycentric: Vec2,
}

impl Default for VisBuffer {
    fn default() -> Self {
        Self::none()
    }
}

impl VisBuffer {
    pub fn none() -> Self {
        Self {
            instance_prim: HIT_NONE,
            instance_id: 0,
            barycentric: Vec2::ZERO,
        }
    }

    pub fn from_hit(hit: &HitPayload) -> Self {
        Self {
            instance_prim: hit.instance_prim,
            instance_id: hit.instance_id,
            barycentric: hit.barycentric,
        }
    }

    pub fn is_some(&self) -> bool {
        self.instance_prim != HIT_NONE
    }

    pub fn to_hit(self, hit_distance: f32) -> Option<HitPayload> {
        self.is_some().then_some(HitPayload {
            barycentric: self.barycentric,
            instance_prim: self.instance_prim,
            instance_id: self.instance_id,
            hit_distance,
        })
    }

    /// Maps an entry written during the previous frame onto this frame's
    /// instances; instanced geometry keeps its primitive ids between frames.
    pub fn to_current(self, instances: &InstancesView) -> Option<Self> {
        if !self.is_some() {
            return None;
        }

        if decode_instance_prim(self.instance_prim).1 {
            return Some(self);
        }

        Some(Self {
            instance_id: instances.find_current(self.instance_id)?,
            ..self
        })
    }

    pub fn pack(self) -> [Vec4; 2] {
        [
            vec4(
                f32::from_bits(self.instance_prim),
                f32::from_bits(self.instance_id),
                0.0,
                0.0,
            ),
            self.barycentric.extend(0.0).extend(0.0),
        ]
    }

    pub fn unpack([prim, bary]: [Vec4; 2]) -> Self {
        Self {
            instance_prim: prim.x.to_bits(),
            instance_id: prim.y.to_bits(),
            barycentric: bary.xy(),
        }
    }

    pub fn read(images: &FrameImages, role: Role, pixel: UVec2) -> Self {
        Self::unpack([
            images.read_ab(AbImageId::VisbufPrim, role, pixel),
            images.read_ab(AbImageId::VisbufBary, role, pixel),
        ])
    }
}

/// Per-pixel surface attributes written by the primary rays and consumed by
/// the denoiser.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GBufferEntry {
    pub visbuf: VisBuffer,
    pub cluster: i32,
    pub base_color: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub specular_scale: f32,

    /// Distance from the camera; zero where the primary ray missed
    pub view_depth: f32,

    pub normal: Vec3,
    pub geo_normal: Vec3,
    pub tangent: Vec3,
}

impl GBufferEntry {
    pub fn is_some(&self) -> bool {
        self.view_depth != 0.0
    }

    pub fn pack(&self) -> [Vec4; 9] {
        let [prim, bary] = self.visbuf.pack();
        let word = |value: u32| vec4(f32::from_bits(value), 0.0, 0.0, 0.0);

        [
            prim,
            bary,
            word(self.cluster as u32),
            self.base_color.clamp(Vec3::ZERO, Vec3::ONE).extend(1.0),
            vec4(
                self.metallic.clamp(0.0, 1.0),
                self.roughness.clamp(0.0, 1.0),
                self.specular_scale.clamp(0.0, 1.0),
                0.0,
            ),
            vec4(self.view_depth, 0.0, 0.0, 0.0),
            word(Normal::encode_u32(self.normal)),
            word(Normal::encode_u32(self.geo_normal)),
            word(Normal::encode_u32(self.tangent)),
        ]
    }

    pub fn unpack(data: [Vec4; 9]) -> Self {
        let [prim, bary, cluster, base_color, mr, depth, normal, geo_normal, tangent] = data;

        Self {
            visbuf: VisBuffer::unpack([prim, bary]),
            cluster: cluster.x.to_bits() as i32,
            base_color: base_color.xyz(),
            metallic: mr.x,
            roughness: mr.y,
            specular_scale: mr.z,
            view_depth: depth.x,
            normal: Normal::decode_u32(normal.x.to_bits()),
            geo_normal: Normal::decode_u32(geo_normal.x.to_bits()),
            tangent: Normal::decode_u32(tangent.x.to_bits()),
        }
    }

    pub fn read(images: &FrameImages, role: Role, pixel: UVec2) -> Self {
        Self::unpack(GBUFFER_IMAGES.map(|id| images.read_ab(id, role, pixel)))
    }
}

/// Depth and normal of a G-buffer pixel, i.e. what reprojection and edge
/// stopping compare.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceSignature {
    pub depth: f32,
    pub normal: Vec3,
}

impl SurfaceSignature {
    pub fn read(images: &FrameImages, role: Role, pixel: UVec2) -> Self {
        Self {
            depth: images.read_ab(AbImageId::ViewDepth, role, pixel).x,
            normal: Normal::decode_u32(
                images.read_ab(AbImageId::Normal, role, pixel).x.to_bits(),
            ),
        }
    }

    pub fn is_some(&self) -> bool {
        self.depth != 0.0
    }

    /// Returns whether history of `other` can be reused for this surface.
    pub fn matches(&self, other: &Self, max_depth_diff: f32, min_normal_dot: f32) -> bool {
        if !self.is_some() || !other.is_some() {
            return false;
        }

        let depth_diff = (self.depth - other.depth).abs() / self.depth.max(other.depth);

        depth_diff <= max_depth_diff && self.normal.dot(other.normal) >= min_normal_dot
    }
}

/// Pixel of the gradient image containing given pixel.
pub fn gradient_stratum(pixel: UVec2) -> UVec2 {
    pixel / crate::GRAD_DWN
}

/// Offset (`0..GRAD_DWN^2`) of given pixel within its gradient stratum.
pub fn stratum_offset(pixel: UVec2) -> u32 {
    let local = pixel % crate::GRAD_DWN;

    local.y * crate::GRAD_DWN + local.x
}

/// Pixel at given offset of a gradient stratum.
pub fn stratum_pixel(stratum: UVec2, offset: u32) -> UVec2 {
    stratum * crate::GRAD_DWN + uvec2(offset % crate::GRAD_DWN, offset / crate::GRAD_DWN)
}

pub(crate) fn pixel_center(pixel: UVec2) -> Vec2 {
    pixel.as_vec2() + vec2(0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;
    use crate::FrameSizes;

    #[test]
    fn pack_unpack() {
        let entry = GBufferEntry {
            visbuf: VisBuffer {
                instance_prim: 0x8000_0123,
                instance_id: 7,
                barycentric: vec2(0.25, 0.5),
            },
            cluster: -1,
            base_color: vec3(0.1, 0.2, 0.3),
            metallic: 0.4,
            roughness: 0.5,
            specular_scale: 1.0,
            view_depth: 12.5,
            normal: vec3(0.0, 1.0, 0.0),
            geo_normal: vec3(0.0, 0.0, -1.0),
            tangent: vec3(1.0, 0.0, 0.0),
        };

        let actual = GBufferEntry::unpack(entry.pack());

        assert_eq!(entry.visbuf, actual.visbuf);
        assert_eq!(-1, actual.cluster);
        assert_eq!(12.5, actual.view_depth);
        assert_relative_eq!(entry.normal.y, actual.normal.y, epsilon = 1e-3);
        assert_relative_eq!(entry.geo_normal.z, actual.geo_normal.z, epsilon = 1e-3);
        assert_relative_eq!(entry.tangent.x, actual.tangent.x, epsilon = 1e-3);
    }

    #[test]
    fn empty_images_read_as_misses() {
        let images = FrameImages::new(FrameSizes::new(uvec2(4, 4), uvec2(4, 4)));
        let entry = GBufferEntry::read(&images, Role::History, uvec2(1, 1));

        assert!(!entry.is_some());
        assert!(!SurfaceSignature::read(&images, Role::History, uvec2(1, 1)).is_some());
    }

    #[test]
    fn signatures() {
        let a = SurfaceSignature {
            depth: 10.0,
            normal: Vec3::Y,
        };

        let b = SurfaceSignature {
            depth: 10.5,
            normal: Vec3::Y,
        };

        let c = SurfaceSignature {
            depth: 10.0,
            normal: Vec3::X,
        };

        assert!(a.matches(&b, 0.1, 0.9));
        assert!(!a.matches(&b, 0.01, 0.9));
        assert!(!a.matches(&c, 0.1, 0.9));
        assert!(!a.matches(&SurfaceSignature::default(), 0.1, 0.9));
    }

    #[test]
    fn history_entries_follow_instances() {
        use crate::{InstanceRecord, INSTANCE_DYNAMIC_FLAG};

        let instances = [
            InstanceRecord {
                prev_index: 1,
                ..Default::default()
            },
            InstanceRecord {
                prev_index: 0,
                ..Default::default()
            },
        ];

        let instances = InstancesView::new(&instances);

        let entry = VisBuffer {
            instance_prim: 5,
            instance_id: 0,
            barycentric: Vec2::ZERO,
        };

        assert_eq!(1, entry.to_current(&instances).unwrap().instance_id);

        let entry = VisBuffer {
            instance_id: 7,
            ..entry
        };

        assert_eq!(None, entry.to_current(&instances));

        let entry = VisBuffer {
            instance_prim: 5 | INSTANCE_DYNAMIC_FLAG,
            ..entry
        };

        assert_eq!(Some(entry), entry.to_current(&instances));
        assert_eq!(None, VisBuffer::none().to_current(&instances));
    }

    #[test]
    fn strata() {
        for offset in 0..9 {
            let pixel = stratum_pixel(uvec2(2, 3), offset);

            assert_eq!(uvec2(2, 3), gradient_stratum(pixel));
            assert_eq!(offset, stratum_offset(pixel));
        }
    }
}
