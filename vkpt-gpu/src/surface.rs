use glam::{Vec3, Vec4Swizzles};

use crate::{
    lerp, Cvars, F32Ext, MaterialsView, Textures, Triangle, Vec3Ext,
    MATERIAL_FLAG_LIGHT,
};

/// Roughness of surfaces whose material has neither a physical texture nor a
/// roughness override.
pub const DEFAULT_ROUGHNESS: f32 = 1.0;

/// Shading attributes of a surface point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub position: Vec3,

    /// Shading normal, facing the viewer
    pub normal: Vec3,

    /// Geometric normal, facing the viewer
    pub geo_normal: Vec3,

    pub tangent: Vec3,
    pub base_color: Vec3,
    pub metallic: f32,

    /// Perceptual roughness, after overrides and Toksvig correction
    pub roughness: f32,

    pub specular_scale: f32,
    pub emissive: Vec3,
    pub material_id: u32,
    pub cluster: i32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            normal: Vec3::Z,
            geo_normal: Vec3::Z,
            tangent: Vec3::X,
            base_color: Vec3::ONE,
            metallic: 0.0,
            roughness: DEFAULT_ROUGHNESS,
            specular_scale: 1.0,
            emissive: Vec3::ZERO,
            material_id: 0,
            cluster: -1,
        }
    }
}

impl Surface {
    /// Resolves surface of a triangle hit by a ray going in `direction`.
    pub fn resolve(
        tri: &Triangle,
        bary: Vec3,
        direction: Vec3,
        frame: u32,
        materials: &MaterialsView,
        textures: &dyn Textures,
        cvars: &Cvars,
    ) -> Self {
        let material_id = materials.animate(tri.material_id, frame);
        let material = materials.get_material_info(material_id);
        let uv = tri.uv(bary, 0);
        let lod = cvars.pt_texture_lod_bias;

        let sample = |handle: u32| {
            (handle != 0).then(|| textures.sample(handle, uv, lod))
        };

        let mut geo_normal = tri.geometric_normal();
        let (tangent, vertex_normal) = tri.tangent_frame(bary);

        let mut normal = if vertex_normal == Vec3::ZERO {
            geo_normal
        } else {
            vertex_normal
        };

        if geo_normal.dot(direction) > 0.0 {
            geo_normal = -geo_normal;
        }

        if normal.dot(geo_normal) < 0.0 {
            normal = -normal;
        }

        let base_color = sample(material.base_texture)
            .map(|color| color.xyz())
            .unwrap_or(Vec3::ONE)
            * material.base_factor;

        let (mut roughness, mut metallic) = match sample(material.physical_texture) {
            Some(phys) => (phys.x, phys.y * material.metalness_factor),
            None => (DEFAULT_ROUGHNESS, material.metalness_factor),
        };

        if material.roughness_override >= 0.0 {
            roughness = material.roughness_override;
        }

        if let Some(texel) = sample(material.normals_texture) {
            let ts = texel.xyz() * 2.0 - 1.0;
            let bump = material.bump_scale * cvars.pt_bump_scale;
            let ts_len = ts.length();

            let bitangent = normal.cross(tangent);
            let mapped = (tangent * ts.x * bump + bitangent * ts.y * bump + normal * ts.z)
                .safe_normalize();

            if mapped != Vec3::ZERO && tangent != Vec3::ZERO {
                normal = mapped;
            }

            roughness = lerp(
                roughness,
                toksvig_roughness(roughness, ts_len),
                cvars.pt_toksvig,
            );
        }

        if cvars.pt_roughness_override >= 0.0 {
            roughness = cvars.pt_roughness_override;
        }

        if cvars.pt_metallic_override >= 0.0 {
            metallic = cvars.pt_metallic_override;
        }

        let roughness = roughness.max(cvars.pt_min_roughness).saturate();

        let mut emissive = sample(material.emissive_texture)
            .map(|color| color.xyz())
            .unwrap_or(Vec3::ZERO);

        if material_id & MATERIAL_FLAG_LIGHT != 0 && material.emissive_texture == 0 {
            emissive = base_color;
        }

        Self {
            position: tri.position(bary),
            normal,
            geo_normal,
            tangent,
            base_color: base_color.clamp(Vec3::ZERO, Vec3::ONE),
            metallic: metallic.saturate(),
            roughness,
            specular_scale: material.specular_scale,
            emissive: emissive * material.emissive_scale * cvars.pt_emissive_scale,
            material_id,
            cluster: tri.cluster,
        }
    }

    /// GGX alpha.
    pub fn alpha(&self) -> f32 {
        self.roughness.sqr()
    }

    /// Albedo of the diffuse lobe.
    pub fn diffuse_albedo(&self) -> Vec3 {
        self.base_color * (1.0 - self.metallic)
    }

    /// Reflectance at normal incidence.
    pub fn f0(&self) -> Vec3 {
        lerp(Vec3::splat(0.04), self.base_color, self.metallic) * self.specular_scale
    }

    /// Position secondary rays start from.
    pub fn ray_origin(&self, bias: f32) -> Vec3 {
        self.position + self.geo_normal * bias
    }
}

/// Converts GGX alpha into Phong specular power.
pub fn alpha_to_spec_power(alpha: f32) -> f32 {
    2.0 / alpha.sqr().max(crate::VKPT_EPSILON) - 2.0
}

/// Converts Phong specular power into GGX alpha.
pub fn spec_power_to_alpha(power: f32) -> f32 {
    (2.0 / (power.max(0.0) + 2.0)).sqrt()
}

/// Widens roughness by the variance of a filtered normal map: the shorter
/// the averaged normal, the rougher the surface.
pub fn toksvig_roughness(roughness: f32, normal_len: f32) -> f32 {
    let normal_len = normal_len.clamp(crate::VKPT_EPSILON, 1.0);
    let power = alpha_to_spec_power(roughness.sqr());
    let ft = normal_len / (normal_len + power * (1.0 - normal_len));

    spec_power_to_alpha(ft * power).sqrt().max(roughness)
}

/// Flips `v` into the hemisphere of `n`.
pub fn face_forward(v: Vec3, n: Vec3) -> Vec3 {
    if v.dot(n) < 0.0 {
        -v
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{vec2, vec3, Vec2, Vec4};

    use super::*;
    use crate::{MaterialInfo, TangentFrame, MATERIAL_UINTS};

    struct FlatTextures {
        physical: Vec4,
        normals: Vec4,
    }

    impl Textures for FlatTextures {
        fn sample(&self, handle: u32, _: Vec2, _: f32) -> Vec4 {
            match handle {
                2 => self.physical,
                3 => self.normals,
                _ => Vec4::ONE,
            }
        }

        fn sample_sky(&self, _: Vec3) -> Vec3 {
            Vec3::ZERO
        }

        fn sample_envmap(&self, _: Vec3) -> Vec3 {
            Vec3::ZERO
        }
    }

    fn triangle(material_id: u32) -> Triangle {
        let frame = TangentFrame::encode(Vec3::Z, Vec3::X);

        Triangle {
            positions: [Vec3::ZERO, Vec3::X, Vec3::Y],
            prev_positions: [Vec3::ZERO, Vec3::X, Vec3::Y],
            uvs: [[vec2(0.0, 0.0); 4]; 3],
            tangent_frames: [frame; 3],
            material_id,
            ..Default::default()
        }
    }

    fn materials(infos: &[MaterialInfo]) -> Vec<u32> {
        let mut words = vec![0; MATERIAL_UINTS];

        for info in infos {
            words.extend(info.serialize(0));
        }

        words
    }

    #[test]
    fn faces_the_viewer() {
        let words = materials(&[MaterialInfo::default()]);
        let materials = MaterialsView::new(&words);
        let tri = triangle(1);

        let surface = Surface::resolve(
            &tri,
            Vec3::splat(1.0 / 3.0),
            vec3(0.0, 0.0, 1.0),
            0,
            &materials,
            &crate::NoTextures,
            &Cvars::default(),
        );

        assert_relative_eq!(-1.0, surface.geo_normal.z, epsilon = 1e-4);
        assert_relative_eq!(-1.0, surface.normal.z, epsilon = 1e-4);
        assert_eq!(DEFAULT_ROUGHNESS, surface.roughness);
    }

    #[test]
    fn physical_texture() {
        let words = materials(&[MaterialInfo {
            physical_texture: 2,
            metalness_factor: 1.0,
            ..Default::default()
        }]);

        let textures = FlatTextures {
            physical: Vec4::new(0.5, 0.75, 0.0, 0.0),
            normals: Vec4::new(0.5, 0.5, 1.0, 0.0),
        };

        let surface = Surface::resolve(
            &triangle(1),
            Vec3::splat(1.0 / 3.0),
            -Vec3::Z,
            0,
            &MaterialsView::new(&words),
            &textures,
            &Cvars::default(),
        );

        assert_relative_eq!(0.5, surface.roughness);
        assert_relative_eq!(0.75, surface.metallic);
    }

    #[test]
    fn overrides() {
        let words = materials(&[MaterialInfo {
            physical_texture: 2,
            ..Default::default()
        }]);

        let textures = FlatTextures {
            physical: Vec4::new(0.5, 0.75, 0.0, 0.0),
            normals: Vec4::ZERO,
        };

        let cvars = Cvars {
            pt_roughness_override: 0.25,
            pt_metallic_override: 0.0,
            ..Default::default()
        };

        let surface = Surface::resolve(
            &triangle(1),
            Vec3::splat(1.0 / 3.0),
            -Vec3::Z,
            0,
            &MaterialsView::new(&words),
            &textures,
            &cvars,
        );

        assert_relative_eq!(0.25, surface.roughness);
        assert_relative_eq!(0.0, surface.metallic);
    }

    #[test]
    fn min_roughness() {
        let words = materials(&[MaterialInfo {
            roughness_override: 0.0,
            ..Default::default()
        }]);

        let surface = Surface::resolve(
            &triangle(1),
            Vec3::splat(1.0 / 3.0),
            -Vec3::Z,
            0,
            &MaterialsView::new(&words),
            &crate::NoTextures,
            &Cvars::default(),
        );

        assert_relative_eq!(Cvars::default().pt_min_roughness, surface.roughness);
    }

    #[test]
    fn toksvig() {
        // Unit-length normals don't widen the lobe
        assert_relative_eq!(0.3, toksvig_roughness(0.3, 1.0), epsilon = 1e-4);

        // Shorter ones do, more the shorter they are
        let a = toksvig_roughness(0.3, 0.95);
        let b = toksvig_roughness(0.3, 0.8);

        assert!(a > 0.3);
        assert!(b > a);
        assert!(b <= 1.0);
    }

    #[test]
    fn spec_power_roundtrip() {
        for alpha in [0.05, 0.2, 0.5, 0.9] {
            assert_relative_eq!(
                alpha,
                spec_power_to_alpha(alpha_to_spec_power(alpha)),
                epsilon = 1e-4
            );
        }
    }
}
