use core::f32::consts::PI;

use glam::{vec3, Vec2, Vec3};

use crate::{alpha_to_spec_power, F32Ext, Surface, Vec3Ext, VKPT_EPSILON};

/// Upper bound of the weight the Phong lobe gets in light selection.
pub const MAX_PHONG_WEIGHT: f32 = 0.9;

#[derive(Clone, Copy)]
pub struct DiffuseBrdf<'a> {
    surface: &'a Surface,
}

impl<'a> DiffuseBrdf<'a> {
    pub fn new(surface: &'a Surface) -> Self {
        Self { surface }
    }

    /// Returns BRDF times cosine.
    pub fn eval(self, l: Vec3) -> Vec3 {
        let n_o_l = self.surface.normal.dot(l);

        if n_o_l <= 0.0 {
            return Vec3::ZERO;
        }

        self.surface.diffuse_albedo() * (n_o_l / PI)
    }
}

#[derive(Clone, Copy)]
pub struct SpecularBrdf<'a> {
    surface: &'a Surface,
}

impl<'a> SpecularBrdf<'a> {
    pub fn new(surface: &'a Surface) -> Self {
        Self { surface }
    }

    /// Returns BRDF times cosine.
    pub fn eval(self, l: Vec3, v: Vec3) -> Vec3 {
        let n = self.surface.normal;
        let n_o_l = n.dot(l);
        let n_o_v = n.dot(v);

        if n_o_l <= 0.0 || n_o_v <= 0.0 {
            return Vec3::ZERO;
        }

        let h = (l + v).safe_normalize();

        if h == Vec3::ZERO {
            return Vec3::ZERO;
        }

        let alpha = self.surface.alpha();
        let d = d_ggx(alpha, n.dot(h).saturate());
        let g = g1_smith(alpha, n_o_l) * g1_smith(alpha, n_o_v);
        let f = fresnel_schlick(self.surface.f0(), v.dot(h).saturate());

        f * (d * g / (4.0 * n_o_v.max(VKPT_EPSILON)))
    }

    /// Samples a reflected direction through the distribution of visible
    /// normals; returns `None` when the direction ends up below the surface.
    ///
    /// `ndf_trim` shortens the distribution's tail (`1.0` keeps it whole).
    pub fn sample(self, v: Vec3, u: Vec2, ndf_trim: f32) -> Option<Vec3> {
        let n = self.surface.normal;
        let (t, b) = n.any_orthonormal_pair();
        let v_local = vec3(v.dot(t), v.dot(b), v.dot(n));

        if v_local.z <= 0.0 {
            return None;
        }

        let h_local = sample_vndf(v_local, self.surface.alpha(), Vec2::new(u.x * ndf_trim, u.y));
        let h = t * h_local.x + b * h_local.y + n * h_local.z;
        let l = (-v).reflect(h);

        (n.dot(l) > 0.0).then_some(l)
    }

    /// Probability density (per solid angle) of [`Self::sample()`] returning
    /// `l`.
    pub fn pdf(self, l: Vec3, v: Vec3) -> f32 {
        let n = self.surface.normal;
        let n_o_v = n.dot(v);

        if n.dot(l) <= 0.0 || n_o_v <= 0.0 {
            return 0.0;
        }

        let h = (l + v).safe_normalize();
        let alpha = self.surface.alpha();

        d_ggx(alpha, n.dot(h).saturate()) * g1_smith(alpha, n_o_v) / (4.0 * n_o_v)
    }

    /// Normalized Phong lobe approximating this BRDF, evaluated at `l`;
    /// used to steer light selection towards reflected highlights.
    pub fn phong_lobe(self, l: Vec3, v: Vec3) -> f32 {
        let power = alpha_to_spec_power(self.surface.alpha());
        let r = (-v).reflect(self.surface.normal);
        let scale = ((power + 1.0) / (2.0 * PI)).min(100.0);

        scale * r.dot(l).max(0.0).powf(power)
    }

    /// Share of specular reflection in the surface's total reflectance, used
    /// to blend the Phong lobe into light selection.
    pub fn phong_weight(self, v: Vec3) -> f32 {
        let n_o_v = self.surface.normal.dot(v).saturate();
        let specular = fresnel_schlick(self.surface.f0(), n_o_v).luma();
        let diffuse = self.surface.diffuse_albedo().luma();

        (specular / (specular + diffuse).max(VKPT_EPSILON)).clamp(0.0, MAX_PHONG_WEIGHT)
    }
}

/// GGX normal distribution function.
pub fn d_ggx(alpha: f32, n_o_h: f32) -> f32 {
    let a2 = alpha.sqr().max(1e-8);
    let denom = (1.0 - n_o_h.sqr()).max(0.0) + n_o_h.sqr() * a2;

    a2 / (PI * denom.sqr())
}

/// Smith masking term of a single direction.
pub fn g1_smith(alpha: f32, n_o_x: f32) -> f32 {
    let n_o_x = n_o_x.max(VKPT_EPSILON);
    let a2 = alpha.sqr();

    2.0 * n_o_x / (n_o_x + (a2 + (1.0 - a2) * n_o_x.sqr()).sqrt())
}

pub fn fresnel_schlick(f0: Vec3, v_o_h: f32) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - v_o_h).saturate().powi(5)
}

/// Samples a visible normal in tangent space (`z` being the normal).
pub fn sample_vndf(v: Vec3, alpha: f32, u: Vec2) -> Vec3 {
    let alpha = alpha.max(VKPT_EPSILON);
    let vh = vec3(alpha * v.x, alpha * v.y, v.z).normalize();
    let len_sq = vh.x * vh.x + vh.y * vh.y;

    let t1 = if len_sq > 0.0 {
        vec3(-vh.y, vh.x, 0.0) / len_sq.sqrt()
    } else {
        Vec3::X
    };

    let t2 = vh.cross(t1);
    let r = u.x.sqrt();
    let phi = 2.0 * PI * u.y;
    let p1 = r * phi.cos();
    let s = 0.5 * (1.0 + vh.z);
    let p2 = (1.0 - s) * (1.0 - p1 * p1).max(0.0).sqrt() + s * r * phi.sin();
    let nh = t1 * p1 + t2 * p2 + vh * (1.0 - p1 * p1 - p2 * p2).max(0.0).sqrt();

    vec3(alpha * nh.x, alpha * nh.y, nh.z.max(0.0)).normalize()
}

/// Balance heuristic.
pub fn mis_balance(pdf: f32, other_pdf: f32) -> f32 {
    let sum = pdf + other_pdf;

    if sum > 0.0 {
        pdf / sum
    } else {
        0.0
    }
}
