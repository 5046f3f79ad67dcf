use core::f32::consts::PI;

use glam::{vec4, Vec3, Vec4, Vec4Swizzles};

use crate::layout::schema;
use crate::{
    environment_radiance, mis_balance, F32Ext, GlobalUbo,
    LightStatsView, Noise, Normal, SpecularBrdf, Surface, Textures, U32Ext,
    Vec3Ext, LIGHT_COUNT_HISTORY, VKPT_EPSILON,
};

/// Number of polygonal lights whose masses are evaluated per sample; longer
/// lists get split into partitions of this size, one of which is picked
/// uniformly.
pub const MAX_BRUTEFORCE_SAMPLING: u32 = 8;

/// Number of samples of a tabulated spot-light emission profile.
pub const SPOT_PROFILE_SAMPLES: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonLightType {
    Regular = 0,

    /// Portal through which the environment shines in
    Sky = 1,
}

schema! {
    /// Emissive triangle.
    #[derive(Debug, Default, PartialEq)]
    pub struct LightPolygon {
        /// xyz: vertex position, w: RGBA8 vertex color (as bits)
        pub positions: [Vec4; 3],

        /// x: light-style scale,
        /// y: previous frame's light-style scale,
        /// z: type (as bits),
        /// w: intensity
        pub data: Vec4,
    }
}

impl LightPolygon {
    pub fn new(positions: [Vec3; 3], colors: [Vec3; 3], intensity: f32, ty: PolygonLightType) -> Self {
        let vertex = |idx: usize| {
            positions[idx].extend(f32::from_bits(u32::from_unorm4x8(colors[idx].extend(1.0))))
        };

        Self {
            positions: [vertex(0), vertex(1), vertex(2)],
            data: vec4(1.0, 1.0, f32::from_bits(ty as u32), intensity),
        }
    }

    pub fn position(&self, idx: usize) -> Vec3 {
        self.positions[idx].xyz()
    }

    pub fn color(&self, idx: usize) -> Vec3 {
        self.positions[idx].w.to_bits().to_unorm4x8().xyz() * self.data.w
    }

    pub fn average_color(&self) -> Vec3 {
        (self.color(0) + self.color(1) + self.color(2)) / 3.0
    }

    pub fn style_scale(&self, prev: bool) -> f32 {
        if prev {
            self.data.y
        } else {
            self.data.x
        }
    }

    pub fn ty(&self) -> PolygonLightType {
        if self.data.z.to_bits() == PolygonLightType::Sky as u32 {
            PolygonLightType::Sky
        } else {
            PolygonLightType::Regular
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.position(0) + self.position(1) + self.position(2)) / 3.0
    }

    /// Returns `(normal * 2 * area)`; lights emit along the normal only.
    fn scaled_normal(&self) -> Vec3 {
        (self.position(1) - self.position(0)).cross(self.position(2) - self.position(0))
    }

    pub fn area(&self) -> f32 {
        0.5 * self.scaled_normal().length()
    }

    pub fn normal(&self) -> Vec3 {
        self.scaled_normal().safe_normalize()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynLightType {
    Sphere = 0,
    Spot = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpotProfile {
    /// Smooth falloff between two cone angles
    Falloff = 0,

    /// Emission tabulated over the angle from the spot axis
    Table = 1,
}

schema! {
    /// Dynamic spherical light, optionally shaped into a spot.
    #[derive(Debug, Default, PartialEq)]
    pub struct DynLight {
        /// xyz: center, w: radius
        pub center_radius: Vec4,

        /// rgb: emitted power, w: type (as bits)
        pub color_type: Vec4,

        /// xyz: spot direction, w: emission profile (as bits)
        pub spot_direction: Vec4,

        /// x: cosine of the cone's total width,
        /// y: cosine of the angle where falloff starts,
        /// z: index of the tabulated profile (as bits)
        pub spot_data: Vec4,
    }
}

impl DynLight {
    pub fn sphere(center: Vec3, radius: f32, color: Vec3) -> Self {
        Self {
            center_radius: center.extend(radius),
            color_type: color.extend(f32::from_bits(DynLightType::Sphere as u32)),
            ..Default::default()
        }
    }

    pub fn spot(
        center: Vec3,
        radius: f32,
        color: Vec3,
        direction: Vec3,
        profile: SpotProfile,
        spot_data: Vec4,
    ) -> Self {
        Self {
            center_radius: center.extend(radius),
            color_type: color.extend(f32::from_bits(DynLightType::Spot as u32)),
            spot_direction: direction
                .safe_normalize()
                .extend(f32::from_bits(profile as u32)),
            spot_data,
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center_radius.xyz()
    }

    pub fn radius(&self) -> f32 {
        self.center_radius.w
    }

    pub fn color(&self) -> Vec3 {
        self.color_type.xyz()
    }

    pub fn ty(&self) -> DynLightType {
        if self.color_type.w.to_bits() == DynLightType::Spot as u32 {
            DynLightType::Spot
        } else {
            DynLightType::Sphere
        }
    }

    pub fn profile(&self) -> SpotProfile {
        if self.spot_direction.w.to_bits() == SpotProfile::Table as u32 {
            SpotProfile::Table
        } else {
            SpotProfile::Falloff
        }
    }

    /// Emission factor towards `dir` (pointing away from the light).
    pub fn spot_factor(&self, dir: Vec3, profiles: &[f32]) -> f32 {
        if self.ty() == DynLightType::Sphere {
            return 1.0;
        }

        let cos_theta = self.spot_direction.xyz().dot(dir);
        let cos_total_width = self.spot_data.x;

        match self.profile() {
            SpotProfile::Falloff => {
                let cos_falloff_start = self.spot_data.y;
                let range = (cos_falloff_start - cos_total_width).max(VKPT_EPSILON);
                let t = ((cos_theta - cos_total_width) / range).saturate();

                t * t * (3.0 - 2.0 * t)
            }

            SpotProfile::Table => {
                if cos_theta < cos_total_width {
                    return 0.0;
                }

                let base = self.spot_data.z.to_bits() as usize * SPOT_PROFILE_SAMPLES;

                let Some(table) = profiles.get(base..base + SPOT_PROFILE_SAMPLES) else {
                    return 0.0;
                };

                let t = ((1.0 - cos_theta) / (1.0 - cos_total_width).max(VKPT_EPSILON))
                    .saturate()
                    * (SPOT_PROFILE_SAMPLES - 1) as f32;

                let idx = (t as usize).min(SPOT_PROFILE_SAMPLES - 2);
                let frac = t - idx as f32;

                table[idx] * (1.0 - frac) + table[idx + 1] * frac
            }
        }
    }
}

/// Light lists and light records reachable from the shaders.
#[derive(Clone, Copy, Default)]
pub struct LightsView<'a> {
    pub polygons: &'a [LightPolygon],
    pub dyn_lights: &'a [DynLight],

    /// Offset of each cluster's list within `list_lights`, plus a trailing
    /// end offset
    pub list_offsets: &'a [u32],

    /// Indices into `polygons`
    pub list_lights: &'a [u32],

    /// Per-cluster light counts of the last [`LIGHT_COUNT_HISTORY`] frames
    pub counts_history: [&'a [u32]; LIGHT_COUNT_HISTORY as usize],

    /// Tabulated spot profiles, [`SPOT_PROFILE_SAMPLES`] each
    pub spot_profiles: &'a [f32],
}

impl<'a> LightsView<'a> {
    pub fn get_light_polygon(&self, index: u32) -> Option<&'a LightPolygon> {
        self.polygons.get(index as usize)
    }

    /// Returns `(offset, count)` of the cluster's light list, as seen by
    /// given light-count snapshot.
    ///
    /// The snapshot's count may differ from the list's current length, e.g.
    /// for gradient samples that replay the previous frame; it never exceeds
    /// it.
    pub fn cluster_list(&self, cluster: i32, counts_slot: u32) -> Option<(u32, u32)> {
        if cluster < 0 {
            return None;
        }

        let cluster = cluster as usize;
        let start = *self.list_offsets.get(cluster)?;
        let end = *self.list_offsets.get(cluster + 1)?;
        let len = end.saturating_sub(start);

        let count = self
            .counts_history
            .get(counts_slot as usize)
            .and_then(|counts| counts.get(cluster))
            .copied()
            .unwrap_or(len)
            .min(len);

        (count > 0).then_some((start, count))
    }
}

/// Which light a sample came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightSource {
    /// `list_entry` is the light's position within the flat light list
    Polygon { index: u32, list_entry: u32 },

    Sphere { index: u32 },
}

/// Unshadowed contribution of a single light sample, already divided by
/// all the probabilities that led to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSample {
    pub source: LightSource,
    pub direction: Vec3,

    /// Distance to the sampled point, for the shadow ray
    pub distance: f32,

    /// Diffuse irradiance over PI, i.e. not multiplied by the albedo
    pub diffuse: Vec3,

    pub specular: Vec3,

    /// Solid-angle density of the sample, including selection
    pub pdf: f32,
}

impl LightSample {
    /// Weight the binary choice between light kinds is based on.
    pub fn luminance(&self) -> f32 {
        (self.diffuse + self.specular).luma()
    }

    fn scaled(mut self, factor: f32) -> Self {
        self.diffuse *= factor;
        self.specular *= factor;
        self.pdf /= factor;
        self
    }
}

/// Outcome of choosing between the polygonal and the spherical candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightChoice {
    pub sample: Option<LightSample>,

    /// Probability the polygonal candidate was chosen with; 0.5 when
    /// neither candidate carries any light
    pub polygonal_weight: f32,
}

/// Shading point lights are sampled for.
#[derive(Clone, Copy)]
pub struct ShadingPoint<'a> {
    pub surface: &'a Surface,

    /// Direction towards the viewer
    pub view: Vec3,

    /// Gradient samples replay the previous frame's light population
    pub is_gradient: bool,
}

impl<'a> ShadingPoint<'a> {
    fn counts_slot(&self, ubo: &GlobalUbo) -> u32 {
        if self.is_gradient {
            ubo.prev_light_counts_slot()
        } else {
            ubo.light_counts_slot()
        }
    }

    /// Demodulated diffuse and specular response to light coming from `l`.
    pub fn brdf(&self, l: Vec3) -> (Vec3, Vec3) {
        let n_o_l = self.surface.normal.dot(l);

        if n_o_l <= 0.0 || self.surface.geo_normal.dot(l) <= 0.0 {
            return (Vec3::ZERO, Vec3::ZERO);
        }

        // Diffuse lighting gets demodulated: the denoiser multiplies it by
        // albedo once it's filtered
        let diffuse = Vec3::splat(n_o_l / PI);
        let specular = SpecularBrdf::new(self.surface).eval(l, self.view);

        (diffuse, specular)
    }

    /// Multiplier of a light's selection mass, steering samples towards the
    /// reflected highlight.
    fn phong_factor(&self, l: Vec3) -> f32 {
        let brdf = SpecularBrdf::new(self.surface);
        let weight = brdf.phong_weight(self.view);

        crate::lerp(1.0, brdf.phong_lobe(l, self.view), weight)
    }
}

/// Next-event estimation against polygonal and spherical lights.
#[derive(Clone, Copy)]
pub struct LightSampler<'a> {
    pub ubo: &'a GlobalUbo,
    pub lights: LightsView<'a>,
    pub stats: Option<&'a LightStatsView<'a>>,
    pub textures: &'a dyn Textures,
}

impl<'a> LightSampler<'a> {
    fn polygon_radiance(&self, light: &LightPolygon, bary: Vec3, l: Vec3, prev_style: bool) -> Vec3 {
        let radiance = match light.ty() {
            PolygonLightType::Regular => {
                light.color(0) * bary.x + light.color(1) * bary.y + light.color(2) * bary.z
            }

            PolygonLightType::Sky => {
                if self.ubo.cvars.pt_sky_lights <= 0.0 {
                    return Vec3::ZERO;
                }

                environment_radiance(self.ubo, self.textures, l, false)
            }
        };

        radiance * light.style_scale(prev_style) * self.ubo.cvars.pt_light_intensity
    }

    /// Importance of a polygonal light for given point; zero only when the
    /// light cannot reach the point.
    fn polygon_mass(&self, point: &ShadingPoint, light: &LightPolygon, list_entry: u32) -> f32 {
        let area = light.area();

        if area <= VKPT_EPSILON * VKPT_EPSILON || !area.is_finite() {
            return 0.0;
        }

        let p = point.surface.position;
        let n = point.surface.geo_normal;

        // One-sided
        let to_point = p - light.centroid();
        let dist_sq = to_point.length_squared().max(VKPT_EPSILON);

        if light.normal().dot(to_point) <= 0.0 {
            return 0.0;
        }

        // Is any part of the light above the horizon?
        let horizon = (0..3)
            .map(|idx| n.dot((light.position(idx) - p).safe_normalize()))
            .fold(0.0f32, f32::max);

        if horizon <= 0.0 {
            return 0.0;
        }

        let l = (-to_point).safe_normalize();

        let solid_angle =
            (area * light.normal().dot(to_point.safe_normalize()) / dist_sq).clamp(VKPT_EPSILON, 2.0 * PI);

        let luminance = match light.ty() {
            PolygonLightType::Regular => light.average_color().luma(),
            PolygonLightType::Sky => 1.0,
        } * light.style_scale(point.is_gradient);

        let mut mass = luminance * solid_angle * horizon.max(0.1) * point.phong_factor(l);

        if let Some(stats) = self.stats {
            if self.ubo.cvars.pt_light_stats > 0.0 {
                mass *= stats.factor(list_entry, Normal::octant(n));
            }
        }

        mass.max(0.0).sanitize()
    }

    /// Picks one polygonal light of the point's cluster, proportionally to
    /// its mass, and samples a point on it.
    pub fn sample_polygonal(&self, point: &ShadingPoint, noise: &mut Noise) -> Option<LightSample> {
        let (list_start, count) = self
            .lights
            .cluster_list(point.surface.cluster, point.counts_slot(self.ubo))?;

        let partitions = crate::div_ceil(count, MAX_BRUTEFORCE_SAMPLING);
        let partition = noise.sample_index(partitions);
        let start = partition * MAX_BRUTEFORCE_SAMPLING;
        let end = (start + MAX_BRUTEFORCE_SAMPLING).min(count);

        let mut masses = [0.0; MAX_BRUTEFORCE_SAMPLING as usize];
        let mut total = 0.0;

        for (slot, entry) in (start..end).enumerate() {
            let list_entry = list_start + entry;

            let mass = self
                .lights
                .list_lights
                .get(list_entry as usize)
                .and_then(|index| self.lights.get_light_polygon(*index))
                .map(|light| self.polygon_mass(point, light, list_entry))
                .unwrap_or(0.0);

            masses[slot] = mass;
            total += mass;
        }

        if total <= 0.0 {
            return None;
        }

        let target = noise.sample() * total;
        let mut slot = 0;
        let mut acc = masses[0];

        while acc <= target && slot + 1 < (end - start) as usize {
            slot += 1;
            acc += masses[slot];
        }

        // Rounding can land the target past the last non-empty slot
        while masses[slot] <= 0.0 && slot > 0 {
            slot -= 1;
        }

        let selection_pdf = masses[slot] / total / partitions as f32;
        let list_entry = list_start + start + slot as u32;
        let index = *self.lights.list_lights.get(list_entry as usize)?;
        let light = self.lights.get_light_polygon(index)?;

        let bary = noise.sample_triangle();
        let target = light.position(0) * bary.x + light.position(1) * bary.y + light.position(2) * bary.z;
        let to_light = target - point.surface.position;
        let distance = to_light.length();
        let l = to_light.safe_normalize();
        let cos_light = -light.normal().dot(l);

        if l == Vec3::ZERO || cos_light <= 0.0 {
            return None;
        }

        let pdf_w = distance * distance / (light.area() * cos_light);
        let pdf = selection_pdf * pdf_w;

        if !pdf.is_finite() || pdf <= 0.0 {
            return None;
        }

        let radiance = self.polygon_radiance(light, bary, l, point.is_gradient);
        let (diffuse, specular) = point.brdf(l);

        Some(LightSample {
            source: LightSource::Polygon { index, list_entry },
            direction: l,
            distance,
            diffuse: radiance * diffuse / pdf,
            specular: radiance * specular / pdf,
            pdf,
        })
    }

    fn sphere_mass(&self, point: &ShadingPoint, light: &DynLight) -> f32 {
        let to_light = light.center() - point.surface.position;
        let dist_sq = to_light.length_squared();
        let radius = light.radius().max(self.ubo.cvars.pt_dyn_light_radius_min);

        if dist_sq <= radius * radius {
            return 0.0;
        }

        let l = to_light.safe_normalize();
        let spot = light.spot_factor(-l, self.lights.spot_profiles);

        if spot <= 0.0 {
            return 0.0;
        }

        // Sphere dipping below the horizon still lights the point
        let sin_max = radius / dist_sq.sqrt();

        if point.surface.geo_normal.dot(l) < -sin_max {
            return 0.0;
        }

        let solid_angle = PI * radius * radius / dist_sq;

        (light.color().luma() / (PI * radius * radius) * spot * solid_angle * point.phong_factor(l))
            .max(0.0)
            .sanitize()
    }

    /// Picks one dynamic light proportionally to its mass and samples the
    /// cone it subtends.
    pub fn sample_spherical(&self, point: &ShadingPoint, noise: &mut Noise) -> Option<LightSample> {
        let count = (self.ubo.num_dyn_lights as usize).min(self.lights.dyn_lights.len());

        if count == 0 {
            return None;
        }

        let lights = &self.lights.dyn_lights[..count];

        let total: f32 = lights
            .iter()
            .map(|light| self.sphere_mass(point, light))
            .sum();

        if total <= 0.0 {
            return None;
        }

        let target = noise.sample() * total;
        let mut index = 0;
        let mut mass = 0.0;
        let mut acc = 0.0;

        for (idx, light) in lights.iter().enumerate() {
            let m = self.sphere_mass(point, light);

            if m <= 0.0 {
                continue;
            }

            index = idx;
            mass = m;
            acc += m;

            if acc > target {
                break;
            }
        }

        let light = &self.lights.dyn_lights[index];
        let selection_pdf = mass / total;
        let radius = light.radius().max(self.ubo.cvars.pt_dyn_light_radius_min);
        let to_center = light.center() - point.surface.position;
        let dist = to_center.length();
        let axis = to_center / dist;
        let cos_max = (1.0 - (radius / dist).sqr()).max(0.0).sqrt().min(1.0 - 1e-6);
        let l = noise.sample_cone(axis, cos_max);
        let pdf = selection_pdf / (2.0 * PI * (1.0 - cos_max));

        if !pdf.is_finite() || pdf <= 0.0 {
            return None;
        }

        // Distance to the sphere's surface along `l`
        let b = l.dot(to_center);
        let distance = (b - (b * b - dist * dist + radius * radius).max(0.0).sqrt()).max(0.0);

        let radiance = light.color() / (PI * radius * radius)
            * light.spot_factor(-l, self.lights.spot_profiles)
            * self.ubo.cvars.pt_light_intensity;

        let (diffuse, specular) = point.brdf(l);

        Some(LightSample {
            source: LightSource::Sphere {
                index: index as u32,
            },
            direction: l,
            distance,
            diffuse: radiance * diffuse / pdf,
            specular: radiance * specular / pdf,
            pdf,
        })
    }

    /// Reduces the polygonal and the spherical candidate into one sample.
    ///
    /// The candidate gets picked with probability proportional to its
    /// luminance and is then divided by that probability, which keeps the
    /// estimator unbiased. When neither candidate carries light the result
    /// is empty, with the split still recorded as 0.5.
    pub fn choose(
        polygonal: Option<LightSample>,
        spherical: Option<LightSample>,
        noise: &mut Noise,
    ) -> LightChoice {
        let l_poly = polygonal.map(|s| s.luminance()).unwrap_or(0.0).sanitize();
        let l_sph = spherical.map(|s| s.luminance()).unwrap_or(0.0).sanitize();
        let sum = l_poly + l_sph;

        if sum <= 0.0 {
            // Still consume the random number, so that streams stay aligned
            noise.sample();

            return LightChoice {
                sample: None,
                polygonal_weight: 0.5,
            };
        }

        let w = l_poly / sum;

        let sample = if noise.sample() < w {
            polygonal.map(|s| s.scaled(1.0 / w))
        } else {
            spherical.map(|s| s.scaled(1.0 / (1.0 - w)))
        };

        LightChoice {
            sample,
            polygonal_weight: w,
        }
    }

    /// Samples one light for given point.
    pub fn sample(
        &self,
        point: &ShadingPoint,
        polygonal: bool,
        spherical: bool,
        noise: &mut Noise,
    ) -> LightChoice {
        let poly = if polygonal {
            self.sample_polygonal(point, noise)
        } else {
            None
        };

        let sph = if spherical {
            self.sample_spherical(point, noise)
        } else {
            None
        };

        Self::choose(poly, sph, noise)
    }

    /// Approximate density with which [`Self::sample()`] would generate a
    /// direction hitting given emissive polygon; used as the light side of
    /// MIS for rays that found the light through BRDF sampling.
    pub fn polygon_pdf_approx(
        &self,
        point: &ShadingPoint,
        hit_distance: f32,
        light_area: f32,
        cos_light: f32,
    ) -> f32 {
        let Some((_, count)) = self
            .lights
            .cluster_list(point.surface.cluster, point.counts_slot(self.ubo))
        else {
            return 0.0;
        };

        let pdf_w = hit_distance.sqr() / (light_area * cos_light.abs()).max(VKPT_EPSILON);

        (pdf_w / count.min(MAX_BRUTEFORCE_SAMPLING) as f32).sanitize()
    }
}

/// Light sample combined with BRDF sampling: returns the weight of the
/// light-sampled specular contribution.
pub fn light_mis_weight(surface: &Surface, sample: &LightSample, view: Vec3, roughness_threshold: f32) -> f32 {
    if surface.roughness >= roughness_threshold {
        return 1.0;
    }

    let pdf_brdf = SpecularBrdf::new(surface).pdf(sample.direction, view);

    mis_balance(sample.pdf, pdf_brdf)
}

/// Light-list position of a pixel's sample, for the statistics feedback.
pub fn light_stats_key(sample: &LightSample, surface: &Surface) -> Option<(u32, u32)> {
    match sample.source {
        LightSource::Polygon { list_entry, .. } => {
            Some((list_entry, Normal::octant(surface.geo_normal)))
        }
        LightSource::Sphere { .. } => None,
    }
}
