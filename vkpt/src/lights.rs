use log::{debug, warn};

use crate::gpu;

/// Maximum number of dynamic lights per frame.
pub const MAX_DLIGHTS: usize = 32;

/// Maximum number of tabulated spot profiles.
pub const MAX_SPOT_PROFILES: usize = 64;

#[derive(Clone, Debug, PartialEq)]
struct PolygonEntry {
    light: gpu::LightPolygon,
    clusters: Vec<i32>,
}

/// Builds light buffers of a frame: polygonal lights with per-cluster
/// visibility lists, dynamic lights, and the ring of per-cluster light
/// counts retained for [`gpu::LIGHT_COUNT_HISTORY`] frames.
#[derive(Clone, Debug, Default)]
pub struct Lights {
    polygons: Vec<PolygonEntry>,
    dyn_lights: Vec<gpu::DynLight>,
    spot_profiles: Vec<f32>,
    num_clusters: u32,

    light_polygons: Vec<gpu::LightPolygon>,
    list_offsets: Vec<u32>,
    list_lights: Vec<u32>,
    counts_history: [Vec<u32>; gpu::LIGHT_COUNT_HISTORY as usize],
}

impl Lights {
    pub fn new() -> Self {
        Default::default()
    }

    /// Drops lights of the previous frame; the light-count history is kept.
    pub fn begin_frame(&mut self) {
        self.polygons.clear();
        self.dyn_lights.clear();
        self.spot_profiles.clear();
    }

    /// Adds a polygonal light, visible from given clusters.
    ///
    /// Lights with zero area are accepted and skipped while sampling.
    pub fn push_polygon(
        &mut self,
        light: gpu::LightPolygon,
        clusters: impl IntoIterator<Item = i32>,
    ) -> u32 {
        self.polygons.push(PolygonEntry {
            light,
            clusters: clusters.into_iter().filter(|c| *c >= 0).collect(),
        });

        self.polygons.len() as u32 - 1
    }

    /// Adds a dynamic light; lights past [`MAX_DLIGHTS`] are dropped.
    pub fn push_dyn_light(&mut self, light: gpu::DynLight) -> Option<u32> {
        if self.dyn_lights.len() >= MAX_DLIGHTS {
            warn!("Too many dynamic lights, dropping one; max={MAX_DLIGHTS}");
            return None;
        }

        self.dyn_lights.push(light);

        Some(self.dyn_lights.len() as u32 - 1)
    }

    /// Adds a tabulated spot profile, to be referenced from
    /// [`gpu::DynLight::spot()`]'s `spot_data.z`.
    pub fn push_spot_profile(
        &mut self,
        profile: [f32; gpu::SPOT_PROFILE_SAMPLES],
    ) -> Option<u32> {
        let idx = self.spot_profiles.len() / gpu::SPOT_PROFILE_SAMPLES;

        if idx >= MAX_SPOT_PROFILES {
            warn!("Too many spot profiles, dropping one; max={MAX_SPOT_PROFILES}");
            return None;
        }

        self.spot_profiles.extend(profile);

        Some(idx as u32)
    }

    /// Builds light lists of the frame and stores their counts at the
    /// frame's slot of the history ring.
    pub fn build(&mut self, num_clusters: u32, frame: u32) {
        let mut lists = vec![Vec::new(); num_clusters as usize];

        for (light_id, entry) in self.polygons.iter().enumerate() {
            for &cluster in &entry.clusters {
                if let Some(list) = lists.get_mut(cluster as usize) {
                    list.push(light_id as u32);
                }
            }
        }

        self.num_clusters = num_clusters;
        self.light_polygons = self.polygons.iter().map(|entry| entry.light).collect();
        self.list_offsets.clear();
        self.list_lights.clear();

        for list in &lists {
            self.list_offsets.push(self.list_lights.len() as u32);
            self.list_lights.extend(list);
        }

        self.list_offsets.push(self.list_lights.len() as u32);

        let slot = (frame % gpu::LIGHT_COUNT_HISTORY) as usize;

        self.counts_history[slot] = lists.iter().map(|list| list.len() as u32).collect();

        debug!(
            "Light lists built; polygons={}, dyn_lights={}, clusters={}, entries={}",
            self.light_polygons.len(),
            self.dyn_lights.len(),
            num_clusters,
            self.list_lights.len(),
        );
    }

    /// Writes light counts of the frame into the UBO.
    pub fn update_ubo(&self, ubo: &mut gpu::GlobalUbo) {
        ubo.num_light_polygons = self.light_polygons.len() as u32;
        ubo.num_dyn_lights = self.dyn_lights.len() as u32;
        ubo.num_clusters = self.num_clusters;
    }

    /// Number of entries of the flat light list, which is what the light
    /// statistics are keyed by.
    pub fn list_entries(&self) -> u32 {
        self.list_lights.len() as u32
    }

    pub fn polygons(&self) -> &[gpu::LightPolygon] {
        &self.light_polygons
    }

    pub fn dyn_lights(&self) -> &[gpu::DynLight] {
        &self.dyn_lights
    }

    pub fn list_offsets(&self) -> &[u32] {
        &self.list_offsets
    }

    pub fn list_lights(&self) -> &[u32] {
        &self.list_lights
    }

    pub fn spot_profiles(&self) -> &[f32] {
        &self.spot_profiles
    }

    pub fn counts(&self, slot: u32) -> &[u32] {
        &self.counts_history[slot as usize % self.counts_history.len()]
    }

    pub fn view(&self) -> gpu::LightsView<'_> {
        gpu::LightsView {
            polygons: &self.light_polygons,
            dyn_lights: &self.dyn_lights,
            list_offsets: &self.list_offsets,
            list_lights: &self.list_lights,
            counts_history: [
                &self.counts_history[0],
                &self.counts_history[1],
                &self.counts_history[2],
            ],
            spot_profiles: &self.spot_profiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Vec3};

    use super::*;

    fn polygon(x: f32) -> gpu::LightPolygon {
        gpu::LightPolygon::new(
            [vec3(x, 0.0, 0.0), vec3(x + 1.0, 0.0, 0.0), vec3(x, 1.0, 0.0)],
            [Vec3::ONE; 3],
            1.0,
            gpu::PolygonLightType::Regular,
        )
    }

    #[test]
    fn lists() {
        let mut target = Lights::new();

        target.push_polygon(polygon(0.0), [0, 2]);
        target.push_polygon(polygon(1.0), [2]);
        target.push_polygon(polygon(2.0), [-1, 7]);
        target.build(3, 0);

        assert_eq!(&[0, 1, 1, 3], target.list_offsets());
        assert_eq!(&[0, 0, 1], target.list_lights());
        assert_eq!(&[1, 0, 2], target.counts(0));
        assert_eq!(3, target.list_entries());

        let view = target.view();

        assert_eq!(Some((0, 1)), view.cluster_list(0, 0));
        assert_eq!(None, view.cluster_list(1, 0));
        assert_eq!(Some((1, 2)), view.cluster_list(2, 0));
        assert_eq!(None, view.cluster_list(-1, 0));

        let mut ubo = gpu::GlobalUbo::default();

        target.update_ubo(&mut ubo);

        assert_eq!(3, ubo.num_light_polygons);
        assert_eq!(3, ubo.num_clusters);
    }

    #[test]
    fn counts_history_ring() {
        let mut target = Lights::new();

        target.push_polygon(polygon(0.0), [0]);
        target.build(1, 0);

        target.begin_frame();
        target.push_polygon(polygon(0.0), [0]);
        target.push_polygon(polygon(1.0), [0]);
        target.build(1, 1);

        assert_eq!(&[1], target.counts(0));
        assert_eq!(&[2], target.counts(1));

        // Previous frame's snapshot limits the list to its first entry
        assert_eq!(Some((0, 1)), target.view().cluster_list(0, 0));
        assert_eq!(Some((0, 2)), target.view().cluster_list(0, 1));

        target.begin_frame();
        target.build(1, 3);

        assert_eq!(&[0], target.counts(0));
        assert_eq!(&[2], target.counts(1));
    }

    #[test]
    fn dyn_lights_are_capped() {
        let mut target = Lights::new();

        for _ in 0..MAX_DLIGHTS {
            assert!(target
                .push_dyn_light(gpu::DynLight::sphere(Vec3::ZERO, 1.0, Vec3::ONE))
                .is_some());
        }

        assert_eq!(
            None,
            target.push_dyn_light(gpu::DynLight::sphere(Vec3::ZERO, 1.0, Vec3::ONE))
        );

        assert_eq!(Some(0), target.push_spot_profile([1.0; gpu::SPOT_PROFILE_SAMPLES]));
        assert_eq!(Some(1), target.push_spot_profile([0.5; gpu::SPOT_PROFILE_SAMPLES]));
        assert_eq!(2 * gpu::SPOT_PROFILE_SAMPLES, target.spot_profiles().len());
    }
}
