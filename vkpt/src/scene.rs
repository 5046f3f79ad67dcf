use std::hash::Hash;

use crate::gpu;
use crate::{Entity, Geometry, Instances, Lights, Materials, Models};

/// Host-side tables of the world: geometry, models, materials, lights and
/// the instances classified out of the entities visible this frame.
///
/// Both renderers keep one of these; the GPU one uploads the tables, the
/// reference one reads them directly.
#[derive(Debug)]
pub struct Scene<H = u32>
where
    H: Hash + Eq,
{
    pub(crate) geometry: Geometry,
    pub(crate) models: Models,
    pub(crate) materials: Materials<H>,
    pub(crate) lights: Lights,
    pub(crate) instances: Instances,
    num_clusters: u32,
}

impl<H> Scene<H>
where
    H: Hash + Eq,
{
    pub fn new() -> Self {
        Self {
            geometry: Geometry::new(),
            models: Models::default(),
            materials: Materials::new(),
            lights: Lights::new(),
            instances: Instances::new(),
            num_clusters: 0,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut Geometry {
        &mut self.geometry
    }

    pub fn models_mut(&mut self) -> &mut Models {
        &mut self.models
    }

    pub fn materials(&self) -> &Materials<H> {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut Materials<H> {
        &mut self.materials
    }

    pub fn lights(&self) -> &Lights {
        &self.lights
    }

    /// Lights persist between frames until [`Lights::begin_frame()`] is
    /// called.
    pub fn lights_mut(&mut self) -> &mut Lights {
        &mut self.lights
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    pub fn num_clusters(&self) -> u32 {
        self.num_clusters
    }

    pub fn set_num_clusters(&mut self, num_clusters: u32) {
        self.num_clusters = num_clusters;
    }

    /// Classifies entities into instances and builds this frame's light
    /// lists, filling the related fields of the UBO.
    pub fn prepare(&mut self, frame: u32, entities: &[Entity], ubo: &mut gpu::GlobalUbo) {
        self.instances.update(entities, &self.models);
        self.instances.update_ubo(ubo);
        self.lights.build(self.num_clusters, frame);
        self.lights.update_ubo(ubo);
    }

    pub fn geometry_view(&self) -> gpu::GeometryView<'_> {
        self.geometry.view(self.instances.instanced())
    }
}

impl<H> Default for Scene<H>
where
    H: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}
