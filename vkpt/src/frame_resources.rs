use std::hash::Hash;
use std::{array, mem};

use fxhash::FxHashSet;
use glam::{UVec2, Vec4};
use log::debug;

use crate::gpu::{self, AbImageId, GeometryTable, ImageId, Resource};
use crate::{
    BindGroup, BufferFlushOutcome, DoubleBuffered, DoubleBufferedBindable,
    MappedStorageBuffer, MappedUniformBuffer, Scene, Texture, UnmappedStorageBuffer,
};

pub const BLUE_NOISE_SIZE: UVec2 = UVec2::new(64, 64);
pub const ENVMAP_SIZE: UVec2 = UVec2::new(512, 256);

/// Everything the passes bind: scene buffers (sets 0 and 1), frame images
/// and environment images (set 2).
///
/// Passes get built out of a `&FrameResources`; whenever something in here
/// gets reallocated, the passes have to be rebuilt.
#[derive(Debug)]
pub struct FrameResources {
    pub scene: SceneBuffers,
    pub environment: EnvironmentImages,
    pub images: ImageBuffers,
}

impl FrameResources {
    pub fn new(device: &wgpu::Device, sizes: gpu::FrameSizes) -> Self {
        debug!("Initializing frame resources; sizes={sizes:?}");

        Self {
            scene: SceneBuffers::new(device),
            environment: EnvironmentImages::new(device),
            images: ImageBuffers::new(device, sizes),
        }
    }

    /// Reallocates the frame images (and the eye-adaptation state) if the
    /// viewport has changed; returns whether that happened.
    pub fn resize(&mut self, device: &wgpu::Device, sizes: gpu::FrameSizes) -> bool {
        if self.images.sizes == sizes {
            return false;
        }

        debug!("Rebuilding frame images; sizes={sizes:?}");

        self.images = ImageBuffers::new(device, sizes);
        self.scene.tone_mapping = SceneBuffers::tone_mapping_state(device);

        true
    }

    pub fn sizes(&self) -> gpu::FrameSizes {
        self.images.sizes
    }

    /// Bind group of [`gpu::DESC_SET_GLOBAL`].
    pub fn global_bind_group(&self, device: &wgpu::Device) -> BindGroup {
        let scene = &self.scene;
        let [counts_0, counts_1, counts_2] = &scene.light_counts;
        let [stats_0, stats_1, stats_2] = &scene.light_stats;

        BindGroup::builder("global")
            .add_at(gpu::GLOBAL_UBO_BINDING_IDX, &scene.ubo)
            .add_at(gpu::GLOBAL_INSTANCE_BUFFER_BINDING_IDX, &scene.instances)
            .add_at(gpu::MATERIAL_BUFFER_BINDING_IDX, &scene.materials)
            .add_at(gpu::LIGHT_POLYGON_BUFFER_BINDING_IDX, &scene.light_polygons)
            .add_at(gpu::DYN_LIGHT_BUFFER_BINDING_IDX, &scene.dyn_lights)
            .add_at(gpu::LIGHT_LISTS_BINDING_IDX, &scene.light_lists)
            .add_at(gpu::LIGHT_LIST_LIGHTS_BINDING_IDX, &scene.light_list_lights)
            .add_at(gpu::SPOT_PROFILES_BINDING_IDX, &scene.spot_profiles)
            .add_at(gpu::LIGHT_COUNTS_HISTORY_BINDING_IDX, counts_0)
            .add_at(gpu::LIGHT_COUNTS_HISTORY_BINDING_IDX + 1, counts_1)
            .add_at(gpu::LIGHT_COUNTS_HISTORY_BINDING_IDX + 2, counts_2)
            .add_at(gpu::LIGHT_STATS_BINDING_IDX, &stats_0.bind_writable())
            .add_at(gpu::LIGHT_STATS_BINDING_IDX + 1, &stats_1.bind_writable())
            .add_at(gpu::LIGHT_STATS_BINDING_IDX + 2, &stats_2.bind_writable())
            .add_at(
                gpu::TONE_MAPPING_HISTOGRAM_BINDING_IDX,
                &scene.histogram.bind_writable(),
            )
            .add_at(
                gpu::TONE_MAPPING_STATE_BINDING_IDX,
                &scene.tone_mapping.curr().bind_writable(),
            )
            .add_at(
                gpu::TONE_MAPPING_STATE_BINDING_IDX + 1,
                &scene.tone_mapping.past().bind_readable(),
            )
            .build(device)
    }

    /// Bind group of [`gpu::DESC_SET_GEOMETRY`].
    pub fn geometry_bind_group(&self, device: &wgpu::Device) -> BindGroup {
        let scene = &self.scene;
        let mut bind_group = BindGroup::builder("geometry");

        for (idx, table) in scene.geometry.iter().enumerate() {
            let idx = idx as u32;

            bind_group = bind_group
                .add_at(gpu::geometry_table_binding(idx, 0), &table.indices)
                .add_at(gpu::geometry_table_binding(idx, 1), &table.vertices)
                .add_at(gpu::geometry_table_binding(idx, 2), &table.primitives);
        }

        for (idx, positions) in scene.prev_positions.iter().enumerate() {
            bind_group = bind_group
                .add_at(gpu::BINDING_OFFSET_PREV_POSITIONS + idx as u32, positions);
        }

        bind_group
            .add_at(gpu::INSTANCED_PRIMITIVES_BINDING_IDX, &scene.instanced)
            .build(device)
    }

    /// Returns images a pass touches, together with their bindings within
    /// [`gpu::DESC_SET_IMAGES`]: written images as storage images, read ones
    /// as textures. Environment images are bound to every pass.
    ///
    /// Buffers from the pass' description live in the global set, so they
    /// are skipped here.
    pub fn image_bindings(
        &self,
        desc: &gpu::PassDesc,
    ) -> Vec<(u32, Box<dyn DoubleBufferedBindable + '_>)> {
        let mut seen = FxHashSet::default();
        let mut bindings: Vec<(u32, Box<dyn DoubleBufferedBindable + '_>)> = Vec::new();

        let resources = desc
            .writes
            .iter()
            .map(|resource| (resource, true))
            .chain(desc.reads.iter().map(|resource| (resource, false)));

        for (resource, writable) in resources {
            if !seen.insert(*resource) {
                continue;
            }

            match *resource {
                Resource::Image(id) => {
                    let texture = self.images.image(id);
                    let binding = gpu::image_binding(id, writable);

                    if writable {
                        bindings.push((binding, Box::new(texture.writable())));
                    } else {
                        bindings.push((binding, Box::new(texture.readable())));
                    }
                }

                Resource::AbImage(id, role) => {
                    let textures = self.images.ab(id).role(role);
                    let binding = gpu::ab_image_binding(id, role, writable);

                    if writable {
                        bindings.push((binding, Box::new(textures.bind_writable())));
                    } else {
                        bindings.push((binding, Box::new(textures.bind_readable())));
                    }
                }

                Resource::LightStatsRead
                | Resource::LightStatsWrite
                | Resource::ToneMappingHistogram
                | Resource::ToneMappingState(_) => {}
            }
        }

        let env = &self.environment;

        bindings.push((gpu::BINDING_OFFSET_BLUE_NOISE, Box::new(env.blue_noise.readable())));
        bindings.push((gpu::BINDING_OFFSET_ENVMAP, Box::new(env.envmap.readable())));
        bindings.push((gpu::BINDING_OFFSET_PHYSICAL_SKY, Box::new(env.physical_sky.readable())));

        bindings
    }
}

/// Buffers of a single geometry table.
#[derive(Debug)]
pub struct GeometryTableBuffers {
    pub indices: MappedStorageBuffer<u32>,
    pub vertices: MappedStorageBuffer<gpu::Vertex>,
    pub primitives: MappedStorageBuffer<gpu::PrimitiveRecord>,
}

#[derive(Debug)]
pub struct SceneBuffers {
    pub ubo: MappedUniformBuffer<gpu::GlobalUbo>,
    pub instances: MappedStorageBuffer<gpu::InstanceRecord>,
    pub materials: MappedStorageBuffer<u32>,
    pub light_polygons: MappedStorageBuffer<gpu::LightPolygon>,
    pub dyn_lights: MappedStorageBuffer<gpu::DynLight>,
    pub light_lists: MappedStorageBuffer<u32>,
    pub light_list_lights: MappedStorageBuffer<u32>,
    pub spot_profiles: MappedStorageBuffer<f32>,
    pub light_counts: [MappedStorageBuffer<u32>; gpu::LIGHT_COUNT_HISTORY as usize],
    pub light_stats: [UnmappedStorageBuffer; gpu::NUM_LIGHT_STATS_BUFFERS as usize],
    pub histogram: UnmappedStorageBuffer,
    pub tone_mapping: DoubleBuffered<UnmappedStorageBuffer>,
    pub geometry: [GeometryTableBuffers; gpu::GEOMETRY_TABLE_COUNT],
    pub prev_positions: [MappedStorageBuffer<Vec4>; 2],
    pub instanced: MappedStorageBuffer<gpu::InstancedPrimitive>,
}

impl SceneBuffers {
    pub fn new(device: &wgpu::Device) -> Self {
        let geometry = array::from_fn(|idx| {
            let table = format!("{:?}", GeometryTable::ALL[idx]).to_lowercase();

            GeometryTableBuffers {
                indices: MappedStorageBuffer::new_default(
                    device,
                    format!("vkpt_{table}_indices"),
                ),
                vertices: MappedStorageBuffer::new_default(
                    device,
                    format!("vkpt_{table}_vertices"),
                ),
                primitives: MappedStorageBuffer::new_default(
                    device,
                    format!("vkpt_{table}_primitives"),
                ),
            }
        });

        Self {
            ubo: MappedUniformBuffer::new_default(device, "vkpt_global_ubo"),
            instances: MappedStorageBuffer::new_default(device, "vkpt_instances"),
            materials: MappedStorageBuffer::new_default(device, "vkpt_materials"),
            light_polygons: MappedStorageBuffer::new_default(device, "vkpt_light_polygons"),
            dyn_lights: MappedStorageBuffer::new_default(device, "vkpt_dyn_lights"),
            light_lists: MappedStorageBuffer::new_default(device, "vkpt_light_lists"),
            light_list_lights: MappedStorageBuffer::new_default(
                device,
                "vkpt_light_list_lights",
            ),
            spot_profiles: MappedStorageBuffer::new_default(device, "vkpt_spot_profiles"),
            light_counts: array::from_fn(|idx| {
                MappedStorageBuffer::new_default(device, format!("vkpt_light_counts_{idx}"))
            }),
            light_stats: Self::light_stats(device, 0),
            histogram: UnmappedStorageBuffer::new(
                device,
                "vkpt_tone_mapping_histogram",
                mem::size_of::<gpu::LuminanceHistogram>(),
            ),
            tone_mapping: Self::tone_mapping_state(device),
            geometry,
            prev_positions: array::from_fn(|idx| {
                MappedStorageBuffer::new_default(device, format!("vkpt_prev_positions_{idx}"))
            }),
            instanced: MappedStorageBuffer::new_default(device, "vkpt_instanced_primitives"),
        }
    }

    fn light_stats(
        device: &wgpu::Device,
        list_entries: u32,
    ) -> [UnmappedStorageBuffer; gpu::NUM_LIGHT_STATS_BUFFERS as usize] {
        let size = gpu::light_stats_buffer_len(list_entries) * mem::size_of::<u32>();

        array::from_fn(|idx| {
            UnmappedStorageBuffer::new(device, format!("vkpt_light_stats_{idx}"), size)
        })
    }

    fn tone_mapping_state(device: &wgpu::Device) -> DoubleBuffered<UnmappedStorageBuffer> {
        DoubleBuffered::<UnmappedStorageBuffer>::new(
            device,
            "vkpt_tone_mapping_state",
            mem::size_of::<gpu::ToneMappingState>(),
        )
    }

    /// Copies this frame's UBO and scene tables into the buffers and uploads
    /// whatever has changed.
    pub fn write<H>(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        ubo: &gpu::GlobalUbo,
        scene: &mut Scene<H>,
    ) -> BufferFlushOutcome
    where
        H: Hash + Eq,
    {
        *self.ubo = *ubo;

        if scene.materials.take_dirty() {
            *self.materials = scene.materials.serialize();
        }

        let lights = &scene.lights;

        self.instances.replace(scene.instances.current());
        self.instanced.replace(scene.instances.instanced());
        self.light_polygons.replace(lights.polygons());
        self.dyn_lights.replace(lights.dyn_lights());
        self.light_lists.replace(lights.list_offsets());
        self.light_list_lights.replace(lights.list_lights());
        self.spot_profiles.replace(lights.spot_profiles());

        for (slot, counts) in self.light_counts.iter_mut().enumerate() {
            counts.replace(lights.counts(slot as u32));
        }

        for (table, buffers) in GeometryTable::ALL.into_iter().zip(&mut self.geometry) {
            let geometry = &scene.geometry;

            buffers.indices.replace(geometry.indices(table));
            buffers.vertices.replace(geometry.vertices(table));
            buffers.primitives.replace(geometry.primitives(table));

            if let (Some(slot), Some(positions)) =
                (table.prev_positions_slot(), geometry.prev_positions(table))
            {
                self.prev_positions[slot].replace(positions);
            }
        }

        let mut outcome = self.reserve_light_stats(device, lights.list_entries());

        self.ubo.flush(queue);

        let flushes = [
            self.instances.flush(device, queue),
            self.instanced.flush(device, queue),
            self.materials.flush(device, queue),
            self.light_polygons.flush(device, queue),
            self.dyn_lights.flush(device, queue),
            self.light_lists.flush(device, queue),
            self.light_list_lights.flush(device, queue),
            self.spot_profiles.flush(device, queue),
        ];

        for flush in flushes {
            outcome = outcome.merge(flush);
        }

        for counts in &mut self.light_counts {
            outcome = outcome.merge(counts.flush(device, queue));
        }

        for buffers in &mut self.geometry {
            outcome = outcome
                .merge(buffers.indices.flush(device, queue))
                .merge(buffers.vertices.flush(device, queue))
                .merge(buffers.primitives.flush(device, queue));
        }

        for positions in &mut self.prev_positions {
            outcome = outcome.merge(positions.flush(device, queue));
        }

        outcome
    }

    /// Makes sure the light-statistics buffers cover given number of
    /// light-list entries; growing them discards the statistics gathered so
    /// far.
    fn reserve_light_stats(&mut self, device: &wgpu::Device, list_entries: u32) -> BufferFlushOutcome {
        let size = gpu::light_stats_buffer_len(list_entries) * mem::size_of::<u32>();

        if size as u64 <= self.light_stats[0].size() {
            return Default::default();
        }

        debug!("Growing light stats buffers; list_entries={list_entries}");

        self.light_stats = Self::light_stats(device, list_entries.next_power_of_two());

        BufferFlushOutcome { reallocated: true }
    }

    /// Zeroes buffers accumulated from scratch by given frame: the light
    /// statistics written by it and the luminance histogram.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder, frame: u32) {
        let schedule = gpu::LightStatsSchedule::for_frame(frame);

        self.light_stats[schedule.clear() as usize].clear(encoder);
        self.histogram.clear(encoder);
    }
}

/// Images sampled by the shaders, uploaded by the caller: blue noise,
/// environment map and physical sky.
#[derive(Debug)]
pub struct EnvironmentImages {
    pub blue_noise: Texture,
    pub envmap: Texture,
    pub physical_sky: Texture,
}

impl EnvironmentImages {
    pub fn new(device: &wgpu::Device) -> Self {
        let format = wgpu::TextureFormat::Rgba16Float;

        Self {
            blue_noise: Texture::new(device, "vkpt_blue_noise", BLUE_NOISE_SIZE, format),
            envmap: Texture::new(device, "vkpt_envmap", ENVMAP_SIZE, format),
            physical_sky: Texture::new(device, "vkpt_physical_sky", ENVMAP_SIZE, format),
        }
    }
}

/// Textures backing [`ImageId`]s and [`AbImageId`]s.
#[derive(Debug)]
pub struct ImageBuffers {
    sizes: gpu::FrameSizes,
    images: Vec<Texture>,
    ab_images: Vec<DoubleBuffered<Texture>>,
}

impl ImageBuffers {
    pub fn new(device: &wgpu::Device, sizes: gpu::FrameSizes) -> Self {
        let images = ImageId::ALL
            .iter()
            .map(|id| {
                Texture::for_image(
                    device,
                    label(id.name()),
                    sizes.get(id.extent()),
                    id.format(),
                )
            })
            .collect();

        let ab_images = AbImageId::ALL
            .iter()
            .map(|id| {
                DoubleBuffered::<Texture>::new(
                    device,
                    label(id.name()),
                    sizes.get(id.extent()),
                    id.format(),
                )
            })
            .collect();

        Self {
            sizes,
            images,
            ab_images,
        }
    }

    pub fn sizes(&self) -> gpu::FrameSizes {
        self.sizes
    }

    pub fn image(&self, id: ImageId) -> &Texture {
        &self.images[id.index() as usize]
    }

    pub fn ab(&self, id: AbImageId) -> &DoubleBuffered<Texture> {
        &self.ab_images[id.index() as usize]
    }
}

fn label(name: &str) -> String {
    format!("vkpt_{}", name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!("vkpt_asvgf_grad_smpl_pos", label(AbImageId::GradSmplPos.name()));
    }

    #[test]
    fn light_stats_sizes() {
        assert_eq!(0, gpu::light_stats_buffer_len(0));

        assert_eq!(
            (gpu::LIGHT_STATS_OCTANTS * gpu::LIGHT_STATS_COUNTERS) as usize,
            gpu::light_stats_buffer_len(1),
        );
    }
}
