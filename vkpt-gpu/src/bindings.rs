//! Binding-index arithmetic shared by the host and the shaders.

use crate::{AbImageId, ImageId, Role, GEOMETRY_TABLE_COUNT, LIGHT_COUNT_HISTORY, NUM_LIGHT_STATS_BUFFERS};

pub const DESC_SET_GLOBAL: u32 = 0;
pub const DESC_SET_GEOMETRY: u32 = 1;
pub const DESC_SET_IMAGES: u32 = 2;

/// Set provided by the caller: the top-level acceleration structure, the
/// bindless textures and the environment maps.
pub const DESC_SET_EXTERNAL: u32 = 3;

// Global set

pub const GLOBAL_UBO_BINDING_IDX: u32 = 0;
pub const GLOBAL_INSTANCE_BUFFER_BINDING_IDX: u32 = 1;
pub const MATERIAL_BUFFER_BINDING_IDX: u32 = 2;
pub const LIGHT_POLYGON_BUFFER_BINDING_IDX: u32 = 3;
pub const DYN_LIGHT_BUFFER_BINDING_IDX: u32 = 4;
pub const LIGHT_LISTS_BINDING_IDX: u32 = 5;
pub const LIGHT_LIST_LIGHTS_BINDING_IDX: u32 = 6;
pub const SPOT_PROFILES_BINDING_IDX: u32 = 7;

/// First of [`LIGHT_COUNT_HISTORY`] consecutive bindings.
pub const LIGHT_COUNTS_HISTORY_BINDING_IDX: u32 = 8;

/// First of [`NUM_LIGHT_STATS_BUFFERS`] consecutive bindings.
pub const LIGHT_STATS_BINDING_IDX: u32 =
    LIGHT_COUNTS_HISTORY_BINDING_IDX + LIGHT_COUNT_HISTORY;

pub const TONE_MAPPING_HISTOGRAM_BINDING_IDX: u32 =
    LIGHT_STATS_BINDING_IDX + NUM_LIGHT_STATS_BUFFERS;

/// Followed by the history copy at `+ 1`.
pub const TONE_MAPPING_STATE_BINDING_IDX: u32 =
    TONE_MAPPING_HISTOGRAM_BINDING_IDX + 1;

pub const NUM_GLOBAL_BINDINGS: u32 = TONE_MAPPING_STATE_BINDING_IDX + 2;

// Geometry set

/// Each geometry table occupies three consecutive bindings: indices,
/// vertices and per-primitive records.
pub const BINDING_OFFSET_GEOMETRY_TABLES: u32 = 0;
pub const GEOMETRY_TABLE_BINDINGS: u32 = 3;

/// Previous-frame positions of the two dynamic tables.
pub const BINDING_OFFSET_PREV_POSITIONS: u32 =
    BINDING_OFFSET_GEOMETRY_TABLES
        + GEOMETRY_TABLE_COUNT as u32 * GEOMETRY_TABLE_BINDINGS;

pub const INSTANCED_PRIMITIVES_BINDING_IDX: u32 =
    BINDING_OFFSET_PREV_POSITIONS + 2;

pub const NUM_GEOMETRY_BINDINGS: u32 = INSTANCED_PRIMITIVES_BINDING_IDX + 1;

// Images set

pub const NUM_IMAGES_BASE: u32 = ImageId::COUNT;
pub const NUM_IMAGES_A_B: u32 = AbImageId::COUNT;
pub const NUM_IMAGES: u32 = NUM_IMAGES_BASE + 2 * NUM_IMAGES_A_B;

/// Storage (writable) views of the images.
pub const BINDING_OFFSET_IMAGES: u32 = 0;

/// Sampled (read-only) views of the same images.
pub const BINDING_OFFSET_TEXTURES: u32 = BINDING_OFFSET_IMAGES + NUM_IMAGES;

pub const BINDING_OFFSET_BLUE_NOISE: u32 = BINDING_OFFSET_TEXTURES + NUM_IMAGES;
pub const BINDING_OFFSET_ENVMAP: u32 = BINDING_OFFSET_BLUE_NOISE + 1;
pub const BINDING_OFFSET_PHYSICAL_SKY: u32 = BINDING_OFFSET_ENVMAP + 1;
pub const NUM_IMAGE_SET_BINDINGS: u32 = BINDING_OFFSET_PHYSICAL_SKY + 1;

/// Returns image's position within the image list; A/B images follow the
/// base ones, two entries each, current copy first.
pub fn image_index(id: ImageId) -> u32 {
    id.index()
}

/// See: [`image_index()`].
pub fn ab_image_index(id: AbImageId, role: Role) -> u32 {
    NUM_IMAGES_BASE + 2 * id.index() + role.index()
}

pub fn image_binding(id: ImageId, writable: bool) -> u32 {
    offset(writable) + image_index(id)
}

pub fn ab_image_binding(id: AbImageId, role: Role, writable: bool) -> u32 {
    offset(writable) + ab_image_index(id, role)
}

fn offset(writable: bool) -> u32 {
    if writable {
        BINDING_OFFSET_IMAGES
    } else {
        BINDING_OFFSET_TEXTURES
    }
}

pub fn geometry_table_binding(table: u32, item: u32) -> u32 {
    assert!(table < GEOMETRY_TABLE_COUNT as u32 && item < GEOMETRY_TABLE_BINDINGS);

    BINDING_OFFSET_GEOMETRY_TABLES + table * GEOMETRY_TABLE_BINDINGS + item
}

// Shader binding table

pub const SBT_RGEN: u32 = 0;
pub const SBT_RMISS_EMPTY: u32 = 1;
pub const SBT_RMISS_SHADOW: u32 = 2;
pub const SBT_RCHIT_GEOMETRY: u32 = 3;
pub const SBT_RAHIT_MASKED: u32 = 4;
pub const SBT_ENTRIES_PER_PIPELINE: u32 = 5;

/// Byte offsets of the shader-binding-table regions of a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SbtLayout {
    pub handle_stride: u32,
    pub raygen_offset: u32,
    pub miss_offset: u32,
    pub hit_offset: u32,
    pub size: u32,
}

impl SbtLayout {
    /// Lays out [`SBT_ENTRIES_PER_PIPELINE`] handles; each handle is aligned
    /// to `handle_alignment`, each region (raygen / miss / hit) to
    /// `base_alignment`.
    pub fn new(handle_size: u32, handle_alignment: u32, base_alignment: u32) -> Self {
        let handle_stride = align_up(handle_size, handle_alignment);
        let raygen_offset = 0;

        let miss_offset =
            align_up(raygen_offset + handle_stride, base_alignment);

        let hit_offset = align_up(
            miss_offset + (SBT_RCHIT_GEOMETRY - SBT_RMISS_EMPTY) * handle_stride,
            base_alignment,
        );

        let size = hit_offset
            + (SBT_ENTRIES_PER_PIPELINE - SBT_RCHIT_GEOMETRY) * handle_stride;

        Self {
            handle_stride,
            raygen_offset,
            miss_offset,
            hit_offset,
            size,
        }
    }

    /// Returns byte offset of given entry.
    pub fn entry_offset(&self, entry: u32) -> u32 {
        match entry {
            SBT_RGEN => self.raygen_offset,
            SBT_RMISS_EMPTY | SBT_RMISS_SHADOW => {
                self.miss_offset + (entry - SBT_RMISS_EMPTY) * self.handle_stride
            }
            _ => self.hit_offset + (entry - SBT_RCHIT_GEOMETRY) * self.handle_stride,
        }
    }
}

pub const fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        value
    } else {
        (value + alignment - 1) / alignment * alignment
    }
}
