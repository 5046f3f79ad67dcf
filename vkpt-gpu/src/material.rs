use half::f16;

/// Bits of `material_id` addressing the material table.
pub const MATERIAL_INDEX_MASK: u32 = 0x0000_0fff;

/// Bits of `material_id` holding the material kind.
pub const MATERIAL_KIND_MASK: u32 = 0xf000_0000;
pub const MATERIAL_KIND_REGULAR: u32 = 0x0000_0000;
pub const MATERIAL_KIND_WATER: u32 = 0x1000_0000;
pub const MATERIAL_KIND_GLASS: u32 = 0x2000_0000;
pub const MATERIAL_KIND_SKY: u32 = 0x3000_0000;
pub const MATERIAL_KIND_INVISIBLE: u32 = 0x4000_0000;
pub const MATERIAL_KIND_TRANSPARENT: u32 = 0x5000_0000;

/// Surface is emissive and registered as a polygonal light.
pub const MATERIAL_FLAG_LIGHT: u32 = 0x0800_0000;

/// Number of words per material record.
pub const MATERIAL_UINTS: usize = 8;

/// Upper bound of `next_frame` hops performed by [`MaterialsView::animate()`].
pub const MAX_MATERIAL_ANIMATION_HOPS: u32 = 64;

pub fn material_kind(material_id: u32) -> u32 {
    material_id & MATERIAL_KIND_MASK
}

pub fn is_transparent_kind(material_id: u32) -> bool {
    matches!(
        material_kind(material_id),
        MATERIAL_KIND_WATER | MATERIAL_KIND_GLASS | MATERIAL_KIND_TRANSPARENT
    )
}

/// Decoded material record.
///
/// Texture handles are indices into the bindless texture array; zero means
/// "no texture".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialInfo {
    pub base_texture: u32,
    pub emissive_texture: u32,
    pub normals_texture: u32,
    pub physical_texture: u32,
    pub mask_texture: u32,
    pub bump_scale: f32,

    /// Negative when the material doesn't override roughness
    pub roughness_override: f32,

    pub specular_scale: f32,
    pub metalness_factor: f32,
    pub emissive_scale: f32,
    pub base_factor: f32,
    pub num_frames: u32,
    pub next_frame: u32,
    pub light_style: u32,
}

impl Default for MaterialInfo {
    fn default() -> Self {
        Self {
            base_texture: 0,
            emissive_texture: 0,
            normals_texture: 0,
            physical_texture: 0,
            mask_texture: 0,
            bump_scale: 1.0,
            roughness_override: -1.0,
            specular_scale: 1.0,
            metalness_factor: 0.0,
            emissive_scale: 1.0,
            base_factor: 1.0,
            num_frames: 0,
            next_frame: 0,
            light_style: 0,
        }
    }
}

impl MaterialInfo {
    /// Serializes material into its record; `remap` goes into word 4.
    pub fn serialize(&self, remap: u32) -> [u32; MATERIAL_UINTS] {
        [
            pack_u16x2(self.base_texture, self.emissive_texture),
            pack_u16x2(self.normals_texture, self.physical_texture),
            pack_half2(self.bump_scale, self.roughness_override),
            pack_half2(self.specular_scale, self.metalness_factor),
            remap & MATERIAL_INDEX_MASK,
            pack_u16x2(self.mask_texture, self.num_frames),
            pack_u16x2(self.next_frame, self.light_style),
            pack_half2(self.emissive_scale, self.base_factor),
        ]
    }

    fn decode_core(&mut self, words: &[u32]) {
        (self.base_texture, self.emissive_texture) = unpack_u16x2(words[0]);
        (self.normals_texture, self.physical_texture) = unpack_u16x2(words[1]);
        (self.bump_scale, self.roughness_override) = unpack_half2(words[2]);
        (self.specular_scale, self.metalness_factor) = unpack_half2(words[3]);
    }

    fn decode_extra(&mut self, words: &[u32]) {
        (self.mask_texture, self.num_frames) = unpack_u16x2(words[5]);
        (self.next_frame, self.light_style) = unpack_u16x2(words[6]);
        (self.emissive_scale, self.base_factor) = unpack_half2(words[7]);
    }
}

pub struct MaterialsView<'a> {
    words: &'a [u32],
}

impl<'a> MaterialsView<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words }
    }

    pub fn len(&self) -> u32 {
        (self.words.len() / MATERIAL_UINTS) as u32
    }

    fn record(&self, index: u32) -> Option<&'a [u32]> {
        let base = index as usize * MATERIAL_UINTS;

        self.words.get(base..base + MATERIAL_UINTS)
    }

    /// Decodes material of given id.
    ///
    /// A non-zero remap in the record's word 4 redirects the core words
    /// (0..=3) to another record, exactly once: the target's own remap is
    /// not followed. Unresolvable indices yield the default material.
    pub fn get_material_info(&self, material_id: u32) -> MaterialInfo {
        let mut info = MaterialInfo::default();

        let Some(record) = self.record(material_id & MATERIAL_INDEX_MASK) else {
            return info;
        };

        let remap = record[4] & MATERIAL_INDEX_MASK;

        let core = if remap != 0 {
            self.record(remap)
        } else {
            Some(record)
        };

        if let Some(core) = core {
            info.decode_core(core);
        }

        info.decode_extra(record);
        info
    }

    /// Follows the `next_frame` chain of an animated material; kind and flag
    /// bits of `material_id` are preserved.
    pub fn animate(&self, material_id: u32, frame: u32) -> u32 {
        let info = self.get_material_info(material_id);

        if info.num_frames <= 1 {
            return material_id;
        }

        let hops = (frame % info.num_frames).min(MAX_MATERIAL_ANIMATION_HOPS);
        let mut index = material_id & MATERIAL_INDEX_MASK;

        for _ in 0..hops {
            let next = self.get_material_info(index).next_frame & MATERIAL_INDEX_MASK;

            if self.record(next).is_none() {
                break;
            }

            index = next;
        }

        (material_id & !MATERIAL_INDEX_MASK) | index
    }
}

fn pack_u16x2(lo: u32, hi: u32) -> u32 {
    (lo & 0xffff) | ((hi & 0xffff) << 16)
}

fn unpack_u16x2(word: u32) -> (u32, u32) {
    (word & 0xffff, word >> 16)
}

fn pack_half2(lo: f32, hi: f32) -> u32 {
    f16::from_f32(lo).to_bits() as u32 | ((f16::from_f32(hi).to_bits() as u32) << 16)
}

fn unpack_half2(word: u32) -> (f32, f32) {
    (
        f16::from_bits((word & 0xffff) as u16).to_f32(),
        f16::from_bits((word >> 16) as u16).to_f32(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(base_texture: u32, remap: u32) -> [u32; MATERIAL_UINTS] {
        MaterialInfo {
            base_texture,
            ..Default::default()
        }
        .serialize(remap)
    }

    fn table(records: &[[u32; MATERIAL_UINTS]]) -> Vec<u32> {
        records.iter().flatten().copied().collect()
    }

    #[test]
    fn direct() {
        let words = table(&[material(0, 0), material(11, 0)]);
        let materials = MaterialsView::new(&words);

        assert_eq!(11, materials.get_material_info(1).base_texture);
    }

    #[test]
    fn kind_bits_are_ignored() {
        let words = table(&[material(0, 0), material(11, 0)]);
        let materials = MaterialsView::new(&words);

        assert_eq!(
            11,
            materials
                .get_material_info(1 | MATERIAL_KIND_WATER | MATERIAL_FLAG_LIGHT)
                .base_texture
        );
    }

    #[test]
    fn one_hop_remap() {
        let words = table(&[material(0, 0), material(11, 2), material(22, 0)]);
        let materials = MaterialsView::new(&words);

        assert_eq!(22, materials.get_material_info(1).base_texture);
    }

    #[test]
    fn two_hop_chains_are_not_chased() {
        let words = table(&[
            material(0, 0),
            material(11, 2),
            material(22, 3),
            material(33, 0),
        ]);

        let materials = MaterialsView::new(&words);

        assert_eq!(22, materials.get_material_info(1).base_texture);
    }

    #[test]
    fn remap_keeps_own_extra_words() {
        let own = MaterialInfo {
            base_texture: 11,
            mask_texture: 5,
            emissive_scale: 2.0,
            ..Default::default()
        }
        .serialize(2);

        let words = table(&[material(0, 0), own, material(22, 0)]);
        let info = MaterialsView::new(&words).get_material_info(1);

        assert_eq!(22, info.base_texture);
        assert_eq!(5, info.mask_texture);
        assert_eq!(2.0, info.emissive_scale);
    }

    #[test]
    fn unresolved_indices_default_to_no_texture() {
        let words = table(&[material(0, 0), material(11, 9)]);
        let materials = MaterialsView::new(&words);

        assert_eq!(MaterialInfo::default(), materials.get_material_info(5));
        assert_eq!(0, materials.get_material_info(1).base_texture);
    }

    #[test]
    fn half_floats() {
        let words = table(&[MaterialInfo {
            bump_scale: 0.5,
            roughness_override: -1.0,
            specular_scale: 2.0,
            metalness_factor: 0.25,
            ..Default::default()
        }
        .serialize(0)]);

        let info = MaterialsView::new(&words).get_material_info(0);

        assert_eq!(0.5, info.bump_scale);
        assert_eq!(-1.0, info.roughness_override);
        assert_eq!(2.0, info.specular_scale);
        assert_eq!(0.25, info.metalness_factor);
    }

    #[test]
    fn animation() {
        let frame = |base_texture, next_frame| {
            MaterialInfo {
                base_texture,
                num_frames: 3,
                next_frame,
                ..Default::default()
            }
            .serialize(0)
        };

        let words = table(&[material(0, 0), frame(1, 2), frame(2, 3), frame(3, 1)]);
        let materials = MaterialsView::new(&words);

        assert_eq!(1 | MATERIAL_KIND_GLASS, materials.animate(1 | MATERIAL_KIND_GLASS, 0));
        assert_eq!(2, materials.animate(1, 1));
        assert_eq!(3, materials.animate(1, 2));
        assert_eq!(1, materials.animate(1, 3));
        assert_eq!(3, materials.animate(2, 1));
    }
}
