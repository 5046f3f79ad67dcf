use std::collections::hash_map::Entry;
use std::hash::Hash;

use fxhash::FxHashMap;
use log::{debug, warn};

use crate::gpu;
use crate::utils::Allocator;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Material {
    info: gpu::MaterialInfo,
    remap: u32,
}

/// Host-side material table, serialized into the material buffer.
///
/// Slot 0 holds the default material, so that a zero remap means "none" and
/// unresolvable ids decode into something sensible.
#[derive(Clone, Debug)]
pub struct Materials<H>
where
    H: Hash + Eq,
{
    allocator: Allocator,
    index: FxHashMap<H, u32>,
    materials: Vec<Material>,
    dirty: bool,
}

impl<H> Materials<H>
where
    H: Hash + Eq,
{
    pub fn new() -> Self {
        let mut allocator = Allocator::default();

        allocator.alloc();

        Self {
            allocator,
            index: Default::default(),
            materials: vec![Material {
                info: Default::default(),
                remap: 0,
            }],
            dirty: true,
        }
    }

    /// Inserts (or updates) a material; returns its index.
    pub fn insert(&mut self, handle: H, info: gpu::MaterialInfo) -> u32 {
        self.dirty = true;

        match self.index.entry(handle) {
            Entry::Occupied(entry) => {
                let index = *entry.get();

                self.materials[index as usize].info = info;
                index
            }

            Entry::Vacant(entry) => {
                let slot = self.allocator.alloc();

                if slot > gpu::MATERIAL_INDEX_MASK as usize {
                    warn!("Material table is full; slot={slot}");

                    self.allocator.release(slot);
                    return 0;
                }

                let material = Material { info, remap: 0 };

                if slot < self.materials.len() {
                    self.materials[slot] = material;
                } else {
                    self.materials.push(material);
                }

                entry.insert(slot as u32);
                slot as u32
            }
        }
    }

    /// Updates an already-inserted material; returns whether it existed.
    pub fn update(&mut self, handle: &H, info: gpu::MaterialInfo) -> bool {
        let Some(index) = self.lookup(handle) else {
            return false;
        };

        self.materials[index as usize].info = info;
        self.dirty = true;

        true
    }

    pub fn remove(&mut self, handle: &H) -> bool {
        let Some(index) = self.index.remove(handle) else {
            return false;
        };

        self.materials[index as usize] = Material {
            info: Default::default(),
            remap: 0,
        };

        for material in &mut self.materials {
            if material.remap == index {
                material.remap = 0;
            }
        }

        self.allocator.release(index as usize);
        self.materials.truncate(self.allocator.len());
        self.dirty = true;

        debug!("Material removed; index={index}");

        true
    }

    /// Makes `handle`'s textures and surface parameters come from `target`;
    /// `None` clears the remap.
    ///
    /// Remaps are resolved a single hop deep, so pointing at a material that
    /// is itself remapped yields the target's own (un-remapped) data.
    pub fn set_remap(&mut self, handle: &H, target: Option<&H>) -> bool {
        let Some(index) = self.lookup(handle) else {
            return false;
        };

        let remap = match target {
            Some(target) => match self.lookup(target) {
                Some(target) => target,
                None => return false,
            },
            None => 0,
        };

        let remap = if remap == index { 0 } else { remap };

        self.materials[index as usize].remap = remap;
        self.dirty = true;

        true
    }

    pub fn lookup(&self, handle: &H) -> Option<u32> {
        self.index.get(handle).copied()
    }

    pub fn get(&self, handle: &H) -> Option<&gpu::MaterialInfo> {
        self.lookup(handle)
            .map(|index| &self.materials[index as usize].info)
    }

    /// Number of slots, free ones included.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns material records, [`gpu::MATERIAL_UINTS`] words each.
    pub fn serialize(&self) -> Vec<u32> {
        self.materials
            .iter()
            .flat_map(|material| material.info.serialize(material.remap))
            .collect()
    }

    /// Returns whether the table has changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl<H> Default for Materials<H>
where
    H: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn material(base_texture: u32) -> gpu::MaterialInfo {
        gpu::MaterialInfo {
            base_texture,
            ..Default::default()
        }
    }

    #[test]
    fn insert_update_remove() {
        let mut target = Materials::new();

        assert!(target.is_empty());
        assert_eq!(1, target.insert("a", material(10)));
        assert_eq!(2, target.insert("b", material(20)));
        assert_eq!(1, target.insert("a", material(11)));
        assert_eq!(3, target.len());

        assert!(target.update(&"b", material(21)));
        assert!(!target.update(&"c", material(30)));

        let words = target.serialize();
        let view = gpu::MaterialsView::new(&words);

        assert_eq!(11, view.get_material_info(1).base_texture);
        assert_eq!(21, view.get_material_info(2).base_texture);

        assert!(target.remove(&"a"));
        assert!(!target.remove(&"a"));
        assert_eq!(None, target.lookup(&"a"));

        // Freed slot gets reused
        assert_eq!(1, target.insert("c", material(30)));
    }

    #[test]
    fn removing_last_slot_shrinks_table() {
        let mut target = Materials::new();

        target.insert(1, material(1));
        target.insert(2, material(2));
        target.remove(&2);

        assert_eq!(2, target.len());
        assert_eq!(2 * gpu::MATERIAL_UINTS, target.serialize().len());
    }

    #[test]
    fn remap_resolves_single_hop() {
        let mut target = Materials::new();

        let a = target.insert("a", material(10));
        let b = target.insert("b", material(20));
        let c = target.insert("c", material(30));

        target.insert(
            "a",
            gpu::MaterialInfo {
                base_texture: 10,
                emissive_scale: 0.5,
                ..Default::default()
            },
        );

        assert!(target.set_remap(&"a", Some(&"b")));
        assert!(target.set_remap(&"b", Some(&"c")));
        assert!(!target.set_remap(&"a", Some(&"nope")));

        let words = target.serialize();
        let view = gpu::MaterialsView::new(&words);

        // a -> b, but not further to c
        let info = view.get_material_info(a);

        assert_eq!(20, info.base_texture);
        assert_relative_eq!(0.5, info.emissive_scale);

        assert_eq!(30, view.get_material_info(b).base_texture);
        assert_eq!(30, view.get_material_info(c).base_texture);

        assert!(target.set_remap(&"a", None));

        let words = target.serialize();

        assert_eq!(
            10,
            gpu::MaterialsView::new(&words)
                .get_material_info(a)
                .base_texture
        );
    }

    #[test]
    fn removing_target_clears_remaps() {
        let mut target = Materials::new();

        let a = target.insert("a", material(10));

        target.insert("b", material(20));
        target.set_remap(&"a", Some(&"b"));
        target.remove(&"b");

        let words = target.serialize();

        assert_eq!(
            10,
            gpu::MaterialsView::new(&words)
                .get_material_info(a)
                .base_texture
        );
    }

    #[test]
    fn dirty_tracking() {
        let mut target = Materials::new();

        assert!(target.take_dirty());
        assert!(!target.take_dirty());

        target.insert(1, material(1));

        assert!(target.take_dirty());
    }
}
