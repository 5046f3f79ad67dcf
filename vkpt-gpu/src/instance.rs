use glam::Mat4;

use crate::layout::schema;

/// Kind of a top-level acceleration-structure instance; decides which
/// geometry table its triangles are fetched from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceType {
    WorldStatic = 0,
    WorldDynamicMaterial = 1,
    WorldDynamicGeometry = 2,
    WorldSubmodel = 3,
    Sky = 4,
    EntityStatic = 5,
    EntityDynamic = 6,
}

impl InstanceType {
    pub const ALL: [Self; 7] = [
        Self::WorldStatic,
        Self::WorldDynamicMaterial,
        Self::WorldDynamicGeometry,
        Self::WorldSubmodel,
        Self::Sky,
        Self::EntityStatic,
        Self::EntityDynamic,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Whether triangles of this instance live in the flat per-primitive
    /// arrays instead of one of the world tables.
    pub fn is_instanced(self) -> bool {
        matches!(self, Self::EntityStatic | Self::EntityDynamic)
    }

    /// Whether previous-frame positions differ from the current ones.
    pub fn has_motion(self) -> bool {
        matches!(
            self,
            Self::WorldDynamicMaterial
                | Self::WorldDynamicGeometry
                | Self::EntityStatic
                | Self::EntityDynamic
        )
    }
}

/// Bits of an instance's cull mask.
pub const AS_FLAG_OPAQUE: u32 = 1 << 0;
pub const AS_FLAG_TRANSPARENT: u32 = 1 << 1;
pub const AS_FLAG_VIEWER_MODELS: u32 = 1 << 2;
pub const AS_FLAG_VIEWER_WEAPON: u32 = 1 << 3;
pub const AS_FLAG_SKY: u32 = 1 << 4;
pub const AS_FLAG_EVERYTHING: u32 = 0xff;

/// Mask of primary rays; the player's own model is invisible to the camera.
pub const PRIMARY_RAY_MASK: u32 = AS_FLAG_OPAQUE | AS_FLAG_VIEWER_WEAPON | AS_FLAG_SKY;

/// Mask of shadow rays; the player's model casts shadows, the weapon doesn't.
pub const SHADOW_RAY_MASK: u32 = AS_FLAG_OPAQUE | AS_FLAG_VIEWER_MODELS;

/// Mask of bounce rays.
pub const BOUNCE_RAY_MASK: u32 = AS_FLAG_OPAQUE | AS_FLAG_VIEWER_MODELS | AS_FLAG_SKY;

/// Marks primitive ids of instanced (entity) geometry within hit payloads.
pub const INSTANCE_DYNAMIC_FLAG: u32 = 1 << 31;

/// Sentinel of [`InstanceRecord::prev_index`].
pub const INSTANCE_NOT_PRESENT: u32 = u32::MAX;

schema! {
    #[derive(Debug, Default, PartialEq)]
    pub struct InstanceRecord {
        pub transform: Mat4,
        pub prev_transform: Mat4,
        pub instance_type: u32,
        pub cull_mask: u32,

        /// Index of the first primitive within the instance's table or within
        /// the flat per-primitive arrays
        pub prim_offset: u32,

        pub prim_count: u32,

        /// Index of this instance in the previous frame's table or
        /// [`INSTANCE_NOT_PRESENT`]
        pub prev_index: u32,

        /// Material replacing the geometry's own, zero if none
        pub material_override: u32,

        /// Alpha of translucent entities, as `f32` bits
        pub alpha: u32,

        pub entity_id: u32,
    }
}

impl InstanceRecord {
    pub fn ty(&self) -> Option<InstanceType> {
        InstanceType::from_u32(self.instance_type)
    }

    pub fn alpha(&self) -> f32 {
        f32::from_bits(self.alpha)
    }
}

pub struct InstancesView<'a> {
    items: &'a [InstanceRecord],
}

impl<'a> InstancesView<'a> {
    pub fn new(items: &'a [InstanceRecord]) -> Self {
        Self { items }
    }

    pub fn get(&self, index: u32) -> Option<&'a InstanceRecord> {
        self.items.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Finds the instance that was at `prev_index` during the previous
    /// frame.
    pub fn find_current(&self, prev_index: u32) -> Option<u32> {
        self.iter()
            .find(|(_, instance)| instance.prev_index == prev_index)
            .map(|(idx, _)| idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &'a InstanceRecord)> {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, item)| (idx as u32, item))
    }
}

/// Encodes the primitive part of a hit payload.
pub fn encode_instance_prim(prim_id: u32, is_dynamic: bool) -> u32 {
    let prim_id = prim_id & !INSTANCE_DYNAMIC_FLAG;

    if is_dynamic {
        prim_id | INSTANCE_DYNAMIC_FLAG
    } else {
        prim_id
    }
}

/// See: [`encode_instance_prim()`]; returns `(prim_id, is_dynamic)`.
pub fn decode_instance_prim(word: u32) -> (u32, bool) {
    (word & !INSTANCE_DYNAMIC_FLAG, word & INSTANCE_DYNAMIC_FLAG != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HasSchema;

    #[test]
    fn layout() {
        assert_eq!(Ok(()), InstanceRecord::SCHEMA.validate());
        assert_eq!(160, core::mem::size_of::<InstanceRecord>());
    }

    #[test]
    fn types() {
        for (idx, ty) in InstanceType::ALL.iter().enumerate() {
            assert_eq!(Some(*ty), InstanceType::from_u32(idx as u32));
            assert_eq!(idx as u32, *ty as u32);
        }

        assert_eq!(None, InstanceType::from_u32(7));
        assert!(InstanceType::EntityDynamic.is_instanced());
        assert!(!InstanceType::WorldSubmodel.has_motion());
    }

    #[test]
    fn find_current() {
        let instances = [
            InstanceRecord {
                prev_index: INSTANCE_NOT_PRESENT,
                ..Default::default()
            },
            InstanceRecord {
                prev_index: 0,
                ..Default::default()
            },
        ];

        let instances = InstancesView::new(&instances);

        assert_eq!(Some(1), instances.find_current(0));
        assert_eq!(None, instances.find_current(1));
    }

    #[test]
    fn instance_prim() {
        assert_eq!((1234, true), decode_instance_prim(encode_instance_prim(1234, true)));
        assert_eq!((1234, false), decode_instance_prim(encode_instance_prim(1234, false)));
        assert_eq!(0x8000_0007, encode_instance_prim(7, true));
    }
}
