use std::mem;

use fxhash::FxHashMap;
use glam::{Mat3, Mat4, UVec4, Vec3, Vec4};
use log::{debug, warn};

use crate::gpu::{self, GeometryTable, InstanceType};

/// Maximum number of instances of the top-level acceleration structure.
pub const MAX_INSTANCES: usize = 4096;

pub type ModelId = u32;

/// Triangle of a model, in model space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelTriangle {
    pub positions: [Vec3; 3],

    /// Two UV sets per vertex
    pub uvs: [Vec4; 3],

    /// RGBA8 vertex colors
    pub colors: [u32; 3],

    /// See: [`gpu::TangentFrame`]
    pub tangent_frames: [u32; 3],

    pub material_id: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Models {
    models: Vec<Vec<ModelTriangle>>,
}

impl Models {
    pub fn insert(&mut self, triangles: Vec<ModelTriangle>) -> ModelId {
        self.models.push(triangles);
        self.models.len() as ModelId - 1
    }

    pub fn get(&self, id: ModelId) -> Option<&[ModelTriangle]> {
        self.models.get(id as usize).map(|model| model.as_slice())
    }
}

/// What an entity is drawn with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EntityGeometry {
    /// Primitives of one of the world tables
    World {
        table: GeometryTable,
        first_prim: u32,
        prim_count: u32,
    },

    Model(ModelId),
}

/// Thing the engine wants to see rendered this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entity {
    /// Identifier stable across frames
    pub id: u32,

    pub geometry: EntityGeometry,
    pub transform: Mat4,

    /// Cluster the entity's origin is in, -1 if none
    pub cluster: i32,

    pub alpha: f32,

    /// Material replacing the geometry's own, zero if none
    pub material_override: u32,

    /// Player's own model: casts shadows, invisible to the camera
    pub is_viewer_model: bool,

    /// Player's weapon: seen by the camera, casts no shadows
    pub is_viewer_weapon: bool,
}

impl Entity {
    pub fn new(id: u32, geometry: EntityGeometry) -> Self {
        Self {
            id,
            geometry,
            transform: Mat4::IDENTITY,
            cluster: -1,
            alpha: 1.0,
            material_override: 0,
            is_viewer_model: false,
            is_viewer_weapon: false,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// Instances of the top-level acceleration structure, rebuilt each frame
/// from the entity list.
///
/// The current and previous tables are exchanged (not copied) between
/// frames; [`Self::current_to_prev()`] links them.
#[derive(Clone, Debug, Default)]
pub struct Instances {
    current: Vec<gpu::InstanceRecord>,
    prev: Vec<gpu::InstanceRecord>,
    current_ids: FxHashMap<u32, u32>,
    prev_ids: FxHashMap<u32, u32>,
    current_to_prev: Vec<u32>,
    instanced: Vec<gpu::InstancedPrimitive>,
}

impl Instances {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn update(&mut self, entities: &[Entity], models: &Models) {
        mem::swap(&mut self.current, &mut self.prev);
        mem::swap(&mut self.current_ids, &mut self.prev_ids);

        self.current.clear();
        self.current_ids.clear();
        self.current_to_prev.clear();
        self.instanced.clear();

        for entity in entities {
            if self.current.len() >= MAX_INSTANCES {
                warn!(
                    "Too many instances, dropping entity; id={}, max={MAX_INSTANCES}",
                    entity.id
                );
                continue;
            }

            if self.current_ids.contains_key(&entity.id) {
                warn!("Duplicate entity, dropping it; id={}", entity.id);
                continue;
            }

            let prev_index = self
                .prev_ids
                .get(&entity.id)
                .copied()
                .unwrap_or(gpu::INSTANCE_NOT_PRESENT);

            let prev_transform = self
                .prev
                .get(prev_index as usize)
                .map(|prev| prev.transform)
                .unwrap_or(entity.transform);

            let index = self.current.len() as u32;

            let (prim_offset, prim_count) = match entity.geometry {
                EntityGeometry::World {
                    first_prim,
                    prim_count,
                    ..
                } => (first_prim, prim_count),

                EntityGeometry::Model(model) => {
                    let Some(triangles) = models.get(model) else {
                        warn!("Unknown model, dropping entity; id={}, model={model}", entity.id);
                        continue;
                    };

                    let offset = self.instanced.len() as u32;

                    self.instanced.extend(triangles.iter().map(|tri| {
                        instanced_primitive(tri, entity, prev_transform, index)
                    }));

                    (offset, triangles.len() as u32)
                }
            };

            let instance_type = classify(entity, prev_transform);

            self.current.push(gpu::InstanceRecord {
                transform: entity.transform,
                prev_transform,
                instance_type: instance_type as u32,
                cull_mask: cull_mask(entity),
                prim_offset,
                prim_count,
                prev_index,
                material_override: entity.material_override,
                alpha: entity.alpha.to_bits(),
                entity_id: entity.id,
            });

            self.current_ids.insert(entity.id, index);
            self.current_to_prev.push(prev_index);
        }

        debug!(
            "Instances rebuilt; instances={}, instanced_prims={}",
            self.current.len(),
            self.instanced.len(),
        );
    }

    pub fn update_ubo(&self, ubo: &mut gpu::GlobalUbo) {
        ubo.num_instances = self.current.len() as u32;
    }

    pub fn current(&self) -> &[gpu::InstanceRecord] {
        &self.current
    }

    pub fn prev(&self) -> &[gpu::InstanceRecord] {
        &self.prev
    }

    /// For each current instance, its index within the previous frame's
    /// table or [`gpu::INSTANCE_NOT_PRESENT`].
    pub fn current_to_prev(&self) -> &[u32] {
        &self.current_to_prev
    }

    /// Triangles of model entities, transformed into world space.
    pub fn instanced(&self) -> &[gpu::InstancedPrimitive] {
        &self.instanced
    }

    pub fn find(&self, entity_id: u32) -> Option<u32> {
        self.current_ids.get(&entity_id).copied()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

fn classify(entity: &Entity, prev_transform: Mat4) -> InstanceType {
    match entity.geometry {
        EntityGeometry::World { table, .. } => match table {
            GeometryTable::WorldStatic => InstanceType::WorldStatic,
            GeometryTable::SkyStatic => InstanceType::Sky,
            GeometryTable::DynamicMaterial => InstanceType::WorldDynamicMaterial,
            GeometryTable::DynamicGeometry => InstanceType::WorldDynamicGeometry,
            GeometryTable::Submodel => InstanceType::WorldSubmodel,
        },

        EntityGeometry::Model(_) => {
            if prev_transform == entity.transform {
                InstanceType::EntityStatic
            } else {
                InstanceType::EntityDynamic
            }
        }
    }
}

fn cull_mask(entity: &Entity) -> u32 {
    if let EntityGeometry::World {
        table: GeometryTable::SkyStatic,
        ..
    } = entity.geometry
    {
        return gpu::AS_FLAG_SKY;
    }

    if entity.is_viewer_model {
        gpu::AS_FLAG_VIEWER_MODELS
    } else if entity.is_viewer_weapon {
        gpu::AS_FLAG_VIEWER_WEAPON
    } else if entity.alpha < 1.0 {
        gpu::AS_FLAG_TRANSPARENT
    } else {
        gpu::AS_FLAG_OPAQUE
    }
}

fn instanced_primitive(
    tri: &ModelTriangle,
    entity: &Entity,
    prev_transform: Mat4,
    instance_index: u32,
) -> gpu::InstancedPrimitive {
    let rotation = Mat3::from_mat4(entity.transform);

    let position = |transform: Mat4, idx: usize| {
        transform
            .transform_point3(tri.positions[idx])
            .extend(f32::from_bits(tri.colors[idx]))
    };

    let tangent_frame = |idx: usize| {
        let (tangent, _, normal) = gpu::TangentFrame::decode(tri.tangent_frames[idx]);

        gpu::TangentFrame::encode(
            (rotation * normal).normalize_or_zero(),
            (rotation * tangent).normalize_or_zero(),
        )
    };

    let material_id = if entity.material_override != 0 {
        entity.material_override
    } else {
        tri.material_id
    };

    gpu::InstancedPrimitive {
        positions: [0, 1, 2].map(|idx| position(entity.transform, idx)),
        prev_positions: [0, 1, 2].map(|idx| position(prev_transform, idx)),
        uvs: tri.uvs,
        tangent_frames: UVec4::new(tangent_frame(0), tangent_frame(1), tangent_frame(2), 0),
        material_id,
        cluster: entity.cluster,
        instance_index,
        _pad: 0,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    fn models() -> (Models, ModelId) {
        let mut models = Models::default();

        let model = models.insert(vec![ModelTriangle {
            positions: [Vec3::ZERO, Vec3::X, Vec3::Y],
            colors: [0xffffffff; 3],
            tangent_frames: [gpu::TangentFrame::encode(Vec3::Z, Vec3::X); 3],
            material_id: 7,
            ..Default::default()
        }]);

        (models, model)
    }

    fn world(id: u32) -> Entity {
        Entity::new(
            id,
            EntityGeometry::World {
                table: GeometryTable::WorldStatic,
                first_prim: 0,
                prim_count: 10,
            },
        )
    }

    #[test]
    fn classification() {
        let (models, model) = models();
        let mut target = Instances::new();

        let sky = Entity::new(
            2,
            EntityGeometry::World {
                table: GeometryTable::SkyStatic,
                first_prim: 3,
                prim_count: 2,
            },
        );

        let submodel = Entity::new(
            3,
            EntityGeometry::World {
                table: GeometryTable::Submodel,
                first_prim: 0,
                prim_count: 1,
            },
        );

        let weapon = Entity {
            is_viewer_weapon: true,
            ..Entity::new(4, EntityGeometry::Model(model))
        };

        let player = Entity {
            is_viewer_model: true,
            ..Entity::new(5, EntityGeometry::Model(model))
        };

        let glass = Entity {
            alpha: 0.5,
            ..Entity::new(6, EntityGeometry::Model(model))
        };

        target.update(&[world(1), sky, submodel, weapon, player, glass], &models);

        let records = target.current();

        assert_eq!(6, target.len());

        assert_eq!(InstanceType::WorldStatic as u32, records[0].instance_type);
        assert_eq!(gpu::AS_FLAG_OPAQUE, records[0].cull_mask);
        assert_eq!(10, records[0].prim_count);

        assert_eq!(InstanceType::Sky as u32, records[1].instance_type);
        assert_eq!(gpu::AS_FLAG_SKY, records[1].cull_mask);
        assert_eq!(3, records[1].prim_offset);

        assert_eq!(InstanceType::WorldSubmodel as u32, records[2].instance_type);

        assert_eq!(InstanceType::EntityStatic as u32, records[3].instance_type);
        assert_eq!(gpu::AS_FLAG_VIEWER_WEAPON, records[3].cull_mask);
        assert_eq!(gpu::AS_FLAG_VIEWER_MODELS, records[4].cull_mask);
        assert_eq!(gpu::AS_FLAG_TRANSPARENT, records[5].cull_mask);
        assert_relative_eq!(0.5, records[5].alpha());

        // Each model entity gets its own copy of the model's triangles
        assert_eq!(3, target.instanced().len());
        assert_eq!(1, records[4].prim_offset);
        assert_eq!(4, target.instanced()[1].instance_index);
    }

    #[test]
    fn tables_are_exchanged_between_frames() {
        let (models, model) = models();
        let mut target = Instances::new();

        target.update(&[world(10), world(11), world(12)], &models);

        assert_eq!(&[gpu::INSTANCE_NOT_PRESENT; 3], target.current_to_prev());

        let moved = Entity::new(13, EntityGeometry::Model(model))
            .with_transform(Mat4::from_translation(vec3(1.0, 0.0, 0.0)));

        target.update(&[world(12), moved, world(10)], &models);

        assert_eq!(&[2, gpu::INSTANCE_NOT_PRESENT, 0], target.current_to_prev());
        assert_eq!(3, target.prev().len());
        assert_eq!(11, target.prev()[1].entity_id);
        assert_eq!(Some(1), target.find(13));
        assert_eq!(None, target.find(11));

        for (idx, record) in target.current().iter().enumerate() {
            assert_eq!(target.current_to_prev()[idx], record.prev_index);
        }

        let moved = moved.with_transform(Mat4::from_translation(vec3(2.0, 0.0, 0.0)));

        target.update(&[moved], &models);

        let record = target.current()[0];

        assert_eq!(&[1], target.current_to_prev());
        assert_eq!(InstanceType::EntityDynamic as u32, record.instance_type);
        assert_eq!(
            Mat4::from_translation(vec3(1.0, 0.0, 0.0)),
            record.prev_transform
        );

        let prim = target.instanced()[0];

        assert_relative_eq!(2.0, prim.positions[0].x);
        assert_relative_eq!(1.0, prim.prev_positions[0].x);
        assert_eq!(7, prim.material_id);
    }

    #[test]
    fn unknown_models_and_duplicates_are_dropped() {
        let (models, _) = models();
        let mut target = Instances::new();

        target.update(
            &[
                world(1),
                world(1),
                Entity::new(2, EntityGeometry::Model(100)),
            ],
            &models,
        );

        assert_eq!(1, target.len());

        let mut ubo = gpu::GlobalUbo::default();

        target.update_ubo(&mut ubo);

        assert_eq!(1, ubo.num_instances);
    }

    #[test]
    fn material_override_and_tangents_follow_entity() {
        let (models, model) = models();
        let mut target = Instances::new();

        let entity = Entity {
            material_override: 42,
            cluster: 5,
            ..Entity::new(1, EntityGeometry::Model(model))
        }
        .with_transform(Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2));

        target.update(&[entity], &models);

        let prim = target.instanced()[0];
        let (_, _, normal) = gpu::TangentFrame::decode(prim.tangent_frames.x);

        assert_eq!(42, prim.material_id);
        assert_eq!(5, prim.cluster);
        assert_relative_eq!(-1.0, normal.y, epsilon = 0.02);
        assert_eq!(0xffffffff, prim.positions[0].w.to_bits());
    }
}
