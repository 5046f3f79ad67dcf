use std::ops::Range;

use glam::{Vec3, Vec4};
use log::{debug, warn};

use crate::gpu::{self, GeometryTable};

#[derive(Clone, Debug, Default)]
struct TableData {
    indices: Vec<u32>,
    vertices: Vec<gpu::Vertex>,
    primitives: Vec<gpu::PrimitiveRecord>,
    prev_positions: Option<Vec<Vec4>>,
}

/// World geometry, split into the tables triangles are fetched from.
#[derive(Clone, Debug)]
pub struct Geometry {
    tables: [TableData; gpu::GEOMETRY_TABLE_COUNT],
}

impl Geometry {
    pub fn new() -> Self {
        let tables = GeometryTable::ALL.map(|table| TableData {
            prev_positions: table.prev_positions_slot().map(|_| Vec::new()),
            ..Default::default()
        });

        Self { tables }
    }

    /// Appends an indexed mesh to given table; returns the range of its
    /// primitive ids.
    ///
    /// Submodel geometry doesn't belong to any cluster: its cluster is
    /// always stored as -1.
    pub fn push_mesh(
        &mut self,
        table: GeometryTable,
        vertices: &[gpu::Vertex],
        indices: &[u32],
        material_id: u32,
        cluster: i32,
    ) -> Range<u32> {
        assert!(indices.len() % 3 == 0, "mesh must consist of triangles");

        let data = &mut self.tables[table as usize];
        let base_vertex = data.vertices.len() as u32;
        let first_prim = data.primitives.len() as u32;

        let cluster = if table == GeometryTable::Submodel {
            -1
        } else {
            cluster
        };

        for idx in indices {
            if *idx as usize >= vertices.len() {
                warn!("Mesh index out of range, clamping; index={idx}, vertices={}", vertices.len());
            }
        }

        data.vertices.extend_from_slice(vertices);

        if let Some(prev) = &mut data.prev_positions {
            prev.extend(vertices.iter().map(|vertex| vertex.position));
        }

        data.indices.extend(indices.iter().map(|idx| {
            base_vertex + (*idx).min(vertices.len().saturating_sub(1) as u32)
        }));

        data.primitives.extend(
            (0..indices.len() / 3).map(|_| gpu::PrimitiveRecord {
                material_id,
                cluster,
            }),
        );

        first_prim..data.primitives.len() as u32
    }

    /// Moves vertices of a dynamic table; their current positions become
    /// the previous-frame ones.
    pub fn update_positions(&mut self, table: GeometryTable, first_vertex: u32, positions: &[Vec3]) {
        let data = &mut self.tables[table as usize];

        let Some(prev) = &mut data.prev_positions else {
            warn!("Table {table:?} doesn't keep previous positions, ignoring update");
            return;
        };

        let first_vertex = first_vertex as usize;

        for (idx, pos) in positions.iter().enumerate() {
            let Some(vertex) = data.vertices.get_mut(first_vertex + idx) else {
                break;
            };

            prev[first_vertex + idx] = vertex.position;
            vertex.position = pos.extend(1.0);
        }
    }

    /// Marks dynamic tables as unmoved, so that the next frame doesn't see
    /// stale motion.
    pub fn settle(&mut self) {
        for data in &mut self.tables {
            if let Some(prev) = &mut data.prev_positions {
                for (prev, vertex) in prev.iter_mut().zip(&data.vertices) {
                    *prev = vertex.position;
                }
            }
        }
    }

    pub fn clear(&mut self, table: GeometryTable) {
        debug!("Clearing geometry table {table:?}");

        let data = &mut self.tables[table as usize];

        data.indices.clear();
        data.vertices.clear();
        data.primitives.clear();

        if let Some(prev) = &mut data.prev_positions {
            prev.clear();
        }
    }

    pub fn len(&self, table: GeometryTable) -> u32 {
        self.tables[table as usize].primitives.len() as u32
    }

    pub fn indices(&self, table: GeometryTable) -> &[u32] {
        &self.tables[table as usize].indices
    }

    pub fn vertices(&self, table: GeometryTable) -> &[gpu::Vertex] {
        &self.tables[table as usize].vertices
    }

    pub fn primitives(&self, table: GeometryTable) -> &[gpu::PrimitiveRecord] {
        &self.tables[table as usize].primitives
    }

    pub fn prev_positions(&self, table: GeometryTable) -> Option<&[Vec4]> {
        self.tables[table as usize].prev_positions.as_deref()
    }

    pub fn view<'a>(&'a self, instanced: &'a [gpu::InstancedPrimitive]) -> gpu::GeometryView<'a> {
        let tables = GeometryTable::ALL.map(|table| gpu::GeometryTableView {
            indices: self.indices(table),
            vertices: self.vertices(table),
            primitives: self.primitives(table),
            prev_positions: self.prev_positions(table),
        });

        gpu::GeometryView { tables, instanced }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    fn quad() -> (Vec<gpu::Vertex>, Vec<u32>) {
        let vertex = |x: f32, y: f32| gpu::Vertex {
            position: Vec4::new(x, y, 0.0, 1.0),
            ..Default::default()
        };

        (
            vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0), vertex(1.0, 1.0)],
            vec![0, 1, 2, 2, 1, 3],
        )
    }

    #[test]
    fn push_mesh() {
        let mut target = Geometry::new();
        let (vertices, indices) = quad();

        assert_eq!(0..2, target.push_mesh(GeometryTable::WorldStatic, &vertices, &indices, 5, 3));
        assert_eq!(2..4, target.push_mesh(GeometryTable::WorldStatic, &vertices, &indices, 6, 4));
        assert_eq!(4, target.len(GeometryTable::WorldStatic));
        assert_eq!(&[4, 5, 6, 6, 5, 7], &target.indices(GeometryTable::WorldStatic)[6..]);

        let view = target.view(&[]);
        let tri = view.get_triangle(gpu::InstanceType::WorldStatic as u32, 3);

        assert_eq!(6, tri.material_id);
        assert_eq!(4, tri.cluster);
        assert_eq!(vec3(1.0, 1.0, 0.0), tri.positions[2]);
    }

    #[test]
    fn submodels_have_no_cluster() {
        let mut target = Geometry::new();
        let (vertices, indices) = quad();

        target.push_mesh(GeometryTable::Submodel, &vertices, &indices, 1, 12);

        assert!(target
            .primitives(GeometryTable::Submodel)
            .iter()
            .all(|prim| prim.cluster == -1));
    }

    #[test]
    fn dynamic_tables_keep_previous_positions() {
        let mut target = Geometry::new();
        let (vertices, indices) = quad();

        target.push_mesh(GeometryTable::DynamicGeometry, &vertices, &indices, 1, 0);
        target.push_mesh(GeometryTable::WorldStatic, &vertices, &indices, 1, 0);

        assert!(target.prev_positions(GeometryTable::WorldStatic).is_none());

        target.update_positions(GeometryTable::DynamicGeometry, 0, &[vec3(0.0, 0.0, 1.0)]);

        let view = target.view(&[]);
        let tri = view.get_triangle(gpu::InstanceType::WorldDynamicGeometry as u32, 0);

        assert_eq!(vec3(0.0, 0.0, 1.0), tri.positions[0]);
        assert_eq!(vec3(0.0, 0.0, 0.0), tri.prev_positions[0]);

        target.settle();

        let view = target.view(&[]);
        let tri = view.get_triangle(gpu::InstanceType::WorldDynamicGeometry as u32, 0);

        assert_eq!(tri.positions, tri.prev_positions);

        target.clear(GeometryTable::DynamicGeometry);

        assert_eq!(0, target.len(GeometryTable::DynamicGeometry));
    }
}
