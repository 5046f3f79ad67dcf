//! Bounding-volume hierarchy over the scene's triangles, standing in for the
//! top-level acceleration structure when frames are rendered on the CPU.

mod builder;

use glam::Vec3;
use log::debug;

use self::builder::build;
use crate::gpu::{self, HitPayload, Ray, RayTracer};
use crate::BoundingBox;

/// Triangle as seen by the tracer, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvhTriangle {
    pub positions: [Vec3; 3],
    pub cull_mask: u32,
    pub instance_id: u32,

    /// Primitive id, as reported in [`HitPayload::instance_prim`]
    pub instance_prim: u32,
}

impl BvhTriangle {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(self.positions)
    }

    pub fn center(&self) -> Vec3 {
        (self.positions[0] + self.positions[1] + self.positions[2]) / 3.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BvhNode {
    Internal {
        bb: BoundingBox,
        left: u32,
        right: u32,
    },

    Leaf {
        bb: BoundingBox,
        start: u32,
        count: u32,
    },
}

impl BvhNode {
    fn bb(&self) -> &BoundingBox {
        match self {
            BvhNode::Internal { bb, .. } | BvhNode::Leaf { bb, .. } => bb,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<BvhTriangle>,
}

impl Bvh {
    pub fn new(triangles: Vec<BvhTriangle>) -> Self {
        debug!("Building BVH; triangles={}", triangles.len());

        if triangles.is_empty() {
            return Default::default();
        }

        let (nodes, triangles) = build(triangles);

        Self { nodes, triangles }
    }

    /// Collects triangles of all instances, the way the hit shaders see them.
    pub fn from_scene(geometry: &gpu::GeometryView, instances: &[gpu::InstanceRecord]) -> Self {
        let view = gpu::InstancesView::new(instances);
        let mut triangles = Vec::new();

        for (instance_id, instance) in view.iter() {
            let Some(ty) = instance.ty() else {
                continue;
            };

            for prim in 0..instance.prim_count {
                let instance_prim = if ty.is_instanced() {
                    gpu::encode_instance_prim(instance.prim_offset + prim, true)
                } else {
                    gpu::encode_instance_prim(prim, false)
                };

                let hit = HitPayload {
                    barycentric: Default::default(),
                    instance_prim,
                    instance_id,
                    hit_distance: 0.0,
                };

                triangles.push(BvhTriangle {
                    positions: geometry.fetch(&view, &hit).positions,
                    cull_mask: instance.cull_mask,
                    instance_id,
                    instance_prim,
                });
            }
        }

        Self::new(triangles)
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Visits leaves whose bounds the ray enters before `t_max`, nearest
    /// first; `f` returns the new `t_max` or `None` to stop.
    fn traverse(
        &self,
        ray: &Ray,
        mut t_max: f32,
        mut f: impl FnMut(&BvhTriangle, f32) -> Option<f32>,
    ) {
        let Some(root) = self.nodes.first() else {
            return;
        };

        let inv_dir = 1.0 / ray.direction;

        if root.bb().hit(ray.origin, inv_dir, t_max).is_none() {
            return;
        }

        let mut stack = vec![0u32];

        while let Some(node_id) = stack.pop() {
            match self.nodes[node_id as usize] {
                BvhNode::Internal { left, right, .. } => {
                    let hit = |id: u32| {
                        self.nodes[id as usize]
                            .bb()
                            .hit(ray.origin, inv_dir, t_max)
                            .map(|t| (id, t))
                    };

                    match (hit(left), hit(right)) {
                        (Some(a), Some(b)) => {
                            let (near, far) = if a.1 <= b.1 { (a, b) } else { (b, a) };

                            stack.push(far.0);
                            stack.push(near.0);
                        }
                        (Some((id, _)), None) | (None, Some((id, _))) => {
                            stack.push(id);
                        }
                        (None, None) => (),
                    }
                }

                BvhNode::Leaf { bb, start, count } => {
                    if bb.hit(ray.origin, inv_dir, t_max).is_none() {
                        continue;
                    }

                    for tri in &self.triangles[start as usize..][..count as usize] {
                        match f(tri, t_max) {
                            Some(t) => t_max = t,
                            None => return,
                        }
                    }
                }
            }
        }
    }
}

impl RayTracer for Bvh {
    fn trace_closest(&self, ray: Ray, t_max: f32, cull_mask: u32) -> Option<HitPayload> {
        let mut best = None;

        self.traverse(&ray, t_max, |tri, t_max| {
            if tri.cull_mask & cull_mask != 0 {
                if let Some((t, barycentric)) = gpu::intersect_triangle(&ray, tri.positions, t_max)
                {
                    best = Some(HitPayload {
                        barycentric,
                        instance_prim: tri.instance_prim,
                        instance_id: tri.instance_id,
                        hit_distance: t,
                    });

                    return Some(t);
                }
            }

            Some(t_max)
        });

        best
    }

    fn trace_shadow(&self, ray: Ray, t_max: f32, cull_mask: u32) -> bool {
        let mut occluded = false;

        self.traverse(&ray, t_max, |tri, t_max| {
            if tri.cull_mask & cull_mask != 0
                && gpu::intersect_triangle(&ray, tri.positions, t_max).is_some()
            {
                occluded = true;
                return None;
            }

            Some(t_max)
        });

        occluded
    }
}
