use crate::bvh::{BvhNode, BvhTriangle};
use crate::BoundingBox;

const BINS: usize = 12;
const MAX_LEAF_TRIANGLES: usize = 4;

/// Builds BVH using binned SAH; returns nodes (root first) and triangles
/// reordered so that each leaf refers to a contiguous range of them.
pub fn build(mut triangles: Vec<BvhTriangle>) -> (Vec<BvhNode>, Vec<BvhTriangle>) {
    let mut nodes = Vec::with_capacity(2 * triangles.len() / MAX_LEAF_TRIANGLES + 1);
    let len = triangles.len();

    balance(&mut nodes, &mut triangles, 0, len);

    (nodes, triangles)
}

fn balance(
    nodes: &mut Vec<BvhNode>,
    triangles: &mut [BvhTriangle],
    start: usize,
    end: usize,
) -> u32 {
    let node_id = nodes.len() as u32;
    let items = &mut triangles[start..end];
    let bb: BoundingBox = items.iter().map(|tri| tri.bounds()).fold(Default::default(), |a, b| a + b);

    nodes.push(BvhNode::Leaf {
        bb,
        start: start as u32,
        count: items.len() as u32,
    });

    if items.len() <= MAX_LEAF_TRIANGLES {
        return node_id;
    }

    let Some((axis, split_at)) = find_split(items, &bb) else {
        return node_id;
    };

    let mut mid = 0;

    for idx in 0..items.len() {
        if items[idx].center()[axis] < split_at {
            items.swap(idx, mid);
            mid += 1;
        }
    }

    if mid == 0 || mid == items.len() {
        return node_id;
    }

    let left = balance(nodes, triangles, start, start + mid);
    let right = balance(nodes, triangles, start + mid, end);

    nodes[node_id as usize] = BvhNode::Internal { bb, left, right };

    node_id
}

/// Returns the axis and position of the cheapest split, if splitting is
/// cheaper than keeping all triangles in a single leaf.
fn find_split(triangles: &[BvhTriangle], bb: &BoundingBox) -> Option<(usize, f32)> {
    let centers: BoundingBox = triangles.iter().map(|tri| tri.center()).collect();
    let mut best: Option<(usize, f32, f32)> = None;

    for axis in 0..3 {
        let min = centers.min()[axis];
        let extent = centers.max()[axis] - min;

        if extent <= 0.0 {
            continue;
        }

        let scale = BINS as f32 / extent;
        let mut bins = [(BoundingBox::default(), 0usize); BINS];

        for tri in triangles {
            let bin = (((tri.center()[axis] - min) * scale) as usize).min(BINS - 1);

            bins[bin].0 += tri.bounds();
            bins[bin].1 += 1;
        }

        for split in 1..BINS {
            let (left_bb, left) = bins[..split]
                .iter()
                .fold((BoundingBox::default(), 0), |(bb, n), (bin_bb, bin_n)| {
                    (bb + *bin_bb, n + bin_n)
                });

            let (right_bb, right) = bins[split..]
                .iter()
                .fold((BoundingBox::default(), 0), |(bb, n), (bin_bb, bin_n)| {
                    (bb + *bin_bb, n + bin_n)
                });

            if left == 0 || right == 0 {
                continue;
            }

            let cost = left as f32 * left_bb.half_area() + right as f32 * right_bb.half_area();

            if best.map_or(true, |(_, _, best_cost)| cost < best_cost) {
                best = Some((axis, min + split as f32 / scale, cost));
            }
        }
    }

    let (axis, split_at, cost) = best?;
    let leaf_cost = triangles.len() as f32 * bb.half_area();

    (cost < leaf_cost || triangles.len() > 4 * MAX_LEAF_TRIANGLES).then_some((axis, split_at))
}
