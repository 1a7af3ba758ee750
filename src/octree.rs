//! Fixed-depth octree partitioning of a triangle mesh.
//!
//! The tree is a complete 8-ary tree stored in a flat array:
//!
//! ```text
//!   [A][AA][AB][AC][AD][AE][AF][AG][AH][AAA][AAB][AAC] ... [ABA][ABB] ...
//!    0  1   2   3   4   5   6   7   8   9    10   11        17   18
//! ```
//!
//! The root is at index 0 and child `c` (0..8) of node `i` is at
//! `8 * i + c + 1`. The GPU consumer walks the array with the same arithmetic,
//! so nothing about this layout may change without changing the kernel.
//!
//! Partitioning assigns every triangle to the deepest node whose box fully
//! contains it, then reorders the triangle array so that each node owns one
//! contiguous `[lower, upper)` range.

use std::convert::TryFrom;
use std::ops::Range;

use log::debug;

use crate::consts::OCTREE_BRANCHING;
use crate::error::OctreeError;
use crate::geometry::{ Bounds, Triangle };
use crate::ray::Ray;
use crate::tuple::Tuple3D;

/// One axis-aligned box of the octree, plus the triangles it owns.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OctNode {
    pub center: Tuple3D,
    pub half_extents: Tuple3D,

    /// First triangle owned by this node, in the reordered triangle array.
    pub lower: u32,

    /// One past the last triangle owned by this node.
    pub upper: u32,
}

impl OctNode {
    pub fn new(center: Tuple3D, half_extents: Tuple3D) -> OctNode {
        OctNode { center, half_extents, lower: 0, upper: 0 }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            minimum: self.center - self.half_extents,
            maximum: self.center + self.half_extents,
        }
    }

    /// Whether all three vertices of `triangle` lie in the box, boundary
    /// included.
    pub fn contains_triangle(&self, triangle: &Triangle) -> bool {
        let bounds = self.bounds();
        triangle.positions().iter().all(|p| bounds.contains(p))
    }

    pub fn range(&self) -> Range<u32> {
        self.lower..self.upper
    }

    pub fn len(&self) -> usize {
        (self.upper - self.lower) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.upper == self.lower
    }
}

/// Number of nodes in a complete octree of the given depth.
///
/// This is `8^0 + 8^1 + ... + 8^depth`; depth 0 is a lone root. Saturates at
/// `usize::MAX` for depths that cannot be stored anyway.
pub fn node_count(depth: u32) -> usize {
    (0..=depth).fold(0usize, |count, level| {
        count.saturating_add(OCTREE_BRANCHING.saturating_pow(level))
    })
}

/// Index of child `octant` (0..8) of the node at `parent`.
pub fn child_index(parent: usize, octant: usize) -> usize {
    debug_assert!(octant < OCTREE_BRANCHING);
    OCTREE_BRANCHING * parent + octant + 1
}

/// Index of the parent of the node at `child`; the root has none.
pub fn parent_index(child: usize) -> Option<usize> {
    if child == 0 {
        None
    } else {
        Some((child - 1) / OCTREE_BRANCHING)
    }
}

/// Direction of the child box `octant` from its parent's center.
///
/// X is negative for even octants, Y is positive for octants 0 to 3, and Z
/// is positive when `octant % 4 < 2`. Every sign combination appears exactly
/// once.
pub fn octant_signs(octant: usize) -> Tuple3D {
    let x = if octant % 2 == 0 { -1.0 } else { 1.0 };
    let y = if octant < 4 { 1.0 } else { -1.0 };
    let z = if octant % 4 < 2 { 1.0 } else { -1.0 };

    Tuple3D::new(x, y, z)
}

/// Fills in the box of `index` and, recursively, all of its descendants
/// that fit in `nodes`.
fn build_tree(nodes: &mut [OctNode], index: usize, center: Tuple3D,
    half_extents: Tuple3D) {
    if index >= nodes.len() {
        return;
    }

    nodes[index] = OctNode::new(center, half_extents);

    let child_half = half_extents * 0.5;
    for octant in 0..OCTREE_BRANCHING {
        let signs = octant_signs(octant);
        let offset = Tuple3D::new(
            signs.x * child_half.x,
            signs.y * child_half.y,
            signs.z * child_half.z,
        );

        build_tree(nodes, child_index(index, octant), center + offset,
            child_half);
    }
}

/// Half-extent of one axis such that `center ± half` covers `[min, max]`
/// even after float rounding.
fn covering_half_extent(center: f32, min: f32, max: f32) -> f32 {
    let mut half = (max - min) * 0.5;
    let step = center.abs().max(half).max(f32::MIN_POSITIVE) * f32::EPSILON;

    while center - half > min || center + half < max {
        half += step;
    }

    half
}

/// A partitioned mesh: the node array and where its ranges point.
#[derive(Clone, Debug, PartialEq)]
pub struct Octree {
    /// Nodes in addressing order; the root is `nodes[0]`.
    pub nodes: Vec<OctNode>,

    pub depth: u32,

    /// The volume the root box was built from.
    pub bounds: Bounds,

    /// Added to every node range; the position of the mesh's first triangle
    /// in a shared triangle buffer.
    pub index_offset: u32,
}

/// Builds an octree of the given depth over `triangles` and reorders them in
/// place so that each node owns a contiguous range.
///
/// `index_offset` is added to every range, so the ranges can point into a
/// larger buffer that `triangles` is a window of. `max_nodes` is the number of
/// node slots the caller has left; if the tree does not fit, nothing is
/// touched.
pub fn partition_mesh(triangles: &mut [Triangle], index_offset: u32,
    depth: u32, max_nodes: usize) -> Result<Octree, OctreeError> {
    let bounds = Bounds::of_triangles(triangles);
    partition_in_bounds(triangles, bounds, index_offset, depth, max_nodes)
}

/// Like `partition_mesh`, but with an explicit root volume.
///
/// The root box is centered on `bounds` with true per-axis half-extents. A
/// triangle outside `bounds` ends up in no node; this is reported as
/// `OctreeError::Unclaimed` and `triangles` is left untouched. Bounds with no
/// finite extent (all vertices NaN) contain nothing, so every triangle is
/// unclaimed.
pub fn partition_in_bounds(triangles: &mut [Triangle], bounds: Bounds,
    index_offset: u32, depth: u32, max_nodes: usize)
    -> Result<Octree, OctreeError> {
    let required = node_count(depth);
    if required > max_nodes {
        return Err(OctreeError::NodeCapacity {
            depth,
            required,
            available: max_nodes,
        });
    }

    if triangles.is_empty() {
        return Err(OctreeError::EmptyMesh);
    }

    // Every range bound has to fit in a u32, up to `index_offset + len`.
    let end = u32::try_from(triangles.len()).ok()
        .and_then(|len| index_offset.checked_add(len));
    if end.is_none() {
        return Err(OctreeError::IndexOverflow {
            index_offset,
            triangles: triangles.len(),
        });
    }

    // Bounds grown only from NaN vertices stay empty and contain nothing.
    if bounds.is_empty() {
        return Err(OctreeError::Unclaimed { count: triangles.len() });
    }

    let center = bounds.center();
    let half_extents = Tuple3D::new(
        covering_half_extent(center.x, bounds.minimum.x, bounds.maximum.x),
        covering_half_extent(center.y, bounds.minimum.y, bounds.maximum.y),
        covering_half_extent(center.z, bounds.minimum.z, bounds.maximum.z),
    );

    let mut nodes = vec![OctNode::default(); required];
    build_tree(&mut nodes, 0, center, half_extents);

    // Deepest nodes come last in the array. Walking backwards lets every
    // node claim its triangles before any of its ancestors get a look.
    let mut taken = vec![false; triangles.len()];
    let mut reordered = Vec::with_capacity(triangles.len());
    for node in nodes.iter_mut().rev() {
        let lower = reordered.len();

        for (triangle, claimed) in triangles.iter().zip(taken.iter_mut()) {
            if !*claimed && node.contains_triangle(triangle) {
                *claimed = true;
                reordered.push(*triangle);
            }
        }

        // Both are at most `triangles.len()`, checked above.
        node.lower = index_offset + lower as u32;
        node.upper = index_offset + reordered.len() as u32;
    }

    if reordered.len() != triangles.len() {
        return Err(OctreeError::Unclaimed {
            count: triangles.len() - reordered.len(),
        });
    }

    triangles.copy_from_slice(&reordered);

    debug!("Partitioned {} triangles into {} nodes (depth {}), {} in the root.",
        triangles.len(), nodes.len(), depth, nodes[0].len());

    Ok(Octree { nodes, depth, bounds, index_offset })
}

impl Octree {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of triangles owned by all nodes.
    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().map(OctNode::len).sum()
    }

    /// The index range of the whole mesh in the triangle buffer.
    pub fn triangle_range(&self) -> Range<u32> {
        self.index_offset..self.index_offset + self.triangle_count() as u32
    }

    /// The node owning the triangle at `index` (an index into the shared
    /// buffer, offset included).
    pub fn node_of(&self, index: u32) -> Option<usize> {
        self.nodes.iter().position(|node| node.range().contains(&index))
    }

    /// Checks the partition invariants against the reordered `triangles`.
    ///
    /// `triangles` is the mesh window the tree was built over. Every triangle
    /// must be owned by exactly one node, be fully contained by that node,
    /// and not fit entirely inside any child of that node.
    pub fn validate(&self, triangles: &[Triangle]) -> Result<(), OctreeError> {
        let mut owners = vec![0usize; triangles.len()];

        for (node_index, node) in self.nodes.iter().enumerate() {
            for index in node.range() {
                let local = index.checked_sub(self.index_offset)
                    .map(|i| i as usize)
                    .filter(|&i| i < triangles.len())
                    .ok_or(OctreeError::BrokenCoverage { index: index as usize })?;

                owners[local] += 1;

                let triangle = &triangles[local];
                if !node.contains_triangle(triangle) {
                    return Err(OctreeError::NotContained {
                        triangle: local,
                        node: node_index,
                    });
                }

                for octant in 0..OCTREE_BRANCHING {
                    let child = child_index(node_index, octant);
                    let fits = self.nodes.get(child)
                        .map_or(false, |c| c.contains_triangle(triangle));

                    if fits {
                        return Err(OctreeError::NotDeepest {
                            triangle: local,
                            node: node_index,
                            child,
                        });
                    }
                }
            }
        }

        match owners.iter().position(|&count| count != 1) {
            Some(index) => Err(OctreeError::BrokenCoverage { index }),
            None => Ok(()),
        }
    }

    /// Collects the triangle ranges a ray has to test, the way the compute
    /// kernel walks the tree.
    ///
    /// Subtrees whose box the ray misses are skipped entirely. Only non-empty
    /// ranges are returned.
    pub fn traverse(&self, ray: &Ray) -> Vec<Range<u32>> {
        let mut ranges = Vec::new();
        let mut stack = vec![0];

        while let Some(index) = stack.pop() {
            let node = match self.nodes.get(index) {
                Some(node) => node,
                None => continue,
            };

            if ray.intersect_bounds(&node.bounds()).is_none() {
                continue;
            }

            if !node.is_empty() {
                ranges.push(node.range());
            }

            for octant in 0..OCTREE_BRANCHING {
                stack.push(child_index(index, octant));
            }
        }

        ranges
    }
}

/* Tests */

#[cfg(test)]
fn tri(p1: (f32, f32, f32), p2: (f32, f32, f32), p3: (f32, f32, f32))
    -> Triangle {
    Triangle::from_positions(
        Tuple3D::new(p1.0, p1.1, p1.2),
        Tuple3D::new(p2.0, p2.1, p2.2),
        Tuple3D::new(p3.0, p3.1, p3.2),
    )
}

/// A deterministic scatter of small and large triangles in `[-4, 4]^3`.
#[cfg(test)]
fn scattered_triangles(count: usize) -> Vec<Triangle> {
    let mut state: u32 = 0x2545_f491;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        (state as f32 / u32::MAX as f32) * 8.0 - 4.0
    };

    (0..count).map(|i| {
        let corner = (next(), next(), next());
        let size = if i % 3 == 0 { 2.0 } else { 0.1 };
        let offset = |c: (f32, f32, f32), dx: f32, dy: f32, dz: f32| {
            ((c.0 + dx).min(4.0), (c.1 + dy).min(4.0), (c.2 + dz).min(4.0))
        };

        tri(
            corner,
            offset(corner, size, 0.0, 0.0),
            offset(corner, 0.0, size, size),
        )
    }).collect()
}

#[test]
fn node_count_formula() {
    assert_eq!(node_count(0), 1);
    assert_eq!(node_count(1), 9);
    assert_eq!(node_count(2), 73);
    assert_eq!(node_count(3), 585);
    assert_eq!(node_count(64), usize::MAX);
}

#[test]
fn child_addressing() {
    let root_children: Vec<usize> = (0..8).map(|c| child_index(0, c)).collect();
    assert_eq!(root_children, (1..=8).collect::<Vec<_>>());

    let first_children: Vec<usize> = (0..8).map(|c| child_index(1, c)).collect();
    assert_eq!(first_children, (9..=16).collect::<Vec<_>>());

    assert_eq!(parent_index(0), None);
    for node in 1..node_count(2) {
        let parent = parent_index(node).unwrap();
        assert!((0..8).any(|c| child_index(parent, c) == node));
    }
}

#[test]
fn octant_signs_are_a_bijection() {
    let mut seen: Vec<(i32, i32, i32)> = (0..8).map(|c| {
        let s = octant_signs(c);
        (s.x as i32, s.y as i32, s.z as i32)
    }).collect();

    assert_eq!(seen[0], (-1, 1, 1));
    assert_eq!(seen[1], (1, 1, 1));
    assert_eq!(seen[2], (-1, 1, -1));
    assert_eq!(seen[7], (1, -1, -1));

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 8);
}

#[test]
fn children_tile_their_parent() {
    let mut nodes = vec![OctNode::default(); node_count(2)];
    build_tree(&mut nodes, 0, Tuple3D::new(1.0, -2.0, 3.0),
        Tuple3D::new(4.0, 2.0, 1.0));

    for parent in 0..node_count(1) {
        let p = nodes[parent];
        let mut union = Bounds::empty();
        let mut volume = 0.0;

        for octant in 0..8 {
            let c = nodes[child_index(parent, octant)];
            assert_eq!(c.half_extents, p.half_extents * 0.5);

            let b = c.bounds();
            union.grow(b.minimum);
            union.grow(b.maximum);
            volume += 8.0 * c.half_extents.x * c.half_extents.y
                * c.half_extents.z;
        }

        // Same outer box and same volume means no gaps and no overlap.
        assert_eq!(union, p.bounds());
        assert!(crate::feq(volume,
            8.0 * p.half_extents.x * p.half_extents.y * p.half_extents.z));
    }
}

#[test]
fn partition_unit_cube() {
    let mut obj_parser = crate::obj::ObjParser::new("./models/cube.obj");
    obj_parser.parse().unwrap();
    let mut triangles = obj_parser.triangles().unwrap();

    let octree = partition_mesh(&mut triangles, 0, 1, 9).unwrap();

    assert_eq!(octree.node_count(), 9);
    assert_eq!(octree.triangle_count(), 12);
    octree.validate(&triangles).unwrap();

    // Every face spans the cube, so nothing fits in an octant.
    assert_eq!(octree.nodes[0].range(), 0..12);

    let root = octree.nodes[0];
    assert_eq!(root.center, Tuple3D::ZERO);
    assert_eq!(root.half_extents, Tuple3D::splat(1.0));

    for octant in 0..8 {
        let child = octree.nodes[child_index(0, octant)];
        assert_eq!(child.center, octant_signs(octant) * 0.5);
        assert_eq!(child.half_extents, Tuple3D::splat(0.5));
        assert!(child.is_empty());
    }
}

#[test]
fn triangles_go_to_the_deepest_containing_node() {
    let mut triangles = vec![
        // Spans the whole volume; only the root holds it.
        tri((-4.0, -4.0, -4.0), (4.0, 4.0, 4.0), (4.0, -4.0, 4.0)),
        // Inside octant 1 (+x, +y, +z) at depth 1, but crosses depth-2 cells.
        tri((0.5, 0.5, 0.5), (3.5, 3.5, 3.5), (3.5, 0.5, 0.5)),
        // Inside one depth-2 cell of octant 6 (-x, -y, -z).
        tri((-3.5, -3.5, -3.5), (-3.0, -3.5, -3.0), (-3.0, -3.0, -3.5)),
    ];

    let octree = partition_mesh(&mut triangles, 0, 2, 73).unwrap();
    octree.validate(&triangles).unwrap();

    let root = 0;
    let octant1 = child_index(0, 1);
    let deep = child_index(child_index(0, 6), 6);

    assert_eq!(octree.nodes[root].len(), 1);
    assert_eq!(octree.nodes[octant1].len(), 1);
    assert_eq!(octree.nodes[deep].len(), 1);

    // Nodes are filled from the back of the array, so the deep triangle comes
    // first and the root's last.
    assert_eq!(octree.node_of(0), Some(deep));
    assert_eq!(octree.node_of(1), Some(octant1));
    assert_eq!(octree.node_of(2), Some(root));
    assert!(crate::feq(triangles[2].v2.position.x, 4.0));
}

#[test]
fn partition_is_total_and_disjoint() {
    let mut triangles = scattered_triangles(500);

    for depth in 0..=3 {
        let octree = partition_mesh(&mut triangles, 0, depth, 585).unwrap();

        assert_eq!(octree.triangle_count(), 500);
        octree.validate(&triangles).unwrap();
    }
}

#[test]
fn ranges_include_index_offset() {
    let mut triangles = scattered_triangles(40);
    let octree = partition_mesh(&mut triangles, 1000, 1, 9).unwrap();

    assert_eq!(octree.triangle_range(), 1000..1040);
    assert_eq!(octree.nodes.last().unwrap().lower, 1000);
    assert_eq!(octree.nodes[0].upper, 1040);
    assert!(octree.nodes.iter().all(|n| n.lower >= 1000 && n.upper <= 1040));
    octree.validate(&triangles).unwrap();
}

#[test]
fn repartitioning_is_idempotent() {
    let mut triangles = scattered_triangles(200);
    let first = partition_mesh(&mut triangles, 0, 2, 73).unwrap();
    let once: Vec<[Tuple3D; 3]> = triangles.iter().map(|t| t.positions()).collect();

    let second = partition_in_bounds(&mut triangles, first.bounds, 0, 2, 73)
        .unwrap();
    let twice: Vec<[Tuple3D; 3]> = triangles.iter().map(|t| t.positions()).collect();

    assert_eq!(once, twice);
    assert_eq!(first, second);
}

#[test]
fn node_capacity_fails_before_mutation() {
    let mut triangles = scattered_triangles(10);
    let before = triangles.clone();

    assert_eq!(
        partition_mesh(&mut triangles, 0, 2, 72),
        Err(OctreeError::NodeCapacity { depth: 2, required: 73, available: 72 })
    );
    assert_eq!(triangles, before);
}

#[test]
fn empty_mesh_is_rejected() {
    assert_eq!(partition_mesh(&mut [], 0, 1, 9), Err(OctreeError::EmptyMesh));
}

#[test]
fn unclaimed_triangles_are_reported() {
    let mut triangles = vec![
        tri((0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)),
        tri((0.0, 0.0, 0.0), (f32::NAN, 0.0, 0.0), (0.0, 1.0, 0.0)),
    ];
    let before = triangles.clone();

    assert_eq!(
        partition_mesh(&mut triangles, 0, 1, 9),
        Err(OctreeError::Unclaimed { count: 1 })
    );
    assert_eq!(triangles[0], before[0]);

    let outside = Bounds::new(0.0, 0.0, 0.0, 0.5, 0.5, 0.5);
    let mut small = vec![before[0]];
    assert_eq!(
        partition_in_bounds(&mut small, outside, 0, 0, 1),
        Err(OctreeError::Unclaimed { count: 1 })
    );
}

#[test]
fn all_nan_mesh_is_unclaimed_not_empty() {
    let nan = f32::NAN;
    let mut triangles = vec![
        tri((nan, 0.0, 0.0), (nan, 0.0, 0.0), (nan, 0.0, 0.0)),
        tri((nan, nan, nan), (nan, nan, nan), (nan, nan, nan)),
    ];

    assert_eq!(
        partition_mesh(&mut triangles, 0, 1, 9),
        Err(OctreeError::Unclaimed { count: 2 })
    );
}

#[test]
fn index_offset_overflow_is_rejected() {
    let mut triangles = scattered_triangles(4);
    let before = triangles.clone();

    assert_eq!(
        partition_mesh(&mut triangles, u32::MAX - 1, 0, 1),
        Err(OctreeError::IndexOverflow {
            index_offset: u32::MAX - 1,
            triangles: 4,
        })
    );
    assert_eq!(triangles, before);

    // The last range may end exactly at u32::MAX.
    let octree = partition_mesh(&mut triangles, u32::MAX - 4, 0, 1).unwrap();
    assert_eq!(octree.nodes[0].range(), u32::MAX - 4..u32::MAX);
}

#[test]
fn root_uses_true_z_extent() {
    // Flat in Y, deep in Z: a Y-derived Z extent would leave these unclaimed.
    let mut triangles = vec![
        tri((-1.0, 0.0, -10.0), (1.0, 0.0, -10.0), (0.0, 0.0, 10.0)),
        tri((-1.0, 0.0, 9.0), (-0.5, 0.0, 9.0), (-0.5, 0.0, 9.5)),
    ];

    let octree = partition_mesh(&mut triangles, 0, 1, 9).unwrap();
    let root = octree.nodes[0];

    assert_eq!(root.half_extents, Tuple3D::new(1.0, 0.0, 10.0));
    octree.validate(&triangles).unwrap();
}

#[test]
fn root_covers_awkward_bounds() {
    let mut triangles = vec![
        tri((0.1, 0.2, 0.3), (0.7, 0.9, 1.3), (100.3, 0.2, 0.3)),
        tri((-3.3, 1e-7, 7.77), (0.1, 0.2, 0.3), (0.7, 0.9, 1.3)),
    ];

    let octree = partition_mesh(&mut triangles, 0, 2, 73).unwrap();
    octree.validate(&triangles).unwrap();
}

#[test]
fn traversal_finds_hit_triangles() {
    let mut triangles = scattered_triangles(300);
    let octree = partition_mesh(&mut triangles, 0, 2, 73).unwrap();
    let origin = Tuple3D::new(0.3, 9.0, -0.2);

    for (index, triangle) in triangles.iter().enumerate() {
        let direction = (triangle.centroid() - origin).normalize();
        let ranges = octree.traverse(&Ray::new(origin, direction));

        assert!(ranges.iter().any(|r| r.contains(&(index as u32))),
            "triangle {} not reached by traversal", index);
    }
}

#[test]
fn traversal_skips_missed_subtrees() {
    let mut triangles = scattered_triangles(100);
    let octree = partition_mesh(&mut triangles, 0, 2, 73).unwrap();

    let away = Ray::new(Tuple3D::new(0.0, 10.0, 0.0), Tuple3D::new(0.0, 1.0, 0.0));
    assert!(octree.traverse(&away).is_empty());

    // A ray through one corner of the volume sees fewer triangles than the
    // whole mesh.
    let corner = Ray::new(Tuple3D::new(-3.9, -3.9, -10.0),
        Tuple3D::new(0.0, 0.0, 1.0));
    let seen: usize = octree.traverse(&corner).iter()
        .map(|r| (r.end - r.start) as usize)
        .sum();
    assert!(seen < triangles.len());
}
