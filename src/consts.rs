// Shared buffer capacities
pub const MAX_TRIANGLES: usize = 16384;
pub const MAX_OCT_NODES: usize = 4096;
pub const MAX_MESHES: usize = 16;
pub const MAX_SPHERES: usize = 10;
pub const MAX_PLANES: usize = 10;
pub const MAX_POINTLIGHTS: usize = 10;

// Octree
pub const OCTREE_BRANCHING: usize = 8;
pub const DEFAULT_OCTREE_DEPTH: u32 = 2;

// Bounce count sent to the compute kernel
pub const MAX_BOUNCES: u32 = 10;
pub const DEFAULT_BOUNCES: u32 = 1;

// Floating point comparisons
pub const FEQ_EPSILON: f32 = 0.0001;

// Sentinel for "no octree, scan the triangle range linearly"
pub const NO_PARTITION: i32 = -1;
