pub mod consts;
pub mod error;

pub mod tuple;
pub mod geometry;
pub mod buffer;

pub mod tangent;
pub mod obj;
pub mod octree;

pub mod ray;
pub mod camera;
pub mod light;

pub mod gpu;
pub mod scene;

use consts::FEQ_EPSILON;

/// Compares two floats with the crate-wide tolerance.
pub fn feq(left: f32, right: f32) -> bool {
    (left - right).abs() < FEQ_EPSILON
}
