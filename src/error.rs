//! Error types for mesh loading, octree partitioning and scene assembly.

use std::path::PathBuf;
use thiserror::Error;

/// A bounded buffer could not take more elements.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("buffer capacity exceeded: requested {requested}, available {available}")]
pub struct BufferError {
    pub requested: usize,
    pub available: usize,
}

/// Errors produced while reading an OBJ mesh.
#[derive(Error, Debug)]
pub enum ObjError {
    /// Only `.obj` files are accepted.
    #[error("not an OBJ file: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record is missing values or has values that are not numbers.
    #[error("line {line}: malformed `{record}` record: {reason}")]
    MalformedRecord {
        line: usize,
        record: String,
        reason: String,
    },

    /// Faces must be triangles.
    #[error("line {line}: face has {corners} corners, only triangles are supported")]
    UnsupportedFace { line: usize, corners: usize },

    /// A face references a position, texcoord or normal that does not exist.
    #[error("line {line}: {kind} index {index} out of range (count: {count})")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: usize,
        count: usize,
    },

    /// The mesh has more triangles than the caller allows.
    #[error("mesh has {triangles} triangles, at most {max} allowed")]
    Capacity { triangles: usize, max: usize },

    /// The mesh fits the caller's limit but not the space left in the
    /// output buffer.
    #[error("mesh has {triangles} triangles, output buffer has room for {available}")]
    BufferFull { triangles: usize, available: usize },
}

impl From<BufferError> for ObjError {
    fn from(err: BufferError) -> ObjError {
        ObjError::BufferFull {
            triangles: err.requested,
            available: err.available,
        }
    }
}

/// Errors produced while partitioning a mesh into an octree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OctreeError {
    #[error("cannot partition an empty mesh")]
    EmptyMesh,

    /// The tree for the requested depth does not fit in the node buffer.
    #[error("octree of depth {depth} needs {required} nodes, {available} available")]
    NodeCapacity {
        depth: u32,
        required: usize,
        available: usize,
    },

    /// Some triangles were not contained by any node, not even the root.
    #[error("{count} triangles not contained by any octree node")]
    Unclaimed { count: usize },

    /// A finished partition does not cover the triangle range exactly once.
    #[error("octree ranges do not cover triangle {index} exactly once")]
    BrokenCoverage { index: usize },

    /// A triangle lies in a node that does not fully contain it.
    #[error("triangle {triangle} assigned to node {node} that does not contain it")]
    NotContained { triangle: usize, node: usize },

    /// A triangle sits in a node although one of its children contains it.
    #[error("triangle {triangle} assigned to node {node} but fits in child {child}")]
    NotDeepest {
        triangle: usize,
        node: usize,
        child: usize,
    },

    /// Node ranges starting at `index_offset` would not fit in a u32.
    #[error("{triangles} triangles at offset {index_offset} overflow u32 indices")]
    IndexOverflow { index_offset: u32, triangles: usize },
}

/// Errors produced while assembling a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scene description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mesh {path}: {source}")]
    Mesh {
        path: PathBuf,
        #[source]
        source: ObjError,
    },

    #[error(transparent)]
    Octree(#[from] OctreeError),

    #[error("too many {what}: {source}")]
    Capacity {
        what: &'static str,
        #[source]
        source: BufferError,
    },
}

impl SceneError {
    /// Whether the failure came from a full buffer rather than bad data.
    ///
    /// Capacity failures can be retried with a smaller mesh or octree depth.
    pub fn is_capacity(&self) -> bool {
        match self {
            SceneError::Capacity { .. } => true,
            SceneError::Octree(OctreeError::NodeCapacity { .. }) => true,
            SceneError::Mesh { source: ObjError::Capacity { .. }, .. } => true,
            SceneError::Mesh { source: ObjError::BufferFull { .. }, .. } => true,
            _ => false,
        }
    }
}

#[test]
fn capacity_errors_are_recoverable() {
    let full = SceneError::Capacity {
        what: "spheres",
        source: BufferError { requested: 1, available: 0 },
    };
    let nodes = SceneError::Octree(OctreeError::NodeCapacity {
        depth: 3,
        required: 585,
        available: 9,
    });
    let broken = SceneError::Octree(OctreeError::Unclaimed { count: 2 });

    assert!(full.is_capacity());
    assert!(nodes.is_capacity());
    assert!(!broken.is_capacity());
}

#[test]
fn buffer_error_converts_to_buffer_full() {
    let err: ObjError = BufferError { requested: 12, available: 4 }.into();

    assert_eq!(err.to_string(),
        "mesh has 12 triangles, output buffer has room for 4");
    match err {
        ObjError::BufferFull { triangles, available } => {
            assert_eq!(triangles, 12);
            assert_eq!(available, 4);
        },
        other => panic!("unexpected error {:?}", other),
    }

    let mesh = SceneError::Mesh {
        path: PathBuf::from("big.obj"),
        source: BufferError { requested: 12, available: 4 }.into(),
    };
    assert!(mesh.is_capacity());
}
