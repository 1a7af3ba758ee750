//! Plain-old-data records in the exact layout the compute kernel reads.
//!
//! Every record is `#[repr(C)]` and built from 4-byte scalars only, so the
//! structured buffers can be uploaded as raw bytes. Vectors are packed as
//! `[f32; 3]` followed by one scalar, matching 16-byte shader alignment.

use bytemuck::{ Pod, Zeroable };

use crate::camera::Camera;
use crate::consts::NO_PARTITION;
use crate::geometry::{ Plane, Sphere, Triangle, Vertex };
use crate::light::PointLight;
use crate::octree::OctNode;
use crate::scene::MeshIndex;

/// One triangle corner (48 bytes). The texture coordinate is split across
/// the padding slots of position and normal.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub tex_u: f32,
    pub normal: [f32; 3],
    pub tex_v: f32,
    pub tangent: [f32; 3],
    pub handedness: f32,
}

/// Triangle primitive for GPU storage (144 bytes).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuTriangle {
    pub vertices: [GpuVertex; 3],
}

/// Octree node (32 bytes). `lower..upper` indexes the triangle buffer.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuOctNode {
    pub center: [f32; 3],
    pub lower: u32,
    pub half_extents: [f32; 3],
    pub upper: u32,
}

/// Per-mesh entry (16 bytes).
///
/// `root_partition` is the node index of the mesh's octree root and
/// `partition_count` its node count; both are -1 for a mesh without an
/// octree, whose range is scanned linearly.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMeshIndex {
    pub lower: u32,
    pub upper: u32,
    pub root_partition: i32,
    pub partition_count: i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub center: [f32; 3],
    pub radius: f32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPlane {
    pub normal: [f32; 3],
    pub distance: f32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    pub position: [f32; 3],
    pub range: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Per-dispatch counts (32 bytes).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ComputeConstants {
    pub sphere_count: u32,
    pub plane_count: u32,
    pub triangle_count: u32,
    pub point_light_count: u32,
    pub mesh_count: u32,
    pub bounce_count: u32,
    pub _pad: [u32; 2],
}

/// Camera constants (80 bytes).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuCamera {
    pub position: [f32; 3],
    pub field_of_view: f32,
    pub direction: [f32; 3],
    pub aspect_ratio: f32,
    pub right: [f32; 3],
    pub near: f32,
    pub up: [f32; 3],
    pub far: f32,
    pub width: u32,
    pub height: u32,
    pub _pad: [u32; 2],
}

impl From<&Vertex> for GpuVertex {
    fn from(v: &Vertex) -> GpuVertex {
        GpuVertex {
            position: v.position.to_array(),
            tex_u: v.texcoord.x,
            normal: v.normal.to_array(),
            tex_v: v.texcoord.y,
            tangent: v.tangent.to_array(),
            handedness: v.handedness,
        }
    }
}

impl From<&Triangle> for GpuTriangle {
    fn from(t: &Triangle) -> GpuTriangle {
        GpuTriangle {
            vertices: [(&t.v1).into(), (&t.v2).into(), (&t.v3).into()],
        }
    }
}

impl From<&OctNode> for GpuOctNode {
    fn from(n: &OctNode) -> GpuOctNode {
        GpuOctNode {
            center: n.center.to_array(),
            lower: n.lower,
            half_extents: n.half_extents.to_array(),
            upper: n.upper,
        }
    }
}

impl From<&MeshIndex> for GpuMeshIndex {
    fn from(m: &MeshIndex) -> GpuMeshIndex {
        let (root_partition, partition_count) = match m.partition {
            Some(p) => (p.root as i32, p.count as i32),
            None => (NO_PARTITION, NO_PARTITION),
        };

        GpuMeshIndex {
            lower: m.lower,
            upper: m.upper,
            root_partition,
            partition_count,
        }
    }
}

impl From<&Sphere> for GpuSphere {
    fn from(s: &Sphere) -> GpuSphere {
        GpuSphere { center: s.center.to_array(), radius: s.radius }
    }
}

impl From<&Plane> for GpuPlane {
    fn from(p: &Plane) -> GpuPlane {
        GpuPlane { normal: p.normal.to_array(), distance: p.distance }
    }
}

impl From<&PointLight> for GpuPointLight {
    fn from(l: &PointLight) -> GpuPointLight {
        GpuPointLight {
            position: l.position.to_array(),
            range: l.range,
            color: l.color.to_array(),
            intensity: l.intensity,
        }
    }
}

impl GpuCamera {
    pub fn new(camera: &Camera, width: u32, height: u32) -> GpuCamera {
        GpuCamera {
            position: camera.position.to_array(),
            field_of_view: camera.field_of_view,
            direction: camera.forward.to_array(),
            aspect_ratio: camera.aspect_ratio,
            right: camera.right().to_array(),
            near: camera.near,
            up: camera.view_up().to_array(),
            far: camera.far,
            width,
            height,
            _pad: [0; 2],
        }
    }
}

/// Complete scene data ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneBuffers {
    pub spheres: Vec<GpuSphere>,
    pub planes: Vec<GpuPlane>,
    pub point_lights: Vec<GpuPointLight>,
    pub triangles: Vec<GpuTriangle>,
    pub oct_nodes: Vec<GpuOctNode>,
    pub meshes: Vec<GpuMeshIndex>,
    pub constants: ComputeConstants,
    pub camera: GpuCamera,
}

impl SceneBuffers {
    pub fn spheres_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.spheres)
    }

    pub fn planes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.planes)
    }

    pub fn point_lights_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.point_lights)
    }

    pub fn triangles_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }

    pub fn oct_nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.oct_nodes)
    }

    pub fn meshes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.meshes)
    }

    pub fn constants_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.constants)
    }

    pub fn camera_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.camera)
    }

    /// Every buffer as `(name, bytes)`, in binding order.
    pub fn named_bytes(&self) -> [(&'static str, &[u8]); 8] {
        [
            ("camera", self.camera_bytes()),
            ("constants", self.constants_bytes()),
            ("spheres", self.spheres_bytes()),
            ("triangles", self.triangles_bytes()),
            ("planes", self.planes_bytes()),
            ("point_lights", self.point_lights_bytes()),
            ("oct_nodes", self.oct_nodes_bytes()),
            ("meshes", self.meshes_bytes()),
        ]
    }
}

#[test]
fn record_sizes_match_kernel() {
    use std::mem::size_of;

    assert_eq!(size_of::<GpuVertex>(), 48);
    assert_eq!(size_of::<GpuTriangle>(), 144);
    assert_eq!(size_of::<GpuOctNode>(), 32);
    assert_eq!(size_of::<GpuMeshIndex>(), 16);
    assert_eq!(size_of::<GpuSphere>(), 16);
    assert_eq!(size_of::<GpuPlane>(), 16);
    assert_eq!(size_of::<GpuPointLight>(), 32);
    assert_eq!(size_of::<ComputeConstants>(), 32);
    assert_eq!(size_of::<GpuCamera>(), 80);
}

#[test]
fn vertex_packs_texcoord_into_padding() {
    use crate::tuple::{ Tuple2D, Tuple3D };

    let mut v = Vertex::new(
        Tuple3D::new(1.0, 2.0, 3.0),
        Tuple2D::new(0.25, 0.75),
        Tuple3D::new(0.0, 0.0, 1.0),
    );
    v.tangent = Tuple3D::new(1.0, 0.0, 0.0);
    v.handedness = -1.0;

    let floats: [f32; 12] = bytemuck::cast(GpuVertex::from(&v));
    assert_eq!(floats,
        [1.0, 2.0, 3.0, 0.25, 0.0, 0.0, 1.0, 0.75, 1.0, 0.0, 0.0, -1.0]);
}

#[test]
fn unpartitioned_mesh_uses_sentinel() {
    use crate::scene::Partition;

    let linear = MeshIndex { lower: 4, upper: 16, partition: None };
    let tree = MeshIndex {
        lower: 16,
        upper: 28,
        partition: Some(Partition { root: 9, count: 73, depth: 2 }),
    };

    assert_eq!(GpuMeshIndex::from(&linear), GpuMeshIndex {
        lower: 4,
        upper: 16,
        root_partition: -1,
        partition_count: -1,
    });
    assert_eq!(GpuMeshIndex::from(&tree).root_partition, 9);
    assert_eq!(GpuMeshIndex::from(&tree).partition_count, 73);
}

#[test]
fn node_bytes_follow_field_order() {
    use crate::tuple::Tuple3D;

    let mut node = OctNode::new(Tuple3D::new(1.0, 2.0, 3.0),
        Tuple3D::splat(0.5));
    node.lower = 7;
    node.upper = 11;

    let buffers = SceneBuffers {
        oct_nodes: vec![(&node).into()],
        ..Default::default()
    };
    let words: &[u32] = bytemuck::cast_slice(buffers.oct_nodes_bytes());

    assert_eq!(words[0], 1.0f32.to_bits());
    assert_eq!(words[3], 7);
    assert_eq!(words[7], 11);
}
