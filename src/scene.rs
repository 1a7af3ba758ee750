use std::fs;
use std::path::{ Path, PathBuf };

use log::{ debug, info, warn };
use serde::{ Serialize, Deserialize };

use crate::buffer::BoundedBuffer;
use crate::camera::Camera;
use crate::consts::*;
use crate::error::{ BufferError, OctreeError, SceneError };
use crate::geometry::{ Plane, Sphere, Triangle };
use crate::gpu::{ ComputeConstants, GpuCamera, SceneBuffers };
use crate::light::PointLight;
use crate::obj::load_mesh;
use crate::octree::{ partition_mesh, OctNode, Octree };

#[cfg(test)]
use crate::tuple::Tuple3D;

/// Where a mesh's octree lives in the shared node buffer.
///
/// Node indices inside the tree are local: child `c` of local node `i` is at
/// `root + 8 * i + c + 1` in the shared buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub root: u32,
    pub count: u32,
    pub depth: u32,
}

/// The triangles and (optional) octree belonging to one mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshIndex {
    pub lower: u32,
    pub upper: u32,

    /// `None` means the kernel scans `lower..upper` linearly.
    pub partition: Option<Partition>,
}

/// Everything the compute kernel draws, held in buffers with the kernel's
/// fixed capacities.
#[derive(Clone, Debug)]
pub struct Scene {
    pub camera: Camera,
    pub width: u32,
    pub height: u32,

    bounces: u32,

    spheres: BoundedBuffer<Sphere>,
    planes: BoundedBuffer<Plane>,
    point_lights: BoundedBuffer<PointLight>,
    triangles: BoundedBuffer<Triangle>,
    oct_nodes: BoundedBuffer<OctNode>,
    meshes: BoundedBuffer<MeshIndex>,
}

impl Scene {
    pub fn new(camera: Camera, width: u32, height: u32) -> Scene {
        Scene {
            camera,
            width,
            height,
            bounces: DEFAULT_BOUNCES,
            spheres: BoundedBuffer::new(MAX_SPHERES),
            planes: BoundedBuffer::new(MAX_PLANES),
            point_lights: BoundedBuffer::new(MAX_POINTLIGHTS),
            triangles: BoundedBuffer::new(MAX_TRIANGLES),
            oct_nodes: BoundedBuffer::new(MAX_OCT_NODES),
            meshes: BoundedBuffer::new(MAX_MESHES),
        }
    }

    /// Reads a JSON scene description and builds the scene.
    ///
    /// Mesh paths are resolved relative to the description's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Scene, SceneError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let description: SceneDescription = serde_json::from_str(&json)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        Scene::from_description(description, base)
    }

    /// Builds a scene from a parsed description.
    ///
    /// Anything that does not fit in its buffer is logged and left out, so a
    /// too-large mesh does not stop the rest of the scene from loading. Any
    /// other error aborts.
    pub fn from_description(description: SceneDescription, base: &Path)
        -> Result<Scene, SceneError> {
        let mut scene = Scene::new(
            description.camera.to_camera(description.width, description.height),
            description.width,
            description.height,
        );
        scene.set_bounces(description.bounces);

        for sphere in description.spheres.iter() {
            skip_if_full(scene.add_sphere(sphere.into()))?;
        }

        for plane in description.planes.iter() {
            skip_if_full(scene.add_plane(plane.into()))?;
        }

        for light in description.lights.iter() {
            skip_if_full(scene.add_point_light(light.into()))?;
        }

        for mesh in description.meshes.iter() {
            let path = base.join(&mesh.path);
            skip_if_full(scene.add_mesh(&path, mesh.octree_depth))?;
        }

        info!("Scene ready: {} spheres, {} planes, {} lights, {} meshes \
            ({} triangles, {} octree nodes).", scene.spheres.len(),
            scene.planes.len(), scene.point_lights.len(), scene.meshes.len(),
            scene.triangles.len(), scene.oct_nodes.len());

        Ok(scene)
    }

    pub fn add_sphere(&mut self, sphere: Sphere) -> Result<usize, SceneError> {
        self.spheres.push(sphere).map_err(full("spheres"))
    }

    pub fn add_plane(&mut self, plane: Plane) -> Result<usize, SceneError> {
        self.planes.push(plane).map_err(full("planes"))
    }

    pub fn add_point_light(&mut self, light: PointLight)
        -> Result<usize, SceneError> {
        self.point_lights.push(light).map_err(full("point lights"))
    }

    /// Loads an OBJ mesh into the shared triangle buffer and, if `depth` is
    /// given, partitions it into an octree of that depth.
    ///
    /// Returns the mesh's index. On error the scene is left as it was.
    pub fn add_mesh<P: AsRef<Path>>(&mut self, path: P, depth: Option<u32>)
        -> Result<usize, SceneError> {
        let path = path.as_ref();
        self.check_mesh_slot()?;

        let lower = self.triangles.len();
        load_mesh(path, &mut self.triangles, MAX_TRIANGLES)
            .map_err(|source| SceneError::Mesh {
                path: path.to_path_buf(),
                source,
            })?;

        self.index_mesh(lower, depth)
    }

    /// Appends already loaded triangles as a new mesh, partitioned like
    /// `add_mesh`.
    pub fn insert_mesh(&mut self, triangles: &[Triangle], depth: Option<u32>)
        -> Result<usize, SceneError> {
        self.check_mesh_slot()?;

        let lower = self.triangles.len();
        self.triangles.extend_from_slice(triangles).map_err(full("triangles"))?;

        self.index_mesh(lower, depth)
    }

    fn check_mesh_slot(&self) -> Result<(), SceneError> {
        if self.meshes.remaining() == 0 {
            return Err(SceneError::Capacity {
                what: "meshes",
                source: BufferError { requested: 1, available: 0 },
            });
        }

        Ok(())
    }

    /// Partitions the triangles from `lower` to the end of the buffer and
    /// records them as a mesh. Rolls the triangles and nodes back on failure.
    fn index_mesh(&mut self, lower: usize, depth: Option<u32>)
        -> Result<usize, SceneError> {
        let node_count = self.oct_nodes.len();
        let result = self.partition_tail(lower, depth)
            .and_then(|mesh| self.meshes.push(mesh).map_err(full("meshes")));

        if result.is_err() {
            self.triangles.truncate(lower);
            self.oct_nodes.truncate(node_count);
        }

        result
    }

    fn partition_tail(&mut self, lower: usize, depth: Option<u32>)
        -> Result<MeshIndex, SceneError> {
        let upper = self.triangles.len();
        let mut mesh = MeshIndex {
            lower: lower as u32,
            upper: upper as u32,
            partition: None,
        };

        let depth = match depth {
            Some(depth) => depth,
            None => {
                debug!("Mesh {}..{} has no octree.", lower, upper);
                return Ok(mesh);
            },
        };

        let octree = partition_mesh(
            &mut self.triangles.as_mut_slice()[lower..upper],
            lower as u32,
            depth,
            self.oct_nodes.remaining(),
        )?;

        let nodes = self.oct_nodes.extend_from_slice(&octree.nodes)
            .map_err(full("octree nodes"))?;

        mesh.partition = Some(Partition {
            root: nodes.start as u32,
            count: nodes.len() as u32,
            depth,
        });
        debug!("Mesh {}..{} partitioned into nodes {:?}.", lower, upper, nodes);

        Ok(mesh)
    }

    /// The octree of mesh `mesh`, rebuilt from the shared node buffer.
    pub fn mesh_octree(&self, mesh: usize) -> Option<Octree> {
        let index = self.meshes.get(mesh)?;
        let partition = index.partition?;

        let root = partition.root as usize;
        let nodes = self.oct_nodes.as_slice()
            .get(root..root + partition.count as usize)?
            .to_vec();

        Some(Octree {
            bounds: nodes.first()?.bounds(),
            nodes,
            depth: partition.depth,
            index_offset: index.lower,
        })
    }

    /// Checks every partitioned mesh with `Octree::validate`.
    pub fn validate(&self) -> Result<(), OctreeError> {
        for (i, mesh) in self.meshes.iter().enumerate() {
            if let Some(octree) = self.mesh_octree(i) {
                let triangles = &self.triangles.as_slice()
                    [mesh.lower as usize..mesh.upper as usize];
                octree.validate(triangles)?;
            }
        }

        Ok(())
    }

    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    pub fn set_bounces(&mut self, bounces: u32) {
        self.bounces = bounces.min(MAX_BOUNCES);
    }

    pub fn increase_bounces(&mut self) {
        self.set_bounces(self.bounces + 1);
    }

    pub fn decrease_bounces(&mut self) {
        self.bounces = self.bounces.saturating_sub(1);
    }

    pub fn spheres(&self) -> &[Sphere] {
        self.spheres.as_slice()
    }

    pub fn planes(&self) -> &[Plane] {
        self.planes.as_slice()
    }

    pub fn point_lights(&self) -> &[PointLight] {
        self.point_lights.as_slice()
    }

    pub fn triangles(&self) -> &[Triangle] {
        self.triangles.as_slice()
    }

    pub fn oct_nodes(&self) -> &[OctNode] {
        self.oct_nodes.as_slice()
    }

    pub fn meshes(&self) -> &[MeshIndex] {
        self.meshes.as_slice()
    }

    pub fn compute_constants(&self) -> ComputeConstants {
        ComputeConstants {
            sphere_count: self.spheres.len() as u32,
            plane_count: self.planes.len() as u32,
            triangle_count: self.triangles.len() as u32,
            point_light_count: self.point_lights.len() as u32,
            mesh_count: self.meshes.len() as u32,
            bounce_count: self.bounces,
            _pad: [0; 2],
        }
    }

    /// Packs the scene into upload-ready records.
    pub fn gpu_buffers(&self) -> SceneBuffers {
        SceneBuffers {
            spheres: self.spheres.iter().map(Into::into).collect(),
            planes: self.planes.iter().map(Into::into).collect(),
            point_lights: self.point_lights.iter().map(Into::into).collect(),
            triangles: self.triangles.iter().map(Into::into).collect(),
            oct_nodes: self.oct_nodes.iter().map(Into::into).collect(),
            meshes: self.meshes.iter().map(Into::into).collect(),
            constants: self.compute_constants(),
            camera: GpuCamera::new(&self.camera, self.width, self.height),
        }
    }
}

/// Turns a full buffer into a `SceneError::Capacity` naming the buffer.
fn full(what: &'static str) -> impl Fn(BufferError) -> SceneError {
    move |source| SceneError::Capacity { what, source }
}

/// Logs and swallows capacity errors; everything else is passed on.
fn skip_if_full(result: Result<usize, SceneError>) -> Result<(), SceneError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_capacity() => {
            warn!("Skipped: {}", e);
            Ok(())
        },
        Err(e) => Err(e),
    }
}

/* Scene description */

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneDescription {
    pub width: u32,
    pub height: u32,

    #[serde(default = "default_bounces")]
    pub bounces: u32,

    pub camera: CameraDescription,

    #[serde(default)]
    pub spheres: Vec<SphereDescription>,

    #[serde(default)]
    pub planes: Vec<PlaneDescription>,

    #[serde(default)]
    pub lights: Vec<LightDescription>,

    #[serde(default)]
    pub meshes: Vec<MeshDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraDescription {
    pub position: [f32; 3],
    pub forward: [f32; 3],

    #[serde(default = "default_up")]
    pub up: [f32; 3],

    /// Vertical field of view, in radians.
    pub field_of_view: f32,

    #[serde(default = "default_near")]
    pub near: f32,

    #[serde(default = "default_far")]
    pub far: f32,
}

impl CameraDescription {
    fn to_camera(&self, width: u32, height: u32) -> Camera {
        let mut camera = Camera::new(
            self.position.into(),
            self.forward.into(),
            self.up.into(),
            self.field_of_view,
            width as f32 / height.max(1) as f32,
        );
        camera.near = self.near;
        camera.far = self.far;

        camera
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SphereDescription {
    pub center: [f32; 3],
    pub radius: f32,
}

impl From<&SphereDescription> for Sphere {
    fn from(s: &SphereDescription) -> Sphere {
        Sphere::new(s.center.into(), s.radius)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaneDescription {
    pub normal: [f32; 3],
    pub distance: f32,
}

impl From<&PlaneDescription> for Plane {
    fn from(p: &PlaneDescription) -> Plane {
        Plane::new(p.normal.into(), p.distance)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightDescription {
    pub position: [f32; 3],

    #[serde(default = "default_color")]
    pub color: [f32; 3],

    #[serde(default = "default_intensity")]
    pub intensity: f32,

    #[serde(default = "default_far")]
    pub range: f32,
}

impl From<&LightDescription> for PointLight {
    fn from(l: &LightDescription) -> PointLight {
        PointLight::new(l.position.into(), l.color.into(), l.intensity,
            l.range)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshDescription {
    pub path: PathBuf,

    /// Octree depth; no octree is built when absent.
    #[serde(default)]
    pub octree_depth: Option<u32>,
}

fn default_bounces() -> u32 { DEFAULT_BOUNCES }
fn default_up() -> [f32; 3] { [0.0, 1.0, 0.0] }
fn default_near() -> f32 { 1.0 }
fn default_far() -> f32 { 50.0 }
fn default_color() -> [f32; 3] { [1.0, 1.0, 1.0] }
fn default_intensity() -> f32 { 1.0 }

/* Tests */

#[cfg(test)]
fn empty_scene() -> Scene {
    Scene::new(Camera::default(), 64, 64)
}

#[cfg(test)]
fn small_triangle(x: f32) -> Triangle {
    Triangle::from_positions(
        Tuple3D::new(x, 0.0, 0.0),
        Tuple3D::new(x + 0.5, 0.0, 0.0),
        Tuple3D::new(x, 0.5, 0.5),
    )
}

#[test]
fn load_demo_scene() {
    let scene = Scene::load("./scenes/demo.json").unwrap();

    assert_eq!(scene.width, 320);
    assert_eq!(scene.height, 240);
    assert_eq!(scene.bounces(), 3);
    assert_eq!(scene.spheres().len(), 2);
    assert_eq!(scene.planes().len(), 1);
    assert_eq!(scene.point_lights().len(), 1);
    assert!(crate::feq(scene.camera.aspect_ratio, 320.0 / 240.0));

    // Cube with a depth-1 octree, then the quad scanned linearly.
    assert_eq!(scene.meshes().len(), 2);
    assert_eq!(scene.meshes()[0], MeshIndex {
        lower: 0,
        upper: 12,
        partition: Some(Partition { root: 0, count: 9, depth: 1 }),
    });
    assert_eq!(scene.meshes()[1], MeshIndex {
        lower: 12,
        upper: 14,
        partition: None,
    });
    assert_eq!(scene.triangles().len(), 14);
    assert_eq!(scene.oct_nodes().len(), 9);

    scene.validate().unwrap();
}

#[test]
fn missing_scene_file_is_io_error() {
    match Scene::load("./scenes/does_not_exist.json") {
        Err(SceneError::Io { path, .. }) => {
            assert_eq!(path, Path::new("./scenes/does_not_exist.json"));
        },
        other => panic!("unexpected result {:?}", other.map(|s| s.width)),
    }
}

#[test]
fn malformed_mesh_aborts_description() {
    let description: SceneDescription = serde_json::from_str(r#"{
        "width": 8,
        "height": 8,
        "camera": { "position": [0, 0, 0], "forward": [0, 0, -1],
            "field_of_view": 1.0 },
        "meshes": [ { "path": "gibberish.txt" } ]
    }"#).unwrap();

    let result = Scene::from_description(description, Path::new("./models"));
    assert!(matches!(result, Err(SceneError::Mesh { .. })));
}

#[test]
fn mesh_indices_point_into_shared_buffers() {
    let mut scene = empty_scene();
    let first: Vec<Triangle> = (0..4).map(|i| small_triangle(i as f32)).collect();
    let second: Vec<Triangle> = (0..3).map(|i| small_triangle(-(i as f32))).collect();

    assert_eq!(scene.insert_mesh(&first, Some(1)).unwrap(), 0);
    assert_eq!(scene.insert_mesh(&second, Some(2)).unwrap(), 1);

    let meshes = scene.meshes();
    assert_eq!(meshes[1].lower, 4);
    assert_eq!(meshes[1].upper, 7);
    assert_eq!(meshes[1].partition,
        Some(Partition { root: 9, count: 73, depth: 2 }));

    let octree = scene.mesh_octree(1).unwrap();
    assert_eq!(octree.triangle_range(), 4..7);
    scene.validate().unwrap();

    let gpu = scene.gpu_buffers();
    assert_eq!(gpu.meshes[0].root_partition, 0);
    assert_eq!(gpu.meshes[1].root_partition, 9);
    assert_eq!(gpu.oct_nodes.len(), 82);
    assert_eq!(gpu.constants.triangle_count, 7);
    assert_eq!(gpu.constants.mesh_count, 2);
}

#[test]
fn failed_partition_leaves_scene_unchanged() {
    let mut scene = empty_scene();
    let triangles: Vec<Triangle> = (0..4).map(|i| small_triangle(i as f32)).collect();

    // Depth 4 needs 4681 nodes, more than the node buffer holds.
    let err = scene.insert_mesh(&triangles, Some(4)).unwrap_err();
    assert!(err.is_capacity());
    assert!(scene.triangles().is_empty());
    assert!(scene.meshes().is_empty());

    // A retry at a smaller depth succeeds.
    scene.insert_mesh(&triangles, Some(3)).unwrap();
    assert_eq!(scene.oct_nodes().len(), 585);
}

#[test]
fn empty_mesh_with_octree_is_rejected() {
    let mut scene = empty_scene();

    let err = scene.insert_mesh(&[], Some(1)).unwrap_err();
    assert!(matches!(err, SceneError::Octree(OctreeError::EmptyMesh)));

    // Without an octree an empty range is harmless.
    assert_eq!(scene.insert_mesh(&[], None).unwrap(), 0);
    assert_eq!(scene.gpu_buffers().meshes[0].partition_count, -1);
}

#[test]
fn primitive_buffers_fill_up() {
    let mut scene = empty_scene();

    for i in 0..MAX_SPHERES {
        scene.add_sphere(Sphere::new(Tuple3D::new(i as f32, 0.0, 0.0), 1.0))
            .unwrap();
    }

    let err = scene.add_sphere(Sphere::default()).unwrap_err();
    assert!(err.is_capacity());
    assert_eq!(scene.compute_constants().sphere_count, MAX_SPHERES as u32);
}

#[test]
fn mesh_table_fills_up() {
    let mut scene = empty_scene();
    let triangles = [small_triangle(0.0)];

    for _ in 0..MAX_MESHES {
        scene.insert_mesh(&triangles, None).unwrap();
    }

    assert!(scene.insert_mesh(&triangles, None).unwrap_err().is_capacity());
    assert_eq!(scene.triangles().len(), MAX_MESHES);
}

#[test]
fn bounces_are_clamped() {
    let mut scene = empty_scene();
    assert_eq!(scene.bounces(), DEFAULT_BOUNCES);

    scene.set_bounces(25);
    assert_eq!(scene.bounces(), MAX_BOUNCES);
    scene.increase_bounces();
    assert_eq!(scene.bounces(), MAX_BOUNCES);

    scene.set_bounces(0);
    scene.decrease_bounces();
    assert_eq!(scene.bounces(), 0);
    scene.increase_bounces();
    assert_eq!(scene.compute_constants().bounce_count, 1);
}

#[test]
fn camera_ray_reaches_partitioned_cube() {
    let mut scene = empty_scene();
    scene.camera.position = Tuple3D::new(0.0, 0.0, 5.0);
    scene.add_mesh("./models/cube.obj", Some(2)).unwrap();

    let octree = scene.mesh_octree(0).unwrap();
    let center = scene.camera.ray_for_pixel(32, 32, 64, 64);
    let corner = scene.camera.ray_for_pixel(0, 0, 64, 64);

    assert_eq!(octree.traverse(&center), vec![0..12]);
    assert!(octree.traverse(&corner).is_empty());
}
