use crate::tuple::{ Tuple2D, Tuple3D };

/// One corner of a triangle, with everything the tracer needs for shading.
///
/// Tangent and handedness are computed from the triangle's UV layout when the
/// mesh is loaded; see the `tangent` module.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: Tuple3D,
    pub texcoord: Tuple2D,
    pub normal: Tuple3D,
    pub tangent: Tuple3D,

    /// Sign applied to `cross(normal, tangent)` to get the bitangent.
    pub handedness: f32,
}

impl Vertex {
    pub fn new(position: Tuple3D, texcoord: Tuple2D, normal: Tuple3D)
        -> Vertex {
        Vertex {
            position,
            texcoord,
            normal,
            tangent: Tuple3D::ZERO,
            handedness: 1.0,
        }
    }

    /// The bitangent, derived from the normal and tangent.
    pub fn bitangent(&self) -> Tuple3D {
        self.normal.cross(&self.tangent) * self.handedness
    }
}

/// A triangle with three unshared vertices.
///
/// Vertex order is kept exactly as it appears in the source mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triangle {
    pub v1: Vertex,
    pub v2: Vertex,
    pub v3: Vertex,
}

impl Triangle {
    pub fn new(v1: Vertex, v2: Vertex, v3: Vertex) -> Triangle {
        Triangle { v1, v2, v3 }
    }

    /// Builds a triangle from positions only; other attributes are zeroed.
    pub fn from_positions(p1: Tuple3D, p2: Tuple3D, p3: Tuple3D) -> Triangle {
        let corner = |position| Vertex {
            position,
            ..Default::default()
        };

        Triangle { v1: corner(p1), v2: corner(p2), v3: corner(p3) }
    }

    pub fn vertices(&self) -> [&Vertex; 3] {
        [&self.v1, &self.v2, &self.v3]
    }

    pub fn positions(&self) -> [Tuple3D; 3] {
        [self.v1.position, self.v2.position, self.v3.position]
    }

    pub fn centroid(&self) -> Tuple3D {
        (self.v1.position + self.v2.position + self.v3.position) * (1.0 / 3.0)
    }

    /// Whether every corner got a finite tangent frame.
    ///
    /// Triangles with a degenerate UV layout (zero UV area) end up with NaN
    /// or infinite tangents.
    pub fn has_finite_tangents(&self) -> bool {
        self.vertices().iter().all(|v| {
            v.tangent.is_finite() && v.handedness.is_finite()
        })
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub minimum: Tuple3D,
    pub maximum: Tuple3D,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::empty()
    }
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, min_z: f32,
        max_x: f32, max_y: f32, max_z: f32) -> Bounds {
        Bounds {
            minimum: Tuple3D::new(min_x, min_y, min_z),
            maximum: Tuple3D::new(max_x, max_y, max_z),
        }
    }

    /// Bounds that contain nothing; growing them by a point gives that point.
    pub fn empty() -> Bounds {
        Bounds {
            minimum: Tuple3D::splat(f32::INFINITY),
            maximum: Tuple3D::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.minimum.x > self.maximum.x
            || self.minimum.y > self.maximum.y
            || self.minimum.z > self.maximum.z
    }

    pub fn grow(&mut self, point: Tuple3D) {
        self.minimum = self.minimum.min(&point);
        self.maximum = self.maximum.max(&point);
    }

    /// The bounds of every vertex of every triangle.
    pub fn of_triangles(triangles: &[Triangle]) -> Bounds {
        let mut bounds = Bounds::empty();
        for triangle in triangles {
            for position in triangle.positions().iter() {
                bounds.grow(*position);
            }
        }

        bounds
    }

    pub fn center(&self) -> Tuple3D {
        (self.minimum + self.maximum) * 0.5
    }

    /// Inclusive point containment.
    pub fn contains(&self, point: &Tuple3D) -> bool {
        point.x >= self.minimum.x && point.x <= self.maximum.x
            && point.y >= self.minimum.y && point.y <= self.maximum.y
            && point.z >= self.minimum.z && point.z <= self.maximum.z
    }
}

/// A sphere primitive traced directly by the compute kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sphere {
    pub center: Tuple3D,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Tuple3D, radius: f32) -> Sphere {
        Sphere { center, radius }
    }
}

/// An infinite plane `dot(normal, p) + distance = 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Plane {
    pub normal: Tuple3D,
    pub distance: f32,
}

impl Plane {
    /// Creates a plane; the normal is normalized.
    pub fn new(normal: Tuple3D, distance: f32) -> Plane {
        Plane { normal: normal.normalize(), distance }
    }
}

#[test]
fn bounds_of_triangles() {
    let t1 = Triangle::from_positions(
        Tuple3D::new(-1.0, 0.0, 2.0),
        Tuple3D::new(3.0, -2.0, 0.0),
        Tuple3D::new(0.0, 5.0, 1.0),
    );
    let t2 = Triangle::from_positions(
        Tuple3D::new(0.0, 0.0, -4.0),
        Tuple3D::new(0.0, 0.0, 0.0),
        Tuple3D::new(0.0, 0.0, 0.0),
    );

    let bounds = Bounds::of_triangles(&[t1, t2]);
    assert_eq!(bounds, Bounds::new(-1.0, -2.0, -4.0, 3.0, 5.0, 2.0));
    assert_eq!(bounds.center(), Tuple3D::new(1.0, 1.5, -1.0));
}

#[test]
fn empty_bounds() {
    assert!(Bounds::empty().is_empty());
    assert!(Bounds::of_triangles(&[]).is_empty());
    assert!(!Bounds::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0).is_empty());
}

#[test]
fn bounds_contain_their_boundary() {
    let b = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);

    assert!(b.contains(&Tuple3D::new(1.0, -1.0, 0.0)));
    assert!(!b.contains(&Tuple3D::new(1.0001, 0.0, 0.0)));
    assert!(!b.contains(&Tuple3D::new(f32::NAN, 0.0, 0.0)));
}

#[test]
fn bitangent_follows_handedness() {
    let mut v = Vertex::new(
        Tuple3D::ZERO,
        Tuple2D::new(0.0, 0.0),
        Tuple3D::new(0.0, 0.0, 1.0),
    );
    v.tangent = Tuple3D::new(1.0, 0.0, 0.0);

    assert_eq!(v.bitangent(), Tuple3D::new(0.0, 1.0, 0.0));
    v.handedness = -1.0;
    assert_eq!(v.bitangent(), Tuple3D::new(0.0, -1.0, 0.0));
}

#[test]
fn plane_normal_is_normalized() {
    let p = Plane::new(Tuple3D::new(0.0, 3.0, 0.0), -8.0);

    assert_eq!(p.normal, Tuple3D::new(0.0, 1.0, 0.0));
    assert_eq!(p.distance, -8.0);
}
