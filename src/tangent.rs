use crate::geometry::Triangle;
use crate::tuple::Tuple3D;

/// Tangent and bitangent directions of one triangle, before any per-vertex
/// orthogonalization.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TriangleBasis {
    /// Direction of increasing U in object space.
    pub sdir: Tuple3D,

    /// Direction of increasing V in object space.
    pub tdir: Tuple3D,
}

/// Solves for the directions in which U and V increase across a triangle.
///
/// With edges `e1 = p2 - p1`, `e2 = p3 - p1` and UV deltas `(s1, t1)`,
/// `(s2, t2)` the directions satisfy:
///
/// ```text
///     e1 = s1 * sdir + t1 * tdir
///     e2 = s2 * sdir + t2 * tdir
/// ```
///
/// The 2x2 system is inverted with `r = 1 / (s1 * t2 - s2 * t1)`. If the UV
/// edges are parallel, `r` is infinite and so are the results. Nothing is
/// clamped; callers check `Triangle::has_finite_tangents` afterwards.
pub fn triangle_basis(triangle: &Triangle) -> TriangleBasis {
    let [v1, v2, v3] = triangle.vertices();

    let e1 = v2.position - v1.position;
    let e2 = v3.position - v1.position;
    let d1 = v2.texcoord - v1.texcoord;
    let d2 = v3.texcoord - v1.texcoord;

    let r = 1.0 / (d1.x * d2.y - d2.x * d1.y);

    TriangleBasis {
        sdir: (e1 * d2.y - e2 * d1.y) * r,
        tdir: (e2 * d1.x - e1 * d2.x) * r,
    }
}

/// Fills in the tangent and handedness of every vertex of `triangle`.
///
/// Each corner only accumulates the basis of its own triangle; corners that
/// share a position in the source mesh are not averaged together. The
/// accumulated direction is Gram-Schmidt orthogonalized against the corner
/// normal and normalized. Handedness is the sign of
/// `dot(cross(normal, tangent), tdir)`.
pub fn compute_tangents(triangle: &mut Triangle) {
    let basis = triangle_basis(triangle);

    for vertex in [&mut triangle.v1, &mut triangle.v2, &mut triangle.v3] {
        let n = vertex.normal;
        let t = basis.sdir;

        vertex.tangent = (t - n * n.dot(&t)).normalize();

        let sign = n.cross(&vertex.tangent).dot(&basis.tdir);
        vertex.handedness = if sign.is_nan() {
            f32::NAN
        } else if sign < 0.0 {
            -1.0
        } else {
            1.0
        };
    }
}

/// Runs `compute_tangents` over a mesh, returning how many triangles ended up
/// with non-finite tangents.
pub fn compute_mesh_tangents(triangles: &mut [Triangle]) -> usize {
    let mut degenerate = 0;
    for triangle in triangles.iter_mut() {
        compute_tangents(triangle);
        if !triangle.has_finite_tangents() {
            degenerate += 1;
        }
    }

    degenerate
}

#[cfg(test)]
fn textured_triangle(uvs: [(f32, f32); 3], normal: Tuple3D) -> Triangle {
    use crate::geometry::Vertex;
    use crate::tuple::Tuple2D;

    let corner = |p: Tuple3D, uv: (f32, f32)| {
        Vertex::new(p, Tuple2D::new(uv.0, uv.1), normal)
    };

    Triangle::new(
        corner(Tuple3D::new(-1.0, -1.0, 1.0), uvs[0]),
        corner(Tuple3D::new(1.0, -1.0, 1.0), uvs[1]),
        corner(Tuple3D::new(1.0, 1.0, 1.0), uvs[2]),
    )
}

#[test]
fn basis_follows_uv_axes() {
    let t = textured_triangle(
        [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
        Tuple3D::new(0.0, 0.0, 1.0),
    );
    let basis = triangle_basis(&t);

    assert_eq!(basis.sdir, Tuple3D::new(2.0, 0.0, 0.0));
    assert_eq!(basis.tdir, Tuple3D::new(0.0, 2.0, 0.0));
}

#[test]
fn tangents_are_unit_and_orthogonal() {
    // A normal that is not perpendicular to the triangle's plane, so the
    // orthogonalization actually has work to do.
    let normal = Tuple3D::new(0.3, 0.0, 1.0).normalize();
    let mut t = textured_triangle([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)], normal);
    compute_tangents(&mut t);

    for v in t.vertices().iter() {
        assert!(crate::feq(v.tangent.magnitude(), 1.0));
        assert!(crate::feq(v.tangent.dot(&v.normal), 0.0));
        assert_eq!(v.handedness, 1.0);
    }
}

#[test]
fn mirrored_uvs_flip_handedness() {
    let mut t = textured_triangle(
        [(1.0, 0.0), (0.0, 0.0), (0.0, 1.0)],
        Tuple3D::new(0.0, 0.0, 1.0),
    );
    compute_tangents(&mut t);

    assert_eq!(t.v1.tangent, Tuple3D::new(-1.0, 0.0, 0.0));
    assert_eq!(t.v1.handedness, -1.0);
}

#[test]
fn degenerate_uvs_surface_as_non_finite() {
    let mut mesh = vec![
        textured_triangle(
            [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)],
            Tuple3D::new(0.0, 0.0, 1.0),
        ),
        textured_triangle(
            [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
            Tuple3D::new(0.0, 0.0, 1.0),
        ),
    ];

    assert_eq!(compute_mesh_tangents(&mut mesh), 1);
    assert!(!mesh[0].has_finite_tangents());
    assert!(mesh[1].has_finite_tangents());
}
