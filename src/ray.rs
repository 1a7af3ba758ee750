use crate::consts::FEQ_EPSILON;
use crate::geometry::Bounds;
use crate::tuple::Tuple3D;

/// A ray with an origin and a direction.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray {
    pub origin: Tuple3D,
    pub direction: Tuple3D,
}

impl Ray {
    pub fn new(origin: Tuple3D, direction: Tuple3D) -> Ray {
        Ray { origin, direction }
    }

    pub fn position(&self, t: f32) -> Tuple3D {
        self.origin + (t * self.direction)
    }

    /// Intersects the ray with an axis-aligned box.
    ///
    /// Returns the entry and exit distances, or `None` if the ray misses the
    /// box or the box lies entirely behind the origin. A ray starting inside
    /// the box has a negative entry distance.
    pub fn intersect_bounds(&self, bounds: &Bounds) -> Option<(f32, f32)> {
        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;

        for axis in 0..3 {
            let (axis_min, axis_max) = Self::check_axis(
                self.origin[axis],
                self.direction[axis],
                bounds.minimum[axis],
                bounds.maximum[axis],
            );

            tmin = tmin.max(axis_min);
            tmax = tmax.min(axis_max);
        }

        if tmin > tmax || tmax < 0.0 {
            None
        } else {
            Some((tmin, tmax))
        }
    }

    /// Finds where the ray enters and leaves the slab `[low, high]` on one
    /// axis.
    fn check_axis(origin: f32, direction: f32, low: f32, high: f32)
        -> (f32, f32) {
        // A ray parallel to the slab is either always or never inside it.
        if direction.abs() < FEQ_EPSILON {
            return if origin >= low && origin <= high {
                (f32::NEG_INFINITY, f32::INFINITY)
            } else {
                (f32::INFINITY, f32::NEG_INFINITY)
            };
        }

        let tmin = (low - origin) / direction;
        let tmax = (high - origin) / direction;

        // If tmin is actually greater than tmax, return tmax first.
        if tmin > tmax {
            (tmax, tmin)
        } else {
            (tmin, tmax)
        }
    }
}

#[test]
fn ray_position() {
    let r = Ray::new(
        Tuple3D::new(2.0, 3.0, 4.0),
        Tuple3D::new(1.0, 0.0, 0.0)
    );

    assert_eq!(r.position(0.0), Tuple3D::new(2.0, 3.0, 4.0));
    assert_eq!(r.position(-1.0), Tuple3D::new(1.0, 3.0, 4.0));
    assert_eq!(r.position(2.5), Tuple3D::new(4.5, 3.0, 4.0));
}

#[test]
fn ray_hits_box_faces() {
    let b = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
    let cases = [
        (Tuple3D::new(5.0, 0.5, 0.0), Tuple3D::new(-1.0, 0.0, 0.0), 4.0, 6.0),
        (Tuple3D::new(0.5, -5.0, 0.0), Tuple3D::new(0.0, 1.0, 0.0), 4.0, 6.0),
        (Tuple3D::new(0.5, 0.0, 5.0), Tuple3D::new(0.0, 0.0, -1.0), 4.0, 6.0),
        (Tuple3D::new(0.0, 0.5, 0.0), Tuple3D::new(0.0, 0.0, 1.0), -1.0, 1.0),
    ];

    for &(origin, direction, t1, t2) in cases.iter() {
        let r = Ray::new(origin, direction);
        let (tmin, tmax) = r.intersect_bounds(&b).unwrap();

        assert!(crate::feq(tmin, t1));
        assert!(crate::feq(tmax, t2));
    }
}

#[test]
fn ray_misses_box() {
    let b = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
    let cases = [
        (Tuple3D::new(-2.0, 0.0, 0.0), Tuple3D::new(0.2673, 0.5345, 0.8018)),
        (Tuple3D::new(2.0, 0.0, 2.0), Tuple3D::new(0.0, 0.0, -1.0)),
        (Tuple3D::new(0.0, 2.0, 2.0), Tuple3D::new(0.0, -1.0, 0.0)),
        (Tuple3D::new(0.0, 0.0, 5.0), Tuple3D::new(0.0, 0.0, 1.0)),
    ];

    for &(origin, direction) in cases.iter() {
        let r = Ray::new(origin, direction);
        assert_eq!(r.intersect_bounds(&b), None);
    }
}
