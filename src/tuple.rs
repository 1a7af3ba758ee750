use std::ops::{ Add, AddAssign, Sub, Neg, Mul, Index };

use crate::feq;

/// A two-component tuple, used for texture coordinates.
#[derive(Debug, Default, Copy, Clone, PartialOrd)]
pub struct Tuple2D {
    pub x: f32,
    pub y: f32,
}

impl PartialEq for Tuple2D {
    fn eq(&self, other: &Tuple2D) -> bool {
        feq(self.x, other.x) && feq(self.y, other.y)
    }
}

impl Tuple2D {
    pub fn new(x: f32, y: f32) -> Tuple2D {
        Tuple2D { x, y }
    }
}

impl Sub for Tuple2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

/// A three-component tuple, used for positions and directions alike.
///
/// Equality is tolerant; two tuples are equal if every component is within
/// `FEQ_EPSILON` of the other.
#[derive(Debug, Default, Copy, Clone, PartialOrd)]
pub struct Tuple3D {
    pub x: f32,
    pub y: f32,
    pub z: f32
}

impl PartialEq for Tuple3D {
    fn eq(&self, other: &Tuple3D) -> bool {
        feq(self.x, other.x) &&
            feq(self.y, other.y) &&
            feq(self.z, other.z)
    }
}

impl Tuple3D {
    pub const ZERO: Tuple3D = Tuple3D { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Tuple3D {
        Tuple3D { x, y, z }
    }

    /// A tuple with the same value in every component.
    pub fn splat(v: f32) -> Tuple3D {
        Tuple3D { x: v, y: v, z: v }
    }

    pub fn magnitude(&self) -> f32 {
        f32::sqrt(self.x.powi(2) + self.y.powi(2) + self.z.powi(2))
    }

    /// Scales the tuple to unit length.
    ///
    /// A zero tuple has no direction and normalizes to NaN components.
    pub fn normalize(&self) -> Tuple3D {
        let mag = self.magnitude();

        Tuple3D {
            x: self.x * (1.0 / mag),
            y: self.y * (1.0 / mag),
            z: self.z * (1.0 / mag),
        }
    }

    pub fn dot(&self, other: &Tuple3D) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Tuple3D) -> Tuple3D {
        Tuple3D {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Rotates this vector by `angle` radians around the unit vector `axis`.
    pub fn rotate_about(&self, axis: &Tuple3D, angle: f32) -> Tuple3D {
        // Rodrigues' rotation formula.
        let (sin, cos) = angle.sin_cos();

        *self * cos
            + axis.cross(self) * sin
            + *axis * (axis.dot(self) * (1.0 - cos))
    }

    pub fn min(&self, other: &Tuple3D) -> Tuple3D {
        Tuple3D {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
            z: self.z.min(other.z),
        }
    }

    pub fn max(&self, other: &Tuple3D) -> Tuple3D {
        Tuple3D {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            z: self.z.max(other.z),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Tuple3D {
    fn from(v: [f32; 3]) -> Tuple3D {
        Tuple3D { x: v[0], y: v[1], z: v[2] }
    }
}

/// Indexes the components as 0 = x, 1 = y, 2 = z.
impl Index<usize> for Tuple3D {
    type Output = f32;

    fn index(&self, axis: usize) -> &f32 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Tuple3D axis {} out of range.", axis),
        }
    }
}

impl Add for Tuple3D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl AddAssign for Tuple3D {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl Sub for Tuple3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Neg for Tuple3D {
    type Output = Self;

    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z }
    }
}

/// Implements scalar right-multiplication for a 3D tuple.
///
/// ```
/// use compute_ray_tracer::tuple::Tuple3D;
///
/// let t = Tuple3D::new(1.0, 2.0, 3.0);
/// assert_eq!(t * 2.0, Tuple3D::new(2.0, 4.0, 6.0));
/// ```
impl Mul<f32> for Tuple3D {
    type Output = Self;

    fn mul(self, other: f32) -> Self {
        Self {
            x: self.x * other,
            y: self.y * other,
            z: self.z * other,
        }
    }
}

/// Implements scalar left-multiplication for a 3D tuple.
impl Mul<Tuple3D> for f32 {
    type Output = Tuple3D;

    fn mul(self, other: Tuple3D) -> Tuple3D {
        other * self
    }
}

/* Tests */

#[test]
fn add_tuples() {
    let a1 = Tuple3D::new(3.0, -2.0, 5.0);
    let a2 = Tuple3D::new(-2.0, 3.0, 1.0);

    assert_eq!(a1 + a2, Tuple3D::new(1.0, 1.0, 6.0));
}

#[test]
fn sub_tuples() {
    let p1 = Tuple3D::new(3.0, 2.0, 1.0);
    let p2 = Tuple3D::new(5.0, 6.0, 7.0);

    assert_eq!(p1 - p2, Tuple3D::new(-2.0, -4.0, -6.0));
}

#[test]
fn neg_tuple() {
    let a = Tuple3D::new(1.0, -2.0, 3.0);

    assert_eq!(-a, Tuple3D::new(-1.0, 2.0, -3.0));
}

#[test]
fn mul_fraction() {
    let a = Tuple3D::new(1.0, -2.0, 3.0);

    assert_eq!(a * 0.5, Tuple3D::new(0.5, -1.0, 1.5));
    assert_eq!(0.5 * a, Tuple3D::new(0.5, -1.0, 1.5));
}

#[test]
fn normalize_dirty() {
    let v = Tuple3D::new(1.0, 2.0, 3.0);
    let e = Tuple3D::new(
        1.0 / f32::sqrt(14.0),
        2.0 / f32::sqrt(14.0),
        3.0 / f32::sqrt(14.0)
    );

    assert_eq!(v.normalize(), e);
    assert!(crate::feq(v.normalize().magnitude(), 1.0));
}

#[test]
fn normalize_zero_is_not_finite() {
    assert!(!Tuple3D::ZERO.normalize().is_finite());
}

#[test]
fn dot_and_cross() {
    let a = Tuple3D::new(1.0, 2.0, 3.0);
    let b = Tuple3D::new(2.0, 3.0, 4.0);

    assert_eq!(a.dot(&b), 20.0);
    assert_eq!(a.cross(&b), Tuple3D::new(-1.0, 2.0, -1.0));
    assert_eq!(b.cross(&a), Tuple3D::new(1.0, -2.0, 1.0));
}

#[test]
fn rotate_quarter_turn_about_y() {
    let v = Tuple3D::new(0.0, 0.0, -1.0);
    let up = Tuple3D::new(0.0, 1.0, 0.0);
    let r = v.rotate_about(&up, std::f32::consts::FRAC_PI_2);

    assert_eq!(r, Tuple3D::new(-1.0, 0.0, 0.0));
}

#[test]
fn componentwise_min_max() {
    let a = Tuple3D::new(1.0, -4.0, 3.0);
    let b = Tuple3D::new(-1.0, 2.0, 3.5);

    assert_eq!(a.min(&b), Tuple3D::new(-1.0, -4.0, 3.0));
    assert_eq!(a.max(&b), Tuple3D::new(1.0, 2.0, 3.5));
    assert_eq!(a[1], -4.0);
}
