use crate::tuple::Tuple3D;

/// A point light.
///
/// Light is emitted in every direction from `position` and falls off to
/// nothing at `range`. The compute kernel does the shading; this record only
/// describes the light.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointLight {
    pub position: Tuple3D,

    /// Linear RGB color of the light.
    pub color: Tuple3D,

    /// Scale applied to `color`.
    pub intensity: f32,

    /// Distance beyond which the light contributes nothing.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> PointLight {
        PointLight::new(Tuple3D::ZERO, Tuple3D::splat(1.0), 1.0, 50.0)
    }
}

impl PointLight {
    /// Creates a point light.
    ///
    /// Negative intensities and ranges make no sense to the kernel, so they
    /// are clamped to zero.
    pub fn new(position: Tuple3D, color: Tuple3D, intensity: f32, range: f32)
        -> PointLight {
        PointLight {
            position,
            color,
            intensity: intensity.max(0.0),
            range: range.max(0.0),
        }
    }

    /// Whether `point` is close enough to be lit at all.
    pub fn reaches(&self, point: &Tuple3D) -> bool {
        (*point - self.position).magnitude() <= self.range
    }
}

#[test]
fn light_parameters_are_clamped() {
    let light = PointLight::new(
        Tuple3D::new(0.0, 10.0, 0.0),
        Tuple3D::new(1.0, 0.5, 0.25),
        -2.0,
        -1.0,
    );

    assert_eq!(light.intensity, 0.0);
    assert_eq!(light.range, 0.0);
    assert_eq!(light.color, Tuple3D::new(1.0, 0.5, 0.25));
}

#[test]
fn light_reaches_within_range() {
    let light = PointLight::new(Tuple3D::new(0.0, 10.0, 0.0),
        Tuple3D::splat(1.0), 1.0, 5.0);

    assert!(light.reaches(&Tuple3D::new(0.0, 5.0, 0.0)));
    assert!(light.reaches(&Tuple3D::new(3.0, 14.0, 0.0)));
    assert!(!light.reaches(&Tuple3D::new(0.0, 4.9, 0.0)));
}
