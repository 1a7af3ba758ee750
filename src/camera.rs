use crate::ray::Ray;
use crate::tuple::Tuple3D;

/// Pitch stops this far short of looking straight along `up`, where the
/// camera's right vector would vanish.
const MAX_PITCH_COS: f32 = 0.999;

/// A perspective camera for the compute kernel.
///
/// The camera is described by a position and a view direction instead of a
/// view matrix; the kernel builds primary rays directly from `forward`,
/// `right()` and `view_up()`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Tuple3D,

    /// Unit direction the camera looks in.
    pub forward: Tuple3D,

    /// Unit world up direction. Yaw turns around it and pitch never crosses
    /// it.
    pub up: Tuple3D,

    /// Vertical field of view, in radians.
    pub field_of_view: f32,

    /// Width over height of the output image.
    pub aspect_ratio: f32,

    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Camera {
        Camera::new(
            Tuple3D::ZERO,
            Tuple3D::new(0.0, 0.0, -1.0),
            Tuple3D::new(0.0, 1.0, 0.0),
            std::f32::consts::FRAC_PI_2,
            1.0,
        )
    }
}

impl Camera {
    /// Creates a camera looking along `forward`.
    ///
    /// `forward` must not be parallel to `up`. Near and far planes default to
    /// 1 and 50.
    pub fn new(position: Tuple3D, forward: Tuple3D, up: Tuple3D,
        field_of_view: f32, aspect_ratio: f32) -> Camera {
        Camera {
            position,
            forward: forward.normalize(),
            up: up.normalize(),
            field_of_view,
            aspect_ratio,
            near: 1.0,
            far: 50.0,
        }
    }

    pub fn right(&self) -> Tuple3D {
        self.forward.cross(&self.up).normalize()
    }

    /// The up direction of the image plane, perpendicular to `forward`.
    pub fn view_up(&self) -> Tuple3D {
        self.right().cross(&self.forward)
    }

    /// Turns the camera left or right around the world up vector.
    pub fn rotate_yaw(&mut self, angle: f32) {
        // Positive angles turn right, so rotate clockwise seen from above.
        self.forward = self.forward.rotate_about(&self.up, -angle).normalize();
    }

    /// Tilts the camera up or down around its right vector.
    ///
    /// A rotation that would point the camera (almost) straight up or down
    /// is ignored.
    pub fn rotate_pitch(&mut self, angle: f32) {
        let forward = self.forward.rotate_about(&self.right(), angle)
            .normalize();

        if forward.dot(&self.up).abs() < MAX_PITCH_COS {
            self.forward = forward;
        }
    }

    pub fn move_forward(&mut self, distance: f32) {
        self.position += self.forward * distance;
    }

    pub fn move_right(&mut self, distance: f32) {
        self.position += self.right() * distance;
    }

    /// The primary ray through the center of pixel `(px, py)` of a
    /// `width` by `height` image; `(0, 0)` is the top-left pixel.
    pub fn ray_for_pixel(&self, px: u32, py: u32, width: u32, height: u32)
        -> Ray {
        // Offsets from the image center to the pixel's center, in [-1, 1]
        let ndc_x = ((px as f32 + 0.5) / width as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - ((py as f32 + 0.5) / height as f32) * 2.0;

        // Size of the image plane at distance 1
        let half_height = (self.field_of_view * 0.5).tan();
        let half_width = half_height * self.aspect_ratio;

        let direction = self.forward
            + self.right() * (ndc_x * half_width)
            + self.view_up() * (ndc_y * half_height);

        Ray::new(self.position, direction.normalize())
    }
}

#[test]
fn frame_is_orthonormal() {
    let c = Camera::new(
        Tuple3D::ZERO,
        Tuple3D::new(0.0, -1.0, -1.0),
        Tuple3D::new(0.0, 1.0, 0.0),
        1.0,
        1.0,
    );

    let s = std::f32::consts::FRAC_1_SQRT_2;
    assert_eq!(c.forward, Tuple3D::new(0.0, -s, -s));
    assert_eq!(c.right(), Tuple3D::new(1.0, 0.0, 0.0));
    assert_eq!(c.view_up(), Tuple3D::new(0.0, s, -s));
}

#[test]
fn ray_through_center() {
    let c = Camera::default();
    let r = c.ray_for_pixel(100, 50, 201, 101);

    assert_eq!(r.origin, Tuple3D::ZERO);
    assert_eq!(r.direction, Tuple3D::new(0.0, 0.0, -1.0));
}

#[test]
fn ray_through_corner() {
    let c = Camera::default();
    let r = c.ray_for_pixel(0, 0, 2, 2);

    // Quarter of the way in from each edge of a 90 degree frustum.
    assert_eq!(r.direction, Tuple3D::new(-0.5, 0.5, -1.0).normalize());
}

#[test]
fn yaw_turns_right() {
    let mut c = Camera::default();
    c.rotate_yaw(std::f32::consts::FRAC_PI_2);

    assert_eq!(c.forward, Tuple3D::new(1.0, 0.0, 0.0));
    assert_eq!(c.up, Tuple3D::new(0.0, 1.0, 0.0));
}

#[test]
fn pitch_stops_short_of_vertical() {
    let mut c = Camera::default();
    c.rotate_pitch(std::f32::consts::FRAC_PI_4);

    let s = std::f32::consts::FRAC_1_SQRT_2;
    assert_eq!(c.forward, Tuple3D::new(0.0, s, -s));
    assert_eq!(c.view_up(), Tuple3D::new(0.0, s, s));

    let before = c.forward;
    c.rotate_pitch(std::f32::consts::FRAC_PI_4);
    assert_eq!(c.forward, before);
}

#[test]
fn camera_moves_along_its_frame() {
    let mut c = Camera::default();
    c.move_forward(2.0);
    c.move_right(-1.0);

    assert_eq!(c.position, Tuple3D::new(-1.0, 0.0, -2.0));
}
