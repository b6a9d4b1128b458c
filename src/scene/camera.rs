use crate::foundation::core::{Mat4, Point, Vec3, Viewport};

/// Right-handed perspective camera looking down its local -Z axis.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_deg: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    position: Vec3,
    target: Vec3,
    view: Mat4,
    projection: Mat4,
}

/// A projected vertex: pixel position plus distance along the view axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
    pub point: Point,
    pub depth: f64,
}

impl PerspectiveCamera {
    pub fn new(fov_deg: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut cam = Self {
            fov_deg,
            aspect,
            near,
            far,
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam.look_at(Vec3::ZERO);
        cam
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// Moves the camera, keeping its current look-at target.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.look_at(self.target);
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
        let forward = target - self.position;
        // Looking straight along Y leaves no horizon; fall back to -Z as "up".
        let up = if forward.cross(Vec3::Y).length_squared() <= f64::EPSILON {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        self.view = Mat4::look_at_rh(self.position, target, up);
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh_gl(self.fov_deg.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn to_view(&self, p: Vec3) -> Vec3 {
        self.view.transform_point3(p)
    }

    /// Projects a world point into viewport pixels. Points outside the near/far range yield
    /// `None`.
    pub fn project(&self, p: Vec3, viewport: Viewport) -> Option<Projected> {
        let clip = self.projection * (self.view * p.extend(1.0));
        let w = clip.w;
        if w < self.near || w > self.far {
            return None;
        }
        let x = clip.x / w;
        let y = clip.y / w;
        let px = (x + 1.0) * 0.5 * f64::from(viewport.width);
        let py = (1.0 - y) * 0.5 * f64::from(viewport.height);
        Some(Projected {
            point: Point::new(px, py),
            depth: w,
        })
    }
}
