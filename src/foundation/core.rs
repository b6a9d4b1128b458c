use crate::foundation::error::{RoomError, RoomResult};

pub use glam::{DAffine3 as Affine3, DMat4 as Mat4, DVec3 as Vec3};
pub use kurbo::{BezPath, Point};

/// Virtual wall-clock time in milliseconds.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Self = Self(0);

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

/// Position plus XYZ-ordered Euler rotation: `T(position) * Rx * Ry * Rz`.
pub fn euler_transform(position: Vec3, euler: Vec3) -> Affine3 {
    Affine3::from_translation(position)
        * Affine3::from_rotation_x(euler.x)
        * Affine3::from_rotation_y(euler.y)
        * Affine3::from_rotation_z(euler.z)
}

/// Straight (non-premultiplied) opaque sRGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`
    pub const fn hex(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        }
    }

    pub fn to_hex(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// Multiplies each channel by `k`, saturating at white.
    pub fn scale(self, k: f64) -> Self {
        fn ch(c: u8, k: f64) -> u8 {
            (f64::from(c) * k).round().clamp(0.0, 255.0) as u8
        }
        Self::new(ch(self.r, k), ch(self.g, k), ch(self.b, k))
    }

    pub fn saturating_add(self, o: Self) -> Self {
        Self::new(
            self.r.saturating_add(o.r),
            self.g.saturating_add(o.g),
            self.b.saturating_add(o.b),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> RoomResult<Self> {
        if width == 0 || height == 0 {
            return Err(RoomError::validation("viewport must be non-empty"));
        }
        Ok(Self { width, height })
    }

    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height.max(1))
    }
}
