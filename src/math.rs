use glam::Vec2;
use serde::{Deserialize, Serialize};

/// 2D cross product (z component of the 3D cross of the embedded vectors).
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross of a scalar (angular velocity about z) with a vector.
#[inline]
pub fn cross_scalar(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// A 2D rotation stored as a unit complex number.
///
/// Cheaper to apply than an angle (no trig per point) and composes without
/// drift the way raw angles do.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rot2 {
    pub cos: f32,
    pub sin: f32,
}

impl Rot2 {
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    #[inline]
    pub fn from_angle(radians: f32) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self { cos, sin }
    }

    #[inline]
    pub fn angle(&self) -> f32 {
        self.sin.atan2(self.cos)
    }

    /// Rotate a vector.
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cos * v.x - self.sin * v.y,
            self.sin * v.x + self.cos * v.y,
        )
    }

    /// Rotate a vector by the inverse rotation.
    #[inline]
    pub fn inv_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.cos * v.x + self.sin * v.y,
            -self.sin * v.x + self.cos * v.y,
        )
    }

    /// The local x axis in world space.
    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.cos, self.sin)
    }
}

impl Default for Rot2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Rot2 {
    type Output = Rot2;

    /// Compose two rotations.
    fn mul(self, rhs: Rot2) -> Rot2 {
        Rot2 {
            cos: self.cos * rhs.cos - self.sin * rhs.sin,
            sin: self.sin * rhs.cos + self.cos * rhs.sin,
        }
    }
}

/// Position + rotation of a rigid body.
#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform2d {
    pub position: Vec2,
    pub rotation: Rot2,
}

impl Transform2d {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: Rot2::IDENTITY,
    };

    #[inline]
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            position,
            rotation: Rot2::from_angle(angle),
        }
    }

    /// Local point to world space.
    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.position + self.rotation.rotate(p)
    }

    /// World point to local space.
    #[inline]
    pub fn inv_transform_point(&self, p: Vec2) -> Vec2 {
        self.rotation.inv_rotate(p - self.position)
    }
}
