use crate::bounds::Bounds;
use crate::math::Transform2d;
use crate::shapes::MassData;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A line segment, intended for static world geometry (ground strips,
/// platform outlines). Zero area, zero mass.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeEdge {
    pub a: Vec2,
    pub b: Vec2,
}

impl ShapeEdge {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        debug_assert!((b - a).length_squared() > 0.0);
        Self { a, b }
    }

    /// Unit normal, left of the a -> b direction.
    pub fn normal(&self) -> Vec2 {
        let d = self.b - self.a;
        Vec2::new(-d.y, d.x).normalize_or_zero()
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: 0.0,
            center: 0.5 * (self.a + self.b),
            inertia: 0.0,
        }
    }

    pub fn bounds(&self, xf: &Transform2d) -> Bounds {
        Bounds::from_points(&[xf.transform_point(self.a), xf.transform_point(self.b)])
    }
}
