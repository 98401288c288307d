use crate::bounds::Bounds;
use crate::math::Transform2d;
use crate::shapes::MassData;
use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeCircle {
    pub center: Vec2,
    pub radius: f32,
}

impl ShapeCircle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        debug_assert!(radius > 0.0);
        Self { center, radius }
    }

    pub fn mass_data(&self, density: f32) -> MassData {
        let mass = density * std::f32::consts::PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.center,
            // solid disc about its own center
            inertia: 0.5 * mass * self.radius * self.radius,
        }
    }

    pub fn bounds(&self, xf: &Transform2d) -> Bounds {
        let center = xf.transform_point(self.center);
        Bounds::from_center_extents(center, Vec2::splat(self.radius))
    }
}
