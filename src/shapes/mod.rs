mod circle;
mod compound;
mod edge;
mod polygon;

use crate::bounds::Bounds;
use crate::collider::Collider;
use crate::math::Transform2d;
use glam::Vec2;

pub use circle::ShapeCircle;
pub use compound::ShapeCompound;
pub use edge::ShapeEdge;
pub use polygon::ShapePolygon;

/// Mass, center of mass and rotational inertia about that center.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    pub inertia: f32,
}

/// Shape variant tag, used to index the contact dispatch table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Circle,
    Edge,
    Polygon,
    Compound,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Shape {
    Circle(ShapeCircle),
    Edge(ShapeEdge),
    Polygon(ShapePolygon),
    Compound(ShapeCompound),
}

impl Default for Shape {
    fn default() -> Shape {
        Shape::Circle(ShapeCircle::new(Vec2::ZERO, 0.5))
    }
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle(ShapeCircle::new(Vec2::ZERO, radius))
    }

    pub fn circle_at(center: Vec2, radius: f32) -> Self {
        Shape::Circle(ShapeCircle::new(center, radius))
    }

    pub fn edge(a: Vec2, b: Vec2) -> Self {
        Shape::Edge(ShapeEdge::new(a, b))
    }

    /// Convex hull of the given point cloud.
    pub fn polygon(points: &[Vec2]) -> Self {
        Shape::Polygon(ShapePolygon::new(points))
    }

    /// Axis aligned box with the given half extents, centered on the origin.
    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Shape::Polygon(ShapePolygon::rect(half_width, half_height))
    }

    pub fn compound(children: Vec<Collider>) -> Self {
        Shape::Compound(ShapeCompound::new(children))
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Circle(_) => ShapeKind::Circle,
            Shape::Edge(_) => ShapeKind::Edge,
            Shape::Polygon(_) => ShapeKind::Polygon,
            Shape::Compound(_) => ShapeKind::Compound,
        }
    }

    /// Mass properties at the given density. Compounds carry per-child
    /// densities and ignore the argument.
    pub fn mass_data(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(data) => data.mass_data(density),
            Shape::Edge(data) => data.mass_data(),
            Shape::Polygon(data) => data.mass_data(density),
            Shape::Compound(data) => data.mass_data(),
        }
    }

    /// Tight world-space bounds under the given transform.
    pub fn bounds(&self, xf: &Transform2d) -> Bounds {
        match self {
            Shape::Circle(data) => data.bounds(xf),
            Shape::Edge(data) => data.bounds(xf),
            Shape::Polygon(data) => data.bounds(xf),
            Shape::Compound(data) => data.bounds(xf),
        }
    }

    /// Bounds in the owning body's local frame.
    pub fn local_bounds(&self) -> Bounds {
        self.bounds(&Transform2d::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shape_is_a_circle() {
        assert_eq!(Shape::default().kind(), ShapeKind::Circle);
    }

    #[test]
    fn local_bounds_of_offset_circle() {
        let shape = Shape::circle_at(Vec2::new(2.0, 1.0), 0.5);
        let b = shape.local_bounds();
        assert_eq!(b.mins, Vec2::new(1.5, 0.5));
        assert_eq!(b.maxs, Vec2::new(2.5, 1.5));
    }
}
