use crate::bounds::Bounds;
use crate::collider::Collider;
use crate::math::Transform2d;
use crate::shapes::MassData;
use glam::Vec2;

/// Above this many children the world bounds are derived by rotating the
/// cached local box instead of walking every child. Slightly looser, O(1).
const LOOSE_BOUNDS_THRESHOLD: usize = 8;

/// A rigid cluster of sub-colliders sharing one body. Child geometry is
/// expressed in the owning body's local frame.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShapeCompound {
    children: Vec<Collider>,
    local_bounds: Bounds,
}

impl ShapeCompound {
    pub fn new(children: Vec<Collider>) -> Self {
        debug_assert!(!children.is_empty());
        let mut local_bounds = Bounds::new();
        for child in &children {
            local_bounds = local_bounds.union(child.shape.local_bounds());
        }
        Self {
            children,
            local_bounds,
        }
    }

    #[inline]
    pub fn children(&self) -> &[Collider] {
        &self.children
    }

    /// Aggregate of the children, sensors skipped: mass-weighted center,
    /// inertias combined through the parallel axis theorem.
    pub fn mass_data(&self) -> MassData {
        let mut mass = 0.0;
        let mut center = Vec2::ZERO;
        let mut parts: Vec<MassData> = Vec::with_capacity(self.children.len());

        for child in &self.children {
            if child.is_sensor {
                continue;
            }
            let md = child.shape.mass_data(child.material.density);
            mass += md.mass;
            center += md.mass * md.center;
            parts.push(md);
        }

        if mass <= 0.0 {
            return MassData {
                mass: 0.0,
                center: self.local_bounds.center(),
                inertia: 0.0,
            };
        }
        center /= mass;

        let mut inertia = 0.0;
        for md in &parts {
            inertia += md.inertia + md.mass * (md.center - center).length_squared();
        }

        MassData {
            mass,
            center,
            inertia,
        }
    }

    pub fn bounds(&self, xf: &Transform2d) -> Bounds {
        if self.children.len() <= LOOSE_BOUNDS_THRESHOLD {
            let mut b = Bounds::new();
            for child in &self.children {
                b = b.union(child.shape.bounds(xf));
            }
            return b;
        }

        // rotate the cached local box
        let corners = [
            self.local_bounds.mins,
            Vec2::new(self.local_bounds.maxs.x, self.local_bounds.mins.y),
            self.local_bounds.maxs,
            Vec2::new(self.local_bounds.mins.x, self.local_bounds.maxs.y),
        ];
        let mut b = Bounds::new();
        for corner in corners {
            b.expand_by_point(xf.transform_point(corner));
        }
        b
    }
}
