use crate::body::BodyKey;
use crate::shapes::Shape;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Collision category bits. `DEFAULT` is set on everything unless the
    /// host assigns its own layers via `from_bits_retain`.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CategoryBits: u32 {
        const DEFAULT = 1 << 0;
        const ALL = u32::MAX;
    }
}

/// Category/mask/group collision filter.
///
/// Two colliders with the same positive group always collide, the same
/// negative group never collide; otherwise both masks must accept the other
/// side's category.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub category: CategoryBits,
    pub mask: CategoryBits,
    pub group: i32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category: CategoryBits::DEFAULT,
            mask: CategoryBits::ALL,
            group: 0,
        }
    }
}

impl CollisionFilter {
    pub fn new(category: CategoryBits, mask: CategoryBits) -> Self {
        Self {
            category,
            mask,
            group: 0,
        }
    }

    pub fn with_group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    pub fn should_collide(&self, other: &Self) -> bool {
        if self.group == other.group && self.group != 0 {
            return self.group > 0;
        }
        self.category.intersects(other.mask) && other.category.intersects(self.mask)
    }
}

/// Surface and density properties.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            density: 1.0,
        }
    }
}

impl Material {
    pub const ICE: Self = Self {
        friction: 0.05,
        restitution: 0.1,
        density: 0.9,
    };
    pub const RUBBER: Self = Self {
        friction: 0.9,
        restitution: 0.8,
        density: 1.1,
    };
    pub const METAL: Self = Self {
        friction: 0.3,
        restitution: 0.2,
        density: 7.8,
    };
    pub const WOOD: Self = Self {
        friction: 0.5,
        restitution: 0.2,
        density: 0.6,
    };

    pub fn new(friction: f32, restitution: f32, density: f32) -> Self {
        Self {
            friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
            density: density.max(0.0),
        }
    }

    /// Pairwise combination: geometric mean friction, the bouncier side's
    /// restitution.
    pub fn combine(&self, other: &Self) -> (f32, f32) {
        (
            (self.friction * other.friction).sqrt(),
            self.restitution.max(other.restitution),
        )
    }
}

/// A shape with its material, filter and sensor flag. Owned by exactly one
/// body; compound shapes nest further colliders.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Collider {
    pub shape: Shape,
    pub material: Material,
    pub filter: CollisionFilter,
    pub is_sensor: bool,
}

impl Collider {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            material: Material::default(),
            filter: CollisionFilter::default(),
            is_sensor: false,
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// Handle returned by `PhysicsWorld::set_collider`. One collider per body,
/// so the handle is the owning body's key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub BodyKey);

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(category: u32, mask: u32, group: i32) -> CollisionFilter {
        CollisionFilter {
            category: CategoryBits::from_bits_retain(category),
            mask: CategoryBits::from_bits_retain(mask),
            group,
        }
    }

    #[test]
    fn default_filters_collide() {
        let a = CollisionFilter::default();
        let b = CollisionFilter::default();
        assert!(a.should_collide(&b));
    }

    #[test]
    fn positive_group_overrides_mask() {
        let a = filter(0x1, 0x0, 3);
        let b = filter(0x2, 0x0, 3);
        assert!(a.should_collide(&b));
    }

    #[test]
    fn negative_group_overrides_mask() {
        let a = filter(0x1, CategoryBits::ALL.bits(), -2);
        let b = filter(0x1, CategoryBits::ALL.bits(), -2);
        assert!(!a.should_collide(&b));
    }

    #[test]
    fn mask_must_accept_both_ways() {
        let a = filter(0x1, 0x2, 0);
        let b = filter(0x2, 0x1, 0);
        assert!(a.should_collide(&b));

        let c = filter(0x2, 0x4, 0);
        assert!(!a.should_collide(&c));
    }

    #[test]
    fn should_collide_is_symmetric() {
        let cases = [
            filter(0x1, 0x3, 0),
            filter(0x2, 0x1, 0),
            filter(0x4, 0x4, 1),
            filter(0x8, 0xff, 1),
            filter(0x1, 0xff, -1),
            filter(0x2, 0x0, -1),
        ];
        for a in &cases {
            for b in &cases {
                assert_eq!(
                    a.should_collide(b),
                    b.should_collide(a),
                    "asymmetric for {a:?} vs {b:?}"
                );
            }
        }
    }

    #[test]
    fn material_combination() {
        let (friction, restitution) = Material::ICE.combine(&Material::RUBBER);
        assert!((friction - (0.05f32 * 0.9).sqrt()).abs() < 1e-6);
        assert_eq!(restitution, 0.8);
    }
}
