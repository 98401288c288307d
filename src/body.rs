use crate::bounds::Bounds;
use crate::bvh::NULL_NODE;
use crate::collider::Collider;
use crate::math::{cross, Transform2d};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational key to a rigid body. Stale keys (removed bodies, reused
    /// slots) resolve to `None` instead of aliasing a different body.
    pub struct BodyKey;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves, infinite mass.
    Static,
    /// Moved by velocity only, infinite mass, unaffected by forces.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

/// Descriptor for `PhysicsWorld::create_body`. The host owns persistence;
/// descriptors serialize, live bodies do not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BodyDesc {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub collider: Option<Collider>,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            collider: None,
        }
    }
}

impl BodyDesc {
    pub fn dynamic() -> Self {
        Self::default()
    }

    pub fn fixed() -> Self {
        Self {
            body_type: BodyType::Static,
            ..Self::default()
        }
    }

    pub fn kinematic() -> Self {
        Self {
            body_type: BodyType::Kinematic,
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_velocity(mut self, linear: Vec2, angular: f32) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }
}

#[derive(Clone, Debug)]
pub struct RigidBody {
    pub body_type: BodyType,
    pub transform: Transform2d,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub force: Vec2,
    pub torque: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub collider: Option<Collider>,
    pub(crate) inv_mass: f32,
    pub(crate) inv_inertia: f32,
    pub(crate) local_center: Vec2,
    /// Broad phase leaf, `NULL_NODE` when the body has no collider.
    pub(crate) proxy: u32,
    /// Index into the active list, `usize::MAX` when inactive.
    pub(crate) active_index: usize,
}

impl RigidBody {
    fn from_desc(desc: &BodyDesc) -> Self {
        let mut body = Self {
            body_type: desc.body_type,
            transform: Transform2d::new(desc.position, desc.angle),
            linear_velocity: desc.linear_velocity,
            angular_velocity: desc.angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            gravity_scale: desc.gravity_scale,
            collider: desc.collider.clone(),
            inv_mass: 0.0,
            inv_inertia: 0.0,
            local_center: Vec2::ZERO,
            proxy: NULL_NODE,
            active_index: usize::MAX,
        };
        body.reset_mass_data();
        body
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    #[inline]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    #[inline]
    pub fn inv_inertia(&self) -> f32 {
        self.inv_inertia
    }

    pub fn mass(&self) -> f32 {
        if self.inv_mass > 0.0 {
            1.0 / self.inv_mass
        } else {
            0.0
        }
    }

    /// Center of mass in world space.
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.transform.transform_point(self.local_center)
    }

    /// Recompute mass, inertia and center of mass from the collider.
    /// Static and kinematic bodies always have infinite mass.
    pub fn reset_mass_data(&mut self) {
        self.inv_mass = 0.0;
        self.inv_inertia = 0.0;
        self.local_center = Vec2::ZERO;

        let Some(collider) = &self.collider else {
            return;
        };
        let md = collider.shape.mass_data(collider.material.density);
        self.local_center = md.center;

        if self.body_type != BodyType::Dynamic {
            return;
        }

        if md.mass > 0.0 {
            self.inv_mass = 1.0 / md.mass;
            if md.inertia > 0.0 {
                self.inv_inertia = 1.0 / md.inertia;
            }
        } else {
            // massless collider (edge, sensor-only compound) on a dynamic
            // body: give it unit mass so it still integrates
            self.inv_mass = 1.0;
        }
    }

    /// Tight world bounds of the collider, if any.
    pub fn bounds(&self) -> Option<Bounds> {
        self.collider
            .as_ref()
            .map(|c| c.shape.bounds(&self.transform))
    }

    pub fn apply_force(&mut self, force: Vec2) {
        if self.is_dynamic() {
            self.force += force;
        }
    }

    pub fn apply_force_at_point(&mut self, force: Vec2, point: Vec2) {
        if self.is_dynamic() {
            self.force += force;
            self.torque += cross(point - self.world_center(), force);
        }
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if self.is_dynamic() {
            self.torque += torque;
        }
    }

    pub fn apply_impulse_linear(&mut self, impulse: Vec2) {
        self.linear_velocity += self.inv_mass * impulse;
    }

    pub fn apply_impulse_angular(&mut self, impulse: f32) {
        self.angular_velocity += self.inv_inertia * impulse;
    }

    pub fn apply_impulse_at_point(&mut self, impulse: Vec2, point: Vec2) {
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_inertia * cross(point - self.world_center(), impulse);
    }
}

/// Body storage: slotmap for generational lookup plus a dense list of
/// active (non-static) bodies for iteration and island building.
#[derive(Default)]
pub struct BodySet {
    bodies: SlotMap<BodyKey, RigidBody>,
    active: Vec<BodyKey>,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, desc: &BodyDesc) -> BodyKey {
        let key = self.bodies.insert(RigidBody::from_desc(desc));
        if self.bodies[key].body_type != BodyType::Static {
            self.activate(key);
        }
        key
    }

    /// The caller (the world) must have removed the broad phase proxy first.
    pub fn remove(&mut self, key: BodyKey) -> Option<RigidBody> {
        if let Some(body) = self.bodies.get(key) {
            debug_assert!(body.proxy == NULL_NODE, "proxy must be removed first");
        }
        self.deactivate(key);
        self.bodies.remove(key)
    }

    fn activate(&mut self, key: BodyKey) {
        let index = self.active.len();
        let body = &mut self.bodies[key];
        if body.active_index == usize::MAX {
            body.active_index = index;
            self.active.push(key);
        }
    }

    /// O(1) removal from the active list via swap-with-last.
    fn deactivate(&mut self, key: BodyKey) {
        let Some(body) = self.bodies.get_mut(key) else {
            return;
        };
        let index = body.active_index;
        if index == usize::MAX {
            return;
        }
        body.active_index = usize::MAX;
        self.active.swap_remove(index);
        if index < self.active.len() {
            let moved = self.active[index];
            self.bodies[moved].active_index = index;
        }
    }

    #[inline]
    pub fn get(&self, key: BodyKey) -> Option<&RigidBody> {
        self.bodies.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody> {
        self.bodies.get_mut(key)
    }

    /// Disjoint mutable access to two bodies.
    pub fn get_pair_mut(
        &mut self,
        a: BodyKey,
        b: BodyKey,
    ) -> Option<(&mut RigidBody, &mut RigidBody)> {
        let [body_a, body_b] = self.bodies.get_disjoint_mut([a, b])?;
        Some((body_a, body_b))
    }

    /// Keys of all non-static bodies, densely packed.
    #[inline]
    pub fn active(&self) -> &[BodyKey] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyKey, &RigidBody)> {
        self.bodies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Shape;

    #[test]
    fn stale_key_returns_none() {
        let mut bodies = BodySet::new();
        let key = bodies.insert(&BodyDesc::dynamic());
        assert!(bodies.get(key).is_some());
        bodies.remove(key);
        assert!(bodies.get(key).is_none());

        let replacement = bodies.insert(&BodyDesc::dynamic());
        assert!(bodies.get(key).is_none());
        assert!(bodies.get(replacement).is_some());
    }

    #[test]
    fn static_bodies_are_not_active() {
        let mut bodies = BodySet::new();
        let fixed = bodies.insert(&BodyDesc::fixed());
        let dynamic = bodies.insert(&BodyDesc::dynamic());
        let kinematic = bodies.insert(&BodyDesc::kinematic());
        assert_eq!(bodies.active().len(), 2);
        assert!(!bodies.active().contains(&fixed));
        assert!(bodies.active().contains(&dynamic));
        assert!(bodies.active().contains(&kinematic));
    }

    #[test]
    fn deactivate_swaps_with_last() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(&BodyDesc::dynamic());
        let b = bodies.insert(&BodyDesc::dynamic());
        let c = bodies.insert(&BodyDesc::dynamic());
        bodies.remove(a);
        assert_eq!(bodies.active().len(), 2);
        // c was swapped into a's slot, its back index must follow
        for &key in bodies.active() {
            let index = bodies.get(key).unwrap().active_index;
            assert_eq!(bodies.active()[index], key);
        }
        assert!(bodies.active().contains(&b));
        assert!(bodies.active().contains(&c));
    }

    #[test]
    fn mass_from_collider() {
        let mut bodies = BodySet::new();
        let key = bodies.insert(
            &BodyDesc::dynamic().with_collider(Collider::new(Shape::rect(0.5, 0.5))),
        );
        let body = bodies.get(key).unwrap();
        assert!((body.mass() - 1.0).abs() < 1e-5);
        assert!(body.inv_inertia() > 0.0);
    }

    #[test]
    fn static_body_has_infinite_mass() {
        let mut bodies = BodySet::new();
        let key = bodies
            .insert(&BodyDesc::fixed().with_collider(Collider::new(Shape::rect(10.0, 1.0))));
        let body = bodies.get(key).unwrap();
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.inv_inertia(), 0.0);
    }

    #[test]
    fn massless_dynamic_body_gets_unit_mass() {
        let mut bodies = BodySet::new();
        let key = bodies.insert(&BodyDesc::dynamic().with_collider(Collider::new(
            Shape::edge(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)),
        )));
        let body = bodies.get(key).unwrap();
        assert_eq!(body.inv_mass(), 1.0);
        assert_eq!(body.inv_inertia(), 0.0);
    }

    #[test]
    fn impulses_respect_inverse_mass() {
        let mut bodies = BodySet::new();
        let key = bodies.insert(
            &BodyDesc::dynamic().with_collider(Collider::new(Shape::circle(1.0))),
        );
        let body = bodies.get_mut(key).unwrap();
        let inv_mass = body.inv_mass();
        body.apply_impulse_linear(Vec2::new(1.0, 0.0));
        assert!((body.linear_velocity.x - inv_mass).abs() < 1e-6);

        // impulse off-center also spins the body
        body.apply_impulse_at_point(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0));
        assert!(body.angular_velocity > 0.0);
    }
}
