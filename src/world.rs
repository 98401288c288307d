use crate::body::{BodyDesc, BodyKey, BodySet, RigidBody};
use crate::bounds::Bounds;
use crate::broadphase::BroadPhase;
use crate::bvh::NULL_NODE;
use crate::collider::{Collider, ColliderHandle};
use crate::contact::{BodyPair, Contact, ContactGraph, ContactListener};
use crate::island::Islands;
use crate::math::Rot2;
use crate::solver::ContactSolver;
use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: Vec2,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -10.0),
            velocity_iterations: 8,
            position_iterations: 8,
            warm_starting: true,
        }
    }
}

/// The physics world: bodies, broad phase, contact cache, solver and
/// islands behind one synchronous `update`.
///
/// Bodies must not be read while `update` runs (single-threaded, so the
/// borrow checker enforces this); between steps every accessor is safe.
pub struct PhysicsWorld {
    pub config: PhysicsConfig,
    bodies: BodySet,
    broadphase: BroadPhase,
    contacts: ContactGraph,
    solver: ContactSolver,
    islands: Islands,
    listener: Option<Box<dyn ContactListener>>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            config,
            bodies: BodySet::new(),
            broadphase: BroadPhase::new(),
            contacts: ContactGraph::new(),
            solver: ContactSolver::new(),
            islands: Islands::new(),
            listener: None,
        }
    }

    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.listener = Some(listener);
    }

    pub fn create_body(&mut self, desc: &BodyDesc) -> BodyKey {
        let key = self.bodies.insert(desc);
        if let Some(bounds) = self.bodies.get(key).and_then(RigidBody::bounds) {
            let proxy = self.broadphase.create_proxy(key, bounds);
            self.bodies.get_mut(key).unwrap().proxy = proxy;
        }
        key
    }

    /// Removal order matters: broad phase proxy first, then contacts (end
    /// events fire for anything still touching), then the active set, and
    /// only then is the id freed for reuse.
    pub fn remove_body(&mut self, key: BodyKey) -> bool {
        let Some(body) = self.bodies.get_mut(key) else {
            return false;
        };
        let proxy = body.proxy;
        body.proxy = NULL_NODE;
        if proxy != NULL_NODE {
            self.broadphase.destroy_proxy(proxy);
        }

        let ended = self.contacts.remove_body_contacts(key);
        if let Some(listener) = &mut self.listener {
            for contact in &ended {
                listener.on_contact_end(contact);
            }
        }

        self.bodies.remove(key);
        true
    }

    /// Attach (or replace) the body's collider, recomputing mass and the
    /// broad phase proxy.
    pub fn set_collider(&mut self, key: BodyKey, collider: Collider) -> Option<ColliderHandle> {
        let body = self.bodies.get_mut(key)?;
        let old_proxy = body.proxy;
        body.proxy = NULL_NODE;
        body.collider = Some(collider);
        body.reset_mass_data();
        let bounds = body.bounds().expect("collider was just set");

        if old_proxy != NULL_NODE {
            self.broadphase.destroy_proxy(old_proxy);
        }
        let proxy = self.broadphase.create_proxy(key, bounds);
        self.bodies.get_mut(key).unwrap().proxy = proxy;
        Some(ColliderHandle(key))
    }

    #[inline]
    pub fn body(&self, key: BodyKey) -> Option<&RigidBody> {
        self.bodies.get(key)
    }

    /// Direct mutable access. Transform writes on static bodies bypass the
    /// broad phase; use `set_transform` for those.
    #[inline]
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody> {
        self.bodies.get_mut(key)
    }

    pub fn position(&self, key: BodyKey) -> Option<Vec2> {
        self.bodies.get(key).map(|b| b.transform.position)
    }

    pub fn angle(&self, key: BodyKey) -> Option<f32> {
        self.bodies.get(key).map(|b| b.transform.rotation.angle())
    }

    pub fn velocity(&self, key: BodyKey) -> Option<(Vec2, f32)> {
        self.bodies
            .get(key)
            .map(|b| (b.linear_velocity, b.angular_velocity))
    }

    /// Teleport a body and keep its broad phase proxy in sync.
    pub fn set_transform(&mut self, key: BodyKey, position: Vec2, angle: f32) -> bool {
        let Some(body) = self.bodies.get_mut(key) else {
            return false;
        };
        body.transform = crate::math::Transform2d::new(position, angle);
        let proxy = body.proxy;
        if proxy != NULL_NODE {
            let bounds = body.bounds().expect("proxied body has a collider");
            self.broadphase.move_proxy(proxy, bounds, Vec2::ZERO);
        }
        true
    }

    pub fn set_velocity(&mut self, key: BodyKey, linear: Vec2, angular: f32) -> bool {
        let Some(body) = self.bodies.get_mut(key) else {
            return false;
        };
        body.linear_velocity = linear;
        body.angular_velocity = angular;
        true
    }

    pub fn apply_force(&mut self, key: BodyKey, force: Vec2) {
        if let Some(body) = self.bodies.get_mut(key) {
            body.apply_force(force);
        }
    }

    pub fn apply_impulse(&mut self, key: BodyKey, impulse: Vec2) {
        if let Some(body) = self.bodies.get_mut(key) {
            body.apply_impulse_linear(impulse);
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn contact(&self, a: BodyKey, b: BodyKey) -> Option<&Contact> {
        self.contacts.get(BodyPair::new(a, b))
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.contacts()
    }

    /// Islands from the last step.
    pub fn islands(&self) -> &Islands {
        &self.islands
    }

    /// Bodies whose fat bounds intersect the query box.
    pub fn query_aabb(&self, bounds: Bounds, mut callback: impl FnMut(BodyKey)) {
        self.broadphase.query(bounds, |_, key| callback(key));
    }

    /// Bodies whose fat bounds the ray passes through.
    pub fn query_ray(
        &self,
        origin: Vec2,
        dir: Vec2,
        max_distance: f32,
        mut callback: impl FnMut(BodyKey),
    ) {
        self.broadphase
            .query_ray(origin, dir, max_distance, |_, key| callback(key));
    }

    /// Advance the simulation. The order is load-bearing: impulses
    /// accumulate, so velocity iterations must run between warm start and
    /// integration, and position correction after integration.
    pub fn update(&mut self, delta_seconds: f32) {
        if delta_seconds <= 0.0 {
            return;
        }

        // integrate forces into velocities (symplectic Euler, first half)
        let gravity = self.config.gravity;
        for i in 0..self.bodies.active().len() {
            let key = self.bodies.active()[i];
            let body = self.bodies.get_mut(key).unwrap();
            if !body.is_dynamic() {
                continue; // kinematic: velocity is driven by the host
            }
            body.linear_velocity +=
                delta_seconds * (gravity * body.gravity_scale + body.inv_mass * body.force);
            body.angular_velocity += delta_seconds * body.inv_inertia * body.torque;
            body.linear_velocity /= 1.0 + delta_seconds * body.linear_damping;
            body.angular_velocity /= 1.0 + delta_seconds * body.angular_damping;
        }

        // broad phase sync: only bodies that left their fat bounds re-insert
        for i in 0..self.bodies.active().len() {
            let key = self.bodies.active()[i];
            let body = self.bodies.get(key).unwrap();
            if body.proxy == NULL_NODE {
                continue;
            }
            let proxy = body.proxy;
            let bounds = body.bounds().expect("proxied body has a collider");
            let displacement = body.linear_velocity * delta_seconds;
            self.broadphase.move_proxy(proxy, bounds, displacement);
        }

        // candidate pairs -> narrow phase -> begin/end diffing
        self.contacts.update(
            &self.bodies,
            self.broadphase.update_pairs(),
            self.config.warm_starting,
        );

        if let Some(listener) = &mut self.listener {
            for &pair in self.contacts.begun() {
                if let Some(contact) = self.contacts.get(pair) {
                    listener.on_contact_begin(contact);
                }
            }
            for contact in self.contacts.ended() {
                listener.on_contact_end(contact);
            }
        }

        // solve velocities
        self.solver.pre_solve(&self.bodies, self.contacts.contacts());
        if self.config.warm_starting {
            self.solver.warm_start(&mut self.bodies);
        }
        for _ in 0..self.config.velocity_iterations {
            self.solver.solve_velocity(&mut self.bodies);
        }
        self.solver.store_impulses(&mut self.contacts);

        // integrate positions about the center of mass, then drop forces
        for i in 0..self.bodies.active().len() {
            let key = self.bodies.active()[i];
            let body = self.bodies.get_mut(key).unwrap();
            let center = body.world_center() + body.linear_velocity * delta_seconds;
            let angle = body.transform.rotation.angle() + body.angular_velocity * delta_seconds;
            let rotation = Rot2::from_angle(angle);
            body.transform.position = center - rotation.rotate(body.local_center);
            body.transform.rotation = rotation;
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }

        // position correction, stopping once penetration is within slop
        for _ in 0..self.config.position_iterations {
            if self.solver.solve_position(&mut self.bodies) {
                break;
            }
        }

        self.islands.build(&self.bodies, &self.contacts);
    }
}
