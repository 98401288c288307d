use crate::body::{BodySet, RigidBody};
use crate::collide::{ManifoldKind, WorldManifold, LINEAR_SLOP, MAX_MANIFOLD_POINTS};
use crate::contact::{BodyPair, Contact, ContactGraph};
use crate::math::{cross, cross_scalar, Rot2};
use glam::Vec2;

/// Approach speed below which restitution is ignored. Keeps resting
/// contacts from jittering off the ground.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Fraction of the position error corrected per position iteration.
const BAUMGARTE: f32 = 0.2;

/// Cap on a single position correction, to avoid overshoot on deep
/// penetrations.
const MAX_CORRECTION: f32 = 0.2;

#[derive(Copy, Clone, Default)]
struct VelocityPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_mass: f32,
    tangent_mass: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
}

/// Per-contact constraint state, rebuilt every step. Only the accumulated
/// impulses survive between steps (inside the contact manifold).
struct Constraint {
    pair: BodyPair,
    normal: Vec2,
    friction: f32,
    restitution_bias: f32,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_inertia_a: f32,
    inv_inertia_b: f32,
    points: [VelocityPoint; MAX_MANIFOLD_POINTS],
    count: usize,
    // local-frame manifold copy for the position pass, which must
    // re-evaluate penetration under the corrected transforms
    kind: ManifoldKind,
    local_normal: Vec2,
    local_point: Vec2,
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    radius_a: f32,
    radius_b: f32,
}

/// Sequential impulse contact solver: PreSolve -> WarmStart -> velocity
/// iterations -> (integration by the caller) -> position iterations.
#[derive(Default)]
pub struct ContactSolver {
    constraints: Vec<Constraint>,
}

#[inline]
fn tangent_of(normal: Vec2) -> Vec2 {
    // one tangent axis in 2D, right of the normal
    Vec2::new(normal.y, -normal.x)
}

/// Velocity of the contact point on body B relative to the same point on A.
#[inline]
fn relative_velocity(body_a: &RigidBody, body_b: &RigidBody, point: &VelocityPoint) -> Vec2 {
    body_b.linear_velocity + cross_scalar(body_b.angular_velocity, point.r_b)
        - body_a.linear_velocity
        - cross_scalar(body_a.angular_velocity, point.r_a)
}

impl ContactSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build constraints for every touching, non-sensor contact with at
    /// least one dynamic body: effective masses per point, and one
    /// restitution bias taken at the deepest point.
    pub fn pre_solve<'a>(
        &mut self,
        bodies: &BodySet,
        contacts: impl Iterator<Item = &'a Contact>,
    ) {
        self.constraints.clear();

        for contact in contacts {
            if !contact.touching || contact.sensor {
                continue;
            }
            let (Some(body_a), Some(body_b)) =
                (bodies.get(contact.pair.a), bodies.get(contact.pair.b))
            else {
                continue;
            };
            if !body_a.is_dynamic() && !body_b.is_dynamic() {
                continue;
            }

            let manifold = &contact.manifold;
            let world = WorldManifold::new(manifold, &body_a.transform, &body_b.transform);
            let normal = world.normal;
            let tangent = tangent_of(normal);
            let center_a = body_a.world_center();
            let center_b = body_b.world_center();

            let mut constraint = Constraint {
                pair: contact.pair,
                normal,
                friction: contact.friction,
                restitution_bias: 0.0,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_inertia_a: body_a.inv_inertia,
                inv_inertia_b: body_b.inv_inertia,
                points: [VelocityPoint::default(); MAX_MANIFOLD_POINTS],
                count: manifold.count,
                kind: manifold.kind,
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                radius_a: manifold.radius_a,
                radius_b: manifold.radius_b,
            };

            for i in 0..manifold.count {
                let point = &mut constraint.points[i];
                point.r_a = world.points[i] - center_a;
                point.r_b = world.points[i] - center_b;

                let rn_a = cross(point.r_a, normal);
                let rn_b = cross(point.r_b, normal);
                let k_normal = constraint.inv_mass_a
                    + constraint.inv_mass_b
                    + constraint.inv_inertia_a * rn_a * rn_a
                    + constraint.inv_inertia_b * rn_b * rn_b;
                point.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(point.r_a, tangent);
                let rt_b = cross(point.r_b, tangent);
                let k_tangent = constraint.inv_mass_a
                    + constraint.inv_mass_b
                    + constraint.inv_inertia_a * rt_a * rt_a
                    + constraint.inv_inertia_b * rt_b * rt_b;
                point.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                point.normal_impulse = manifold.points[i].normal_impulse;
                point.tangent_impulse = manifold.points[i].tangent_impulse;
                constraint.local_points[i] = manifold.points[i].local_point;
            }

            // restitution bias once per contact, at the deepest point
            let mut deepest = 0;
            for i in 1..manifold.count {
                if world.separations[i] < world.separations[deepest] {
                    deepest = i;
                }
            }
            let approach =
                normal.dot(relative_velocity(body_a, body_b, &constraint.points[deepest]));
            if approach < -VELOCITY_THRESHOLD {
                constraint.restitution_bias = -contact.restitution * approach;
            }

            self.constraints.push(constraint);
        }

        // the contact cache iterates in hash order; impulses accumulate, so
        // the solve order must not depend on it
        self.constraints.sort_unstable_by_key(|c| c.pair);
    }

    /// Apply last frame's accumulated impulses so the iterations start near
    /// the converged solution.
    pub fn warm_start(&mut self, bodies: &mut BodySet) {
        for constraint in &self.constraints {
            let Some((body_a, body_b)) = bodies.get_pair_mut(constraint.pair.a, constraint.pair.b)
            else {
                continue;
            };
            let tangent = tangent_of(constraint.normal);
            for point in &constraint.points[..constraint.count] {
                let impulse =
                    point.normal_impulse * constraint.normal + point.tangent_impulse * tangent;
                body_a.linear_velocity -= constraint.inv_mass_a * impulse;
                body_a.angular_velocity -= constraint.inv_inertia_a * cross(point.r_a, impulse);
                body_b.linear_velocity += constraint.inv_mass_b * impulse;
                body_b.angular_velocity += constraint.inv_inertia_b * cross(point.r_b, impulse);
            }
        }
    }

    /// One velocity iteration over all contacts: friction first, clamped to
    /// the cone, then the normal with its non-negativity clamp.
    pub fn solve_velocity(&mut self, bodies: &mut BodySet) {
        for constraint in &mut self.constraints {
            let Some((body_a, body_b)) = bodies.get_pair_mut(constraint.pair.a, constraint.pair.b)
            else {
                continue;
            };
            let normal = constraint.normal;
            let tangent = tangent_of(normal);

            for point in &mut constraint.points[..constraint.count] {
                let dv = relative_velocity(body_a, body_b, point);
                let vt = dv.dot(tangent);
                let lambda = point.tangent_mass * -vt;

                // friction cone: |tangent impulse| <= friction * normal impulse
                let max_friction = constraint.friction * point.normal_impulse;
                let new_impulse =
                    (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - point.tangent_impulse;
                point.tangent_impulse = new_impulse;

                let impulse = lambda * tangent;
                body_a.linear_velocity -= constraint.inv_mass_a * impulse;
                body_a.angular_velocity -= constraint.inv_inertia_a * cross(point.r_a, impulse);
                body_b.linear_velocity += constraint.inv_mass_b * impulse;
                body_b.angular_velocity += constraint.inv_inertia_b * cross(point.r_b, impulse);
            }

            for point in &mut constraint.points[..constraint.count] {
                let dv = relative_velocity(body_a, body_b, point);
                let vn = dv.dot(normal);
                let lambda = -point.normal_mass * (vn - constraint.restitution_bias);

                // accumulated impulse stays non-negative
                let new_impulse = (point.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - point.normal_impulse;
                point.normal_impulse = new_impulse;

                let impulse = lambda * normal;
                body_a.linear_velocity -= constraint.inv_mass_a * impulse;
                body_a.angular_velocity -= constraint.inv_inertia_a * cross(point.r_a, impulse);
                body_b.linear_velocity += constraint.inv_mass_b * impulse;
                body_b.angular_velocity += constraint.inv_inertia_b * cross(point.r_b, impulse);
            }
        }
    }

    /// Persist the accumulated impulses into the contact cache for next
    /// frame's warm start.
    pub fn store_impulses(&self, graph: &mut ContactGraph) {
        for constraint in &self.constraints {
            let Some(contact) = graph.get_mut(constraint.pair) else {
                continue;
            };
            for i in 0..constraint.count {
                contact.manifold.points[i].normal_impulse = constraint.points[i].normal_impulse;
                contact.manifold.points[i].tangent_impulse = constraint.points[i].tangent_impulse;
            }
        }
    }

    /// One Baumgarte position iteration: recompute penetration under the
    /// corrected transforms and nudge positions directly (not velocities).
    /// Returns true once the worst separation is within tolerance, so the
    /// caller can stop early.
    pub fn solve_position(&mut self, bodies: &mut BodySet) -> bool {
        let mut min_separation = 0.0f32;

        for constraint in &self.constraints {
            let Some((body_a, body_b)) = bodies.get_pair_mut(constraint.pair.a, constraint.pair.b)
            else {
                continue;
            };

            let mut center_a = body_a.world_center();
            let mut angle_a = body_a.transform.rotation.angle();
            let mut center_b = body_b.world_center();
            let mut angle_b = body_b.transform.rotation.angle();

            for i in 0..constraint.count {
                let xf_a = transform_about_center(center_a, angle_a, body_a.local_center);
                let xf_b = transform_about_center(center_b, angle_b, body_b.local_center);

                let (normal, point, separation) = match constraint.kind {
                    ManifoldKind::Circles => {
                        let point_a = xf_a.transform_point(constraint.local_point);
                        let point_b = xf_b.transform_point(constraint.local_points[0]);
                        let d = point_b - point_a;
                        let normal = if d.length_squared() > 1e-12 {
                            d.normalize()
                        } else {
                            Vec2::X
                        };
                        (
                            normal,
                            0.5 * (point_a + point_b),
                            d.length() - constraint.radius_a - constraint.radius_b,
                        )
                    }
                    ManifoldKind::FaceA => {
                        let normal = xf_a.rotation.rotate(constraint.local_normal);
                        let plane = xf_a.transform_point(constraint.local_point);
                        let clip = xf_b.transform_point(constraint.local_points[i]);
                        let separation = (clip - plane).dot(normal)
                            - constraint.radius_a
                            - constraint.radius_b;
                        (normal, clip, separation)
                    }
                    ManifoldKind::FaceB => {
                        let normal = xf_b.rotation.rotate(constraint.local_normal);
                        let plane = xf_b.transform_point(constraint.local_point);
                        let clip = xf_a.transform_point(constraint.local_points[i]);
                        let separation = (clip - plane).dot(normal)
                            - constraint.radius_a
                            - constraint.radius_b;
                        // flip so the push is from A towards B
                        (-normal, clip, separation)
                    }
                };

                min_separation = min_separation.min(separation);

                let correction =
                    (BAUMGARTE * (separation + LINEAR_SLOP)).clamp(-MAX_CORRECTION, 0.0);

                let r_a = point - center_a;
                let r_b = point - center_b;
                let rn_a = cross(r_a, normal);
                let rn_b = cross(r_b, normal);
                let k = constraint.inv_mass_a
                    + constraint.inv_mass_b
                    + constraint.inv_inertia_a * rn_a * rn_a
                    + constraint.inv_inertia_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -correction / k } else { 0.0 };
                let push = impulse * normal;

                center_a -= constraint.inv_mass_a * push;
                angle_a -= constraint.inv_inertia_a * cross(r_a, push);
                center_b += constraint.inv_mass_b * push;
                angle_b += constraint.inv_inertia_b * cross(r_b, push);
            }

            write_center_transform(body_a, center_a, angle_a);
            write_center_transform(body_b, center_b, angle_b);
        }

        min_separation >= -3.0 * LINEAR_SLOP
    }
}

/// Transform with the given center-of-mass position and angle.
#[inline]
fn transform_about_center(center: Vec2, angle: f32, local_center: Vec2) -> crate::math::Transform2d {
    let rotation = Rot2::from_angle(angle);
    crate::math::Transform2d {
        position: center - rotation.rotate(local_center),
        rotation,
    }
}

#[inline]
fn write_center_transform(body: &mut RigidBody, center: Vec2, angle: f32) {
    body.transform = transform_about_center(center, angle, body.local_center);
}
