use crate::body::{BodyKey, BodySet};
use crate::collide::{collide, Manifold};
use std::collections::HashMap;

/// Unordered body pair as a cache key: always stored (min, max) so lookup
/// order is irrelevant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyPair {
    pub a: BodyKey,
    pub b: BodyKey,
}

impl BodyPair {
    pub fn new(x: BodyKey, y: BodyKey) -> Self {
        debug_assert!(x != y);
        if x < y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }
}

/// Persistent contact state for one body pair.
#[derive(Clone, Debug)]
pub struct Contact {
    pub pair: BodyPair,
    pub manifold: Manifold,
    pub friction: f32,
    pub restitution: f32,
    pub touching: bool,
    pub sensor: bool,
}

/// Begin/end notifications, invoked synchronously during the step.
/// Implementations must not call back into the world.
pub trait ContactListener {
    fn on_contact_begin(&mut self, _contact: &Contact) {}
    fn on_contact_end(&mut self, _contact: &Contact) {}
}

/// Double-buffered contact cache. Each step the old map becomes the lookup
/// side and the new map is rebuilt, so begin/end diffing needs no extra
/// bookkeeping and steady state allocates nothing.
#[derive(Default)]
pub struct ContactGraph {
    current: HashMap<BodyPair, Contact>,
    previous: HashMap<BodyPair, Contact>,
    begun: Vec<BodyPair>,
    ended: Vec<Contact>,
    scratch: Vec<BodyPair>,
}

impl ContactGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run narrow phase over this step's candidate pairs plus last step's
    /// surviving pairs, diffing touch state against the previous frame.
    /// `pairs` must be sorted and deduplicated (the broad phase guarantees
    /// this).
    pub fn update(&mut self, bodies: &BodySet, pairs: &[(BodyKey, BodyKey)], warm_starting: bool) {
        debug_assert!(pairs.windows(2).all(|w| w[0] < w[1]));
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
        self.begun.clear();
        self.ended.clear();

        for &(a, b) in pairs {
            self.process_pair(bodies, BodyPair::new(a, b), warm_starting);
        }

        // pairs that were touching but had no moved proxy this step still
        // need a narrow phase pass (the bodies may have rotated in place);
        // `pairs` is sorted, so membership is a binary search
        self.scratch.clear();
        self.scratch.extend(
            self.previous
                .keys()
                .filter(|pair| {
                    !self.current.contains_key(pair)
                        && pairs.binary_search(&(pair.a, pair.b)).is_err()
                })
                .copied(),
        );
        for i in 0..self.scratch.len() {
            let pair = self.scratch[i];
            self.process_pair(bodies, pair, warm_starting);
        }
    }

    fn process_pair(&mut self, bodies: &BodySet, pair: BodyPair, warm_starting: bool) {
        if self.current.contains_key(&pair) {
            return;
        }
        let was_touching = self
            .previous
            .get(&pair)
            .map(|c| c.touching)
            .unwrap_or(false);

        let (Some(body_a), Some(body_b)) = (bodies.get(pair.a), bodies.get(pair.b)) else {
            // removal is handled eagerly in remove_body_contacts; a missing
            // body here just means the pair is gone
            return;
        };
        // contacts need at least one dynamic body; sensors included
        if !body_a.is_dynamic() && !body_b.is_dynamic() {
            return;
        }
        let (Some(collider_a), Some(collider_b)) = (&body_a.collider, &body_b.collider) else {
            return;
        };
        if !collider_a.filter.should_collide(&collider_b.filter) {
            return;
        }

        let manifold = collide(
            &collider_a.shape,
            &body_a.transform,
            &collider_b.shape,
            &body_b.transform,
        );

        match manifold {
            Some(mut manifold) if manifold.count > 0 => {
                if warm_starting {
                    if let Some(old) = self.previous.get(&pair) {
                        manifold.carry_impulses(&old.manifold);
                    }
                }
                let (friction, restitution) = collider_a.material.combine(&collider_b.material);
                let contact = Contact {
                    pair,
                    manifold,
                    friction,
                    restitution,
                    touching: true,
                    sensor: collider_a.is_sensor || collider_b.is_sensor,
                };
                if !was_touching {
                    self.begun.push(pair);
                }
                self.current.insert(pair, contact);
            }
            _ => {
                if was_touching {
                    let mut ended = self.previous[&pair].clone();
                    ended.touching = false;
                    ended.manifold.zero_impulses();
                    self.ended.push(ended);
                }
            }
        }
    }

    /// Drop every contact involving `key`, returning the touching ones so
    /// the caller can fire end events. Must run before the body id is freed.
    pub fn remove_body_contacts(&mut self, key: BodyKey) -> Vec<Contact> {
        let mut removed = Vec::new();
        self.current.retain(|pair, contact| {
            if pair.a == key || pair.b == key {
                if contact.touching {
                    let mut ended = contact.clone();
                    ended.touching = false;
                    removed.push(ended);
                }
                false
            } else {
                true
            }
        });
        self.previous
            .retain(|pair, _| pair.a != key && pair.b != key);
        removed
    }

    pub fn get(&self, pair: BodyPair) -> Option<&Contact> {
        self.current.get(&pair)
    }

    pub fn get_mut(&mut self, pair: BodyPair) -> Option<&mut Contact> {
        self.current.get_mut(&pair)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.current.values()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Pairs that started touching this step.
    pub fn begun(&self) -> &[BodyPair] {
        &self.begun
    }

    /// Contacts that stopped touching this step, impulses already dropped.
    pub fn ended(&self) -> &[Contact] {
        &self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDesc;
    use crate::collider::{CollisionFilter, Collider};
    use crate::shapes::Shape;
    use glam::Vec2;

    fn circle_body(bodies: &mut BodySet, position: Vec2) -> BodyKey {
        bodies.insert(
            &BodyDesc::dynamic()
                .with_position(position)
                .with_collider(Collider::new(Shape::circle(1.0))),
        )
    }

    fn pair_of(a: BodyKey, b: BodyKey) -> Vec<(BodyKey, BodyKey)> {
        let pair = BodyPair::new(a, b);
        vec![(pair.a, pair.b)]
    }

    #[test]
    fn body_pair_ignores_order() {
        let mut bodies = BodySet::new();
        let a = circle_body(&mut bodies, Vec2::ZERO);
        let b = circle_body(&mut bodies, Vec2::ZERO);
        assert_eq!(BodyPair::new(a, b), BodyPair::new(b, a));
    }

    #[test]
    fn begin_then_end() {
        let mut bodies = BodySet::new();
        let a = circle_body(&mut bodies, Vec2::ZERO);
        let b = circle_body(&mut bodies, Vec2::new(1.5, 0.0));
        let mut graph = ContactGraph::new();

        graph.update(&bodies, &pair_of(a, b), true);
        assert_eq!(graph.begun().len(), 1);
        assert_eq!(graph.len(), 1);

        // still touching: no new events
        graph.update(&bodies, &pair_of(a, b), true);
        assert!(graph.begun().is_empty());
        assert!(graph.ended().is_empty());

        // separate them: end fires once, impulses dropped
        bodies.get_mut(b).unwrap().transform.position.x = 10.0;
        graph.update(&bodies, &pair_of(a, b), true);
        assert_eq!(graph.ended().len(), 1);
        assert!(graph.is_empty());

        graph.update(&bodies, &pair_of(a, b), true);
        assert!(graph.ended().is_empty());
    }

    #[test]
    fn persisting_contact_keeps_impulses() {
        let mut bodies = BodySet::new();
        let a = circle_body(&mut bodies, Vec2::ZERO);
        let b = circle_body(&mut bodies, Vec2::new(1.5, 0.0));
        let mut graph = ContactGraph::new();

        graph.update(&bodies, &pair_of(a, b), true);
        graph
            .get_mut(BodyPair::new(a, b))
            .unwrap()
            .manifold
            .points[0]
            .normal_impulse = 4.0;

        // no moved proxies: the pair still persists through the refresh pass
        graph.update(&bodies, &[], true);
        let contact = graph.get(BodyPair::new(a, b)).unwrap();
        assert_eq!(contact.manifold.points[0].normal_impulse, 4.0);

        // warm starting off: accumulated impulses reset
        graph.update(&bodies, &[], false);
        let contact = graph.get(BodyPair::new(a, b)).unwrap();
        assert_eq!(contact.manifold.points[0].normal_impulse, 0.0);
    }

    #[test]
    fn filtered_pairs_never_touch() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(
            &BodyDesc::dynamic().with_collider(
                Collider::new(Shape::circle(1.0))
                    .with_filter(CollisionFilter::default().with_group(-4)),
            ),
        );
        let b = bodies.insert(
            &BodyDesc::dynamic()
                .with_position(Vec2::new(0.5, 0.0))
                .with_collider(
                    Collider::new(Shape::circle(1.0))
                        .with_filter(CollisionFilter::default().with_group(-4)),
                ),
        );
        let mut graph = ContactGraph::new();
        graph.update(&bodies, &pair_of(a, b), true);
        assert!(graph.is_empty());
    }

    #[test]
    fn static_pairs_are_skipped() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(
            &BodyDesc::fixed().with_collider(Collider::new(Shape::circle(1.0))),
        );
        let b = bodies.insert(
            &BodyDesc::kinematic().with_collider(Collider::new(Shape::circle(1.0))),
        );
        let mut graph = ContactGraph::new();
        graph.update(&bodies, &pair_of(a, b), true);
        assert!(graph.is_empty());
    }

    #[test]
    fn sensor_contacts_are_flagged() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(
            &BodyDesc::dynamic().with_collider(Collider::new(Shape::circle(1.0)).sensor()),
        );
        let b = circle_body(&mut bodies, Vec2::new(1.0, 0.0));
        let mut graph = ContactGraph::new();
        graph.update(&bodies, &pair_of(a, b), true);
        let contact = graph.get(BodyPair::new(a, b)).unwrap();
        assert!(contact.sensor);
        assert!(contact.touching);
    }

    #[test]
    fn removing_a_body_ends_its_contacts() {
        let mut bodies = BodySet::new();
        let a = circle_body(&mut bodies, Vec2::ZERO);
        let b = circle_body(&mut bodies, Vec2::new(1.5, 0.0));
        let mut graph = ContactGraph::new();
        graph.update(&bodies, &pair_of(a, b), true);

        let ended = graph.remove_body_contacts(a);
        assert_eq!(ended.len(), 1);
        assert!(!ended[0].touching);
        assert!(graph.is_empty());

        // the stale pair must not resurrect through the refresh pass
        graph.update(&bodies, &[], true);
        assert!(graph.is_empty());
    }
}
