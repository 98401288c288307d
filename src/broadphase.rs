use crate::body::BodyKey;
use crate::bounds::Bounds;
use crate::bvh::AabbTree;
use glam::Vec2;

/// Broad phase over the AABB tree: tracks which proxies moved since the
/// last step and emits deduplicated candidate pairs for them. Pairs where
/// neither side moved cannot change and are not re-queried.
pub struct BroadPhase {
    pub(crate) tree: AabbTree,
    moved: Vec<u32>,
    stack: Vec<u32>,
    pairs: Vec<(BodyKey, BodyKey)>,
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadPhase {
    pub fn new() -> Self {
        Self {
            tree: AabbTree::new(),
            moved: Vec::new(),
            stack: Vec::new(),
            pairs: Vec::new(),
        }
    }

    pub fn create_proxy(&mut self, key: BodyKey, bounds: Bounds) -> u32 {
        let proxy = self.tree.insert(key, bounds);
        self.moved.push(proxy);
        proxy
    }

    pub fn destroy_proxy(&mut self, proxy: u32) {
        self.moved.retain(|&p| p != proxy);
        self.tree.remove(proxy);
    }

    pub fn move_proxy(&mut self, proxy: u32, bounds: Bounds, displacement: Vec2) {
        let was_tracked = self.tree.is_moved(proxy);
        if self.tree.move_proxy(proxy, bounds, displacement) && !was_tracked {
            self.moved.push(proxy);
        }
    }

    /// Candidate pairs for this step, each ordered and emitted once.
    pub fn update_pairs(&mut self) -> &[(BodyKey, BodyKey)] {
        self.pairs.clear();

        let tree = &self.tree;
        let pairs = &mut self.pairs;
        let stack = &mut self.stack;
        for &proxy in &self.moved {
            let fat = tree.bounds(proxy);
            let key = tree.key(proxy);
            tree.query_with(stack, fat, |other_proxy, other_key| {
                if other_proxy == proxy {
                    return;
                }
                // when both proxies moved, let the larger one emit the pair
                if tree.is_moved(other_proxy) && other_proxy > proxy {
                    return;
                }
                pairs.push(if key < other_key {
                    (key, other_key)
                } else {
                    (other_key, key)
                });
            });
        }

        for i in 0..self.moved.len() {
            let proxy = self.moved[i];
            self.tree.clear_moved(proxy);
        }
        self.moved.clear();

        self.pairs.sort_unstable();
        self.pairs.dedup();
        &self.pairs
    }

    pub fn query(&self, bounds: Bounds, callback: impl FnMut(u32, BodyKey)) {
        self.tree.query(bounds, callback);
    }

    pub fn query_ray(
        &self,
        origin: Vec2,
        dir: Vec2,
        max_distance: f32,
        callback: impl FnMut(u32, BodyKey),
    ) {
        self.tree.query_ray(origin, dir, max_distance, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, BodySet};

    fn keys(n: usize) -> Vec<BodyKey> {
        // real keys from a body set so ordering is meaningful
        let mut bodies = BodySet::new();
        (0..n).map(|_| bodies.insert(&BodyDesc::dynamic())).collect()
    }

    fn unit_bounds(x: f32, y: f32) -> Bounds {
        Bounds::from_center_extents(Vec2::new(x, y), Vec2::splat(0.5))
    }

    #[test]
    fn overlapping_proxies_pair_up() {
        let keys = keys(3);
        let mut bp = BroadPhase::new();
        bp.create_proxy(keys[0], unit_bounds(0.0, 0.0));
        bp.create_proxy(keys[1], unit_bounds(0.6, 0.0));
        bp.create_proxy(keys[2], unit_bounds(20.0, 0.0));

        let pairs = bp.update_pairs().to_vec();
        assert_eq!(pairs.len(), 1);
        let (a, b) = pairs[0];
        assert!(a < b);
        assert!([a, b].contains(&keys[0]) && [a, b].contains(&keys[1]));
    }

    #[test]
    fn unmoved_proxies_produce_no_pairs() {
        let keys = keys(2);
        let mut bp = BroadPhase::new();
        bp.create_proxy(keys[0], unit_bounds(0.0, 0.0));
        bp.create_proxy(keys[1], unit_bounds(0.6, 0.0));
        assert_eq!(bp.update_pairs().len(), 1);
        // nothing moved since: no candidates to re-check
        assert!(bp.update_pairs().is_empty());
    }

    #[test]
    fn moving_into_overlap_emits_the_pair_once() {
        let keys = keys(2);
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(keys[0], unit_bounds(0.0, 0.0));
        bp.create_proxy(keys[1], unit_bounds(10.0, 0.0));
        bp.update_pairs();

        bp.move_proxy(a, unit_bounds(9.4, 0.0), Vec2::new(9.4, 0.0));
        let pairs = bp.update_pairs().to_vec();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn destroyed_proxy_stops_pairing() {
        let keys = keys(2);
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(keys[0], unit_bounds(0.0, 0.0));
        let b = bp.create_proxy(keys[1], unit_bounds(0.6, 0.0));
        bp.update_pairs();

        bp.destroy_proxy(a);
        bp.move_proxy(b, unit_bounds(-2.0, 0.0), Vec2::new(-2.6, 0.0));
        assert!(bp.update_pairs().is_empty());
        bp.tree.validate();
    }
}
