use crate::body::BodyKey;
use crate::bounds::Bounds;
use glam::Vec2;

pub(crate) const NULL_NODE: u32 = u32::MAX;

/// Fixed enlargement applied to every leaf so small jitters stay inside the
/// stored bounds.
pub const AABB_MARGIN: f32 = 0.1;

/// Extra sweep applied along the displacement when a moved leaf has to be
/// re-inserted, so fast movers don't immediately re-trigger.
const SWEEP_MULTIPLIER: f32 = 2.0;

const INITIAL_POOL: usize = 16;

#[derive(Clone, Debug)]
struct Node {
    bounds: Bounds,
    /// Parent for live nodes, next free index for pooled nodes.
    parent: u32,
    child1: u32,
    child2: u32,
    /// -1 free, 0 leaf, > 0 internal.
    height: i32,
    key: BodyKey,
    moved: bool,
}

impl Node {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// Incrementally updated bounding volume hierarchy over fat AABBs.
///
/// Leaves map 1:1 to colliders. Insertion walks from the root picking the
/// child whose perimeter increase is smallest (branch-and-bound), and a
/// perimeter-driven rotation pass keeps the tree shallow without a full
/// rebuild.
pub struct AabbTree {
    nodes: Vec<Node>,
    root: u32,
    free_list: u32,
    node_count: usize,
}

impl Default for AabbTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AabbTree {
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NULL_NODE,
            free_list: NULL_NODE,
            node_count: 0,
        };
        tree.grow_pool(INITIAL_POOL);
        tree
    }

    /// Chain a fresh block of free nodes. Doubles the pool when exhausted,
    /// so allocation failure is invisible to callers.
    fn grow_pool(&mut self, new_len: usize) {
        let old_len = self.nodes.len();
        debug_assert!(new_len > old_len);
        self.nodes.resize(
            new_len,
            Node {
                bounds: Bounds::new(),
                parent: NULL_NODE,
                child1: NULL_NODE,
                child2: NULL_NODE,
                height: -1,
                key: BodyKey::default(),
                moved: false,
            },
        );
        for i in old_len..new_len - 1 {
            self.nodes[i].parent = (i + 1) as u32;
        }
        self.nodes[new_len - 1].parent = self.free_list;
        self.free_list = old_len as u32;
    }

    fn allocate_node(&mut self) -> u32 {
        if self.free_list == NULL_NODE {
            self.grow_pool(self.nodes.len() * 2);
        }
        let index = self.free_list;
        self.free_list = self.nodes[index as usize].parent;
        let node = &mut self.nodes[index as usize];
        node.parent = NULL_NODE;
        node.child1 = NULL_NODE;
        node.child2 = NULL_NODE;
        node.height = 0;
        node.key = BodyKey::default();
        node.moved = false;
        self.node_count += 1;
        index
    }

    fn free_node(&mut self, index: u32) {
        debug_assert!(self.nodes[index as usize].height >= 0, "double free");
        let node = &mut self.nodes[index as usize];
        node.height = -1;
        node.parent = self.free_list;
        self.free_list = index;
        self.node_count -= 1;
    }

    /// Number of live nodes (leaves + internals).
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    #[inline]
    pub fn bounds(&self, proxy: u32) -> Bounds {
        self.nodes[proxy as usize].bounds
    }

    #[inline]
    pub fn key(&self, proxy: u32) -> BodyKey {
        self.nodes[proxy as usize].key
    }

    #[inline]
    pub(crate) fn is_moved(&self, proxy: u32) -> bool {
        self.nodes[proxy as usize].moved
    }

    #[inline]
    pub(crate) fn clear_moved(&mut self, proxy: u32) {
        self.nodes[proxy as usize].moved = false;
    }

    /// Insert a leaf for `key`, enlarging `bounds` by the fixed margin.
    pub fn insert(&mut self, key: BodyKey, bounds: Bounds) -> u32 {
        let leaf = self.allocate_node();
        {
            let node = &mut self.nodes[leaf as usize];
            node.bounds = bounds.expand(AABB_MARGIN);
            node.key = key;
            node.moved = true;
        }
        self.insert_leaf(leaf);
        leaf
    }

    pub fn remove(&mut self, proxy: u32) {
        debug_assert!(self.nodes[proxy as usize].is_leaf());
        self.remove_leaf(proxy);
        self.free_node(proxy);
    }

    /// Update a leaf for new tight bounds. Returns false when the stored fat
    /// bounds still cover the new bounds (the common resting case) and the
    /// leaf was left untouched; true when it was re-inserted.
    pub fn move_proxy(&mut self, proxy: u32, bounds: Bounds, displacement: Vec2) -> bool {
        debug_assert!(self.nodes[proxy as usize].is_leaf());

        let fat = bounds.expand(AABB_MARGIN);
        if self.nodes[proxy as usize].bounds.contains(bounds) {
            // still covered; only re-insert if the stored bounds have grown
            // far beyond what the shape needs (stale sweep enlargement)
            let huge = fat.expand(4.0 * AABB_MARGIN);
            if huge.contains(self.nodes[proxy as usize].bounds) {
                return false;
            }
        }

        self.remove_leaf(proxy);
        self.nodes[proxy as usize].bounds = fat.expand_towards(SWEEP_MULTIPLIER * displacement);
        self.insert_leaf(proxy);
        self.nodes[proxy as usize].moved = true;
        true
    }

    /// Best sibling by perimeter cost: branch-and-bound descent that prunes
    /// subtrees whose lower-bound cost already exceeds the best found.
    fn find_best_sibling(&self, leaf_bounds: Bounds) -> u32 {
        let leaf_perimeter = leaf_bounds.perimeter();
        let mut best = self.root;
        let mut best_cost = leaf_bounds
            .union(self.nodes[best as usize].bounds)
            .perimeter();

        let mut stack: Vec<(u32, f32)> = Vec::with_capacity(64);
        stack.push((self.root, 0.0));

        while let Some((index, inherited)) = stack.pop() {
            let node = &self.nodes[index as usize];
            let combined = leaf_bounds.union(node.bounds).perimeter();
            let cost = combined + inherited;
            if cost < best_cost {
                best = index;
                best_cost = cost;
            }

            if !node.is_leaf() {
                // descending enlarges this node for every descendant below
                let new_inherited = inherited + combined - node.bounds.perimeter();
                if leaf_perimeter + new_inherited < best_cost {
                    stack.push((node.child1, new_inherited));
                    stack.push((node.child2, new_inherited));
                }
            }
        }

        best
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        let leaf_bounds = self.nodes[leaf as usize].bounds;
        let sibling = self.find_best_sibling(leaf_bounds);

        // splice a new parent above the chosen sibling
        let old_parent = self.nodes[sibling as usize].parent;
        let sibling_bounds = self.nodes[sibling as usize].bounds;
        let sibling_height = self.nodes[sibling as usize].height;
        let new_parent = self.allocate_node();
        {
            let node = &mut self.nodes[new_parent as usize];
            node.parent = old_parent;
            node.bounds = leaf_bounds.union(sibling_bounds);
            node.height = sibling_height + 1;
            node.child1 = sibling;
            node.child2 = leaf;
        }
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else if self.nodes[old_parent as usize].child1 == sibling {
            self.nodes[old_parent as usize].child1 = new_parent;
        } else {
            self.nodes[old_parent as usize].child2 = new_parent;
        }

        self.refresh_ancestors(new_parent);
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].child1 == leaf {
            self.nodes[parent as usize].child2
        } else {
            self.nodes[parent as usize].child1
        };

        if grandparent == NULL_NODE {
            // the sibling becomes the new root
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
        } else {
            if self.nodes[grandparent as usize].child1 == parent {
                self.nodes[grandparent as usize].child1 = sibling;
            } else {
                self.nodes[grandparent as usize].child2 = sibling;
            }
            self.nodes[sibling as usize].parent = grandparent;
            self.refresh_ancestors(grandparent);
        }

        self.free_node(parent);
    }

    /// Walk to the root recomputing heights and bounds, rotating where a
    /// swap shrinks the combined perimeter.
    fn refresh_ancestors(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            let child1 = self.nodes[index as usize].child1;
            let child2 = self.nodes[index as usize].child2;
            self.nodes[index as usize].height = 1 + self.nodes[child1 as usize]
                .height
                .max(self.nodes[child2 as usize].height);
            self.nodes[index as usize].bounds = self.nodes[child1 as usize]
                .bounds
                .union(self.nodes[child2 as usize].bounds);

            self.rotate(index);

            index = self.nodes[index as usize].parent;
        }
    }

    /// Local rebalance: try swapping one child with a grandchild on the
    /// other side when that shrinks the other side's perimeter. AVL in
    /// spirit, but driven by perimeter rather than item count.
    fn rotate(&mut self, index: u32) {
        if self.nodes[index as usize].height < 2 {
            return;
        }

        let child1 = self.nodes[index as usize].child1;
        let child2 = self.nodes[index as usize].child2;

        let mut best_gain = 0.0;
        // (child being pushed down, sibling absorbing it, grandchild coming up)
        let mut best_swap: Option<(u32, u32, u32)> = None;

        for (child, sibling) in [(child1, child2), (child2, child1)] {
            let sibling_node = &self.nodes[sibling as usize];
            if sibling_node.is_leaf() {
                continue;
            }
            let base = sibling_node.bounds.perimeter();
            for (up, stay) in [
                (sibling_node.child1, sibling_node.child2),
                (sibling_node.child2, sibling_node.child1),
            ] {
                let swapped = self.nodes[stay as usize]
                    .bounds
                    .union(self.nodes[child as usize].bounds)
                    .perimeter();
                let gain = base - swapped;
                if gain > best_gain {
                    best_gain = gain;
                    best_swap = Some((child, sibling, up));
                }
            }
        }

        let Some((child, sibling, up)) = best_swap else {
            return;
        };

        // rewire: `up` takes child's slot under `index`, `child` takes up's
        // slot under `sibling`
        if self.nodes[index as usize].child1 == child {
            self.nodes[index as usize].child1 = up;
        } else {
            self.nodes[index as usize].child2 = up;
        }
        if self.nodes[sibling as usize].child1 == up {
            self.nodes[sibling as usize].child1 = child;
        } else {
            self.nodes[sibling as usize].child2 = child;
        }
        self.nodes[up as usize].parent = index;
        self.nodes[child as usize].parent = sibling;

        let s1 = self.nodes[sibling as usize].child1;
        let s2 = self.nodes[sibling as usize].child2;
        self.nodes[sibling as usize].bounds = self.nodes[s1 as usize]
            .bounds
            .union(self.nodes[s2 as usize].bounds);
        self.nodes[sibling as usize].height =
            1 + self.nodes[s1 as usize].height.max(self.nodes[s2 as usize].height);

        let c1 = self.nodes[index as usize].child1;
        let c2 = self.nodes[index as usize].child2;
        self.nodes[index as usize].bounds = self.nodes[c1 as usize]
            .bounds
            .union(self.nodes[c2 as usize].bounds);
        self.nodes[index as usize].height =
            1 + self.nodes[c1 as usize].height.max(self.nodes[c2 as usize].height);
    }

    /// Depth-first overlap query with an explicit stack. The callback gets
    /// each leaf whose fat bounds intersect `bounds`.
    pub fn query(&self, bounds: Bounds, callback: impl FnMut(u32, BodyKey)) {
        let mut stack = Vec::with_capacity(64);
        self.query_with(&mut stack, bounds, callback);
    }

    pub(crate) fn query_with(
        &self,
        stack: &mut Vec<u32>,
        bounds: Bounds,
        mut callback: impl FnMut(u32, BodyKey),
    ) {
        stack.clear();
        if self.root != NULL_NODE {
            stack.push(self.root);
        }
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.intersects(bounds) {
                continue;
            }
            if node.is_leaf() {
                callback(index, node.key);
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    /// Leaves whose fat bounds the ray may pass through, nearest-unordered.
    pub fn query_ray(
        &self,
        origin: Vec2,
        dir: Vec2,
        max_distance: f32,
        mut callback: impl FnMut(u32, BodyKey),
    ) {
        let mut stack = Vec::with_capacity(64);
        if self.root != NULL_NODE {
            stack.push(self.root);
        }
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            match node.bounds.ray_intersection(origin, dir) {
                Some((t_min, _)) if t_min <= max_distance => {
                    if node.is_leaf() {
                        callback(index, node.key);
                    } else {
                        stack.push(node.child1);
                        stack.push(node.child2);
                    }
                }
                _ => continue,
            }
        }
    }

    /// Structural invariants, for tests: parent links, heights, containment.
    pub fn validate(&self) {
        if self.root == NULL_NODE {
            return;
        }
        assert_eq!(self.nodes[self.root as usize].parent, NULL_NODE);
        self.validate_node(self.root);
    }

    fn validate_node(&self, index: u32) {
        let node = &self.nodes[index as usize];
        assert!(node.height >= 0, "free node reachable from root");
        if node.is_leaf() {
            assert_eq!(node.height, 0);
            assert_eq!(node.child2, NULL_NODE);
            return;
        }
        let child1 = &self.nodes[node.child1 as usize];
        let child2 = &self.nodes[node.child2 as usize];
        assert_eq!(child1.parent, index);
        assert_eq!(child2.parent, index);
        assert_eq!(node.height, 1 + child1.height.max(child2.height));
        assert!(node.bounds.contains(child1.bounds.union(child2.bounds)));
        self.validate_node(node.child1);
        self.validate_node(node.child2);
    }
}
