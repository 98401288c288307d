use crate::body::{BodyKey, BodySet};
use crate::contact::ContactGraph;

/// Connected components of active bodies linked by touching, non-sensor
/// contacts. Rebuilt at the end of every step; the contiguous ranges are
/// the unit a future sleep or parallel scheduler would work over.
///
/// Static bodies are not active and never join an island, so two stacks
/// resting on the same ground stay separate components.
#[derive(Default)]
pub struct Islands {
    order: Vec<BodyKey>,
    ranges: Vec<(usize, usize)>,
    // union-find scratch, reused across steps
    parent: Vec<u32>,
    rank: Vec<u8>,
    island_of_root: Vec<u32>,
    starts: Vec<usize>,
}

impl Islands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.ranges.len()
    }

    /// Bodies of one island, as a contiguous slice.
    pub fn island(&self, index: usize) -> &[BodyKey] {
        let (start, len) = self.ranges[index];
        &self.order[start..start + len]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[BodyKey]> {
        self.ranges
            .iter()
            .map(|&(start, len)| &self.order[start..start + len])
    }

    fn find(&mut self, mut i: u32) -> u32 {
        // path halving
        while self.parent[i as usize] != i {
            let grandparent = self.parent[self.parent[i as usize] as usize];
            self.parent[i as usize] = grandparent;
            i = grandparent;
        }
        i
    }

    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        match self.rank[root_a as usize].cmp(&self.rank[root_b as usize]) {
            std::cmp::Ordering::Less => self.parent[root_a as usize] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b as usize] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b as usize] = root_a;
                self.rank[root_a as usize] += 1;
            }
        }
    }

    pub(crate) fn build(&mut self, bodies: &BodySet, graph: &ContactGraph) {
        let active = bodies.active();
        let n = active.len();

        self.parent.clear();
        self.parent.extend(0..n as u32);
        self.rank.clear();
        self.rank.resize(n, 0);

        for contact in graph.contacts() {
            if !contact.touching || contact.sensor {
                continue;
            }
            let (Some(body_a), Some(body_b)) = (bodies.get(contact.pair.a), bodies.get(contact.pair.b))
            else {
                continue;
            };
            // a contact through a static body does not link its neighbours
            if body_a.active_index == usize::MAX || body_b.active_index == usize::MAX {
                continue;
            }
            self.union(body_a.active_index as u32, body_b.active_index as u32);
        }

        // number the roots, then counting-sort bodies into contiguous runs
        self.island_of_root.clear();
        self.island_of_root.resize(n, u32::MAX);
        let mut island_count = 0u32;
        let mut sizes: Vec<usize> = Vec::new();
        for i in 0..n as u32 {
            let root = self.find(i);
            if self.island_of_root[root as usize] == u32::MAX {
                self.island_of_root[root as usize] = island_count;
                island_count += 1;
                sizes.push(0);
            }
            sizes[self.island_of_root[root as usize] as usize] += 1;
        }

        self.starts.clear();
        let mut offset = 0;
        for &size in &sizes {
            self.starts.push(offset);
            offset += size;
        }

        self.order.clear();
        self.order.resize(n, BodyKey::default());
        let mut cursors = self.starts.clone();
        for i in 0..n as u32 {
            let root = self.find(i);
            let island = self.island_of_root[root as usize] as usize;
            self.order[cursors[island]] = active[i as usize];
            cursors[island] += 1;
        }

        self.ranges.clear();
        for (island, &size) in sizes.iter().enumerate() {
            self.ranges.push((self.starts[island], size));
        }
    }
}
