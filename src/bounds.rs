use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Axis aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub mins: Vec2,
    pub maxs: Vec2,
}

impl Bounds {
    /// An empty box that any point expands.
    pub fn new() -> Bounds {
        Bounds {
            mins: Vec2::splat(f32::MAX),
            maxs: Vec2::splat(-f32::MAX),
        }
    }

    pub fn from_points(pts: &[Vec2]) -> Self {
        pts.iter().fold(Bounds::new(), |acc, pt| acc + *pt)
    }

    pub fn from_center_extents(center: Vec2, half_extents: Vec2) -> Self {
        Bounds {
            mins: center - half_extents,
            maxs: center + half_extents,
        }
    }

    #[inline]
    pub fn expand_by_point(&mut self, pt: Vec2) {
        self.add_assign(pt);
    }

    /// Grown uniformly on every side.
    #[inline]
    pub fn expand(&self, margin: f32) -> Bounds {
        Bounds {
            mins: self.mins - Vec2::splat(margin),
            maxs: self.maxs + Vec2::splat(margin),
        }
    }

    /// Grown along a displacement, for sweeping fast movers.
    pub fn expand_towards(&self, d: Vec2) -> Bounds {
        let mut b = *self;
        if d.x < 0.0 {
            b.mins.x += d.x;
        } else {
            b.maxs.x += d.x;
        }
        if d.y < 0.0 {
            b.mins.y += d.y;
        } else {
            b.maxs.y += d.y;
        }
        b
    }

    #[inline]
    pub fn union(&self, rhs: Bounds) -> Bounds {
        Bounds {
            mins: self.mins.min(rhs.mins),
            maxs: self.maxs.max(rhs.maxs),
        }
    }

    #[inline]
    pub fn intersects(&self, rhs: Bounds) -> bool {
        !(self.maxs.cmplt(rhs.mins).any() || rhs.maxs.cmplt(self.mins).any())
    }

    #[inline]
    pub fn contains(&self, rhs: Bounds) -> bool {
        self.mins.cmple(rhs.mins).all() && rhs.maxs.cmple(self.maxs).all()
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.mins + self.maxs)
    }

    #[inline]
    pub fn width(&self) -> Vec2 {
        self.maxs - self.mins
    }

    /// The tree's cost metric: cheaper than area and monotonic under union.
    #[inline]
    pub fn perimeter(&self) -> f32 {
        let w = self.maxs - self.mins;
        2.0 * (w.x + w.y)
    }

    /// Slab test. Returns the entry/exit parameters along the ray if it hits.
    pub fn ray_intersection(&self, origin: Vec2, dir: Vec2) -> Option<(f32, f32)> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..2 {
            let (o, d, lo, hi) = if axis == 0 {
                (origin.x, dir.x, self.mins.x, self.maxs.x)
            } else {
                (origin.y, dir.y, self.mins.y, self.maxs.y)
            };
            if d.abs() < 1e-12 {
                if o < lo || o > hi {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let mut t1 = (lo - o) * inv;
                let mut t2 = (hi - o) * inv;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        if t_max < 0.0 {
            None
        } else {
            Some((t_min.max(0.0), t_max))
        }
    }
}

impl Default for Bounds {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Add<Vec2> for Bounds {
    type Output = Self;
    fn add(self, pt: Vec2) -> Self::Output {
        Bounds {
            mins: Vec2::select(pt.cmplt(self.mins), pt, self.mins),
            maxs: Vec2::select(pt.cmpgt(self.maxs), pt, self.maxs),
        }
    }
}

impl AddAssign<Vec2> for Bounds {
    fn add_assign(&mut self, pt: Vec2) {
        self.mins = Vec2::select(pt.cmplt(self.mins), pt, self.mins);
        self.maxs = Vec2::select(pt.cmpgt(self.maxs), pt, self.maxs);
    }
}
