use crate::bounds::Bounds;
use crate::collide::LINEAR_SLOP;
use crate::math::{cross, Transform2d};
use crate::shapes::MassData;
use glam::Vec2;

/// Points closer than this are treated as one vertex when building a hull.
const WELD_DISTANCE: f32 = 0.5 * LINEAR_SLOP;

/// A convex polygon. Vertices are counter-clockwise, normals point outward,
/// one normal per edge `points[i] -> points[i + 1]`.
///
/// Built once from an arbitrary point cloud; construction is idempotent
/// (running the hull over hull output returns the same polygon).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShapePolygon {
    points: Vec<Vec2>,
    normals: Vec<Vec2>,
    centroid: Vec2,
}

impl ShapePolygon {
    /// Convex hull of `points`. Falls back to a unit box when fewer than 3
    /// distinct usable vertices remain after welding.
    pub fn new(points: &[Vec2]) -> Self {
        match build_hull(points) {
            Some(hull) => Self::from_hull(hull),
            None => {
                log::warn!(
                    "degenerate polygon input ({} points), substituting a unit box",
                    points.len()
                );
                Self::rect(0.5, 0.5)
            }
        }
    }

    /// Axis aligned box with the given half extents, centered on the origin.
    pub fn rect(half_width: f32, half_height: f32) -> Self {
        debug_assert!(half_width > 0.0 && half_height > 0.0);
        Self::from_hull(vec![
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ])
    }

    /// `hull` must already be a counter-clockwise convex loop.
    fn from_hull(hull: Vec<Vec2>) -> Self {
        debug_assert!(hull.len() >= 3);
        let count = hull.len();
        let mut normals = Vec::with_capacity(count);
        for i in 0..count {
            let edge = hull[(i + 1) % count] - hull[i];
            normals.push(Vec2::new(edge.y, -edge.x).normalize_or_zero());
        }
        let centroid = polygon_centroid(&hull);
        Self {
            points: hull,
            normals,
            centroid,
        }
    }

    #[inline]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    #[inline]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    #[inline]
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    pub fn mass_data(&self, density: f32) -> MassData {
        // triangulate around an arbitrary reference vertex and sum signed
        // triangle contributions (shoelace)
        let reference = self.points[0];
        let mut area = 0.0;
        let mut center = Vec2::ZERO;
        let mut second_moment = 0.0;

        for i in 1..self.points.len() - 1 {
            let e1 = self.points[i] - reference;
            let e2 = self.points[i + 1] - reference;
            let d = cross(e1, e2);
            let tri_area = 0.5 * d;
            area += tri_area;
            center += tri_area * (e1 + e2) / 3.0;

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            second_moment += (0.25 / 3.0) * d * (int_x2 + int_y2);
        }

        if area <= f32::EPSILON {
            // zero-area polygon, keep the body well defined
            return MassData {
                mass: 0.0,
                center: reference,
                inertia: 0.0,
            };
        }

        center /= area;
        let mass = density * area;
        // second_moment is about the reference vertex; shift to the centroid
        let inertia = density * second_moment - mass * center.length_squared();
        MassData {
            mass,
            center: center + reference,
            inertia,
        }
    }

    pub fn bounds(&self, xf: &Transform2d) -> Bounds {
        let mut b = Bounds::new();
        for &p in &self.points {
            b.expand_by_point(xf.transform_point(p));
        }
        b
    }
}

/// Shoelace centroid. Assumes a counter-clockwise loop.
fn polygon_centroid(points: &[Vec2]) -> Vec2 {
    let reference = points[0];
    let mut area = 0.0;
    let mut center = Vec2::ZERO;
    for i in 1..points.len() - 1 {
        let e1 = points[i] - reference;
        let e2 = points[i + 1] - reference;
        let tri_area = 0.5 * cross(e1, e2);
        area += tri_area;
        center += tri_area * (e1 + e2) / 3.0;
    }
    if area <= f32::EPSILON {
        return reference;
    }
    center / area + reference
}

/// Graham scan: weld near-duplicates, pivot on the lowest-y (then lowest-x)
/// point, sort the rest by polar angle, drop right turns and collinear
/// points. Returns None when fewer than 3 distinct vertices survive.
fn build_hull(input: &[Vec2]) -> Option<Vec<Vec2>> {
    let mut points: Vec<Vec2> = Vec::with_capacity(input.len());
    for &p in input {
        if !p.is_finite() {
            continue;
        }
        if points
            .iter()
            .all(|&q| (p - q).length_squared() > WELD_DISTANCE * WELD_DISTANCE)
        {
            points.push(p);
        }
    }
    if points.len() < 3 {
        return None;
    }

    // pivot: lowest y, ties broken towards lowest x
    let pivot_index = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.y, a.x)
                .partial_cmp(&(b.y, b.x))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)?;
    let pivot = points.swap_remove(pivot_index);

    points.sort_by(|&a, &b| {
        let turn = cross(a - pivot, b - pivot);
        if turn > 0.0 {
            std::cmp::Ordering::Less
        } else if turn < 0.0 {
            std::cmp::Ordering::Greater
        } else {
            // same ray: closer point first so the scan drops it
            (a - pivot)
                .length_squared()
                .partial_cmp(&(b - pivot).length_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    let mut hull = vec![pivot];
    for p in points {
        while hull.len() >= 2 {
            let last = hull[hull.len() - 1];
            let prev = hull[hull.len() - 2];
            // <= also removes collinear points
            if cross(last - prev, p - prev) <= 0.0 {
                hull.pop();
            } else {
                break;
            }
        }
        hull.push(p);
    }

    if hull.len() < 3 {
        return None;
    }
    Some(hull)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_of_noisy_square() {
        // corners plus duplicates, interior and collinear points
        let polygon = ShapePolygon::new(&[
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(0.0, -1.0),
        ]);
        assert_eq!(polygon.points().len(), 4);
        // counter-clockwise winding
        let pts = polygon.points();
        let mut area = 0.0;
        for i in 0..pts.len() {
            let j = (i + 1) % pts.len();
            area += cross(pts[i], pts[j]);
        }
        assert!(area > 0.0);
        assert!(polygon.centroid().length() < 1e-6);
    }

    #[test]
    fn hull_is_idempotent() {
        let first = ShapePolygon::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 3.0),
        ]);
        let second = ShapePolygon::new(first.points());
        assert_eq!(first.points(), second.points());
    }

    #[test]
    fn degenerate_input_falls_back_to_unit_box() {
        let polygon = ShapePolygon::new(&[Vec2::ZERO, Vec2::new(1.0, 0.0)]);
        assert_eq!(polygon.points().len(), 4);
        let b = polygon.bounds(&Transform2d::IDENTITY);
        assert!((b.width() - Vec2::ONE).length() < 1e-6);

        // all points welded onto one
        let polygon = ShapePolygon::new(&[Vec2::ZERO, Vec2::splat(1e-4), Vec2::ZERO]);
        assert_eq!(polygon.points().len(), 4);
    }

    #[test]
    fn normals_point_outward() {
        let polygon = ShapePolygon::rect(1.0, 1.0);
        for (i, &n) in polygon.normals().iter().enumerate() {
            let edge_mid = 0.5 * (polygon.points()[i] + polygon.points()[(i + 1) % 4]);
            // moving along the normal moves away from the centroid
            assert!(n.dot(edge_mid - polygon.centroid()) > 0.0);
            assert!((n.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn unit_box_mass_properties() {
        let polygon = ShapePolygon::rect(0.5, 0.5);
        let md = polygon.mass_data(1.0);
        assert!((md.mass - 1.0).abs() < 1e-5);
        assert!(md.center.length() < 1e-6);
        // m (w^2 + h^2) / 12
        assert!((md.inertia - 1.0 / 6.0).abs() < 1e-5);
    }

    #[test]
    fn offset_box_shifts_center_not_inertia() {
        let offset = Vec2::new(3.0, 0.0);
        let polygon = ShapePolygon::new(&[
            offset + Vec2::new(-0.5, -0.5),
            offset + Vec2::new(0.5, -0.5),
            offset + Vec2::new(0.5, 0.5),
            offset + Vec2::new(-0.5, 0.5),
        ]);
        let md = polygon.mass_data(1.0);
        assert!((md.center - offset).length() < 1e-5);
        // inertia is about the centroid, so the offset must not leak in
        assert!((md.inertia - 1.0 / 6.0).abs() < 1e-4);
    }
}
