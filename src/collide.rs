use crate::math::Transform2d;
use crate::shapes::{Shape, ShapeCircle, ShapeEdge, ShapeKind, ShapePolygon};
use glam::Vec2;

/// Allowed positional error; most tolerances derive from this.
pub const LINEAR_SLOP: f32 = 0.005;

/// Collision radius of polygons and edges. Keeps barely-touching contacts
/// alive across frames instead of flickering.
pub const CONTACT_SKIN: f32 = 2.0 * LINEAR_SLOP;

pub const MAX_MANIFOLD_POINTS: usize = 2;

/// One contact point, in the incident shape's local frame. The accumulated
/// impulses persist across frames (matched by `id`) for warm starting.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ManifoldPoint {
    pub local_point: Vec2,
    /// Signed distance at creation time, negative when penetrating.
    pub separation: f32,
    /// Clip feature id, stable while the same faces stay in contact.
    pub id: u32,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
}

/// Which shape owns the reference face, and therefore which local frames
/// the manifold data lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManifoldKind {
    /// `local_point` is A's center, `points[0].local_point` is B's center.
    Circles,
    /// Normal and reference point in A's frame, points in B's frame.
    FaceA,
    /// Normal and reference point in B's frame, points in A's frame.
    FaceB,
}

#[derive(Copy, Clone, Debug)]
pub struct Manifold {
    pub kind: ManifoldKind,
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub count: usize,
    pub radius_a: f32,
    pub radius_b: f32,
}

impl Manifold {
    fn new(kind: ManifoldKind, radius_a: f32, radius_b: f32) -> Self {
        Self {
            kind,
            local_normal: Vec2::ZERO,
            local_point: Vec2::ZERO,
            points: [ManifoldPoint::default(); MAX_MANIFOLD_POINTS],
            count: 0,
            radius_a,
            radius_b,
        }
    }

    /// Reinterpret a manifold computed for (B, A) as one for (A, B).
    fn flipped(mut self) -> Self {
        self.kind = match self.kind {
            ManifoldKind::Circles => ManifoldKind::Circles,
            ManifoldKind::FaceA => ManifoldKind::FaceB,
            ManifoldKind::FaceB => ManifoldKind::FaceA,
        };
        std::mem::swap(&mut self.radius_a, &mut self.radius_b);
        self
    }

    /// Deepest penetration across the points (negative).
    pub fn min_separation(&self) -> f32 {
        self.points[..self.count]
            .iter()
            .map(|p| p.separation)
            .fold(f32::INFINITY, f32::min)
    }

    /// Copy accumulated impulses from last frame's manifold, matching
    /// points by feature id so a reordered manifold keeps its warm start.
    pub fn carry_impulses(&mut self, old: &Manifold) {
        for point in &mut self.points[..self.count] {
            if let Some(previous) = old.points[..old.count].iter().find(|p| p.id == point.id) {
                point.normal_impulse = previous.normal_impulse;
                point.tangent_impulse = previous.tangent_impulse;
            }
        }
    }

    pub fn zero_impulses(&mut self) {
        for point in &mut self.points[..self.count] {
            point.normal_impulse = 0.0;
            point.tangent_impulse = 0.0;
        }
    }
}

/// Manifold evaluated in world space under the current transforms. The
/// normal always points from A to B.
#[derive(Copy, Clone, Debug)]
pub struct WorldManifold {
    pub normal: Vec2,
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn new(manifold: &Manifold, xf_a: &Transform2d, xf_b: &Transform2d) -> Self {
        let mut out = Self {
            normal: Vec2::X,
            points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
            separations: [0.0; MAX_MANIFOLD_POINTS],
        };
        if manifold.count == 0 {
            return out;
        }

        match manifold.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.transform_point(manifold.local_point);
                let point_b = xf_b.transform_point(manifold.points[0].local_point);
                let d = point_b - point_a;
                out.normal = if d.length_squared() > 1e-12 {
                    d.normalize()
                } else {
                    Vec2::X
                };
                let c_a = point_a + manifold.radius_a * out.normal;
                let c_b = point_b - manifold.radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.rotation.rotate(manifold.local_normal);
                let plane_point = xf_a.transform_point(manifold.local_point);
                for i in 0..manifold.count {
                    let clip = xf_b.transform_point(manifold.points[i].local_point);
                    let c_a = clip + (manifold.radius_a - (clip - plane_point).dot(normal)) * normal;
                    let c_b = clip - manifold.radius_b * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(normal);
                }
                out.normal = normal;
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.rotation.rotate(manifold.local_normal);
                let plane_point = xf_b.transform_point(manifold.local_point);
                for i in 0..manifold.count {
                    let clip = xf_a.transform_point(manifold.points[i].local_point);
                    let c_b = clip + (manifold.radius_b - (clip - plane_point).dot(normal)) * normal;
                    let c_a = clip - manifold.radius_a * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(normal);
                }
                // keep the convention: from A towards B
                out.normal = -normal;
            }
        }
        out
    }
}

/// Pack the two feature indices that produced a clip vertex.
#[inline]
fn contact_id(index_a: u32, index_b: u32) -> u32 {
    (index_a << 8) | index_b
}

/// Marks an id produced by plane clipping rather than an original vertex.
const CLIPPED_BIT: u32 = 1 << 16;

// --- closed-form tests -----------------------------------------------------
//
// The circle routines are derived from the plain center/segment distance
// forms rather than ported.

fn collide_circles(
    a: &ShapeCircle,
    xf_a: &Transform2d,
    b: &ShapeCircle,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    let point_a = xf_a.transform_point(a.center);
    let point_b = xf_b.transform_point(b.center);
    let dist_sq = (point_b - point_a).length_squared();
    let r = a.radius + b.radius;
    if dist_sq > r * r {
        return None;
    }

    let mut manifold = Manifold::new(ManifoldKind::Circles, a.radius, b.radius);
    manifold.local_point = a.center;
    manifold.points[0] = ManifoldPoint {
        local_point: b.center,
        separation: dist_sq.sqrt() - r,
        id: contact_id(0, 0),
        ..ManifoldPoint::default()
    };
    manifold.count = 1;
    Some(manifold)
}

fn collide_edge_circle(
    edge: &ShapeEdge,
    xf_a: &Transform2d,
    circle: &ShapeCircle,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    // circle center in the edge's frame
    let q = xf_a.inv_transform_point(xf_b.transform_point(circle.center));

    // clamped closest point on the segment
    let ab = edge.b - edge.a;
    let t = ((q - edge.a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
    let closest = edge.a + t * ab;

    let d = q - closest;
    let dist_sq = d.length_squared();
    let r = circle.radius + CONTACT_SKIN;
    if dist_sq > r * r {
        return None;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 {
        d / dist
    } else {
        // center exactly on the segment: fall back to the edge normal
        edge.normal()
    };

    let mut manifold = Manifold::new(ManifoldKind::FaceA, CONTACT_SKIN, circle.radius);
    manifold.local_normal = normal;
    manifold.local_point = closest;
    manifold.points[0] = ManifoldPoint {
        local_point: circle.center,
        separation: dist - r,
        id: contact_id(0, 0),
        ..ManifoldPoint::default()
    };
    manifold.count = 1;
    Some(manifold)
}

fn collide_polygon_circle(
    polygon: &ShapePolygon,
    xf_a: &Transform2d,
    circle: &ShapeCircle,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    let c = xf_a.inv_transform_point(xf_b.transform_point(circle.center));
    let r = circle.radius + CONTACT_SKIN;

    let points = polygon.points();
    let normals = polygon.normals();

    // face of maximum separation
    let mut best = 0;
    let mut best_separation = f32::NEG_INFINITY;
    for i in 0..points.len() {
        let s = normals[i].dot(c - points[i]);
        if s > r {
            return None;
        }
        if s > best_separation {
            best_separation = s;
            best = i;
        }
    }

    let v1 = points[best];
    let v2 = points[(best + 1) % points.len()];

    let mut manifold = Manifold::new(ManifoldKind::FaceA, CONTACT_SKIN, circle.radius);
    manifold.count = 1;
    manifold.points[0] = ManifoldPoint {
        local_point: circle.center,
        separation: 0.0,
        id: contact_id(best as u32, 0),
        ..ManifoldPoint::default()
    };

    if best_separation < f32::EPSILON {
        // center inside the polygon
        manifold.local_normal = normals[best];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.points[0].separation = best_separation - r;
        return Some(manifold);
    }

    // vertex regions at either end of the face, else the face region
    let u1 = (c - v1).dot(v2 - v1);
    let u2 = (c - v2).dot(v1 - v2);
    let (anchor, normal) = if u1 <= 0.0 {
        if (c - v1).length_squared() > r * r {
            return None;
        }
        (v1, (c - v1).normalize_or_zero())
    } else if u2 <= 0.0 {
        if (c - v2).length_squared() > r * r {
            return None;
        }
        (v2, (c - v2).normalize_or_zero())
    } else {
        (0.5 * (v1 + v2), normals[best])
    };

    manifold.local_normal = if normal.length_squared() > 0.5 {
        normal
    } else {
        normals[best]
    };
    manifold.local_point = anchor;
    manifold.points[0].separation = (c - anchor).dot(manifold.local_normal) - r;
    Some(manifold)
}

// --- SAT + clipping --------------------------------------------------------
//
// The machinery works on vertex/normal slices so an edge rides the same
// path as a 2-vertex hull.

#[derive(Copy, Clone, Debug, Default)]
struct ClipVertex {
    v: Vec2,
    id: u32,
}

/// Highest face separation of hull 1 against hull 2's support points.
fn max_separation(
    points1: &[Vec2],
    normals1: &[Vec2],
    xf1: &Transform2d,
    points2: &[Vec2],
    xf2: &Transform2d,
) -> (usize, f32) {
    let mut best = 0;
    let mut best_separation = f32::NEG_INFINITY;

    for i in 0..points1.len() {
        let n = xf1.rotation.rotate(normals1[i]);
        let v = xf1.transform_point(points1[i]);

        // support of 2 in -n: the deepest point against this face
        let mut min_dot = f32::INFINITY;
        for &p in points2 {
            min_dot = min_dot.min(n.dot(xf2.transform_point(p) - v));
        }

        if min_dot > best_separation {
            best_separation = min_dot;
            best = i;
        }
    }

    (best, best_separation)
}

/// The incident edge: the one most anti-parallel to the reference normal.
fn find_incident_edge(
    ref_normal_world: Vec2,
    inc_points: &[Vec2],
    inc_normals: &[Vec2],
    inc_xf: &Transform2d,
    ref_edge: usize,
) -> [ClipVertex; 2] {
    let local_ref_normal = inc_xf.rotation.inv_rotate(ref_normal_world);

    let mut incident = 0;
    let mut min_dot = f32::INFINITY;
    for (i, &n) in inc_normals.iter().enumerate() {
        let d = local_ref_normal.dot(n);
        if d < min_dot {
            min_dot = d;
            incident = i;
        }
    }

    let i1 = incident;
    let i2 = (incident + 1) % inc_points.len();
    [
        ClipVertex {
            v: inc_xf.transform_point(inc_points[i1]),
            id: contact_id(ref_edge as u32, i1 as u32),
        },
        ClipVertex {
            v: inc_xf.transform_point(inc_points[i2]),
            id: contact_id(ref_edge as u32, i2 as u32),
        },
    ]
}

/// Segment vs half-plane `dot(normal, p) <= offset`. Returns the clipped
/// segment, or None when fewer than two points survive.
fn clip_segment(
    input: [ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    new_id: u32,
) -> Option<[ClipVertex; 2]> {
    let distance0 = normal.dot(input[0].v) - offset;
    let distance1 = normal.dot(input[1].v) - offset;

    let mut out = [ClipVertex::default(); 2];
    let mut count = 0;

    if distance0 <= 0.0 {
        out[count] = input[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        out[count] = input[1];
        count += 1;
    }

    if distance0 * distance1 < 0.0 {
        if count >= 2 {
            return None; // numerically inconsistent, give up on the pair
        }
        let t = distance0 / (distance0 - distance1);
        out[count] = ClipVertex {
            v: input[0].v + t * (input[1].v - input[0].v),
            id: new_id | CLIPPED_BIT,
        };
        count += 1;
    }

    if count == 2 {
        Some(out)
    } else {
        None
    }
}

/// Face SAT + incident clipping for two convex vertex loops. `flip` marks
/// hull 1 as the actual shape B, producing a FaceB manifold.
#[allow(clippy::too_many_arguments)]
fn clip_hulls(
    ref_points: &[Vec2],
    ref_normals: &[Vec2],
    ref_xf: &Transform2d,
    inc_points: &[Vec2],
    inc_normals: &[Vec2],
    inc_xf: &Transform2d,
    ref_edge: usize,
    total_radius: f32,
    radius_a: f32,
    radius_b: f32,
    flip: bool,
) -> Option<Manifold> {
    let ref_normal_world = ref_xf.rotation.rotate(ref_normals[ref_edge]);
    let incident = find_incident_edge(ref_normal_world, inc_points, inc_normals, inc_xf, ref_edge);

    let i1 = ref_edge;
    let i2 = (ref_edge + 1) % ref_points.len();
    let v1 = ref_xf.transform_point(ref_points[i1]);
    let v2 = ref_xf.transform_point(ref_points[i2]);

    let tangent = (v2 - v1).normalize_or_zero();

    let side_offset1 = -tangent.dot(v1) + total_radius;
    let side_offset2 = tangent.dot(v2) + total_radius;

    // clip against the two side planes of the reference face
    let clipped = clip_segment(incident, -tangent, side_offset1, contact_id(i1 as u32, 0))?;
    let clipped = clip_segment(clipped, tangent, side_offset2, contact_id(i2 as u32, 0))?;

    let front_offset = ref_normal_world.dot(v1);

    let mut manifold = Manifold::new(
        if flip { ManifoldKind::FaceB } else { ManifoldKind::FaceA },
        radius_a,
        radius_b,
    );
    manifold.local_normal = ref_normals[ref_edge];
    manifold.local_point = 0.5 * (ref_points[i1] + ref_points[i2]);

    for clip in clipped {
        let separation = ref_normal_world.dot(clip.v) - front_offset;
        if separation <= total_radius {
            manifold.points[manifold.count] = ManifoldPoint {
                local_point: inc_xf.inv_transform_point(clip.v),
                separation: separation - total_radius,
                id: clip.id,
                ..ManifoldPoint::default()
            };
            manifold.count += 1;
        }
    }

    if manifold.count > 0 {
        Some(manifold)
    } else {
        None
    }
}

/// Small bias towards the first hull's face so the reference choice stays
/// stable across frames.
const REL_FACE_TOLERANCE: f32 = 0.98;
const ABS_FACE_TOLERANCE: f32 = 0.001;

fn collide_hulls(
    points_a: &[Vec2],
    normals_a: &[Vec2],
    xf_a: &Transform2d,
    points_b: &[Vec2],
    normals_b: &[Vec2],
    xf_b: &Transform2d,
) -> Option<Manifold> {
    let total_radius = 2.0 * CONTACT_SKIN;

    let (edge_a, separation_a) = max_separation(points_a, normals_a, xf_a, points_b, xf_b);
    if separation_a > total_radius {
        return None;
    }
    let (edge_b, separation_b) = max_separation(points_b, normals_b, xf_b, points_a, xf_a);
    if separation_b > total_radius {
        return None;
    }

    if separation_b > REL_FACE_TOLERANCE * separation_a + ABS_FACE_TOLERANCE {
        clip_hulls(
            points_b, normals_b, xf_b, points_a, normals_a, xf_a, edge_b, total_radius,
            CONTACT_SKIN, CONTACT_SKIN, true,
        )
    } else {
        clip_hulls(
            points_a, normals_a, xf_a, points_b, normals_b, xf_b, edge_a, total_radius,
            CONTACT_SKIN, CONTACT_SKIN, false,
        )
    }
}

fn collide_polygons(
    a: &ShapePolygon,
    xf_a: &Transform2d,
    b: &ShapePolygon,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    collide_hulls(a.points(), a.normals(), xf_a, b.points(), b.normals(), xf_b)
}

fn collide_edge_polygon(
    edge: &ShapeEdge,
    xf_a: &Transform2d,
    polygon: &ShapePolygon,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    // an edge is a 2-vertex hull with opposing normals
    let points = [edge.a, edge.b];
    let n = edge.normal();
    let normals = [n, -n];
    collide_hulls(&points, &normals, xf_a, polygon.points(), polygon.normals(), xf_b)
}

// --- dispatch --------------------------------------------------------------

type CollideFn = fn(&Shape, &Transform2d, &Shape, &Transform2d) -> Option<Manifold>;

/// One creation function per unordered kind pair; non-canonical orderings
/// swap the arguments and flip the resulting manifold.
#[derive(Copy, Clone)]
struct DispatchEntry {
    func: CollideFn,
    swap: bool,
}

fn dispatch_circle_circle(
    a: &Shape,
    xf_a: &Transform2d,
    b: &Shape,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    match (a, b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        _ => unreachable!("dispatch table kind mismatch"),
    }
}

fn dispatch_edge_circle(
    a: &Shape,
    xf_a: &Transform2d,
    b: &Shape,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    match (a, b) {
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_circle(a, xf_a, b, xf_b),
        _ => unreachable!("dispatch table kind mismatch"),
    }
}

fn dispatch_polygon_circle(
    a: &Shape,
    xf_a: &Transform2d,
    b: &Shape,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    match (a, b) {
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_circle(a, xf_a, b, xf_b),
        _ => unreachable!("dispatch table kind mismatch"),
    }
}

fn dispatch_polygon_polygon(
    a: &Shape,
    xf_a: &Transform2d,
    b: &Shape,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    match (a, b) {
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        _ => unreachable!("dispatch table kind mismatch"),
    }
}

fn dispatch_edge_polygon(
    a: &Shape,
    xf_a: &Transform2d,
    b: &Shape,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    match (a, b) {
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_polygon(a, xf_a, b, xf_b),
        _ => unreachable!("dispatch table kind mismatch"),
    }
}

fn dispatch_none(
    _a: &Shape,
    _xf_a: &Transform2d,
    _b: &Shape,
    _xf_b: &Transform2d,
) -> Option<Manifold> {
    // edge vs edge: two zero-area shapes, no meaningful manifold
    None
}

#[inline]
fn kind_index(kind: ShapeKind) -> usize {
    match kind {
        ShapeKind::Circle => 0,
        ShapeKind::Edge => 1,
        ShapeKind::Polygon => 2,
        ShapeKind::Compound => unreachable!("compounds dispatch per child"),
    }
}

/// Indexed by (kindA, kindB); `swap` marks the non-canonical orderings.
static DISPATCH: [[DispatchEntry; 3]; 3] = {
    const CC: DispatchEntry = DispatchEntry { func: dispatch_circle_circle, swap: false };
    const EC: DispatchEntry = DispatchEntry { func: dispatch_edge_circle, swap: false };
    const CE: DispatchEntry = DispatchEntry { func: dispatch_edge_circle, swap: true };
    const PC: DispatchEntry = DispatchEntry { func: dispatch_polygon_circle, swap: false };
    const CP: DispatchEntry = DispatchEntry { func: dispatch_polygon_circle, swap: true };
    const PP: DispatchEntry = DispatchEntry { func: dispatch_polygon_polygon, swap: false };
    const EP: DispatchEntry = DispatchEntry { func: dispatch_edge_polygon, swap: false };
    const PE: DispatchEntry = DispatchEntry { func: dispatch_edge_polygon, swap: true };
    const EE: DispatchEntry = DispatchEntry { func: dispatch_none, swap: false };
    [
        [CC, CE, CP], // circle vs circle, edge, polygon
        [EC, EE, EP], // edge vs ...
        [PC, PE, PP], // polygon vs ...
    ]
};

/// Contact manifold for a shape pair, or None when they don't touch.
/// Compound shapes dispatch per child; the deepest child manifold wins.
pub fn collide(
    shape_a: &Shape,
    xf_a: &Transform2d,
    shape_b: &Shape,
    xf_b: &Transform2d,
) -> Option<Manifold> {
    match (shape_a, shape_b) {
        (Shape::Compound(compound), _) => compound
            .children()
            .iter()
            .filter_map(|child| collide(&child.shape, xf_a, shape_b, xf_b))
            .min_by(|a, b| {
                a.min_separation()
                    .partial_cmp(&b.min_separation())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        (_, Shape::Compound(compound)) => compound
            .children()
            .iter()
            .filter_map(|child| collide(shape_a, xf_a, &child.shape, xf_b))
            .min_by(|a, b| {
                a.min_separation()
                    .partial_cmp(&b.min_separation())
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
        _ => {
            let entry = DISPATCH[kind_index(shape_a.kind())][kind_index(shape_b.kind())];
            if entry.swap {
                (entry.func)(shape_b, xf_b, shape_a, xf_a).map(Manifold::flipped)
            } else {
                (entry.func)(shape_a, xf_a, shape_b, xf_b)
            }
        }
    }
}
