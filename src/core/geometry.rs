//! Planar polygon geometry for validation cells, footprints and camp boundaries

use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};

/// A point in map coordinates
pub type Point = (f64, f64);

/// Shared area below this fraction of the smaller polygon counts as touching
const OVERLAP_TOLERANCE: f64 = 1e-9;

/// Simple polygon with optional holes; rings are not required to be closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>) -> Self {
        Self { exterior: strip_closing_point(exterior), holes: Vec::new() }
    }

    pub fn with_holes(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        Self {
            exterior: strip_closing_point(exterior),
            holes: holes.into_iter().map(strip_closing_point).collect(),
        }
    }

    /// Axis-aligned rectangle
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self::new(vec![
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
        ])
    }

    pub fn bbox(&self) -> BoundingBox {
        let mut bbox = BoundingBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in &self.exterior {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        bbox
    }

    /// Area of the exterior minus holes (shoelace formula)
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| ring_area(h)).sum();
        ring_area(&self.exterior) - holes
    }

    /// Even-odd containment test; points on the boundary are not guaranteed either way
    pub fn contains_point(&self, point: Point) -> bool {
        if self.exterior.len() < 3 {
            return false;
        }
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }

    /// True when the polygons share interior or boundary points
    pub fn intersects(&self, other: &Polygon) -> bool {
        if self.exterior.len() < 3 || other.exterior.len() < 3 {
            return false;
        }
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }

        // Any boundary crossing, hole rings included
        for ring_a in self.rings() {
            for ring_b in other.rings() {
                for (a1, a2) in ring_edges(ring_a) {
                    for (b1, b2) in ring_edges(ring_b) {
                        if segments_intersect(a1, a2, b1, b2) {
                            return true;
                        }
                    }
                }
            }
        }

        // One fully inside the other
        self.contains_point(other.exterior[0]) || other.contains_point(self.exterior[0])
    }

    /// Area shared by the two polygons' interiors
    pub fn intersection_area(&self, other: &Polygon) -> f64 {
        if self.exterior.len() < 3 || other.exterior.len() < 3 {
            return 0.0;
        }
        if self.bbox().intersection(&other.bbox()).is_none() {
            return 0.0;
        }

        // Holes lie inside their exterior and are pairwise disjoint
        let mut area = ring_intersection_area(&self.exterior, &other.exterior);
        for hole in &self.holes {
            area -= ring_intersection_area(hole, &other.exterior);
        }
        for hole in &other.holes {
            area -= ring_intersection_area(&self.exterior, hole);
        }
        for hole_a in &self.holes {
            for hole_b in &other.holes {
                area += ring_intersection_area(hole_a, hole_b);
            }
        }
        area.max(0.0)
    }

    /// True when the interiors overlap; touching along an edge or at a vertex
    /// does not count
    pub fn overlaps(&self, other: &Polygon) -> bool {
        let tolerance = OVERLAP_TOLERANCE * self.area().min(other.area());
        self.intersection_area(other) > tolerance
    }

    fn rings(&self) -> impl Iterator<Item = &[Point]> + '_ {
        std::iter::once(self.exterior.as_slice()).chain(self.holes.iter().map(|h| h.as_slice()))
    }

    /// WKT representation, used when writing vector layers
    pub fn to_wkt(&self) -> String {
        format!("POLYGON {}", self.wkt_body())
    }

    fn wkt_body(&self) -> String {
        let mut rings = vec![ring_wkt(&self.exterior)];
        rings.extend(self.holes.iter().map(|h| ring_wkt(h)));
        format!("({})", rings.join(", "))
    }
}

/// Feature geometry made of one or more disjoint polygon parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon {
    pub parts: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(parts: Vec<Polygon>) -> Self {
        Self { parts }
    }

    pub fn bbox(&self) -> BoundingBox {
        let mut bbox = BoundingBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for part in &self.parts {
            let b = part.bbox();
            bbox.min_x = bbox.min_x.min(b.min_x);
            bbox.min_y = bbox.min_y.min(b.min_y);
            bbox.max_x = bbox.max_x.max(b.max_x);
            bbox.max_y = bbox.max_y.max(b.max_y);
        }
        bbox
    }

    pub fn area(&self) -> f64 {
        self.parts.iter().map(Polygon::area).sum()
    }

    /// True when the interior of any part overlaps `other`
    pub fn overlaps_polygon(&self, other: &Polygon) -> bool {
        self.parts.iter().any(|part| part.overlaps(other))
    }

    /// True when the interiors of any two parts overlap
    pub fn overlaps(&self, other: &MultiPolygon) -> bool {
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }
        other.parts.iter().any(|part| self.overlaps_polygon(part))
    }

    /// `POLYGON` for single-part geometries, `MULTIPOLYGON` otherwise
    pub fn to_wkt(&self) -> String {
        match self.parts.as_slice() {
            [] => "MULTIPOLYGON EMPTY".to_string(),
            [single] => single.to_wkt(),
            parts => {
                let bodies: Vec<String> = parts.iter().map(Polygon::wkt_body).collect();
                format!("MULTIPOLYGON ({})", bodies.join(", "))
            }
        }
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(polygon: Polygon) -> Self {
        Self::new(vec![polygon])
    }
}

fn strip_closing_point(mut ring: Vec<Point>) -> Vec<Point> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn ring_wkt(ring: &[Point]) -> String {
    let mut coords: Vec<String> = ring.iter().map(|(x, y)| format!("{} {}", x, y)).collect();
    if let Some((x, y)) = ring.first() {
        coords.push(format!("{} {}", x, y));
    }
    format!("({})", coords.join(", "))
}

fn signed_ring_area(ring: &[Point]) -> f64 {
    let twice: f64 = ring_edges(ring).map(|((x1, y1), (x2, y2))| x1 * y2 - x2 * y1).sum();
    twice / 2.0
}

fn ring_area(ring: &[Point]) -> f64 {
    signed_ring_area(ring).abs()
}

/// Area shared by two simple rings: the smaller ring is split into triangles
/// and the other is clipped against each of them
fn ring_intersection_area(a: &[Point], b: &[Point]) -> f64 {
    let (subject, clip) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    triangulate(clip)
        .iter()
        .map(|triangle| ring_area(&clip_to_convex(subject, triangle)))
        .sum()
}

fn point_in_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    orientation(a, b, p) >= 0.0 && orientation(b, c, p) >= 0.0 && orientation(c, a, p) >= 0.0
}

/// Ear-clipping triangulation of a simple ring into counter-clockwise triangles
fn triangulate(ring: &[Point]) -> Vec<[Point; 3]> {
    if ring.len() < 3 {
        return Vec::new();
    }
    let mut points = ring.to_vec();
    if signed_ring_area(&points) < 0.0 {
        points.reverse();
    }

    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::with_capacity(points.len() - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let corner = |i: usize| {
            (
                points[remaining[(i + m - 1) % m]],
                points[remaining[i]],
                points[remaining[(i + 1) % m]],
            )
        };

        let ear = (0..m).find(|&i| {
            let (a, b, c) = corner(i);
            orientation(a, b, c) > 0.0
                && !remaining.iter().any(|&k| {
                    let p = points[k];
                    p != a && p != b && p != c && point_in_triangle(p, a, b, c)
                })
        });

        match ear {
            Some(i) => {
                let (a, b, c) = corner(i);
                triangles.push([a, b, c]);
                remaining.remove(i);
            }
            None => {
                // Only collinear vertices can block every ear of a simple ring
                let flat = (0..m).find(|&i| {
                    let (a, b, c) = corner(i);
                    orientation(a, b, c) == 0.0
                });
                match flat {
                    Some(i) => {
                        remaining.remove(i);
                    }
                    None => {
                        log::warn!("Ring is not simple; triangulation stopped early");
                        break;
                    }
                }
            }
        }
    }

    if remaining.len() == 3 {
        let (a, b, c) = (points[remaining[0]], points[remaining[1]], points[remaining[2]]);
        if orientation(a, b, c) > 0.0 {
            triangles.push([a, b, c]);
        }
    }
    triangles
}

/// Sutherland-Hodgman clipping of any simple ring by a counter-clockwise convex ring
fn clip_to_convex(subject: &[Point], clip: &[Point]) -> Vec<Point> {
    let mut output = subject.to_vec();
    for (a, b) in ring_edges(clip) {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        for (p, q) in ring_edges(&input) {
            let dp = orientation(a, b, p);
            let dq = orientation(a, b, q);
            match (dp >= 0.0, dq >= 0.0) {
                (true, true) => output.push(q),
                (true, false) => output.push(lerp(p, q, dp / (dp - dq))),
                (false, true) => {
                    output.push(lerp(p, q, dp / (dp - dq)));
                    output.push(q);
                }
                (false, false) => {}
            }
        }
    }
    output
}

fn lerp(p: Point, q: Point, t: f64) -> Point {
    (p.0 + t * (q.0 - p.0), p.1 + t * (q.1 - p.1))
}

fn ring_edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

fn ring_contains(ring: &[Point], (px, py): Point) -> bool {
    let mut inside = false;
    for ((x1, y1), (x2, y2)) in ring_edges(ring) {
        if (y1 > py) != (y2 > py) {
            let x_cross = x1 + (py - y1) * (x2 - x1) / (y2 - y1);
            if px < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}
