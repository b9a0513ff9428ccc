//! Planar shapes, triangulation and extrusion.
//!
//! Used to turn glyph outlines into solid letter meshes. Holes are bridged
//! into their outer contour, then the resulting simple polygon is ear-clipped.

use glam::{Vec2, Vec3};

use crate::geometry::Geometry;

/// A filled region with optional holes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub outer: Vec<Vec2>,
    pub holes: Vec<Vec<Vec2>>,
}

/// Twice the signed area; positive for counter-clockwise loops.
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
        * 0.5
}

fn point_in_polygon(p: Vec2, polygon: &[Vec2]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Group closed contours into shapes: contours winding like the largest
/// one are outers, the others become holes of the outer containing them.
pub fn shapes_from_contours(contours: Vec<Vec<Vec2>>) -> Vec<Shape> {
    let contours: Vec<Vec<Vec2>> = contours.into_iter().filter(|c| c.len() >= 3).collect();
    let Some(reference) = contours
        .iter()
        .map(|c| signed_area(c))
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
    else {
        return Vec::new();
    };
    let outer_sign = reference.signum();

    let (outers, holes): (Vec<_>, Vec<_>) = contours
        .into_iter()
        .partition(|c| signed_area(c).signum() == outer_sign);

    let mut shapes: Vec<Shape> = outers
        .into_iter()
        .map(|outer| Shape {
            outer,
            holes: Vec::new(),
        })
        .collect();

    for hole in holes {
        let probe = hole[0];
        if let Some(shape) = shapes
            .iter_mut()
            .find(|shape| point_in_polygon(probe, &shape.outer))
        {
            shape.holes.push(hole);
        }
    }
    shapes
}

fn cross(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a - o).perp_dot(b - o)
}

fn segments_cross(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn bridge_is_clear(a: Vec2, b: Vec2, loops: &[&[Vec2]]) -> bool {
    loops.iter().all(|ring| {
        let n = ring.len();
        (0..n).all(|i| !segments_cross(a, b, ring[i], ring[(i + 1) % n]))
    })
}

/// Splice every hole into the outer loop through a bridge edge.
fn merge_holes(outer: &[Vec2], holes: &[Vec<Vec2>]) -> Vec<Vec2> {
    let mut polygon = outer.to_vec();
    if signed_area(&polygon) < 0.0 {
        polygon.reverse();
    }

    let mut holes: Vec<Vec<Vec2>> = holes
        .iter()
        .filter(|h| h.len() >= 3)
        .map(|h| {
            let mut h = h.clone();
            if signed_area(&h) > 0.0 {
                h.reverse();
            }
            h
        })
        .collect();
    holes.sort_by(|a, b| {
        let ax = a.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let bx = b.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        bx.total_cmp(&ax)
    });

    for (index, hole) in holes.iter().enumerate() {
        let (hole_start, &m) = hole
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.x.total_cmp(&b.1.x))
            .unwrap_or((0, &hole[0]));

        let pending: Vec<&[Vec2]> = holes[index..].iter().map(|h| h.as_slice()).collect();
        let mut candidates: Vec<usize> = (0..polygon.len()).collect();
        candidates.sort_by(|&a, &b| {
            polygon[a]
                .distance_squared(m)
                .total_cmp(&polygon[b].distance_squared(m))
        });
        let bridge = candidates
            .iter()
            .copied()
            .find(|&i| {
                let mut loops = pending.clone();
                loops.push(&polygon);
                bridge_is_clear(m, polygon[i], &loops)
            })
            .unwrap_or(candidates[0]);

        let mut merged = Vec::with_capacity(polygon.len() + hole.len() + 2);
        merged.extend_from_slice(&polygon[..=bridge]);
        merged.extend(hole[hole_start..].iter().copied());
        merged.extend(hole[..=hole_start].iter().copied());
        merged.extend_from_slice(&polygon[bridge..]);
        polygon = merged;
    }
    polygon
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Ear-clip a counter-clockwise simple polygon into triangle indices.
fn ear_clip(polygon: &[Vec2]) -> Vec<[usize; 3]> {
    let mut remaining: Vec<usize> = (0..polygon.len()).collect();
    let mut triangles = Vec::with_capacity(polygon.len().saturating_sub(2));
    let mut stalled = 0;
    let mut i = 0;

    while remaining.len() > 3 && stalled < remaining.len() {
        let n = remaining.len();
        let (ip, ic, inx) = (remaining[(i + n - 1) % n], remaining[i % n], remaining[(i + 1) % n]);
        let (a, b, c) = (polygon[ip], polygon[ic], polygon[inx]);

        let convex = cross(a, b, c) > 0.0;
        let empty = convex
            && remaining.iter().all(|&k| {
                let p = polygon[k];
                k == ip
                    || k == ic
                    || k == inx
                    || p == a
                    || p == b
                    || p == c
                    || !point_in_triangle(p, a, b, c)
            });

        if empty {
            triangles.push([ip, ic, inx]);
            remaining.remove(i % n);
            stalled = 0;
        } else {
            i += 1;
            stalled += 1;
        }
        if !remaining.is_empty() {
            i %= remaining.len();
        }
    }
    if remaining.len() == 3 {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    }
    triangles
}

/// Triangulate a shape. Returns the merged vertex ring and triangles
/// wound counter-clockwise.
pub fn triangulate(shape: &Shape) -> (Vec<Vec2>, Vec<[usize; 3]>) {
    let polygon = merge_holes(&shape.outer, &shape.holes);
    let triangles = ear_clip(&polygon);
    (polygon, triangles)
}

/// Extrude shapes along +Z from `z = 0` to `z = depth`, with caps and walls.
pub fn extrude(shapes: &[Shape], depth: f32) -> Geometry {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut indices = Vec::new();

    for shape in shapes {
        let (ring, triangles) = triangulate(shape);

        // front cap faces +Z, back cap faces -Z
        for (z, normal, flip) in [(depth, Vec3::Z, false), (0.0, Vec3::NEG_Z, true)] {
            let base = positions.len() as u32;
            for p in &ring {
                positions.push(Vec3::new(p.x, p.y, z));
                normals.push(normal);
                uvs.push(*p);
            }
            for [a, b, c] in &triangles {
                let (a, b, c) = (*a as u32, *b as u32, *c as u32);
                if flip {
                    indices.extend([base + a, base + c, base + b]);
                } else {
                    indices.extend([base + a, base + b, base + c]);
                }
            }
        }

        let mut outer = shape.outer.clone();
        if signed_area(&outer) < 0.0 {
            outer.reverse();
        }
        let mut loops = vec![outer];
        for hole in &shape.holes {
            let mut hole = hole.clone();
            if signed_area(&hole) > 0.0 {
                hole.reverse();
            }
            loops.push(hole);
        }

        for ring in &loops {
            let n = ring.len();
            for i in 0..n {
                let (a, b) = (ring[i], ring[(i + 1) % n]);
                let edge = b - a;
                let normal = Vec3::new(edge.y, -edge.x, 0.0).normalize_or_zero();
                let base = positions.len() as u32;
                for (p, z) in [(a, 0.0), (b, 0.0), (b, depth), (a, depth)] {
                    positions.push(Vec3::new(p.x, p.y, z));
                    normals.push(normal);
                    uvs.push(Vec2::new(p.x + p.y, z));
                }
                indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }
    }

    Geometry::new(positions, indices)
        .with_normals(normals)
        .with_uvs(uvs)
}
