//! Triangle geometry, bounds and ray queries.

use glam::{Mat4, Vec2, Vec3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any point expands.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |b, p| b.expanded(*p))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expanded(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(self, other: Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.min + (self.max - self.min) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Bounds of this box after an affine transform.
    pub fn transformed(&self, matrix: Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out = out.expanded(matrix.transform_point3(corner));
        }
        out
    }
}

/// A half-line with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Möller-Trumbore intersection. Returns the distance along the ray and
    /// whether the front (counter-clockwise) face was hit.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, bool)> {
        const EPSILON: f32 = 1e-7;
        let edge1 = b - a;
        let edge2 = c - a;
        let pvec = self.direction.cross(edge2);
        let det = edge1.dot(pvec);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = self.origin - a;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(edge1);
        let v = self.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(qvec) * inv_det;
        (t > EPSILON).then_some((t, det > 0.0))
    }
}

/// Indexed triangle geometry.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    /// Number of morph targets the source mesh declared
    pub morph_targets: usize,
    bounds: Option<Aabb>,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut geometry = Self {
            positions,
            indices,
            ..Default::default()
        };
        geometry.compute_bounds();
        geometry
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = uvs;
        self
    }

    /// Axis-aligned unit-less box, handy for fixtures.
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        let corners = [
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
        ];
        let indices = vec![
            0, 1, 2, 0, 2, 3, // +z
            5, 4, 7, 5, 7, 6, // -z
            1, 5, 6, 1, 6, 2, // +x
            4, 0, 3, 4, 3, 7, // -x
            3, 2, 6, 3, 6, 7, // +y
            4, 5, 1, 4, 1, 0, // -y
        ];
        let mut geometry = Self::new(corners.to_vec(), indices);
        geometry.compute_vertex_normals();
        geometry
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds.unwrap_or(Aabb::EMPTY)
    }

    pub fn compute_bounds(&mut self) {
        self.bounds = Some(Aabb::from_points(&self.positions));
    }

    /// Translate vertices so the bounding box is centered on the origin.
    pub fn center(&mut self) {
        let offset = self.bounds().center();
        if !offset.is_finite() {
            return;
        }
        for p in &mut self.positions {
            *p -= offset;
        }
        self.compute_bounds();
    }

    /// Area-weighted smooth normals.
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.triangle_indices() {
            let n = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        self.normals = normals.into_iter().map(|n| n.normalize_or_zero()).collect();
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex indices of each triangle.
    pub fn triangle_indices(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
            .filter(|[a, b, c]| {
                *a < self.positions.len() && *b < self.positions.len() && *c < self.positions.len()
            })
    }

    /// Nearest hit of a world-space ray, `world` being this geometry's
    /// model matrix. `front`/`back` select which faces count.
    pub fn raycast(&self, ray: &Ray, world: Mat4, front: bool, back: bool) -> Option<f32> {
        let mut nearest: Option<f32> = None;
        for [a, b, c] in self.triangle_indices() {
            let pa = world.transform_point3(self.positions[a]);
            let pb = world.transform_point3(self.positions[b]);
            let pc = world.transform_point3(self.positions[c]);
            if let Some((t, front_face)) = ray.intersect_triangle(pa, pb, pc)
                && ((front_face && front) || (!front_face && back))
                && nearest.is_none_or(|n| t < n)
            {
                nearest = Some(t);
            }
        }
        nearest
    }
}
