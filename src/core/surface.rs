//! Scene surfaces.

use crate::core::common::*;
use crate::core::geometry::{Bounds3f, Point3f, Ray, Vector3f};

/// Result of a ray-surface intersection test.
#[derive(Copy, Clone, Debug)]
pub struct SurfaceHit {
    /// Distance along the ray.
    pub t: Float,

    /// First surface parameter; barycentric for triangles.
    pub u: Float,

    /// Second surface parameter; barycentric for triangles.
    pub v: Float,

    /// True when a shading normal should be interpolated from vertex
    /// attributes at `(u, v)`.
    pub interpolate: bool,
}

/// A scene surface. Dispatch is by match on the variant; materials are
/// referenced by index into the scene's flat material array.
#[derive(Clone, Debug)]
pub enum Surface {
    /// A sphere.
    Sphere {
        /// Centre.
        origin: Point3f,
        /// Radius.
        radius: Float,
        /// Material index.
        material: usize,
    },

    /// A triangle, optionally with per-vertex shading normals.
    Triangle {
        /// First vertex.
        v0: Point3f,
        /// Second vertex.
        v1: Point3f,
        /// Third vertex.
        v2: Point3f,
        /// Per-vertex shading normals.
        normals: Option<[Vector3f; 3]>,
        /// Material index.
        material: usize,
    },

    /// A parallelogram spanned by two edges.
    Quad {
        /// Corner.
        origin: Point3f,
        /// First spanning edge.
        edge_u: Vector3f,
        /// Second spanning edge.
        edge_v: Vector3f,
        /// Material index.
        material: usize,
    },
}

const T_MIN: Float = 1e-9;

impl Surface {
    /// Returns the surface's material index.
    pub fn material(&self) -> usize {
        match *self {
            Surface::Sphere { material, .. } => material,
            Surface::Triangle { material, .. } => material,
            Surface::Quad { material, .. } => material,
        }
    }

    /// Intersect a ray with the surface.
    ///
    /// * `ray` - The ray.
    pub fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        match self {
            Surface::Sphere { origin, radius, .. } => {
                let oc = ray.origin - *origin;
                let b = oc.dot(&ray.direction);
                let c = oc.length_squared() - radius * radius;
                let discriminant = b * b - c;
                if discriminant < 0.0 {
                    return None;
                }
                let sqrt_d = discriminant.sqrt();
                let t = if -b - sqrt_d > T_MIN {
                    -b - sqrt_d
                } else if -b + sqrt_d > T_MIN {
                    -b + sqrt_d
                } else {
                    return None;
                };
                Some(SurfaceHit {
                    t,
                    u: 0.0,
                    v: 0.0,
                    interpolate: false,
                })
            }
            Surface::Triangle {
                v0,
                v1,
                v2,
                normals,
                ..
            } => {
                // Möller-Trumbore.
                let e1 = *v1 - *v0;
                let e2 = *v2 - *v0;
                let p = ray.direction.cross(&e2);
                let det = e1.dot(&p);
                if abs(det) < 1e-12 {
                    return None;
                }
                let inv_det = 1.0 / det;
                let s = ray.origin - *v0;
                let u = s.dot(&p) * inv_det;
                if !(0.0..=1.0).contains(&u) {
                    return None;
                }
                let q = s.cross(&e1);
                let v = ray.direction.dot(&q) * inv_det;
                if v < 0.0 || u + v > 1.0 {
                    return None;
                }
                let t = e2.dot(&q) * inv_det;
                (t > T_MIN).then_some(SurfaceHit {
                    t,
                    u,
                    v,
                    interpolate: normals.is_some(),
                })
            }
            Surface::Quad {
                origin,
                edge_u,
                edge_v,
                ..
            } => {
                let n = edge_u.cross(edge_v);
                let denom = n.dot(&ray.direction);
                if abs(denom) < 1e-12 {
                    return None;
                }
                let t = n.dot(&(*origin - ray.origin)) / denom;
                if t <= T_MIN {
                    return None;
                }
                let local = ray.at(t) - *origin;
                let uu = edge_u.dot(edge_u);
                let uv = edge_u.dot(edge_v);
                let vv = edge_v.dot(edge_v);
                let lu = local.dot(edge_u);
                let lv = local.dot(edge_v);
                let inv = 1.0 / (uu * vv - uv * uv);
                let u = (lu * vv - lv * uv) * inv;
                let v = (lv * uu - lu * uv) * inv;
                ((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v)).then_some(SurfaceHit {
                    t,
                    u,
                    v,
                    interpolate: false,
                })
            }
        }
    }

    /// Returns the geometric normal at a point on the surface.
    ///
    /// * `point` - The point.
    pub fn normal(&self, point: &Point3f) -> Vector3f {
        match self {
            Surface::Sphere { origin, radius, .. } => (*point - *origin) / *radius,
            Surface::Triangle { v0, v1, v2, .. } => {
                (*v1 - *v0).cross(&(*v2 - *v0)).normalize()
            }
            Surface::Quad { edge_u, edge_v, .. } => edge_u.cross(edge_v).normalize(),
        }
    }

    /// Returns the shading normal interpolated from vertex attributes at the
    /// given surface parameters. Falls back to the geometric normal for
    /// surfaces without vertex normals.
    ///
    /// * `u` - First surface parameter.
    /// * `v` - Second surface parameter.
    pub fn interpolated_normal(&self, u: Float, v: Float) -> Vector3f {
        match self {
            Surface::Triangle {
                normals: Some(n), ..
            } => (n[0] * (1.0 - u - v) + n[1] * u + n[2] * v).normalize(),
            _ => {
                let p = self.point(u, v);
                self.normal(&p)
            }
        }
    }

    /// Returns the surface area.
    pub fn area(&self) -> Float {
        match self {
            Surface::Sphere { radius, .. } => 4.0 * PI * radius * radius,
            Surface::Triangle { v0, v1, v2, .. } => {
                0.5 * (*v1 - *v0).cross(&(*v2 - *v0)).length()
            }
            Surface::Quad { edge_u, edge_v, .. } => edge_u.cross(edge_v).length(),
        }
    }

    /// Returns a point on the surface for parameters `(u, v)` in the unit
    /// square. Used to sample emission positions.
    ///
    /// * `u` - First surface parameter.
    /// * `v` - Second surface parameter.
    pub fn point(&self, u: Float, v: Float) -> Point3f {
        match self {
            Surface::Sphere { origin, radius, .. } => {
                let z = 1.0 - 2.0 * u;
                let r = max(0.0, 1.0 - z * z).sqrt();
                let phi = TWO_PI * v;
                *origin + Vector3f::new(r * phi.cos(), r * phi.sin(), z) * *radius
            }
            Surface::Triangle { v0, v1, v2, .. } => {
                // Fold the unit square onto the triangle.
                let (u, v) = if u + v > 1.0 { (1.0 - u, 1.0 - v) } else { (u, v) };
                *v0 + (*v1 - *v0) * u + (*v2 - *v0) * v
            }
            Surface::Quad {
                origin,
                edge_u,
                edge_v,
                ..
            } => *origin + *edge_u * u + *edge_v * v,
        }
    }

    /// Returns the surface's bounding box.
    pub fn bounds(&self) -> Bounds3f {
        match self {
            Surface::Sphere { origin, radius, .. } => Bounds3f::new(
                *origin - Point3f::splat(*radius),
                *origin + Point3f::splat(*radius),
            ),
            Surface::Triangle { v0, v1, v2, .. } => {
                Bounds3f::new(*v0, *v1).union(&Bounds3f::new(*v2, *v2))
            }
            Surface::Quad {
                origin,
                edge_u,
                edge_v,
                ..
            } => {
                let a = *origin + *edge_u;
                let b = *origin + *edge_v;
                let c = *origin + *edge_u + *edge_v;
                Bounds3f::new(*origin, c).union(&Bounds3f::new(a, b))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
