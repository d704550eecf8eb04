//! Scene representation.

use crate::core::common::*;
use crate::core::geometry::{Bounds3f, Ray, Vector3f};
use crate::core::material::Material;
use crate::core::surface::Surface;

/// The closest ray-scene intersection.
#[derive(Copy, Clone, Debug)]
pub struct Intersection {
    /// Distance along the ray.
    pub t: Float,

    /// Index of the intersected surface.
    pub surface: usize,

    /// First surface parameter.
    pub u: Float,

    /// Second surface parameter.
    pub v: Float,

    /// True when a shading normal should be interpolated at `(u, v)`.
    pub interpolate: bool,
}

/// A scene. Owns all surfaces and materials in flat arrays; everything else
/// refers to them by index. Read-only once constructed.
#[derive(Debug)]
pub struct Scene {
    /// The surfaces.
    pub surfaces: Vec<Surface>,

    /// The materials.
    pub materials: Vec<Material>,

    /// Indices of surfaces with emissive materials.
    pub emissives: Vec<usize>,

    /// Index of refraction of the scene medium.
    pub ior: Float,

    /// Constant sky radiance returned for escaping rays.
    pub sky: Vector3f,

    bounds: Bounds3f,
}

impl Scene {
    /// Create a new scene.
    ///
    /// * `surfaces`  - The surfaces.
    /// * `materials` - The materials; surfaces reference these by index.
    /// * `ior`       - Index of refraction of the scene medium.
    /// * `sky`       - Constant sky radiance for escaping rays.
    pub fn new(surfaces: Vec<Surface>, materials: Vec<Material>, ior: Float, sky: Vector3f) -> Self {
        let bounds = surfaces
            .iter()
            .fold(Bounds3f::empty(), |bb, s| bb.union(&s.bounds()));

        let emissives = surfaces
            .iter()
            .enumerate()
            .filter(|(_, s)| materials[s.material()].emissive() && s.area() > 0.0)
            .map(|(i, _)| i)
            .collect();

        Self {
            surfaces,
            materials,
            emissives,
            ior,
            sky,
            bounds,
        }
    }

    /// Returns the scene's bounding box.
    pub fn bounding_box(&self) -> Bounds3f {
        self.bounds
    }

    /// Returns the material of a surface.
    ///
    /// * `surface` - The surface index.
    pub fn material(&self, surface: usize) -> &Material {
        &self.materials[self.surfaces[surface].material()]
    }

    /// Returns the closest intersection of a ray with the scene.
    ///
    /// * `ray` - The ray.
    pub fn intersect(&self, ray: &Ray) -> Option<Intersection> {
        let mut closest: Option<Intersection> = None;
        for (i, surface) in self.surfaces.iter().enumerate() {
            if let Some(hit) = surface.intersect(ray) {
                if closest.map_or(true, |c| hit.t < c.t) {
                    closest = Some(Intersection {
                        t: hit.t,
                        surface: i,
                        u: hit.u,
                        v: hit.v,
                        interpolate: hit.interpolate,
                    });
                }
            }
        }
        closest
    }

    /// Returns the radiance of the sky for an escaping ray.
    ///
    /// * `_ray` - The escaping ray.
    pub fn sky_radiance(&self, _ray: &Ray) -> Vector3f {
        self.sky
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Point3f;

    #[test]
    fn closest_surface_wins() {
        let materials = vec![Material::default()];
        let near = Surface::Sphere {
            origin: Point3f::new(0.0, 0.0, 2.0),
            radius: 0.5,
            material: 0,
        };
        let far = Surface::Sphere {
            origin: Point3f::new(0.0, 0.0, 5.0),
            radius: 0.5,
            material: 0,
        };
        let scene = Scene::new(vec![far, near], materials, 1.0, Vector3f::ZERO);
        let ray = Ray::new(Point3f::ZERO, Vector3f::new(0.0, 0.0, 1.0), 1.0);
        let isect = scene.intersect(&ray).unwrap();
        assert_eq!(isect.surface, 1);
    }

    #[test]
    fn emissives_collect_surfaces_with_emittance() {
        let mut light = Material::default();
        light.emittance = Vector3f::splat(10.0);
        let materials = vec![Material::default(), light];
        let surfaces = vec![
            Surface::Sphere {
                origin: Point3f::ZERO,
                radius: 1.0,
                material: 0,
            },
            Surface::Sphere {
                origin: Point3f::new(3.0, 0.0, 0.0),
                radius: 1.0,
                material: 1,
            },
        ];
        let scene = Scene::new(surfaces, materials, 1.0, Vector3f::ZERO);
        assert_eq!(scene.emissives, vec![1]);
    }
}
