//! Per-hit scattering interaction.

use crate::core::common::*;
use crate::core::fresnel;
use crate::core::geometry::{CoordinateSystem, Point3f, Ray, Vector3f};
use crate::core::material::Material;
use crate::core::rng::Rng;
use crate::core::scene::{Intersection, Scene};

/// The scattering branch selected at a surface hit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScatterType {
    /// Mirror reflection.
    Reflect,

    /// Refraction through the surface.
    Refract,

    /// Diffuse scattering.
    Diffuse,
}

/// Scattering state derived at a surface hit. Both normals face the incoming
/// ray once construction completes.
pub struct Interaction<'a> {
    /// Distance along the ray.
    pub t: Float,

    /// World-space hit position.
    pub position: Point3f,

    /// Geometric normal, flipped toward the incoming ray.
    pub normal: Vector3f,

    /// Shading normal, flipped toward the incoming ray.
    pub shading_normal: Vector3f,

    /// The normal the specular lobes scatter about: a sampled microfacet
    /// normal for rough-specular materials, the shading normal otherwise.
    pub specular_normal: Vector3f,

    /// The material at the hit.
    pub material: &'a Material,

    /// Outgoing direction; the reverse of the incoming ray direction.
    pub out: Vector3f,

    /// Index of refraction on the incident side.
    pub n1: Float,

    /// Index of refraction on the far side.
    pub n2: Float,

    /// True when the ray hit the surface from inside a dielectric.
    pub inside: bool,

    /// The selected scattering branch.
    pub scatter: ScatterType,

    /// Local frame; aligned to the shading normal for diffuse scattering and
    /// to the specular normal otherwise.
    pub cs: CoordinateSystem,
}

impl<'a> Interaction<'a> {
    /// Derive the scattering state for an intersection.
    ///
    /// * `scene` - The scene.
    /// * `isect` - The intersection.
    /// * `ray`   - The incoming ray.
    /// * `rng`   - Random number generator for branch selection and
    ///             microfacet sampling.
    pub fn new(scene: &'a Scene, isect: &Intersection, ray: &Ray, rng: &mut Rng) -> Self {
        let surface = &scene.surfaces[isect.surface];
        let material = &scene.materials[surface.material()];

        let position = ray.at(isect.t);
        let mut normal = surface.normal(&position);
        let cos_theta = ray.direction.dot(&normal);

        let (inside, n2) = if cos_theta < 0.0 || material.opaque() {
            (false, material.ior)
        } else {
            (true, material.external_ior)
        };
        let n1 = ray.medium_ior;

        let mut shading_normal = if isect.interpolate {
            let ns = surface.interpolated_normal(isect.u, isect.v);
            // Reject interpolated normals that disagree with the geometric
            // normal about sidedness; keeping them causes self-shadowing on
            // silhouettes.
            if (cos_theta < 0.0) != (ray.direction.dot(&ns) < 0.0) {
                normal
            } else {
                ns
            }
        } else {
            normal
        };

        if cos_theta > 0.0 {
            normal = -normal;
            shading_normal = -shading_normal;
        }

        let out = -ray.direction;
        let mut cs = CoordinateSystem::new(shading_normal);

        let (scatter, specular_normal) = if material.rough_specular() {
            let h = cs.to_world(&material.specular_microfacet_normal(&cs.to_local(&out), rng));
            let scatter = select_type(material, n1, n2, &h, &out, rng);
            if scatter != ScatterType::Diffuse {
                cs = CoordinateSystem::new(h);
            }
            (scatter, h)
        } else {
            (
                select_type(material, n1, n2, &shading_normal, &out, rng),
                shading_normal,
            )
        };

        Self {
            t: isect.t,
            position,
            normal,
            shading_normal,
            specular_normal,
            material,
            out,
            n1,
            n2,
            inside,
            scatter,
            cs,
        }
    }

    /// Evaluate the BRDF of the selected branch for a world-space incident
    /// direction.
    ///
    /// * `in_dir` - Incident direction.
    pub fn brdf(&self, in_dir: &Vector3f) -> Vector3f {
        let local_in = self.cs.to_local(in_dir);
        // Grazing angle edge case.
        if local_in.z == 0.0 {
            return Vector3f::ZERO;
        }

        let local_out = self.cs.to_local(&self.out);
        if self.scatter != ScatterType::Diffuse {
            let mut brdf = self
                .material
                .specular_brdf(&local_in, &local_out, self.inside);
            if let Some(ci) = &self.material.complex_ior {
                brdf *= fresnel::conductor(self.n1, &ci.eta, &ci.k, local_out.z);
            }
            brdf
        } else {
            self.material.diffuse_brdf(&local_in, &local_out)
        }
    }
}

/// Select the scattering branch: a three-way sample over reflection,
/// refraction, and diffuse scattering weighted by Fresnel reflectance `R`
/// and transparency `T` so that `R + (1-R)T + (1-R)(1-T) = 1`.
fn select_type(
    material: &Material,
    n1: Float,
    n2: Float,
    specular_normal: &Vector3f,
    out: &Vector3f,
    rng: &mut Rng,
) -> ScatterType {
    if material.perfect_mirror || material.complex_ior.is_some() {
        return ScatterType::Reflect;
    }

    let r = fresnel::dielectric(n1, n2, specular_normal.dot(out));
    let t = material.transparency;
    let p = rng.uniform_float();

    if r > p {
        ScatterType::Reflect
    } else if r + (1.0 - r) * t > p {
        ScatterType::Refract
    } else {
        ScatterType::Diffuse
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
