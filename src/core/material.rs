//! Materials.

use crate::core::common::*;
use crate::core::geometry::Vector3f;
use crate::core::rng::Rng;

/// Wavelength-dependent complex index of refraction of a conductor.
#[derive(Copy, Clone, Debug)]
pub struct ComplexIor {
    /// Index of refraction per RGB channel.
    pub eta: Vector3f,

    /// Absorption coefficient per RGB channel.
    pub k: Vector3f,
}

/// Surface material properties.
#[derive(Clone, Debug)]
pub struct Material {
    /// Diffuse RGB reflectance.
    pub reflectance: Vector3f,

    /// Emitted RGB radiance.
    pub emittance: Vector3f,

    /// Index of refraction of the material interior.
    pub ior: Float,

    /// Index of refraction of the medium surrounding the surface.
    pub external_ior: Float,

    /// Probability that a non-reflected path refracts rather than scatters
    /// diffusely.
    pub transparency: Float,

    /// Survival probability used by Russian roulette once a path is deep
    /// enough to be a termination candidate.
    pub reflect_probability: Float,

    /// Microfacet roughness; zero means perfectly smooth specular lobes.
    pub roughness: Float,

    /// Reflect all paths regardless of Fresnel.
    pub perfect_mirror: bool,

    /// Conductor response; forces reflection and tints it by the conductor
    /// Fresnel term.
    pub complex_ior: Option<ComplexIor>,
}

impl Default for Material {
    /// A matte white diffuse material.
    fn default() -> Self {
        Self {
            reflectance: Vector3f::splat(0.8),
            emittance: Vector3f::ZERO,
            ior: 1.0,
            external_ior: 1.0,
            transparency: 0.0,
            reflect_probability: 0.8,
            roughness: 0.0,
            perfect_mirror: false,
            complex_ior: None,
        }
    }
}

impl Material {
    /// Returns true if rays never pass through the surface.
    pub fn opaque(&self) -> bool {
        self.transparency <= 0.0
    }

    /// Returns true if the specular lobes are perturbed by a microfacet
    /// distribution.
    pub fn rough_specular(&self) -> bool {
        self.roughness > 0.0
    }

    /// Returns true if the material emits light.
    pub fn emissive(&self) -> bool {
        !self.emittance.is_black()
    }

    /// Returns true if the material can scatter light diffusely. Shadow
    /// photons are only meaningful on such surfaces.
    pub fn can_diffusely_reflect(&self) -> bool {
        !self.perfect_mirror && self.complex_ior.is_none() && self.transparency < 1.0
    }

    /// Evaluate the diffuse BRDF for a local-frame direction pair.
    ///
    /// * `local_in`  - Incident direction in the surface frame.
    /// * `local_out` - Outgoing direction in the surface frame.
    pub fn diffuse_brdf(&self, _local_in: &Vector3f, _local_out: &Vector3f) -> Vector3f {
        self.reflectance * INV_PI
    }

    /// Evaluate the specular BRDF for a local-frame direction pair. The
    /// specular lobes are delta distributions sampled exactly, so the weight
    /// is unity; conductor tinting is applied by the interaction.
    ///
    /// * `local_in`  - Incident direction in the surface frame.
    /// * `local_out` - Outgoing direction in the surface frame.
    /// * `inside`    - True when the ray travels inside the material.
    pub fn specular_brdf(
        &self,
        _local_in: &Vector3f,
        _local_out: &Vector3f,
        _inside: bool,
    ) -> Vector3f {
        Vector3f::ONE
    }

    /// Sample a microfacet normal about the local z-axis from a Beckmann
    /// distribution with `α = roughness`.
    ///
    /// * `local_out` - Outgoing direction in the surface frame.
    /// * `rng`       - Random number generator.
    pub fn specular_microfacet_normal(&self, local_out: &Vector3f, rng: &mut Rng) -> Vector3f {
        let u1 = rng.uniform_float();
        let u2 = rng.uniform_float();

        let a2 = self.roughness * self.roughness;
        let tan2_theta = -a2 * (1.0 - u1).ln();
        let cos_theta = 1.0 / (1.0 + tan2_theta).sqrt();
        let sin_theta = max(0.0, 1.0 - cos_theta * cos_theta).sqrt();
        let phi = TWO_PI * u2;

        let h = Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
        if local_out.z < 0.0 {
            -h
        } else {
            h
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
