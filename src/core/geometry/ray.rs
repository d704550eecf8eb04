//! Rays

use super::{Point3f, Vector3f};
use crate::core::common::*;
use crate::core::interaction::Interaction;
use crate::core::rng::Rng;
use crate::core::sampling::cosine_sample_hemisphere;

/// A ray travelling through a participating medium with a given index of
/// refraction.
#[derive(Copy, Clone, Debug)]
pub struct Ray {
    /// Origin.
    pub origin: Point3f,

    /// Unit direction.
    pub direction: Vector3f,

    /// Index of refraction of the medium the ray travels in.
    pub medium_ior: Float,

    /// True when the most recent scattering event was a mirror reflection or
    /// refraction. A path prefix is specular-only when every preceding event
    /// set this too.
    pub specular: bool,
}

impl Ray {
    /// Create a new ray.
    ///
    /// * `origin`     - Origin.
    /// * `direction`  - Unit direction.
    /// * `medium_ior` - Index of refraction of the containing medium.
    pub fn new(origin: Point3f, direction: Vector3f, medium_ior: Float) -> Self {
        Self {
            origin,
            direction,
            medium_ior,
            specular: false,
        }
    }

    /// Get position along the ray at given parameter.
    ///
    /// * `t` - Parameter to evaluate.
    pub fn at(&self, t: Float) -> Point3f {
        self.origin + self.direction * t
    }

    /// Spawn a cosine-weighted diffuse bounce from an interaction. The new
    /// origin is offset along the surface normal and the specular flag is
    /// cleared.
    ///
    /// * `ia`  - The interaction.
    /// * `rng` - Random number generator for the hemisphere sample.
    pub fn reflect_diffuse(ia: &Interaction, rng: &mut Rng) -> Self {
        Self {
            origin: ia.position + ia.normal * EPSILON,
            direction: ia.cs.to_world(&cosine_sample_hemisphere(rng)),
            medium_ior: ia.n1,
            specular: false,
        }
    }

    /// Spawn a mirror reflection about the interaction's specular normal.
    /// Returns the ray together with whether the reflected direction lies in
    /// the upper hemisphere of the shading normal; consumers may skip the
    /// contribution otherwise.
    ///
    /// * `in_dir` - Incident direction (pointing toward the surface).
    /// * `ia`     - The interaction.
    pub fn reflect_specular(in_dir: &Vector3f, ia: &Interaction) -> (Self, bool) {
        let direction = in_dir.reflect(&ia.specular_normal);
        let ray = Self {
            origin: ia.position + ia.normal * EPSILON,
            direction,
            medium_ior: ia.n1,
            specular: true,
        };
        (ray, ia.shading_normal.dot(&direction) > 0.0)
    }

    /// Spawn a refraction through the interaction using Snell's law with
    /// `η = n1/n2`. Total internal reflection degrades to a mirror reflection
    /// that stays in the incident medium.
    ///
    /// * `in_dir` - Incident direction (pointing toward the surface).
    /// * `ia`     - The interaction.
    pub fn refract_specular(in_dir: &Vector3f, ia: &Interaction) -> (Self, bool) {
        let eta = ia.n1 / ia.n2;
        let cos_theta = ia.specular_normal.dot(in_dir);
        // 1 - (n1/n2 * sin(theta))^2
        let k = 1.0 - eta * eta * (1.0 - cos_theta * cos_theta);

        if k >= 0.0 {
            let direction =
                *in_dir * eta - ia.specular_normal * (eta * cos_theta + k.sqrt());
            let ray = Self {
                origin: ia.position - ia.normal * EPSILON,
                direction,
                medium_ior: ia.n2,
                specular: true,
            };
            (ray, ia.shading_normal.dot(&direction) < 0.0)
        } else {
            let direction = *in_dir - ia.specular_normal * (2.0 * cos_theta);
            let ray = Self {
                origin: ia.position + ia.normal * EPSILON,
                direction,
                medium_ior: ia.n1,
                specular: true,
            };
            (ray, ia.shading_normal.dot(&direction) > 0.0)
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
