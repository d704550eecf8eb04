//! Hemisphere sampling functions.

use crate::core::common::*;
use crate::core::geometry::Vector3f;
use crate::core::rng::Rng;

/// Sample a direction on the upper hemisphere with a cosine-weighted
/// distribution, in the local frame where the normal is the z-axis.
///
/// * `rng` - Random number generator.
pub fn cosine_sample_hemisphere(rng: &mut Rng) -> Vector3f {
    let u1 = rng.uniform_float();
    let u2 = rng.uniform_float();
    let r = u1.sqrt();
    let phi = TWO_PI * u2;
    Vector3f::new(r * phi.cos(), r * phi.sin(), (1.0 - u1).sqrt())
}

/// Uniformly sample a direction on the upper hemisphere, in the local frame
/// where the normal is the z-axis.
///
/// * `rng` - Random number generator.
pub fn uniform_sample_hemisphere(rng: &mut Rng) -> Vector3f {
    let z = rng.uniform_float();
    let r = max(0.0, 1.0 - z * z).sqrt();
    let phi = TWO_PI * rng.uniform_float();
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
