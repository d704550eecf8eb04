//! Fresnel reflectance for dielectrics and conductors.

use crate::core::common::*;
use crate::core::geometry::Vector3f;

/// Returns the Fresnel reflectance at a dielectric boundary for unpolarized
/// light.
///
/// * `n1`          - Index of refraction on the incident side.
/// * `n2`          - Index of refraction on the transmitted side.
/// * `cos_theta_i` - Cosine of the angle between the incident direction and
///                   the surface normal on the incident side.
pub fn dielectric(n1: Float, n2: Float, cos_theta_i: Float) -> Float {
    let cos_theta_i = clamp(cos_theta_i, -1.0, 1.0);
    let (eta_i, eta_t, cos_theta_i) = if cos_theta_i < 0.0 {
        (n2, n1, -cos_theta_i)
    } else {
        (n1, n2, cos_theta_i)
    };

    let sin_theta_i = max(0.0, 1.0 - cos_theta_i * cos_theta_i).sqrt();
    let sin_theta_t = eta_i / eta_t * sin_theta_i;

    // Total internal reflection.
    if sin_theta_t >= 1.0 {
        return 1.0;
    }

    let cos_theta_t = max(0.0, 1.0 - sin_theta_t * sin_theta_t).sqrt();
    let r_parl = ((eta_t * cos_theta_i) - (eta_i * cos_theta_t))
        / ((eta_t * cos_theta_i) + (eta_i * cos_theta_t));
    let r_perp = ((eta_i * cos_theta_i) - (eta_t * cos_theta_t))
        / ((eta_i * cos_theta_i) + (eta_t * cos_theta_t));
    (r_parl * r_parl + r_perp * r_perp) / 2.0
}

/// Returns the Fresnel reflectance at the boundary between a dielectric and
/// a conductor for unpolarized light, per RGB channel.
///
/// * `n1`          - Index of refraction of the dielectric the ray travels in.
/// * `eta`         - Conductor index of refraction.
/// * `k`           - Conductor absorption coefficient.
/// * `cos_theta_i` - Cosine of the angle between the incident direction and
///                   the surface normal, measured on the incident side.
pub fn conductor(n1: Float, eta: &Vector3f, k: &Vector3f, cos_theta_i: Float) -> Vector3f {
    let cos_theta_i = clamp(abs(cos_theta_i), 0.0, 1.0);
    let eta = *eta / n1;
    let eta_k = *k / n1;

    let cos2 = cos_theta_i * cos_theta_i;
    let sin2 = 1.0 - cos2;
    let eta2 = eta * eta;
    let eta_k2 = eta_k * eta_k;

    let t0 = eta2 - eta_k2 - Vector3f::splat(sin2);
    let a2_plus_b2 = sqrt(t0 * t0 + eta2 * eta_k2 * 4.0);
    let t1 = a2_plus_b2 + Vector3f::splat(cos2);
    let a = sqrt((a2_plus_b2 + t0) * 0.5);
    let t2 = a * (2.0 * cos_theta_i);
    let rs = div(t1 - t2, t1 + t2);

    let t3 = a2_plus_b2 * cos2 + Vector3f::splat(sin2 * sin2);
    let t4 = t2 * sin2;
    let rp = rs * div(t3 - t4, t3 + t4);

    (rp + rs) * 0.5
}

fn sqrt(v: Vector3f) -> Vector3f {
    Vector3f::new(v.x.sqrt(), v.y.sqrt(), v.z.sqrt())
}

fn div(a: Vector3f, b: Vector3f) -> Vector3f {
    Vector3f::new(a.x / b.x, a.y / b.y, a.z / b.z)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normal_incidence_matches_schlick_base() {
        // ((n2 - n1) / (n2 + n1))^2 = 0.04 for glass in air.
        let r = dielectric(1.0, 1.5, 1.0);
        assert!((r - 0.04).abs() < 1e-3);
    }

    #[test]
    fn grazing_incidence_is_total() {
        assert!(dielectric(1.0, 1.5, 0.0) > 0.99);
    }

    #[test]
    fn total_internal_reflection_from_dense_side() {
        // Beyond the critical angle for glass -> air.
        assert_eq!(dielectric(1.5, 1.0, 0.3), 1.0);
    }

    proptest! {
        #[test]
        fn dielectric_reflectance_is_a_probability(
            n1 in 1.0..2.5f64,
            n2 in 1.0..2.5f64,
            cos_theta in -1.0..1.0f64,
        ) {
            let r = dielectric(n1, n2, cos_theta);
            prop_assert!((0.0..=1.0).contains(&r));
        }

        #[test]
        fn conductor_reflectance_is_a_probability(cos_theta in 0.01..1.0f64) {
            // Gold.
            let eta = Vector3f::new(0.143, 0.375, 1.442);
            let k = Vector3f::new(3.983, 2.386, 1.603);
            let r = conductor(1.0, &eta, &k, cos_theta);
            prop_assert!(r.min_component() >= 0.0);
            prop_assert!(r.max_component() <= 1.0);
        }
    }
}
