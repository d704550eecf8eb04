//! 3-D Coordinate System

use super::Vector3f;
use crate::core::common::Float;

/// An orthonormal basis `(tangent, bitangent, normal)` built from a unit
/// normal. Uses the branchless Duff et al. (2017) construction; microfacet
/// sampling depends on the basis being stable under small normal
/// perturbations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CoordinateSystem {
    /// The first tangent vector.
    pub tangent: Vector3f,

    /// The second tangent vector.
    pub bitangent: Vector3f,

    /// The normal; the local z-axis.
    pub normal: Vector3f,
}

impl CoordinateSystem {
    /// Create a new coordinate system from a unit normal.
    ///
    /// * `normal` - The unit normal.
    pub fn new(normal: Vector3f) -> Self {
        let sign = Float::copysign(1.0, normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;
        Self {
            tangent: Vector3f::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x),
            bitangent: Vector3f::new(b, sign + normal.y * normal.y * a, -normal.y),
            normal,
        }
    }

    /// Transform a world-space vector into the local frame.
    ///
    /// * `v` - The world-space vector.
    pub fn to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(v.dot(&self.tangent), v.dot(&self.bitangent), v.dot(&self.normal))
    }

    /// Transform a local-frame vector into world space.
    ///
    /// * `v` - The local-frame vector.
    pub fn to_world(&self, v: &Vector3f) -> Vector3f {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
