//! Pinhole camera.

use crate::core::common::*;
use crate::core::geometry::{Point3f, Ray, Vector3f};
use crate::core::rng::Rng;

/// A pinhole camera. Generates jittered primary rays through the image
/// plane.
#[derive(Debug)]
pub struct Camera {
    eye: Point3f,
    forward: Vector3f,
    right: Vector3f,
    up: Vector3f,
    plane_half_height: Float,
    plane_half_width: Float,

    /// Image width in pixels.
    pub width: usize,

    /// Image height in pixels.
    pub height: usize,

    /// Samples per pixel.
    pub samples_per_pixel: usize,
}

impl Camera {
    /// Create a new camera.
    ///
    /// * `eye`               - Camera position.
    /// * `look_at`           - Point the camera looks at.
    /// * `up`                - Approximate up direction.
    /// * `vertical_fov`      - Vertical field of view in degrees.
    /// * `width`             - Image width in pixels.
    /// * `height`            - Image height in pixels.
    /// * `samples_per_pixel` - Samples per pixel.
    pub fn new(
        eye: Point3f,
        look_at: Point3f,
        up: Vector3f,
        vertical_fov: Float,
        width: usize,
        height: usize,
        samples_per_pixel: usize,
    ) -> Self {
        let forward = (look_at - eye).normalize();
        let right = forward.cross(&up).normalize();
        let up = right.cross(&forward);

        let plane_half_height = (vertical_fov.to_radians() * 0.5).tan();
        let plane_half_width = plane_half_height * width as Float / height as Float;

        Self {
            eye,
            forward,
            right,
            up,
            plane_half_height,
            plane_half_width,
            width,
            height,
            samples_per_pixel,
        }
    }

    /// Generate a jittered primary ray through a pixel.
    ///
    /// * `x`          - Pixel column.
    /// * `y`          - Pixel row, top to bottom.
    /// * `medium_ior` - Index of refraction of the scene medium.
    /// * `rng`        - Random number generator for the pixel jitter.
    pub fn primary_ray(&self, x: usize, y: usize, medium_ior: Float, rng: &mut Rng) -> Ray {
        let sx = (x as Float + rng.uniform_float()) / self.width as Float;
        let sy = (y as Float + rng.uniform_float()) / self.height as Float;

        let px = (2.0 * sx - 1.0) * self.plane_half_width;
        let py = (1.0 - 2.0 * sy) * self.plane_half_height;

        let direction = (self.forward + self.right * px + self.up * py).normalize();
        Ray::new(self.eye, direction, medium_ior)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_ray_points_forward() {
        let camera = Camera::new(
            Point3f::ZERO,
            Point3f::new(0.0, 0.0, -1.0),
            Vector3f::new(0.0, 1.0, 0.0),
            90.0,
            100,
            100,
            1,
        );
        let mut rng = Rng::new(1);
        let ray = camera.primary_ray(50, 50, 1.0, &mut rng);
        assert!(ray.direction.z < -0.9);
        assert!((ray.direction.length() - 1.0).abs() < 1e-12);
    }
}
