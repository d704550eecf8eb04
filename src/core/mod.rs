//! Core renderer building blocks.

pub mod camera;
pub mod common;
pub mod film;
pub mod fresnel;
pub mod geometry;
pub mod interaction;
pub mod material;
pub mod parallel;
pub mod rng;
pub mod sampling;
pub mod scene;
pub mod surface;
