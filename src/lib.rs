//! Lumen: a physically based renderer built around a two-pass photon
//! mapping integrator.

#[macro_use]
extern crate hexf;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod accelerators;
pub mod app;
pub mod core;
pub mod integrators;
pub mod parser;
