//! Core of a virtual try-on inference service: the image codec, request
//! validation, the accelerator residency state machine, and the orchestrator
//! that drives a [`TryOnPipeline`] exactly once per admitted request.
//!
//! Transport concerns live in the server crate; everything here is
//! protocol-agnostic.

pub mod codec;
mod device_map;
mod error;
mod params;
mod pipeline;
mod residency;
mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use device_map::*;
pub use error::*;
pub use params::*;
pub use pipeline::*;
pub use residency::*;
pub use service::*;
