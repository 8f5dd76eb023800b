//! Frame sources for myoclip: index sampling, image folders, resize and normalization.

pub mod error;
pub mod image;
pub mod resize;
pub mod sampler;
pub mod transform;

pub use error::SamplingError;
pub use sampler::{FrameSampler, sample_indices};
