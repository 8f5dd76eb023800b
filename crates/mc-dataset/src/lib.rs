//! Dataset views for myoclip: video-only, EMG-only and EMG + RGB features.
//!
//! Every view loads its tables eagerly, is read-only afterwards, and
//! implements [`mc_core::Dataset`].

pub mod assembler;
pub mod emg;
pub mod fused;
pub mod video;

pub use assembler::{EmgAssembler, assemble_video, fuse_emg_rgb};
pub use emg::EmgDataset;
pub use fused::EmgRgbDataset;
pub use video::VideoDataset;
