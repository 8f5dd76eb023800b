use anyhow::Result;
use ndarray::ArrayD;

use crate::frame::Frame;
use crate::modality::Modality;
use crate::record::Record;
use crate::sample::Sample;

/// Charge les frames d'un segment depuis le stockage.
///
/// Implémenté par : `ImageFolderLoader`.
///
/// # Example
/// ```
/// use mc_core::traits::FrameLoader;
/// use mc_core::frame::Frame;
/// use mc_core::modality::Modality;
/// use mc_core::record::Record;
///
/// struct BlackFrames;
/// impl FrameLoader for BlackFrames {
///     fn load(&self, _m: Modality, _r: &Record, _idx: usize) -> anyhow::Result<Vec<Frame>> {
///         Ok(vec![Frame::new(4, 4)])
///     }
/// }
/// ```
pub trait FrameLoader: Send + Sync {
    /// Load the frame(s) at segment-relative `index` of `record`.
    ///
    /// The loader adds `record.start_frame()` before resolving a file.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be read or the modality has no loader.
    fn load(&self, modality: Modality, record: &Record, index: usize) -> Result<Vec<Frame>>;
}

/// Turns the raw frames of one modality into a tensor.
///
/// Implémenté par : `ResizeNormalize`.
///
/// # Example
/// ```
/// use mc_core::traits::FrameTransform;
/// use mc_core::frame::Frame;
/// use mc_core::modality::Modality;
/// use ndarray::{ArrayD, IxDyn};
///
/// struct CountFrames;
/// impl FrameTransform for CountFrames {
///     fn apply(&self, _m: Modality, frames: &[Frame]) -> anyhow::Result<ArrayD<f32>> {
///         Ok(ArrayD::zeros(IxDyn(&[frames.len()])))
///     }
/// }
/// ```
pub trait FrameTransform: Send + Sync {
    /// Stack and convert `frames`.
    ///
    /// # Errors
    /// Returns an error if the frames cannot be converted.
    fn apply(&self, modality: Modality, frames: &[Frame]) -> Result<ArrayD<f32>>;
}

/// Random-access collection of samples with a stable length.
///
/// Views are read-only after construction and can be shared between
/// workers; randomness is supplied per call.
pub trait Dataset: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    /// `true` if the view holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build sample `index`, drawing any random choices from `rng`.
    ///
    /// # Errors
    /// Returns an error if the index is out of range or any stage of
    /// sampling, loading or preprocessing fails. No partial sample is returned.
    fn get(&self, index: usize, rng: &mut fastrand::Rng) -> Result<Sample>;
}
