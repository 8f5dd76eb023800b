use crate::error::CoreError;

/// Frame selection settings of one modality, fixed for the lifetime of a view.
///
/// # Example
/// ```
/// use mc_core::policy::SamplingPolicy;
/// let policy = SamplingPolicy::new(16, 5, true).unwrap();
/// assert_eq!(policy.desired_len(), 80);
/// assert!(SamplingPolicy::new(0, 5, true).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingPolicy {
    num_frames_per_clip: usize,
    num_clips: usize,
    dense: bool,
}

impl SamplingPolicy {
    /// Build a policy.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if either count is zero.
    pub fn new(num_frames_per_clip: usize, num_clips: usize, dense: bool) -> Result<Self, CoreError> {
        if num_frames_per_clip == 0 || num_clips == 0 {
            return Err(CoreError::Config(format!(
                "politique d'échantillonnage vide ({num_frames_per_clip} frames × {num_clips} clips)"
            )));
        }
        Ok(Self {
            num_frames_per_clip,
            num_clips,
            dense,
        })
    }

    /// Frames taken from each clip.
    #[must_use]
    pub fn num_frames_per_clip(&self) -> usize {
        self.num_frames_per_clip
    }

    /// Clips drawn per segment.
    #[must_use]
    pub fn num_clips(&self) -> usize {
        self.num_clips
    }

    /// Contiguous windows if `true`, strided windows otherwise.
    #[must_use]
    pub fn dense(&self) -> bool {
        self.dense
    }

    /// Exact number of indices a sampler must return.
    #[must_use]
    pub fn desired_len(&self) -> usize {
        self.num_frames_per_clip * self.num_clips
    }
}
