//! Frame index selection for one record and one modality.
//!
//! Indices are relative to the segment start; the loader adds
//! `record.start_frame()`. Clip centers are drawn from
//! `[radius, num_frames - radius + 2)`, so the last index can reach
//! `num_frames + 1`. The loader's last-frame fallback absorbs that tail.

use std::collections::BTreeMap;

use mc_core::config::Mode;
use mc_core::modality::Modality;
use mc_core::policy::SamplingPolicy;
use mc_core::record::Record;

use crate::error::SamplingError;

/// Reference windows of uniform sampling, largest first.
pub const UNIFORM_WINDOWS: [usize; 3] = [75, 50, 25];

/// Shortest segment either strategy accepts.
pub const MIN_SEGMENT_FRAMES: usize = 25;

/// Tail slack added to the exclusive upper bound of the center draw.
pub const CENTER_SLACK: usize = 2;

/// Select `policy.desired_len()` frame indices from `record` for `modality`.
///
/// `mode` is accepted for every split but both strategies stay randomized
/// in train, val and test alike.
///
/// # Errors
/// - [`SamplingError::MissingModality`] if the record has no count for `modality`.
/// - [`SamplingError::TooFewFrames`] if the segment has fewer than 25 frames.
/// - [`SamplingError::EmptyCenterRange`] if a dense clip is wider than the segment.
/// - [`SamplingError::ZeroFrameInterval`] if a uniform window is shorter than a clip.
/// - [`SamplingError::CountMismatch`] if the assembled list has the wrong length.
///
/// # Example
/// ```
/// use mc_core::config::Mode;
/// use mc_core::modality::Modality;
/// use mc_core::policy::SamplingPolicy;
/// use mc_core::record::Record;
/// use mc_source::sampler::sample_indices;
///
/// let record = Record::builder(1, "P01_01").num_frames(Modality::Rgb, 80).build().unwrap();
/// let policy = SamplingPolicy::new(5, 2, true).unwrap();
/// let mut rng = fastrand::Rng::with_seed(13_696_641);
/// let idx = sample_indices(&record, Modality::Rgb, &policy, Mode::Train, &mut rng).unwrap();
/// assert_eq!(idx.len(), 10);
/// ```
pub fn sample_indices(
    record: &Record,
    modality: Modality,
    policy: &SamplingPolicy,
    mode: Mode,
    rng: &mut fastrand::Rng,
) -> Result<Vec<usize>, SamplingError> {
    let num_frames = record
        .num_frames(modality)
        .ok_or(SamplingError::MissingModality {
            uid: record.uid(),
            modality,
        })?;
    if num_frames < MIN_SEGMENT_FRAMES {
        return Err(SamplingError::TooFewFrames {
            uid: record.uid(),
            video_name: record.video_name().to_string(),
            num_frames,
            min: MIN_SEGMENT_FRAMES,
        });
    }

    let nfpc = policy.num_frames_per_clip();
    let (radius, interval) = if policy.dense() {
        (nfpc / 2, 1)
    } else {
        let window = uniform_window(num_frames);
        let interval = window / nfpc;
        if interval == 0 {
            return Err(SamplingError::ZeroFrameInterval {
                window,
                num_frames_per_clip: nfpc,
            });
        }
        (window / 2, interval)
    };

    let hi = num_frames + CENTER_SLACK - radius.min(num_frames + CENTER_SLACK);
    if hi <= radius {
        return Err(SamplingError::EmptyCenterRange {
            uid: record.uid(),
            radius,
            num_frames,
        });
    }

    let mut indices = Vec::with_capacity(policy.desired_len());
    for _ in 0..policy.num_clips() {
        let center = rng.usize(radius..hi);
        indices.extend(
            (center - radius..=center + radius)
                .step_by(interval)
                .take(nfpc),
        );
    }
    log::trace!(
        "uid {} {modality} ({mode}) : {} indices sur {num_frames} frames",
        record.uid(),
        indices.len()
    );

    if indices.len() != policy.desired_len() {
        return Err(SamplingError::CountMismatch {
            uid: record.uid(),
            video_name: record.video_name().to_string(),
            got: indices.len(),
            desired: policy.desired_len(),
        });
    }
    Ok(indices)
}

/// Largest uniform reference window that fits in `num_frames`.
/// Callers check `num_frames ≥ 25` first.
fn uniform_window(num_frames: usize) -> usize {
    UNIFORM_WINDOWS
        .iter()
        .copied()
        .find(|w| *w <= num_frames)
        .unwrap_or(MIN_SEGMENT_FRAMES)
}

/// Per-modality policies of one dataset view, fixed at construction.
///
/// # Example
/// ```
/// use mc_core::config::Mode;
/// use mc_core::modality::Modality;
/// use mc_core::policy::SamplingPolicy;
/// use mc_source::sampler::FrameSampler;
///
/// let sampler = FrameSampler::new(Mode::Val)
///     .with_policy(Modality::Rgb, SamplingPolicy::new(16, 5, false).unwrap());
/// assert_eq!(sampler.desired_len(Modality::Rgb), Some(80));
/// ```
#[derive(Clone, Debug)]
pub struct FrameSampler {
    mode: Mode,
    policies: BTreeMap<Modality, SamplingPolicy>,
}

impl FrameSampler {
    /// Sampler with no policy yet.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            policies: BTreeMap::new(),
        }
    }

    /// Register the policy of `modality`.
    #[must_use]
    pub fn with_policy(mut self, modality: Modality, policy: SamplingPolicy) -> Self {
        self.policies.insert(modality, policy);
        self
    }

    /// Output length for `modality`, if it has a policy.
    #[must_use]
    pub fn desired_len(&self, modality: Modality) -> Option<usize> {
        self.policies.get(&modality).map(SamplingPolicy::desired_len)
    }

    /// Sample `record` under the policy registered for `modality`.
    ///
    /// # Errors
    /// [`SamplingError::MissingModality`] if no policy is registered, or any
    /// error of [`sample_indices`].
    pub fn sample(
        &self,
        record: &Record,
        modality: Modality,
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<usize>, SamplingError> {
        let policy = self
            .policies
            .get(&modality)
            .ok_or(SamplingError::MissingModality {
                uid: record.uid(),
                modality,
            })?;
        sample_indices(record, modality, policy, self.mode, rng)
    }
}
