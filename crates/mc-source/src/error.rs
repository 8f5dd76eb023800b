use mc_core::modality::Modality;
use thiserror::Error;

/// Frame index selection failures. All are fatal for the sample being built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    /// Segment too short for any clip window.
    #[error("Record {video_name} {uid} : {num_frames} frames, minimum {min}")]
    TooFewFrames {
        /// Record uid.
        uid: u64,
        /// Untrimmed video name.
        video_name: String,
        /// Frames available for the modality.
        num_frames: usize,
        /// Required minimum.
        min: usize,
    },

    /// No valid clip center exists for this radius.
    #[error("Record {uid} : aucun centre possible (rayon {radius}, {num_frames} frames)")]
    EmptyCenterRange {
        /// Record uid.
        uid: u64,
        /// Clip radius.
        radius: usize,
        /// Frames available for the modality.
        num_frames: usize,
    },

    /// Reference window smaller than the clip length, stride would be 0.
    #[error("Fenêtre de {window} frames trop courte pour {num_frames_per_clip} frames par clip")]
    ZeroFrameInterval {
        /// Reference window size.
        window: usize,
        /// Frames per clip.
        num_frames_per_clip: usize,
    },

    /// Assembled index list does not have the desired length.
    #[error("Record {video_name} {uid} : {got} frames extraites, {desired} attendues")]
    CountMismatch {
        /// Record uid.
        uid: u64,
        /// Untrimmed video name.
        video_name: String,
        /// Indices produced.
        got: usize,
        /// Indices required.
        desired: usize,
    },

    /// Record or sampler has no entry for the modality.
    #[error("Record {uid} : modalité {modality} absente")]
    MissingModality {
        /// Record uid.
        uid: u64,
        /// Requested modality.
        modality: Modality,
    },
}
