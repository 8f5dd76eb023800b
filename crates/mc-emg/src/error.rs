use thiserror::Error;

/// Errors originating from the EMG module.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmgError {
    /// Filter parameters outside their valid range.
    #[error("Filtre invalide : {0}")]
    InvalidFilter(String),

    /// Signal not longer than the filtfilt edge padding.
    #[error("Signal trop court : {len} échantillons, il en faut plus de {padlen}")]
    SignalTooShort {
        /// Samples in the signal.
        len: usize,
        /// Edge padding of the zero-phase filter.
        padlen: usize,
    },

    /// Readings with no sample or no channel.
    #[error("Lectures EMG vides")]
    EmptyReadings,

    /// All channels equal at one timestep, min-max range is zero.
    #[error("Plage min-max nulle au pas de temps {row}")]
    DegenerateRange {
        /// Timestep index.
        row: usize,
    },

    /// NaN or infinity in the input or the output.
    #[error("Valeur non finie au pas de temps {row}")]
    NonFinite {
        /// Timestep index.
        row: usize,
    },

    /// Left and right armbands cannot be stacked.
    #[error("Formes incompatibles : gauche {left:?}, droite {right:?}")]
    ShapeMismatch {
        /// Left armband shape.
        left: Vec<usize>,
        /// Right armband shape.
        right: Vec<usize>,
    },
}
