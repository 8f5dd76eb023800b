use thiserror::Error;

use crate::modality::Modality;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// Unsupported file or data format.
    #[error("Format non supporté : {format}")]
    UnsupportedFormat {
        /// The format string that is unsupported.
        format: String,
    },

    /// Modality has no implementation for the requested operation.
    #[error("Modalité non implémentée : {modality}")]
    UnsupportedModality {
        /// The offending modality.
        modality: Modality,
    },

    /// A persisted row could not be turned into a valid record.
    #[error("Record {uid} invalide : {reason}")]
    InvalidRecord {
        /// Record uid.
        uid: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// A uid-joined table row has no uid.
    #[error("Ligne {row} sans uid")]
    MissingUid {
        /// Row index in the table.
        row: usize,
    },

    /// Joining two tables on uid failed.
    #[error("Jointure impossible pour uid {uid} ({modality}) : {reason}")]
    Join {
        /// Annotation uid that could not be joined.
        uid: u64,
        /// Modality whose table was being joined.
        modality: Modality,
        /// Missing or duplicated row.
        reason: String,
    },
}
