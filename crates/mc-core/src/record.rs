use std::collections::BTreeMap;

use ndarray::Array2;

use crate::error::CoreError;
use crate::modality::Modality;
use crate::table::{AnnotationRow, EmgRow};

/// Channels per armband.
pub const ARMBAND_CHANNELS: usize = 8;

/// Raw readings of the two armbands, `[T × 8]` each.
///
/// Left and right may have different sample counts.
#[derive(Clone, Debug, PartialEq)]
pub struct EmgReadings {
    /// Left armband.
    pub left: Array2<f32>,
    /// Right armband.
    pub right: Array2<f32>,
}

/// One annotated action segment. Immutable once built.
///
/// Built from a persisted row by [`Record::from_annotation`] or
/// [`Record::from_emg_row`]; both validate the row, so a `Record` in hand
/// always has `num_frames ≥ 1` for each declared modality and well-shaped
/// EMG arrays.
///
/// # Example
/// ```
/// use mc_core::record::Record;
/// use mc_core::modality::Modality;
/// let record = Record::builder(7, "P01_01")
///     .label(3)
///     .start_frame(120)
///     .num_frames(Modality::Rgb, 80)
///     .build()
///     .unwrap();
/// assert_eq!(record.num_frames(Modality::Rgb), Some(80));
/// assert_eq!(record.start_frame(), 120);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    uid: u64,
    video_name: String,
    label: Option<u32>,
    start_frame: usize,
    num_frames: BTreeMap<Modality, usize>,
    emg: Option<EmgReadings>,
}

impl Record {
    /// Start building a record by hand (tests, synthetic data).
    #[must_use]
    pub fn builder(uid: u64, video_name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            record: Self {
                uid,
                video_name: video_name.into(),
                label: None,
                start_frame: 0,
                num_frames: BTreeMap::new(),
                emg: None,
            },
        }
    }

    /// Build a video record from an annotation row.
    ///
    /// Every modality in `modalities` must get a frame count, either from the
    /// row's `num_frames` column or from `stop_frame - start_frame`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidRecord`] if a frame count is missing or zero.
    pub fn from_annotation(row: &AnnotationRow, modalities: &[Modality]) -> Result<Self, CoreError> {
        let mut builder = Self::builder(row.uid, row.untrimmed_video_name.clone())
            .start_frame(row.start_frame);
        if let Some(label) = row.label {
            builder = builder.label(label);
        }
        for &modality in modalities {
            let count = row.frames_for(modality).ok_or_else(|| CoreError::InvalidRecord {
                uid: row.uid,
                reason: format!("aucun nombre de frames pour {modality}"),
            })?;
            builder = builder.num_frames(modality, count);
        }
        builder.build()
    }

    /// Build an EMG record from an EMG table row.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidRecord`] if either armband is empty or a
    /// reading does not have exactly [`ARMBAND_CHANNELS`] channels.
    pub fn from_emg_row(row: &EmgRow, index: usize) -> Result<Self, CoreError> {
        let uid = row.uid.unwrap_or(index as u64);
        let left = readings_to_array(uid, "gauche", &row.myo_left_readings)?;
        let right = readings_to_array(uid, "droit", &row.myo_right_readings)?;
        let mut builder = Self::builder(uid, row.video_name.clone().unwrap_or_default())
            .emg(EmgReadings { left, right });
        if let Some(label) = row.label {
            builder = builder.label(label);
        }
        builder.build()
    }

    /// Unique identifier, join key for feature tables.
    #[must_use]
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Name of the untrimmed source video.
    #[must_use]
    pub fn video_name(&self) -> &str {
        &self.video_name
    }

    /// Class id. `None` at test time.
    #[must_use]
    pub fn label(&self) -> Option<u32> {
        self.label
    }

    /// Offset of the segment inside the untrimmed stream.
    #[must_use]
    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    /// Frame count available for `modality`.
    #[must_use]
    pub fn num_frames(&self, modality: Modality) -> Option<usize> {
        self.num_frames.get(&modality).copied()
    }

    /// Raw armband readings, if this record carries EMG.
    #[must_use]
    pub fn emg(&self) -> Option<&EmgReadings> {
        self.emg.as_ref()
    }
}

/// Builder returned by [`Record::builder`].
#[must_use]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Set the class id.
    pub fn label(mut self, label: u32) -> Self {
        self.record.label = Some(label);
        self
    }

    /// Set the segment offset.
    pub fn start_frame(mut self, start_frame: usize) -> Self {
        self.record.start_frame = start_frame;
        self
    }

    /// Set the frame count of one modality.
    pub fn num_frames(mut self, modality: Modality, count: usize) -> Self {
        self.record.num_frames.insert(modality, count);
        self
    }

    /// Attach armband readings.
    pub fn emg(mut self, readings: EmgReadings) -> Self {
        self.record.emg = Some(readings);
        self
    }

    /// Validate and freeze the record.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidRecord`] if a frame count is zero or the
    /// EMG arrays are empty or not 8 channels wide.
    pub fn build(self) -> Result<Record, CoreError> {
        let record = self.record;
        if let Some((modality, _)) = record.num_frames.iter().find(|(_, n)| **n == 0) {
            return Err(CoreError::InvalidRecord {
                uid: record.uid,
                reason: format!("num_frames[{modality}] doit être ≥ 1"),
            });
        }
        if let Some(emg) = &record.emg {
            for (side, arr) in [("gauche", &emg.left), ("droit", &emg.right)] {
                if arr.nrows() == 0 || arr.ncols() != ARMBAND_CHANNELS {
                    return Err(CoreError::InvalidRecord {
                        uid: record.uid,
                        reason: format!(
                            "bracelet {side} : forme [{} × {}], attendu [T × {ARMBAND_CHANNELS}]",
                            arr.nrows(),
                            arr.ncols()
                        ),
                    });
                }
            }
        }
        Ok(record)
    }
}

/// Row-major `Vec<Vec<f32>>` → `[T × 8]`.
fn readings_to_array(uid: u64, side: &str, rows: &[Vec<f32>]) -> Result<Array2<f32>, CoreError> {
    if rows.is_empty() {
        return Err(CoreError::InvalidRecord {
            uid,
            reason: format!("bracelet {side} vide"),
        });
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != ARMBAND_CHANNELS) {
        return Err(CoreError::InvalidRecord {
            uid,
            reason: format!(
                "bracelet {side}, ligne {bad} : {} canaux au lieu de {ARMBAND_CHANNELS}",
                rows[bad].len()
            ),
        });
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), ARMBAND_CHANNELS), flat).map_err(|e| {
        CoreError::InvalidRecord {
            uid,
            reason: e.to_string(),
        }
    })
}
