//! Persisted tables: annotations, EMG recordings, precomputed features.
//!
//! Tables are arrays of rows stored as JSON or bincode next to each other in
//! an annotations directory. A table is addressed by name without extension
//! (`D1_train`) and resolved with [`resolve_table`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array1;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::modality::Modality;

/// Extensions de tables reconnues, par ordre de priorité.
pub const TABLE_EXTS: &[&str] = &["json", "bin"];

/// One annotated segment of an untrimmed video.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AnnotationRow {
    /// Segment uid.
    pub uid: u64,
    /// Class id; absent in unlabelled test splits.
    #[serde(default, alias = "verb_class")]
    pub label: Option<u32>,
    /// Untrimmed video the segment belongs to.
    #[serde(alias = "video_id")]
    pub untrimmed_video_name: String,
    /// First frame of the segment in the untrimmed video.
    pub start_frame: usize,
    /// One past the last frame of the segment.
    #[serde(default)]
    pub stop_frame: Option<usize>,
    /// Frame count shared by every modality.
    #[serde(default)]
    pub num_frames: Option<usize>,
    /// Per-modality frame counts, keyed by modality name. Wins over `num_frames`.
    #[serde(default)]
    pub frames_per_modality: BTreeMap<String, usize>,
}

impl AnnotationRow {
    /// Frame count for `modality`: per-modality column, then shared count,
    /// then `stop_frame - start_frame`.
    #[must_use]
    pub fn frames_for(&self, modality: Modality) -> Option<usize> {
        self.frames_per_modality
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(modality.name()))
            .map(|(_, v)| *v)
            .or(self.num_frames)
            .or_else(|| {
                self.stop_frame
                    .and_then(|stop| stop.checked_sub(self.start_frame))
            })
    }

    /// Segment length used by the statistics report.
    #[must_use]
    pub fn segment_len(&self) -> usize {
        self.stop_frame
            .and_then(|stop| stop.checked_sub(self.start_frame))
            .or(self.num_frames)
            .unwrap_or(0)
    }
}

/// One EMG recording: both armbands, row-major `[T][8]`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmgRow {
    /// Recording uid. Tables without one use the row index.
    #[serde(default)]
    pub uid: Option<u64>,
    /// Class id.
    #[serde(default)]
    pub label: Option<u32>,
    /// Source video, if known.
    #[serde(default)]
    pub video_name: Option<String>,
    /// Left armband readings.
    pub myo_left_readings: Vec<Vec<f32>>,
    /// Right armband readings.
    pub myo_right_readings: Vec<Vec<f32>>,
}

/// Resolve a table name inside `dir`, trying each of [`TABLE_EXTS`].
///
/// # Errors
/// Returns [`CoreError::FileNotFound`] if no candidate exists.
///
/// # Example
/// ```no_run
/// use mc_core::table::resolve_table;
/// use std::path::Path;
/// let path = resolve_table(Path::new("annotations"), "D1_train").unwrap();
/// ```
pub fn resolve_table(dir: &Path, name: &str) -> Result<PathBuf, CoreError> {
    TABLE_EXTS
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|p| p.is_file())
        .ok_or_else(|| CoreError::FileNotFound {
            path: dir.join(format!("{name}.{{{}}}", TABLE_EXTS.join(","))).display().to_string(),
        })
}

/// Charge un tableau de lignes JSON ou bincode selon l'extension.
///
/// # Errors
/// Returns an error if the file is missing, has an unknown extension, or
/// cannot be decoded into `T`.
pub fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("Impossible de lire {}", path.display()))?,
    );
    let rows = match ext.as_str() {
        "json" => serde_json::from_reader(reader)
            .with_context(|| format!("Erreur de parsing JSON dans {}", path.display()))?,
        "bin" => bincode::deserialize_from(reader)
            .with_context(|| format!("Erreur de décodage bincode dans {}", path.display()))?,
        other => {
            return Err(CoreError::UnsupportedFormat {
                format: other.to_string(),
            }
            .into());
        }
    };
    log::debug!("Table {} chargée", path.display());
    Ok(rows)
}

/// Feature table row: a uid plus one `features_<MODALITY>` column per modality.
///
/// Column names are dynamic, so feature tables are JSON only.
///
/// `uid` is optional in the file: row-indexed tables have none, uid-joined
/// tables must carry one per row.
#[derive(Clone, Debug, Deserialize)]
struct FeatureRow {
    #[serde(default)]
    uid: Option<u64>,
    #[serde(flatten)]
    columns: BTreeMap<String, serde_json::Value>,
}

impl FeatureRow {
    /// `key` names the row in errors: its uid, or its index.
    fn vector(&self, modality: Modality, key: u64) -> Result<Array1<f32>> {
        let column = modality.feature_column();
        let value = self.columns.get(&column).ok_or_else(|| CoreError::Join {
            uid: key,
            modality,
            reason: format!("colonne {column} absente"),
        })?;
        let v: Vec<f32> = serde_json::from_value(value.clone())
            .with_context(|| format!("{column} de la ligne {key} n'est pas un vecteur"))?;
        Ok(Array1::from(v))
    }
}

fn load_feature_rows(path: &Path) -> Result<Vec<FeatureRow>> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case("json") {
        return Err(CoreError::UnsupportedFormat {
            format: format!("{ext} (tables de features : JSON uniquement)"),
        }
        .into());
    }
    load_table(path)
}

/// Column `features_<modality>` of a feature table, in row order.
///
/// Used where features are joined by row index rather than uid.
///
/// # Errors
/// Returns an error if the table cannot be read or a row lacks the column.
pub fn load_feature_column(path: &Path, modality: Modality) -> Result<Vec<Array1<f32>>> {
    load_feature_rows(path)?
        .iter()
        .enumerate()
        .map(|(i, row)| row.vector(modality, i as u64))
        .collect()
}

/// One modality's features keyed by uid.
#[derive(Clone, Debug)]
pub struct ModalityFeatures {
    modality: Modality,
    by_uid: HashMap<u64, Array1<f32>>,
    duplicated: HashSet<u64>,
}

impl ModalityFeatures {
    /// Load `features_<modality>` from a JSON feature table.
    ///
    /// # Errors
    /// Returns an error if the table cannot be read, or a row lacks its uid
    /// ([`CoreError::MissingUid`]) or the column.
    pub fn load(path: &Path, modality: Modality) -> Result<Self> {
        let rows = load_feature_rows(path)?;
        let pairs = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let uid = row.uid.ok_or(CoreError::MissingUid { row: i })?;
                Ok((uid, row.vector(modality, uid)?))
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Table de features {}", path.display()))?;
        Ok(Self::from_pairs(modality, pairs))
    }

    /// Build from `(uid, vector)` pairs. Repeated uids are remembered so the
    /// join can reject them.
    #[must_use]
    pub fn from_pairs(modality: Modality, pairs: impl IntoIterator<Item = (u64, Array1<f32>)>) -> Self {
        let mut out = Self {
            modality,
            by_uid: HashMap::new(),
            duplicated: HashSet::new(),
        };
        for (uid, v) in pairs {
            if out.by_uid.insert(uid, v).is_some() {
                out.duplicated.insert(uid);
            }
        }
        out
    }

    /// Modality of the column.
    #[must_use]
    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Number of distinct uids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    /// `true` if the table had no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

/// Annotation uids joined with every modality's feature vector.
///
/// Join policy: fail fast. Every annotated uid must appear exactly once in
/// every modality table; extra feature rows are ignored.
///
/// # Example
/// ```
/// use mc_core::modality::Modality;
/// use mc_core::table::{FeatureTable, ModalityFeatures};
/// use ndarray::arr1;
///
/// let rgb = ModalityFeatures::from_pairs(Modality::Rgb, [(1, arr1(&[0.5, 0.25]))]);
/// let table = FeatureTable::join(&[1], vec![rgb]).unwrap();
/// assert_eq!(table.get(1, Modality::Rgb).unwrap().len(), 2);
/// assert!(FeatureTable::join(&[1, 2], vec![ModalityFeatures::from_pairs(Modality::Rgb, [(1, arr1(&[0.0]))])]).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct FeatureTable {
    modalities: Vec<Modality>,
    rows: HashMap<u64, Vec<Array1<f32>>>,
}

impl FeatureTable {
    /// Join `uids` against each modality table, in the given modality order.
    ///
    /// # Errors
    /// Returns [`CoreError::Join`] if a uid is missing from, or repeated in,
    /// any modality table.
    pub fn join(uids: &[u64], tables: Vec<ModalityFeatures>) -> Result<Self, CoreError> {
        let modalities: Vec<Modality> = tables.iter().map(ModalityFeatures::modality).collect();
        let mut rows = HashMap::with_capacity(uids.len());
        for &uid in uids {
            let mut vectors = Vec::with_capacity(tables.len());
            for (table, &modality) in tables.iter().zip(&modalities) {
                if table.duplicated.contains(&uid) {
                    return Err(CoreError::Join {
                        uid,
                        modality,
                        reason: "ligne dupliquée".into(),
                    });
                }
                let v = table.by_uid.get(&uid).ok_or_else(|| CoreError::Join {
                    uid,
                    modality,
                    reason: "ligne absente".into(),
                })?;
                vectors.push(v.clone());
            }
            rows.insert(uid, vectors);
        }
        Ok(Self { modalities, rows })
    }

    /// Feature vector of `uid` for `modality`.
    #[must_use]
    pub fn get(&self, uid: u64, modality: Modality) -> Option<&Array1<f32>> {
        let slot = self.modalities.iter().position(|m| *m == modality)?;
        self.rows.get(&uid).and_then(|v| v.get(slot))
    }

    /// Modalities in join order.
    #[must_use]
    pub fn modalities(&self) -> &[Modality] {
        &self.modalities
    }

    /// Number of joined uids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` if nothing was joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
