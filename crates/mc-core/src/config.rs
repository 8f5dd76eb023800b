use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::modality::Modality;
use crate::policy::SamplingPolicy;
use crate::template::FrameTemplate;

/// Seed used when the config does not set one.
pub const DEFAULT_SEED: u64 = 13_696_641;

/// Split mode. Selects which persisted tables are read.
///
/// # Example
/// ```
/// use mc_core::config::Mode;
/// assert_eq!(Mode::Val.table_suffix(), "test");
/// assert_eq!(Mode::Train.to_string(), "train");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Training split.
    #[default]
    Train,
    /// Validation, reads the test tables.
    Val,
    /// Test split.
    Test,
}

impl Mode {
    /// Suffix of the persisted tables for this mode (`train` or `test`).
    #[must_use]
    pub const fn table_suffix(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val | Self::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        })
    }
}

/// EMG preprocessing pipeline.
///
/// # Example
/// ```
/// use mc_core::config::PreprocessMode;
/// assert_eq!(PreprocessMode::default(), PreprocessMode::Filtered);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum PreprocessMode {
    /// Rectify, zero-phase low-pass, per-timestep min-max to [-1, 1]. `[T × C]` out.
    #[default]
    Filtered,
    /// Rectify, per-timestep min-max, rectify, sum over channels. `[T]` out.
    RectifiedSum,
}

/// Per-modality storage and sampling settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModalityConfig {
    /// Root folder holding one sub-folder per untrimmed video.
    pub data_path: PathBuf,
    /// Frame file name template.
    pub tmpl: FrameTemplate,
    /// Prefix of the precomputed feature table, if any.
    pub features_name: Option<String>,
    /// Frames kept per clip.
    pub num_frames_per_clip: usize,
    /// Dense (contiguous) or uniform (strided) clip windows.
    pub dense_sampling: bool,
}

impl ModalityConfig {
    /// Defaults for `modality`: frames under `data/<name>`, `img_{:010d}.jpg`,
    /// 16 dense frames per clip.
    #[must_use]
    pub fn default_for(modality: Modality) -> Self {
        Self {
            data_path: PathBuf::from("data").join(modality.name()),
            tmpl: FrameTemplate::default_image(),
            features_name: None,
            num_frames_per_clip: 16,
            dense_sampling: true,
        }
    }
}

/// EMG preprocessing and EMG table naming.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmgConfig {
    /// `true`: raw armbands stacked along time, `[1, 2T, 8]`.
    /// `false`: each armband preprocessed, stacked along channels.
    pub conv: bool,
    /// Pipeline used when `conv` is off.
    pub mode: PreprocessMode,
    /// Butterworth order.
    pub order: usize,
    /// Low-pass cutoff (Hz).
    pub cutoff_hz: f64,
    /// Armband sample rate (Hz).
    pub sample_rate_hz: f64,
    /// Guard added to the min-max range of the filtered pipeline.
    pub epsilon: f32,
    /// Prefix of the EMG-only tables.
    pub emg_table: String,
    /// Prefix of the EMG tables of the fused view.
    pub fused_emg_table: String,
    /// Prefix of the RGB feature tables of the fused view.
    pub rgb_feature_table: String,
}

impl Default for EmgConfig {
    fn default() -> Self {
        Self {
            conv: true,
            mode: PreprocessMode::Filtered,
            order: 4,
            cutoff_hz: 5.0,
            sample_rate_hz: 160.0,
            epsilon: 1e-4,
            emg_table: "big_file".into(),
            fused_emg_table: "D4_emg".into(),
            rgb_feature_table: "feature_extracted_D4".into(),
        }
    }
}

/// Default frame → tensor transform settings.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TransformConfig {
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Per-channel mean, on [0, 1] pixel values.
    pub mean: [f32; 3],
    /// Per-channel standard deviation.
    pub std: [f32; 3],
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

/// Complete dataset configuration.
///
/// Serialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use mc_core::config::{DatasetConfig, Mode};
/// let config = DatasetConfig::default();
/// assert_eq!(config.mode, Mode::Train);
/// assert_eq!(config.annotation_table_name(), "D1_train");
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatasetConfig {
    // === Tables ===
    /// Directory holding annotation and EMG tables.
    pub annotations_path: PathBuf,
    /// Directory holding precomputed feature tables.
    pub features_path: PathBuf,
    /// Domain split, e.g. `D1`.
    pub split: String,
    /// Train / val / test.
    pub mode: Mode,
    /// Replaces `test` in the annotation table name outside of training.
    pub save_name: Option<String>,

    // === Échantillonnage ===
    /// Clips per segment, shared by every modality.
    pub num_clips: usize,
    /// Frame stride of the extracted frames. Carried for reference; sampling ignores it.
    pub stride: usize,
    /// Seed for the sample pass.
    pub seed: u64,

    // === Modalités ===
    /// Modalities of the video view, in output order.
    pub modalities: Vec<Modality>,
    /// Settings per modality.
    pub modality: BTreeMap<Modality, ModalityConfig>,

    // === Sortie ===
    /// Attach uid and video name to samples.
    pub additional_info: bool,
    /// Read precomputed features instead of frames in the video view.
    pub load_features: bool,

    /// EMG settings.
    pub emg: EmgConfig,
    /// Frame transform settings.
    pub transform: TransformConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        let mut modality = BTreeMap::new();
        modality.insert(Modality::Rgb, ModalityConfig::default_for(Modality::Rgb));
        Self {
            annotations_path: PathBuf::from("train_val"),
            features_path: PathBuf::from("saved_features"),
            split: "D1".into(),
            mode: Mode::Train,
            save_name: None,
            num_clips: 5,
            stride: 2,
            seed: DEFAULT_SEED,
            modalities: vec![Modality::Rgb],
            modality,
            additional_info: false,
            load_features: false,
            emg: EmgConfig::default(),
            transform: TransformConfig::default(),
        }
    }
}

impl DatasetConfig {
    /// `{split}_train`, `{split}_{save_name}` or `{split}_test`.
    #[must_use]
    pub fn annotation_table_name(&self) -> String {
        match (self.mode, &self.save_name) {
            (Mode::Train, _) => format!("{}_train", self.split),
            (_, Some(save)) => format!("{}_{save}", self.split),
            (_, None) => format!("{}_test", self.split),
        }
    }

    /// `{features_name}_{annotation table}` for `modality`.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if the modality has no `features_name`.
    pub fn feature_table_name(&self, modality: Modality) -> Result<String, CoreError> {
        let name = self
            .modality_config(modality)?
            .features_name
            .as_deref()
            .ok_or_else(|| CoreError::Config(format!("features_name manquant pour {modality}")))?;
        Ok(format!("{name}_{}", self.annotation_table_name()))
    }

    /// EMG-only table: `{emg_table}_{train|test}`, `_spe` appended in conv mode.
    #[must_use]
    pub fn emg_table_name(&self) -> String {
        let spe = if self.emg.conv { "_spe" } else { "" };
        format!("{}_{}{spe}", self.emg.emg_table, self.mode.table_suffix())
    }

    /// Fused view tables: `({fused_emg_table}[_spe]_{mode}, {rgb_feature_table}_{mode})`.
    #[must_use]
    pub fn fused_table_names(&self) -> (String, String) {
        let spe = if self.emg.conv { "_spe" } else { "" };
        let suffix = self.mode.table_suffix();
        (
            format!("{}{spe}_{suffix}", self.emg.fused_emg_table),
            format!("{}_{suffix}", self.emg.rgb_feature_table),
        )
    }

    /// Settings of `modality`.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if the modality is not configured.
    pub fn modality_config(&self, modality: Modality) -> Result<&ModalityConfig, CoreError> {
        self.modality
            .get(&modality)
            .ok_or_else(|| CoreError::Config(format!("modalité {modality} non configurée")))
    }

    /// Sampling policy of `modality`.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if the modality is not configured or its
    /// counts are zero.
    pub fn policy(&self, modality: Modality) -> Result<SamplingPolicy, CoreError> {
        let m = self.modality_config(modality)?;
        SamplingPolicy::new(m.num_frames_per_clip, self.num_clips, m.dense_sampling)
    }

    /// Reject values no view can work with.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), CoreError> {
        let bad = |msg: String| Err(CoreError::Config(msg));
        if self.modalities.is_empty() {
            return bad("aucune modalité déclarée".into());
        }
        for (i, m) in self.modalities.iter().enumerate() {
            if self.modalities[..i].contains(m) {
                return bad(format!("modalité {m} déclarée deux fois"));
            }
            self.policy(*m)?;
        }
        if self.stride == 0 {
            return bad("stride doit être ≥ 1".into());
        }
        let e = &self.emg;
        if e.order == 0 {
            return bad("emg.order doit être ≥ 1".into());
        }
        if !(e.sample_rate_hz.is_finite() && e.sample_rate_hz > 0.0) {
            return bad(format!("emg.sample_rate_hz invalide : {}", e.sample_rate_hz));
        }
        if !(e.cutoff_hz > 0.0 && e.cutoff_hz < e.sample_rate_hz / 2.0) {
            return bad(format!(
                "emg.cutoff_hz doit être dans ]0, {}[ : {}",
                e.sample_rate_hz / 2.0,
                e.cutoff_hz
            ));
        }
        if !(e.epsilon.is_finite() && e.epsilon > 0.0) {
            return bad(format!("emg.epsilon invalide : {}", e.epsilon));
        }
        let t = &self.transform;
        if t.width == 0 || t.height == 0 {
            return bad(format!("transform {}×{} vide", t.width, t.height));
        }
        if t.std.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return bad(format!("transform.std invalide : {:?}", t.std));
        }
        Ok(())
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    dataset: Option<DatasetSection>,
    #[serde(default)]
    modality: BTreeMap<String, ModalitySection>,
    emg: Option<EmgSection>,
    transform: Option<TransformSection>,
}

/// Dataset section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct DatasetSection {
    annotations_path: Option<PathBuf>,
    features_path: Option<PathBuf>,
    split: Option<String>,
    mode: Option<Mode>,
    save_name: Option<String>,
    num_clips: Option<usize>,
    stride: Option<usize>,
    seed: Option<u64>,
    modalities: Option<Vec<String>>,
    additional_info: Option<bool>,
    load_features: Option<bool>,
}

/// One `[modality.<NAME>]` table.
#[derive(Deserialize)]
struct ModalitySection {
    data_path: Option<PathBuf>,
    tmpl: Option<FrameTemplate>,
    features_name: Option<String>,
    num_frames_per_clip: Option<usize>,
    dense_sampling: Option<bool>,
}

/// EMG section, all fields optional.
#[derive(Deserialize)]
struct EmgSection {
    conv: Option<bool>,
    mode: Option<PreprocessMode>,
    order: Option<usize>,
    cutoff_hz: Option<f64>,
    sample_rate_hz: Option<f64>,
    epsilon: Option<f32>,
    emg_table: Option<String>,
    fused_emg_table: Option<String>,
    rgb_feature_table: Option<String>,
}

/// Transform section, all fields optional.
#[derive(Deserialize)]
struct TransformSection {
    width: Option<u32>,
    height: Option<u32>,
    mean: Option<[f32; 3]>,
    std: Option<[f32; 3]>,
}

macro_rules! merge {
    ($dst:expr, $src:expr, $($field:ident),+ $(,)?) => {
        $(if let Some(v) = $src.$field {
            $dst.$field = v;
        })+
    };
}

/// Parse a TOML string and merge it over the defaults.
///
/// # Errors
/// Returns an error if the TOML is malformed or the merged config is invalid.
///
/// # Example
/// ```
/// use mc_core::config::parse_config;
/// use mc_core::modality::Modality;
/// let config = parse_config(r#"
///     [dataset]
///     split = "D2"
///     num_clips = 1
///
///     [modality.RGB]
///     num_frames_per_clip = 5
/// "#).unwrap();
/// assert_eq!(config.annotation_table_name(), "D2_train");
/// assert_eq!(config.policy(Modality::Rgb).unwrap().desired_len(), 5);
/// ```
pub fn parse_config(content: &str) -> Result<DatasetConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = DatasetConfig::default();

    if let Some(d) = file.dataset {
        if let Some(names) = d.modalities {
            config.modalities = names
                .iter()
                .map(|n| n.parse::<Modality>())
                .collect::<Result<_, _>>()?;
        }
        if d.save_name.is_some() {
            config.save_name = d.save_name;
        }
        merge!(
            config,
            d,
            annotations_path,
            features_path,
            split,
            mode,
            num_clips,
            stride,
            seed,
            additional_info,
            load_features,
        );
    }

    for (name, section) in file.modality {
        let modality: Modality = name.parse()?;
        let entry = config
            .modality
            .entry(modality)
            .or_insert_with(|| ModalityConfig::default_for(modality));
        if section.features_name.is_some() {
            entry.features_name = section.features_name;
        }
        merge!(
            entry,
            section,
            data_path,
            tmpl,
            num_frames_per_clip,
            dense_sampling,
        );
    }
    for &modality in &config.modalities {
        config
            .modality
            .entry(modality)
            .or_insert_with(|| ModalityConfig::default_for(modality));
    }

    if let Some(e) = file.emg {
        merge!(
            config.emg,
            e,
            conv,
            mode,
            order,
            cutoff_hz,
            sample_rate_hz,
            epsilon,
            emg_table,
            fused_emg_table,
            rgb_feature_table,
        );
    }
    if let Some(t) = file.transform {
        merge!(config.transform, t, width, height, mean, std);
    }

    config.validate()?;
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or validated.
///
/// # Example
/// ```no_run
/// use mc_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<DatasetConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Configuration invalide dans {}", path.display()))
}
