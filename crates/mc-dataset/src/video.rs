use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mc_core::config::DatasetConfig;
use mc_core::error::CoreError;
use mc_core::modality::Modality;
use mc_core::record::Record;
use mc_core::sample::{Sample, SampleInfo};
use mc_core::table::{AnnotationRow, FeatureTable, ModalityFeatures, load_table, resolve_table};
use mc_core::traits::{Dataset, FrameLoader, FrameTransform};
use mc_source::image::ImageFolderLoader;
use mc_source::sampler::FrameSampler;
use mc_source::transform::ResizeNormalize;

use crate::assembler::assemble_video;

/// Where the tensors of a video sample come from.
enum VideoSource {
    Frames {
        sampler: FrameSampler,
        loader: Arc<dyn FrameLoader>,
        transform: Arc<dyn FrameTransform>,
    },
    Features(FeatureTable),
}

/// Annotated segments of untrimmed videos, one sample per segment.
///
/// In frame mode every `get` samples indices, reads frames from disk and
/// transforms them. In feature mode it returns the precomputed vectors
/// joined on uid at construction.
pub struct VideoDataset {
    records: Vec<Record>,
    modalities: Vec<Modality>,
    source: VideoSource,
    additional_info: bool,
}

impl VideoDataset {
    /// Frame mode with explicit collaborators.
    ///
    /// # Errors
    /// Returns [`CoreError::UnsupportedModality`] if a modality has no frame loader.
    pub fn with_frames(
        records: Vec<Record>,
        modalities: Vec<Modality>,
        sampler: FrameSampler,
        loader: Arc<dyn FrameLoader>,
        transform: Arc<dyn FrameTransform>,
    ) -> Result<Self, CoreError> {
        if let Some(&modality) = modalities.iter().find(|m| !m.is_image()) {
            return Err(CoreError::UnsupportedModality { modality });
        }
        Ok(Self {
            records,
            modalities,
            source: VideoSource::Frames {
                sampler,
                loader,
                transform,
            },
            additional_info: false,
        })
    }

    /// Feature mode. `features` must already be joined on the records' uids.
    #[must_use]
    pub fn with_features(records: Vec<Record>, features: FeatureTable) -> Self {
        Self {
            records,
            modalities: features.modalities().to_vec(),
            source: VideoSource::Features(features),
            additional_info: false,
        }
    }

    /// Attach uid and video name to every sample.
    #[must_use]
    pub fn additional_info(mut self, on: bool) -> Self {
        self.additional_info = on;
        self
    }

    /// Load the annotation table named by `config` and, in feature mode,
    /// join every modality's feature table on uid.
    ///
    /// # Errors
    /// Returns an error if a table is missing or malformed, a row is
    /// invalid, a uid cannot be joined, or a modality is unsupported.
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        let name = config.annotation_table_name();
        let path = resolve_table(&config.annotations_path, &name)?;
        let rows: Vec<AnnotationRow> = load_table(&path)?;
        let records = rows
            .iter()
            .map(|row| Record::from_annotation(row, &config.modalities))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Annotations invalides dans {}", path.display()))?;
        log::info!(
            "{} segments chargés depuis {} (split {}, mode {})",
            records.len(),
            path.display(),
            config.split,
            config.mode
        );

        let dataset = if config.load_features {
            let mut tables = Vec::with_capacity(config.modalities.len());
            for &m in &config.modalities {
                let table = resolve_table(&config.features_path, &config.feature_table_name(m)?)?;
                tables.push(ModalityFeatures::load(&table, m)?);
            }
            let uids: Vec<u64> = records.iter().map(Record::uid).collect();
            let features = FeatureTable::join(&uids, tables)?;
            Self::with_features(records, features)
        } else {
            let sampler = config.modalities.iter().try_fold(
                FrameSampler::new(config.mode),
                |s, &m| Ok::<_, CoreError>(s.with_policy(m, config.policy(m)?)),
            )?;
            Self::with_frames(
                records,
                config.modalities.clone(),
                sampler,
                Arc::new(ImageFolderLoader::from_config(config)),
                Arc::new(ResizeNormalize::from_config(&config.transform)),
            )?
        };
        Ok(dataset.additional_info(config.additional_info))
    }

    /// Records in table order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Modalities in output order.
    #[must_use]
    pub fn modalities(&self) -> &[Modality] {
        &self.modalities
    }
}

impl Dataset for VideoDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize, rng: &mut fastrand::Rng) -> Result<Sample> {
        let Some(record) = self.records.get(index) else {
            bail!("Index {index} hors limites ({} segments)", self.records.len());
        };
        let mut sample = match &self.source {
            VideoSource::Frames {
                sampler,
                loader,
                transform,
            } => assemble_video(
                record,
                &self.modalities,
                sampler,
                loader.as_ref(),
                transform.as_ref(),
                rng,
            )?,
            VideoSource::Features(table) => {
                let mut sample = Sample::new(record.label());
                for &m in &self.modalities {
                    let v = table.get(record.uid(), m).ok_or_else(|| CoreError::Join {
                        uid: record.uid(),
                        modality: m,
                        reason: "ligne absente".into(),
                    })?;
                    sample.insert(m, v.clone().into_dyn());
                }
                sample
            }
        };
        if self.additional_info {
            sample.info = Some(SampleInfo {
                uid: record.uid(),
                video_name: record.video_name().to_string(),
            });
        }
        Ok(sample)
    }
}
