use anyhow::{Context, Result, bail};
use mc_core::config::DatasetConfig;
use mc_core::modality::Modality;
use mc_core::record::Record;
use mc_core::sample::{Sample, SampleInfo};
use mc_core::table::{load_feature_column, resolve_table};
use mc_core::traits::Dataset;
use ndarray::Array1;

use crate::assembler::{EmgAssembler, fuse_emg_rgb};
use crate::emg::load_emg_records;

/// EMG recordings fused with precomputed RGB features, matched by row index.
///
/// Construction fails if the RGB table has fewer rows than the EMG table.
/// Extra RGB rows are ignored.
pub struct EmgRgbDataset {
    records: Vec<Record>,
    rgb: Vec<Array1<f32>>,
    assembler: EmgAssembler,
    additional_info: bool,
}

impl EmgRgbDataset {
    /// Pair `records[i]` with `rgb[i]`.
    ///
    /// # Errors
    /// Returns an error if a record has no EMG readings or an RGB row is missing.
    pub fn new(records: Vec<Record>, rgb: Vec<Array1<f32>>, assembler: EmgAssembler) -> Result<Self> {
        if rgb.len() < records.len() {
            bail!(
                "{} lignes RGB pour {} enregistrements EMG, jointure par index impossible",
                rgb.len(),
                records.len()
            );
        }
        if rgb.len() > records.len() {
            log::warn!("{} lignes RGB ignorées", rgb.len() - records.len());
        }
        if let Some(r) = records.iter().find(|r| r.emg().is_none()) {
            bail!("Record {} sans lectures EMG", r.uid());
        }
        Ok(Self {
            records,
            rgb,
            assembler,
            additional_info: false,
        })
    }

    /// Attach uid and video name to every sample.
    #[must_use]
    pub fn additional_info(mut self, on: bool) -> Self {
        self.additional_info = on;
        self
    }

    /// Load `{fused_emg_table}[_spe]_{mode}` and `{rgb_feature_table}_{mode}`.
    ///
    /// # Errors
    /// Returns an error if a table is missing or malformed, the tables
    /// cannot be paired, or the filter settings are invalid.
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        let (emg_name, rgb_name) = config.fused_table_names();
        let records = load_emg_records(config, &emg_name)?;
        let rgb_path = resolve_table(&config.annotations_path, &rgb_name)?;
        let rgb = load_feature_column(&rgb_path, Modality::Rgb)
            .with_context(|| format!("Features RGB de {}", rgb_path.display()))?;
        let assembler = EmgAssembler::from_config(&config.emg)?;
        Ok(Self::new(records, rgb, assembler)?.additional_info(config.additional_info))
    }
}

impl Dataset for EmgRgbDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize, _rng: &mut fastrand::Rng) -> Result<Sample> {
        let (Some(record), Some(rgb)) = (self.records.get(index), self.rgb.get(index)) else {
            bail!("Index {index} hors limites ({} enregistrements)", self.records.len());
        };
        let Some(readings) = record.emg() else {
            bail!("Record {} sans lectures EMG", record.uid());
        };
        let emg = self
            .assembler
            .assemble(readings)
            .with_context(|| format!("EMG de uid {}", record.uid()))?;
        let mut sample = fuse_emg_rgb(record, emg, rgb);
        if self.additional_info {
            sample.info = Some(SampleInfo {
                uid: record.uid(),
                video_name: record.video_name().to_string(),
            });
        }
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(dir: &Path, name: &str, value: &serde_json::Value) {
        fs::write(dir.join(format!("{name}.json")), serde_json::to_vec(value).unwrap()).unwrap();
    }

    fn emg_rows(n: usize) -> serde_json::Value {
        let arm: Vec<Vec<f32>> = (0..40)
            .map(|t| (0..8).map(|c| ((t * 8 + c) as f32).cos()).collect())
            .collect();
        serde_json::Value::Array(
            (0..n)
                .map(|i| serde_json::json!({ "label": i, "myo_left_readings": arm, "myo_right_readings": arm }))
                .collect(),
        )
    }

    fn rgb_rows(n: usize) -> serde_json::Value {
        serde_json::Value::Array(
            (0..n)
                .map(|i| serde_json::json!({ "features_RGB": vec![i as f32; 1024] }))
                .collect(),
        )
    }

    fn config(root: &Path) -> DatasetConfig {
        let mut config = DatasetConfig::default();
        config.annotations_path = root.to_path_buf();
        config
    }

    #[test]
    fn pairs_rows_by_index() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "D4_emg_spe_train", &emg_rows(3));
        write(tmp.path(), "feature_extracted_D4_train", &rgb_rows(4));
        let ds = EmgRgbDataset::from_config(&config(tmp.path())).unwrap();
        assert_eq!(ds.len(), 3);

        let sample = ds.get(2, &mut fastrand::Rng::with_seed(0)).unwrap();
        assert_eq!(sample.label, Some(2));
        assert_eq!(sample.get(Modality::Emg).unwrap().shape(), &[1, 80, 8]);
        let rgb = sample.get(Modality::Rgb).unwrap();
        assert_eq!(rgb.shape(), &[1024]);
        assert!(rgb.iter().all(|v| *v == 2.0));
    }

    #[test]
    fn non_conv_reads_plain_emg_table() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "D4_emg_train", &emg_rows(1));
        write(tmp.path(), "feature_extracted_D4_train", &rgb_rows(1));
        let mut cfg = config(tmp.path());
        cfg.emg.conv = false;
        let ds = EmgRgbDataset::from_config(&cfg).unwrap();
        let sample = ds.get(0, &mut fastrand::Rng::with_seed(0)).unwrap();
        assert_eq!(sample.get(Modality::Emg).unwrap().shape(), &[1, 40, 16]);
    }

    #[test]
    fn missing_rgb_rows_fail_construction() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "D4_emg_spe_train", &emg_rows(3));
        write(tmp.path(), "feature_extracted_D4_train", &rgb_rows(2));
        assert!(EmgRgbDataset::from_config(&config(tmp.path())).is_err());
    }
}
