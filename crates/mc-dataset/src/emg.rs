use anyhow::{Context, Result, bail};
use mc_core::config::DatasetConfig;
use mc_core::modality::Modality;
use mc_core::record::Record;
use mc_core::sample::{Sample, SampleInfo};
use mc_core::table::{EmgRow, load_table, resolve_table};
use mc_core::traits::Dataset;

use crate::assembler::EmgAssembler;

/// Load and validate the rows of an EMG table. Rows without a uid get their
/// row index.
///
/// # Errors
/// Returns an error if the table is unreadable or a row is malformed.
pub fn load_emg_records(config: &DatasetConfig, name: &str) -> Result<Vec<Record>> {
    let path = resolve_table(&config.annotations_path, name)?;
    let rows: Vec<EmgRow> = load_table(&path)?;
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| Record::from_emg_row(row, i))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Lectures EMG invalides dans {}", path.display()))?;
    log::info!(
        "{} enregistrements EMG chargés depuis {} (mode {})",
        records.len(),
        path.display(),
        config.mode
    );
    Ok(records)
}

/// EMG-only view. Readings are held in memory, `get` does no I/O.
pub struct EmgDataset {
    records: Vec<Record>,
    assembler: EmgAssembler,
    additional_info: bool,
}

impl EmgDataset {
    /// View over already-built records. Every record must carry readings.
    ///
    /// # Errors
    /// Returns an error naming the first record without EMG readings.
    pub fn new(records: Vec<Record>, assembler: EmgAssembler) -> Result<Self> {
        if let Some(r) = records.iter().find(|r| r.emg().is_none()) {
            bail!("Record {} sans lectures EMG", r.uid());
        }
        Ok(Self {
            records,
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

    /// Load `{emg_table}_{train|test}[_spe]` from the annotations directory.
    ///
    /// # Errors
    /// Returns an error if the table is missing or malformed, or the filter
    /// settings are invalid.
    pub fn from_config(config: &DatasetConfig) -> Result<Self> {
        let records = load_emg_records(config, &config.emg_table_name())?;
        let assembler = EmgAssembler::from_config(&config.emg)?;
        Ok(Self::new(records, assembler)?.additional_info(config.additional_info))
    }

    /// Records in table order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl Dataset for EmgDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize, _rng: &mut fastrand::Rng) -> Result<Sample> {
        let Some(record) = self.records.get(index) else {
            bail!("Index {index} hors limites ({} enregistrements)", self.records.len());
        };
        let Some(readings) = record.emg() else {
            bail!("Record {} sans lectures EMG", record.uid());
        };
        let tensor = self
            .assembler
            .assemble(readings)
            .with_context(|| format!("EMG de uid {}", record.uid()))?;
        let mut sample = Sample::new(record.label());
        sample.insert(Modality::Emg, tensor);
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
    use mc_core::config::{Mode, PreprocessMode};
    use std::fs;
    use std::path::Path;

    fn readings(t: usize, phase: f32) -> Vec<Vec<f32>> {
        (0..t)
            .map(|i| (0..8).map(|c| (i as f32 * 0.2 + c as f32 + phase).sin()).collect())
            .collect()
    }

    fn write_table(dir: &Path, name: &str, t: usize) {
        fs::create_dir_all(dir).unwrap();
        let rows = serde_json::json!([
            { "label": 1, "myo_left_readings": readings(t, 0.0), "myo_right_readings": readings(t, 1.0) },
            { "label": 5, "myo_left_readings": readings(t, 2.0), "myo_right_readings": readings(t, 3.0) },
        ]);
        fs::write(dir.join(format!("{name}.json")), serde_json::to_vec(&rows).unwrap()).unwrap();
    }

    fn config(root: &Path) -> DatasetConfig {
        let mut config = DatasetConfig::default();
        config.annotations_path = root.to_path_buf();
        config
    }

    #[test]
    fn conv_view_reads_spe_table() {
        let tmp = tempfile::tempdir().unwrap();
        write_table(tmp.path(), "big_file_train_spe", 50);
        let ds = EmgDataset::from_config(&config(tmp.path())).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records()[1].uid(), 1);
        let sample = ds.get(1, &mut fastrand::Rng::with_seed(0)).unwrap();
        assert_eq!(sample.get(Modality::Emg).unwrap().shape(), &[1, 100, 8]);
        assert_eq!(sample.label, Some(5));
    }

    #[test]
    fn filtered_view_reads_plain_test_table() {
        let tmp = tempfile::tempdir().unwrap();
        write_table(tmp.path(), "big_file_test", 50);
        let mut cfg = config(tmp.path());
        cfg.mode = Mode::Test;
        cfg.emg.conv = false;
        cfg.additional_info = true;
        let ds = EmgDataset::from_config(&cfg).unwrap();
        let sample = ds.get(0, &mut fastrand::Rng::with_seed(0)).unwrap();
        assert_eq!(sample.get(Modality::Emg).unwrap().shape(), &[1, 50, 16]);
        assert_eq!(sample.info.unwrap().uid, 0);
    }

    #[test]
    fn rectified_sum_view_has_two_columns() {
        let tmp = tempfile::tempdir().unwrap();
        write_table(tmp.path(), "big_file_train", 30);
        let mut cfg = config(tmp.path());
        cfg.emg.conv = false;
        cfg.emg.mode = PreprocessMode::RectifiedSum;
        let ds = EmgDataset::from_config(&cfg).unwrap();
        let sample = ds.get(0, &mut fastrand::Rng::with_seed(0)).unwrap();
        assert_eq!(sample.get(Modality::Emg).unwrap().shape(), &[1, 30, 2]);
    }

    #[test]
    fn short_recording_fails_only_its_sample() {
        let tmp = tempfile::tempdir().unwrap();
        write_table(tmp.path(), "big_file_train", 10);
        let mut cfg = config(tmp.path());
        cfg.emg.conv = false;
        let ds = EmgDataset::from_config(&cfg).unwrap();
        assert!(ds.get(0, &mut fastrand::Rng::with_seed(0)).is_err());
        assert!(ds.get(7, &mut fastrand::Rng::with_seed(0)).is_err());
    }

    #[test]
    fn records_without_readings_are_rejected() {
        let record = Record::builder(1, "v").build().unwrap();
        let asm = EmgAssembler::from_config(&mc_core::config::EmgConfig::default()).unwrap();
        assert!(EmgDataset::new(vec![record], asm).is_err());
    }
}
