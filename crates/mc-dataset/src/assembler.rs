//! Builds one sample out of sampled frames, preprocessed EMG and features.

use anyhow::{Context, Result};
use mc_core::config::{EmgConfig, PreprocessMode};
use mc_core::modality::Modality;
use mc_core::record::{EmgReadings, Record};
use mc_core::sample::Sample;
use mc_core::traits::{FrameLoader, FrameTransform};
use mc_emg::error::EmgError;
use mc_emg::preprocess::{EmgPreprocessor, Preprocessed};
use mc_source::sampler::FrameSampler;
use ndarray::{Array1, Array2, ArrayD, Axis, concatenate, stack};

/// Turns the two armbands of a record into the `EMG` tensor.
///
/// | `conv` | mode           | shape            |
/// |--------|----------------|------------------|
/// | true   | any            | `[1, Tl + Tr, 8]` raw readings |
/// | false  | `Filtered`     | `[1, T, 16]`     |
/// | false  | `RectifiedSum` | `[1, T, 2]`      |
///
/// # Example
/// ```
/// use mc_core::config::EmgConfig;
/// use mc_core::record::EmgReadings;
/// use mc_dataset::assembler::EmgAssembler;
/// use ndarray::Array2;
///
/// let asm = EmgAssembler::from_config(&EmgConfig::default()).unwrap();
/// let readings = EmgReadings { left: Array2::zeros((30, 8)), right: Array2::ones((30, 8)) };
/// assert_eq!(asm.assemble(&readings).unwrap().shape(), &[1, 60, 8]);
/// ```
#[derive(Clone, Debug)]
pub struct EmgAssembler {
    conv: bool,
    mode: PreprocessMode,
    preprocessor: EmgPreprocessor,
}

impl EmgAssembler {
    /// Build from explicit parts.
    #[must_use]
    pub fn new(conv: bool, mode: PreprocessMode, preprocessor: EmgPreprocessor) -> Self {
        Self {
            conv,
            mode,
            preprocessor,
        }
    }

    /// Build from the `[emg]` settings. Designs the filter once.
    ///
    /// # Errors
    /// Returns [`EmgError::InvalidFilter`] for invalid filter settings.
    pub fn from_config(config: &EmgConfig) -> Result<Self, EmgError> {
        Ok(Self::new(
            config.conv,
            config.mode,
            EmgPreprocessor::from_config(config)?,
        ))
    }

    /// Build the `EMG` tensor of `readings`.
    ///
    /// # Errors
    /// [`EmgError::ShapeMismatch`] if the armbands cannot be stacked, or any
    /// preprocessing error.
    pub fn assemble(&self, readings: &EmgReadings) -> Result<ArrayD<f32>, EmgError> {
        let (left, right) = (readings.left.view(), readings.right.view());
        let mismatch = || EmgError::ShapeMismatch {
            left: left.shape().to_vec(),
            right: right.shape().to_vec(),
        };

        let stacked: Array2<f32> = if self.conv {
            concatenate(Axis(0), &[left, right]).map_err(|_| mismatch())?
        } else {
            if left.nrows() != right.nrows() {
                return Err(mismatch());
            }
            let l = self.preprocessor.preprocess(self.mode, left)?;
            let r = self.preprocessor.preprocess(self.mode, right)?;
            match (l, r) {
                (Preprocessed::Filtered(l), Preprocessed::Filtered(r)) => {
                    concatenate(Axis(1), &[l.view(), r.view()]).map_err(|_| mismatch())?
                }
                (Preprocessed::RectifiedSum(l), Preprocessed::RectifiedSum(r)) => {
                    stack(Axis(1), &[l.view(), r.view()]).map_err(|_| mismatch())?
                }
                _ => return Err(mismatch()),
            }
        };
        Ok(stacked.insert_axis(Axis(0)).into_dyn())
    }
}

/// `{EMG, RGB}` sample of the fused view. Label comes from the EMG record.
#[must_use]
pub fn fuse_emg_rgb(record: &Record, emg: ArrayD<f32>, rgb: &Array1<f32>) -> Sample {
    let mut sample = Sample::new(record.label());
    sample.insert(Modality::Emg, emg);
    sample.insert(Modality::Rgb, rgb.clone().into_dyn());
    sample
}

/// Sample, load and transform every modality of `record`, in `modalities` order.
///
/// Any failing stage aborts the whole sample.
///
/// # Errors
/// Returns the first sampling, loading or transform error, with the uid and
/// modality as context.
pub fn assemble_video(
    record: &Record,
    modalities: &[Modality],
    sampler: &FrameSampler,
    loader: &dyn FrameLoader,
    transform: &dyn FrameTransform,
    rng: &mut fastrand::Rng,
) -> Result<Sample> {
    let mut sample = Sample::new(record.label());
    for &modality in modalities {
        let indices = sampler
            .sample(record, modality, rng)
            .with_context(|| format!("Échantillonnage de {modality}"))?;
        let mut frames = Vec::with_capacity(indices.len());
        for idx in indices {
            frames.extend(loader.load(modality, record, idx)?);
        }
        let tensor = transform
            .apply(modality, &frames)
            .with_context(|| format!("uid {} : transformation {modality}", record.uid()))?;
        sample.insert(modality, tensor);
    }
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::config::Mode;
    use mc_core::frame::Frame;
    use mc_core::policy::SamplingPolicy;
    use ndarray::IxDyn;
    use std::sync::Mutex;

    fn readings(t_left: usize, t_right: usize) -> EmgReadings {
        EmgReadings {
            left: Array2::from_shape_fn((t_left, 8), |(t, c)| ((t + c) as f32 * 0.3).sin()),
            right: Array2::from_shape_fn((t_right, 8), |(t, c)| ((c * (t + 1)) as f32 * 0.1).cos()),
        }
    }

    fn assembler(conv: bool, mode: PreprocessMode) -> EmgAssembler {
        EmgAssembler::from_config(&EmgConfig {
            conv,
            mode,
            ..EmgConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn conv_stacks_raw_readings_along_time() {
        let r = readings(40, 40);
        let out = assembler(true, PreprocessMode::Filtered).assemble(&r).unwrap();
        assert_eq!(out.shape(), &[1, 80, 8]);
        assert_eq!(out[[0, 0, 3]], r.left[[0, 3]]);
        assert_eq!(out[[0, 40, 3]], r.right[[0, 3]]);
    }

    #[test]
    fn conv_accepts_unequal_lengths() {
        let out = assembler(true, PreprocessMode::Filtered)
            .assemble(&readings(30, 45))
            .unwrap();
        assert_eq!(out.shape(), &[1, 75, 8]);
    }

    #[test]
    fn filtered_stacks_along_channels() {
        let out = assembler(false, PreprocessMode::Filtered)
            .assemble(&readings(40, 40))
            .unwrap();
        assert_eq!(out.shape(), &[1, 40, 16]);
        assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn rectified_sum_gives_one_column_per_armband() {
        let out = assembler(false, PreprocessMode::RectifiedSum)
            .assemble(&readings(20, 20))
            .unwrap();
        assert_eq!(out.shape(), &[1, 20, 2]);
    }

    #[test]
    fn unequal_lengths_cannot_be_stacked_on_channels() {
        assert!(matches!(
            assembler(false, PreprocessMode::Filtered).assemble(&readings(40, 41)),
            Err(EmgError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn fused_sample_carries_emg_label() {
        let record = Record::builder(3, "")
            .label(9)
            .emg(readings(20, 20))
            .build()
            .unwrap();
        let sample = fuse_emg_rgb(&record, ArrayD::zeros(IxDyn(&[1, 40, 8])), &Array1::ones(1024));
        assert_eq!(sample.label, Some(9));
        assert_eq!(
            sample.modalities().collect::<Vec<_>>(),
            vec![Modality::Emg, Modality::Rgb]
        );
        assert_eq!(sample.get(Modality::Rgb).unwrap().shape(), &[1024]);
    }

    /// Records every absolute frame request.
    struct Recorder(Mutex<Vec<(Modality, usize)>>);

    impl FrameLoader for Recorder {
        fn load(&self, modality: Modality, record: &Record, index: usize) -> Result<Vec<Frame>> {
            self.0
                .lock()
                .unwrap()
                .push((modality, record.start_frame() + index));
            Ok(vec![Frame::new(2, 2)])
        }
    }

    struct Count;

    impl FrameTransform for Count {
        fn apply(&self, _modality: Modality, frames: &[Frame]) -> Result<ArrayD<f32>> {
            Ok(ArrayD::zeros(IxDyn(&[frames.len()])))
        }
    }

    #[test]
    fn video_assembly_follows_modality_order_and_offsets() {
        let record = Record::builder(1, "P01_01")
            .label(4)
            .start_frame(1000)
            .num_frames(Modality::Rgb, 60)
            .num_frames(Modality::RgbDiff, 60)
            .build()
            .unwrap();
        let sampler = FrameSampler::new(Mode::Train)
            .with_policy(Modality::Rgb, SamplingPolicy::new(4, 2, true).unwrap())
            .with_policy(Modality::RgbDiff, SamplingPolicy::new(2, 2, false).unwrap());
        let loader = Recorder(Mutex::new(Vec::new()));
        let mut rng = fastrand::Rng::with_seed(0);

        let sample = assemble_video(
            &record,
            &[Modality::RgbDiff, Modality::Rgb],
            &sampler,
            &loader,
            &Count,
            &mut rng,
        )
        .unwrap();

        assert_eq!(
            sample.modalities().collect::<Vec<_>>(),
            vec![Modality::RgbDiff, Modality::Rgb]
        );
        assert_eq!(sample.get(Modality::Rgb).unwrap().shape(), &[8]);
        assert_eq!(sample.get(Modality::RgbDiff).unwrap().shape(), &[4]);
        assert_eq!(sample.label, Some(4));
        let calls = loader.0.lock().unwrap();
        assert_eq!(calls.len(), 12);
        assert!(calls.iter().all(|(_, abs)| (1000..=1061).contains(abs)));
    }

    #[test]
    fn video_assembly_fails_on_short_record() {
        let record = Record::builder(1, "v")
            .num_frames(Modality::Rgb, 10)
            .build()
            .unwrap();
        let sampler = FrameSampler::new(Mode::Val)
            .with_policy(Modality::Rgb, SamplingPolicy::new(4, 1, true).unwrap());
        let loader = Recorder(Mutex::new(Vec::new()));
        let mut rng = fastrand::Rng::with_seed(0);
        let err = assemble_video(&record, &[Modality::Rgb], &sampler, &loader, &Count, &mut rng);
        assert!(err.is_err());
        assert!(loader.0.lock().unwrap().is_empty());
    }
}
