use mc_core::config::{EmgConfig, PreprocessMode};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::EmgError;
use crate::filter::ButterworthLowpass;

/// Output of [`EmgPreprocessor::preprocess`].
#[derive(Clone, Debug, PartialEq)]
pub enum Preprocessed {
    /// `[T × C]`, each row in [-1, 1].
    Filtered(Array2<f32>),
    /// `[T]`, one energy value per timestep.
    RectifiedSum(Array1<f32>),
}

impl Preprocessed {
    /// Number of timesteps.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Filtered(a) => a.nrows(),
            Self::RectifiedSum(a) => a.len(),
        }
    }

    /// `true` if there is no timestep.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Conditions the readings of one armband.
///
/// Filter coefficients are designed once in the constructor and shared by
/// every call.
///
/// # Example
/// ```
/// use mc_emg::preprocess::EmgPreprocessor;
/// use ndarray::Array2;
///
/// let pre = EmgPreprocessor::new(4, 5.0, 160.0, 1e-4).unwrap();
/// let readings = Array2::from_shape_fn((64, 8), |(t, c)| ((t * 8 + c) as f32).sin());
/// let out = pre.filtered(readings.view()).unwrap();
/// assert_eq!(out.dim(), (64, 8));
/// assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
/// ```
#[derive(Clone, Debug)]
pub struct EmgPreprocessor {
    filter: ButterworthLowpass,
    epsilon: f32,
}

impl EmgPreprocessor {
    /// Build from filter parameters and the normalization guard.
    ///
    /// # Errors
    /// Returns [`EmgError::InvalidFilter`] for an invalid filter or a
    /// non-positive `epsilon`.
    pub fn new(order: usize, cutoff_hz: f64, sample_rate_hz: f64, epsilon: f32) -> Result<Self, EmgError> {
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(EmgError::InvalidFilter(format!("epsilon {epsilon}")));
        }
        Ok(Self {
            filter: ButterworthLowpass::new(order, cutoff_hz, sample_rate_hz)?,
            epsilon,
        })
    }

    /// Build from the `[emg]` settings.
    ///
    /// # Errors
    /// Same as [`Self::new`].
    pub fn from_config(config: &EmgConfig) -> Result<Self, EmgError> {
        Self::new(config.order, config.cutoff_hz, config.sample_rate_hz, config.epsilon)
    }

    /// Run the pipeline selected by `mode`.
    ///
    /// # Errors
    /// Any error of [`Self::filtered`] or [`Self::rectified_sum`].
    pub fn preprocess(&self, mode: PreprocessMode, readings: ArrayView2<'_, f32>) -> Result<Preprocessed, EmgError> {
        match mode {
            PreprocessMode::Filtered => self.filtered(readings).map(Preprocessed::Filtered),
            PreprocessMode::RectifiedSum => self.rectified_sum(readings).map(Preprocessed::RectifiedSum),
        }
    }

    /// Rectify, zero-phase low-pass each channel, then min-max each timestep
    /// to [-1, 1] with `epsilon` added to the range.
    ///
    /// A timestep whose channels are all equal maps to -1.
    ///
    /// # Errors
    /// - [`EmgError::EmptyReadings`] if `T` or `C` is 0.
    /// - [`EmgError::SignalTooShort`] if `T` does not exceed the filter padding.
    /// - [`EmgError::NonFinite`] if a NaN or infinity reaches the output.
    pub fn filtered(&self, readings: ArrayView2<'_, f32>) -> Result<Array2<f32>, EmgError> {
        check_not_empty(readings)?;
        let mut out = Array2::<f32>::zeros(readings.raw_dim());
        for (src, mut dst) in readings.columns().into_iter().zip(out.columns_mut()) {
            let rectified: Vec<f64> = src.iter().map(|v| f64::from(v.abs())).collect();
            let smoothed = self.filter.filtfilt(&rectified)?;
            for (d, s) in dst.iter_mut().zip(&smoothed) {
                *d = *s as f32;
            }
        }

        let eps = self.epsilon;
        for (t, mut row) in out.rows_mut().into_iter().enumerate() {
            let (min, max) = min_max(row.view());
            let range = max - min + eps;
            row.mapv_inplace(|v| 2.0 * (v - min) / range - 1.0);
            if row.iter().any(|v| !v.is_finite()) {
                return Err(EmgError::NonFinite { row: t });
            }
        }
        Ok(out)
    }

    /// Rectify, min-max each timestep to [-1, 1], rectify again, sum over channels.
    ///
    /// No guard is added to the range here.
    ///
    /// # Errors
    /// - [`EmgError::EmptyReadings`] if `T` or `C` is 0.
    /// - [`EmgError::DegenerateRange`] if all channels are equal at a timestep.
    /// - [`EmgError::NonFinite`] if a NaN or infinity is read.
    ///
    /// # Example
    /// ```
    /// use mc_emg::preprocess::EmgPreprocessor;
    /// use ndarray::array;
    ///
    /// let pre = EmgPreprocessor::new(4, 5.0, 160.0, 1e-4).unwrap();
    /// let out = pre.rectified_sum(array![[1.0f32, -3.0], [0.5, 0.0]].view()).unwrap();
    /// assert_eq!(out.to_vec(), vec![2.0, 2.0]);
    /// ```
    pub fn rectified_sum(&self, readings: ArrayView2<'_, f32>) -> Result<Array1<f32>, EmgError> {
        check_not_empty(readings)?;
        let mut out = Array1::<f32>::zeros(readings.nrows());
        for (t, row) in readings.axis_iter(Axis(0)).enumerate() {
            let rectified = row.mapv(f32::abs);
            if rectified.iter().any(|v| !v.is_finite()) {
                return Err(EmgError::NonFinite { row: t });
            }
            let (min, max) = min_max(rectified.view());
            let range = max - min;
            if range == 0.0 {
                return Err(EmgError::DegenerateRange { row: t });
            }
            out[t] = rectified
                .iter()
                .map(|v| (2.0 * (v - min) / range - 1.0).abs())
                .sum();
        }
        Ok(out)
    }
}

fn check_not_empty(readings: ArrayView2<'_, f32>) -> Result<(), EmgError> {
    if readings.is_empty() {
        return Err(EmgError::EmptyReadings);
    }
    Ok(())
}

fn min_max(row: ArrayView1<'_, f32>) -> (f32, f32) {
    row.iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn pre() -> EmgPreprocessor {
        EmgPreprocessor::new(4, 5.0, 160.0, 1e-4).unwrap()
    }

    fn noise(t: usize, c: usize, seed: u64) -> Array2<f32> {
        let mut rng = fastrand::Rng::with_seed(seed);
        Array2::from_shape_simple_fn((t, c), || rng.f32() * 2.0 - 1.0)
    }

    #[test]
    fn filtered_keeps_shape_and_range() {
        let out = pre().filtered(noise(200, 8, 3).view()).unwrap();
        assert_eq!(out.dim(), (200, 8));
        for row in out.rows() {
            let (lo, hi) = min_max(row);
            assert!((lo + 1.0).abs() < 1e-6);
            assert!(hi <= 1.0 && hi > lo);
        }
    }

    #[test]
    fn constant_input_is_finite() {
        let out = pre().filtered(Array2::from_elem((40, 8), 0.7).view()).unwrap();
        assert!(out.iter().all(|v| v.is_finite() && *v == -1.0));
    }

    #[test]
    fn filtered_works_for_any_channel_count() {
        let out = pre().filtered(noise(50, 3, 9).view()).unwrap();
        assert_eq!(out.dim(), (50, 3));
    }

    #[test]
    fn filtered_rejects_short_and_empty_input() {
        assert!(matches!(
            pre().filtered(noise(10, 8, 1).view()),
            Err(EmgError::SignalTooShort { len: 10, .. })
        ));
        assert_eq!(
            pre().filtered(Array2::<f32>::zeros((0, 8)).view()),
            Err(EmgError::EmptyReadings)
        );
    }

    #[test]
    fn filtered_reports_nan() {
        let mut x = noise(40, 8, 2);
        x[[5, 3]] = f32::NAN;
        assert!(matches!(pre().filtered(x.view()), Err(EmgError::NonFinite { .. })));
    }

    #[test]
    fn rectified_sum_two_channels() {
        // Two channels always map to {-1, 1}, so every timestep sums to 2.
        let x = array![[1.0f32, 2.0], [-4.0, 1.0], [0.0, -0.5]];
        let out = pre().rectified_sum(x.view()).unwrap();
        assert_eq!(out.to_vec(), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn rectified_sum_three_channels_by_hand() {
        // |.| → [1,2,3], [0,1,3], [0,1,4]
        // min-max → [-1,0,1], [-1,-1/3,1], [-1,-1/2,1]
        let x = array![[1.0f32, -2.0, 3.0], [0.0, 1.0, -3.0], [0.0, -1.0, 4.0]];
        let out = pre().rectified_sum(x.view()).unwrap();
        let expected = [2.0, 7.0 / 3.0, 2.5];
        for (got, want) in out.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
    }

    #[test]
    fn rectified_sum_reports_zero_range() {
        let x = array![[1.0f32, 2.0], [3.0, -3.0]];
        assert_eq!(
            pre().rectified_sum(x.view()),
            Err(EmgError::DegenerateRange { row: 1 })
        );
    }

    #[test]
    fn mode_selects_the_pipeline() {
        let x = noise(32, 8, 5);
        let p = pre();
        assert!(matches!(
            p.preprocess(PreprocessMode::Filtered, x.view()).unwrap(),
            Preprocessed::Filtered(a) if a.dim() == (32, 8)
        ));
        let summed = p.preprocess(PreprocessMode::RectifiedSum, x.view()).unwrap();
        assert_eq!(summed.len(), 32);
    }

    #[test]
    fn invalid_epsilon_is_rejected() {
        assert!(EmgPreprocessor::new(4, 5.0, 160.0, 0.0).is_err());
        assert!(EmgPreprocessor::from_config(&EmgConfig::default()).is_ok());
    }
}
