//! Butterworth low-pass design and zero-phase (forward-backward) filtering.
//!
//! The transfer function is built from bilinear-transformed second-order
//! sections with a pre-warped cutoff, then expanded to a single `(b, a)`
//! pair. Filtering is direct form II transposed. `filtfilt` pads both ends
//! with an odd reflection of `3 · (order + 1)` samples and starts each pass
//! from the steady-state of the first sample, so a constant signal passes
//! through unchanged.

use std::f64::consts::PI;

use crate::error::EmgError;

/// Low-pass Butterworth filter, coefficients fixed at construction.
///
/// # Example
/// ```
/// use mc_emg::filter::ButterworthLowpass;
/// let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
/// let (b, a) = f.coefficients();
/// assert_eq!((b.len(), a.len()), (5, 5));
/// let dc: f64 = b.iter().sum::<f64>() / a.iter().sum::<f64>();
/// assert!((dc - 1.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug)]
pub struct ButterworthLowpass {
    b: Vec<f64>,
    a: Vec<f64>,
    zi: Vec<f64>,
}

impl ButterworthLowpass {
    /// Design an `order`-th order low-pass at `cutoff_hz` for `sample_rate_hz`.
    ///
    /// # Errors
    /// Returns [`EmgError::InvalidFilter`] if the order is 0 or the cutoff is
    /// not strictly between 0 and Nyquist.
    pub fn new(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Result<Self, EmgError> {
        if order == 0 {
            return Err(EmgError::InvalidFilter("ordre nul".into()));
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(EmgError::InvalidFilter(format!(
                "fréquence d'échantillonnage {sample_rate_hz}"
            )));
        }
        let nyquist = sample_rate_hz / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(EmgError::InvalidFilter(format!(
                "coupure {cutoff_hz} Hz hors de ]0, {nyquist}["
            )));
        }

        let (b, a) = design(order, (PI * cutoff_hz / sample_rate_hz).tan());
        let zi = steady_state(&b, &a)?;
        log::debug!("Butterworth ordre {order}, {cutoff_hz} Hz / {sample_rate_hz} Hz : a = {a:?}");
        Ok(Self { b, a, zi })
    }

    /// `(b, a)` with `a[0] == 1`.
    #[must_use]
    pub fn coefficients(&self) -> (&[f64], &[f64]) {
        (&self.b, &self.a)
    }

    /// Samples reflected at each end by [`Self::filtfilt`].
    #[must_use]
    pub fn padlen(&self) -> usize {
        3 * self.a.len()
    }

    /// One causal pass, starting from the steady state of `x[0]` scaled by `initial`.
    fn lfilter(&self, x: &[f64], initial: f64) -> Vec<f64> {
        let m = self.zi.len();
        let mut z: Vec<f64> = self.zi.iter().map(|v| v * initial).collect();
        let mut y = Vec::with_capacity(x.len());
        for &v in x {
            let out = self.b[0] * v + z[0];
            for i in 0..m - 1 {
                z[i] = self.b[i + 1] * v + z[i + 1] - self.a[i + 1] * out;
            }
            z[m - 1] = self.b[m] * v - self.a[m] * out;
            y.push(out);
        }
        y
    }

    /// Zero-phase filtering of `x`.
    ///
    /// # Errors
    /// Returns [`EmgError::SignalTooShort`] if `x.len() <= padlen()`.
    ///
    /// # Example
    /// ```
    /// use mc_emg::filter::ButterworthLowpass;
    /// let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
    /// let y = f.filtfilt(&[2.5; 64]).unwrap();
    /// assert!(y.iter().all(|v| (v - 2.5).abs() < 1e-9));
    /// ```
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>, EmgError> {
        let p = self.padlen();
        let n = x.len();
        if n <= p {
            return Err(EmgError::SignalTooShort { len: n, padlen: p });
        }

        let mut ext = Vec::with_capacity(n + 2 * p);
        ext.extend((1..=p).rev().map(|i| 2.0 * x[0] - x[i]));
        ext.extend_from_slice(x);
        ext.extend((0..p).map(|i| 2.0 * x[n - 1] - x[n - 2 - i]));

        let mut y = self.lfilter(&ext, ext[0]);
        y.reverse();
        let mut y = self.lfilter(&y, y[0]);
        y.reverse();
        Ok(y[p..p + n].to_vec())
    }
}

/// Expand the cascade of sections into one `(b, a)` pair.
fn design(order: usize, k: f64) -> (Vec<f64>, Vec<f64>) {
    let n = order as f64;
    let k2 = k * k;
    let mut b = vec![1.0];
    let mut a = vec![1.0];

    for i in 1..=order / 2 {
        let zeta = ((2 * i - 1) as f64 * PI / (2.0 * n)).sin();
        let d = 1.0 + 2.0 * zeta * k + k2;
        let g = k2 / d;
        b = convolve(&b, &[g, 2.0 * g, g]);
        a = convolve(&a, &[1.0, 2.0 * (k2 - 1.0) / d, (1.0 - 2.0 * zeta * k + k2) / d]);
    }
    if order % 2 == 1 {
        let g = k / (1.0 + k);
        b = convolve(&b, &[g, g]);
        a = convolve(&a, &[1.0, (k - 1.0) / (1.0 + k)]);
    }
    (b, a)
}

fn convolve(p: &[f64], q: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; p.len() + q.len() - 1];
    for (i, x) in p.iter().enumerate() {
        for (j, y) in q.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Filter state reached after an infinite run of unit input.
///
/// Solves `(I - Cᵀ) zi = b[1..] - a[1..] · b[0]`, `C` the companion matrix of `a`.
fn steady_state(b: &[f64], a: &[f64]) -> Result<Vec<f64>, EmgError> {
    let m = a.len() - 1;
    let mut mat = vec![vec![0.0; m]; m];
    for (j, row) in mat.iter_mut().enumerate() {
        row[j] = 1.0;
        row[0] += a[j + 1];
        if j + 1 < m {
            row[j + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();
    solve(mat, rhs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut mat: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, EmgError> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&r, &s| mat[r][col].abs().total_cmp(&mat[s][col].abs()))
            .unwrap_or(col);
        if mat[pivot][col].abs() < f64::EPSILON {
            return Err(EmgError::InvalidFilter("état initial singulier".into()));
        }
        mat.swap(col, pivot);
        rhs.swap(col, pivot);
        for r in col + 1..m {
            let f = mat[r][col] / mat[col][col];
            for c in col..m {
                mat[r][c] -= f * mat[col][c];
            }
            rhs[r] -= f * rhs[col];
        }
    }
    let mut x = vec![0.0; m];
    for r in (0..m).rev() {
        let tail: f64 = (r + 1..m).map(|c| mat[r][c] * x[c]).sum();
        x[r] = (rhs[r] - tail) / mat[r][r];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64], tol: f64) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn quarter_band_second_order_matches_closed_form() {
        let f = ButterworthLowpass::new(2, 40.0, 160.0).unwrap();
        let (b, a) = f.coefficients();
        let g = 1.0 / (2.0 + 2f64.sqrt());
        assert!(close(b, &[g, 2.0 * g, g], 1e-12));
        assert!(close(a, &[1.0, 0.0, (2.0 - 2f64.sqrt()) * g], 1e-12));
    }

    #[test]
    fn third_order_matches_reference_design() {
        // Normalized cutoff 0.2.
        let f = ButterworthLowpass::new(3, 16.0, 160.0).unwrap();
        let (b, a) = f.coefficients();
        assert!(close(b, &[0.018_098_933, 0.054_296_799, 0.054_296_799, 0.018_098_933], 1e-8));
        assert!(close(a, &[1.0, -1.760_041_880, 1.182_893_262, -0.278_059_918], 1e-8));
    }

    #[test]
    fn emg_default_design() {
        let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
        let (b, a) = f.coefficients();
        assert!(close(
            b,
            &[7.277_254_9e-5, 2.910_901_97e-4, 4.366_352_96e-4, 2.910_901_97e-4, 7.277_254_9e-5],
            1e-12
        ));
        assert!(close(
            a,
            &[1.0, -3.487_307_742, 4.589_291_232, -2.698_884_391, 0.598_065_262],
            1e-8
        ));
        assert_eq!(f.padlen(), 15);
    }

    #[test]
    fn steady_state_matches_unit_step_response() {
        let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
        let y = f.lfilter(&[1.0; 32], 1.0);
        assert!(y.iter().all(|v| (v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn passes_low_and_rejects_high_frequencies() {
        let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
        let tone = |hz: f64| -> Vec<f64> {
            (0..640u32)
                .map(|t| (2.0 * PI * hz * f64::from(t) / 160.0).sin())
                .collect()
        };
        let low = f.filtfilt(&tone(1.0)).unwrap();
        let peak = low[160..480].iter().fold(0.0f64, |m, v| m.max(*v));
        assert!((peak - 1.0).abs() < 1e-3, "peak {peak}");

        let high = f.filtfilt(&tone(40.0)).unwrap();
        assert!(high[160..480].iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn output_keeps_input_length() {
        let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
        let x: Vec<f64> = (0..16u32).map(f64::from).collect();
        assert_eq!(f.filtfilt(&x).unwrap().len(), 16);
    }

    #[test]
    fn short_signal_is_rejected() {
        let f = ButterworthLowpass::new(4, 5.0, 160.0).unwrap();
        assert_eq!(
            f.filtfilt(&[1.0; 15]),
            Err(EmgError::SignalTooShort { len: 15, padlen: 15 })
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(ButterworthLowpass::new(0, 5.0, 160.0).is_err());
        assert!(ButterworthLowpass::new(4, 80.0, 160.0).is_err());
        assert!(ButterworthLowpass::new(4, 0.0, 160.0).is_err());
        assert!(ButterworthLowpass::new(4, 5.0, f64::NAN).is_err());
    }
}
