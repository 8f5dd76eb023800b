use ndarray::ArrayD;

use crate::modality::Modality;

/// Identifiers attached to a sample when `additional_info` is on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleInfo {
    /// Record uid.
    pub uid: u64,
    /// Untrimmed video name.
    pub video_name: String,
}

/// One training example: modality tensors in insertion order, plus label.
///
/// # Example
/// ```
/// use mc_core::sample::Sample;
/// use mc_core::modality::Modality;
/// use ndarray::{ArrayD, IxDyn};
///
/// let mut sample = Sample::new(Some(3));
/// sample.insert(Modality::Emg, ArrayD::zeros(IxDyn(&[1, 10, 16])));
/// assert_eq!(sample.get(Modality::Emg).unwrap().shape(), &[1, 10, 16]);
/// assert_eq!(sample.modalities().collect::<Vec<_>>(), vec![Modality::Emg]);
/// ```
#[derive(Clone, Debug)]
pub struct Sample {
    tensors: Vec<(Modality, ArrayD<f32>)>,
    /// Class id.
    pub label: Option<u32>,
    /// Diagnostics, filled when the view is built with `additional_info`.
    pub info: Option<SampleInfo>,
}

impl Sample {
    /// Empty sample.
    #[must_use]
    pub fn new(label: Option<u32>) -> Self {
        Self {
            tensors: Vec::new(),
            label,
            info: None,
        }
    }

    /// Add or replace the tensor of `modality`. First insertion fixes its position.
    pub fn insert(&mut self, modality: Modality, tensor: ArrayD<f32>) {
        if let Some(slot) = self.tensors.iter_mut().find(|(m, _)| *m == modality) {
            slot.1 = tensor;
        } else {
            self.tensors.push((modality, tensor));
        }
    }

    /// Tensor of `modality`.
    #[must_use]
    pub fn get(&self, modality: Modality) -> Option<&ArrayD<f32>> {
        self.tensors
            .iter()
            .find(|(m, _)| *m == modality)
            .map(|(_, t)| t)
    }

    /// Modalities in insertion order.
    pub fn modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        self.tensors.iter().map(|(m, _)| *m)
    }

    /// `(modality, tensor)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Modality, &ArrayD<f32>)> {
        self.tensors.iter().map(|(m, t)| (*m, t))
    }

    /// Number of modality tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// `true` if no tensor was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}
