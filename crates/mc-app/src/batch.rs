use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use mc_core::sample::Sample;
use mc_core::traits::Dataset;
use rayon::prelude::*;
use serde::Serialize;

/// Seed of the generator handed to `get(index)` in pass `epoch`.
///
/// Depends only on its inputs, never on scheduling. The same `(seed, epoch)`
/// redraws the same clips; a new epoch draws new ones.
#[must_use]
pub fn index_seed(seed: u64, epoch: u64, index: usize) -> u64 {
    seed ^ epoch.wrapping_mul(0xD1B5_4A32_D192_ED03)
        ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// A sample that could not be built.
#[derive(Debug, Serialize)]
pub struct Failure {
    /// Dataset index.
    pub index: usize,
    /// Full error chain.
    pub error: String,
}

/// Outcome of one pass over a view.
#[derive(Debug, Default, Serialize)]
pub struct PassSummary {
    /// Seed of the pass.
    pub seed: u64,
    /// Epoch number, from 0.
    pub epoch: u64,
    /// Indices visited.
    pub visited: usize,
    /// Samples built.
    pub ok: usize,
    /// Tensor shapes seen per modality, with counts.
    pub shapes: BTreeMap<String, BTreeMap<String, usize>>,
    /// Samples per label (`"none"` when unlabelled).
    pub labels: BTreeMap<String, usize>,
    /// Failed indices, in index order.
    pub failures: Vec<Failure>,
}

/// What the pass keeps of one index once its sample is dropped.
#[derive(Debug)]
enum Outcome {
    Built {
        shapes: Vec<(String, String)>,
        label: String,
    },
    Failed(String),
}

impl Outcome {
    fn of(result: Result<Sample>) -> Self {
        match result {
            Ok(sample) => Self::Built {
                shapes: sample
                    .iter()
                    .map(|(m, t)| (m.to_string(), format!("{:?}", t.shape())))
                    .collect(),
                label: sample.label.map_or_else(|| "none".to_string(), |l| l.to_string()),
            },
            Err(e) => Self::Failed(format!("{e:#}")),
        }
    }
}

/// Build samples `0..n` in parallel and hand each result to `digest` on the
/// worker that built it. Results come back in index order.
fn visit<T, F>(dataset: &dyn Dataset, seed: u64, epoch: u64, n: usize, digest: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, Result<Sample>) -> T + Sync,
{
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut rng = fastrand::Rng::with_seed(index_seed(seed, epoch, i));
            digest(i, dataset.get(i, &mut rng))
        })
        .collect()
}

/// Build samples `0..limit` of `dataset` in parallel for pass `epoch`.
///
/// Samples are reduced to their shapes and label as soon as they are built,
/// so memory stays bounded by the number of worker threads.
pub fn run_pass(dataset: &dyn Dataset, seed: u64, epoch: u64, limit: Option<usize>) -> PassSummary {
    let n = limit.map_or(dataset.len(), |l| l.min(dataset.len()));
    let outcomes = visit(dataset, seed, epoch, n, |_, result| Outcome::of(result));

    let mut summary = PassSummary {
        seed,
        epoch,
        visited: n,
        ..PassSummary::default()
    };
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Outcome::Built { shapes, label } => {
                summary.ok += 1;
                for (modality, shape) in shapes {
                    *summary
                        .shapes
                        .entry(modality)
                        .or_default()
                        .entry(shape)
                        .or_default() += 1;
                }
                *summary.labels.entry(label).or_default() += 1;
            }
            Outcome::Failed(error) => {
                log::warn!("Échantillon {index} : {error}");
                summary.failures.push(Failure { index, error });
            }
        }
    }
    log::info!(
        "Passe {epoch} terminée : {}/{} échantillons",
        summary.ok,
        summary.visited
    );
    summary
}

/// Écrit les résumés JSON, un par époque.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_summary(summaries: &[PassSummary], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summaries).context("Sérialisation du résumé")?;
    std::fs::write(path, json).with_context(|| format!("Impossible d'écrire {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::modality::Modality;
    use ndarray::{ArrayD, IxDyn};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns one random value per sample; odd indices fail.
    struct Draws;

    impl Dataset for Draws {
        fn len(&self) -> usize {
            40
        }

        fn get(&self, index: usize, rng: &mut fastrand::Rng) -> Result<Sample> {
            if index % 2 == 1 {
                anyhow::bail!("impair");
            }
            let mut sample = Sample::new(Some((index % 3) as u32));
            let v = ArrayD::from_elem(IxDyn(&[1]), rng.f32());
            sample.insert(Modality::Emg, v);
            Ok(sample)
        }
    }

    /// Large samples; counts how many are alive between `get` and digest.
    #[derive(Default)]
    struct Heavy {
        built: AtomicUsize,
        released: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Dataset for Heavy {
        fn len(&self) -> usize {
            64
        }

        fn get(&self, _index: usize, _rng: &mut fastrand::Rng) -> Result<Sample> {
            let built = self.built.fetch_add(1, Ordering::SeqCst) + 1;
            let live = built.saturating_sub(self.released.load(Ordering::SeqCst));
            self.peak.fetch_max(live, Ordering::SeqCst);
            let mut sample = Sample::new(Some(0));
            sample.insert(Modality::Rgb, ArrayD::from_elem(IxDyn(&[16, 3, 32, 32]), 1.0));
            Ok(sample)
        }
    }

    #[test]
    fn pass_counts_shapes_labels_and_failures() {
        let summary = run_pass(&Draws, 1, 0, Some(10));
        assert_eq!(summary.visited, 10);
        assert_eq!(summary.ok, 5);
        assert_eq!(summary.failures.len(), 5);
        assert_eq!(summary.failures[0].index, 1);
        assert_eq!(summary.failures[4].index, 9);
        assert_eq!(summary.shapes["EMG"]["[1]"], 5);
        // Even indices 0..10 → labels 0, 2, 1, 0, 2.
        assert_eq!(summary.labels["0"], 2);
        assert_eq!(summary.labels["1"], 1);
        assert_eq!(summary.labels["2"], 2);
    }

    #[test]
    fn samples_are_released_as_they_are_built() {
        let dataset = Heavy::default();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let outcomes = pool.install(|| {
            visit(&dataset, 0, 0, 64, |_, result| {
                let outcome = Outcome::of(result);
                dataset.released.fetch_add(1, Ordering::SeqCst);
                outcome
            })
        });
        assert_eq!(outcomes.len(), 64);
        assert!(matches!(&outcomes[63], Outcome::Built { label, .. } if label == "0"));
        assert!(dataset.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn per_index_seeds_make_the_pass_reproducible() {
        let mut rng_a = fastrand::Rng::with_seed(index_seed(5, 0, 4));
        let mut rng_b = fastrand::Rng::with_seed(index_seed(5, 0, 4));
        let a = Draws.get(4, &mut rng_a).unwrap();
        let b = Draws.get(4, &mut rng_b).unwrap();
        assert_eq!(a.get(Modality::Emg), b.get(Modality::Emg));
        assert_ne!(index_seed(5, 0, 4), index_seed(5, 0, 6));
        assert_ne!(index_seed(5, 0, 4), index_seed(6, 0, 4));
    }

    #[test]
    fn each_epoch_draws_new_samples() {
        let value = |epoch| {
            let mut rng = fastrand::Rng::with_seed(index_seed(5, epoch, 4));
            Draws.get(4, &mut rng).unwrap().get(Modality::Emg).unwrap()[[0]]
        };
        assert_eq!(value(1), value(1));
        assert_ne!(value(0), value(1));
        assert_ne!(value(1), value(2));
    }

    #[test]
    fn limit_is_clamped_to_length() {
        assert_eq!(run_pass(&Draws, 0, 0, Some(1000)).visited, 40);
        assert_eq!(run_pass(&Draws, 0, 0, None).visited, 40);
    }

    #[test]
    fn summary_is_written_as_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("summary.json");
        let summaries = [run_pass(&Draws, 3, 0, Some(2)), run_pass(&Draws, 3, 1, Some(2))];
        write_summary(&summaries, &path).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value[0]["ok"], 1);
        assert_eq!(value[0]["seed"], 3);
        assert_eq!(value[1]["epoch"], 1);
    }
}
