use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Which dataset view to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum View {
    /// Annotated video segments (frames or precomputed features).
    Video,
    /// EMG recordings only.
    Emg,
    /// EMG recordings with precomputed RGB features.
    Fused,
}

/// myoclip — préparation d'échantillons vidéo égocentrique + EMG.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Vue à construire : video, emg, fused.
    #[arg(long, value_enum, default_value_t = View::Video)]
    pub view: View,

    /// Graine de la passe (remplace `dataset.seed`).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Ne traiter que les N premiers échantillons.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Nombre de passes ; chaque époque tire de nouveaux clips.
    #[arg(long, default_value_t = 1)]
    pub epochs: u64,

    /// Écrire le résumé JSON de la passe dans ce fichier.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Afficher les statistiques de longueur des segments au lieu de la passe.
    #[arg(long, default_value_t = false)]
    pub inspect: bool,

    /// Fichier texte des statistiques (`sum: N` / `avg: M`), avec --inspect.
    #[arg(long)]
    pub stats_out: Option<PathBuf>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Reject flag combinations that make no sense.
    ///
    /// # Errors
    /// Returns an error if `--stats-out` is given without `--inspect`, or
    /// `--limit 0` or `--epochs 0`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stats_out.is_some() && !self.inspect {
            anyhow::bail!("--stats-out requiert --inspect.");
        }
        if self.limit == Some(0) {
            anyhow::bail!("--limit doit être ≥ 1.");
        }
        if self.epochs == 0 {
            anyhow::bail!("--epochs doit être ≥ 1.");
        }
        Ok(())
    }
}
