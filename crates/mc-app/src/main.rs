use anyhow::Result;
use clap::Parser;
use mc_core::config::DatasetConfig;
use mc_core::traits::Dataset;
use mc_dataset::{EmgDataset, EmgRgbDataset, VideoDataset};

pub mod batch;
pub mod cli;
pub mod inspect;

use cli::View;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    cli.validate()?;

    // 3. Charger la config
    let mut config = resolve_config(&cli)?;
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    // 4. Statistiques de segments
    if cli.inspect {
        let stats = inspect::inspect(&config)?;
        print!("{stats}");
        if let Some(path) = cli.stats_out.as_deref() {
            inspect::write_stats(&stats, path)?;
        }
        return Ok(());
    }

    // 5. Construire la vue
    let dataset: Box<dyn Dataset> = match cli.view {
        View::Video => Box::new(VideoDataset::from_config(&config)?),
        View::Emg => Box::new(EmgDataset::from_config(&config)?),
        View::Fused => Box::new(EmgRgbDataset::from_config(&config)?),
    };
    log::info!("Vue {:?} : {} échantillons", cli.view, dataset.len());

    // 6. Passes parallèles, une par époque
    let mut summaries = Vec::new();
    for epoch in 0..cli.epochs {
        let summary = batch::run_pass(dataset.as_ref(), config.seed, epoch, cli.limit);
        println!(
            "Époque {epoch} : {}/{} échantillons construits (graine {})",
            summary.ok, summary.visited, summary.seed
        );
        summaries.push(summary);
    }
    if let Some(path) = cli.out.as_deref() {
        batch::write_summary(&summaries, path)?;
    }
    let failed: usize = summaries.iter().map(|s| s.failures.len()).sum();
    if failed > 0 {
        anyhow::bail!("{failed} échantillons en échec");
    }
    Ok(())
}

fn resolve_config(cli: &cli::Cli) -> Result<DatasetConfig> {
    if cli.config.exists() {
        mc_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(DatasetConfig::default())
    }
}
