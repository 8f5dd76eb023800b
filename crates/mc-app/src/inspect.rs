use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use mc_core::config::DatasetConfig;
use mc_core::table::{AnnotationRow, load_table, resolve_table};

/// Segment-length totals of an annotation table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentStats {
    /// Rows counted.
    pub count: usize,
    /// Sum of `stop_frame - start_frame`.
    pub sum: usize,
    /// `sum / count`, rounded half to even. 0 for an empty table.
    pub avg: usize,
}

impl SegmentStats {
    /// Totals over `rows`.
    #[must_use]
    pub fn from_rows(rows: &[AnnotationRow]) -> Self {
        let count = rows.len();
        let sum: usize = rows.iter().map(AnnotationRow::segment_len).sum();
        let avg = if count == 0 {
            0
        } else {
            (sum as f64 / count as f64).round_ties_even() as usize
        };
        Self { count, sum, avg }
    }
}

impl fmt::Display for SegmentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sum: {}", self.sum)?;
        writeln!(f, "avg: {}", self.avg)
    }
}

/// Statistics of the annotation table selected by `config`.
///
/// # Errors
/// Returns an error if the table is missing or malformed.
pub fn inspect(config: &DatasetConfig) -> Result<SegmentStats> {
    let path = resolve_table(&config.annotations_path, &config.annotation_table_name())?;
    let rows: Vec<AnnotationRow> = load_table(&path)?;
    let stats = SegmentStats::from_rows(&rows);
    log::info!("{} : {} segments", path.display(), stats.count);
    Ok(stats)
}

/// Écrit `sum: N\navg: M\n`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_stats(stats: &SegmentStats, path: &Path) -> Result<()> {
    std::fs::write(path, stats.to_string())
        .with_context(|| format!("Impossible d'écrire {}", path.display()))
}
