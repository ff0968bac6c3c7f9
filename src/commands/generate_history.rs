use crate::config::SelectorConfig;
use crate::coupling::CouplingIndex;
use crate::history::HistoryStore;
use crate::synthetic::HistoryGenerator;
use anyhow::{Context, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct GenerateSummary {
    pub runs: usize,
    pub entries: usize,
    pub failures: usize,
    pub first_run: u64,
}

/// Append `runs` synthetic runs after the last recorded run and merge the
/// sample project's coupling into the coupling file.
pub fn generate_history(
    root: &Path,
    config: &SelectorConfig,
    runs: usize,
    seed: Option<u64>,
) -> Result<GenerateSummary> {
    let history_path = root.join(&config.data.history_file);
    let store = HistoryStore::open(&history_path)
        .with_context(|| format!("Failed to open history {}", history_path.display()))?;

    let first_run = store.next_run_index();
    let generated = HistoryGenerator::new(seed.unwrap_or(config.model.seed)).generate(runs, first_run);
    let entries = generated
        .load_into(&store)
        .context("Failed to append synthetic history")?;

    let coupling_path = root.join(&config.data.coupling_file);
    let mut coupling = if coupling_path.exists() {
        CouplingIndex::load(&coupling_path)?
    } else {
        CouplingIndex::new()
    };
    for edge in generated.coupling.edges() {
        coupling.record(edge.test, &edge.file, edge.strength, edge.symbols);
    }
    coupling.save(&coupling_path)?;

    let summary = GenerateSummary {
        runs,
        entries,
        failures: generated.failure_count(),
        first_run,
    };
    println!(
        "Generated {} runs ({} entries, {:.2}% pass rate) starting at run {}",
        summary.runs,
        summary.entries,
        pass_rate(&summary),
        summary.first_run
    );
    Ok(summary)
}

fn pass_rate(summary: &GenerateSummary) -> f64 {
    if summary.entries == 0 {
        return 0.0;
    }
    (summary.entries - summary.failures) as f64 / summary.entries as f64 * 100.0
}
