use crate::analyzers::{patch::parse_unified_diff, ChangeAnalyzer};
use crate::cli::SelectArgs;
use crate::config::SelectorConfig;
use crate::core::ChangeSet;
use crate::orchestrator::{Orchestrator, SelectionOutcome};
use crate::priority::{Constraints, PriorityBand};
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use std::io::Write;
use std::path::Path;

/// Build the change set from whichever input the arguments name.
pub fn read_change_set(args: &SelectArgs) -> Result<ChangeSet> {
    if let (Some(old), Some(new)) = (&args.old_dir, &args.new_dir) {
        return ChangeAnalyzer::python()
            .analyze_directories(old, new)
            .with_context(|| format!("Failed to compare {} and {}", old.display(), new.display()));
    }
    if let Some(diff) = &args.diff {
        let patch = std::fs::read_to_string(diff)
            .with_context(|| format!("Failed to read diff {}", diff.display()))?;
        return Ok(parse_unified_diff(&patch));
    }
    if !args.changed.is_empty() {
        return Ok(ChangeSet::from_changed_paths(&args.changed));
    }
    Ok(ChangeSet::empty())
}

fn constraints_for(config: &SelectorConfig, args: &SelectArgs) -> Constraints {
    let mut constraints = Constraints::from_config(&config.selection);
    if let Some(min) = args.min_tests {
        constraints.min_tests = min;
    }
    if let Some(max) = args.max_tests {
        constraints.max_tests = max;
    }
    if let Some(threshold) = args.threshold {
        constraints.threshold = threshold;
    }
    if args.time_budget.is_some() {
        constraints.time_budget = args.time_budget;
    }
    constraints
}

pub fn handle_select(root: &Path, config: SelectorConfig, args: &SelectArgs) -> Result<SelectionOutcome> {
    let change_set = read_change_set(args)?;
    for degraded in change_set.degraded_files() {
        tracing::warn!(
            file = %degraded.path.display(),
            reason = degraded.degraded.as_deref().unwrap_or("unknown"),
            "scoring file as wholly changed"
        );
    }

    let constraints = constraints_for(&config, args);
    let orchestrator = Orchestrator::open(config, root).context("Failed to open project data")?;
    let outcome = orchestrator
        .select_with(&change_set, &constraints)
        .context("Test selection failed")?;

    write_selected(&outcome, args.output.as_deref())?;
    if let Some(json) = &args.json {
        let body = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(json, body).with_context(|| format!("Failed to write {}", json.display()))?;
    }
    if !args.quiet {
        eprintln!("{}", render_summary(&outcome));
    }
    Ok(outcome)
}

fn write_selected(outcome: &SelectionOutcome, output: Option<&Path>) -> Result<()> {
    let mut body = outcome.result.selected.join("\n");
    body.push('\n');
    match output {
        Some(path) => std::fs::write(path, body).with_context(|| format!("Failed to write {}", path.display())),
        None => {
            std::io::stdout().write_all(body.as_bytes())?;
            Ok(())
        }
    }
}

fn band_label(band: PriorityBand) -> String {
    match band {
        PriorityBand::High => "HIGH".red().bold().to_string(),
        PriorityBand::Medium => "MEDIUM".yellow().to_string(),
        PriorityBand::Low => "LOW".green().to_string(),
    }
}

pub fn render_summary(outcome: &SelectionOutcome) -> Table {
    let result = &outcome.result;
    let summary = &result.summary;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Rank", "Test", "Score", "Band", "Reason", "Decision"]);
    for decision in result.trace.iter().filter(|d| d.included) {
        let Some(score) = result.scores.get(&decision.test_id) else {
            continue;
        };
        table.add_row(vec![
            decision.rank.to_string(),
            decision.test_id.clone(),
            format!("{:.3}", score.value),
            band_label(score.band()),
            score.reason.to_string(),
            format!("{:?}", decision.reason),
        ]);
    }

    let binding = result
        .binding_constraint
        .map_or_else(|| "none".to_string(), |b| b.to_string());
    table.add_row(vec![
        String::new(),
        format!(
            "{} of {} tests ({:.1}% reduction), model v{}, bound by {}",
            summary.selected_tests,
            summary.total_tests,
            summary.reduction_percentage,
            outcome.model_version,
            binding
        ),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
    ]);
    table.add_row(vec![
        String::new(),
        format!(
            "time {:.2}s of {:.2}s, saved {:.2}s ({:.1}%), coverage {:.1}%",
            summary.total_time_selected,
            summary.total_time_all,
            summary.time_saved,
            summary.time_reduction_percentage,
            result.projected_coverage * 100.0
        ),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
    ]);
    table
}
