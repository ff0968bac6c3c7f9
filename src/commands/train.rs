use crate::config::{ModelFamily, SelectorConfig};
use crate::model::{RiskModel, TrainingBudget};
use crate::orchestrator::Orchestrator;
use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Table};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct TrainConfig {
    pub family: Option<ModelFamily>,
    pub max_iterations: Option<usize>,
    pub max_secs: Option<f64>,
}

pub fn handle_train(root: &Path, mut config: SelectorConfig, train: TrainConfig) -> Result<Arc<RiskModel>> {
    if let Some(family) = train.family {
        config.model.family = family;
    }
    let mut budget = TrainingBudget::from_config(&config.model);
    if train.max_iterations.is_some() {
        budget.max_iterations = train.max_iterations;
    }
    if let Some(secs) = train.max_secs.filter(|s| s.is_finite() && *s > 0.0) {
        budget.max_duration = Some(Duration::from_secs_f64(secs));
    }

    let orchestrator = Orchestrator::open(config, root).context("Failed to open project data")?;
    let model = orchestrator
        .retrain(budget)
        .context("Training failed; the previous model is unchanged")?;

    println!("{}", render_model(&model));
    Ok(model)
}

pub fn render_model(model: &RiskModel) -> Table {
    let meta = model.metadata();
    let v = &meta.validation;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new(format!("Risk model v{}", model.version()).bold().to_string()),
        Cell::new(model.family().to_string()),
    ]);
    table.add_row(vec!["Schema".to_string(), model.schema().to_string()]);
    table.add_row(vec![
        "Samples (train / validation)".to_string(),
        format!("{} / {}", meta.training_samples, meta.validation_samples),
    ]);
    table.add_row(vec!["Accuracy".to_string(), format!("{:.3}", v.accuracy)]);
    table.add_row(vec!["Precision".to_string(), format!("{:.3}", v.precision)]);
    table.add_row(vec!["Recall".to_string(), format!("{:.3}", v.recall)]);
    table.add_row(vec!["F1".to_string(), format!("{:.3}", v.f1)]);
    table.add_row(vec![
        "ROC AUC".to_string(),
        v.roc_auc.map_or_else(|| "n/a".to_string(), |auc| format!("{:.3}", auc)),
    ]);
    table.add_row(vec!["Training time".to_string(), format!("{} ms", meta.training_millis)]);

    if let Some(importance) = &meta.feature_importance {
        let mut ranked = importance.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (name, value) in ranked.into_iter().take(5) {
            table.add_row(vec![format!("  {}", name), format!("{:.3}", value)]);
        }
    }
    table
}
