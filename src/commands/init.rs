use crate::config::CONFIG_FILE_NAME;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"# testimpact configuration

[selection]
threshold = 0.7
min_tests = 5
max_tests = 100
coverage_target = 0.85
# time_budget_secs = 120.0

[scoring]
probability = 0.40
impact = 0.30
historical = 0.15
recent = 0.15

[model]
family = "random_forest"
n_estimators = 100
max_depth = 10
seed = 42
min_training_samples = 50
synthesize_when_empty = true

[coupling]
file_level_impact = 0.5

[data]
history_file = ".testimpact/history.jsonl"
model_dir = ".testimpact/models"
coupling_file = ".testimpact/coupling.json"
"#;

pub fn init_config(root: &Path, force: bool) -> Result<PathBuf> {
    let config_path = root.join(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!("Configuration file already exists. Use --force to overwrite.");
    }

    std::fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Created {} configuration file", config_path.display());

    Ok(config_path)
}
