use std::fs;
use std::path::{Path, PathBuf};

use super::core::SelectorConfig;
use super::scoring::FusionWeights;
use crate::errors::{Error, Result, ResultExt};

/// File name searched for in the working directory and its ancestors
pub const CONFIG_FILE_NAME: &str = ".testimpact.toml";

/// Parse and validate config from a TOML string
pub fn parse_and_validate_config(contents: &str) -> Result<SelectorConfig> {
    let mut config = toml::from_str::<SelectorConfig>(contents)?;

    // Invalid fusion weights fall back to defaults; valid ones are normalized
    if let Err(e) = config.scoring.validate() {
        tracing::warn!("Invalid fusion weights: {}. Using defaults.", e);
        config.scoring = FusionWeights::default();
    } else {
        config.scoring.normalize();
    }

    config.validate().map_err(Error::Config)?;
    Ok(config)
}

/// Load an explicitly named config file. Errors are not swallowed.
pub fn load_config_from_path(path: &Path) -> Result<SelectorConfig> {
    let contents = fs::read_to_string(path).context(format!("reading {}", path.display()))?;
    parse_and_validate_config(&contents).context(format!("loading {}", path.display()))
}

fn try_load_config_from_path(config_path: &Path) -> Option<SelectorConfig> {
    let contents = match fs::read_to_string(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            // Only log actual errors, not "file not found"
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config file {}: {}", config_path.display(), e);
            }
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            tracing::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            tracing::warn!("{}: {}. Using defaults.", config_path.display(), e);
            None
        }
    }
}

/// Directory ancestors of `start`, nearest first, up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Search the current directory and its ancestors for `.testimpact.toml`.
pub fn load_config() -> SelectorConfig {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(&dir),
        Err(e) => {
            tracing::warn!("Failed to get current directory: {}. Using default config.", e);
            SelectorConfig::default()
        }
    }
}

/// Search `start` and its ancestors for `.testimpact.toml`.
pub fn load_config_from(start: &Path) -> SelectorConfig {
    const MAX_TRAVERSAL_DEPTH: usize = 10;

    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            tracing::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            SelectorConfig::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelFamily;
    use indoc::indoc;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_and_validate_config(indoc! {r#"
            [selection]
            min_tests = 3
            time_budget_secs = 30.0

            [model]
            family = "gradient_boosting"
        "#})
        .unwrap();
        assert_eq!(config.selection.min_tests, 3);
        assert_eq!(config.selection.max_tests, 100);
        assert_eq!(config.selection.time_budget_secs, Some(30.0));
        assert_eq!(config.model.family, ModelFamily::GradientBoosting);
        assert_eq!(config.model.min_training_samples, 50);
    }

    #[test]
    fn test_invalid_weights_fall_back_to_defaults() {
        let config = parse_and_validate_config(indoc! {r#"
            [scoring]
            probability = 4.0
        "#})
        .unwrap();
        assert_eq!(config.scoring, FusionWeights::default());
    }

    #[test]
    fn test_contradictory_selection_is_config_error() {
        let err = parse_and_validate_config(indoc! {r#"
            [selection]
            min_tests = 20
            max_tests = 10
        "#})
        .unwrap_err();
        assert_eq!(err.code(), "E021");
    }

    #[test]
    fn test_ancestors_are_bounded() {
        let dirs: Vec<_> = directory_ancestors(PathBuf::from("/a/b/c/d"), 2).collect();
        assert_eq!(dirs, vec![PathBuf::from("/a/b/c/d"), PathBuf::from("/a/b/c")]);
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[coupling]\nfile_level_impact = 0.25\n").unwrap();
        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.coupling.file_level_impact, 0.25);
    }
}
