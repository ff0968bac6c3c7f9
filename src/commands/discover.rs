use crate::analyzers::PythonParser;
use crate::config::SelectorConfig;
use crate::coupling::{discover, CouplingIndex};
use anyhow::{Context, Result};
use std::path::Path;

/// Scan `project` and write the coupling index to the configured file.
pub fn discover_coupling(root: &Path, config: &SelectorConfig, project: &Path) -> Result<CouplingIndex> {
    let index = discover(project, &PythonParser::new())
        .with_context(|| format!("Failed to scan {}", project.display()))?;

    let path = root.join(&config.data.coupling_file);
    index.save(&path)?;

    let edges = index.edges().len();
    println!(
        "Discovered {} tests with {} couplings, written to {}",
        index.test_count(),
        edges,
        path.display()
    );
    Ok(index)
}
