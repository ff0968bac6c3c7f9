//! Static coupling discovery for a Python project tree.
//!
//! Without execution traces the best available evidence is naming and
//! imports: `test_x.py` exercises its sibling `x.py`, and every project
//! module a test file imports.

use super::CouplingIndex;
use crate::analyzers::LanguageParser;
use crate::core::DeclarationKind;
use crate::errors::{Result, ResultExt};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Strength of the naming-convention coupling
pub const DIRECT_STRENGTH: f64 = 1.0;
/// Strength of an import-only coupling
pub const IMPORT_STRENGTH: f64 = 0.5;

pub fn is_test_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with("test_") || name.ends_with("_test.py")
}

/// Walk `root` and build a coupling index. Paths and test identifiers are
/// relative to `root`.
pub fn discover(root: &Path, parser: &dyn LanguageParser) -> Result<CouplingIndex> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && parser.handles(e.path()))
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();

    let modules = module_table(&files);
    let mut index = CouplingIndex::new();

    for test_file in files.iter().filter(|f| is_test_file(f)) {
        let full = root.join(test_file);
        let content =
            std::fs::read_to_string(&full).context(format!("reading {}", full.display()))?;

        let names = match parser.test_names(&content, test_file) {
            Ok(names) => names,
            Err(e) => {
                warn!(file = %test_file.display(), error = %e, "skipping unparsable test file");
                continue;
            }
        };
        if names.is_empty() {
            continue;
        }
        let targets = couplings_for(test_file, &content, parser, &modules);

        for name in names {
            let test_id = format!("{}::{}", test_file.display(), name);
            index.register_test(test_id.clone());
            for (file, (strength, symbols)) in &targets {
                index.record(test_id.clone(), file, *strength, symbols.iter().cloned());
            }
        }
        debug!(file = %test_file.display(), targets = targets.len(), "coupled test file");
    }

    info!(tests = index.test_count(), "discovered tests");
    Ok(index)
}

type Targets = BTreeMap<PathBuf, (f64, BTreeSet<String>)>;

fn couplings_for(
    test_file: &Path,
    content: &str,
    parser: &dyn LanguageParser,
    modules: &BTreeMap<String, PathBuf>,
) -> Targets {
    let mut targets = Targets::new();

    if let Some(sibling) = sibling_source(test_file) {
        if modules.values().any(|p| *p == sibling) {
            targets.insert(sibling, (DIRECT_STRENGTH, BTreeSet::new()));
        }
    }

    let imports = match parser.parse(content, test_file) {
        Ok(parsed) => parsed.declarations,
        Err(_) => Vec::new(),
    };
    let package = package_of(test_file);
    for import in imports.iter().filter(|d| d.kind == DeclarationKind::Import) {
        let Some((file, symbol)) = resolve_import(&import.name, &package, modules) else {
            continue;
        };
        if file == test_file {
            continue;
        }
        let entry = targets
            .entry(file)
            .or_insert((IMPORT_STRENGTH, BTreeSet::new()));
        if let Some(symbol) = symbol {
            entry.1.insert(symbol);
        }
    }
    targets
}

/// `dir/test_x.py` → `dir/x.py`, `dir/x_test.py` → `dir/x.py`
fn sibling_source(test_file: &Path) -> Option<PathBuf> {
    let name = test_file.file_name()?.to_str()?;
    let stem = name
        .strip_prefix("test_")
        .and_then(|s| s.strip_suffix(".py"))
        .or_else(|| name.strip_suffix("_test.py"))?;
    Some(test_file.with_file_name(format!("{}.py", stem)))
}

/// Dotted module names for every source file. Each file is reachable by its
/// full dotted path and, when unambiguous, by its bare stem.
fn module_table(files: &[PathBuf]) -> BTreeMap<String, PathBuf> {
    let mut table = BTreeMap::new();
    let mut stems: BTreeMap<String, Vec<&PathBuf>> = BTreeMap::new();

    for file in files {
        let dotted = dotted_name(file);
        if dotted.is_empty() {
            continue;
        }
        table.insert(dotted.clone(), file.clone());
        if let Some(stem) = dotted.rsplit('.').next() {
            stems.entry(stem.to_string()).or_default().push(file);
        }
    }
    for (stem, paths) in stems {
        if let [only] = paths.as_slice() {
            table.entry(stem).or_insert_with(|| (*only).clone());
        }
    }
    table
}

fn dotted_name(file: &Path) -> String {
    let without_ext = file.with_extension("");
    let parts: Vec<String> = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let parts: &[String] = match parts.split_last() {
        Some((last, init)) if last == "__init__" => init,
        _ => &parts,
    };
    parts.join(".")
}

fn package_of(file: &Path) -> Vec<String> {
    file.parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve an import edge (`pkg.mod.name`, `.mod.name`, `mod.*`) to a
/// project file and, when the edge names a member, that member.
fn resolve_import(
    import: &str,
    package: &[String],
    modules: &BTreeMap<String, PathBuf>,
) -> Option<(PathBuf, Option<String>)> {
    let leading_dots = import.chars().take_while(|&c| c == '.').count();
    let rest = &import[leading_dots..];

    let mut parts: Vec<String> = if leading_dots > 0 {
        let keep = package.len().checked_sub(leading_dots - 1)?;
        package[..keep].to_vec()
    } else {
        Vec::new()
    };
    parts.extend(rest.split('.').filter(|s| !s.is_empty()).map(str::to_string));

    // Longest prefix that names a module wins; one remaining segment is a member
    for split in (1..=parts.len()).rev() {
        let candidate = parts[..split].join(".");
        if let Some(file) = modules.get(&candidate) {
            let member = match &parts[split..] {
                [name] if name != "*" => Some(name.clone()),
                _ => None,
            };
            return Some((file.clone(), member));
        }
    }
    None
}
