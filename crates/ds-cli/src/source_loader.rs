use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

const SCRIPT_EXTENSIONS: [&str; 2] = ["ds", "txt"];

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf> {
    let path = PathBuf::from(scripts_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .context("current directory is not accessible")?
            .join(path)
    };

    if !absolute.exists() {
        bail!("scripts-dir does not exist: {}", absolute.display());
    }
    if !absolute.is_dir() {
        bail!("scripts-dir is not a directory: {}", absolute.display());
    }

    Ok(absolute)
}

/// Walks the directory and reads every script file, keyed by file name the
/// way diagnostics report them.
pub(crate) fn read_sources_from_dir(scripts_dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut sources = BTreeMap::new();

    for entry in WalkDir::new(scripts_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_script = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| SCRIPT_EXTENSIONS.contains(&extension.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_script {
            continue;
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if content.is_empty() {
            continue;
        }

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown source")
            .to_string();
        sources.insert(name, content);
    }

    if sources.is_empty() {
        bail!(
            "no .ds/.txt script files found under {}",
            scripts_dir.display()
        );
    }

    Ok(sources)
}
