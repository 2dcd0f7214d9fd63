//! Path, naming and file-system helpers.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Convert text to an identifier usable as an HTML anchor.
pub fn make_id(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || matches!(c, '-' | '_' | '.' | ':' | '/') {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Reference-name normalization: lowercase, whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Docname of a source file: relative path without suffix, '/'-separated.
pub fn docname_for(source_dir: &Path, file: &Path, suffixes: &[String]) -> Option<String> {
    let relative = file.strip_prefix(source_dir).ok()?;
    let relative = relative.to_string_lossy().replace('\\', "/");
    suffixes
        .iter()
        .find_map(|suffix| relative.strip_suffix(suffix.as_str()))
        .map(str::to_string)
}

/// Resolve a `:doc:`/toctree target relative to the referencing document.
/// Absolute targets start with '/'.
pub fn resolve_docname(current: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_docname(absolute);
    }
    let base = match current.rfind('/') {
        Some(pos) => &current[..pos + 1],
        None => "",
    };
    normalize_docname(&format!("{}{}", base, target))
}

fn normalize_docname(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Prefix leading from a document's output directory back to the root.
pub fn root_prefix(docname: &str) -> String {
    "../".repeat(docname.matches('/').count())
}

/// Relative URI from the page of `from_doc` to `target` (a root-relative
/// output path such as `algorithms/index.html`).
pub fn relative_uri(from_doc: &str, target: &str) -> String {
    let from_dir = match from_doc.rfind('/') {
        Some(pos) => Path::new(&from_doc[..pos]).to_path_buf(),
        None => PathBuf::new(),
    };
    match pathdiff::diff_paths(Path::new(target), &from_dir) {
        Some(path) => path.to_string_lossy().replace('\\', "/"),
        None => target.to_string(),
    }
}

/// Total size in bytes of the files below `dir`
pub async fn calculate_directory_size(dir: &Path) -> Result<u64> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    })
    .await
    .context("Failed to measure output directory")
}

/// Copy the contents of `src` into `dest`, skipping anything under `exclude`.
pub async fn copy_dir_recursive(src: &Path, dest: &Path, exclude: Option<&Path>) -> Result<()> {
    let entries: Vec<_> = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| exclude.is_none_or(|ex| !e.path().starts_with(ex)))
        .collect::<Result<_, _>>()
        .with_context(|| format!("Failed to walk {}", src.display()))?;

    for entry in entries {
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(&target)
                .await
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(entry.path(), &target)
                .await
                .with_context(|| {
                    format!("Failed to copy {} to {}", entry.path().display(), target.display())
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id() {
        assert_eq!(make_id("Getting Started"), "getting-started");
        assert_eq!(make_id("cut_rewriting"), "cut-rewriting");
        assert_eq!(make_id("Action.button"), "action-button");
        assert_eq!(make_id("  What's new?  "), "whats-new");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Some   Label "), "some label");
    }

    #[test]
    fn test_docname_for() {
        let suffixes = vec![".rst".to_string(), ".md".to_string()];
        assert_eq!(
            docname_for(Path::new("/docs"), Path::new("/docs/algorithms/mig.rst"), &suffixes),
            Some("algorithms/mig".to_string())
        );
        assert_eq!(
            docname_for(Path::new("/docs"), Path::new("/docs/README.txt"), &suffixes),
            None
        );
    }

    #[test]
    fn test_resolve_docname() {
        assert_eq!(resolve_docname("algorithms/index", "mig"), "algorithms/mig");
        assert_eq!(resolve_docname("algorithms/index", "../networks"), "networks");
        assert_eq!(resolve_docname("algorithms/index", "/index"), "index");
        assert_eq!(resolve_docname("index", "./intro"), "intro");
    }

    #[test]
    fn test_relative_uri() {
        assert_eq!(root_prefix("index"), "");
        assert_eq!(root_prefix("algorithms/mig"), "../");
        assert_eq!(relative_uri("index", "algorithms/mig.html"), "algorithms/mig.html");
        assert_eq!(relative_uri("algorithms/mig", "index.html"), "../index.html");
        assert_eq!(relative_uri("algorithms/mig", "algorithms/cut.html"), "cut.html");
    }

    #[tokio::test]
    async fn test_copy_dir_recursive_with_exclusion() {
        let src = tempfile::TempDir::new().unwrap();
        let dest = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("css")).unwrap();
        std::fs::create_dir_all(src.path().join("skip")).unwrap();
        std::fs::write(src.path().join("css/site.css"), "body{}").unwrap();
        std::fs::write(src.path().join("skip/x.txt"), "x").unwrap();

        let skip = src.path().join("skip");
        copy_dir_recursive(src.path(), dest.path(), Some(&skip)).await.unwrap();

        assert!(dest.path().join("css/site.css").is_file());
        assert!(!dest.path().join("skip").exists());
        assert_eq!(calculate_directory_size(dest.path()).await.unwrap(), 6);
    }
}
