//! Source discovery with `include_patterns` / `exclude_patterns`.

use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use refman::config::BuildConfig;
use refman::matching::{get_matching_files, has_wildcard, normalize_path, pattern_match, translate_pattern};
use refman::python_config::PythonConfigParser;

fn names(base: &Path, files: &[PathBuf]) -> Vec<String> {
    let base = base.canonicalize().unwrap();
    files
        .iter()
        .map(|p| normalize_path(p.strip_prefix(&base).unwrap()))
        .collect()
}

fn docs_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    for path in [
        "index.rst",
        "algorithms/cut_rewriting.rst",
        "algorithms/refactoring.rst",
        "networks/aig.rst",
        "_build/html/index.html",
        "doxyxml/xml/namespacemockturtle.xml",
        "drafts/mapping.rst",
        "Thumbs.db",
    ] {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, "content").unwrap();
    }
    dir
}

#[test]
fn test_default_patterns() {
    let config = BuildConfig::default();
    assert_eq!(config.include_patterns, vec!["**"]);
    assert!(config.exclude_patterns.is_empty());
}

#[test]
fn test_translation() {
    assert_eq!(translate_pattern("**"), "^.*$");
    assert_eq!(translate_pattern("algorithms/*.rst"), "^algorithms/[^/]*\\.rst$");
    assert_eq!(translate_pattern("**/index.rst"), "^(?:[^/]+/)*index\\.rst$");
    assert_eq!(translate_pattern("[!_]*.rst"), "^[^_][^/]*\\.rst$");
}

#[test]
fn test_matching() {
    assert!(pattern_match("algorithms/cut_rewriting.rst", "algorithms/*.rst").unwrap());
    assert!(!pattern_match("algorithms/detail/cuts.rst", "algorithms/*.rst").unwrap());
    assert!(pattern_match("algorithms/detail/cuts.rst", "algorithms/**").unwrap());
    assert!(pattern_match("networks/aig.rst", "**/aig.rst").unwrap());
    assert!(pattern_match("aig.rst", "**/aig.rst").unwrap());
    assert!(pattern_match("v1.rst", "v?.rst").unwrap());
    assert!(!pattern_match("v10.rst", "v?.rst").unwrap());
    assert!(pattern_match("a.rst", "[abc].rst").unwrap());
    assert!(!pattern_match("_private.rst", "[!_]*.rst").unwrap());
}

#[test]
fn test_only_rst_sources() {
    let dir = docs_tree();
    let files = get_matching_files(dir.path(), &["**/*.rst".to_string()], &["_build/**".to_string()]).unwrap();
    assert_eq!(
        names(dir.path(), &files),
        vec![
            "algorithms/cut_rewriting.rst",
            "algorithms/refactoring.rst",
            "drafts/mapping.rst",
            "index.rst",
            "networks/aig.rst",
        ]
    );
}

#[test]
fn test_exclude_wins_over_include() {
    let dir = docs_tree();
    let files = get_matching_files(
        dir.path(),
        &["**".to_string()],
        &[
            "_build".to_string(),
            "_build/**".to_string(),
            "drafts/**".to_string(),
            "doxyxml/**".to_string(),
            "Thumbs.db".to_string(),
        ],
    )
    .unwrap();
    assert_eq!(
        names(dir.path(), &files),
        vec![
            "algorithms/cut_rewriting.rst",
            "algorithms/refactoring.rst",
            "index.rst",
            "networks/aig.rst",
        ]
    );
}

#[test]
fn test_include_single_directory() {
    let dir = docs_tree();
    let files = get_matching_files(dir.path(), &["algorithms/**".to_string()], &[]).unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn test_patterns_from_conf_py() {
    let dir = TempDir::new().unwrap();
    let conf = dir.path().join("conf.py");
    fs::write(
        &conf,
        r#"
project = 'mockturtle'
include_patterns = ['index.rst', 'algorithms/**']
exclude_patterns = ['_build', 'Thumbs.db', '.DS_Store']
"#,
    )
    .unwrap();

    let config = PythonConfigParser::new()
        .parse_file(&conf)
        .unwrap()
        .into_build_config()
        .unwrap();
    assert_eq!(config.include_patterns, vec!["index.rst", "algorithms/**"]);
    assert_eq!(config.exclude_patterns, vec!["_build", "Thumbs.db", ".DS_Store"]);
}

#[test]
fn test_backslash_paths_are_normalized() {
    let normalized = normalize_path(Path::new("networks\\aig.rst"));
    assert_eq!(normalized, "networks/aig.rst");
    assert!(pattern_match(&normalized, "networks/*.rst").unwrap());
}

proptest! {
    #[test]
    fn prop_literal_names_match_themselves(name in "[a-z0-9_]{1,8}(/[a-z0-9_]{1,8}){0,3}") {
        prop_assert!(!has_wildcard(&name));
        prop_assert!(pattern_match(&name, &name).unwrap());
    }

    #[test]
    fn prop_single_star_stays_in_one_directory(dir in "[a-z]{1,8}", file in "[a-z]{1,8}") {
        let nested = format!("{}/{}.rst", dir, file);
        let flat = format!("{}.rst", file);
        prop_assert!(pattern_match(&flat, "*.rst").unwrap());
        prop_assert!(!pattern_match(&nested, "*.rst").unwrap());
        prop_assert!(pattern_match(&nested, "**/*.rst").unwrap());
    }
}
