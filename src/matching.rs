//! Glob patterns over docnames and source paths.
//!
//! Patterns follow Sphinx's `util/matching.py`: `**` crosses directory
//! separators, `*` and `?` do not, `[seq]`/`[!seq]` are character classes.
//! The same patterns drive source discovery (`include_patterns`,
//! `exclude_patterns`) and the keys of `html_sidebars`.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

use crate::error::BuildError;

lazy_static::lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

/// Translate a glob pattern into an anchored regular expression.
pub fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < n {
        match chars[i] {
            '*' if i + 1 < n && chars[i + 1] == '*' => {
                if i + 2 < n && chars[i + 2] == '/' {
                    out.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push('[');
                    let mut k = i + 1;
                    if matches!(chars[k], '!' | '^') {
                        out.push('^');
                        k += 1;
                    }
                    while k < end {
                        if chars[k] == '\\' && k + 1 < end {
                            out.push('\\');
                            out.push(chars[k + 1]);
                            k += 2;
                        } else {
                            out.push(chars[k]);
                            k += 1;
                        }
                    }
                    out.push(']');
                    i = end + 1;
                }
                None => {
                    out.push_str("\\[");
                    i += 1;
                }
            },
            c => {
                if matches!(c, '\\' | '.' | '^' | '$' | '+' | '{' | '}' | '|' | '(' | ')' | ']') {
                    out.push('\\');
                }
                out.push(c);
                i += 1;
            }
        }
    }

    format!("^{}$", out)
}

/// Index of the `]` closing the class opened at `start`, if any.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if j < chars.len() && matches!(chars[j], '!' | '^') {
        j += 1;
    }
    if j < chars.len() && chars[j] == ']' {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    (j < chars.len()).then_some(j)
}

/// Compile a pattern, reusing earlier compilations.
pub fn compile_pattern(pattern: &str) -> Result<Regex, BuildError> {
    let mut cache = PATTERN_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&translate_pattern(pattern)).map_err(|source| BuildError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Match `name` against a glob pattern
pub fn pattern_match(name: &str, pattern: &str) -> Result<bool, BuildError> {
    Ok(compile_pattern(pattern)?.is_match(name))
}

/// Whether a pattern contains glob metacharacters.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// A compiled list of patterns; matches when any member matches.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    regexes: Vec<Regex>,
}

impl PatternSet {
    /// Compile a set of glob patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, BuildError> {
        let regexes = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { regexes })
    }

    /// Whether any pattern matches `name`
    pub fn is_match(&self, name: &str) -> bool {
        self.regexes.iter().any(|r| r.is_match(name))
    }

    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }
}

/// Forward-slash form of a relative path.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Files under `dirname` that match an include pattern and no exclude
/// pattern, sorted. An empty include list means `**`.
pub fn get_matching_files<P: AsRef<Path>>(
    dirname: P,
    include_patterns: &[String],
    exclude_patterns: &[String],
) -> Result<Vec<PathBuf>, BuildError> {
    let dirname = dirname.as_ref();
    let base = dirname
        .canonicalize()
        .map_err(|e| BuildError::io(dirname, e))?;

    let include = if include_patterns.is_empty() {
        PatternSet::new(&["**"])?
    } else {
        PatternSet::new(include_patterns)?
    };
    let exclude = PatternSet::new(exclude_patterns)?;

    let mut matched = Vec::new();
    let walker = WalkDir::new(&base).follow_links(true).into_iter();
    for entry in walker.filter_entry(|e| {
        // Prune excluded directories early.
        e.depth() == 0
            || !e.file_type().is_dir()
            || e.path()
                .strip_prefix(&base)
                .map(|rel| !exclude.is_match(&normalize_path(rel)))
                .unwrap_or(true)
    }) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone());
            BuildError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(&base) {
            Ok(rel) => normalize_path(rel),
            Err(_) => continue,
        };
        if include.is_match(&relative) && !exclude.is_match(&relative) {
            matched.push(entry.into_path());
        }
    }

    matched.sort();
    Ok(matched)
}

/// Pick the value whose pattern matches `docname`, Sphinx-style: a
/// pattern without wildcards wins over any glob, otherwise the first
/// matching glob is used.
pub fn select_by_pattern<'a, V>(
    docname: &str,
    entries: impl IntoIterator<Item = (&'a String, &'a V)>,
) -> Option<&'a V>
where
    V: 'a,
{
    let mut first_glob = None;
    for (pattern, value) in entries {
        if !has_wildcard(pattern) {
            if pattern == docname {
                return Some(value);
            }
            continue;
        }
        if first_glob.is_none() && pattern_match(docname, pattern).unwrap_or(false) {
            first_glob = Some(value);
        }
    }
    first_glob
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_translate_pattern() {
        assert_eq!(translate_pattern("*.rst"), "^[^/]*\\.rst$");
        assert_eq!(translate_pattern("**"), "^.*$");
        assert_eq!(translate_pattern("**/index.rst"), "^(?:[^/]+/)*index\\.rst$");
        assert_eq!(translate_pattern("[!abc].rst"), "^[^abc]\\.rst$");
        assert_eq!(translate_pattern("[oops"), "^\\[oops$");
    }

    #[test]
    fn test_pattern_match() {
        assert!(pattern_match("index.rst", "*.rst").unwrap());
        assert!(pattern_match("docs/api/module.rst", "**/api/*.rst").unwrap());
        assert!(!pattern_match("docs/index.rst", "*.rst").unwrap());
        assert!(pattern_match("chapter1", "chapter?").unwrap());
        assert!(!pattern_match("chapter10", "chapter?").unwrap());
    }

    #[test]
    fn test_has_wildcard() {
        assert!(has_wildcard("**"));
        assert!(has_wildcard("api/*"));
        assert!(!has_wildcard("index"));
    }

    #[test]
    fn test_select_by_pattern_prefers_exact_names() {
        let mut sidebars: IndexMap<String, &str> = IndexMap::new();
        sidebars.insert("**".to_string(), "global");
        sidebars.insert("algorithms/*".to_string(), "algorithms");
        sidebars.insert("index".to_string(), "index");

        let select = |doc: &str| select_by_pattern(doc, sidebars.iter()).copied();
        assert_eq!(select("index"), Some("index"));
        // First matching glob wins, in declaration order.
        assert_eq!(select("algorithms/cut_rewriting"), Some("global"));
        assert_eq!(select("networks"), Some("global"));
    }

    #[test]
    fn test_get_matching_files() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();

        fs::create_dir_all(base.join("algorithms")).unwrap();
        fs::create_dir_all(base.join("_build/html")).unwrap();
        fs::write(base.join("index.rst"), "x").unwrap();
        fs::write(base.join("algorithms/mig.rst"), "x").unwrap();
        fs::write(base.join("_build/html/index.rst"), "x").unwrap();
        fs::write(base.join("Thumbs.db"), "x").unwrap();

        let files = get_matching_files(
            base,
            &["**/*.rst".to_string()],
            &["_build".to_string(), "_build/**".to_string(), "Thumbs.db".to_string()],
        )
        .unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| normalize_path(p.strip_prefix(base.canonicalize().unwrap()).unwrap()))
            .collect();
        assert_eq!(names, vec!["algorithms/mig.rst", "index.rst"]);
    }
}
