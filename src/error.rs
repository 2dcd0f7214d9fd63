//! Error types and build diagnostics.
//!
//! `BuildError` is returned by library operations that cannot continue.
//! `BuildWarning` and `BuildErrorReport` are diagnostics collected during a
//! build; they are reported at the end and only fail the build when the
//! configuration asks for it.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{}:{line}: {message}", .path.display())]
    ConfPy {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {}: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Doxygen project '{0}' is not configured in breathe_projects")]
    UnknownProject(String),

    #[error("theme error: {0}")]
    Theme(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("command `{command}` failed: {status}")]
    Command { command: String, status: String },

    #[error("build failed: {0} warning(s) treated as errors")]
    WarningsAsErrors(usize),
}

impl BuildError {
    /// I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Category of a build warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    MissingToctreeRef,
    OrphanedDocument,
    UnknownDirective,
    InvalidDirective,
    MissingSymbol,
    UnknownReference,
    DuplicateLabel,
    UnknownExtension,
    ThemeOption,
    Config,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningKind::MissingToctreeRef => "toc.missing",
            WarningKind::OrphanedDocument => "toc.orphan",
            WarningKind::UnknownDirective => "directive.unknown",
            WarningKind::InvalidDirective => "directive.invalid",
            WarningKind::MissingSymbol => "doxygen.symbol",
            WarningKind::UnknownReference => "ref.unknown",
            WarningKind::DuplicateLabel => "ref.duplicate",
            WarningKind::UnknownExtension => "config.extension",
            WarningKind::ThemeOption => "theme.option",
            WarningKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// A non-fatal diagnostic tied to a source location.
#[derive(Debug, Clone, Serialize)]
pub struct BuildWarning {
    pub kind: WarningKind,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub message: String,
    pub suggestion: Option<String>,
}

impl BuildWarning {
    /// Create a warning without suggestion
    pub fn new(
        kind: WarningKind,
        file: impl Into<PathBuf>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn missing_toctree_ref(file: PathBuf, line: Option<usize>, reference: &str) -> Self {
        Self::new(
            WarningKind::MissingToctreeRef,
            file,
            line,
            format!("toctree contains reference to nonexisting document '{}'", reference),
        )
    }

    pub fn orphaned_document(file: PathBuf) -> Self {
        Self::new(
            WarningKind::OrphanedDocument,
            file,
            None,
            "document isn't included in any toctree",
        )
    }

    /// Warning for a symbol missing from a compound file
    pub fn missing_symbol(file: &Path, line: usize, symbol: &str, xml: &Path) -> Self {
        Self::new(
            WarningKind::MissingSymbol,
            file,
            Some(line),
            format!("symbol '{}' not found in {}", symbol, xml.display()),
        )
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: WARNING: {}", self.file.display(), line, self.message)?,
            None => write!(f, "{}: WARNING: {}", self.file.display(), self.message)?,
        }
        write!(f, " [{}]", self.kind)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// An error found in a document. The build continues, but the output for
/// the affected construct is replaced by a system message.
#[derive(Debug, Clone, Serialize)]
pub struct BuildErrorReport {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub message: String,
}

impl BuildErrorReport {
    pub fn new(file: impl Into<PathBuf>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for BuildErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: ERROR: {}", self.file.display(), line, self.message),
            None => write!(f, "{}: ERROR: {}", self.file.display(), self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_with_line() {
        let warning = BuildWarning::missing_toctree_ref(PathBuf::from("index.rst"), Some(12), "intro");
        let text = warning.to_string();
        assert!(text.starts_with("index.rst:12: WARNING:"));
        assert!(text.contains("'intro'"));
        assert!(text.ends_with("[toc.missing]"));
    }

    #[test]
    fn test_warning_display_with_suggestion() {
        let warning = BuildWarning::new(WarningKind::InvalidDirective, "a.rst", None, "unknown option")
            .with_suggestion("Did you mean 'column'?");
        assert_eq!(
            warning.to_string(),
            "a.rst: WARNING: unknown option [directive.invalid] (Did you mean 'column'?)"
        );
    }

    #[test]
    fn test_error_report_display() {
        let report = BuildErrorReport::new("api.rst", Some(3), "file not found");
        assert_eq!(report.to_string(), "api.rst:3: ERROR: file not found");
    }
}
