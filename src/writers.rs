//! Output writers.
//!
//! The HTML writer renders one page per document through the template
//! engine. The LaTeX, manual page and Texinfo writers each produce one file
//! per configured target, concatenating the documents reachable from the
//! target's start document.

pub mod html;
pub mod latex;
pub mod man;
pub mod texinfo;

use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::document::{Block, Document};
use crate::environment::BuildEnvironment;
use crate::error::{BuildError, BuildWarning, WarningKind};

pub use html::{HtmlTranslator, HtmlWriter, Highlighter};
pub use latex::LatexWriter;
pub use man::ManWriter;
pub use texinfo::TexinfoWriter;

/// What a writer needs from a finished read phase.
pub struct WriteContext<'a> {
    pub config: &'a BuildConfig,
    pub env: &'a BuildEnvironment,
    pub documents: &'a [Document],
    pub output_dir: &'a Path,
    /// Reported as the location of target configuration problems.
    pub config_path: &'a Path,
}

impl<'a> WriteContext<'a> {
    /// Look up a document by name
    pub fn document(&self, docname: &str) -> Option<&'a Document> {
        self.documents.iter().find(|doc| doc.docname == docname)
    }

    /// Documents of a single-file target, with their toctree depth below
    /// `startdoc`. Warns when the start document does not exist.
    pub fn target_documents(
        &self,
        startdoc: &str,
        target: &str,
        warnings: &mut Vec<BuildWarning>,
    ) -> Vec<(&'a Document, usize)> {
        if !self.env.contains(startdoc) {
            warnings.push(BuildWarning::new(
                WarningKind::Config,
                self.config_path,
                None,
                format!("\"{}\" refers to unknown document '{}'", target, startdoc),
            ));
            return Vec::new();
        }
        self.env
            .toc_walk(startdoc)
            .into_iter()
            .filter_map(|(docname, depth)| self.document(&docname).map(|doc| (doc, depth)))
            .collect()
    }
}

/// Files written and warnings raised by one writer run.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<BuildWarning>,
}

/// A writer producing single-file outputs from the whole project.
pub trait OutputWriter {
    fn name(&self) -> &'static str;

    fn write(&self, ctx: &WriteContext<'_>) -> Result<WriteReport, BuildError>;
}

/// Blocks of one document as they appear inside a concatenated target: the
/// start document's title is dropped, and section levels of nested documents
/// are shifted by their toctree depth.
pub fn shifted_blocks(doc: &Document, depth: usize) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(doc.blocks.len());
    for block in &doc.blocks {
        match block {
            Block::Title { level: 1, .. } if depth == 0 => {}
            Block::Title {
                inlines,
                level,
                id,
                line,
            } => blocks.push(Block::Title {
                inlines: inlines.clone(),
                level: level + depth.saturating_sub(1),
                id: id.clone(),
                line: *line,
            }),
            other => blocks.push(other.clone()),
        }
    }
    blocks
}

/// Default admonition title: `note` becomes `Note`.
pub(crate) fn capitalize(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_shifted_blocks() {
        let docs = project();
        let start = shifted_blocks(&docs[0], 0);
        assert!(!start.iter().any(|b| matches!(b, Block::Title { .. })));

        let nested = shifted_blocks(&docs[1], 2);
        let levels: Vec<usize> = nested
            .iter()
            .filter_map(|b| match b {
                Block::Title { level, .. } => Some(*level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![2, 3]);
    }

    #[test]
    fn test_target_documents() {
        let docs = project();
        let (env, _) = BuildEnvironment::collect("index", &docs);
        let config = BuildConfig::default();
        let ctx = WriteContext {
            config: &config,
            env: &env,
            documents: &docs,
            output_dir: Path::new("out"),
            config_path: Path::new("conf.py"),
        };

        let mut warnings = Vec::new();
        let targets: Vec<(&str, usize)> = ctx
            .target_documents("index", "mockturtle.tex", &mut warnings)
            .into_iter()
            .map(|(doc, depth)| (doc.docname.as_str(), depth))
            .collect();
        assert_eq!(targets, vec![("index", 0), ("intro", 1), ("usage", 2)]);

        assert!(ctx.target_documents("nope", "x.tex", &mut warnings).is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Config);
    }
}
