//! Document tree shared by the parser, the directive resolver and the writers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A parsed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_path: PathBuf,
    /// Path relative to the source directory, without suffix, '/'-separated.
    pub docname: String,
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Create an empty document
    pub fn new(source_path: PathBuf, docname: impl Into<String>) -> Self {
        Self {
            source_path,
            docname: docname.into(),
            title: String::new(),
            blocks: Vec::new(),
        }
    }

    /// Plain text of the first section title.
    pub fn first_title(&self) -> Option<String> {
        self.blocks.iter().find_map(|block| match block {
            Block::Title { inlines, .. } => Some(plain_text(inlines)),
            _ => None,
        })
    }

    /// Every directive call that has not been resolved yet.
    pub fn pending_directives(&self) -> impl Iterator<Item = &DirectiveCall> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Directive(call) => Some(call),
            _ => None,
        })
    }
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    Title {
        inlines: Vec<Inline>,
        /// 1 for the document title, increasing with nesting.
        level: usize,
        /// Anchor id derived from the title text.
        id: String,
        line: usize,
    },
    Paragraph(Vec<Inline>),
    /// A single line of text, as produced inside table cells.
    Line(Vec<Inline>),
    LiteralBlock {
        language: Option<String>,
        code: String,
        caption: Option<String>,
    },
    List {
        ordered: bool,
        items: Vec<Vec<Inline>>,
    },
    BlockQuote(Vec<Block>),
    /// Hyperlink target (`.. _label:`) or member anchor.
    Target(String),
    Table(Table),
    Admonition {
        kind: String,
        title: Option<String>,
        body: Vec<Block>,
    },
    Math {
        latex: String,
        label: Option<String>,
    },
    TocTree(TocTree),
    /// A Doxygen member rendered by a breathe directive.
    Member(MemberDescription),
    SystemMessage {
        level: MessageLevel,
        message: String,
        line: usize,
    },
    /// A directive that still has to be expanded.
    Directive(DirectiveCall),
}

/// Severity of a system message shown in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Warning,
    Error,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Warning => "WARNING",
            MessageLevel::Error => "ERROR",
        }
    }
}

/// Inline markup node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Emphasis(String),
    Strong(String),
    Literal(String),
    Reference { text: String, target: RefTarget },
    Math(String),
}

/// Where a reference points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefTarget {
    /// External URI.
    Uri(String),
    /// Anchor in the current document (`#id`).
    Anchor(String),
    /// Another document, by docname.
    Doc(String),
    /// Label defined with `.. _label:` anywhere in the project.
    Label(String),
    /// A resolved `Doc` or `Label` reference.
    Internal {
        docname: String,
        anchor: Option<String>,
    },
}

/// A table; every cell is a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Relative column widths.
    pub colwidths: Vec<u32>,
    /// The header row, one cell per column. Empty when the table has none.
    pub header: Vec<Vec<Block>>,
    /// Body rows, each one cell per column.
    pub rows: Vec<Vec<Vec<Block>>>,
    pub classes: Vec<String>,
}

impl Table {
    /// Number of columns
    pub fn columns(&self) -> usize {
        self.colwidths.len()
    }

    /// Column widths as percentages of the total.
    pub fn percentages(&self) -> Vec<u32> {
        let total: u32 = self.colwidths.iter().sum();
        if total == 0 {
            return vec![100 / self.columns().max(1) as u32; self.columns()];
        }
        self.colwidths.iter().map(|w| w * 100 / total).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocTree {
    pub caption: Option<String>,
    pub maxdepth: usize,
    pub hidden: bool,
    pub titles_only: bool,
    pub entries: Vec<TocEntry>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: Option<String>,
    pub docname: String,
}

impl TocEntry {
    /// Parse `docname` or `Title <docname>`.
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        if entry.ends_with('>') {
            if let Some(open) = entry.rfind('<') {
                let title = entry[..open].trim();
                if !title.is_empty() {
                    return Self {
                        title: Some(title.to_string()),
                        docname: entry[open + 1..entry.len() - 1].trim().to_string(),
                    };
                }
            }
        }
        Self {
            title: None,
            docname: entry.to_string(),
        }
    }

    /// Whether the entry points outside the project
    pub fn is_external(&self) -> bool {
        self.docname.starts_with("http://") || self.docname.starts_with("https://")
    }
}

/// A documented C++ member, as rendered by the Doxygen directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDescription {
    pub id: String,
    pub kind: String,
    pub signature: String,
    pub brief: Option<String>,
    pub detailed: Vec<String>,
}

/// A directive as written in the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveCall {
    pub name: String,
    /// Text following `::` on the directive line.
    pub arguments: String,
    pub options: IndexMap<String, String>,
    pub content: Vec<String>,
    pub line: usize,
}

impl DirectiveCall {
    /// Create a call without options or content
    pub fn new(name: impl Into<String>, arguments: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
            options: IndexMap::new(),
            content: Vec::new(),
            line,
        }
    }

    pub fn with_option(mut self, name: &str, value: &str) -> Self {
        self.options.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_content<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_content(&self) -> bool {
        self.content.iter().any(|l| !l.trim().is_empty())
    }

    /// Content lines joined with newlines
    pub fn content_text(&self) -> String {
        self.content.join("\n")
    }
}

/// Concatenated text of inline nodes, without markup.
pub fn plain_text(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(t)
            | Inline::Emphasis(t)
            | Inline::Strong(t)
            | Inline::Literal(t)
            | Inline::Math(t) => t.as_str(),
            Inline::Reference { text, .. } => text.as_str(),
        })
        .collect()
}

/// Plain text of a list of blocks, used for search terms.
pub fn blocks_text(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        let text = match block {
            Block::Title { inlines, .. } | Block::Paragraph(inlines) | Block::Line(inlines) => {
                plain_text(inlines)
            }
            Block::List { items, .. } => items
                .iter()
                .map(|item| plain_text(item))
                .collect::<Vec<_>>()
                .join(" "),
            Block::BlockQuote(body) | Block::Admonition { body, .. } => blocks_text(body),
            Block::Table(table) => table
                .header
                .iter()
                .chain(table.rows.iter().flatten())
                .map(|cell| blocks_text(cell))
                .collect::<Vec<_>>()
                .join(" "),
            Block::Member(member) => {
                let mut text = member.signature.clone();
                if let Some(brief) = &member.brief {
                    text.push(' ');
                    text.push_str(brief);
                }
                text
            }
            _ => String::new(),
        };
        if !text.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toc_entry_parse() {
        assert_eq!(
            TocEntry::parse("Getting started <tutorials/intro>"),
            TocEntry {
                title: Some("Getting started".to_string()),
                docname: "tutorials/intro".to_string()
            }
        );
        assert_eq!(TocEntry::parse("  networks  ").docname, "networks");
        assert!(TocEntry::parse("GitHub <https://github.com>").is_external());
    }

    #[test]
    fn test_table_percentages() {
        let table = Table {
            colwidths: vec![50, 50],
            header: Vec::new(),
            rows: Vec::new(),
            classes: Vec::new(),
        };
        assert_eq!(table.percentages(), vec![50, 50]);

        let table = Table {
            colwidths: vec![1, 3],
            ..table
        };
        assert_eq!(table.percentages(), vec![25, 75]);
    }

    #[test]
    fn test_plain_text() {
        let inlines = vec![
            Inline::Text("Use ".to_string()),
            Inline::Literal("cut_rewriting".to_string()),
            Inline::Reference {
                text: " here".to_string(),
                target: RefTarget::Anchor("x".to_string()),
            },
        ];
        assert_eq!(plain_text(&inlines), "Use cut_rewriting here");
    }
}
