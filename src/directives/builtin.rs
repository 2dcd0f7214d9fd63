//! Directives that are always available, plus `math` and `todo`.

use super::{Directive, DirectiveContext, DirectiveError, DirectiveInput, DirectiveSpec, OptionKind};
use crate::document::{Block, TocEntry, TocTree};
use crate::error::{BuildWarning, WarningKind};
use crate::matching::{has_wildcard, pattern_match};
use crate::utils;

/// `toctree`: a table of contents tree
pub struct TocTreeDirective;

impl Directive for TocTreeDirective {
    fn name(&self) -> &str {
        "toctree"
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            has_content: true,
            option_spec: vec![
                ("maxdepth", OptionKind::PositiveInt),
                ("caption", OptionKind::Unchanged),
                ("name", OptionKind::Unchanged),
                ("hidden", OptionKind::Flag),
                ("titlesonly", OptionKind::Flag),
                ("glob", OptionKind::Flag),
            ],
            ..DirectiveSpec::default()
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let glob = input.flag("glob");
        let mut entries: Vec<TocEntry> = Vec::new();

        for line in input.content_lines() {
            let entry = TocEntry::parse(line);
            if entry.is_external() {
                entries.push(entry);
                continue;
            }

            if glob && entry.title.is_none() && has_wildcard(&entry.docname) {
                let pattern = utils::resolve_docname(ctx.docname, &entry.docname);
                let matches: Vec<&String> = ctx
                    .docnames
                    .iter()
                    .filter(|doc| doc.as_str() != ctx.docname)
                    .filter(|doc| pattern_match(doc, &pattern).unwrap_or(false))
                    .collect();
                if matches.is_empty() {
                    ctx.warn(BuildWarning::new(
                        WarningKind::MissingToctreeRef,
                        ctx.source_path,
                        Some(input.call.line),
                        format!("toctree glob pattern '{}' didn't match any documents", entry.docname),
                    ));
                }
                for doc in matches {
                    if !entries.iter().any(|e| &e.docname == doc) {
                        entries.push(TocEntry {
                            title: None,
                            docname: doc.clone(),
                        });
                    }
                }
                continue;
            }

            let docname = match entry.docname.as_str() {
                "self" => ctx.docname.to_string(),
                other => {
                    let other = ctx.config.strip_source_suffix(other).unwrap_or(other);
                    utils::resolve_docname(ctx.docname, other)
                }
            };
            entries.push(TocEntry {
                title: entry.title,
                docname,
            });
        }

        let mut blocks = Vec::new();
        if let Some(name) = input.option("name") {
            blocks.push(Block::Target(utils::normalize_name(name)));
        }
        blocks.push(Block::TocTree(TocTree {
            caption: input.option("caption").map(str::to_string),
            // 0 means unlimited
            maxdepth: input.int_option("maxdepth").unwrap_or(0),
            hidden: input.flag("hidden"),
            titles_only: input.flag("titlesonly"),
            entries,
            line: input.call.line,
        }));
        Ok(blocks)
    }
}

/// `code-block`, also registered as `code` and `sourcecode`.
pub struct CodeBlockDirective;

impl Directive for CodeBlockDirective {
    fn name(&self) -> &str {
        "code-block"
    }

    fn aliases(&self) -> &[&'static str] {
        &["code", "sourcecode"]
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            optional_arguments: 1,
            has_content: true,
            option_spec: vec![
                ("caption", OptionKind::Unchanged),
                ("name", OptionKind::Unchanged),
            ],
            ..DirectiveSpec::default()
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        _ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        if !input.call.has_content() {
            return Err(DirectiveError::invalid(format!(
                "Content block expected for the \"{}\" directive; none found",
                input.call.name
            )));
        }

        let mut blocks = Vec::new();
        if let Some(name) = input.option("name") {
            blocks.push(Block::Target(utils::normalize_name(name)));
        }
        blocks.push(Block::LiteralBlock {
            language: input.argument(0).map(str::to_string),
            code: input.call.content_text().trim_end().to_string(),
            caption: input.option("caption").map(str::to_string),
        });
        Ok(blocks)
    }
}

/// `note`, `warning`, `tip` and the other titled admonitions.
pub struct AdmonitionDirective {
    name: &'static str,
    title: &'static str,
}

impl AdmonitionDirective {
    pub const fn new(name: &'static str, title: &'static str) -> Self {
        Self { name, title }
    }

    /// Every admonition directive with its title
    pub fn all() -> Vec<Self> {
        vec![
            Self::new("attention", "Attention"),
            Self::new("caution", "Caution"),
            Self::new("danger", "Danger"),
            Self::new("error", "Error"),
            Self::new("hint", "Hint"),
            Self::new("important", "Important"),
            Self::new("note", "Note"),
            Self::new("seealso", "See also"),
            Self::new("tip", "Tip"),
            Self::new("warning", "Warning"),
        ]
    }
}

impl Directive for AdmonitionDirective {
    fn name(&self) -> &str {
        self.name
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            optional_arguments: 1,
            final_argument_whitespace: true,
            has_content: true,
            option_spec: vec![("class", OptionKind::Unchanged)],
            ..DirectiveSpec::default()
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let mut body = Vec::new();
        if let Some(text) = input.argument(0) {
            body.push(Block::Paragraph(ctx.parser.parse_inline(text)));
        }
        body.extend(ctx.parser.parse_fragment(&input.call.content, input.call.line + 1));
        if body.is_empty() {
            return Err(DirectiveError::invalid(format!(
                "The \"{}\" admonition is empty; content required",
                self.name
            )));
        }

        Ok(vec![Block::Admonition {
            kind: self.name.to_string(),
            title: Some(self.title.to_string()),
            body,
        }])
    }
}

/// `admonition` with a user-supplied title.
pub struct GenericAdmonitionDirective;

impl Directive for GenericAdmonitionDirective {
    fn name(&self) -> &str {
        "admonition"
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            required_arguments: 1,
            final_argument_whitespace: true,
            has_content: true,
            option_spec: vec![("class", OptionKind::Unchanged)],
            ..DirectiveSpec::default()
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let title = input.argument(0).unwrap_or_default();
        let kind = match input.option("class") {
            Some(class) if !class.is_empty() => class.to_string(),
            _ => format!("admonition-{}", utils::make_id(title)),
        };
        Ok(vec![Block::Admonition {
            kind,
            title: Some(title.to_string()),
            body: ctx.parser.parse_fragment(&input.call.content, input.call.line + 1),
        }])
    }
}

/// `math`: a display math block
pub struct MathDirective;

impl Directive for MathDirective {
    fn name(&self) -> &str {
        "math"
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            optional_arguments: 1,
            final_argument_whitespace: true,
            has_content: true,
            option_spec: vec![
                ("label", OptionKind::Unchanged),
                ("name", OptionKind::Unchanged),
                ("nowrap", OptionKind::Flag),
            ],
            ..DirectiveSpec::default()
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        _ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let mut latex = input.argument(0).unwrap_or_default().to_string();
        let content = input.call.content_text();
        if !content.trim().is_empty() {
            if !latex.is_empty() {
                latex.push('\n');
            }
            latex.push_str(content.trim_end());
        }
        if latex.trim().is_empty() {
            return Err(DirectiveError::invalid("math directive without content"));
        }

        let label = input.option("label").or(input.option("name")).map(str::to_string);
        let mut blocks = Vec::new();
        if let Some(label) = &label {
            blocks.push(Block::Target(utils::normalize_name(label)));
        }
        blocks.push(Block::Math { latex, label });
        Ok(blocks)
    }
}

/// `todo`: output only when `todo_include_todos` is set.
pub struct TodoDirective;

impl Directive for TodoDirective {
    fn name(&self) -> &str {
        "todo"
    }

    fn spec(&self) -> DirectiveSpec {
        DirectiveSpec {
            optional_arguments: 1,
            final_argument_whitespace: true,
            has_content: true,
            option_spec: vec![("class", OptionKind::Unchanged)],
            ..DirectiveSpec::default()
        }
    }

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        if !ctx.config.todo_include_todos {
            return Ok(Vec::new());
        }
        let mut body = Vec::new();
        if let Some(text) = input.argument(0) {
            body.push(Block::Paragraph(ctx.parser.parse_inline(text)));
        }
        body.extend(ctx.parser.parse_fragment(&input.call.content, input.call.line + 1));
        Ok(vec![Block::Admonition {
            kind: "todo".to_string(),
            title: Some("Todo".to_string()),
            body,
        }])
    }
}
