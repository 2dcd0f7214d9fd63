//! Directive expansion and cross-reference resolution.
//!
//! Expansion runs per document right after parsing. Reference resolution
//! needs every document's titles and labels, so it runs once the
//! [`BuildEnvironment`] has been collected.

use log::debug;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::BuildConfig;
use crate::directives::{DirectiveContext, DirectiveError, DirectiveRegistry};
use crate::document::{Block, DirectiveCall, Document, Inline, MessageLevel, RefTarget};
use crate::doxygen::DoxygenProjects;
use crate::environment::BuildEnvironment;
use crate::error::{BuildErrorReport, BuildWarning, WarningKind};
use crate::parser::Parser;
use crate::utils;

/// Directives whose output contains further directives are expanded again,
/// up to this depth.
const MAX_NESTING: usize = 8;

/// Diagnostics produced while resolving one document.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub warnings: Vec<BuildWarning>,
    pub errors: Vec<BuildErrorReport>,
}

impl Diagnostics {
    /// Merge diagnostics from another pass
    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

/// Expands directive calls in parsed documents
pub struct Resolver<'a> {
    pub config: &'a BuildConfig,
    pub registry: &'a DirectiveRegistry,
    pub parser: &'a Parser,
    pub doxygen: &'a DoxygenProjects,
    pub docnames: &'a BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    /// Replace every directive call in `doc` by its output.
    pub fn expand(&self, doc: &mut Document) -> Diagnostics {
        let ctx = DirectiveContext::new(
            self.config,
            &doc.docname,
            &doc.source_path,
            self.parser,
            self.doxygen,
            self.docnames,
        );
        let mut diagnostics = Diagnostics::default();

        let blocks = std::mem::take(&mut doc.blocks);
        let blocks = self.expand_blocks(blocks, &ctx, &mut diagnostics, 0);
        doc.blocks = blocks;

        debug!(
            "{}: expanded directives ({} warning(s), {} error(s))",
            doc.docname,
            diagnostics.warnings.len(),
            diagnostics.errors.len()
        );
        diagnostics
    }

    fn expand_blocks(
        &self,
        blocks: Vec<Block>,
        ctx: &DirectiveContext<'_>,
        diagnostics: &mut Diagnostics,
        depth: usize,
    ) -> Vec<Block> {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            match block {
                Block::Directive(call) => {
                    let produced = self.run_directive(&call, ctx, diagnostics);
                    if depth < MAX_NESTING {
                        out.extend(self.expand_blocks(produced, ctx, diagnostics, depth + 1));
                    } else {
                        out.extend(produced.into_iter().filter(|b| !matches!(b, Block::Directive(_))));
                    }
                }
                Block::BlockQuote(body) => {
                    out.push(Block::BlockQuote(self.expand_blocks(body, ctx, diagnostics, depth)))
                }
                Block::Admonition { kind, title, body } => out.push(Block::Admonition {
                    kind,
                    title,
                    body: self.expand_blocks(body, ctx, diagnostics, depth),
                }),
                other => out.push(other),
            }
        }
        out
    }

    fn run_directive(
        &self,
        call: &DirectiveCall,
        ctx: &DirectiveContext<'_>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Block> {
        let source = ctx.source_path.to_path_buf();

        if !self.registry.contains(&call.name) {
            let mut warning = BuildWarning::new(
                WarningKind::UnknownDirective,
                source,
                Some(call.line),
                format!("Unknown directive type \"{}\"", call.name),
            );
            if let Some(suggestion) = self.registry.suggest(&call.name) {
                warning = warning.with_suggestion(suggestion);
            }
            diagnostics.warnings.push(warning.clone());
            return vec![system_message(MessageLevel::Warning, &warning.message, call.line)];
        }

        let result = self.registry.run(call, ctx);
        diagnostics.warnings.extend(ctx.take_warnings());

        match result {
            Ok(blocks) => blocks,
            Err(DirectiveError::Invalid { message, suggestion }) => {
                let mut warning = BuildWarning::new(
                    WarningKind::InvalidDirective,
                    source,
                    Some(call.line),
                    format!("Error in \"{}\" directive: {}", call.name, message),
                );
                if let Some(suggestion) = suggestion {
                    warning = warning.with_suggestion(suggestion);
                }
                let block = system_message(MessageLevel::Warning, &warning.message, call.line);
                diagnostics.warnings.push(warning);
                vec![block]
            }
            Err(DirectiveError::MissingSymbol(message)) => {
                diagnostics.warnings.push(BuildWarning::new(
                    WarningKind::MissingSymbol,
                    source,
                    Some(call.line),
                    message,
                ));
                Vec::new()
            }
            Err(DirectiveError::Failed(message)) => {
                let message = format!("\"{}\" directive failed: {}", call.name, message);
                let block = system_message(MessageLevel::Error, &message, call.line);
                diagnostics
                    .errors
                    .push(BuildErrorReport::new(source, Some(call.line), message));
                vec![block]
            }
        }
    }
}

fn system_message(level: MessageLevel, message: &str, line: usize) -> Block {
    Block::SystemMessage {
        level,
        message: message.to_string(),
        line,
    }
}

/// Turn `:doc:` and `:ref:` references into internal links and fill in
/// empty reference texts. Unresolvable references keep their text and are
/// reported.
pub fn resolve_references(env: &BuildEnvironment, doc: &mut Document) -> Vec<BuildWarning> {
    let mut warnings = Vec::new();
    let docname = doc.docname.clone();
    let source = doc.source_path.clone();
    for block in doc.blocks.iter_mut() {
        resolve_block(env, &docname, &source, block, &mut warnings);
    }
    warnings
}

fn resolve_block(
    env: &BuildEnvironment,
    docname: &str,
    source: &Path,
    block: &mut Block,
    warnings: &mut Vec<BuildWarning>,
) {
    let resolve_all = |inlines: &mut Vec<Inline>, warnings: &mut Vec<BuildWarning>| {
        for inline in inlines.iter_mut() {
            resolve_inline(env, docname, source, inline, warnings);
        }
    };

    match block {
        Block::Title { inlines, .. } | Block::Paragraph(inlines) | Block::Line(inlines) => {
            resolve_all(inlines, warnings)
        }
        Block::List { items, .. } => {
            for item in items.iter_mut() {
                resolve_all(item, warnings);
            }
        }
        Block::BlockQuote(body) | Block::Admonition { body, .. } => {
            for child in body.iter_mut() {
                resolve_block(env, docname, source, child, warnings);
            }
        }
        Block::Table(table) => {
            for cell in table.header.iter_mut().chain(table.rows.iter_mut().flatten()) {
                for child in cell.iter_mut() {
                    resolve_block(env, docname, source, child, warnings);
                }
            }
        }
        _ => {}
    }
}

fn resolve_inline(
    env: &BuildEnvironment,
    docname: &str,
    source: &Path,
    inline: &mut Inline,
    warnings: &mut Vec<BuildWarning>,
) {
    let (text, target) = match inline {
        Inline::Reference { text, target } => (text, target),
        _ => return,
    };

    match target.clone() {
        RefTarget::Doc(reference) => {
            let reference = reference.trim_end_matches(".rst").trim_end_matches(".md");
            let resolved = utils::resolve_docname(docname, reference);
            match env.title(&resolved) {
                Some(title) => {
                    if text.is_empty() {
                        *text = title.to_string();
                    }
                    *target = RefTarget::Internal {
                        docname: resolved,
                        anchor: None,
                    };
                }
                None => {
                    if text.is_empty() {
                        *text = reference.to_string();
                    }
                    warnings.push(BuildWarning::new(
                        WarningKind::UnknownReference,
                        source,
                        None,
                        format!("unknown document: '{}'", reference),
                    ));
                }
            }
        }
        RefTarget::Label(label) => match env.label(&label) {
            Some(info) => {
                if text.is_empty() {
                    *text = info
                        .title
                        .clone()
                        .or_else(|| env.title(&info.docname).map(str::to_string))
                        .unwrap_or_else(|| label.clone());
                }
                *target = RefTarget::Internal {
                    docname: info.docname.clone(),
                    anchor: Some(info.anchor.clone()),
                };
            }
            None => {
                if text.is_empty() {
                    *text = label.clone();
                }
                warnings.push(BuildWarning::new(
                    WarningKind::UnknownReference,
                    source,
                    None,
                    format!("undefined label: '{}'", label),
                ));
            }
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::testing::Fixture;
    use crate::extensions::ExtensionLoader;
    use std::path::Path;

    fn expand(fixture: &Fixture, registry: &DirectiveRegistry, source: &str) -> (Document, Diagnostics) {
        let mut doc = fixture
            .parser
            .parse(&fixture.source_path, "index", source)
            .unwrap();
        let resolver = Resolver {
            config: &fixture.config,
            registry,
            parser: &fixture.parser,
            doxygen: &fixture.doxygen,
            docnames: &fixture.docnames,
        };
        let diagnostics = resolver.expand(&mut doc);
        (doc, diagnostics)
    }

    fn registry() -> DirectiveRegistry {
        let (app, _) = ExtensionLoader::new().load(&BuildConfig::default(), Path::new("conf.py"));
        app.registry
    }

    #[test]
    fn test_unknown_directive_becomes_system_message() {
        let fixture = Fixture::new(&["index"]);
        let (doc, diagnostics) = expand(&fixture, &registry(), "Title\n=====\n\n.. toctre::\n\n   intro\n");

        assert_eq!(diagnostics.warnings.len(), 1);
        assert_eq!(diagnostics.warnings[0].kind, WarningKind::UnknownDirective);
        assert_eq!(diagnostics.warnings[0].line, Some(4));
        assert_eq!(
            diagnostics.warnings[0].suggestion.as_deref(),
            Some("Did you mean 'toctree'?")
        );
        assert!(doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::SystemMessage { level: MessageLevel::Warning, .. })));
    }

    #[test]
    fn test_missing_xml_is_an_error_report() {
        let fixture = Fixture::new(&["index"]);
        let (doc, diagnostics) = expand(
            &fixture,
            &registry(),
            "Title\n=====\n\n.. doc_overview_table:: namespacemockturtle\n\n   cut_rewriting\n",
        );

        assert!(diagnostics.warnings.is_empty());
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(diagnostics.errors[0].line, Some(4));
        assert!(doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::SystemMessage { level: MessageLevel::Error, .. })));
    }

    #[test]
    fn test_invalid_option_is_a_warning() {
        let fixture = Fixture::new(&["index"]);
        let (_, diagnostics) = expand(
            &fixture,
            &registry(),
            "Title\n=====\n\n.. toctree::\n   :maxdpth: 2\n\n   index\n",
        );
        assert_eq!(diagnostics.warnings[0].kind, WarningKind::InvalidDirective);
        assert_eq!(
            diagnostics.warnings[0].suggestion.as_deref(),
            Some("Did you mean 'maxdepth'?")
        );
    }

    #[test]
    fn test_nested_directives_are_expanded() {
        let fixture = Fixture::new(&["index"]);
        let (doc, diagnostics) = expand(
            &fixture,
            &registry(),
            "Title\n=====\n\n.. note::\n\n   .. code-block:: c++\n\n      int x;\n",
        );
        assert!(diagnostics.warnings.is_empty());
        match &doc.blocks[1] {
            Block::Admonition { body, .. } => {
                assert!(matches!(&body[0], Block::LiteralBlock { code, .. } if code == "int x;"))
            }
            other => panic!("expected admonition, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_references() {
        let fixture = Fixture::new(&["index", "intro"]);
        let parser = &fixture.parser;
        let index = parser
            .parse(
                Path::new("index.rst"),
                "index",
                "Home\n====\n\nSee :doc:`intro`, :ref:`install` and :ref:`nowhere`.\n",
            )
            .unwrap();
        let intro = parser
            .parse(
                Path::new("intro.rst"),
                "intro",
                "Intro\n=====\n\n.. _install:\n\nInstalling\n----------\n\nText.\n",
            )
            .unwrap();
        let (env, _) = BuildEnvironment::collect("index", &[index.clone(), intro]);

        let mut index = index;
        let warnings = resolve_references(&env, &mut index);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("nowhere"));

        let inlines = match &index.blocks[1] {
            Block::Paragraph(inlines) => inlines,
            other => panic!("expected paragraph, got {:?}", other),
        };
        assert!(inlines.contains(&Inline::Reference {
            text: "Intro".to_string(),
            target: RefTarget::Internal {
                docname: "intro".to_string(),
                anchor: None
            },
        }));
        assert!(inlines.contains(&Inline::Reference {
            text: "Installing".to_string(),
            target: RefTarget::Internal {
                docname: "intro".to_string(),
                anchor: Some("installing".to_string())
            },
        }));
    }
}
