//! Manual pages in roff, one per `man_pages` entry.

use log::info;

use crate::config::{BuildConfig, ManPage};
use crate::document::{Block, Inline, RefTarget, Table};
use crate::error::BuildError;

use super::{capitalize, shifted_blocks, write_file, OutputWriter, WriteContext, WriteReport};

#[derive(Debug, Default)]
pub struct ManWriter;

impl OutputWriter for ManWriter {
    fn name(&self) -> &'static str {
        "man"
    }

    fn write(&self, ctx: &WriteContext<'_>) -> Result<WriteReport, BuildError> {
        let mut report = WriteReport::default();
        for page in &ctx.config.man_pages {
            let file_name = format!("{}.{}", page.name, page.section);
            let documents = ctx.target_documents(&page.startdoc, &file_name, &mut report.warnings);
            if documents.is_empty() {
                continue;
            }

            let mut body = String::new();
            for (doc, depth) in documents {
                body.push_str(&blocks(&shifted_blocks(doc, depth)));
            }

            let path = ctx.output_dir.join(&file_name);
            write_file(&path, &render_page(ctx.config, page, &body))?;
            info!("Wrote {}", path.display());
            report.files.push(path);
        }
        Ok(report)
    }
}

fn render_page(config: &BuildConfig, page: &ManPage, body: &str) -> String {
    let mut roff = String::new();
    roff.push_str(".\\\" Man page generated by refman.\n");
    roff.push_str(&format!(
        ".TH \"{}\" \"{}\" \"{}\" \"{}\" \"{}\"\n",
        page.name.to_uppercase(),
        page.section,
        config.today(),
        config.release,
        config.project
    ));
    roff.push_str(".SH NAME\n");
    roff.push_str(&format!("{} \\- {}\n", escape(&page.name), escape(&page.description)));
    roff.push_str(body);
    if !page.authors.is_empty() {
        roff.push_str(".SH AUTHOR\n");
        roff.push_str(&escape(&page.authors.join(", ")));
        roff.push('\n');
    }
    if !config.copyright.is_empty() {
        roff.push_str(".SH COPYRIGHT\n");
        roff.push_str(&escape(&config.copyright));
        roff.push('\n');
    }
    roff
}

/// Escape text for roff: backslashes, hyphens and control characters at
/// the start of a line.
pub fn escape(text: &str) -> String {
    let escaped = text.replace('\\', "\\e").replace('-', "\\-");
    escaped
        .lines()
        .map(|line| {
            if line.starts_with('.') || line.starts_with('\'') {
                format!("\\&{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn blocks(blocks: &[Block]) -> String {
    blocks.iter().map(block).collect()
}

fn block(block: &Block) -> String {
    match block {
        Block::Title { inlines, level, .. } => {
            if *level <= 1 {
                format!(".SH {}\n", inline_text(inlines).to_uppercase())
            } else {
                format!(".SS {}\n", inline_text(inlines))
            }
        }
        Block::Paragraph(inlines) => format!(".sp\n{}\n", inline_text(inlines)),
        Block::Line(inlines) => format!("{}\n.br\n", inline_text(inlines)),
        Block::LiteralBlock { code, .. } => {
            format!(".sp\n.nf\n.ft C\n{}\n.ft P\n.fi\n", escape(code))
        }
        Block::List { ordered, items } => {
            let mut roff = String::new();
            for (index, item) in items.iter().enumerate() {
                if *ordered {
                    roff.push_str(&format!(".IP {}. 3\n", index + 1));
                } else {
                    roff.push_str(".IP \\(bu 2\n");
                }
                roff.push_str(&inline_text(item));
                roff.push('\n');
            }
            roff
        }
        Block::BlockQuote(body) => format!(".RS 4\n{}.RE\n", blocks(body)),
        Block::Table(table) => table_roff(table),
        Block::Admonition { kind, title, body } => {
            let title = title.clone().unwrap_or_else(|| capitalize(kind));
            format!(".sp\n.B {}:\n.RS 4\n{}.RE\n", escape(&title), blocks(body))
        }
        Block::Math { latex, .. } => format!(".sp\n.nf\n{}\n.fi\n", escape(latex)),
        Block::Member(member) => {
            let mut roff = format!(".TP\n.B {}\n", escape(&member.signature));
            if let Some(brief) = &member.brief {
                roff.push_str(&escape(brief));
                roff.push('\n');
            }
            for paragraph in &member.detailed {
                roff.push_str(".sp\n");
                roff.push_str(&escape(paragraph));
                roff.push('\n');
            }
            roff
        }
        Block::SystemMessage { level, message, line } => format!(
            ".sp\n.B System Message: {} (line {})\n{}\n",
            level.as_str(),
            line,
            escape(message)
        ),
        Block::Target(_) | Block::TocTree(_) | Block::Directive(_) => String::new(),
    }
}

/// A `tbl` table; cells use text blocks so they may wrap.
fn table_roff(table: &Table) -> String {
    let columns = table.columns().max(1);
    let mut roff = String::from(".sp\n.TS\ncenter;\n");
    roff.push_str(&format!("|{}.\n_\n", vec!["l|"; columns].concat()));
    let row = |cells: &[Vec<Block>]| -> String {
        let cells: Vec<String> = cells
            .iter()
            .map(|cell| format!("T{{\n{}\nT}}", cell_text(cell)))
            .collect();
        format!("{}\n_\n", cells.join("\t"))
    };
    if !table.header.is_empty() {
        roff.push_str(&row(&table.header));
    }
    for cells in &table.rows {
        roff.push_str(&row(cells));
    }
    roff.push_str(".TE\n");
    roff
}

fn cell_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            Block::Paragraph(inlines) | Block::Line(inlines) => Some(inline_text(inlines)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn inline_text(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(text) | Inline::Math(text) => escape(text),
            Inline::Emphasis(text) => format!("\\fI{}\\fP", escape(text)),
            Inline::Strong(text) | Inline::Literal(text) => format!("\\fB{}\\fP", escape(text)),
            Inline::Reference {
                text,
                target: RefTarget::Uri(uri),
            } if text != uri => format!("{} <\\fI{}\\fP>", escape(text), escape(uri)),
            Inline::Reference { text, .. } => escape(text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::BuildEnvironment;
    use crate::writers::testing::project;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_escape() {
        assert_eq!(escape("cut-rewriting"), "cut\\-rewriting");
        assert_eq!(escape(".hidden\nline"), "\\&.hidden\nline");
        assert_eq!(escape("a\\b"), "a\\eb");
    }

    #[test]
    fn test_write_man_page() {
        let docs = project();
        let (env, _) = BuildEnvironment::collect("index", &docs);
        let mut config = BuildConfig::default();
        config.project = "mockturtle".to_string();
        config.release = "v0.1".to_string();
        config.man_pages = vec![ManPage {
            startdoc: "index".to_string(),
            name: "mockturtle".to_string(),
            description: "mockturtle Documentation".to_string(),
            authors: vec!["EPFL LSI".to_string()],
            section: 1,
        }];
        let out = TempDir::new().unwrap();
        let ctx = WriteContext {
            config: &config,
            env: &env,
            documents: &docs,
            output_dir: out.path(),
            config_path: Path::new("conf.py"),
        };

        let report = ManWriter.write(&ctx).unwrap();
        let roff = std::fs::read_to_string(out.path().join("mockturtle.1")).unwrap();
        assert_eq!(report.files.len(), 1);
        assert!(roff.contains(".TH \"MOCKTURTLE\" \"1\""));
        assert!(roff.contains("mockturtle \\- mockturtle Documentation"));
        assert!(roff.contains(".SH INTRODUCTION"));
        assert!(roff.contains(".SS Install"));
        assert!(roff.contains(".SH AUTHOR\nEPFL LSI"));
    }

    #[test]
    fn test_table() {
        let table = Table {
            colwidths: vec![50, 50],
            header: vec![
                vec![Block::Line(vec![Inline::Text("Function".to_string())])],
                vec![Block::Line(vec![Inline::Text("Description".to_string())])],
            ],
            rows: vec![vec![
                vec![Block::Paragraph(vec![Inline::Text("cut_rewriting".to_string())])],
                vec![Block::Line(vec![Inline::Text("Cut rewriting.".to_string())])],
            ]],
            classes: vec![],
        };
        let roff = block(&Block::Table(table));
        assert!(roff.contains(".TS\ncenter;\n|l|l|.\n_\n"));
        assert!(roff.contains("T{\nFunction\nT}\tT{\nDescription\nT}\n_\n"));
        assert!(roff.ends_with(".TE\n"));
    }
}
