//! Texinfo output, one `.texi` file per `texinfo_documents` entry. Every
//! document below the start document becomes a node; nodes are linked by
//! menus following the toctree hierarchy.

use log::info;
use std::collections::HashSet;

use crate::config::{BuildConfig, TexinfoDocument};
use crate::document::{Block, Document, Inline, RefTarget, Table};
use crate::error::BuildError;

use super::{capitalize, write_file, OutputWriter, WriteContext, WriteReport};

const SECTIONS: &[&str] = &["chapter", "section", "subsection", "subsubsection"];

#[derive(Debug, Default)]
pub struct TexinfoWriter;

impl OutputWriter for TexinfoWriter {
    fn name(&self) -> &'static str {
        "texinfo"
    }

    fn write(&self, ctx: &WriteContext<'_>) -> Result<WriteReport, BuildError> {
        let mut report = WriteReport::default();
        for target in &ctx.config.texinfo_documents {
            let file_name = format!("{}.texi", target.targetname);
            let documents = ctx.target_documents(&target.startdoc, &file_name, &mut report.warnings);
            let (start, rest) = match documents.split_first() {
                Some((start, rest)) => (start.0, rest),
                None => continue,
            };

            let mut names = NodeNames::default();
            let nodes: Vec<(&Document, usize, String)> = rest
                .iter()
                .map(|(doc, depth)| (*doc, *depth, names.unique(&doc.title)))
                .collect();

            let mut texi = header(ctx.config, target);
            texi.push_str(&blocks(&body_of(start)));
            texi.push_str(&menu(&nodes, 0, 0));

            for (index, (doc, depth, name)) in nodes.iter().enumerate() {
                let command = SECTIONS[(depth - 1).min(SECTIONS.len() - 1)];
                texi.push_str(&format!("\n@node {}\n@{} {}\n\n", name, command, escape(&doc.title)));
                texi.push_str(&blocks(&body_of(doc)));
                texi.push_str(&menu(&nodes, index + 1, *depth));
            }
            texi.push_str("\n@bye\n");

            let path = ctx.output_dir.join(&file_name);
            write_file(&path, &texi)?;
            info!("Wrote {}", path.display());
            report.files.push(path);
        }
        Ok(report)
    }
}

fn header(config: &BuildConfig, target: &TexinfoDocument) -> String {
    let mut texi = String::new();
    texi.push_str("\\input texinfo   @c -*-texinfo-*-\n");
    texi.push_str("@c %**start of header\n");
    texi.push_str(&format!("@setfilename {}.info\n", target.targetname));
    texi.push_str("@documentencoding UTF-8\n");
    texi.push_str("@ifinfo\n@*Generated by refman@*\n@end ifinfo\n");
    texi.push_str(&format!("@settitle {}\n", escape(&target.title)));
    texi.push_str("@paragraphindent 0\n@exampleindent 4\n@finalout\n");
    texi.push_str(&format!("@dircategory {}\n", escape(&target.category)));
    texi.push_str("@direntry\n");
    texi.push_str(&format!(
        "* {}: ({}.info). {}\n",
        escape(&target.dir_entry),
        target.targetname,
        escape(&target.description)
    ));
    texi.push_str("@end direntry\n@c %**end of header\n\n");

    texi.push_str("@copying\n@quotation\n");
    texi.push_str(&format!("{} {}", escape(&config.project), escape(&config.release)));
    if !config.copyright.is_empty() {
        texi.push_str(&format!(", {}", escape(&config.today())));
        texi.push_str(&format!("\n\nCopyright @copyright{{}} {}", escape(&config.copyright)));
    }
    texi.push_str("\n@end quotation\n@end copying\n\n");

    texi.push_str("@titlepage\n");
    texi.push_str(&format!("@title {}\n", escape(&target.title)));
    texi.push_str(&format!("@author {}\n", escape(&target.author)));
    texi.push_str("@page\n@vskip 0pt plus 1filll\n@insertcopying\n@end titlepage\n@contents\n\n");
    texi.push_str("@ifnottex\n@node Top\n");
    texi.push_str(&format!("@top {}\n@end ifnottex\n\n", escape(&target.title)));
    texi
}

/// Menu of the nodes directly below the node ending at `from`, whose depth
/// is `depth`.
fn menu(nodes: &[(&Document, usize, String)], from: usize, depth: usize) -> String {
    let children: Vec<&str> = nodes[from..]
        .iter()
        .take_while(|(_, d, _)| *d > depth)
        .filter(|(_, d, _)| *d == depth + 1)
        .map(|(_, _, name)| name.as_str())
        .collect();
    if children.is_empty() {
        return String::new();
    }
    let mut texi = String::from("\n@menu\n");
    for name in children {
        texi.push_str(&format!("* {}::\n", name));
    }
    texi.push_str("@end menu\n");
    texi
}

/// Document blocks without the document title, which becomes the node's
/// heading.
fn body_of(doc: &Document) -> Vec<Block> {
    let mut seen_title = false;
    doc.blocks
        .iter()
        .filter(|block| match block {
            Block::Title { level: 1, .. } if !seen_title => {
                seen_title = true;
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

/// Node names must be unique and may not contain `,` `:` `.` or parentheses.
#[derive(Default)]
struct NodeNames {
    used: HashSet<String>,
}

impl NodeNames {
    fn unique(&mut self, title: &str) -> String {
        let base: String = escape(title)
            .chars()
            .map(|c| if matches!(c, ',' | ':' | '.' | '(' | ')') { ' ' } else { c })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let base = if base.is_empty() || base == "Top" { "Untitled".to_string() } else { base };
        let mut name = base.clone();
        let mut counter = 2;
        while !self.used.insert(name.clone()) {
            name = format!("{} <{}>", base, counter);
            counter += 1;
        }
        name
    }
}

/// Escape Texinfo special characters.
pub fn escape(text: &str) -> String {
    text.replace('@', "@@").replace('{', "@{").replace('}', "@}")
}

fn blocks(blocks: &[Block]) -> String {
    blocks.iter().map(block).collect()
}

fn block(block: &Block) -> String {
    match block {
        Block::Title { inlines, level, .. } => {
            let command = match level {
                0..=2 => "heading",
                3 => "subheading",
                _ => "subsubheading",
            };
            format!("@{} {}\n\n", command, inline_text(inlines))
        }
        Block::Paragraph(inlines) => format!("{}\n\n", inline_text(inlines)),
        Block::Line(inlines) => format!("{}@*\n", inline_text(inlines)),
        Block::LiteralBlock { code, .. } => format!("@example\n{}\n@end example\n\n", escape(code)),
        Block::List { ordered, items } => {
            let (open, close) = if *ordered {
                ("@enumerate\n", "@end enumerate\n\n")
            } else {
                ("@itemize @bullet\n", "@end itemize\n\n")
            };
            let mut texi = String::from(open);
            for item in items {
                texi.push_str(&format!("@item\n{}\n", inline_text(item)));
            }
            texi.push_str(close);
            texi
        }
        Block::BlockQuote(body) => format!("@quotation\n{}@end quotation\n\n", blocks(body)),
        Block::Table(table) => table_texi(table),
        Block::Admonition { kind, title, body } => {
            let title = title.clone().unwrap_or_else(|| capitalize(kind));
            format!("@cartouche\n@quotation {}\n{}@end quotation\n@end cartouche\n\n", escape(&title), blocks(body))
        }
        Block::Math { latex, .. } => format!("@example\n{}\n@end example\n\n", escape(latex)),
        Block::Member(member) => {
            let mut texi = format!("@deffn {{C++ {}}} {{{}}}\n", escape(&member.kind), escape(&member.signature));
            if let Some(brief) = &member.brief {
                texi.push_str(&escape(brief));
                texi.push('\n');
            }
            for paragraph in &member.detailed {
                texi.push('\n');
                texi.push_str(&escape(paragraph));
                texi.push('\n');
            }
            texi.push_str("@end deffn\n\n");
            texi
        }
        Block::SystemMessage { level, message, line } => format!(
            "@strong{{System Message: {} (line {})}} {}\n\n",
            level.as_str(),
            line,
            escape(message)
        ),
        Block::Target(_) | Block::TocTree(_) | Block::Directive(_) => String::new(),
    }
}

fn table_texi(table: &Table) -> String {
    let fractions: Vec<String> = table
        .percentages()
        .iter()
        .map(|p| format!("{:.2}", f64::from(*p) / 100.0))
        .collect();
    let mut texi = format!("@multitable @columnfractions {}\n", fractions.join(" "));
    let row = |command: &str, cells: &[Vec<Block>]| -> String {
        let cells: Vec<String> = cells.iter().map(|cell| cell_text(cell)).collect();
        format!("@{} {}\n", command, cells.join("\n@tab "))
    };
    if !table.header.is_empty() {
        texi.push_str(&row("headitem", &table.header));
    }
    for cells in &table.rows {
        texi.push_str(&row("item", cells));
    }
    texi.push_str("@end multitable\n\n");
    texi
}

fn cell_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            Block::Paragraph(inlines) | Block::Line(inlines) => Some(inline_text(inlines)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn inline_text(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(text) => escape(text),
            Inline::Emphasis(text) => format!("@emph{{{}}}", escape(text)),
            Inline::Strong(text) => format!("@strong{{{}}}", escape(text)),
            Inline::Literal(text) => format!("@code{{{}}}", escape(text)),
            Inline::Math(text) => format!("@math{{{}}}", escape(text)),
            Inline::Reference {
                text,
                target: RefTarget::Uri(uri),
            } => format!("@uref{{{},{}}}", escape(uri).replace(',', "@comma{}"), escape(text)),
            Inline::Reference { text, .. } => escape(text),
        })
        .collect()
}
