//! LaTeX output: one `.tex` file per `latex_documents` entry.

use log::info;

use crate::config::{BuildConfig, LatexDocument};
use crate::document::{Block, Inline, MemberDescription, RefTarget, Table};
use crate::error::BuildError;
use crate::utils;

use super::{capitalize, shifted_blocks, write_file, OutputWriter, WriteContext, WriteReport};

const REPORT_SECTIONS: &[&str] = &["chapter", "section", "subsection", "subsubsection", "paragraph"];
const ARTICLE_SECTIONS: &[&str] = &["section", "subsection", "subsubsection", "paragraph", "subparagraph"];

#[derive(Debug, Default)]
pub struct LatexWriter;

impl OutputWriter for LatexWriter {
    fn name(&self) -> &'static str {
        "latex"
    }

    fn write(&self, ctx: &WriteContext<'_>) -> Result<WriteReport, BuildError> {
        let mut report = WriteReport::default();
        for target in &ctx.config.latex_documents {
            let documents = ctx.target_documents(&target.startdoc, &target.targetname, &mut report.warnings);
            if documents.is_empty() {
                continue;
            }

            let class = document_class(&target.documentclass);
            let mut body = String::new();
            for (doc, depth) in documents {
                let translator = LatexTranslator {
                    docname: &doc.docname,
                    sections: if class == "report" { REPORT_SECTIONS } else { ARTICLE_SECTIONS },
                };
                body.push_str(&format!("\\label{{{}::doc}}\n", doc.docname));
                body.push_str(&translator.blocks(&shifted_blocks(doc, depth)));
            }

            let path = ctx.output_dir.join(&target.targetname);
            write_file(&path, &render_document(ctx.config, target, &body))?;
            info!("Wrote {}", path.display());
            report.files.push(path);
        }
        Ok(report)
    }
}

/// Standard class standing in for Sphinx's `manual` and `howto`.
fn document_class(documentclass: &str) -> &str {
    match documentclass {
        "manual" | "" => "report",
        "howto" => "article",
        other => other,
    }
}

fn render_document(config: &BuildConfig, target: &LatexDocument, body: &str) -> String {
    let elements = &config.latex_elements;
    let mut tex = String::new();
    tex.push_str("%% Generated by refman\n");
    tex.push_str(&format!(
        "\\documentclass[{},{}]{{{}}}\n",
        elements.papersize(),
        elements.pointsize(),
        document_class(&target.documentclass)
    ));
    for package in [
        "[utf8]{inputenc}",
        "[T1]{fontenc}",
        "{amsmath,amssymb}",
        "{longtable}",
        "{fancyvrb}",
        "{float}",
        "{hyperref}",
    ] {
        tex.push_str(&format!("\\usepackage{}\n", package));
    }
    tex.push_str(&format!("\\floatplacement{{figure}}{{{}}}\n", elements.figure_align()));
    if let Some(preamble) = &elements.preamble {
        tex.push_str(preamble);
        if !preamble.ends_with('\n') {
            tex.push('\n');
        }
    }
    tex.push('\n');
    tex.push_str(&format!("\\title{{{}}}\n", escape(&target.title)));
    tex.push_str(&format!("\\author{{{}}}\n", escape(&target.author)));
    tex.push_str(&format!("\\date{{{}}}\n", escape(&config.today())));
    if !config.release.is_empty() {
        tex.push_str(&format!("\\newcommand{{\\release}}{{{}}}\n", escape(&config.release)));
    }
    tex.push_str("\n\\begin{document}\n\\maketitle\n\\tableofcontents\n\n");
    tex.push_str(body);
    tex.push_str("\n\\end{document}\n");
    tex
}

/// Escape LaTeX special characters.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '_' | '%' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '<' => out.push_str("\\textless{}"),
            '>' => out.push_str("\\textgreater{}"),
            _ => out.push(c),
        }
    }
    out
}

struct LatexTranslator<'a> {
    docname: &'a str,
    sections: &'static [&'static str],
}

impl LatexTranslator<'_> {
    fn label(&self, anchor: &str) -> String {
        format!("{}:{}", self.docname, anchor)
    }

    fn blocks(&self, blocks: &[Block]) -> String {
        blocks.iter().map(|block| self.block(block)).collect()
    }

    fn block(&self, block: &Block) -> String {
        match block {
            Block::Title { inlines, level, id, .. } => {
                let command = self.sections[((*level).max(1) - 1).min(self.sections.len() - 1)];
                format!(
                    "\\{}{{{}}}\\label{{{}}}\n\n",
                    command,
                    self.inlines(inlines),
                    self.label(id)
                )
            }
            Block::Paragraph(inlines) => format!("{}\n\n", self.inlines(inlines)),
            Block::Line(inlines) => self.inlines(inlines),
            Block::LiteralBlock { code, caption, .. } => {
                let mut tex = String::new();
                if let Some(caption) = caption {
                    tex.push_str(&format!("\\textit{{{}}}\n", escape(caption)));
                }
                tex.push_str("\\begin{Verbatim}\n");
                tex.push_str(code);
                tex.push_str("\n\\end{Verbatim}\n\n");
                tex
            }
            Block::List { ordered, items } => {
                let env = if *ordered { "enumerate" } else { "itemize" };
                let mut tex = format!("\\begin{{{}}}\n", env);
                for item in items {
                    tex.push_str(&format!("\\item {}\n", self.inlines(item)));
                }
                tex.push_str(&format!("\\end{{{}}}\n\n", env));
                tex
            }
            Block::BlockQuote(body) => format!("\\begin{{quote}}\n{}\\end{{quote}}\n\n", self.blocks(body)),
            Block::Target(name) => format!("\\label{{{}}}\n", self.label(&utils::make_id(name))),
            Block::Table(table) => self.table(table),
            Block::Admonition { kind, title, body } => {
                let title = title.clone().unwrap_or_else(|| capitalize(kind));
                format!(
                    "\\begin{{quote}}\n\\textbf{{{}:}}\n\n{}\\end{{quote}}\n\n",
                    escape(&title),
                    self.blocks(body)
                )
            }
            Block::Math { latex, label } => match label {
                Some(label) => format!(
                    "\\begin{{equation}}\\label{{equation:{}}}\n{}\n\\end{{equation}}\n\n",
                    utils::make_id(label),
                    latex
                ),
                None => format!("\\begin{{equation*}}\n{}\n\\end{{equation*}}\n\n", latex),
            },
            // Document structure comes from the toctree walk.
            Block::TocTree(_) => String::new(),
            Block::Member(member) => self.member(member),
            Block::SystemMessage { level, message, line } => format!(
                "\\textbf{{System Message: {} ({}, line {})}} {}\n\n",
                level.as_str(),
                escape(self.docname),
                line,
                escape(message)
            ),
            Block::Directive(_) => String::new(),
        }
    }

    fn table(&self, table: &Table) -> String {
        let columns: String = table
            .percentages()
            .iter()
            .map(|p| format!("p{{{:.2}\\linewidth}}|", f64::from(*p) / 100.0 - 0.03))
            .collect();
        let mut tex = format!("\\begin{{longtable}}{{|{}}}\n\\hline\n", columns);
        if !table.header.is_empty() {
            let cells: Vec<String> = table
                .header
                .iter()
                .map(|cell| format!("\\textbf{{{}}}", self.cell(cell)))
                .collect();
            tex.push_str(&format!("{} \\\\\n\\hline\n\\endhead\n", cells.join(" & ")));
        }
        for row in &table.rows {
            let cells: Vec<String> = row.iter().map(|cell| self.cell(cell)).collect();
            tex.push_str(&format!("{} \\\\\n\\hline\n", cells.join(" & ")));
        }
        tex.push_str("\\end{longtable}\n\n");
        tex
    }

    fn cell(&self, blocks: &[Block]) -> String {
        self.blocks(blocks).trim().to_string()
    }

    fn member(&self, member: &MemberDescription) -> String {
        let mut tex = format!(
            "\\begin{{description}}\n\\item[\\texttt{{{}}}]\\label{{{}}}\n",
            escape(&member.signature),
            self.label(&member.id)
        );
        if let Some(brief) = &member.brief {
            tex.push_str(&escape(brief));
            tex.push('\n');
        }
        for paragraph in &member.detailed {
            tex.push('\n');
            tex.push_str(&escape(paragraph));
            tex.push('\n');
        }
        tex.push_str("\\end{description}\n\n");
        tex
    }

    fn inlines(&self, inlines: &[Inline]) -> String {
        inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text(text) => escape(text),
                Inline::Emphasis(text) => format!("\\emph{{{}}}", escape(text)),
                Inline::Strong(text) => format!("\\textbf{{{}}}", escape(text)),
                Inline::Literal(text) => format!("\\texttt{{{}}}", escape(text)),
                Inline::Math(latex) => format!("\\({}\\)", latex),
                Inline::Reference { text, target } => self.reference(text, target),
            })
            .collect()
    }

    fn reference(&self, text: &str, target: &RefTarget) -> String {
        match target {
            RefTarget::Uri(uri) => format!("\\href{{{}}}{{{}}}", escape_url(uri), escape(text)),
            RefTarget::Anchor(anchor) => format!("\\hyperref[{}]{{{}}}", self.label(anchor), escape(text)),
            RefTarget::Internal { docname, anchor } => {
                let label = match anchor {
                    Some(anchor) => format!("{}:{}", docname, anchor),
                    None => format!("{}::doc", docname),
                };
                format!("\\hyperref[{}]{{{}}}", label, escape(text))
            }
            RefTarget::Doc(_) | RefTarget::Label(_) => escape(text),
        }
    }
}

fn escape_url(uri: &str) -> String {
    uri.replace('%', "\\%").replace('#', "\\#")
}
