use anyhow::Result;
use log::debug;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as MarkdownParser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::config::BuildConfig;
use crate::document::{Block, DirectiveCall, Document, Inline, RefTarget};
use crate::inline::InlineParser;
use crate::utils;

/// Characters allowed in section title adornments.
const ADORNMENT_CHARS: &str = "=-~^\"'*+#<>`_";

/// reStructuredText and Markdown parser
pub struct Parser {
    rst_directive_regex: Regex,
    link_target_regex: Regex,
    substitution_regex: Regex,
    option_regex: Regex,
    enumerator_regex: Regex,
    inline: InlineParser,
}

/// Per-document parse state.
#[derive(Default)]
struct RstState {
    /// Title styles in order of first use; the index is the level.
    styles: Vec<(char, bool)>,
    ids: HashSet<String>,
    /// External targets defined with `.. _name: url`.
    links: Vec<(String, String)>,
}

impl RstState {
    fn level_for(&mut self, style: (char, bool)) -> usize {
        match self.styles.iter().position(|s| *s == style) {
            Some(pos) => pos + 1,
            None => {
                self.styles.push(style);
                self.styles.len()
            }
        }
    }

    fn unique_id(&mut self, text: &str) -> String {
        let base = match utils::make_id(text) {
            id if id.is_empty() => "section".to_string(),
            id => id,
        };
        let mut id = base.clone();
        let mut n = 1;
        while !self.ids.insert(id.clone()) {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        id
    }
}

impl Parser {
    /// Create a parser with the substitutions of `config`
    pub fn new(config: &BuildConfig) -> Result<Self> {
        // Match directive names with hyphens (e.g., code-block, doc_overview_table)
        let rst_directive_regex = Regex::new(r"^\.\.\s+([\w-]+)::\s*(.*?)\s*$")?;
        let link_target_regex = Regex::new(r"^\.\.\s+_([^:]+|`[^`]+`):\s*(.*?)\s*$")?;
        let substitution_regex = Regex::new(r"^\.\.\s+\|([^|]+)\|\s+replace::\s*(.*?)\s*$")?;
        let option_regex = Regex::new(r"^:([\w][\w-]*):(?:\s+(.*?))?\s*$")?;
        let enumerator_regex = Regex::new(r"^(?:\d+|#|[a-z])[.)]\s+")?;

        let mut inline = InlineParser::new();
        inline.add_substitution("project", &config.project);
        inline.add_substitution("version", &config.version);
        inline.add_substitution("release", &config.release);
        inline.add_substitution("today", &config.today());
        inline.add_substitution("copyright", &config.copyright);

        Ok(Self {
            rst_directive_regex,
            link_target_regex,
            substitution_regex,
            option_regex,
            enumerator_regex,
            inline,
        })
    }

    pub fn inline(&self) -> &InlineParser {
        &self.inline
    }

    /// Parse a source file into a document
    pub fn parse(&self, file_path: &Path, docname: &str, content: &str) -> Result<Document> {
        let mut document = Document::new(file_path.to_path_buf(), docname);

        let extension = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        document.blocks = match extension {
            "md" | "markdown" => self.parse_markdown(content),
            _ => self.parse_rst(content),
        };
        document.title = document
            .first_title()
            .unwrap_or_else(|| docname.rsplit('/').next().unwrap_or(docname).to_string());

        debug!(
            "Parsed document: {} ({} blocks)",
            file_path.display(),
            document.blocks.len()
        );

        Ok(document)
    }

    /// Parse a complete reStructuredText document.
    pub fn parse_rst(&self, content: &str) -> Vec<Block> {
        let lines = expand_tabs(content);
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();

        let mut inline = self.inline.clone();
        for line in &lines {
            if let Some(caps) = self.substitution_regex.captures(line) {
                inline.add_substitution(caps[1].trim(), &caps[2]);
            }
        }

        let mut state = RstState::default();
        let mut blocks = self.parse_lines(&lines, 0, &mut state, &inline);
        if !state.links.is_empty() {
            resolve_named_links(&mut blocks, &state.links);
        }
        blocks
    }

    /// Parse directive content (already dedented) starting at `first_line`.
    pub fn parse_fragment(&self, lines: &[String], first_line: usize) -> Vec<Block> {
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut state = RstState::default();
        self.parse_lines(&lines, first_line.saturating_sub(1), &mut state, &self.inline)
    }

    pub fn parse_inline(&self, text: &str) -> Vec<Inline> {
        self.inline.parse(text)
    }

    fn parse_lines(
        &self,
        lines: &[&str],
        offset: usize,
        state: &mut RstState,
        inline: &InlineParser,
    ) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();
            let lineno = offset + i + 1;

            if trimmed.is_empty() {
                i += 1;
                continue;
            }

            // Indented text at this level is a block quote
            if indent_of(line) > 0 {
                let (quote_lines, consumed) = take_indented(&lines[i..]);
                let quote_lines: Vec<&str> = quote_lines.iter().map(String::as_str).collect();
                let body = self.parse_lines(&quote_lines, offset + i, state, inline);
                if !body.is_empty() {
                    blocks.push(Block::BlockQuote(body));
                }
                i += consumed;
                continue;
            }

            if let Some(captures) = self.rst_directive_regex.captures(line) {
                let (call, consumed) =
                    self.parse_rst_directive(&lines[i..], &captures[1], &captures[2], lineno);
                blocks.push(Block::Directive(call));
                i += consumed;
                continue;
            }

            if trimmed.starts_with("..") && (trimmed == ".." || trimmed.starts_with(".. ")) {
                if let Some(captures) = self.link_target_regex.captures(trimmed) {
                    let name = captures[1].trim_matches('`');
                    let url = &captures[2];
                    if url.is_empty() {
                        blocks.push(Block::Target(utils::normalize_name(name)));
                    } else {
                        state.links.push((utils::make_id(name), url.to_string()));
                    }
                }
                // Comments, substitution definitions and targets may run
                // over indented continuation lines.
                let (_, consumed) = take_indented(&lines[i + 1..]);
                i += 1 + consumed;
                continue;
            }

            // Title with overline
            if let Some(c) = adornment_char(trimmed) {
                if i + 2 < lines.len()
                    && !lines[i + 1].trim().is_empty()
                    && adornment_char(lines[i + 2].trim()) == Some(c)
                {
                    let text = lines[i + 1].trim();
                    let level = state.level_for((c, true));
                    blocks.push(Block::Title {
                        inlines: inline.parse(text),
                        level,
                        id: state.unique_id(text),
                        line: lineno + 1,
                    });
                    i += 3;
                    continue;
                }
                // Transition
                i += 1;
                continue;
            }

            // Title with underline only
            if i + 1 < lines.len() {
                let underline = lines[i + 1].trim();
                if let Some(c) = adornment_char(underline) {
                    if indent_of(lines[i + 1]) == 0
                        && underline.chars().count() >= trimmed.chars().count()
                    {
                        let level = state.level_for((c, false));
                        blocks.push(Block::Title {
                            inlines: inline.parse(trimmed),
                            level,
                            id: state.unique_id(trimmed),
                            line: lineno,
                        });
                        i += 2;
                        continue;
                    }
                }
            }

            if let Some(marker_len) = bullet_marker(line) {
                let (items, consumed) = self.parse_list(&lines[i..], marker_len, |l| bullet_marker(l));
                blocks.push(Block::List {
                    ordered: false,
                    items: items.iter().map(|item| inline.parse(item)).collect(),
                });
                i += consumed;
                continue;
            }

            if let Some(m) = self.enumerator_regex.find(line) {
                let marker_len = m.end();
                let regex = &self.enumerator_regex;
                let (items, consumed) =
                    self.parse_list(&lines[i..], marker_len, |l| regex.find(l).map(|m| m.end()));
                blocks.push(Block::List {
                    ordered: true,
                    items: items.iter().map(|item| inline.parse(item)).collect(),
                });
                i += consumed;
                continue;
            }

            let (paragraph, consumed) = self.parse_paragraph(&lines[i..]);
            i += consumed;

            if let Some(stripped) = paragraph.strip_suffix("::") {
                let text = if stripped.is_empty() || stripped.ends_with(char::is_whitespace) {
                    stripped.trim_end().to_string()
                } else {
                    format!("{}:", stripped)
                };
                if !text.is_empty() {
                    blocks.push(Block::Paragraph(inline.parse(&text)));
                }
                let (code, consumed) = self.parse_code_block(&lines[i..]);
                if !code.is_empty() {
                    blocks.push(Block::LiteralBlock {
                        language: None,
                        code,
                        caption: None,
                    });
                }
                i += consumed;
                continue;
            }

            blocks.push(Block::Paragraph(inline.parse(&paragraph)));
        }

        blocks
    }

    fn parse_rst_directive(
        &self,
        lines: &[&str],
        name: &str,
        args: &str,
        start_line: usize,
    ) -> (DirectiveCall, usize) {
        let (body, consumed) = take_indented(&lines[1..]);
        let mut call = DirectiveCall::new(name, args, start_line);

        // Options come first, directly after the directive line
        let mut i = 0;
        while i < body.len() {
            let line = body[i].trim_end();
            match self.option_regex.captures(line) {
                Some(captures) => {
                    let value = captures.get(2).map(|m| m.as_str()).unwrap_or("");
                    call.options.insert(captures[1].to_string(), value.to_string());
                    i += 1;
                }
                None => break,
            }
        }

        while i < body.len() && body[i].trim().is_empty() {
            i += 1;
        }
        call.content = body[i..].iter().map(|l| l.trim_end().to_string()).collect();

        (call, 1 + consumed)
    }

    fn parse_list<F>(&self, lines: &[&str], first_marker: usize, marker: F) -> (Vec<String>, usize)
    where
        F: Fn(&str) -> Option<usize>,
    {
        let mut items: Vec<String> = Vec::new();
        let mut current = lines[0][first_marker..].trim().to_string();
        let mut i = 1;

        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                // A blank line ends the list unless another item follows
                let next = lines[i..].iter().position(|l| !l.trim().is_empty());
                match next {
                    Some(pos) if marker(lines[i + pos]).is_some() && indent_of(lines[i + pos]) == 0 => {
                        i += pos;
                        continue;
                    }
                    Some(pos) if indent_of(lines[i + pos]) > 0 => {
                        i += pos;
                        continue;
                    }
                    _ => break,
                }
            }
            if indent_of(line) == 0 {
                match marker(line) {
                    Some(len) => {
                        items.push(std::mem::take(&mut current));
                        current = line[len..].trim().to_string();
                    }
                    None => break,
                }
            } else {
                let text = line.trim();
                let text = bullet_marker(text)
                    .map(|len| &text[len..])
                    .unwrap_or(text);
                current.push(' ');
                current.push_str(text.trim());
            }
            i += 1;
        }
        items.push(current);

        (items, i)
    }

    fn parse_code_block(&self, lines: &[&str]) -> (String, usize) {
        let start = match lines.iter().position(|l| !l.trim().is_empty()) {
            Some(pos) if indent_of(lines[pos]) > 0 => pos,
            _ => return (String::new(), 0),
        };
        let (body, consumed) = take_indented(&lines[start..]);
        (body.join("\n").trim_end().to_string(), start + consumed)
    }

    fn parse_paragraph(&self, lines: &[&str]) -> (String, usize) {
        let mut content = String::new();
        let mut consumed_lines = 0;

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || (consumed_lines > 0 && indent_of(line) > 0) {
                break;
            }

            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str(trimmed);
            consumed_lines += 1;
        }

        (content, consumed_lines)
    }

    /// Parse CommonMark. Fenced blocks whose info string is `{name} args`
    /// are directives, MyST style.
    pub fn parse_markdown(&self, content: &str) -> Vec<Block> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_MATH);

        let mut state = RstState::default();
        let mut builder = MarkdownBuilder::default();

        for (event, range) in MarkdownParser::new_ext(content, options).into_offset_iter() {
            let line = content[..range.start].matches('\n').count() + 1;
            match event {
                Event::Start(Tag::Heading { .. }) | Event::Start(Tag::Paragraph) => {
                    builder.inlines.clear();
                }
                Event::End(TagEnd::Heading(level)) => {
                    let inlines = std::mem::take(&mut builder.inlines);
                    let text = crate::document::plain_text(&inlines);
                    builder.push(Block::Title {
                        inlines,
                        level: level as usize,
                        id: state.unique_id(&text),
                        line,
                    });
                }
                Event::End(TagEnd::Paragraph) => {
                    if builder.lists.is_empty() {
                        let inlines = std::mem::take(&mut builder.inlines);
                        builder.push(Block::Paragraph(inlines));
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    builder.code = Some((
                        match kind {
                            CodeBlockKind::Fenced(info) => info.to_string(),
                            CodeBlockKind::Indented => String::new(),
                        },
                        String::new(),
                        line,
                    ));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((info, code, start)) = builder.code.take() {
                        let block = self.markdown_code_block(&info, &code, start);
                        builder.push(block);
                    }
                }
                Event::Start(Tag::List(start)) => {
                    builder.lists.push((start.is_some(), Vec::new()));
                }
                Event::Start(Tag::Item) => {
                    builder.inlines.clear();
                }
                Event::End(TagEnd::Item) => {
                    let inlines = std::mem::take(&mut builder.inlines);
                    if let Some((_, items)) = builder.lists.last_mut() {
                        items.push(inlines);
                    }
                }
                Event::End(TagEnd::List(_)) => {
                    if let Some((ordered, items)) = builder.lists.pop() {
                        match builder.lists.last_mut().and_then(|(_, parent)| parent.last_mut()) {
                            // Nested lists are folded into the parent item
                            Some(parent_item) => {
                                for item in items {
                                    parent_item.push(Inline::Text(" ".to_string()));
                                    parent_item.extend(item);
                                }
                            }
                            None => builder.push(Block::List { ordered, items }),
                        }
                    }
                }
                Event::Start(Tag::BlockQuote { .. }) => builder.containers.push(Vec::new()),
                Event::End(TagEnd::BlockQuote { .. }) => {
                    if let Some(body) = builder.containers.pop() {
                        builder.push(Block::BlockQuote(body));
                    }
                }
                Event::Start(Tag::Emphasis) => builder.spans.push((SpanKind::Emphasis, String::new())),
                Event::Start(Tag::Strong) => builder.spans.push((SpanKind::Strong, String::new())),
                Event::Start(Tag::Link { dest_url, .. }) => builder
                    .spans
                    .push((SpanKind::Link(dest_url.to_string()), String::new())),
                Event::End(TagEnd::Emphasis) | Event::End(TagEnd::Strong) | Event::End(TagEnd::Link) => {
                    if let Some((kind, text)) = builder.spans.pop() {
                        let node = match kind {
                            SpanKind::Emphasis => Inline::Emphasis(text),
                            SpanKind::Strong => Inline::Strong(text),
                            SpanKind::Link(url) => Inline::Reference {
                                text,
                                target: markdown_target(&url),
                            },
                        };
                        builder.push_inline(node);
                    }
                }
                Event::Text(text) => {
                    if let Some((_, code, _)) = builder.code.as_mut() {
                        code.push_str(&text);
                    } else {
                        builder.push_text(&text);
                    }
                }
                Event::Code(code) => builder.push_inline(Inline::Literal(code.to_string())),
                Event::InlineMath(math) | Event::DisplayMath(math) => {
                    builder.push_inline(Inline::Math(math.to_string()))
                }
                Event::SoftBreak | Event::HardBreak => builder.push_text(" "),
                _ => {}
            }
        }

        builder.finish()
    }

    fn markdown_code_block(&self, info: &str, code: &str, line: usize) -> Block {
        let info = info.trim();
        if let Some(rest) = info.strip_prefix('{') {
            if let Some(close) = rest.find('}') {
                let name = rest[..close].trim();
                let args = rest[close + 1..].trim();
                let mut call = DirectiveCall::new(name, args, line);
                let lines: Vec<&str> = code.lines().collect();
                let mut i = 0;
                while i < lines.len() {
                    match self.option_regex.captures(lines[i].trim_end()) {
                        Some(captures) => {
                            let value = captures.get(2).map(|m| m.as_str()).unwrap_or("");
                            call.options.insert(captures[1].to_string(), value.to_string());
                            i += 1;
                        }
                        None => break,
                    }
                }
                while i < lines.len() && lines[i].trim().is_empty() {
                    i += 1;
                }
                call.content = lines[i..].iter().map(|l| l.to_string()).collect();
                return Block::Directive(call);
            }
        }

        let language = info.split_whitespace().next().map(str::to_string);
        Block::LiteralBlock {
            language,
            code: code.trim_end_matches('\n').to_string(),
            caption: None,
        }
    }
}

enum SpanKind {
    Emphasis,
    Strong,
    Link(String),
}

#[derive(Default)]
struct MarkdownBuilder {
    blocks: Vec<Block>,
    containers: Vec<Vec<Block>>,
    inlines: Vec<Inline>,
    spans: Vec<(SpanKind, String)>,
    lists: Vec<(bool, Vec<Vec<Inline>>)>,
    code: Option<(String, String, usize)>,
}

impl MarkdownBuilder {
    fn push(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(container) => container.push(block),
            None => self.blocks.push(block),
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, span)) = self.spans.last_mut() {
            span.push_str(text);
            return;
        }
        match self.inlines.last_mut() {
            Some(Inline::Text(prev)) => prev.push_str(text),
            _ => self.inlines.push(Inline::Text(text.to_string())),
        }
    }

    fn push_inline(&mut self, node: Inline) {
        if let Some((_, span)) = self.spans.last_mut() {
            span.push_str(&crate::document::plain_text(std::slice::from_ref(&node)));
            return;
        }
        self.inlines.push(node);
    }

    fn finish(mut self) -> Vec<Block> {
        while let Some(body) = self.containers.pop() {
            self.push(Block::BlockQuote(body));
        }
        self.blocks
    }
}

fn markdown_target(url: &str) -> RefTarget {
    if url.contains("://") || url.starts_with("mailto:") {
        return RefTarget::Uri(url.to_string());
    }
    if let Some(anchor) = url.strip_prefix('#') {
        return RefTarget::Anchor(anchor.to_string());
    }
    let path = url.split('#').next().unwrap_or(url);
    let docname = [".md", ".rst", ".html"]
        .iter()
        .find_map(|suffix| path.strip_suffix(suffix))
        .unwrap_or(path);
    RefTarget::Doc(docname.to_string())
}

/// Replace `` `name`_ `` anchors that name an external target with its URI.
fn resolve_named_links(blocks: &mut [Block], links: &[(String, String)]) {
    let lookup = |id: &str| links.iter().find(|(name, _)| name == id).map(|(_, url)| url.clone());
    let fix = |inlines: &mut Vec<Inline>| {
        for inline in inlines.iter_mut() {
            if let Inline::Reference { target, .. } = inline {
                if let RefTarget::Anchor(id) = target {
                    if let Some(url) = lookup(id) {
                        *target = RefTarget::Uri(url);
                    }
                }
            }
        }
    };
    for block in blocks.iter_mut() {
        match block {
            Block::Title { inlines, .. } | Block::Paragraph(inlines) | Block::Line(inlines) => {
                fix(inlines)
            }
            Block::List { items, .. } => items.iter_mut().for_each(|item| fix(item)),
            Block::BlockQuote(body) => resolve_named_links(body, links),
            _ => {}
        }
    }
}

fn expand_tabs(content: &str) -> Vec<String> {
    content.lines().map(|l| l.replace('\t', "        ")).collect()
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// The adornment character if `text` is a run of one punctuation character.
fn adornment_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let first = chars.next()?;
    if text.chars().count() < 2 || !ADORNMENT_CHARS.contains(first) {
        return None;
    }
    chars.all(|c| c == first).then_some(first)
}

fn bullet_marker(line: &str) -> Option<usize> {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some('-' | '*' | '+'), Some(' ')) => Some(2),
        _ => None,
    }
}

/// Take the indented block at the start of `lines` (blank lines included
/// when followed by more indented text) and return it dedented.
fn take_indented(lines: &[&str]) -> (Vec<String>, usize) {
    let mut end = 0;
    let mut last_content = 0;
    while end < lines.len() {
        let line = lines[end];
        if line.trim().is_empty() {
            end += 1;
            continue;
        }
        if indent_of(line) == 0 {
            break;
        }
        end += 1;
        last_content = end;
    }

    let block = &lines[..last_content];
    let indent = block
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    let dedented = block
        .iter()
        .map(|l| if l.len() >= indent { l[indent..].to_string() } else { String::new() })
        .collect();

    (dedented, last_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_parser() -> Parser {
        let config = BuildConfig {
            version: "v0.3".to_string(),
            ..BuildConfig::default()
        };
        Parser::new(&config).unwrap()
    }

    fn parse_rst_content(parser: &Parser, content: &str) -> Document {
        parser.parse(Path::new("index.rst"), "index", content).unwrap()
    }

    fn titles(doc: &Document) -> Vec<(String, usize, String)> {
        doc.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Title { inlines, level, id, .. } => {
                    Some((crate::document::plain_text(inlines), *level, id.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_title_levels_follow_first_use() {
        let parser = create_parser();
        let content = r#"Main Title
~~~~~~~~~~

Some intro text.

Subsection
==========

More text.

Another
~~~~~~~
"#;
        let doc = parse_rst_content(&parser, content);

        assert_eq!(doc.title, "Main Title");
        assert_eq!(
            titles(&doc),
            vec![
                ("Main Title".to_string(), 1, "main-title".to_string()),
                ("Subsection".to_string(), 2, "subsection".to_string()),
                ("Another".to_string(), 1, "another".to_string()),
            ]
        );
    }

    #[test]
    fn test_overlined_title_differs_from_underlined() {
        let parser = create_parser();
        let content = "=====\nTitle\n=====\n\nText\n=====\n\nbody\n";
        let doc = parse_rst_content(&parser, content);
        let levels: Vec<usize> = titles(&doc).into_iter().map(|t| t.1).collect();
        assert_eq!(levels, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_titles_get_unique_ids() {
        let parser = create_parser();
        let content = "Usage\n=====\n\nUsage\n=====\n";
        let doc = parse_rst_content(&parser, content);
        let ids: Vec<String> = titles(&doc).into_iter().map(|t| t.2).collect();
        assert_eq!(ids, vec!["usage", "usage-1"]);
    }

    #[test]
    fn test_title_with_non_breaking_spaces() {
        let parser = create_parser();
        let content = "`attrs`\u{00A0}\u{00A0}(x)\n^^^^^^^^^^^^\n\nType: text\n";
        let doc = parse_rst_content(&parser, content);
        assert_eq!(titles(&doc).len(), 1);
    }

    #[test]
    fn test_directive_with_options_and_content() {
        let parser = create_parser();
        let content = r#"Algorithms
==========

.. doc_overview_table:: namespacemockturtle
   :column: Algorithm

   cut_rewriting
   refactoring

After.
"#;
        let doc = parse_rst_content(&parser, content);
        let call = doc.pending_directives().next().unwrap();

        assert_eq!(call.name, "doc_overview_table");
        assert_eq!(call.arguments, "namespacemockturtle");
        assert_eq!(call.options.get("column").map(String::as_str), Some("Algorithm"));
        assert_eq!(call.content, vec!["cut_rewriting", "refactoring"]);
        assert_eq!(call.line, 4);
        assert!(matches!(doc.blocks.last(), Some(Block::Paragraph(_))));
    }

    #[test]
    fn test_flag_option_without_value() {
        let parser = create_parser();
        let doc = parse_rst_content(&parser, ".. toctree::\n   :hidden:\n   :maxdepth: 2\n\n   intro\n");
        let call = doc.pending_directives().next().unwrap();
        assert_eq!(call.options.get("hidden").map(String::as_str), Some(""));
        assert_eq!(call.options.get("maxdepth").map(String::as_str), Some("2"));
        assert_eq!(call.content, vec!["intro"]);
    }

    #[test]
    fn test_literal_block_after_double_colon() {
        let parser = create_parser();
        let content = "Example::\n\n    int main() {}\n    return 0;\n\nDone.\n";
        let doc = parse_rst_content(&parser, content);

        assert_eq!(doc.blocks[0], Block::Paragraph(vec![Inline::Text("Example:".to_string())]));
        assert_eq!(
            doc.blocks[1],
            Block::LiteralBlock {
                language: None,
                code: "int main() {}\nreturn 0;".to_string(),
                caption: None,
            }
        );
        assert!(matches!(doc.blocks[2], Block::Paragraph(_)));
    }

    #[test]
    fn test_lists() {
        let parser = create_parser();
        let content = "- first\n  continued\n- second\n\n1. one\n2. two\n";
        let doc = parse_rst_content(&parser, content);

        match &doc.blocks[0] {
            Block::List { ordered, items } => {
                assert!(!ordered);
                assert_eq!(crate::document::plain_text(&items[0]), "first continued");
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected list, got {:?}", other),
        }
        assert!(matches!(&doc.blocks[1], Block::List { ordered: true, items } if items.len() == 2));
    }

    #[test]
    fn test_targets_comments_and_named_links() {
        let parser = create_parser();
        let content = r#".. _Getting Started:

.. This is a comment
   spanning two lines

See `EPFL`_ for |version|.

.. _EPFL: https://www.epfl.ch
"#;
        let doc = parse_rst_content(&parser, content);

        assert_eq!(doc.blocks[0], Block::Target("getting started".to_string()));
        assert_eq!(
            doc.blocks[1],
            Block::Paragraph(vec![
                Inline::Text("See ".to_string()),
                Inline::Reference {
                    text: "EPFL".to_string(),
                    target: RefTarget::Uri("https://www.epfl.ch".to_string()),
                },
                Inline::Text(" for v0.3.".to_string()),
            ])
        );
        assert_eq!(doc.blocks.len(), 2);
    }

    #[test]
    fn test_substitution_definition() {
        let parser = create_parser();
        let content = ".. |lib| replace:: mockturtle\n\nUsing |lib|.\n";
        let doc = parse_rst_content(&parser, content);
        assert_eq!(doc.blocks, vec![Block::Paragraph(vec![Inline::Text("Using mockturtle.".to_string())])]);
    }

    #[test]
    fn test_block_quote() {
        let parser = create_parser();
        let doc = parse_rst_content(&parser, "Intro\n\n   quoted text\n");
        assert!(matches!(&doc.blocks[1], Block::BlockQuote(body) if body.len() == 1));
    }

    #[test]
    fn test_markdown_document() {
        let parser = create_parser();
        let content = r#"# Networks

Text with `code` and [docs](algorithms/index.md).

```cpp
int x;
```

```{doc_overview_table} namespacemockturtle
:column: Network

mig_network
```

- a
- b
"#;
        let doc = parser.parse(Path::new("networks.md"), "networks", content).unwrap();

        assert_eq!(doc.title, "Networks");
        assert_eq!(
            doc.blocks[1],
            Block::Paragraph(vec![
                Inline::Text("Text with ".to_string()),
                Inline::Literal("code".to_string()),
                Inline::Text(" and ".to_string()),
                Inline::Reference {
                    text: "docs".to_string(),
                    target: RefTarget::Doc("algorithms/index".to_string()),
                },
                Inline::Text(".".to_string()),
            ])
        );
        assert!(matches!(&doc.blocks[2], Block::LiteralBlock { language: Some(l), .. } if l == "cpp"));
        let call = doc.pending_directives().next().unwrap();
        assert_eq!(call.arguments, "namespacemockturtle");
        assert_eq!(call.options.get("column").map(String::as_str), Some("Network"));
        assert_eq!(call.content, vec!["mig_network"]);
        assert!(matches!(&doc.blocks[4], Block::List { items, .. } if items.len() == 2));
    }
}
