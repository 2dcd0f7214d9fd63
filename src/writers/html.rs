//! Document-tree-to-HTML rendering and page assembly.

use chrono::Local;
use log::{debug, warn};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::BuildConfig;
use crate::document::{Block, Document, Inline, MemberDescription, RefTarget, Table};
use crate::environment::BuildEnvironment;
use crate::error::BuildError;
use crate::navigation::{NavigationBuilder, ToctreeOptions};
use crate::templates::{self, PageContext, ScriptFile, TemplateEngine};
use crate::theme::ResolvedTheme;
use crate::utils;

use super::{capitalize, write_file};

/// syntect theme used for a `pygments_style`.
pub fn style_for_pygments(style: Option<&str>) -> &'static str {
    match style.unwrap_or("sphinx") {
        "monokai" | "native" | "fruity" | "vim" | "dark" => "base16-ocean.dark",
        "solarized-dark" => "Solarized (dark)",
        "solarized-light" => "Solarized (light)",
        "base16-eighties" => "base16-eighties.dark",
        "base16-mocha" => "base16-mocha.dark",
        _ => "InspiredGitHub",
    }
}

/// Code highlighting with syntect's inline styles.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
}

impl Highlighter {
    /// Create a highlighter for a Pygments style name
    pub fn new(pygments_style: Option<&str>) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: style_for_pygments(pygments_style).to_string(),
        }
    }

    /// Name of the syntect theme in use
    pub fn theme_name(&self) -> &str {
        &self.theme_name
    }

    /// Highlighted `<pre>` for `code`. Unknown languages and literal blocks
    /// without a language are escaped only.
    pub fn highlight(&self, code: &str, language: Option<&str>) -> String {
        let plain = || format!("<pre>{}</pre>", html_escape::encode_text(code));

        let syntax = match language.and_then(|lang| {
            self.syntax_set
                .find_syntax_by_token(lang)
                .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
        }) {
            Some(syntax) => syntax,
            None => return plain(),
        };
        let theme = match self.theme_set.themes.get(&self.theme_name) {
            Some(theme) => theme,
            None => return plain(),
        };

        highlighted_html_for_string(code, &self.syntax_set, syntax, theme).unwrap_or_else(|_| plain())
    }
}

/// Renders the blocks of one document. Internal links are made relative to
/// the document's page.
pub struct HtmlTranslator<'a> {
    docname: &'a str,
    highlighter: &'a Highlighter,
    navigation: Option<&'a NavigationBuilder>,
}

impl<'a> HtmlTranslator<'a> {
    /// Create a translator for the page `docname`
    pub fn new(docname: &'a str, highlighter: &'a Highlighter) -> Self {
        Self {
            docname,
            highlighter,
            navigation: None,
        }
    }

    /// Toctrees in the body are rendered through `navigation`; without it
    /// they produce no output.
    pub fn with_navigation(mut self, navigation: &'a NavigationBuilder) -> Self {
        self.navigation = Some(navigation);
        self
    }

    /// Render a sequence of blocks
    pub fn blocks(&self, blocks: &[Block]) -> String {
        let mut html = String::new();
        let mut open_sections: Vec<usize> = Vec::new();

        for block in blocks {
            if let Block::Title { level, id, .. } = block {
                while let Some(&open) = open_sections.last() {
                    if open >= *level {
                        html.push_str("</section>\n");
                        open_sections.pop();
                    } else {
                        break;
                    }
                }
                html.push_str(&format!(
                    "<section id=\"{}\">\n",
                    html_escape::encode_double_quoted_attribute(id)
                ));
                open_sections.push(*level);
            }
            html.push_str(&self.block(block));
        }

        for _ in open_sections {
            html.push_str("</section>\n");
        }
        html
    }

    fn block(&self, block: &Block) -> String {
        match block {
            Block::Title { inlines, level, id, .. } => format!(
                "<h{level}>{text}<a class=\"headerlink\" href=\"#{id}\" title=\"Link to this heading\">¶</a></h{level}>\n",
                level = (*level).clamp(1, 6),
                text = self.inlines(inlines),
                id = html_escape::encode_double_quoted_attribute(id),
            ),
            Block::Paragraph(inlines) => format!("<p>{}</p>\n", self.inlines(inlines)),
            Block::Line(inlines) => format!("<div class=\"line\">{}</div>\n", self.inlines(inlines)),
            Block::LiteralBlock { language, code, caption } => {
                let lang = language.as_deref().unwrap_or("default");
                let highlighted = format!(
                    "<div class=\"highlight-{} notranslate\"><div class=\"highlight\">{}</div></div>\n",
                    html_escape::encode_double_quoted_attribute(lang),
                    self.highlighter.highlight(code, language.as_deref())
                );
                match caption {
                    Some(caption) => format!(
                        "<div class=\"literal-block-wrapper docutils container\">\n<div class=\"code-block-caption\"><span class=\"caption-text\">{}</span></div>\n{}</div>\n",
                        html_escape::encode_text(caption),
                        highlighted
                    ),
                    None => highlighted,
                }
            }
            Block::List { ordered, items } => {
                let items: String = items
                    .iter()
                    .map(|item| format!("<li><p>{}</p></li>\n", self.inlines(item)))
                    .collect();
                if *ordered {
                    format!("<ol class=\"arabic simple\">\n{}</ol>\n", items)
                } else {
                    format!("<ul class=\"simple\">\n{}</ul>\n", items)
                }
            }
            Block::BlockQuote(body) => format!("<blockquote>\n<div>{}</div></blockquote>\n", self.blocks(body)),
            Block::Target(name) => format!(
                "<span id=\"{}\"></span>",
                html_escape::encode_double_quoted_attribute(&utils::make_id(name))
            ),
            Block::Table(table) => self.table(table),
            Block::Admonition { kind, title, body } => {
                let title = title.clone().unwrap_or_else(|| capitalize(kind));
                let class = if kind.starts_with("admonition") {
                    kind.clone()
                } else {
                    format!("admonition {}", kind)
                };
                format!(
                    "<div class=\"{}\">\n<p class=\"admonition-title\">{}</p>\n{}</div>\n",
                    html_escape::encode_double_quoted_attribute(&class),
                    html_escape::encode_text(&title),
                    self.blocks(body)
                )
            }
            Block::Math { latex, label } => {
                let id = label
                    .as_ref()
                    .map(|l| format!(" id=\"equation-{}\"", html_escape::encode_double_quoted_attribute(&utils::make_id(l))))
                    .unwrap_or_default();
                format!(
                    "<div class=\"math notranslate nohighlight\"{}>\n\\[{}\\]\n</div>\n",
                    id,
                    html_escape::encode_text(latex)
                )
            }
            Block::TocTree(toctree) => match self.navigation {
                Some(navigation) => navigation.render_toctree_block(self.docname, toctree),
                None => String::new(),
            },
            Block::Member(member) => self.member(member),
            Block::SystemMessage { level, message, line } => format!(
                "<div class=\"system-message\">\n<p class=\"system-message-title\">System Message: {}/{} (<span class=\"docutils literal\">{}</span>, line {})</p>\n<p>{}</p>\n</div>\n",
                level.as_str(),
                match level {
                    crate::document::MessageLevel::Warning => 2,
                    crate::document::MessageLevel::Error => 3,
                },
                html_escape::encode_text(self.docname),
                line,
                html_escape::encode_text(message)
            ),
            Block::Directive(call) => {
                debug!("Unexpanded directive '{}' in {}", call.name, self.docname);
                String::new()
            }
        }
    }

    fn table(&self, table: &Table) -> String {
        let mut classes = vec!["docutils".to_string(), "align-default".to_string()];
        classes.extend(table.classes.iter().cloned());
        let mut html = format!("<table class=\"{}\">\n", classes.join(" "));

        html.push_str("<colgroup>\n");
        for width in table.percentages() {
            html.push_str(&format!("<col style=\"width: {}%\" />\n", width));
        }
        html.push_str("</colgroup>\n");

        if !table.header.is_empty() {
            html.push_str("<thead>\n<tr class=\"row-odd\">");
            for cell in &table.header {
                html.push_str(&format!("<th class=\"head\">{}</th>\n", self.cell(cell)));
            }
            html.push_str("</tr>\n</thead>\n");
        }

        html.push_str("<tbody>\n");
        for (index, row) in table.rows.iter().enumerate() {
            let parity = if index % 2 == 0 { "row-even" } else { "row-odd" };
            html.push_str(&format!("<tr class=\"{}\">", parity));
            for cell in row {
                html.push_str(&format!("<td>{}</td>\n", self.cell(cell)));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>\n");
        html
    }

    /// A cell with a single paragraph or line renders inline.
    fn cell(&self, blocks: &[Block]) -> String {
        match blocks {
            [Block::Paragraph(inlines)] => format!("<p>{}</p>", self.inlines(inlines)),
            [Block::Line(inlines)] => format!("<div class=\"line\">{}</div>", self.inlines(inlines)),
            _ => self.blocks(blocks),
        }
    }

    fn member(&self, member: &MemberDescription) -> String {
        let id = html_escape::encode_double_quoted_attribute(&member.id);
        let mut html = format!(
            "<dl class=\"cpp {kind}\">\n<dt class=\"sig sig-object cpp\" id=\"{id}\"><span class=\"sig-name descname\">{sig}</span><a class=\"headerlink\" href=\"#{id}\" title=\"Link to this definition\">¶</a></dt>\n<dd>",
            kind = html_escape::encode_double_quoted_attribute(&member.kind),
            id = id,
            sig = html_escape::encode_text(&member.signature),
        );
        if let Some(brief) = &member.brief {
            html.push_str(&format!("<p>{}</p>\n", html_escape::encode_text(brief)));
        }
        for paragraph in &member.detailed {
            html.push_str(&format!("<p>{}</p>\n", html_escape::encode_text(paragraph)));
        }
        html.push_str("</dd></dl>\n");
        html
    }

    /// Render inline markup
    pub fn inlines(&self, inlines: &[Inline]) -> String {
        inlines.iter().map(|inline| self.inline(inline)).collect()
    }

    fn inline(&self, inline: &Inline) -> String {
        match inline {
            Inline::Text(text) => html_escape::encode_text(text).to_string(),
            Inline::Emphasis(text) => format!("<em>{}</em>", html_escape::encode_text(text)),
            Inline::Strong(text) => format!("<strong>{}</strong>", html_escape::encode_text(text)),
            Inline::Literal(text) => format!(
                "<code class=\"docutils literal notranslate\"><span class=\"pre\">{}</span></code>",
                html_escape::encode_text(text)
            ),
            Inline::Math(latex) => format!(
                "<span class=\"math notranslate nohighlight\">\\({}\\)</span>",
                html_escape::encode_text(latex)
            ),
            Inline::Reference { text, target } => self.reference(text, target),
        }
    }

    fn reference(&self, text: &str, target: &RefTarget) -> String {
        let text = html_escape::encode_text(text);
        match target {
            RefTarget::Uri(uri) => format!(
                "<a class=\"reference external\" href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(uri),
                text
            ),
            RefTarget::Anchor(id) => format!(
                "<a class=\"reference internal\" href=\"#{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(id),
                text
            ),
            RefTarget::Internal { docname, anchor } => {
                let page = if docname == self.docname {
                    String::new()
                } else {
                    utils::relative_uri(self.docname, &format!("{}.html", docname))
                };
                let href = match anchor {
                    Some(anchor) => format!("{}#{}", page, anchor),
                    None if page.is_empty() => "#".to_string(),
                    None => page,
                };
                let class = if anchor.is_some() { "std std-ref" } else { "doc" };
                format!(
                    "<a class=\"reference internal\" href=\"{}\"><span class=\"{}\">{}</span></a>",
                    html_escape::encode_double_quoted_attribute(&href),
                    class,
                    text
                )
            }
            RefTarget::Doc(_) | RefTarget::Label(_) => {
                format!("<span class=\"xref std std-ref\">{}</span>", text)
            }
        }
    }
}

/// Assembles complete pages from documents, the theme and the templates.
pub struct HtmlWriter<'a> {
    config: &'a BuildConfig,
    theme: &'a ResolvedTheme,
    templates: TemplateEngine,
    highlighter: Highlighter,
    /// Extension scripts, absolute URLs or paths below `_static`.
    extension_js: Vec<String>,
    extension_css: Vec<String>,
    last_updated: Option<String>,
}

impl<'a> HtmlWriter<'a> {
    /// Create an HTML writer for a resolved theme
    pub fn new(
        config: &'a BuildConfig,
        source_dir: &Path,
        theme: &'a ResolvedTheme,
        extension_js: Vec<String>,
        extension_css: Vec<String>,
    ) -> Self {
        let last_updated = config.html_last_updated_fmt.as_deref().and_then(|fmt| {
            let fmt = if fmt.is_empty() { "%b %d, %Y" } else { fmt };
            let mut stamp = String::new();
            match write!(stamp, "{}", Local::now().format(fmt)) {
                Ok(()) => Some(stamp),
                Err(_) => {
                    warn!("Invalid html_last_updated_fmt '{}'", fmt);
                    None
                }
            }
        });
        Self {
            config,
            theme,
            templates: TemplateEngine::for_project(config, source_dir, theme),
            highlighter: Highlighter::new(config.pygments_style.as_deref()),
            extension_js,
            extension_css,
            last_updated,
        }
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// Page variables for `docname` with an already rendered `body`.
    pub fn page_context(&self, docname: &str, title: &str, body: String, env: &BuildEnvironment) -> PageContext {
        let navigation = env.navigation();
        let page_nav = navigation.get_page_navigation(docname);
        let root = utils::root_prefix(docname);
        let link = |target: &str| utils::relative_uri(docname, target);

        let static_url = |file: &str| {
            if file.contains("://") || file.starts_with("//") {
                file.to_string()
            } else {
                format!("{}_static/{}", root, file)
            }
        };

        let mut css_files: Vec<String> = self
            .theme
            .stylesheets()
            .into_iter()
            .map(|sheet| static_url(&sheet.path))
            .collect();
        css_files.extend(self.extension_css.iter().map(|f| static_url(f)));
        css_files.extend(self.config.html_css_files.iter().map(|f| static_url(f)));

        let mut script_files: Vec<ScriptFile> = self
            .theme
            .scripts()
            .into_iter()
            .map(|script| ScriptFile {
                src: static_url(&script.path),
                defer: script.defer,
            })
            .collect();
        script_files.extend(self.extension_js.iter().map(|f| ScriptFile {
            src: static_url(f),
            defer: f.contains("://"),
        }));
        script_files.extend(self.config.html_js_files.iter().map(|f| ScriptFile {
            src: static_url(f),
            defer: false,
        }));

        let toctree_options = ToctreeOptions {
            maxdepth: self.theme.int_option("navigation_depth", 4).max(0) as usize,
            collapse: self.theme.bool_option("collapse_navigation", true),
            includehidden: self.theme.bool_option("includehidden", true),
            titles_only: self.theme.bool_option("titles_only", false),
        };

        PageContext {
            project: self.config.project.clone(),
            version: self.config.version.clone(),
            release: self.config.release.clone(),
            copyright: self.config.copyright.clone(),
            language: self.config.language.clone().unwrap_or_else(|| "en".to_string()),
            refman_version: env!("CARGO_PKG_VERSION"),
            docstitle: self.config.html_title(),
            shorttitle: self.config.project.clone(),
            theme_name: self.theme.name().to_string(),
            docname: docname.to_string(),
            title: title.to_string(),
            body,
            content_root: root.clone(),
            css_files,
            script_files,
            sidebars: templates::sidebars_for(docname, self.config, self.theme),
            toctree: navigation.render_toctree(docname, &toctree_options),
            localtoc: navigation.render_local_toc(docname),
            parents: page_nav.parents,
            prev: page_nav.prev,
            next: page_nav.next,
            master_link: link(&format!("{}.html", navigation.master_doc())),
            search_link: link("search.html"),
            last_updated: self.last_updated.clone(),
        }
    }

    /// Body HTML of a resolved document
    pub fn render_body(&self, doc: &Document, env: &BuildEnvironment) -> String {
        HtmlTranslator::new(&doc.docname, &self.highlighter)
            .with_navigation(env.navigation())
            .blocks(&doc.blocks)
    }

    /// Render and write `<docname>.html`.
    pub fn write_document(&self, doc: &Document, env: &BuildEnvironment, output_dir: &Path) -> Result<PathBuf, BuildError> {
        let body = self.render_body(doc, env);
        let page = self.page_context(&doc.docname, &doc.title, body, env);
        let html = self.templates.render_page("page.html", &page, self.theme)?;

        let path = output_dir.join(format!("{}.html", doc.docname));
        write_file(&path, &html)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// The search page. The index itself is written by [`crate::search`].
    pub fn write_search_page(&self, env: &BuildEnvironment, output_dir: &Path) -> Result<PathBuf, BuildError> {
        let page = self.page_context("search", "Search", String::new(), env);
        let html = self.templates.render_page("search.html", &page, self.theme)?;
        let path = output_dir.join("search.html");
        write_file(&path, &html)?;
        Ok(path)
    }

    /// Write the theme's built-in assets to `_static`.
    pub fn write_theme_assets(&self, output_dir: &Path) -> Result<usize, BuildError> {
        let static_dir = output_dir.join("_static");
        let mut count = 0;
        for asset in self.theme.assets() {
            write_file(&static_dir.join(asset.name), asset.contents)?;
            count += 1;
        }
        Ok(count)
    }
}
