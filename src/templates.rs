//! Page templates.
//!
//! Templates are looked up by name in the configured `templates_path`
//! directories, then in the theme chain's template directories, and finally
//! among the built-in templates compiled into the binary.

use minijinja::{escape_formatter, AutoEscape, Environment, Error, ErrorKind};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::matching;
use crate::navigation::NavLink;
use crate::theme::ResolvedTheme;

/// Templates compiled into the binary, by name
pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("page.html", include_str!("../templates/page.html")),
    ("search.html", include_str!("../templates/search.html")),
    ("relbar.html", include_str!("../templates/relbar.html")),
    ("buttons.html", include_str!("../templates/buttons.html")),
    ("about.html", include_str!("../templates/about.html")),
    ("navigation.html", include_str!("../templates/navigation.html")),
    ("relations.html", include_str!("../templates/relations.html")),
    ("searchbox.html", include_str!("../templates/searchbox.html")),
    ("donate.html", include_str!("../templates/donate.html")),
    ("localtoc.html", include_str!("../templates/localtoc.html")),
];

/// A script tag.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptFile {
    pub src: String,
    pub defer: bool,
}

/// Variables available to page templates, besides `theme_<option>`.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub project: String,
    pub version: String,
    pub release: String,
    pub copyright: String,
    pub language: String,
    pub refman_version: &'static str,
    /// Title of the whole manual (`html_title`).
    pub docstitle: String,
    pub shorttitle: String,
    pub theme_name: String,
    pub docname: String,
    pub title: String,
    pub body: String,
    /// Relative path from the page to the output root, e.g. `"../"`.
    pub content_root: String,
    pub css_files: Vec<String>,
    pub script_files: Vec<ScriptFile>,
    pub sidebars: Vec<String>,
    pub toctree: String,
    pub localtoc: String,
    pub parents: Vec<NavLink>,
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
    pub master_link: String,
    pub search_link: String,
    pub last_updated: Option<String>,
}

/// Minijinja environment with project templates layered over the built-in ones
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// `search_dirs` are consulted in order before the built-in templates.
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        let mut env = Environment::new();
        // URLs keep their slashes.
        env.set_formatter(|out, state, value| {
            if matches!(state.auto_escape(), AutoEscape::Html) && !value.is_safe() {
                if let Some(text) = value.as_str() {
                    return out
                        .write_str(&html_escape::encode_quoted_attribute(text))
                        .map_err(Error::from);
                }
            }
            escape_formatter(out, state, value)
        });
        env.set_loader(move |name: &str| {
            if name.split(['/', '\\']).any(|part| part == "..") {
                return Ok(None);
            }
            for dir in &search_dirs {
                let path = dir.join(name);
                if path.is_file() {
                    return std::fs::read_to_string(&path).map(Some).map_err(|e| {
                        Error::new(
                            ErrorKind::InvalidOperation,
                            format!("cannot read template {}", path.display()),
                        )
                        .with_source(e)
                    });
                }
            }
            Ok(BUILTIN_TEMPLATES
                .iter()
                .find(|(builtin, _)| *builtin == name)
                .map(|(_, source)| source.to_string()))
        });
        Self { env }
    }

    /// An engine for a project: `templates_path` first, then the theme.
    pub fn for_project(config: &BuildConfig, source_dir: &Path, theme: &ResolvedTheme) -> Self {
        let mut dirs: Vec<PathBuf> = config
            .templates_path
            .iter()
            .map(|dir| source_dir.join(dir))
            .collect();
        dirs.extend(theme.template_dirs().into_iter().map(PathBuf::from));
        Self::new(dirs)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Render template `name` with `context`
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, BuildError> {
        let template = self.env.get_template(name)?;
        Ok(template.render(context)?)
    }

    /// Render `name` with the page variables and the theme options exposed
    /// as `theme_<option>`.
    pub fn render_page(
        &self,
        name: &str,
        page: &PageContext,
        theme: &ResolvedTheme,
    ) -> Result<String, BuildError> {
        self.render(name, page_variables(page, &theme.options))
    }
}

/// Flatten a page context and theme options into one variable map.
pub fn page_variables(page: &PageContext, theme_options: &Map<String, Value>) -> Map<String, Value> {
    let mut vars = match serde_json::to_value(page) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in theme_options {
        vars.insert(format!("theme_{}", key), value.clone());
    }
    vars
}

/// Sidebar templates for a document: `html_sidebars` (exact docname first,
/// then the first matching glob), else the theme's default.
pub fn sidebars_for(docname: &str, config: &BuildConfig, theme: &ResolvedTheme) -> Vec<String> {
    match matching::select_by_pattern(docname, config.html_sidebars.iter()) {
        Some(sidebars) => sidebars.clone(),
        None => theme.default_sidebars(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeRegistry;
    use indexmap::IndexMap;
    use tempfile::TempDir;

    fn theme(name: &str) -> ResolvedTheme {
        ThemeRegistry::new()
            .resolve(name, &Map::new(), Path::new("conf.py"))
            .unwrap()
            .0
    }

    fn page() -> PageContext {
        PageContext {
            project: "mockturtle".to_string(),
            version: "v0.1".to_string(),
            release: "v0.1".to_string(),
            copyright: "2018, EPFL LSI".to_string(),
            language: "en".to_string(),
            refman_version: env!("CARGO_PKG_VERSION"),
            docstitle: "mockturtle v0.1 documentation".to_string(),
            shorttitle: "mockturtle".to_string(),
            theme_name: "alabaster".to_string(),
            docname: "algorithms/cut_rewriting".to_string(),
            title: "Cut rewriting".to_string(),
            body: "<h1>Cut rewriting</h1>".to_string(),
            content_root: "../".to_string(),
            css_files: vec!["../_static/basic.css".to_string()],
            script_files: vec![ScriptFile {
                src: "../_static/doctools.js".to_string(),
                defer: false,
            }],
            sidebars: vec!["about.html".to_string(), "searchbox.html".to_string()],
            toctree: String::new(),
            localtoc: String::new(),
            parents: vec![NavLink::new("Algorithms", "index.html")],
            prev: None,
            next: Some(NavLink::new("Refactoring", "refactoring.html")),
            master_link: "../index.html".to_string(),
            search_link: "../search.html".to_string(),
            last_updated: None,
        }
    }

    #[test]
    fn test_render_builtin_page() {
        let engine = TemplateEngine::new(Vec::new());
        let theme = theme("alabaster");
        let html = engine.render_page("page.html", &page(), &theme).unwrap();

        assert!(html.contains("<title>Cut rewriting &#8212; mockturtle v0.1 documentation</title>"));
        assert!(html.contains("<h1>Cut rewriting</h1>"));
        assert!(!html.contains("&#x2f;"));
        assert!(html.contains("href=\"../_static/basic.css\""));
        assert!(html.contains("<h1 class=\"logo\">mockturtle</h1>"));
        assert!(html.contains("action=\"../search.html\""));
        assert!(html.contains("data-content-root=\"../\""));
        assert!(html.contains("href=\"refactoring.html\""));
    }

    #[test]
    fn test_theme_options_are_exposed() {
        let engine = TemplateEngine::new(Vec::new());
        let mut theme = theme("alabaster");
        theme
            .options
            .insert("description".to_string(), Value::String("Logic networks".to_string()));
        let html = engine.render_page("page.html", &page(), &theme).unwrap();
        assert!(html.contains("<p class=\"blurb\">Logic networks</p>"));
    }

    #[test]
    fn test_templates_path_overrides_builtin() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("searchbox.html"),
            "<div id=\"custom-search\">{{ project }}</div>",
        )
        .unwrap();

        let engine = TemplateEngine::new(vec![dir.path().to_path_buf()]);
        let html = engine.render_page("page.html", &page(), &theme("alabaster")).unwrap();
        assert!(html.contains("<div id=\"custom-search\">mockturtle</div>"));
        assert!(!engine.has_template("../secret.html"));
    }

    #[test]
    fn test_sidebars_selection() {
        let mut config = BuildConfig::default();
        let theme = theme("alabaster");
        assert_eq!(sidebars_for("index", &config, &theme)[0], "about.html");

        let mut sidebars = IndexMap::new();
        sidebars.insert("api/**".to_string(), vec!["localtoc.html".to_string()]);
        sidebars.insert("**".to_string(), vec!["navigation.html".to_string()]);
        sidebars.insert("api/index".to_string(), vec!["searchbox.html".to_string()]);
        config.html_sidebars = sidebars;

        assert_eq!(sidebars_for("api/index", &config, &theme), vec!["searchbox.html"]);
        assert_eq!(sidebars_for("api/networks", &config, &theme), vec!["localtoc.html"]);
        assert_eq!(sidebars_for("intro", &config, &theme), vec!["navigation.html"]);
    }
}
