//! Extension loading.
//!
//! Each name in `extensions` maps to a setup routine that registers
//! directives and HTML assets on an [`Application`]. Extensions are compiled
//! in; there is no dynamic loading.

use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BuildConfig;
use crate::directives::breathe::DoxygenMemberDirective;
use crate::directives::builtin::{
    AdmonitionDirective, CodeBlockDirective, GenericAdmonitionDirective, MathDirective,
    TocTreeDirective, TodoDirective,
};
use crate::directives::validation::closest_match;
use crate::directives::{DirectiveRegistry, OverviewTableDirective};
use crate::error::{BuildWarning, WarningKind};

/// MathJax 3 bundle loaded by `sphinx.ext.mathjax`
pub const MATHJAX_URL: &str = "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js";

/// Name under which the project's own setup hook is loaded.
pub const LOCAL_EXTENSION: &str = "conf";

/// State extensions register into.
pub struct Application {
    pub registry: DirectiveRegistry,
    pub js_files: Vec<String>,
    pub css_files: Vec<String>,
    /// Extensions whose setup ran, in order.
    pub loaded: Vec<String>,
}

impl Application {
    /// An application with the directives every project has.
    pub fn new() -> Self {
        let mut registry = DirectiveRegistry::new();
        registry.register(Arc::new(TocTreeDirective));
        registry.register(Arc::new(CodeBlockDirective));
        registry.register(Arc::new(GenericAdmonitionDirective));
        registry.register(Arc::new(MathDirective));
        for admonition in AdmonitionDirective::all() {
            registry.register(Arc::new(admonition));
        }

        Self {
            registry,
            js_files: Vec::new(),
            css_files: Vec::new(),
            loaded: Vec::new(),
        }
    }

    /// Add a script, once
    pub fn add_js_file(&mut self, file: &str) {
        if !self.js_files.iter().any(|f| f == file) {
            self.js_files.push(file.to_string());
        }
    }

    /// Add a stylesheet, once
    pub fn add_css_file(&mut self, file: &str) {
        if !self.css_files.iter().any(|f| f == file) {
            self.css_files.push(file.to_string());
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

/// An extension named in `extensions`
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn setup(&self, app: &mut Application);
}

struct MathJaxExtension;

impl Extension for MathJaxExtension {
    fn name(&self) -> &str {
        "sphinx.ext.mathjax"
    }

    fn setup(&self, app: &mut Application) {
        app.add_js_file(MATHJAX_URL);
    }
}

struct TodoExtension;

impl Extension for TodoExtension {
    fn name(&self) -> &str {
        "sphinx.ext.todo"
    }

    fn setup(&self, app: &mut Application) {
        app.registry.register(Arc::new(TodoDirective));
    }
}

struct ViewCodeExtension;

impl Extension for ViewCodeExtension {
    fn name(&self) -> &str {
        "sphinx.ext.viewcode"
    }

    fn setup(&self, _app: &mut Application) {
        info!("sphinx.ext.viewcode: no Python modules to highlight, nothing to do");
    }
}

struct BreatheExtension;

impl Extension for BreatheExtension {
    fn name(&self) -> &str {
        "breathe"
    }

    fn setup(&self, app: &mut Application) {
        for directive in DoxygenMemberDirective::all() {
            app.registry.register(Arc::new(directive));
        }
    }
}

/// The project's own `setup(app)`.
struct LocalExtension;

impl Extension for LocalExtension {
    fn name(&self) -> &str {
        LOCAL_EXTENSION
    }

    fn setup(&self, app: &mut Application) {
        app.registry.register(Arc::new(OverviewTableDirective));
    }
}

/// Extensions known by name
pub struct ExtensionLoader {
    available: BTreeMap<String, Arc<dyn Extension>>,
}

impl ExtensionLoader {
    /// Create a loader with the built-in extensions
    pub fn new() -> Self {
        let mut loader = Self {
            available: BTreeMap::new(),
        };
        loader.add(Arc::new(MathJaxExtension));
        loader.add(Arc::new(TodoExtension));
        loader.add(Arc::new(ViewCodeExtension));
        loader.add(Arc::new(BreatheExtension));
        loader
    }

    /// Make an extension available under its name
    pub fn add(&mut self, extension: Arc<dyn Extension>) {
        self.available.insert(extension.name().to_string(), extension);
    }

    pub fn available(&self) -> impl Iterator<Item = &str> {
        self.available.keys().map(String::as_str)
    }

    /// Run the setup of every configured extension, then the local one.
    /// `config_path` is where warnings about the configuration point.
    pub fn load(&self, config: &BuildConfig, config_path: &Path) -> (Application, Vec<BuildWarning>) {
        let mut app = Application::new();
        let mut warnings = Vec::new();

        for name in &config.extensions {
            match self.available.get(name) {
                Some(extension) => {
                    debug!("Loading extension {}", name);
                    extension.setup(&mut app);
                    app.loaded.push(name.clone());
                }
                None => {
                    let mut warning = BuildWarning::new(
                        WarningKind::UnknownExtension,
                        PathBuf::from(config_path),
                        None,
                        format!("extension '{}' is not available; ignoring it", name),
                    );
                    if let Some(candidate) = closest_match(name, self.available()) {
                        warning = warning.with_suggestion(format!("Did you mean '{}'?", candidate));
                    }
                    warnings.push(warning);
                }
            }
        }

        LocalExtension.setup(&mut app);
        app.loaded.push(LOCAL_EXTENSION.to_string());

        for directive in &config.custom_directives {
            if !app.registry.contains(directive) {
                warnings.push(BuildWarning::new(
                    WarningKind::Config,
                    PathBuf::from(config_path),
                    None,
                    format!(
                        "directive '{}' is registered in setup() but no loaded extension provides it",
                        directive
                    ),
                ));
            }
        }

        (app, warnings)
    }
}

impl Default for ExtensionLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extensions: &[&str]) -> BuildConfig {
        BuildConfig {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_builtin_directives_always_present() {
        let (app, warnings) = ExtensionLoader::new().load(&config(&[]), Path::new("conf.py"));
        assert!(warnings.is_empty());
        for name in ["toctree", "code-block", "code", "note", "math", "doc_overview_table"] {
            assert!(app.registry.contains(name), "missing {}", name);
        }
        assert!(!app.registry.contains("todo"));
        assert!(!app.registry.contains("doxygenfunction"));
        assert_eq!(app.loaded, vec![LOCAL_EXTENSION]);
    }

    #[test]
    fn test_configured_extensions() {
        let (app, warnings) = ExtensionLoader::new().load(
            &config(&["sphinx.ext.mathjax", "sphinx.ext.viewcode", "breathe", "sphinx.ext.todo"]),
            Path::new("conf.py"),
        );
        assert!(warnings.is_empty());
        assert!(app.registry.contains("doxygenfunction"));
        assert!(app.registry.contains("todo"));
        assert_eq!(app.js_files, vec![MATHJAX_URL]);
    }

    #[test]
    fn test_unknown_extension_warns_with_suggestion() {
        let (_, warnings) =
            ExtensionLoader::new().load(&config(&["sphinx.ext.mathjx"]), Path::new("conf.py"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnknownExtension);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("Did you mean 'sphinx.ext.mathjax'?")
        );
    }

    #[test]
    fn test_custom_directive_without_provider() {
        let mut config = config(&[]);
        config.custom_directives = vec!["doc_overview_table".to_string(), "doc_graph".to_string()];
        let (_, warnings) = ExtensionLoader::new().load(&config, Path::new("conf.py"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("doc_graph"));
    }
}
