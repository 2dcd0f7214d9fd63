//! HTML themes.
//!
//! Three themes are built in: `basic`, `alabaster` and `sphinx_rtd_theme`.
//! Further themes are directories holding a `theme.toml`, discovered in
//! `_themes` and the configured `templates_path`. Themes can inherit from
//! other themes and provide templates, static files, default sidebars and
//! options.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{BuildError, BuildWarning, WarningKind};

/// A theme stylesheet entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeStylesheet {
    /// Path relative to `_static`
    pub path: String,
    /// Loading priority (lower = earlier in document)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

/// A theme script entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeScript {
    /// Path relative to `_static`
    pub path: String,
    /// Loading priority (lower = earlier in document)
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Whether to use defer attribute
    #[serde(default)]
    pub defer: bool,
}

fn default_priority() -> i32 {
    200
}

/// A file compiled into the binary and written to `_static`.
#[derive(Debug, Clone, Copy)]
pub struct StaticAsset {
    /// File name under `_static`
    pub name: &'static str,
    pub contents: &'static str,
}

/// Theme option type for validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeOptionType {
    Bool,
    String,
    Integer,
    Float,
}

impl ThemeOptionType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ThemeOptionType::Bool => value.is_boolean(),
            ThemeOptionType::String => value.is_string(),
            ThemeOptionType::Integer => value.is_i64() || value.is_u64(),
            ThemeOptionType::Float => value.is_number(),
        }
    }
}

/// Theme option specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeOptionSpec {
    /// Expected JSON type of the option value
    #[serde(rename = "type")]
    pub option_type: ThemeOptionType,
    /// Value used when `html_theme_options` omits the option
    pub default: Value,
    /// Allowed values for string options
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

impl ThemeOptionSpec {
    fn new(option_type: ThemeOptionType, default: Value) -> Self {
        Self {
            option_type,
            default,
            values: None,
        }
    }
}

/// Raw theme.toml structure for deserialization
#[derive(Debug, Clone, Deserialize)]
struct ThemeToml {
    theme: ThemeTomlMeta,
}

#[derive(Debug, Clone, Deserialize)]
struct ThemeTomlMeta {
    name: String,
    #[serde(default)]
    inherit: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    stylesheets: Option<ThemeTomlAssets>,
    #[serde(default)]
    scripts: Option<ThemeTomlAssets>,
    #[serde(default)]
    sidebars: Option<Vec<String>>,
    #[serde(default)]
    options: Option<IndexMap<String, ThemeOptionSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ThemeTomlAssets {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default = "default_priority")]
    priority: i32,
}

/// An HTML theme, built in or loaded from a `theme.toml` directory
#[derive(Debug, Clone)]
pub struct Theme {
    /// Theme name
    pub name: String,
    /// Parent theme to inherit from
    pub inherit: Option<String>,
    /// Theme version
    pub version: String,
    /// Theme directory; `None` for built-in themes.
    pub path: Option<PathBuf>,
    /// Theme stylesheets
    pub stylesheets: Vec<ThemeStylesheet>,
    /// Theme scripts
    pub scripts: Vec<ThemeScript>,
    /// Default `html_sidebars` value.
    pub sidebars: Option<Vec<String>>,
    /// Theme options schema, in declaration order
    pub options_schema: IndexMap<String, ThemeOptionSpec>,
    /// Path to templates directory (if exists)
    pub templates_dir: Option<PathBuf>,
    /// Path to static files directory (if exists)
    pub static_dir: Option<PathBuf>,
    /// Files compiled into the binary for built-in themes
    pub assets: Vec<StaticAsset>,
}

impl Theme {
    fn builtin(name: &str, inherit: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            inherit: inherit.map(str::to_string),
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: None,
            stylesheets: Vec::new(),
            scripts: Vec::new(),
            sidebars: None,
            options_schema: IndexMap::new(),
            templates_dir: None,
            static_dir: None,
            assets: Vec::new(),
        }
    }

    fn with_option(mut self, name: &str, option_type: ThemeOptionType, default: Value) -> Self {
        self.options_schema
            .insert(name.to_string(), ThemeOptionSpec::new(option_type, default));
        self
    }

    fn with_stylesheet(mut self, asset: StaticAsset) -> Self {
        self.stylesheets.push(ThemeStylesheet {
            path: asset.name.to_string(),
            priority: default_priority(),
        });
        self.assets.push(asset);
        self
    }

    fn with_sidebars(mut self, sidebars: &[&str]) -> Self {
        self.sidebars = Some(sidebars.iter().map(|s| s.to_string()).collect());
        self
    }

    /// The `basic` theme every other theme inherits from
    pub fn basic() -> Self {
        let mut theme = Self::builtin("basic", None)
            .with_stylesheet(StaticAsset {
                name: "basic.css",
                contents: include_str!("../static/basic.css"),
            })
            .with_sidebars(&["localtoc.html", "relations.html", "searchbox.html"])
            .with_option("nosidebar", ThemeOptionType::Bool, json!(false))
            .with_option("sidebarwidth", ThemeOptionType::Integer, json!(230))
            .with_option("body_max_width", ThemeOptionType::String, json!("800px"));
        for (name, contents) in [
            ("doctools.js", include_str!("../static/doctools.js")),
            ("searchtools.js", include_str!("../static/searchtools.js")),
        ] {
            theme.scripts.push(ThemeScript {
                path: name.to_string(),
                priority: default_priority(),
                defer: name == "searchtools.js",
            });
            theme.assets.push(StaticAsset { name, contents });
        }
        theme
    }

    /// The `alabaster` theme, Sphinx's default
    pub fn alabaster() -> Self {
        Self::builtin("alabaster", Some("basic"))
            .with_stylesheet(StaticAsset {
                name: "alabaster.css",
                contents: include_str!("../static/alabaster.css"),
            })
            .with_sidebars(&[
                "about.html",
                "navigation.html",
                "relations.html",
                "searchbox.html",
                "donate.html",
            ])
            .with_option("show_related", ThemeOptionType::Bool, json!(false))
            .with_option("description", ThemeOptionType::String, json!(""))
            .with_option("donate_url", ThemeOptionType::String, json!(""))
            .with_option("logo", ThemeOptionType::String, json!(""))
            .with_option("fixed_sidebar", ThemeOptionType::Bool, json!(false))
    }

    /// The Read the Docs theme
    pub fn sphinx_rtd_theme() -> Self {
        let mut theme = Self::builtin("sphinx_rtd_theme", Some("basic"))
            .with_stylesheet(StaticAsset {
                name: "sphinx_rtd_theme.css",
                contents: include_str!("../static/sphinx_rtd_theme.css"),
            })
            .with_sidebars(&["navigation.html", "searchbox.html"])
            .with_option("collapse_navigation", ThemeOptionType::Bool, json!(true))
            .with_option("navigation_depth", ThemeOptionType::Integer, json!(4))
            .with_option("titles_only", ThemeOptionType::Bool, json!(false))
            .with_option("sticky_navigation", ThemeOptionType::Bool, json!(true))
            .with_option("includehidden", ThemeOptionType::Bool, json!(true))
            .with_option(
                "prev_next_buttons_location",
                ThemeOptionType::String,
                json!("bottom"),
            );
        if let Some(spec) = theme.options_schema.get_mut("prev_next_buttons_location") {
            spec.values = Some(vec!["bottom".into(), "top".into(), "both".into(), "none".into()]);
        }
        theme
    }

    /// Load a theme from a directory containing theme.toml
    pub fn from_path(path: &Path) -> Result<Self, BuildError> {
        let theme_toml_path = path.join("theme.toml");
        let content = std::fs::read_to_string(&theme_toml_path)
            .map_err(|e| BuildError::io(&theme_toml_path, e))?;
        let toml: ThemeToml = toml::from_str(&content).map_err(|e| {
            BuildError::Theme(format!("{}: {}", theme_toml_path.display(), e))
        })?;
        let meta = toml.theme;

        let stylesheets = match meta.stylesheets {
            Some(assets) => assets
                .files
                .into_iter()
                .map(|path| ThemeStylesheet {
                    path,
                    priority: assets.priority,
                })
                .collect(),
            None => Vec::new(),
        };

        let scripts = match meta.scripts {
            Some(assets) => assets
                .files
                .into_iter()
                .map(|path| ThemeScript {
                    path,
                    priority: assets.priority,
                    defer: false,
                })
                .collect(),
            None => Vec::new(),
        };

        let existing_dir = |name: &str| Some(path.join(name)).filter(|dir| dir.is_dir());

        Ok(Theme {
            name: meta.name,
            inherit: meta.inherit,
            version: meta.version.unwrap_or_else(|| "0.0.0".to_string()),
            path: Some(path.to_path_buf()),
            stylesheets,
            scripts,
            sidebars: meta.sidebars,
            options_schema: meta.options.unwrap_or_default(),
            templates_dir: existing_dir("templates"),
            static_dir: existing_dir("static"),
            assets: Vec::new(),
        })
    }
}

/// A theme with its ancestors and the options in effect.
#[derive(Debug, Clone)]
pub struct ResolvedTheme {
    /// Root ancestor first.
    pub chain: Vec<Theme>,
    /// Schema defaults merged with `html_theme_options`
    pub options: Map<String, Value>,
}

impl ResolvedTheme {
    /// Name of the most derived theme
    pub fn name(&self) -> &str {
        self.chain.last().map(|t| t.name.as_str()).unwrap_or("basic")
    }

    /// Value of a theme option
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    pub fn bool_option(&self, name: &str, default: bool) -> bool {
        self.option(name).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn int_option(&self, name: &str, default: i64) -> i64 {
        self.option(name).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Stylesheets of the whole chain, parents first, stable by priority.
    pub fn stylesheets(&self) -> Vec<&ThemeStylesheet> {
        let mut sheets: Vec<&ThemeStylesheet> =
            self.chain.iter().flat_map(|t| t.stylesheets.iter()).collect();
        sheets.sort_by_key(|s| s.priority);
        sheets
    }

    /// Scripts of the whole chain, sorted by priority
    pub fn scripts(&self) -> Vec<&ThemeScript> {
        let mut scripts: Vec<&ThemeScript> =
            self.chain.iter().flat_map(|t| t.scripts.iter()).collect();
        scripts.sort_by_key(|s| s.priority);
        scripts
    }

    /// Template directories, most specific first.
    pub fn template_dirs(&self) -> Vec<&Path> {
        self.chain
            .iter()
            .rev()
            .filter_map(|t| t.templates_dir.as_deref())
            .collect()
    }

    /// Static directories, parents first so children override.
    pub fn static_dirs(&self) -> Vec<&Path> {
        self.chain
            .iter()
            .filter_map(|t| t.static_dir.as_deref())
            .collect()
    }

    /// Built-in assets of the whole chain
    pub fn assets(&self) -> impl Iterator<Item = &StaticAsset> {
        self.chain.iter().flat_map(|t| t.assets.iter())
    }

    /// Default sidebars of the most specific theme that declares some.
    pub fn default_sidebars(&self) -> Vec<String> {
        self.chain
            .iter()
            .rev()
            .find_map(|t| t.sidebars.clone())
            .unwrap_or_default()
    }
}

/// Registry for discovering and managing themes
#[derive(Debug)]
pub struct ThemeRegistry {
    themes: HashMap<String, Theme>,
    search_paths: Vec<PathBuf>,
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeRegistry {
    /// A registry holding the built-in themes.
    pub fn new() -> Self {
        let mut registry = Self {
            themes: HashMap::new(),
            search_paths: Vec::new(),
        };
        registry.register(Theme::basic());
        registry.register(Theme::alabaster());
        registry.register(Theme::sphinx_rtd_theme());
        registry
    }

    /// Add a search path for theme discovery
    pub fn add_search_path(&mut self, path: PathBuf) {
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Discover themes in all search paths. A directory theme replaces a
    /// built-in theme of the same name.
    pub fn discover_themes(&mut self) {
        for search_path in self.search_paths.clone() {
            let entries = match std::fs::read_dir(&search_path) {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() || !path.join("theme.toml").is_file() {
                    continue;
                }
                match Theme::from_path(&path) {
                    Ok(theme) => {
                        debug!("Discovered theme: {} at {}", theme.name, path.display());
                        self.register(theme);
                    }
                    Err(e) => warn!("Failed to load theme from {}: {}", path.display(), e),
                }
            }
        }
    }

    /// Register a theme, replacing one with the same name
    pub fn register(&mut self, theme: Theme) {
        self.themes.insert(theme.name.clone(), theme);
    }

    /// Get a theme by name
    pub fn get_theme(&self, name: &str) -> Option<&Theme> {
        self.themes.get(name)
    }

    pub fn has_theme(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    /// All registered theme names, sorted.
    pub fn theme_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.themes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the inheritance chain for a theme
    /// Returns themes from root ancestor to the requested theme
    pub fn resolve_theme_chain(&self, name: &str) -> Result<Vec<&Theme>, BuildError> {
        let mut chain = Vec::new();
        let mut current_name = name;
        let mut seen = HashSet::new();

        loop {
            if !seen.insert(current_name.to_string()) {
                return Err(BuildError::Theme(format!(
                    "Circular theme inheritance detected: {}",
                    current_name
                )));
            }

            let theme = self.get_theme(current_name).ok_or_else(|| {
                BuildError::Theme(format!("theme '{}' not found", current_name))
            })?;
            chain.push(theme);

            match &theme.inherit {
                Some(parent) => current_name = parent,
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Resolve `name` and merge `user_options` over the chain's defaults.
    /// Options of the wrong type or with a disallowed value keep their
    /// default; they and unknown options produce warnings pointing at
    /// `config_path`.
    pub fn resolve(
        &self,
        name: &str,
        user_options: &Map<String, Value>,
        config_path: &Path,
    ) -> Result<(ResolvedTheme, Vec<BuildWarning>), BuildError> {
        let chain = self.resolve_theme_chain(name)?;
        let mut schema: IndexMap<&str, &ThemeOptionSpec> = IndexMap::new();
        for theme in &chain {
            for (key, spec) in &theme.options_schema {
                schema.insert(key.as_str(), spec);
            }
        }

        let mut options: Map<String, Value> = schema
            .iter()
            .map(|(key, spec)| (key.to_string(), spec.default.clone()))
            .collect();
        let mut warnings = Vec::new();
        let warning = |message: String| {
            BuildWarning::new(WarningKind::ThemeOption, config_path, None, message)
        };

        for (key, value) in user_options {
            let spec = match schema.get(key.as_str()) {
                Some(spec) => spec,
                None => {
                    warnings.push(warning(format!("unsupported theme option '{}' given", key)));
                    continue;
                }
            };

            if !spec.option_type.accepts(value) {
                warnings.push(warning(format!(
                    "theme option '{}' has invalid type, expected {:?}",
                    key, spec.option_type
                )));
                continue;
            }

            if let (Some(allowed), Some(text)) = (&spec.values, value.as_str()) {
                if !allowed.iter().any(|a| a == text) {
                    warnings.push(warning(format!(
                        "theme option '{}' has invalid value '{}', allowed: {}",
                        key,
                        text,
                        allowed.join(", ")
                    )));
                    continue;
                }
            }

            options.insert(key.clone(), value.clone());
        }

        let resolved = ResolvedTheme {
            chain: chain.into_iter().cloned().collect(),
            options,
        };
        Ok((resolved, warnings))
    }
}
