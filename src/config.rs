//! Build configuration.
//!
//! The configuration record mirrors the settings of a Sphinx `conf.py`. It
//! can be read from a `conf.py` (see [`crate::python_config`]) or from a
//! YAML, TOML or JSON file layered with `REFMAN_*` environment overrides.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::python_config::PythonConfigParser;

/// File names tried by [`BuildConfig::discover`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "conf.py",
    "refman.yaml",
    "refman.yml",
    "refman.toml",
    "refman.json",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Project name, shown in titles and `|project|`
    pub project: String,
    pub copyright: String,
    pub author: String,
    pub version: String,
    /// Full version string, including alpha/beta/rc tags
    pub release: String,
    /// Document that holds the root toctree
    pub master_doc: String,
    /// File suffixes read as source documents
    #[serde(deserialize_with = "one_or_many")]
    pub source_suffix: Vec<String>,
    /// Extension module names, e.g. `sphinx.ext.mathjax`
    pub extensions: Vec<String>,
    /// Template directories, relative to the source directory
    pub templates_path: Vec<PathBuf>,
    pub include_patterns: Vec<String>,
    /// Glob patterns of source files to skip
    pub exclude_patterns: Vec<String>,
    pub language: Option<String>,
    /// Pygments style name, mapped to a syntect theme
    pub pygments_style: Option<String>,
    /// Whether `todo` directives produce output
    pub todo_include_todos: bool,
    pub today: String,
    /// strftime format used when `today` is empty
    pub today_fmt: String,

    /// HTML theme name, built in or found under `_themes`
    pub html_theme: String,
    /// Overrides for the theme's option defaults
    pub html_theme_options: serde_json::Map<String, serde_json::Value>,
    /// Directories copied into `_static`
    pub html_static_path: Vec<PathBuf>,
    /// Directories copied into the output root
    pub html_extra_path: Vec<PathBuf>,
    pub html_css_files: Vec<String>,
    pub html_js_files: Vec<String>,
    /// Sidebar templates by docname glob
    pub html_sidebars: IndexMap<String, Vec<String>>,
    pub html_title: Option<String>,
    /// strftime format of the "last updated" stamp; empty means the default
    pub html_last_updated_fmt: Option<String>,
    pub htmlhelp_basename: Option<String>,

    /// Settings for the LaTeX preamble
    pub latex_elements: LatexElements,
    /// One entry per LaTeX output file
    pub latex_documents: Vec<LatexDocument>,
    /// One entry per man page
    pub man_pages: Vec<ManPage>,
    /// One entry per Texinfo output file
    pub texinfo_documents: Vec<TexinfoDocument>,

    /// Doxygen XML directory of each breathe project
    pub breathe_projects: IndexMap<String, PathBuf>,
    /// Project used by directives that name none
    pub breathe_default_project: Option<String>,
    /// Shell command that generates the Doxygen XML
    pub doxygen_command: Option<String>,
    pub doxygen_when: DoxygenWhen,

    /// Directive names registered by the configuration's own setup hook.
    pub custom_directives: Vec<String>,

    /// Worker threads; defaults to the number of CPUs
    pub parallel_jobs: Option<usize>,
    pub fail_on_warning: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project: "Project".to_string(),
            copyright: String::new(),
            author: String::new(),
            version: String::new(),
            release: String::new(),
            master_doc: "index".to_string(),
            source_suffix: vec![".rst".to_string()],
            extensions: Vec::new(),
            templates_path: Vec::new(),
            include_patterns: vec!["**".to_string()],
            exclude_patterns: Vec::new(),
            language: None,
            pygments_style: None,
            todo_include_todos: false,
            today: String::new(),
            today_fmt: "%b %d, %Y".to_string(),
            html_theme: "alabaster".to_string(),
            html_theme_options: serde_json::Map::new(),
            html_static_path: Vec::new(),
            html_extra_path: Vec::new(),
            html_css_files: Vec::new(),
            html_js_files: Vec::new(),
            html_sidebars: IndexMap::new(),
            html_title: None,
            html_last_updated_fmt: None,
            htmlhelp_basename: None,
            latex_elements: LatexElements::default(),
            latex_documents: Vec::new(),
            man_pages: Vec::new(),
            texinfo_documents: Vec::new(),
            breathe_projects: IndexMap::new(),
            breathe_default_project: None,
            doxygen_command: None,
            doxygen_when: DoxygenWhen::Never,
            custom_directives: Vec::new(),
            parallel_jobs: None,
            fail_on_warning: false,
        }
    }
}

/// When the configured Doxygen command runs before a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoxygenWhen {
    Never,
    /// Only when the `READTHEDOCS` environment variable is `True`.
    ReadTheDocs,
    Always,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatexElements {
    /// `letterpaper` unless set
    pub papersize: Option<String>,
    pub pointsize: Option<String>,
    /// Extra LaTeX inserted before `\begin{document}`
    pub preamble: Option<String>,
    pub figure_align: Option<String>,
}

impl LatexElements {
    /// Paper size with its default applied
    pub fn papersize(&self) -> &str {
        self.papersize.as_deref().unwrap_or("letterpaper")
    }

    /// Font size with its default applied
    pub fn pointsize(&self) -> &str {
        self.pointsize.as_deref().unwrap_or("10pt")
    }

    /// Float placement with its default applied
    pub fn figure_align(&self) -> &str {
        self.figure_align.as_deref().unwrap_or("htbp")
    }
}

/// `(startdoc, targetname, title, author, documentclass)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LatexDocumentRepr")]
pub struct LatexDocument {
    pub startdoc: String,
    /// Output file name, e.g. `mockturtle.tex`
    pub targetname: String,
    pub title: String,
    pub author: String,
    /// `manual` or `howto`
    pub documentclass: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LatexDocumentRepr {
    Tuple(String, String, String, String, String),
    Named {
        startdoc: String,
        targetname: String,
        title: String,
        author: String,
        documentclass: String,
    },
}

impl From<LatexDocumentRepr> for LatexDocument {
    fn from(repr: LatexDocumentRepr) -> Self {
        match repr {
            LatexDocumentRepr::Tuple(startdoc, targetname, title, author, documentclass)
            | LatexDocumentRepr::Named {
                startdoc,
                targetname,
                title,
                author,
                documentclass,
            } => Self {
                startdoc,
                targetname,
                title,
                author,
                documentclass,
            },
        }
    }
}

/// `(startdoc, name, description, authors, section)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManPageRepr")]
pub struct ManPage {
    /// Document the page starts from
    pub startdoc: String,
    /// Page name, also the output file stem
    pub name: String,
    pub description: String,
    pub authors: Vec<String>,
    /// Manual section number
    pub section: u8,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ManPageRepr {
    Tuple(String, String, String, OneOrMany, u8),
    Named {
        startdoc: String,
        name: String,
        description: String,
        authors: OneOrMany,
        section: u8,
    },
}

impl From<ManPageRepr> for ManPage {
    fn from(repr: ManPageRepr) -> Self {
        match repr {
            ManPageRepr::Tuple(startdoc, name, description, authors, section)
            | ManPageRepr::Named {
                startdoc,
                name,
                description,
                authors,
                section,
            } => Self {
                startdoc,
                name,
                description,
                authors: authors.into_vec(),
                section,
            },
        }
    }
}

/// `(startdoc, targetname, title, author, dir_entry, description, category)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TexinfoDocumentRepr")]
pub struct TexinfoDocument {
    pub startdoc: String,
    pub targetname: String,
    pub title: String,
    pub author: String,
    pub dir_entry: String,
    pub description: String,
    pub category: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TexinfoDocumentRepr {
    Tuple(String, String, String, String, String, String, String),
    Named {
        startdoc: String,
        targetname: String,
        title: String,
        author: String,
        dir_entry: String,
        description: String,
        category: String,
    },
}

impl From<TexinfoDocumentRepr> for TexinfoDocument {
    fn from(repr: TexinfoDocumentRepr) -> Self {
        match repr {
            TexinfoDocumentRepr::Tuple(
                startdoc,
                targetname,
                title,
                author,
                dir_entry,
                description,
                category,
            )
            | TexinfoDocumentRepr::Named {
                startdoc,
                targetname,
                title,
                author,
                dir_entry,
                description,
                category,
            } => Self {
                startdoc,
                targetname,
                title,
                author,
                dir_entry,
                description,
                category,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    OneOrMany::deserialize(deserializer).map(OneOrMany::into_vec)
}

impl BuildConfig {
    /// Load a configuration file, picking the reader from its extension.
    pub fn from_file(path: &Path) -> Result<Self, BuildError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let mut config = match extension {
            "py" => PythonConfigParser::new().parse_file(path)?.into_build_config()?,
            "yaml" | "yml" => Self::load_layered(path, config::FileFormat::Yaml)?,
            "toml" => Self::load_layered(path, config::FileFormat::Toml)?,
            "json" => Self::load_layered(path, config::FileFormat::Json)?,
            other => {
                return Err(BuildError::Config(format!(
                    "unsupported configuration format '{}' ({})",
                    other,
                    path.display()
                )))
            }
        };

        config.finalize();
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Find and load the configuration file of a source directory. Falls back
    /// to defaults when none exists.
    pub fn discover(source_dir: &Path) -> Result<Self, BuildError> {
        for name in CONFIG_FILE_NAMES {
            let candidate = source_dir.join(name);
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }

        log::warn!(
            "No configuration file found in {}, using defaults",
            source_dir.display()
        );
        let mut config = Self::default();
        config.finalize();
        Ok(config)
    }

    fn load_layered(path: &Path, format: config::FileFormat) -> Result<Self, BuildError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(format))
            .add_source(
                config::Environment::with_prefix("REFMAN")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("extensions")
                    .with_list_parse_key("exclude_patterns"),
            )
            .build()
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))?;

        settings
            .try_deserialize()
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Fill in the settings whose defaults derive from other settings.
    pub fn finalize(&mut self) {
        if self.release.is_empty() && !self.version.is_empty() {
            self.release = self.version.clone();
        }

        if self.htmlhelp_basename.is_none() {
            self.htmlhelp_basename = Some(format!("{}doc", make_filename(&self.project)));
        }

        if self.latex_documents.is_empty() {
            self.latex_documents.push(LatexDocument {
                startdoc: self.master_doc.clone(),
                targetname: format!("{}.tex", make_filename(&self.project)),
                title: format!("{} Documentation", self.project),
                author: self.author.clone(),
                documentclass: "manual".to_string(),
            });
        }

        if self.man_pages.is_empty() {
            self.man_pages.push(ManPage {
                startdoc: self.master_doc.clone(),
                name: make_filename(&self.project).to_lowercase(),
                description: format!("{} {}", self.project, self.release).trim().to_string(),
                authors: if self.author.is_empty() {
                    Vec::new()
                } else {
                    vec![self.author.clone()]
                },
                section: 1,
            });
        }

        if self.texinfo_documents.is_empty() {
            let name = make_filename(&self.project);
            self.texinfo_documents.push(TexinfoDocument {
                startdoc: self.master_doc.clone(),
                targetname: name.clone(),
                title: format!("{} Documentation", self.project),
                author: self.author.clone(),
                dir_entry: self.project.clone(),
                description: String::new(),
                category: "Miscellaneous".to_string(),
            });
        }
    }

    /// Check values that cannot be checked while deserializing
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.master_doc.trim().is_empty() {
            return Err(BuildError::Config("master_doc must not be empty".to_string()));
        }

        if self.source_suffix.is_empty() {
            return Err(BuildError::Config(
                "source_suffix must name at least one suffix".to_string(),
            ));
        }
        for suffix in &self.source_suffix {
            if !suffix.starts_with('.') {
                return Err(BuildError::Config(format!(
                    "source suffix '{}' must start with '.'",
                    suffix
                )));
            }
        }

        for page in &self.man_pages {
            if !(1..=9).contains(&page.section) {
                return Err(BuildError::Config(format!(
                    "man page '{}' has invalid section {}",
                    page.name, page.section
                )));
            }
        }

        if let Some(project) = &self.breathe_default_project {
            if !self.breathe_projects.contains_key(project) {
                return Err(BuildError::Config(format!(
                    "breathe_default_project '{}' is not listed in breathe_projects",
                    project
                )));
            }
        }

        if self.parallel_jobs == Some(0) {
            return Err(BuildError::Config("parallel_jobs must be positive".to_string()));
        }

        Ok(())
    }

    /// The `html_title` setting, or Sphinx's "<project> <release> documentation".
    pub fn html_title(&self) -> String {
        self.html_title.clone().unwrap_or_else(|| {
            if self.release.is_empty() {
                format!("{} documentation", self.project)
            } else {
                format!("{} {} documentation", self.project, self.release)
            }
        })
    }

    /// The `today` setting, or the current date in `today_fmt`.
    pub fn today(&self) -> String {
        if !self.today.is_empty() {
            return self.today.clone();
        }
        chrono::Local::now().format(&self.today_fmt).to_string()
    }

    /// Whether `name` is listed in `extensions`
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext == name)
    }

    /// Strip a configured source suffix from a file name.
    pub fn strip_source_suffix<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        self.source_suffix
            .iter()
            .find_map(|suffix| file_name.strip_suffix(suffix.as_str()))
    }
}

/// Sphinx's `make_filename`: keep alphanumerics, '-' and '_'.
pub fn make_filename(name: &str) -> String {
    let filename: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if filename.is_empty() {
        "sphinx".to_string()
    } else {
        filename
    }
}
