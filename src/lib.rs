//! refman
//!
//! A reference manual builder for C++ libraries documented with Doxygen.
//! Reads a Sphinx-style source tree (`conf.py`, reStructuredText and
//! Markdown), pulls symbol descriptions from Doxygen XML and writes HTML,
//! LaTeX, man pages or Texinfo.

pub mod builder;
pub mod config;
pub mod directives;
pub mod document;
pub mod doxygen;
pub mod environment;
pub mod error;
pub mod extensions;
pub mod inline;
pub mod matching;
pub mod navigation;
pub mod parser;
pub mod python_config;
pub mod resolve;
pub mod search;
pub mod templates;
pub mod theme;
pub mod utils;
pub mod writers;

pub use builder::{BuildStats, Builder, BuilderKind};
pub use config::BuildConfig;
pub use directives::{overview_table, Directive, DirectiveRegistry, OverviewTableDirective};
pub use document::Document;
pub use doxygen::{CompoundFile, DoxygenProjects, MemberDef};
pub use environment::BuildEnvironment;
pub use error::{BuildError, BuildErrorReport, BuildWarning, WarningKind};
pub use extensions::{Application, Extension, ExtensionLoader};
pub use parser::Parser;
pub use python_config::PythonConfigParser;
pub use search::SearchIndex;
pub use templates::TemplateEngine;
pub use theme::{ResolvedTheme, Theme, ThemeRegistry};
pub use writers::{HtmlTranslator, HtmlWriter, Highlighter, OutputWriter};
