//! Directive registry.
//!
//! A directive declares its arguments, options and content through a
//! [`DirectiveSpec`]. The registry checks every call against that spec
//! before running it, so implementations receive already split arguments
//! and typed option values.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::BuildConfig;
use crate::document::{Block, DirectiveCall};
use crate::doxygen::DoxygenProjects;
use crate::error::BuildWarning;
use crate::parser::Parser;

pub mod breathe;
pub mod builtin;
pub mod overview;
pub mod validation;

pub use overview::{overview_table, OverviewTableDirective};

/// How an option value is converted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionKind {
    /// No value allowed.
    Flag,
    /// Any text, passed through.
    Unchanged,
    PositiveInt,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag,
    Text(String),
    Int(usize),
}

#[derive(Debug, Clone, Default)]
pub struct DirectiveSpec {
    pub required_arguments: usize,
    pub optional_arguments: usize,
    /// The last argument may contain spaces.
    pub final_argument_whitespace: bool,
    pub has_content: bool,
    pub option_spec: Vec<(&'static str, OptionKind)>,
}

impl DirectiveSpec {
    /// Kind of the option `name`, if the directive accepts it
    pub fn option_kind(&self, name: &str) -> Option<OptionKind> {
        self.option_spec
            .iter()
            .find(|(option, _)| *option == name)
            .map(|(_, kind)| *kind)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DirectiveError {
    /// The call does not match the directive's spec.
    #[error("{message}")]
    Invalid {
        message: String,
        suggestion: Option<String>,
    },
    /// A referenced Doxygen symbol does not exist.
    #[error("{0}")]
    MissingSymbol(String),
    /// The directive could not produce output at all.
    #[error("{0}")]
    Failed(String),
}

impl DirectiveError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DirectiveError::Invalid {
            message: message.into(),
            suggestion: None,
        }
    }
}

/// A call that passed validation.
#[derive(Debug, Clone)]
pub struct DirectiveInput<'a> {
    pub call: &'a DirectiveCall,
    pub arguments: Vec<String>,
    pub options: IndexMap<String, OptionValue>,
}

impl DirectiveInput<'_> {
    /// Positional argument at `index`
    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }

    /// Text value of option `name`
    pub fn option(&self, name: &str) -> Option<&str> {
        match self.options.get(name) {
            Some(OptionValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn int_option(&self, name: &str) -> Option<usize> {
        match self.options.get(name) {
            Some(OptionValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Whether flag option `name` was given
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.options.get(name), Some(OptionValue::Flag))
    }

    /// Non-blank content lines, trimmed.
    pub fn content_lines(&self) -> impl Iterator<Item = &str> {
        self.call
            .content
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
    }
}

/// What a directive can see while it runs.
pub struct DirectiveContext<'a> {
    pub config: &'a BuildConfig,
    pub docname: &'a str,
    pub source_path: &'a Path,
    pub parser: &'a Parser,
    pub doxygen: &'a DoxygenProjects,
    /// Every docname in the project.
    pub docnames: &'a BTreeSet<String>,
    warnings: RefCell<Vec<BuildWarning>>,
}

impl<'a> DirectiveContext<'a> {
    pub fn new(
        config: &'a BuildConfig,
        docname: &'a str,
        source_path: &'a Path,
        parser: &'a Parser,
        doxygen: &'a DoxygenProjects,
        docnames: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            config,
            docname,
            source_path,
            parser,
            doxygen,
            docnames,
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Record a warning that does not stop the directive.
    pub fn warn(&self, warning: BuildWarning) {
        self.warnings.borrow_mut().push(warning);
    }

    /// Drain the warnings recorded so far
    pub fn take_warnings(&self) -> Vec<BuildWarning> {
        self.warnings.take()
    }
}

/// A directive handler
pub trait Directive: Send + Sync {
    fn name(&self) -> &str;

    /// Other names the directive answers to.
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    fn spec(&self) -> DirectiveSpec;

    fn run(
        &self,
        input: &DirectiveInput<'_>,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError>;
}

#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    directives: HashMap<String, Arc<dyn Directive>>,
}

impl DirectiveRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directive under its name and aliases
    pub fn register(&mut self, directive: Arc<dyn Directive>) {
        for alias in directive.aliases() {
            self.directives.insert(alias.to_string(), Arc::clone(&directive));
        }
        self.directives
            .insert(directive.name().to_string(), directive);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Directive>> {
        self.directives.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.directives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Closest registered name, for "did you mean" hints.
    pub fn suggest(&self, name: &str) -> Option<String> {
        validation::closest_match(name, self.directives.keys().map(String::as_str))
            .map(|candidate| format!("Did you mean '{}'?", candidate))
    }

    /// Check a call against the spec of the directive it names.
    pub fn validate<'c>(&self, call: &'c DirectiveCall) -> Result<DirectiveInput<'c>, DirectiveError> {
        match self.directives.get(&call.name) {
            Some(directive) => validation::validate_call(call, &directive.spec()),
            None => Err(DirectiveError::Invalid {
                message: format!("Unknown directive type \"{}\"", call.name),
                suggestion: self.suggest(&call.name),
            }),
        }
    }

    /// Validate and run a directive call
    pub fn run(
        &self,
        call: &DirectiveCall,
        ctx: &DirectiveContext<'_>,
    ) -> Result<Vec<Block>, DirectiveError> {
        let input = self.validate(call)?;
        match self.directives.get(&call.name) {
            Some(directive) => directive.run(&input, ctx),
            None => Err(DirectiveError::invalid(format!(
                "Unknown directive type \"{}\"",
                call.name
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A project with the given docnames and Doxygen XML under
    /// `doxyxml/xml`.
    pub struct Fixture {
        pub config: BuildConfig,
        pub parser: Parser,
        pub doxygen: DoxygenProjects,
        pub docnames: BTreeSet<String>,
        pub source_path: PathBuf,
        _dir: TempDir,
    }

    impl Fixture {
        pub fn new(docnames: &[&str]) -> Self {
            Self::with_xml(docnames, &[])
        }

        pub fn with_xml(docnames: &[&str], files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let xml_dir = dir.path().join(crate::doxygen::DEFAULT_XML_DIR);
            std::fs::create_dir_all(&xml_dir).unwrap();
            for (name, content) in files {
                std::fs::write(xml_dir.join(name), content).unwrap();
            }

            let config = BuildConfig::default();
            Self {
                parser: Parser::new(&config).unwrap(),
                doxygen: DoxygenProjects::new(&config, dir.path()),
                docnames: docnames.iter().map(|d| d.to_string()).collect(),
                source_path: dir.path().join("index.rst"),
                config,
                _dir: dir,
            }
        }

        pub fn context<'a>(&'a self, docname: &'a str) -> DirectiveContext<'a> {
            DirectiveContext::new(
                &self.config,
                docname,
                &self.source_path,
                &self.parser,
                &self.doxygen,
                &self.docnames,
            )
        }
    }
}
