use anyhow::{Context, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BuildConfig, CONFIG_FILE_NAMES};
use crate::directives::DirectiveRegistry;
use crate::document::Document;
use crate::doxygen::{self, DoxygenProjects};
use crate::environment::BuildEnvironment;
use crate::error::{BuildError, BuildErrorReport, BuildWarning, WarningKind};
use crate::extensions::{Application, ExtensionLoader};
use crate::matching;
use crate::parser::Parser;
use crate::resolve::{self, Resolver};
use crate::search::SearchIndex;
use crate::theme::{ResolvedTheme, ThemeRegistry};
use crate::utils;
use crate::writers::{HtmlWriter, LatexWriter, ManWriter, OutputWriter, TexinfoWriter, WriteContext};

/// Never treated as sources, whatever the configuration says.
const BUILTIN_EXCLUDES: &[&str] = &[
    "_build/**",
    "__pycache__/**",
    ".git/**",
    ".svn/**",
    ".hg/**",
    ".*/**",
    "Thumbs.db",
    ".DS_Store",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderKind {
    Html,
    Latex,
    Man,
    Texinfo,
}

impl BuilderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuilderKind::Html => "html",
            BuilderKind::Latex => "latex",
            BuilderKind::Man => "man",
            BuilderKind::Texinfo => "texinfo",
        }
    }
}

impl fmt::Display for BuilderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuilderKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(BuilderKind::Html),
            "latex" => Ok(BuilderKind::Latex),
            "man" => Ok(BuilderKind::Man),
            "texinfo" => Ok(BuilderKind::Texinfo),
            other => Err(BuildError::Config(format!(
                "unknown builder '{}', expected one of html, latex, man, texinfo",
                other
            ))),
        }
    }
}

/// Summary of one build, printed by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub builder: BuilderKind,
    /// Source documents parsed and expanded
    pub files_processed: usize,
    /// Source documents that failed to read or parse
    pub files_skipped: usize,
    /// Output files written, theme assets included
    pub files_written: usize,
    pub build_time: Duration,
    /// Total size of the output directory
    pub output_size_mb: f64,
    pub errors: usize,
    pub warnings: usize,
    pub warning_details: Vec<BuildWarning>,
    pub error_details: Vec<BuildErrorReport>,
}

/// Builds a documentation project into one output format
pub struct Builder {
    config: BuildConfig,
    source_dir: PathBuf,
    output_dir: PathBuf,
    /// Location reported for configuration diagnostics.
    config_path: PathBuf,
    kind: BuilderKind,
    parser: Parser,
    parallel_jobs: usize,
    fail_on_warning: bool,
    warnings: Arc<Mutex<Vec<BuildWarning>>>,
    errors: Arc<Mutex<Vec<BuildErrorReport>>>,
}

impl Builder {
    /// Create a builder for `source_dir`, writing into `output_dir`
    pub fn new(config: BuildConfig, source_dir: PathBuf, output_dir: PathBuf, kind: BuilderKind) -> Result<Self> {
        let parser = Parser::new(&config)?;

        let parallel_jobs = config.parallel_jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        });

        let config_path = CONFIG_FILE_NAMES
            .iter()
            .map(|name| source_dir.join(name))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| source_dir.join("conf.py"));

        Ok(Self {
            fail_on_warning: config.fail_on_warning,
            config,
            source_dir,
            output_dir,
            config_path,
            kind,
            parser,
            parallel_jobs,
            warnings: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Set the number of worker threads
    pub fn set_parallel_jobs(&mut self, jobs: usize) {
        self.parallel_jobs = jobs.max(1);
    }

    /// Treat warnings as errors
    pub fn set_fail_on_warning(&mut self, fail: bool) {
        self.fail_on_warning = self.fail_on_warning || fail;
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run the whole build
    pub async fn build(&self) -> Result<BuildStats> {
        let start_time = Instant::now();
        info!(
            "Running {} builder: {} -> {}",
            self.kind,
            self.source_dir.display(),
            self.output_dir.display()
        );

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", self.output_dir.display()))?;

        if doxygen::run_doxygen(&self.config, &self.source_dir).await? {
            info!("Doxygen XML regenerated");
        }

        let source_files = self.discover_source_files()?;
        info!("Found {} source files", source_files.len());

        let (app, extension_warnings) = ExtensionLoader::new().load(&self.config, &self.config_path);
        self.add_warnings(extension_warnings);
        debug!("Loaded extensions: {}", app.loaded.join(", "));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_jobs)
            .build()
            .context("Failed to create thread pool")?;

        let documents = self.read_documents(&pool, &source_files, &app.registry);
        let files_processed = documents.len();
        let files_skipped = source_files.len() - files_processed;

        let (env, env_warnings) = BuildEnvironment::collect(&self.config.master_doc, &documents);
        self.add_warnings(env_warnings);

        let mut documents = documents;
        let reference_warnings: Vec<BuildWarning> = pool.install(|| {
            documents
                .par_iter_mut()
                .flat_map(|doc| resolve::resolve_references(&env, doc))
                .collect()
        });
        self.add_warnings(reference_warnings);

        let files_written = match self.kind {
            BuilderKind::Html => self.write_html(&pool, &app, &env, &documents).await?,
            BuilderKind::Latex => self.write_single_files(&LatexWriter, &env, &documents)?,
            BuilderKind::Man => self.write_single_files(&ManWriter, &env, &documents)?,
            BuilderKind::Texinfo => self.write_single_files(&TexinfoWriter, &env, &documents)?,
        };

        let output_size = utils::calculate_directory_size(&self.output_dir).await?;
        let warnings = self.warnings.lock().clone();
        let errors = self.errors.lock().clone();

        for warning in &warnings {
            warn!("{}", warning);
        }
        for error in &errors {
            log::error!("{}", error);
        }

        let stats = BuildStats {
            builder: self.kind,
            files_processed,
            files_skipped,
            files_written,
            build_time: start_time.elapsed(),
            output_size_mb: output_size as f64 / (1024.0 * 1024.0),
            errors: errors.len(),
            warnings: warnings.len(),
            warning_details: warnings,
            error_details: errors,
        };

        if self.fail_on_warning && stats.warnings > 0 {
            return Err(BuildError::WarningsAsErrors(stats.warnings).into());
        }

        Ok(stats)
    }

    /// Source files as `(docname, path)`, sorted by path.
    fn discover_source_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut exclude_patterns = self.config.exclude_patterns.clone();
        exclude_patterns.extend(BUILTIN_EXCLUDES.iter().map(|p| p.to_string()));

        // An output directory inside the source tree is never read back.
        let source_canonical = self.source_dir.canonicalize()?;
        if let Ok(output_canonical) = self.output_dir.canonicalize() {
            if let Ok(relative) = output_canonical.strip_prefix(&source_canonical) {
                let relative = matching::normalize_path(relative);
                if !relative.is_empty() {
                    exclude_patterns.push(format!("{}/**", relative));
                    exclude_patterns.push(relative);
                }
            }
        }

        let files = matching::get_matching_files(
            &self.source_dir,
            &self.config.include_patterns,
            &exclude_patterns,
        )?;

        let mut sources = Vec::new();
        for file in files {
            match utils::docname_for(&source_canonical, &file, &self.config.source_suffix) {
                Some(docname) => sources.push((docname, file)),
                None => debug!("Skipping {} (not a source file)", file.display()),
            }
        }
        Ok(sources)
    }

    /// Parse and expand every source file. Files that cannot be read or
    /// parsed are reported and left out.
    fn read_documents(
        &self,
        pool: &rayon::ThreadPool,
        source_files: &[(String, PathBuf)],
        registry: &DirectiveRegistry,
    ) -> Vec<Document> {
        let docnames: BTreeSet<String> = source_files.iter().map(|(docname, _)| docname.clone()).collect();
        let doxygen = DoxygenProjects::new(&self.config, &self.source_dir);
        let resolver = Resolver {
            config: &self.config,
            registry,
            parser: &self.parser,
            doxygen: &doxygen,
            docnames: &docnames,
        };

        let documents: Vec<Document> = pool.install(|| {
            source_files
                .par_iter()
                .filter_map(|(docname, path)| match self.read_document(&resolver, docname, path) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        self.errors
                            .lock()
                            .push(BuildErrorReport::new(path, None, format!("{:#}", e)));
                        None
                    }
                })
                .collect()
        });

        debug!("Parsed {} Doxygen XML files", doxygen.cached_files());
        documents
    }

    fn read_document(&self, resolver: &Resolver<'_>, docname: &str, path: &Path) -> Result<Document> {
        debug!("Reading {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut doc = self.parser.parse(path, docname, &content)?;

        let diagnostics = resolver.expand(&mut doc);
        self.add_warnings(diagnostics.warnings);
        self.errors.lock().extend(diagnostics.errors);
        Ok(doc)
    }

    async fn write_html(
        &self,
        pool: &rayon::ThreadPool,
        app: &Application,
        env: &BuildEnvironment,
        documents: &[Document],
    ) -> Result<usize> {
        let theme = self.resolve_theme()?;
        let writer = HtmlWriter::new(
            &self.config,
            &self.source_dir,
            &theme,
            app.js_files.clone(),
            app.css_files.clone(),
        );

        let written: Vec<Option<PathBuf>> = pool.install(|| {
            documents
                .par_iter()
                .map(|doc| match writer.write_document(doc, env, &self.output_dir) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        self.errors
                            .lock()
                            .push(BuildErrorReport::new(&doc.source_path, None, e.to_string()));
                        None
                    }
                })
                .collect()
        });
        let mut files_written = written.iter().flatten().count();

        writer.write_search_page(env, &self.output_dir)?;
        self.search_index(env, documents).write(&self.output_dir)?;
        files_written += 2;

        files_written += writer.write_theme_assets(&self.output_dir)?;
        let static_dir = self.output_dir.join("_static");
        for dir in theme.static_dirs() {
            utils::copy_dir_recursive(dir, &static_dir, None).await?;
        }
        self.copy_static_paths(&static_dir).await?;
        self.copy_extra_paths().await?;

        info!("Wrote {} HTML files", files_written);
        Ok(files_written)
    }

    fn resolve_theme(&self) -> Result<ResolvedTheme> {
        let mut registry = ThemeRegistry::new();
        let search_paths = std::iter::once(PathBuf::from("_themes"))
            .chain(self.config.templates_path.iter().cloned())
            .map(|dir| self.source_dir.join(dir));
        for dir in search_paths {
            if dir.is_dir() {
                registry.add_search_path(dir);
            }
        }
        registry.discover_themes();

        let (theme, warnings) = registry.resolve(
            &self.config.html_theme,
            &self.config.html_theme_options,
            &self.config_path,
        )?;
        self.add_warnings(warnings);
        info!("Using theme '{}'", theme.name());
        Ok(theme)
    }

    /// Documents in reading order, then anything outside the toctrees.
    fn search_index(&self, env: &BuildEnvironment, documents: &[Document]) -> SearchIndex {
        let mut ordered: Vec<&Document> = Vec::with_capacity(documents.len());
        let mut seen = BTreeSet::new();
        for docname in env.documents_under(&self.config.master_doc) {
            if let Some(doc) = documents.iter().find(|doc| doc.docname == docname) {
                seen.insert(docname);
                ordered.push(doc);
            }
        }
        let mut rest: Vec<&Document> = documents.iter().filter(|doc| !seen.contains(&doc.docname)).collect();
        rest.sort_by(|a, b| a.docname.cmp(&b.docname));
        ordered.extend(rest);
        SearchIndex::build(&ordered)
    }

    async fn copy_static_paths(&self, static_dir: &Path) -> Result<()> {
        for static_path in &self.config.html_static_path {
            let source = self.source_dir.join(static_path);
            if source.is_dir() {
                utils::copy_dir_recursive(&source, static_dir, None).await?;
            } else if source.is_file() {
                if let Some(file_name) = source.file_name() {
                    tokio::fs::create_dir_all(static_dir).await?;
                    tokio::fs::copy(&source, static_dir.join(file_name)).await?;
                }
            } else {
                self.add_warnings(vec![BuildWarning::new(
                    WarningKind::Config,
                    &self.config_path,
                    None,
                    format!("html_static_path entry {} does not exist", static_path.display()),
                )]);
            }
        }
        Ok(())
    }

    /// Copy `html_extra_path` entries to the output root.
    async fn copy_extra_paths(&self) -> Result<()> {
        let source_canonical = self.source_dir.canonicalize()?;
        let output_canonical = self.output_dir.canonicalize()?;

        for extra_path in &self.config.html_extra_path {
            let source = self.source_dir.join(extra_path);
            if !source.exists() {
                self.add_warnings(vec![BuildWarning::new(
                    WarningKind::Config,
                    &self.config_path,
                    None,
                    format!("html_extra_path entry {} does not exist", extra_path.display()),
                )]);
                continue;
            }

            let canonical = source.canonicalize()?;
            if source_canonical.starts_with(&canonical) {
                warn!(
                    "html_extra_path entry {} contains the source directory, skipping",
                    extra_path.display()
                );
                continue;
            }
            if canonical.starts_with(&output_canonical) {
                warn!(
                    "html_extra_path entry {} is inside the output directory, skipping",
                    extra_path.display()
                );
                continue;
            }

            if canonical.is_dir() {
                utils::copy_dir_recursive(&canonical, &self.output_dir, Some(&output_canonical)).await?;
            } else if let Some(file_name) = canonical.file_name() {
                tokio::fs::copy(&canonical, self.output_dir.join(file_name)).await?;
            }
            debug!("Copied extra path {}", extra_path.display());
        }
        Ok(())
    }

    fn write_single_files(
        &self,
        writer: &dyn OutputWriter,
        env: &BuildEnvironment,
        documents: &[Document],
    ) -> Result<usize> {
        let ctx = WriteContext {
            config: &self.config,
            env,
            documents,
            output_dir: &self.output_dir,
            config_path: &self.config_path,
        };
        let report = writer.write(&ctx)?;
        info!("Wrote {} {} files", report.files.len(), writer.name());
        self.add_warnings(report.warnings);
        Ok(report.files.len())
    }

    fn add_warnings(&self, warnings: Vec<BuildWarning>) {
        if !warnings.is_empty() {
            self.warnings.lock().extend(warnings);
        }
    }

    /// Remove the output directory
    pub async fn clean(&self) -> Result<()> {
        if self.output_dir.exists() {
            tokio::fs::remove_dir_all(&self.output_dir)
                .await
                .with_context(|| format!("Failed to remove {}", self.output_dir.display()))?;
            info!("Removed {}", self.output_dir.display());
        }
        Ok(())
    }
}
