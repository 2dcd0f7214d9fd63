//! refman CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use refman::directives::overview::DEFAULT_COLUMN;
use refman::document::Block;
use refman::{overview_table, BuildConfig, Builder, BuilderKind, DoxygenProjects, Highlighter, HtmlTranslator};

#[derive(Parser)]
#[command(name = "refman")]
#[command(about = "Reference manual builder for Doxygen-documented C++ libraries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the documentation
    Build {
        /// Output format
        #[arg(short = 'b', long, default_value = "html")]
        builder: String,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Turn warnings into errors
        #[arg(short = 'W', long)]
        fail_on_warning: bool,

        /// Source directory containing the configuration
        source: PathBuf,

        /// Output directory
        output: PathBuf,
    },

    /// Remove an output directory
    Clean {
        output: PathBuf,
    },

    /// Print the resolved configuration of a source directory
    Config {
        source: PathBuf,

        #[arg(short, long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Render a single overview table as HTML
    Overview {
        /// Source directory containing the configuration
        source: PathBuf,

        /// Doxygen compound file stem, e.g. `namespacemockturtle`
        file: String,

        /// Symbols to list, in order
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Heading of the symbol column
        #[arg(long, default_value = DEFAULT_COLUMN)]
        column: String,

        /// Breathe project to read the XML from
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();

    match cli.command {
        Commands::Build {
            builder,
            jobs,
            fail_on_warning,
            source,
            output,
        } => build(&builder, jobs, fail_on_warning, source, output).await,
        Commands::Clean { output } => {
            let builder = Builder::new(BuildConfig::default(), output.clone(), output, BuilderKind::Html)?;
            builder.clean().await
        }
        Commands::Config { source, format } => {
            let config = BuildConfig::discover(&source)?;
            let text = match format {
                ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
                ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
            };
            println!("{}", text);
            Ok(())
        }
        Commands::Overview {
            source,
            file,
            symbols,
            column,
            project,
        } => overview(&source, &file, &symbols, &column, project.as_deref()),
    }
}

async fn build(
    builder: &str,
    jobs: Option<usize>,
    fail_on_warning: bool,
    source: PathBuf,
    output: PathBuf,
) -> Result<()> {
    let kind: BuilderKind = builder.parse()?;
    let config = BuildConfig::discover(&source)
        .with_context(|| format!("Failed to load configuration from {}", source.display()))?;

    let mut builder = Builder::new(config, source, output, kind)?;
    if let Some(jobs) = jobs {
        builder.set_parallel_jobs(jobs);
    }
    builder.set_fail_on_warning(fail_on_warning);

    let stats = builder.build().await?;
    info!(
        "Build finished in {:.2}s: {} documents, {} files written, {:.2} MB, {} warnings, {} errors",
        stats.build_time.as_secs_f64(),
        stats.files_processed,
        stats.files_written,
        stats.output_size_mb,
        stats.warnings,
        stats.errors
    );
    if stats.errors > 0 {
        anyhow::bail!("build finished with {} error(s)", stats.errors);
    }
    Ok(())
}

fn overview(
    source: &Path,
    file: &str,
    symbols: &[String],
    column: &str,
    project: Option<&str>,
) -> Result<()> {
    let config = BuildConfig::discover(source)?;
    let projects = DoxygenProjects::new(&config, source);
    let stem = file.strip_suffix(".xml").unwrap_or(file);
    let compound = projects
        .compound(project, stem)
        .with_context(|| format!("Failed to read Doxygen XML for '{}'", stem))?;

    let (table, missing) = overview_table(&compound, column, symbols.iter().map(String::as_str));
    for symbol in missing {
        warn!("symbol '{}' not found in {}", symbol, compound.path.display());
    }

    let highlighter = Highlighter::new(config.pygments_style.as_deref());
    let html = HtmlTranslator::new("overview", &highlighter).blocks(&[Block::Table(table)]);
    println!("{}", html);
    Ok(())
}
