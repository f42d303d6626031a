pub mod config;
mod error;
pub mod report;
pub mod rules_store;
pub mod schema_store;

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use helm_mapify::logging::{LogFormat, use_color};
use helm_mapify::{Options, Pipeline};
use helm_mapify_core::OverrideRule;
use serde::Serialize;
use termcolor::ColorChoice;
use tracing::{debug, warn};
use vfs::VfsPath;

use crate::config::ConfigDir;
use crate::report::TextReport;

pub use error::{CliError, CliResult};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "helm-mapify",
    version,
    about = "Convert list-valued Helm values into maps keyed by a unique field"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding the rule store and the schema store
    #[arg(long, global = true, env = "HELM_MAPIFY_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    /// json, pretty-compact or pretty
    #[arg(long, global = true, default_value = "pretty-compact")]
    pub log_format: LogFormat,

    #[arg(long, global = true, value_enum, default_value_t = Color::Auto)]
    pub color: Color,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Auto,
    Always,
    Never,
}

impl From<Color> for ColorChoice {
    fn from(color: Color) -> Self {
        match color {
            Color::Auto => ColorChoice::Auto,
            Color::Always => ColorChoice::Always,
            Color::Never => ColorChoice::Never,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report list fields that could be converted, without writing anything
    Detect(ChartArgs),

    /// Convert list fields to maps in values.yaml and rewrite the templates
    Convert(ConvertArgs),

    /// Manage override rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Manage extension schemas
    #[command(subcommand)]
    Schema(SchemaCommand),
}

#[derive(Args, Debug, Clone)]
pub struct ChartArgs {
    #[arg(value_name = "CHART_DIR", default_value = ".")]
    pub chart_dir: PathBuf,

    /// Additional schema file or directory, used for this run only
    #[arg(long = "schema", value_name = "PATH")]
    pub schemas: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub chart: ChartArgs,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Convert subcharts first
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip chart directories under charts/
    #[arg(long)]
    pub no_embedded: bool,

    /// Skip packaged .tgz subcharts under charts/
    #[arg(long)]
    pub no_archived: bool,

    /// Skip dependencies referenced through file://
    #[arg(long)]
    pub no_linked: bool,

    /// Expand archived subcharts before converting them
    #[arg(long)]
    pub expand_archived: bool,

    #[arg(long, default_value = helm_mapify::backup::DEFAULT_BACKUP_SUFFIX)]
    pub backup_suffix: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesCommand {
    /// Declare the unique key of a list that no schema knows about
    Add {
        /// Values path, e.g. `env` or `*.extraEnv`
        pattern: String,

        #[arg(short, long = "key", required = true)]
        keys: Vec<String>,

        /// Collapse `{key: k, <field>: v}` elements to `k: v`
        #[arg(long)]
        promote_scalar: Option<String>,
    },
    List {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SchemaCommand {
    /// Store CRDs or JSON schemas from a URL, a file or a directory
    Load {
        source: String,

        /// Replace schemas that are already stored
        #[arg(long)]
        overwrite: bool,

        /// Treat SOURCE as `<group>/<version>/<Kind>` and fetch it from the CRDs catalog
        #[arg(long)]
        catalog: bool,

        #[arg(
            long,
            env = "HELM_MAPIFY_CATALOG_URL",
            default_value = helm_mapify_k8s::fetch::DEFAULT_CATALOG_URL
        )]
        catalog_url: String,
    },
    List,
}

fn chart_root(dir: &std::path::Path) -> CliResult<VfsPath> {
    if !dir.is_dir() {
        return Err(CliError::ChartDirMissing {
            path: dir.to_path_buf(),
        });
    }
    // `file://../x` dependencies may live outside the chart directory
    let dir = dir.canonicalize()?;
    let root = VfsPath::new(vfs::PhysicalFS::new("/"));
    Ok(root.join(dir.to_string_lossy().trim_start_matches('/'))?)
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn pipeline_options(config: &ConfigDir, chart: &ChartArgs) -> CliResult<Options> {
    let mut schema_sources = Vec::new();
    let stored = config.schemas_dir();
    if stored.is_dir() {
        schema_sources.push(stored);
    }
    schema_sources.extend(chart.schemas.iter().cloned());
    Ok(Options {
        schema_sources,
        rules: rules_store::load(&config.rules_file())?,
        ..Options::default()
    })
}

/// Execute a parsed command line.
///
/// # Errors
///
/// Fails when the chart directory or a required input is missing or
/// unreadable. Failures inside subcharts are part of the report instead.
pub fn run(cli: Cli) -> CliResult<()> {
    let config = ConfigDir::resolve(cli.global.config_dir);
    let color = use_color(cli.global.color.into());
    debug!(config_dir = %config.path().display(), "resolved configuration");

    match cli.command {
        Command::Detect(args) => {
            let options = pipeline_options(&config, &args)?;
            let chart = chart_root(&args.chart_dir)?;
            let report = Pipeline::new(options).detect(&chart)?;
            match args.output {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    TextReport::new(std::io::stdout().lock(), color).detect(&report)?;
                }
            }
        }
        Command::Convert(args) => {
            let options = Options {
                dry_run: args.dry_run,
                recursive: args.recursive,
                include_embedded: !args.no_embedded,
                include_linked: !args.no_linked,
                include_archived: !args.no_archived,
                expand_archived: args.expand_archived,
                backup_suffix: args.backup_suffix,
                ..pipeline_options(&config, &args.chart)?
            };
            let chart = chart_root(&args.chart.chart_dir)?;
            let report = Pipeline::new(options).convert(&chart)?;
            if report.has_errors() {
                warn!(chart = %report.chart, "some subcharts could not be converted");
            }
            match args.chart.output {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    TextReport::new(std::io::stdout().lock(), color).convert(&report)?;
                }
            }
        }
        Command::Rules(RulesCommand::Add {
            pattern,
            keys,
            promote_scalar,
        }) => {
            let rule = OverrideRule {
                path_pattern: pattern,
                unique_keys: keys,
                promote_scalar,
            };
            rules_store::append(&config.rules_file(), rule)?;
        }
        Command::Rules(RulesCommand::List { output }) => {
            let rules = rules_store::load(&config.rules_file())?;
            match output {
                OutputFormat::Json => print_json(&rules.rules())?,
                OutputFormat::Text => {
                    let mut out = std::io::stdout().lock();
                    for rule in rules.rules() {
                        write!(out, "{}  key={}", rule.path_pattern, rule.unique_keys.join(","))?;
                        if let Some(field) = &rule.promote_scalar {
                            write!(out, "  promote={field}")?;
                        }
                        writeln!(out)?;
                    }
                }
            }
        }
        Command::Schema(SchemaCommand::Load {
            source,
            overwrite,
            catalog,
            catalog_url,
        }) => {
            let source = if catalog {
                schema_store::catalog_source(&catalog_url, &source)?
            } else {
                source
            };
            let stored = schema_store::load(&config.schemas_dir(), &source, overwrite)?;
            let mut out = std::io::stdout().lock();
            for schema in stored {
                let state = if schema.written { "stored" } else { "kept" };
                writeln!(out, "{state} {}", schema.path.display())?;
            }
        }
        Command::Schema(SchemaCommand::List) => {
            let mut out = std::io::stdout().lock();
            for resource in schema_store::list(&config.schemas_dir())? {
                writeln!(out, "{resource}")?;
            }
        }
    }
    Ok(())
}
