//! strata CLI - merge a configuration hierarchy from the command line
//!
//! Usage:
//!   strata process configs/env=prod/region=us-east-1 --root configs
//!   strata check configs/env=prod --root configs
//!   strata generate configs --output-dir out --levels env region --leaf-directories region=

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use strata_core::{
    Error, ErrorKind, GenerateOptions, MergePolicy, OutputFilter, ProcessOptions, Processor,
    Strategy, Value,
};
use tracing_subscriber::EnvFilter;

/// strata - hierarchical configuration with interpolation
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every layer down to a leaf and print the result
    Process {
        /// Leaf directory or file inside the hierarchy
        path: PathBuf,

        /// Hierarchy root (defaults to the current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output_file: Option<PathBuf>,

        /// Keep only these top-level keys
        #[arg(long)]
        filter: Vec<String>,

        /// Drop these top-level keys
        #[arg(long)]
        exclude: Vec<String>,

        /// Wrap the output under this key
        #[arg(long, conflicts_with = "remove_enclosing_key")]
        enclosing_key: Option<String>,

        /// Output only the value under this key
        #[arg(long)]
        remove_enclosing_key: Option<String>,

        /// Keep unresolved placeholders instead of failing
        #[arg(long)]
        skip_interpolation_validation: bool,

        /// Do not resolve placeholders at all
        #[arg(long)]
        skip_interpolation_resolving: bool,

        /// Leave provider calls (secrets) unresolved
        #[arg(long)]
        skip_secrets: bool,

        /// How sequences from deeper layers combine with shallower ones
        #[arg(
            long,
            value_parser = ["append", "override", "prepend", "append_unique", "merge_by_id"]
        )]
        list_merge_strategy: Option<String>,
    },

    /// Check a hierarchy for load, merge and placeholder syntax errors
    Check {
        /// Leaf directory or file inside the hierarchy
        path: PathBuf,

        /// Hierarchy root (defaults to the current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Write one merged document per leaf directory
    Generate {
        /// Hierarchy root to scan for leaf directories
        src: PathBuf,

        /// Directory receiving the generated documents
        #[arg(long)]
        output_dir: PathBuf,

        /// Keys whose values name the output directories and file
        #[arg(long, num_args = 1.., required = true)]
        levels: Vec<String>,

        /// Directory name prefixes marking a leaf (e.g. cluster=)
        #[arg(long, num_args = 1.., required = true)]
        leaf_directories: Vec<String>,

        /// Key holding the filter rules applied to every document
        #[arg(long)]
        filter_rules_key: Option<String>,

        /// Leave provider calls (secrets) unresolved
        #[arg(long)]
        skip_secrets: bool,
    },
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            path,
            root,
            format,
            output_file,
            filter,
            exclude,
            enclosing_key,
            remove_enclosing_key,
            skip_interpolation_validation,
            skip_interpolation_resolving,
            skip_secrets,
            list_merge_strategy,
        } => {
            let policy = match sequence_policy(list_merge_strategy.as_deref()) {
                Ok(policy) => policy,
                Err(e) => return report(&e),
            };
            let mut options = ProcessOptions::default()
                .with_policy(policy)
                .with_skip_validation(skip_interpolation_validation)
                .with_skip_resolving(skip_interpolation_resolving)
                .with_skip_providers(skip_secrets)
                .with_filter(
                    OutputFilter::default()
                        .with_include(filter)
                        .with_exclude(exclude),
                );
            options.enclosing_key = enclosing_key;
            options.remove_enclosing_key = remove_enclosing_key;

            cmd_process(&root, &path, options, format, output_file)
        }

        Commands::Check { path, root } => cmd_check(&root, &path),

        Commands::Generate {
            src,
            output_dir,
            levels,
            leaf_directories,
            filter_rules_key,
            skip_secrets,
        } => {
            let mut options = GenerateOptions::new(output_dir)
                .with_levels(levels)
                .with_leaf_prefixes(leaf_directories)
                .with_process_options(ProcessOptions::default().with_skip_providers(skip_secrets));
            options.filter_rules_key = filter_rules_key;

            cmd_generate(&src, &options)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    // Also installs the bridge for `log` records emitted by strata-core
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("{}: {}", "Logging disabled".yellow(), e);
    }
}

fn sequence_policy(name: Option<&str>) -> Result<MergePolicy, Error> {
    match name {
        None => Ok(MergePolicy::default()),
        Some(name) => {
            let strategy: Strategy = name.parse()?;
            Ok(MergePolicy::default().with_sequence_strategy(strategy))
        }
    }
}

/// Leaf paths on the command line are relative to the working directory
fn leaf_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn exit_code(err: &Error) -> ExitCode {
    match err.kind {
        ErrorKind::Io | ErrorKind::Path => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

fn report(err: &Error) -> ExitCode {
    eprintln!("{} {}", "✗".red(), err);
    exit_code(err)
}

fn render(value: &Value, format: OutputFormat) -> Result<String, Error> {
    match format {
        OutputFormat::Yaml => value.to_yaml_string(),
        OutputFormat::Json => value.to_json_string().map(|mut s| {
            s.push('\n');
            s
        }),
    }
}

fn cmd_process(
    root: &Path,
    path: &Path,
    options: ProcessOptions,
    format: OutputFormat,
    output_file: Option<PathBuf>,
) -> ExitCode {
    let processor = Processor::new(options);
    let content = match processor
        .process(root, &leaf_path(path))
        .and_then(|value| render(&value, format))
    {
        Ok(content) => content,
        Err(e) => return report(&e),
    };

    match output_file {
        Some(output_path) => {
            if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("{}: {}", "Error creating directory".red(), e);
                    return ExitCode::from(2);
                }
            }
            if let Err(e) = std::fs::write(&output_path, &content) {
                eprintln!("{}: {}", "Error writing file".red(), e);
                return ExitCode::from(2);
            }
            eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
        }
        None => print!("{}", content),
    }
    ExitCode::SUCCESS
}

fn cmd_check(root: &Path, path: &Path) -> ExitCode {
    let processor = Processor::new(ProcessOptions::default().with_skip_resolving(true));
    match processor.process(root, &leaf_path(path)) {
        Ok(_) => {
            println!("{} {}: valid", "✓".green(), path.display());
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn cmd_generate(src: &Path, options: &GenerateOptions) -> ExitCode {
    match strata_core::generate(src, options) {
        Ok(written) => {
            for path in &written {
                eprintln!("{} Wrote {}", "✓".green(), path.display());
            }
            println!("Generated {} document(s)", written.len());
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}
