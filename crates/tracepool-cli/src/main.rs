use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracepool_core::{PoolConfig, StringPool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod scan;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "tracepool")]
#[command(about = "Tracepool CLI - string deduplication for trace captures", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Intern every token of a trace file and report pool statistics
    Scan {
        /// Trace file to read
        file: PathBuf,

        /// Override the number of hash buckets
        #[arg(long)]
        buckets: Option<usize>,

        /// Override the per-bucket fallback threshold
        #[arg(long)]
        threshold: Option<u32>,

        /// Directory holding default.toml / local.toml
        #[arg(long, env = "TRACEPOOL_CONFIG_DIR")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Directory holding default.toml / local.toml
        #[arg(long, env = "TRACEPOOL_CONFIG_DIR")]
        config: Option<PathBuf>,
    },

    /// Print the JSON schema of the configuration
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = execute_command(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "tracepool=debug,tracepool_core=debug"
    } else {
        "tracepool=info,tracepool_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Scan {
            file,
            buckets,
            threshold,
            config,
            output,
        } => {
            let mut pool_config = load_config(config.as_deref())?;
            if let Some(buckets) = buckets {
                pool_config = pool_config.with_buckets(*buckets);
            }
            if let Some(threshold) = threshold {
                pool_config = pool_config.with_fallback_threshold(*threshold);
            }

            let mut pool = StringPool::new(pool_config).context("Failed to create string pool")?;
            let report = scan::scan_file(&mut pool, file)?;
            print_output(*output, &serde_json::to_value(report)?)
        }

        Commands::Config { config } => {
            print!("{}", render_config(config.as_deref())?);
            Ok(())
        }

        Commands::Schema => {
            println!("{}", render_schema()?);
            Ok(())
        }
    }
}

/// Effective configuration as TOML.
fn render_config(dir: Option<&Path>) -> Result<String> {
    load_config(dir)?.to_toml_string()
}

fn render_schema() -> Result<String> {
    let schema = schemars::schema_for!(PoolConfig);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Explicit directory first, then `./config` when it exists, then the
/// working directory itself.
fn load_config(dir: Option<&Path>) -> Result<PoolConfig> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let local = PathBuf::from("config");
            if local.is_dir() {
                local
            } else {
                std::env::current_dir().context("Failed to resolve working directory")?
            }
        }
    };
    PoolConfig::load_from_sources(&dir)
        .with_context(|| format!("Failed to load configuration from {:?}", dir))
}

fn print_output(format: OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Pretty => {
            print_pretty(value, 0);
        }
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::Object(_) => {
                        println!("{}{}:", indent, key_colored);
                        print_pretty(val, depth + 1);
                    }
                    serde_json::Value::String(s) => {
                        println!("{}{}: {}", indent, key_colored, s.green());
                    }
                    serde_json::Value::Number(n) => {
                        println!("{}{}: {}", indent, key_colored, n.to_string().yellow());
                    }
                    _ => {
                        println!("{}{}: {}", indent, key_colored, val);
                    }
                }
            }
        }
        _ => println!("{}{}", indent, value),
    }
}
