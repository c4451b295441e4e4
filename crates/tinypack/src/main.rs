use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::debug;
use tinypack::{BundleOrchestrator, config::Config, util::absolutize};

/// Bundle a CommonJS module graph into a single JavaScript file
#[derive(Parser, Debug)]
#[command(name = "tinypack", version, about)]
struct Cli {
    /// Entry module; always receives id 0
    entry: PathBuf,

    /// Output file (stdout if omitted)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Run the configured minifier over the bundle
    #[arg(long)]
    minify: bool,

    /// Configuration file to use instead of ./tinypack.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write a TOML manifest of modules, dependencies and cycles
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Transform workers (0 = one per CPU)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let working_dir = absolutize(Path::new("."));
    let mut config = Config::load(cli.config.as_deref(), &working_dir)
        .context("failed to load configuration")?;
    if cli.minify {
        config.minify = true;
    }
    if let Some(jobs) = cli.jobs {
        config.jobs = jobs;
    }
    debug!("Configuration: {config:?}");

    let orchestrator = BundleOrchestrator::new(config);
    let output = orchestrator
        .bundle(&cli.entry)
        .with_context(|| format!("failed to bundle {}", cli.entry.display()))?;

    match &cli.output {
        Some(path) => orchestrator.write(&output, path)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.code.as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write bundle to stdout")?;
        }
    }

    if let Some(manifest) = &cli.manifest {
        orchestrator.write_manifest(&output, manifest)?;
    }
    Ok(())
}

/// `RUST_LOG` wins over `-v` flags when set
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
