use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use gwemu_core::Settings;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, warn};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gwemu",
    version,
    about = "Generic Workload Emulator",
    long_about = "Generic Workload Emulator: a tool for turning a footprint into an emulated workload"
)]
struct Cli {
    /// Path to input file
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(short = 'v', long = "verbosity", default_value = "error", value_parser = parse_level)]
    verbosity: LevelFilter,

    /// Extra suffix for the label prefix (gwEmu-<suffix>)
    #[arg(short = 'p', long = "prefix-suffix")]
    prefix_suffix: Option<String>,
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    match s.to_ascii_lowercase().as_str() {
        "fatal" | "panic" => Ok(LevelFilter::ERROR),
        "disabled" => Ok(LevelFilter::OFF),
        other => LevelFilter::from_str(other).map_err(|_| format!("unknown log level '{}'", s)),
    }
}

fn init_tracing(level: LevelFilter) {
    let default = || tracing_subscriber::EnvFilter::new(level.to_string());
    let filter = match std::env::var("GWEMU_LOG") {
        Ok(env) => tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| default()),
        Err(_) => default(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Install a Prometheus recorder when `GWEMU_METRICS_FILE` is set. The
/// rendered counters are written to that file once the run is over, in the
/// node-exporter textfile format.
fn init_metrics() -> Option<(PrometheusHandle, PathBuf)> {
    let path = PathBuf::from(std::env::var_os("GWEMU_METRICS_FILE")?);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some((handle, path)),
        Err(e) => {
            warn!(error = %e, "failed to install metrics recorder");
            None
        }
    }
}

fn write_metrics(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    std::fs::write(path, handle.render()).with_context(|| format!("writing metrics to {}", path.display()))
}

fn input_path(file: Option<&Path>) -> Result<&Path> {
    let path = file.ok_or_else(|| anyhow!("no file path provided"))?;
    let meta = std::fs::metadata(path).context("failed to stat file")?;
    if meta.is_dir() {
        bail!("path to dir not file");
    }
    Ok(path)
}

fn settings_for(cli: &Cli) -> Settings {
    let settings = Settings::from_env();
    match cli.prefix_suffix.as_deref() {
        Some(suffix) if !suffix.is_empty() => settings.with_prefix_suffix(suffix),
        _ => settings,
    }
}

/// Transform the input file and print every resulting resource to `out`.
///
/// Output is written before a combined transform error is returned.
fn transform_input<W: Write>(path: &Path, settings: &Settings, out: W) -> Result<()> {
    let resources = gwemu_manifest::load_manifest_file(path)?;
    debug!(count = resources.len(), "found resources");
    let (transformed, err) = gwemu_transform::transform(resources, settings).into_result();
    debug!(count = transformed.len(), "received transformed resources");
    gwemu_manifest::print_resources(out, &transformed)?;
    if let Some(e) = err {
        return Err(anyhow::Error::new(e).context("failed to transform resources"));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };
    init_tracing(cli.verbosity);
    let metrics = init_metrics();

    let path = match input_path(cli.file.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let settings = settings_for(&cli);
    let result = transform_input(path, &settings, std::io::stdout().lock());
    if let Some((handle, file)) = metrics {
        if let Err(e) = write_metrics(&handle, &file) {
            warn!(error = %format!("{:#}", e), "failed to write metrics");
        }
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
