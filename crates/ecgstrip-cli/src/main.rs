use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ecgstrip_lib::{
    config::AnalysisConfig,
    detectors::ecg::fit_peak,
    filter::running_mean,
    io::{csv as csv_io, output},
    pipeline::analyze_rows,
    signal::{clean_rows, RawRow, StripSeries},
};
use log::info;
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "ecgstrip",
    version,
    about = "ecgstrip: heart rate and beat times from single-lead ECG strips"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the strip comes from and how to tune the analysis.
#[derive(Args)]
struct StripArgs {
    /// Headerless `time,voltage` CSV; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,
    /// TOML file with analysis parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Running-mean window in seconds (overrides the config file)
    #[arg(long)]
    window_size_s: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a strip and print the metrics record as JSON
    Analyze {
        #[command(flatten)]
        strip: StripArgs,
        /// Folder the `<input stem>.json` result is written to
        #[arg(long, default_value = output::DEFAULT_OUTPUT_DIR)]
        out_dir: PathBuf,
        /// Print only, do not write the result file
        #[arg(long)]
        no_save: bool,
    },
    /// Print the peaks chosen by the offset search
    FindPeaks {
        #[command(flatten)]
        strip: StripArgs,
    },
    /// Print the running-mean baseline of the cleaned voltage
    RunningMean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 0.75)]
        window_size_s: f64,
    },
}

#[derive(Serialize)]
struct PeakReport {
    offset_multiplier: f64,
    peaks: Vec<usize>,
    times: Vec<f64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            strip,
            out_dir,
            no_save,
        } => cmd_analyze(&strip, &out_dir, no_save)?,
        Commands::FindPeaks { strip } => cmd_find_peaks(&strip)?,
        Commands::RunningMean {
            input,
            window_size_s,
        } => cmd_running_mean(input.as_deref(), window_size_s)?,
    }
    Ok(())
}

fn read_rows(input: Option<&Path>) -> Result<Vec<RawRow>> {
    match input {
        Some(path) => csv_io::read_rows(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            csv_io::parse_rows(&buf)
        }
    }
}

fn load_config(strip: &StripArgs) -> Result<AnalysisConfig> {
    let mut cfg = match &strip.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(window) = strip.window_size_s {
        cfg.window_size_s = window;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn load_series(input: Option<&Path>, cfg: &AnalysisConfig) -> Result<StripSeries> {
    let rows = read_rows(input)?;
    let cleaned = clean_rows(rows, cfg)?;
    Ok(StripSeries::from_samples(&cleaned.samples)?)
}

fn input_label(input: Option<&Path>) -> String {
    input.map_or_else(|| "stdin".into(), |p| p.display().to_string())
}

fn cmd_analyze(strip: &StripArgs, out_dir: &Path, no_save: bool) -> Result<()> {
    let cfg = load_config(strip)?;
    let input = strip.input.as_deref();
    let rows = read_rows(input)?;
    let analysis = analyze_rows(rows, &cfg)
        .with_context(|| format!("analysis of {} failed", input_label(input)))?;
    if !analysis.record.has_beats() {
        info!("no discernible heartbeat in {}", input_label(input));
    }
    if !no_save {
        let name = input.unwrap_or_else(|| Path::new("stdin"));
        output::write_metrics(name, &analysis.record, out_dir)?;
    }
    println!("{}", serde_json::to_string(&analysis.record)?);
    Ok(())
}

fn cmd_find_peaks(strip: &StripArgs) -> Result<()> {
    let cfg = load_config(strip)?;
    let series = load_series(strip.input.as_deref(), &cfg)?;
    let fitted = fit_peak(&series.voltage, series.duration, &cfg)?;
    let report = PeakReport {
        offset_multiplier: fitted.offset_multiplier,
        times: fitted.peaks.iter().map(|&p| series.time[p]).collect(),
        peaks: fitted.peaks,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_running_mean(input: Option<&Path>, window_size_s: f64) -> Result<()> {
    let series = load_series(input, &AnalysisConfig::default())?;
    let curve = running_mean(&series.voltage, series.duration, window_size_s)?;
    println!("{}", serde_json::to_string(&curve)?);
    Ok(())
}
