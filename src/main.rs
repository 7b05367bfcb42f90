//! scope-peaks - waveform overview of an audio file
//!
//! Decodes an audio file, reduces it to peaks and prints them one per line,
//! or as a JSON report with `--json`.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use scope_peaks::audio::{spawn_decoder, FileError, PcmFormat, PcmReader};
use scope_peaks::overview::read_chunk;
use scope_peaks::settings::ToolSettings;
use scope_peaks::{
    build_overview, compare_strategies, Alignment, DecodeStrategy, OverviewError, OverviewOptions,
};

#[derive(Parser, Clone, Debug)]
#[command(name = "scope-peaks", about = "Extract waveform peaks from an audio file")]
struct Arguments {
    /// Audio file to analyse
    file: PathBuf,
    #[arg(short, long, help = "Samples folded into one peak (default: 4410)")]
    samples_per_peak: Option<usize>,
    #[arg(long, help = "Seconds of audio read per chunk (default: 4)")]
    seconds_per_read: Option<u32>,
    #[arg(long, help = "Decoding strategy: bit_manipulation, from_le_bytes or bulk_cast")]
    strategy: Option<DecodeStrategy>,
    #[arg(long, help = "Window alignment across chunks: per_chunk or continuous")]
    alignment: Option<Alignment>,
    #[arg(long, default_value_t = false, help = "Decode on a background thread")]
    threaded: bool,
    #[arg(long, default_value_t = false, help = "Check that every strategy returns the same peaks for the first chunk")]
    compare: bool,
    #[arg(long, default_value_t = false, help = "Print a JSON report instead of one peak per line")]
    json: bool,
    #[arg(long, default_value_t = false, help = "Store the effective settings as the new defaults")]
    save_settings: bool,
    #[arg(long, default_value_t = false, help = "Ignore saved settings - use command line arguments/default")]
    ignore_settings: bool,
}

#[derive(Serialize)]
struct PeakReport<'a> {
    file: String,
    sample_rate: u32,
    channels: u32,
    samples_per_peak: usize,
    strategy: DecodeStrategy,
    alignment: Alignment,
    peaks: &'a [i16],
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Overview(#[from] OverviewError),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("Failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decoder thread panicked")]
    DecoderPanicked,

    #[error("Strategy {0} disagrees with bit_manipulation")]
    StrategyMismatch(DecodeStrategy),
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting scope-peaks");

    let args = Arguments::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Saved settings (unless ignored) with command line overrides applied
fn effective_settings(args: &Arguments) -> ToolSettings {
    let settings = if args.ignore_settings {
        ToolSettings::default()
    } else {
        ToolSettings::load()
    };
    apply_overrides(args, settings)
}

fn apply_overrides(args: &Arguments, mut settings: ToolSettings) -> ToolSettings {
    if let Some(samples_per_peak) = args.samples_per_peak {
        settings.samples_per_peak = samples_per_peak;
    }
    if let Some(seconds) = args.seconds_per_read {
        settings.seconds_per_read = seconds;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if let Some(alignment) = args.alignment {
        settings.alignment = alignment;
    }
    if args.threaded {
        settings.threaded_decode = true;
    }
    settings
}

fn run(args: Arguments) -> Result<(), AppError> {
    let settings = effective_settings(&args);
    if args.save_settings {
        settings.save();
    }

    let reader = PcmReader::open(&args.file)?;
    let format = reader.format();
    let options = OverviewOptions {
        chunk_bytes: format.average_bytes_per_second() * settings.seconds_per_read as usize,
        samples_per_peak: settings.samples_per_peak,
        strategy: settings.strategy,
        alignment: settings.alignment,
    };

    if args.compare {
        return compare_first_chunk(reader, &options);
    }

    let overview = if settings.threaded_decode {
        let capacity = format.average_bytes_per_second() * settings.ring_seconds.max(1) as usize;
        let (consumer, handle) = spawn_decoder(reader, capacity);
        let overview = build_overview(consumer, &options);
        let decoded = handle.join().map_err(|_| AppError::DecoderPanicked)?;
        // A decode failure explains a short overview better than the overview result
        decoded?;
        overview?
    } else {
        build_overview(reader, &options)?
    };

    write_peaks(&args, format, &settings, &overview.peaks)
}

/// Decode one chunk and run every strategy over it
fn compare_first_chunk(mut reader: PcmReader, options: &OverviewOptions) -> Result<(), AppError> {
    let mut chunk = vec![0u8; options.chunk_bytes];
    let read = read_chunk(&mut reader, &mut chunk).map_err(OverviewError::from)?;

    match compare_strategies(&chunk, read, options.samples_per_peak)
        .map_err(OverviewError::from)?
    {
        Some(strategy) => Err(AppError::StrategyMismatch(strategy)),
        None => {
            println!("All strategies agree on {} bytes", read);
            Ok(())
        }
    }
}

fn write_peaks(
    args: &Arguments,
    format: PcmFormat,
    settings: &ToolSettings,
    peaks: &[i16],
) -> Result<(), AppError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if args.json {
        let report = PeakReport {
            file: args.file.display().to_string(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            samples_per_peak: settings.samples_per_peak,
            strategy: settings.strategy,
            alignment: settings.alignment,
            peaks,
        };
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        for peak in peaks {
            writeln!(out, "{}", peak)?;
        }
    }
    out.flush()?;
    Ok(())
}
