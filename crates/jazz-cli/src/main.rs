//! jazz: apply sample effects to WAV files and run rhythm definitions

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config::Presets;
use jazz_core::{EventList, Meter, RhythmGenerator, RhythmSet, TokenReader};
use jazz_services::graph::{sig_chorus, sig_reverb, sig_wah, sig_wavsynth};
use jazz_services::{SampleBuffer, SampleSet, WahFilter};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jazz")]
#[command(about = "Sample effects and rhythm generation", long_about = None)]
struct Cli {
    /// TOML file with [sample_set], [reverb], [chorus], [wah] and [synth] tables
    #[arg(short, long, global = true)]
    preset: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Sample range in frames; defaults to the whole file
#[derive(clap::Args)]
struct Range {
    /// First frame
    #[arg(long, default_value = "0")]
    from: usize,

    /// End frame (exclusive)
    #[arg(long)]
    to: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add room reverb
    Reverb {
        input: PathBuf,
        output: PathBuf,
        /// Decay time in seconds (overrides the preset)
        #[arg(short = 't', long)]
        time: Option<f64>,
        #[command(flatten)]
        range: Range,
    },

    /// Add chorus
    Chorus {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        range: Range,
    },

    /// Sweep a filter across the range
    Wah {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, value_enum)]
        filter: Option<FilterArg>,
        #[command(flatten)]
        range: Range,
    },

    /// Shift pitch by semitones, changing the length
    Transpose {
        input: PathBuf,
        output: PathBuf,
        #[arg(allow_negative_numbers = true)]
        semitones: f64,
    },

    /// Render the wavetable synth preset
    Synth {
        output: PathBuf,
        /// Duration in seconds (overrides the preset)
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Run a rhythm set file and print the generated events
    Rhythm {
        file: PathBuf,
        #[arg(short, long, default_value = "4")]
        bars: usize,
        /// Ticks per quarter
        #[arg(long, default_value = "120")]
        ticks: i64,
        #[arg(long, default_value = "4")]
        counts_per_bar: i64,
        /// Random seed; omit for a fresh pattern every run
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    Lowpass,
    Highpass,
    Bandpass,
    Bandstop,
}

impl From<FilterArg> for WahFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Lowpass => Self::Lowpass,
            FilterArg::Highpass => Self::Highpass,
            FilterArg::Bandpass => Self::Bandpass,
            FilterArg::Bandstop => Self::Bandstop,
        }
    }
}

fn load_sample(set: &SampleSet, path: &Path) -> anyhow::Result<SampleBuffer> {
    let mut buf = set.new_buffer();
    buf.set_file_name(path);
    buf.load(true)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(buf)
}

fn save_sample(buf: &mut SampleBuffer, path: &Path) -> anyhow::Result<()> {
    buf.save_wav(path)
        .with_context(|| format!("saving {}", path.display()))
}

/// Range in samples for a frame range
fn sample_range(buf: &SampleBuffer, range: &Range) -> (usize, usize) {
    let ch = buf.channels();
    let to = range.to.map_or(buf.len(), |t| t * ch);
    (range.from * ch, to)
}

fn run_rhythm(file: &Path, bars: usize, meter: Meter, seed: Option<u64>) -> anyhow::Result<()> {
    let text = std::fs::File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let mut reader = TokenReader::from_reader(text)?;
    let set = RhythmSet::read_from(&mut reader).with_context(|| format!("reading {}", file.display()))?;
    info!(instruments = set.instruments.len(), bars, "Running rhythm set");

    let mut rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
    let mut generator = RhythmGenerator::new(set);
    let mut bar = meter;
    let mut events = EventList::new();
    generator.gen_init(bar.clock, &mut rng);
    generator.generate_bars(&mut events, &mut bar, bars, &mut rng);

    for n in &events.notes {
        println!("note {:>8} key {:>3} vel {:>3} len {}", n.clock, n.key, n.velocity, n.length);
    }
    for c in &events.controls {
        println!("ctrl {:>8} cc {:>3} val {:>3}", c.clock, c.controller, c.value);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jazz=info,jazz_services=info,jazz_core=warn")),
        )
        .init();

    let cli = Cli::parse();
    let presets = Presets::load(cli.preset.as_deref())?;
    let set = presets.sample_set;

    match cli.command {
        Commands::Reverb { input, output, time, range } => {
            let mut buf = load_sample(&set, &input)?;
            let mut params = presets.reverb;
            if let Some(time) = time {
                anyhow::ensure!(time > 0.0, "reverb time must be positive");
                params.reverb_time = time;
            }
            let (from, to) = sample_range(&buf, &range);
            sig_reverb(&mut buf, from, to, &params);
            save_sample(&mut buf, &output)?;
        }
        Commands::Chorus { input, output, range } => {
            let mut buf = load_sample(&set, &input)?;
            let (from, to) = sample_range(&buf, &range);
            sig_chorus(&mut buf, from, to, &presets.chorus);
            save_sample(&mut buf, &output)?;
        }
        Commands::Wah { input, output, filter, range } => {
            let mut buf = load_sample(&set, &input)?;
            let mut params = presets.wah;
            if let Some(filter) = filter {
                params.filter = filter.into();
            }
            let (from, to) = sample_range(&buf, &range);
            sig_wah(&mut buf, from, to, &params);
            save_sample(&mut buf, &output)?;
        }
        Commands::Transpose { input, output, semitones } => {
            let mut buf = load_sample(&set, &input)?;
            buf.transpose_semis(semitones);
            info!(semitones, frames = buf.frames(), "Transposed");
            save_sample(&mut buf, &output)?;
        }
        Commands::Synth { output, duration } => {
            let mut params = presets.synth;
            if let Some(duration) = duration {
                params.duration = duration;
            }
            let mut buf = set.new_buffer();
            sig_wavsynth(&mut buf, &params);
            save_sample(&mut buf, &output)?;
        }
        Commands::Rhythm { file, bars, ticks, counts_per_bar, seed } => {
            run_rhythm(&file, bars, Meter::new(0, ticks, counts_per_bar), seed)?;
        }
    }
    Ok(())
}
