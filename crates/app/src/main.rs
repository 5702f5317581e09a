use std::{f32::consts::PI, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use spectral_visualiser_core::{
    AppConfig, AudioStreamHandle, FrameClock, FrequencyAnalyzer, HeadlessSurface, PlaybackState,
    Visualiser,
};
use tracing_subscriber::EnvFilter;

const SAMPLE_RATE: u32 = 48_000;

fn main() -> spectral_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Run(options) => run(&config, options),
        Commands::Config => {
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

fn run(config: &AppConfig, options: RunOptions) -> spectral_visualiser_core::Result<()> {
    tracing::info!(
        frames = options.frames,
        tone_hz = options.tone_hz,
        "starting headless visualiser"
    );

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut clock = FrameClock::new();
    let analyzer = FrequencyAnalyzer::software(config.analyzer.clone());
    let surface = HeadlessSurface::new(options.width, options.height);
    let mut visualiser = Visualiser::mount(config, analyzer, surface, &mut clock, &mut rng);

    let stream = AudioStreamHandle::new(SAMPLE_RATE, config.analyzer.fft_size * 8);
    visualiser.sync_playback(&PlaybackState::playing(stream.clone()), &mut clock);

    let samples_per_frame = (SAMPLE_RATE as f64 * clock.interval()).round() as usize;
    let mut tone = ToneGenerator::new(options.tone_hz, SAMPLE_RATE);
    let mut block = vec![0.0; samples_per_frame];

    for _ in 0..options.frames {
        tone.fill(&mut block);
        stream.signal().push_samples(&block)?;

        let tick = clock.next_frame();
        visualiser.on_frame(&tick, &mut clock);

        if tick.index % 30 == 0 {
            let heights: Vec<u32> = visualiser
                .bars()
                .heights()
                .map(|height| height.round() as u32)
                .collect();
            let state = visualiser.scene_state();
            tracing::info!(
                frame = tick.index,
                average = visualiser.latest_features().map(|f| f.average),
                scale = state.mesh_scale,
                color = %state.particle_color,
                ?heights,
                "frame"
            );
        }

        if options.realtime {
            std::thread::sleep(Duration::from_secs_f64(clock.interval()));
        }
    }

    visualiser.sync_playback(&PlaybackState::idle(), &mut clock);
    visualiser.shutdown(&mut clock);
    tracing::info!(
        drawn = visualiser.scene().surface().frames_drawn(),
        "visualiser finished"
    );
    Ok(())
}

/// Continuous sine source standing in for a decoded track.
struct ToneGenerator {
    phase: f32,
    step: f32,
}

impl ToneGenerator {
    fn new(frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: 2.0 * PI * frequency_hz / sample_rate as f32,
        }
    }

    fn fill(&mut self, out: &mut [f32]) {
        for sample in out {
            *sample = 0.5 * self.phase.sin();
            self.phase = (self.phase + self.step) % (2.0 * PI);
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive spectrum visualiser", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the visualiser headlessly with a synthetic tone.
    Run(RunOptions),
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct RunOptions {
    /// Number of frames to render.
    #[arg(short, long, default_value_t = 120)]
    frames: u64,
    /// Frequency of the synthetic tone.
    #[arg(long, default_value_t = 440.0)]
    tone_hz: f32,
    #[arg(long, default_value_t = 1280, value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,
    #[arg(long, default_value_t = 720, value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,
    /// Seed for particle placement and idle bars.
    #[arg(long)]
    seed: Option<u64>,
    /// Pace frames at the clock interval instead of as fast as possible.
    #[arg(long)]
    realtime: bool,
}
