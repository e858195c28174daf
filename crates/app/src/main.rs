use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use spectrum_player_core::{
    AppConfig, Bar, BufferedMedia, CallbackObserver, FramePacer, PlaybackState, PlayerError,
    SoftwareCanvas, SpectrumPlayer,
};
use tracing_subscriber::EnvFilter;

const GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const TONE_SAMPLE_RATE: u32 = 48_000;

fn main() -> spectrum_player_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(&args),
        Commands::Defaults => print_defaults(),
    }
}

fn run_play(args: &PlayArgs) -> spectrum_player_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if args.no_loop {
        config.player.looping = false;
    }
    tracing::info!(src = %args.src, looping = config.player.looping, "starting player");

    let total = seconds_arg("seconds", args.seconds)?;
    let pause_at = args
        .pause_at
        .map(|at| seconds_arg("pause-at", at))
        .transpose()?;
    let media = load_media(&args.src, total)?;
    let canvas = SoftwareCanvas::new(args.width, args.height);
    let mut player = SpectrumPlayer::mount(media, canvas, &config);
    player.subscribe(
        CallbackObserver::new()
            .handle_play(|ctx| tracing::info!(uri = ctx.uri(), "playing"))
            .handle_pause(|ctx| tracing::info!(uri = ctx.uri(), "paused"))
            .handle_ended(|ctx| tracing::info!(uri = ctx.uri(), "finished"))
            .handle_error(|error, ctx| tracing::warn!(%error, uri = ctx.uri(), "playback problem")),
    );

    let label_width = config.player.labels.min_width();
    let mut pacer = FramePacer::with_rate(args.fps);
    let step = pacer.interval();
    let mut elapsed = Duration::ZERO;
    let mut paused_by_user = false;
    let mut last_state = player.state();

    player.toggle();

    while elapsed < total {
        if !args.fast {
            std::thread::sleep(step);
        }
        elapsed += step;

        if let Some(media) = player.media_mut() {
            media.advance(step)?;
        }
        player.pump();

        if pacer.advance(step) && player.run_due_frame() {
            println!(
                "{:<label_width$} |{}|",
                player.label(),
                bar_glyphs(player.visualizer().last_bars())
            );
        }

        if player.state() != last_state {
            last_state = player.state();
            tracing::info!(state = %last_state, label = player.label(), "state changed");
        }

        if !paused_by_user && pause_at.is_some_and(|at| elapsed >= at) {
            paused_by_user = true;
            player.toggle();
        }

        if last_state == PlaybackState::Idle && player.is_collapsed() && !paused_by_user {
            // Ended on its own or failed to start.
            break;
        }
    }

    tracing::info!(
        frames = player.visualizer().frames_painted(),
        seconds = pacer.time_seconds(),
        "shutting down"
    );
    player.dispose();
    Ok(())
}

fn print_defaults() -> spectrum_player_core::Result<()> {
    println!("{}", AppConfig::default().to_json_pretty()?);
    Ok(())
}

fn load_media(src: &str, run_time: Duration) -> spectrum_player_core::Result<BufferedMedia> {
    if let Some(frequency) = src.strip_prefix("tone:") {
        let frequency: f32 = frequency
            .parse()
            .map_err(|_| PlayerError::msg(format!("invalid tone frequency `{frequency}`")))?;
        let length = run_time.max(Duration::from_secs(1));
        return Ok(BufferedMedia::tone(frequency, length, TONE_SAMPLE_RATE));
    }

    let mut reader = hound::WavReader::open(src)
        .map_err(|err| PlayerError::msg(format!("failed to open `{src}`: {err}")))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|err| PlayerError::msg(format!("failed to decode `{src}`: {err}")))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|err| PlayerError::msg(format!("failed to decode `{src}`: {err}")))?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    tracing::debug!(sample_rate = spec.sample_rate, channels, "decoded wav");
    Ok(BufferedMedia::new(src, mono, spec.sample_rate))
}

/// Converts a seconds flag, rejecting negative and non-finite values.
fn seconds_arg(flag: &str, seconds: f32) -> spectrum_player_core::Result<Duration> {
    Duration::try_from_secs_f32(seconds)
        .map_err(|err| PlayerError::msg(format!("invalid --{flag} value `{seconds}`: {err}")))
}

fn bar_glyphs(bars: &[Bar]) -> String {
    bars.iter()
        .map(|bar| {
            let level = (bar.height / 127.0 * 8.0).round().clamp(0.0, 8.0) as usize;
            GLYPHS[level]
        })
        .collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio toggle with a live spectrum bar row", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Press play on a source and print the bars as they animate.
    Play(PlayArgs),
    /// Print the default configuration as JSON.
    Defaults,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// WAV file to play, or `tone:<hz>` for a generated sine.
    src: String,
    /// Stop at the end of the source instead of starting over.
    #[arg(long)]
    no_loop: bool,
    /// How long to run, in seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f32,
    /// Press the control again after this many seconds.
    #[arg(long)]
    pause_at: Option<f32>,
    /// Display refresh rate driving the bars.
    #[arg(long, default_value_t = 60)]
    fps: u32,
    #[arg(long, default_value_t = 1100)]
    width: u32,
    #[arg(long, default_value_t = 300)]
    height: u32,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Do not sleep between frames.
    #[arg(long)]
    fast: bool,
}
