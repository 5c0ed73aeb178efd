use std::path::PathBuf;

use clap::{Parser, Subcommand};
use swara_gesture_core::{
    AppConfig, Finger, HandLandmarks, Handedness, LandmarkFrame, LogBackend, LogSink,
    ScaleTable, ScriptedTracker, Session, Swara, VoicePolicy,
};
use tracing_subscriber::EnvFilter;

fn main() -> swara_gesture_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let table = match &cli.tables {
        Some(path) => ScaleTable::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ScaleTable::builtin(),
    };

    match cli.command {
        Commands::Play(args) => run_play(args, table),
        Commands::Ragas => {
            list_ragas(&table);
            Ok(())
        }
        Commands::Talas => {
            list_talas(&table);
            Ok(())
        }
    }
}

fn run_play(args: PlayArgs, table: ScaleTable) -> swara_gesture_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(raga) = args.raga {
        config.session.raga = raga;
    }
    if let Some(tala) = args.tala {
        config.session.tala = tala;
    }
    if let Some(octave) = args.octave {
        config.session.octave = octave.try_into()?;
    }
    if args.drone {
        config.session.drone_enabled = true;
    }
    if args.shared_voice {
        config.voices = VoicePolicy::Shared;
    }

    let tracker = match &args.script {
        Some(path) => {
            tracing::info!(?path, "replaying landmark script");
            ScriptedTracker::load(path)?
        }
        None => {
            tracing::info!("no script given, playing the built-in scale demo");
            ScriptedTracker::new(demo_frames())
        }
    };

    let mut session = Session::start(tracker, LogBackend::new(), &config, table)?;
    let mut sink = LogSink::new();
    let summary = session.run(&mut sink)?;
    session.end();

    tracing::info!(
        ticks = summary.ticks,
        frames = summary.frames,
        notes = summary.notes,
        score = summary.score,
        "performance finished"
    );
    Ok(())
}

/// Ascending scale: each finger pinches for a few frames, then lets go.
fn demo_frames() -> Vec<Option<LandmarkFrame>> {
    let layout = [
        (Handedness::Left, Finger::Pinky),
        (Handedness::Left, Finger::Ring),
        (Handedness::Left, Finger::Middle),
        (Handedness::Left, Finger::Index),
        (Handedness::Right, Finger::Index),
        (Handedness::Right, Finger::Middle),
        (Handedness::Right, Finger::Ring),
    ];
    let open = || {
        LandmarkFrame::new(vec![
            HandLandmarks::open(Handedness::Left),
            HandLandmarks::open(Handedness::Right),
        ])
    };

    let mut frames = Vec::new();
    for (hand, finger) in layout {
        let pressed = LandmarkFrame::new(vec![
            HandLandmarks::open(hand).pinching(finger),
            HandLandmarks::open(match hand {
                Handedness::Left => Handedness::Right,
                Handedness::Right => Handedness::Left,
            }),
        ]);
        frames.extend(std::iter::repeat(Some(pressed)).take(4));
        frames.push(None);
        frames.extend(std::iter::repeat_with(|| Some(open())).take(4));
    }
    frames
}

fn list_ragas(table: &ScaleTable) {
    for raga in table.ragas() {
        let swaras: Vec<&str> = raga.variants().map(|variant| variant.as_str()).collect();
        let missing: Vec<&str> = Swara::ALL
            .into_iter()
            .filter(|degree| !raga.contains_degree(*degree))
            .map(Swara::as_str)
            .collect();
        println!("{:<18} {:<28} {}", raga.key, swaras.join(" "), raga.description);
        if !missing.is_empty() {
            println!("{:<18} (omits {})", "", missing.join(", "));
        }
    }
}

fn list_talas(table: &ScaleTable) {
    for tala in table.talas() {
        let pattern: String = tala
            .pattern()
            .iter()
            .map(|strong| if *strong { 'X' } else { '.' })
            .collect();
        println!("{:<10} {:<14} {:>2} beats  {}", tala.key, tala.name, tala.beats(), pattern);
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
#[command(author, version, about = "Play raga-aware notes with hand gestures", long_about = None)]
struct Cli {
    /// Optional JSON file replacing the built-in raga and tala tables.
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a play session against a landmark script.
    Play(PlayArgs),
    /// List the available ragas.
    Ragas,
    /// List the available talas.
    Talas,
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// Landmark script to replay. Defaults to a short scale demo.
    #[arg(short, long)]
    script: Option<PathBuf>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Raga key, e.g. `kalyani`.
    #[arg(short, long)]
    raga: Option<String>,
    /// Tala key, e.g. `rupaka`.
    #[arg(short, long)]
    tala: Option<String>,
    /// Octave register: 3 (mandra), 4 (madhya) or 5 (tara).
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(3..=5))]
    octave: Option<u8>,
    /// Start with the drone running.
    #[arg(long)]
    drone: bool,
    /// Use one voice for every octave instead of per-register timbres.
    #[arg(long)]
    shared_voice: bool,
}
