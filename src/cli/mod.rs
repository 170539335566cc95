//! CLI entry point for avatar-voice.

pub mod realtime;
pub mod speak;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// avatar-voice CLI
#[derive(Parser, Debug)]
#[command(name = "avatar-voice", version, about = "Realtime voice sessions and streaming speech")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hold a realtime voice session; lines typed on stdin are sent as user text
    Realtime(RealtimeArgs),
    /// Synthesize text with streaming playback and report latency metrics
    Speak(SpeakArgs),
}

/// Arguments for the `realtime` subcommand.
#[derive(Parser, Debug)]
pub struct RealtimeArgs {
    /// System prompt (overrides the settings file)
    #[arg(short, long)]
    pub system: Option<String>,

    /// Voice id (overrides the settings file)
    #[arg(short, long)]
    pub voice: Option<String>,

    /// File that receives the raw PCM16 audio of every response
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable server-side voice activity detection
    #[arg(long)]
    pub turn_detection: bool,
}

/// Arguments for the `speak` subcommand.
#[derive(Parser, Debug)]
pub struct SpeakArgs {
    /// Aivis model UUID
    #[arg(short, long)]
    pub model_uuid: String,

    /// Style name (takes precedence over --style-id)
    #[arg(long)]
    pub style_name: Option<String>,

    /// Numeric style id
    #[arg(long, default_value_t = 0)]
    pub style_id: u32,

    /// Speaking rate multiplier
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Where to write the complete MP3 once streaming ends
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Text to speak (positional)
    pub text: String,
}
