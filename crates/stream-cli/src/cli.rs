use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "stream-cli", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// TOML file with `[stream]` and `[player]` tables
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Nominal chunk length in milliseconds (overrides config)
    #[arg(long, global = true)]
    pub chunk_ms: Option<u64>,

    /// Overlap between neighbouring chunks in milliseconds (overrides config)
    #[arg(long, global = true)]
    pub overlap_ms: Option<u64>,

    /// Run the dynamic range compressor before encoding
    #[arg(long, global = true)]
    pub compress: bool,

    /// Chunk codec
    #[arg(long, value_enum, default_value_t = Codec::Auto, global = true)]
    pub codec: Codec,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a file and print its chunk table
    Inspect {
        /// Path to audio file
        path: PathBuf,

        /// Print the engine handshake as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Encode every chunk of a file into a directory
    Export {
        /// Path to audio file
        path: PathBuf,

        /// Output directory (created if missing)
        #[arg(long)]
        out: PathBuf,
    },

    /// Play a file through an in-process simulated engine
    Playthrough {
        /// Path to audio file
        path: PathBuf,

        /// Start position in milliseconds
        #[arg(long, default_value_t = 0)]
        from_ms: u64,

        /// Sleep between position reports like a real engine would
        #[arg(long)]
        realtime: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    /// Best codec the runtime supports
    Auto,
    /// RIFF/WAVE container
    Wave,
    /// Raw PCM bytes
    Pcm,
}
