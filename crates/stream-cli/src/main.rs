//! `stream-cli`: chunk, encode and play audio files through the stream pipeline.
//!
//! Subcommands:
//! - `inspect`: decode a file and print its chunk table (or the engine handshake as JSON)
//! - `export`: encode every chunk into a directory
//! - `playthrough`: play a file against an in-process simulated engine, logging
//!   state and position reports

mod cli;
mod commands;
mod config;
mod sim_engine;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,stream_cli=info,audio_stream=info")
        }))
        .init();

    let cfg = config::CliConfig::resolve(&args)?;

    match &args.cmd {
        cli::Command::Inspect { path, json } => {
            let stream = commands::open_stream(path, &cfg, args.codec)?;
            commands::inspect(&stream, &cfg.player, *json)
        }
        cli::Command::Export { path, out } => {
            let stream = commands::open_stream(path, &cfg, args.codec)?;
            commands::export(&stream, out)
        }
        cli::Command::Playthrough {
            path,
            from_ms,
            realtime,
        } => {
            let stream = commands::open_stream(path, &cfg, args.codec)?;
            commands::playthrough(stream, cfg.player.clone(), *from_ms, *realtime)
        }
    }
}
