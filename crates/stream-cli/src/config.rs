//! Configuration loading and parsing.
//!
//! The TOML file mirrors the library config types; command-line flags are
//! applied on top.

use std::path::Path;

use anyhow::{Context, Result};
use audio_stream::{CompressionConfig, PlayerConfig, StreamConfig};
use serde::Deserialize;

use crate::cli::Args;

/// Top-level CLI configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub stream: StreamConfig,
    pub player: PlayerConfig,
}

impl CliConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg =
            toml::from_str::<CliConfig>(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }

    /// Load the file named by `--config` (or defaults) and apply flag overrides.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut cfg = match args.config.as_deref() {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(ms) = args.chunk_ms {
            cfg.stream.chunk_length_ms = ms;
        }
        if let Some(ms) = args.overlap_ms {
            cfg.stream.overlap_ms = ms;
        }
        if args.compress && cfg.stream.compression.is_none() {
            cfg.stream.compression = Some(CompressionConfig::default());
        }
        Ok(cfg)
    }
}
