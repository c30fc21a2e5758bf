use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nvprobe")]
#[command(about = "NVENC codec capability probe", long_about = None)]
pub struct Cli {
    /// Path to the nvenc_codecs helper executable (overrides env var, config
    /// file and install-relative resolution)
    #[arg(long, value_name = "PATH", global = true)]
    pub executable: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the local NVENC device supports a codec
    Check {
        /// Codec name to look for in the probe output (e.g. H264, HEVC, AV1)
        codec: String,
    },

    /// Run the probe and print its raw output (devices and codec list)
    List,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
