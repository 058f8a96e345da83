use clap::{Args, Parser};
use std::{num::NonZeroUsize, path::PathBuf};

use crate::types::{FileFormat, SourceFormat, ZAxisArg};

#[derive(Debug, Clone, Parser)]
pub enum Opts {
    Info(Info),
    Dump(Dump),
    Convert(Convert),
    Listen(Listen),
}

/// Print the header and field table of a recorded message.
#[derive(Debug, Clone, Parser)]
pub struct Info {
    pub file: PathBuf,
}

/// Print decoded points of recorded messages, one JSON object per line.
#[derive(Debug, Clone, Parser)]
pub struct Dump {
    #[clap(short, long)]
    pub from: Option<SourceFormat>,

    pub input: PathBuf,

    /// Only print every n-th message.
    #[clap(long, default_value = "1")]
    pub every_n: NonZeroUsize,

    /// Replace z with the nanoseconds elapsed between each message and now.
    #[clap(long)]
    pub temporal: bool,
}

/// Reconstruct one point cloud file from recorded messages.
#[derive(Debug, Clone, Parser)]
pub struct Convert {
    #[clap(short, long)]
    pub from: Option<SourceFormat>,

    #[clap(short, long)]
    pub to: Option<FileFormat>,

    #[clap(short, long)]
    pub input: PathBuf,

    /// Defaults to lidar_<local time>.<ext> in the working directory.
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub aggregate: AggregateArgs,
}

/// Accept one client streaming framed messages and export the session
/// when it disconnects or `--max-frames` is reached.
#[derive(Debug, Clone, Parser)]
pub struct Listen {
    #[clap(long, default_value = "0.0.0.0:5555")]
    pub bind: String,

    #[clap(long)]
    pub output_dir: PathBuf,

    #[clap(short, long, default_value = "ply")]
    pub to: FileFormat,

    /// Also record every received message under the output directory.
    #[clap(long)]
    pub record: bool,

    /// Stop after this many messages.
    #[clap(long)]
    pub max_frames: Option<u64>,

    /// Seconds between progress reports.
    #[clap(long, default_value = "1.0")]
    pub status_interval: f64,

    #[clap(flatten)]
    pub aggregate: AggregateArgs,
}

/// Aggregation settings. Flags override values from `--config`.
#[derive(Debug, Clone, Args)]
pub struct AggregateArgs {
    /// JSON file with scale_factor, buffer_capacity, temporal_mode and z_axis.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Pseudo-coordinate step between consecutive messages.
    #[clap(long)]
    pub scale_factor: Option<f32>,

    /// Keep only the most recent N messages.
    #[clap(long)]
    pub capacity: Option<NonZeroUsize>,

    #[clap(long)]
    pub temporal: bool,

    #[clap(long)]
    pub z_axis: Option<ZAxisArg>,
}
