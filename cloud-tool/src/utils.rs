use crate::{
    opts::AggregateArgs,
    types::{FileFormat, SourceFormat},
};
use chrono::Local;
use cloud_format::{AggregatorConfig, BufferCapacity};
use eyre::{Result, WrapErr};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn guess_file_format<P>(file: P) -> Option<FileFormat>
where
    P: AsRef<Path>,
{
    let file = file.as_ref();
    let file_name = file.file_name()?.to_str()?;

    let format = if file_name.ends_with(".ascii.pcd") {
        FileFormat::PcdAscii
    } else if file_name.ends_with(".pcd") {
        FileFormat::Pcd
    } else if file_name.ends_with(".ply") {
        FileFormat::Ply
    } else if file_name.ends_with(".bin") {
        FileFormat::RawBin
    } else {
        return None;
    };

    Some(format)
}

pub fn guess_source_format<P>(input: P) -> SourceFormat
where
    P: AsRef<Path>,
{
    if input.as_ref().is_dir() {
        SourceFormat::Directory
    } else {
        SourceFormat::Stream
    }
}

/// `lidar_<local time>.<ext>` under `dir`.
pub fn default_output_path<P>(dir: P, format: FileFormat) -> PathBuf
where
    P: AsRef<Path>,
{
    let ext = cloud_format::ExportFormat::from(format).extension();
    let name = format!("lidar_{}.{ext}", Local::now().format("%Y%m%d%H%M%S"));
    dir.as_ref().join(name)
}

pub fn load_aggregator_config(args: &AggregateArgs) -> Result<AggregatorConfig> {
    let AggregateArgs {
        ref config,
        scale_factor,
        capacity,
        temporal,
        z_axis,
    } = *args;

    let mut config = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("unable to read config file '{}'", path.display()))?;
            serde_json::from_str(&text)
                .wrap_err_with(|| format!("invalid config file '{}'", path.display()))?
        }
        None => AggregatorConfig::default(),
    };

    if let Some(scale_factor) = scale_factor {
        config.scale_factor = scale_factor;
    }
    if let Some(capacity) = capacity {
        config.buffer_capacity = BufferCapacity::Bounded(capacity);
    }
    if temporal {
        config.temporal_mode = true;
    }
    if let Some(z_axis) = z_axis {
        config.z_axis = Some(z_axis.into());
    }

    config.validate()?;
    Ok(config)
}
