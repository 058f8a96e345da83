use crate::{
    io::open_source,
    opts::Convert,
    types::FileFormat,
    utils::{default_output_path, guess_file_format, load_aggregator_config},
};
use cloud_format::{drain_into, Aggregator, ExportFormat};
use eyre::{bail, Result, WrapErr};
use log::info;
use std::{
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

pub fn convert(args: Convert) -> Result<()> {
    let Convert {
        from,
        to,
        input,
        output,
        aggregate,
    } = args;

    let (output, format) = resolve_output(output, to)?;
    let config = load_aggregator_config(&aggregate)?;

    let mut source = open_source(&input, from)?;
    let aggregator = Aggregator::new(config);
    let stats = drain_into(&mut *source, &aggregator, &AtomicBool::new(false));

    if stats.appended == 0 {
        info!("no message of '{}' could be decoded", input.display());
    }

    let num_points = aggregator
        .export(&output, format.into())
        .wrap_err_with(|| format!("unable to write '{}'", output.display()))?;
    info!("{} messages, {num_points} points", aggregator.len());
    println!("{}", output.display());

    Ok(())
}

/// Output path and format, each filled in from the other when missing.
fn resolve_output(
    output: Option<PathBuf>,
    to: Option<FileFormat>,
) -> Result<(PathBuf, FileFormat)> {
    let resolved = match (output, to) {
        (Some(path), Some(format)) => {
            if let Some(guessed) = guess_file_format(&path) {
                if guessed != format {
                    bail!(
                        "output file '{}' does not match the requested {} format",
                        path.display(),
                        ExportFormat::from(format).extension()
                    );
                }
            }
            (path, format)
        }
        (Some(path), None) => {
            let format = guess_file_format(&path).unwrap_or(FileFormat::Ply);
            (path, format)
        }
        (None, format) => {
            let format = format.unwrap_or(FileFormat::Ply);
            (default_output_path(Path::new("."), format), format)
        }
    };

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_path() {
        let (path, format) = resolve_output(Some("scan.pcd".into()), None).unwrap();
        assert_eq!(path, PathBuf::from("scan.pcd"));
        assert_eq!(format, FileFormat::Pcd);

        let (_, format) = resolve_output(Some("scan".into()), None).unwrap();
        assert_eq!(format, FileFormat::Ply);
    }

    #[test]
    fn default_output_follows_format() {
        let (path, format) = resolve_output(None, Some(FileFormat::RawBin)).unwrap();
        assert_eq!(format, FileFormat::RawBin);
        assert_eq!(path.extension().unwrap(), "bin");
    }

    #[test]
    fn conflicting_format_is_rejected() {
        assert!(resolve_output(Some("scan.ply".into()), Some(FileFormat::Pcd)).is_err());
        assert!(resolve_output(Some("scan.out".into()), Some(FileFormat::Pcd)).is_ok());
    }
}
