use crate::{types::SourceFormat, utils::guess_source_format};
use cloud_format::{wire, DirectorySource, FramedSource, MessageSource, PointCloudMessage};
use eyre::{bail, Result, WrapErr};
use std::{fs, path::Path};

pub fn open_source<P>(input: P, format: Option<SourceFormat>) -> Result<Box<dyn MessageSource>>
where
    P: AsRef<Path>,
{
    let input = input.as_ref();
    let format = format.unwrap_or_else(|| guess_source_format(input));

    let source: Box<dyn MessageSource> = match format {
        SourceFormat::Directory => Box::new(
            DirectorySource::open(input)
                .wrap_err_with(|| format!("unable to open directory '{}'", input.display()))?,
        ),
        SourceFormat::Stream => Box::new(
            FramedSource::open(input)
                .wrap_err_with(|| format!("unable to open file '{}'", input.display()))?,
        ),
    };

    Ok(source)
}

/// Loads the message stored in `path`, either a single wire record or
/// the first frame of a framed stream.
pub fn load_record<P>(path: P) -> Result<PointCloudMessage>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes =
        fs::read(path).wrap_err_with(|| format!("Failed to open file {}", path.display()))?;

    if let Ok(msg) = wire::decode(&bytes) {
        return Ok(msg);
    }

    match wire::read_frame(&mut bytes.as_slice()) {
        Ok(Some(msg)) => Ok(msg),
        Ok(None) => bail!("'{}' is empty", path.display()),
        Err(err) => {
            Err(err).wrap_err_with(|| format!("'{}' holds no readable message", path.display()))
        }
    }
}
