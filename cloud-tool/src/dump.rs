use crate::{io::open_source, opts::Dump};
use cloud_format::{decode_xyz, DecodedPoints, MessageSource, Timestamp, ZMode};
use eyre::Result;
use log::warn;
use serde::Serialize;
use std::io::{self, prelude::*, BufWriter};

/// One line of dump output.
#[derive(Debug, Serialize)]
struct PointsRecord<'a> {
    seq: u32,
    x: &'a [f32],
    y: &'a [f32],
    z: &'a [f32],
}

pub fn dump(args: Dump) -> Result<()> {
    let Dump {
        from,
        input,
        every_n,
        temporal,
    } = args;

    let mode = if temporal {
        ZMode::Temporal {
            reference: Timestamp::now(),
        }
    } else {
        ZMode::Spatial
    };

    let mut source = open_source(&input, from)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    dump_source(&mut *source, mode, every_n.get(), &mut out)?;
    out.flush()?;

    Ok(())
}

/// Writes the points of every `every_n`-th message as JSON lines. Messages
/// that cannot be read or decoded are reported and skipped.
fn dump_source<W>(
    source: &mut dyn MessageSource,
    mode: ZMode,
    every_n: usize,
    out: &mut W,
) -> Result<usize>
where
    W: Write,
{
    let mut index = 0;
    let mut printed = 0;

    loop {
        let msg = match source.recv() {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        index += 1;
        if index % every_n != 0 {
            continue;
        }

        let DecodedPoints { x, y, z } = match decode_xyz(&msg, mode) {
            Ok(points) => points,
            Err(err) => {
                warn!("unable to decode message {}: {err}", msg.header.seq);
                continue;
            }
        };
        let record = PointsRecord {
            seq: msg.header.seq,
            x: &x,
            y: &y,
            z: &z,
        };
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
        printed += 1;
    }

    Ok(printed)
}
