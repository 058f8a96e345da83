//! Point cloud file writers.

use crate::error::ExportError;
use byteorder::{LittleEndian, WriteBytesExt};
use log::info;
use pcd_rs::{DataKind, PcdDeserialize, PcdSerialize};
use std::{
    fs::File,
    io::{self, prelude::*, BufWriter, SeekFrom},
    path::Path,
};

/// Record type of exported PCD files.
#[derive(Debug, Clone, Copy, PartialEq, PcdSerialize, PcdDeserialize)]
pub struct PcdPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Binary PCD as written by libpcl.
    Pcd,
    PcdAscii,
    /// Binary little endian PLY with float vertices.
    Ply,
    /// Headerless little endian `x y z 0.0` f32 records.
    RawBin,
}

impl ExportFormat {
    pub fn from_path<P>(path: P) -> Option<Self>
    where
        P: AsRef<Path>,
    {
        let format = match path.as_ref().extension()?.to_str()? {
            "pcd" => Self::Pcd,
            "ply" => Self::Ply,
            "bin" => Self::RawBin,
            _ => return None,
        };
        Some(format)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pcd | Self::PcdAscii => "pcd",
            Self::Ply => "ply",
            Self::RawBin => "bin",
        }
    }
}

/// Writes `num_points` points to `path`.
///
/// Points are streamed into the file as the iterator yields them. The
/// iterator must produce exactly `num_points` items.
pub fn export_points<P, I>(
    points: I,
    num_points: usize,
    path: P,
    format: ExportFormat,
) -> Result<(), ExportError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = [f32; 3]>,
{
    let path = path.as_ref();

    match format {
        ExportFormat::Pcd => create_pcd_file(points, num_points, path, DataKind::Binary)?,
        ExportFormat::PcdAscii => create_pcd_file(points, num_points, path, DataKind::Ascii)?,
        ExportFormat::Ply => create_ply_file(points, num_points, path)?,
        ExportFormat::RawBin => create_raw_bin_file(points, num_points, path)?,
    }

    info!(
        "wrote {num_points} points to {} as {format:?}",
        path.display()
    );
    Ok(())
}

fn count_mismatch(expected: usize, actual: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("expect {expected} points, but {actual} were given"),
    )
}

fn pcd_error<E>(path: &Path) -> impl FnOnce(E) -> ExportError + '_
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    move |err| ExportError::Pcd {
        path: path.to_owned(),
        source: err.into(),
    }
}

fn create_pcd_file<I>(
    points: I,
    num_points: usize,
    pcd_file: &Path,
    data_kind: DataKind,
) -> Result<(), ExportError>
where
    I: IntoIterator<Item = [f32; 3]>,
{
    let mut sink = LatchedWriter::new(BufWriter::new(File::create(pcd_file)?));
    let mut writer: pcd_rs::Writer<PcdPoint, _> = pcd_rs::WriterInit {
        width: num_points as u64,
        height: 1,
        viewpoint: Default::default(),
        data_kind,
        schema: None,
    }
    .build_from_writer(&mut sink)
    .map_err(pcd_error(pcd_file))?;

    let push_all = || -> Result<(), ExportError> {
        let mut written = 0;
        for [x, y, z] in points {
            if written == num_points {
                return Err(count_mismatch(num_points, written + 1).into());
            }
            writer
                .push(&PcdPoint { x, y, z })
                .map_err(pcd_error(pcd_file))?;
            written += 1;
        }
        if written != num_points {
            return Err(count_mismatch(num_points, written).into());
        }
        Ok(())
    };
    let pushed = push_all();

    // pcd-rs panics if its writer drops unfinished.
    let finished = writer.finish().map_err(pcd_error(pcd_file));
    pushed?;
    finished?;
    sink.finish()?;
    Ok(())
}

/// Forwards to `inner` and holds on to the first I/O error instead of
/// returning it. Later calls are no-ops that report success.
///
/// Handed to the pcd-rs writer, whose `finish` panics when it fails
/// midway.
struct LatchedWriter<W> {
    inner: W,
    error: Option<io::Error>,
}

impl<W> LatchedWriter<W>
where
    W: Write + Seek,
{
    fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    fn latch<T>(&mut self, result: io::Result<T>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(err) => {
                self.error.get_or_insert(err);
                fallback
            }
        }
    }

    /// Flushes the inner writer and returns the first error seen.
    fn finish(mut self) -> io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.inner.flush()
    }
}

impl<W> Write for LatchedWriter<W>
where
    W: Write + Seek,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.error.is_some() {
            return Ok(buf.len());
        }
        let result = self.inner.write(buf);
        Ok(self.latch(result, buf.len()))
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.error.is_none() {
            let result = self.inner.flush();
            self.latch(result, ());
        }
        Ok(())
    }
}

impl<W> Seek for LatchedWriter<W>
where
    W: Write + Seek,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.error.is_some() {
            return Ok(0);
        }
        let result = self.inner.seek(pos);
        Ok(self.latch(result, 0))
    }
}

fn create_ply_file<I>(points: I, num_points: usize, ply_file: &Path) -> Result<(), ExportError>
where
    I: IntoIterator<Item = [f32; 3]>,
{
    let mut writer = PlyWriter::from_path(ply_file, num_points)?;
    for point in points {
        writer.push(point)?;
    }
    writer.finish()?;
    Ok(())
}

fn create_raw_bin_file<I>(points: I, num_points: usize, bin_file: &Path) -> Result<(), ExportError>
where
    I: IntoIterator<Item = [f32; 3]>,
{
    let mut writer = RawBinWriter::from_path(bin_file)?;
    let mut written = 0;
    for [x, y, z] in points {
        writer.push([x, y, z, 0.0])?;
        written += 1;
    }
    if written != num_points {
        return Err(count_mismatch(num_points, written).into());
    }
    writer.finish()?;
    Ok(())
}

pub struct RawBinWriter {
    writer: BufWriter<File>,
}

impl RawBinWriter {
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let writer = BufWriter::new(File::create(path)?);
        Ok(Self { writer })
    }

    pub fn push(&mut self, point: [f32; 4]) -> io::Result<()> {
        for val in point {
            self.writer.write_f32::<LittleEndian>(val)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Binary little endian PLY writer with a vertex count fixed up front.
pub struct PlyWriter {
    writer: BufWriter<File>,
    num_points: usize,
    written: usize,
}

impl PlyWriter {
    pub fn from_path(path: impl AsRef<Path>, num_points: usize) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        write!(
            writer,
            "ply\n\
             format binary_little_endian 1.0\n\
             element vertex {num_points}\n\
             property float x\n\
             property float y\n\
             property float z\n\
             end_header\n"
        )?;

        Ok(Self {
            writer,
            num_points,
            written: 0,
        })
    }

    pub fn push(&mut self, point: [f32; 3]) -> io::Result<()> {
        if self.written == self.num_points {
            return Err(count_mismatch(self.num_points, self.written + 1));
        }
        for val in point {
            self.writer.write_f32::<LittleEndian>(val)?;
        }
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<()> {
        if self.written != self.num_points {
            return Err(count_mismatch(self.num_points, self.written));
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::fs;

    const POINTS: [[f32; 3]; 3] = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [-1.5, 0.0, 0.25]];

    #[test]
    fn guess_format_from_extension() {
        assert_eq!(ExportFormat::from_path("a/b.pcd"), Some(ExportFormat::Pcd));
        assert_eq!(ExportFormat::from_path("scan.ply"), Some(ExportFormat::Ply));
        assert_eq!(ExportFormat::from_path("000001.bin"), Some(ExportFormat::RawBin));
        assert_eq!(ExportFormat::from_path("scan.las"), None);
        assert_eq!(ExportFormat::from_path("scan"), None);
    }

    #[test]
    fn ply_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.ply");
        export_points(POINTS, 3, &path, ExportFormat::Ply).unwrap();

        let bytes = fs::read(&path).unwrap();
        let header_end = b"end_header\n";
        let body_start = bytes
            .windows(header_end.len())
            .position(|window| window == header_end)
            .unwrap()
            + header_end.len();
        let header = std::str::from_utf8(&bytes[..body_start]).unwrap();
        assert!(header.starts_with("ply\nformat binary_little_endian 1.0\n"));
        assert!(header.contains("element vertex 3\n"));

        let mut body = &bytes[body_start..];
        assert_eq!(body.len(), 3 * 12);
        for point in POINTS {
            for val in point {
                assert_eq!(body.read_f32::<LittleEndian>().unwrap(), val);
            }
        }
    }

    #[test]
    fn empty_ply_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.ply");
        export_points([], 0, &path, ExportFormat::Ply).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("element vertex 0\n"));
        assert!(text.ends_with("end_header\n"));
    }

    #[test]
    fn raw_bin_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.bin");
        export_points(POINTS, 3, &path, ExportFormat::RawBin).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 3 * 16);
        let mut body = bytes.as_slice();
        for [x, y, z] in POINTS {
            for val in [x, y, z, 0.0] {
                assert_eq!(body.read_f32::<LittleEndian>().unwrap(), val);
            }
        }
    }

    #[test]
    fn pcd_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcd");
        export_points(POINTS, 3, &path, ExportFormat::Pcd).unwrap();

        let reader: pcd_rs::Reader<PcdPoint, _> = pcd_rs::Reader::open(&path).unwrap();
        assert_eq!(reader.meta().num_points, 3);
        let points: Vec<_> = reader
            .map(|point| {
                let PcdPoint { x, y, z } = point.unwrap();
                [x, y, z]
            })
            .collect();
        assert_eq!(points, POINTS.to_vec());
    }

    #[test]
    fn failed_pcd_export_returns_error() {
        let dir = tempfile::tempdir().unwrap();

        for format in [ExportFormat::Pcd, ExportFormat::PcdAscii] {
            let path = dir.path().join(format!("long.{}", format.extension()));
            let result = export_points(POINTS, 2, &path, format);
            assert!(matches!(result, Err(ExportError::Io(_))));

            let path = dir.path().join(format!("short.{}", format.extension()));
            let result = export_points(POINTS, 4, &path, format);
            assert!(matches!(result, Err(ExportError::Io(_))));
        }

        // The same path can be written once the input is right.
        let path = dir.path().join("short.pcd");
        export_points(POINTS, 3, &path, ExportFormat::Pcd).unwrap();
    }

    #[test]
    fn latched_writer_reports_first_error() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        impl Seek for Broken {
            fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
                Err(io::Error::new(io::ErrorKind::Other, "not seekable"))
            }
        }

        let mut sink = LatchedWriter::new(Broken);
        sink.write_all(b"header").unwrap();
        sink.seek(SeekFrom::Start(0)).unwrap();
        sink.flush().unwrap();

        let err = sink.finish().unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn pcd_writer_over_failing_sink_does_not_panic() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        impl Seek for Broken {
            fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
                Ok(0)
            }
        }

        let mut sink = LatchedWriter::new(Broken);
        let mut writer: pcd_rs::Writer<PcdPoint, _> = pcd_rs::WriterInit {
            width: 1,
            height: 1,
            viewpoint: Default::default(),
            data_kind: DataKind::Binary,
            schema: None,
        }
        .build_from_writer(&mut sink)
        .unwrap();
        writer
            .push(&PcdPoint {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            })
            .unwrap();
        writer.finish().unwrap();

        assert!(sink.finish().is_err());
    }

    #[test]
    fn point_count_must_match() {
        let dir = tempfile::tempdir().unwrap();

        for format in [ExportFormat::Ply, ExportFormat::RawBin, ExportFormat::Pcd] {
            let path = dir.path().join(format!("short.{}", format.extension()));
            let result = export_points(POINTS, 4, &path, format);
            assert!(result.is_err(), "{format:?} accepted a short iterator");
        }
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("cloud.ply");
        assert!(matches!(
            export_points(POINTS, 3, &path, ExportFormat::Ply),
            Err(ExportError::Io(_))
        ));
    }
}
