//! Adapters that deliver messages to the codec, and the matching writers
//! that persist them.
//!
//! Three sources implement [`MessageSource`]:
//!
//! - [`DirectorySource`] replays a recorded session, one wire record per
//!   file.
//! - [`FramedSource`] reads a length-delimited stream from a file or a TCP
//!   socket.
//! - [`ChannelSource`] receives frames pushed by a live driver callback
//!   through a [`CallbackSink`].

use crate::{
    error::{SourceError, WireError},
    message::PointCloudMessage,
    wire,
};
use chrono::Local;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, prelude::*, BufReader, BufWriter},
    net::{TcpStream, ToSocketAddrs},
    path::{Path, PathBuf},
    vec,
};

/// Name format of recorded message files. Lexicographic order of the
/// names is arrival order.
pub const RECORD_FILE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S_%6f";

pub trait MessageSource {
    /// Returns the next message, or `None` once the source is exhausted.
    fn recv(&mut self) -> Result<Option<PointCloudMessage>, SourceError>;
}

impl<S> MessageSource for Box<S>
where
    S: MessageSource + ?Sized,
{
    fn recv(&mut self) -> Result<Option<PointCloudMessage>, SourceError> {
        (**self).recv()
    }
}

/// Replays a directory holding one wire record per file, in file name
/// order. Hidden files are ignored.
#[derive(Debug)]
pub struct DirectorySource {
    files: vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn open<P>(dir: P) -> Result<Self, SourceError>
    where
        P: AsRef<Path>,
    {
        let dir = dir.as_ref();
        let io_err = |source| SourceError::Io {
            origin: dir.display().to_string(),
            source,
        };

        let mut files = vec![];
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            files.push(entry.path());
        }
        files.sort_by(|lhs, rhs| lhs.file_name().cmp(&rhs.file_name()));

        info!("found {} records in {}", files.len(), dir.display());
        Ok(Self {
            files: files.into_iter(),
        })
    }

    /// Number of records not yet returned.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }
}

impl MessageSource for DirectorySource {
    fn recv(&mut self) -> Result<Option<PointCloudMessage>, SourceError> {
        let Some(path) = self.files.next() else {
            return Ok(None);
        };
        debug!("reading {}", path.display());

        let bytes = fs::read(&path).map_err(|source| SourceError::Io {
            origin: path.display().to_string(),
            source,
        })?;
        let msg = wire::decode(&bytes).map_err(|source| SourceError::Wire {
            origin: path.display().to_string(),
            source,
        })?;
        Ok(Some(msg))
    }
}

/// Reads length-delimited wire records from a byte stream.
#[derive(Debug)]
pub struct FramedSource<R> {
    reader: R,
    origin: String,
}

impl<R> FramedSource<R>
where
    R: Read,
{
    pub fn new(reader: R, origin: impl Into<String>) -> Self {
        Self {
            reader,
            origin: origin.into(),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl FramedSource<BufReader<File>> {
    pub fn open<P>(path: P) -> Result<Self, SourceError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Io {
            origin: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl FramedSource<TcpStream> {
    pub fn connect<A>(addr: A) -> Result<Self, SourceError>
    where
        A: ToSocketAddrs,
    {
        let connect = || -> io::Result<(TcpStream, String)> {
            let stream = TcpStream::connect(addr)?;
            let peer = stream.peer_addr()?.to_string();
            Ok((stream, peer))
        };
        let (stream, peer) = connect().map_err(|source| SourceError::Io {
            origin: "tcp connect".to_string(),
            source,
        })?;
        info!("connected to {peer}");
        Ok(Self::new(stream, peer))
    }
}

impl<R> MessageSource for FramedSource<R>
where
    R: Read,
{
    fn recv(&mut self) -> Result<Option<PointCloudMessage>, SourceError> {
        wire::read_frame(&mut self.reader).map_err(|source| SourceError::Wire {
            origin: self.origin.clone(),
            source,
        })
    }
}

/// Creates a connected sink/source pair for a live driver callback.
///
/// At most `capacity` frames wait in the channel. When it is full the
/// newest frame is dropped, since a sensor callback must never block.
pub fn callback_channel(capacity: usize) -> (CallbackSink, ChannelSource) {
    let (tx, rx) = bounded(capacity);
    (CallbackSink { tx }, ChannelSource { rx })
}

/// Producer half handed to a driver callback.
#[derive(Debug, Clone)]
pub struct CallbackSink {
    tx: Sender<PointCloudMessage>,
}

impl CallbackSink {
    /// Offers a frame without blocking. Returns `false` if it was dropped.
    pub fn push(&self, msg: PointCloudMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                warn!("consumer is behind, dropping frame {}", msg.header.seq);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer half of [`callback_channel`]. Ends once every sink is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<PointCloudMessage>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (CallbackSink, Self) {
        callback_channel(capacity)
    }
}

impl MessageSource for ChannelSource {
    fn recv(&mut self) -> Result<Option<PointCloudMessage>, SourceError> {
        Ok(self.rx.recv().ok())
    }
}

/// Writes length-delimited wire records.
#[derive(Debug)]
pub struct FramedWriter<W>
where
    W: Write,
{
    writer: W,
}

impl<W> FramedWriter<W>
where
    W: Write,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, msg: &PointCloudMessage) -> Result<(), WireError> {
        wire::write_frame(&mut self.writer, msg)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl FramedWriter<BufWriter<File>> {
    pub fn create<P>(path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

/// Records each message of a session as its own wire file, in a directory
/// [`DirectorySource`] can replay.
#[derive(Debug)]
pub struct SessionRecorder {
    dir: PathBuf,
    last_name: String,
    collisions: usize,
    count: usize,
}

impl SessionRecorder {
    /// Creates `base_dir/lidar_<local time>` and records into it.
    pub fn create<P>(base_dir: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let name = format!("lidar_{}", Local::now().format(RECORD_FILE_FORMAT));
        Self::create_in(base_dir.as_ref().join(name))
    }

    /// Records into `dir`, creating it if needed.
    pub fn create_in<P>(dir: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let dir = dir.as_ref().to_owned();
        fs::create_dir_all(&dir)?;
        info!("recording session to {}", dir.display());

        Ok(Self {
            dir,
            last_name: String::new(),
            collisions: 0,
            count: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of messages recorded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn record(&mut self, msg: &PointCloudMessage) -> io::Result<PathBuf> {
        let stamp = Local::now().format(RECORD_FILE_FORMAT).to_string();
        let name = if stamp == self.last_name {
            self.collisions += 1;
            format!("{stamp}_{:04}", self.collisions)
        } else {
            self.collisions = 0;
            self.last_name = stamp.clone();
            stamp
        };

        let path = self.dir.join(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(&wire::encode(msg))?;
        self.count += 1;

        Ok(path)
    }
}
