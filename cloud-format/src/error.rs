//! Error types for decoding, wire parsing, sources and export.

use std::{io, path::PathBuf};

use crate::field::PointFieldDatatype;

/// Error returned when a message cannot be decoded into points.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A required coordinate field is absent from the field table.
    #[error("required field '{name}' is missing")]
    MissingField { name: &'static str },

    /// The data buffer length disagrees with `row_step * height`.
    #[error("data buffer holds {actual} bytes, but the layout requires {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A coordinate field is not a single 4-byte float.
    #[error("field '{name}' must be a single FLOAT32, but is {datatype:?} x {count}")]
    UnsupportedDatatype {
        name: &'static str,
        datatype: PointFieldDatatype,
        count: u32,
    },

    /// The declared grid or point layout is self-contradictory.
    #[error("invalid point layout: {detail}")]
    InvalidLayout { detail: String },

    #[error(transparent)]
    Parse(#[from] WireError),
}

/// Error returned by [`AggregatorConfig::validate`](crate::config::AggregatorConfig::validate).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("scale_factor must be finite, but got {0}")]
    NonFiniteScale(f32),
}

/// Error raised while parsing or framing wire bytes.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed protobuf message: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("unknown point field datatype code {0}")]
    UnknownDatatype(u32),

    #[error("message has no header")]
    MissingHeader,

    #[error("{what} declares size {declared}, but carries {actual} elements")]
    SizeMismatch {
        what: &'static str,
        declared: u64,
        actual: u64,
    },

    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error raised by a [`MessageSource`](crate::source::MessageSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error on '{origin}': {source}")]
    Io {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse message from '{origin}': {source}")]
    Wire {
        origin: String,
        #[source]
        source: WireError,
    },
}

impl SourceError {
    /// Whether the source can no longer produce messages. A record that
    /// merely failed to parse leaves the source usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Wire { source, .. } => {
                matches!(source, WireError::Io(_) | WireError::FrameTooLarge(_))
            }
        }
    }
}

/// Error raised while writing an exported point cloud file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to write pcd file '{path}': {source}")]
    Pcd {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
