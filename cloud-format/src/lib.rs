//! Codec and aggregation pipeline for self-describing lidar point cloud
//! messages.
//!
//! A [`PointCloudMessage`] carries its own per-point record layout as a
//! table of [`PointField`]s. This crate decodes such messages into x/y/z
//! arrays, moves them losslessly through a protobuf wire format,
//! accumulates them over a session with an [`Aggregator`] and writes the
//! result as a PCD, PLY or raw binary point cloud file.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod field;
pub mod message;
pub mod session;
pub mod source;
pub mod wire;
pub mod xyz;

pub use aggregate::{Aggregator, Frame, Snapshot};
pub use config::{AggregatorConfig, BufferCapacity, ZAxis};
pub use error::{CodecError, ConfigError, ExportError, SourceError, WireError};
pub use export::{export_points, ExportFormat, PcdPoint};
pub use field::{FieldTable, PointField, PointFieldDatatype};
pub use message::{Header, PointCloudMessage, Timestamp};
pub use session::{drain_into, DrainStats};
pub use source::{
    callback_channel, CallbackSink, ChannelSource, DirectorySource, FramedSource, FramedWriter,
    MessageSource, SessionRecorder,
};
pub use xyz::{decode_xyz, DecodedPoints, ZMode};
