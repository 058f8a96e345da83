//! Protobuf wire format and length-delimited framing.
//!
//! Each message travels as one `PointCloudMsg` record. Streams of records
//! are framed as
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)       │
//! │ Big-endian u32   │ Protobuf binary          │
//! └──────────────────┴──────────────────────────┘
//! ```

use crate::{
    error::WireError,
    field::{PointField, PointFieldDatatype},
    message::{Header, PointCloudMessage},
};
use prost::Message as _;
use std::io::{self, Read, Write};

/// Largest accepted frame payload.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

pub mod proto {
    //! Protobuf schema of the wire record.

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PointCloudMsg {
        #[prost(message, optional, tag = "1")]
        pub header: Option<Header>,
        #[prost(uint32, tag = "2")]
        pub height: u32,
        #[prost(uint32, tag = "3")]
        pub width: u32,
        #[prost(message, optional, tag = "4")]
        pub fields: Option<PointFieldArray>,
        #[prost(bool, tag = "5")]
        pub is_bigendian: bool,
        #[prost(uint32, tag = "6")]
        pub point_step: u32,
        #[prost(uint32, tag = "7")]
        pub row_step: u32,
        #[prost(message, optional, tag = "8")]
        pub data: Option<Uint8Array>,
        #[prost(bool, tag = "9")]
        pub is_dense: bool,
        #[prost(uint32, tag = "10")]
        pub num_echos: u32,
        #[prost(uint32, tag = "11")]
        pub segment_idx: u32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Header {
        #[prost(uint32, tag = "1")]
        pub seq: u32,
        #[prost(int64, tag = "2")]
        pub timestamp_sec: i64,
        #[prost(uint32, tag = "3")]
        pub timestamp_nsec: u32,
        #[prost(bytes = "vec", tag = "4")]
        pub frame_id: Vec<u8>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PointFieldArray {
        #[prost(uint64, tag = "1")]
        pub capacity: u64,
        #[prost(uint64, tag = "2")]
        pub size: u64,
        #[prost(message, repeated, tag = "3")]
        pub buffer: Vec<PointFieldMsg>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct PointFieldMsg {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(uint32, tag = "2")]
        pub offset: u32,
        #[prost(uint32, tag = "3")]
        pub datatype: u32,
        #[prost(uint32, tag = "4")]
        pub count: u32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Uint8Array {
        #[prost(uint64, tag = "1")]
        pub capacity: u64,
        #[prost(uint64, tag = "2")]
        pub size: u64,
        #[prost(bytes = "vec", tag = "3")]
        pub buffer: Vec<u8>,
    }
}

impl From<&PointCloudMessage> for proto::PointCloudMsg {
    fn from(msg: &PointCloudMessage) -> Self {
        let Header {
            seq,
            timestamp_sec,
            timestamp_nsec,
            ref frame_id,
        } = msg.header;

        let fields: Vec<_> = msg
            .fields
            .iter()
            .map(|field| proto::PointFieldMsg {
                name: field.name.clone(),
                offset: field.offset,
                datatype: field.datatype.code(),
                count: field.count,
            })
            .collect();

        Self {
            header: Some(proto::Header {
                seq,
                timestamp_sec,
                timestamp_nsec,
                frame_id: frame_id.clone(),
            }),
            height: msg.height,
            width: msg.width,
            fields: Some(proto::PointFieldArray {
                capacity: fields.len() as u64,
                size: fields.len() as u64,
                buffer: fields,
            }),
            is_bigendian: msg.is_bigendian,
            point_step: msg.point_step,
            row_step: msg.row_step,
            data: Some(proto::Uint8Array {
                capacity: msg.data.len() as u64,
                size: msg.data.len() as u64,
                buffer: msg.data.clone(),
            }),
            is_dense: msg.is_dense,
            num_echos: msg.num_echoes,
            segment_idx: msg.segment_idx,
        }
    }
}

impl TryFrom<proto::PointCloudMsg> for PointCloudMessage {
    type Error = WireError;

    fn try_from(msg: proto::PointCloudMsg) -> Result<Self, Self::Error> {
        let header = msg.header.ok_or(WireError::MissingHeader)?;

        let fields = match msg.fields {
            Some(array) => {
                check_size("fields", array.size, array.buffer.len())?;
                array
                    .buffer
                    .into_iter()
                    .map(|field| {
                        let datatype = PointFieldDatatype::from_code(field.datatype)
                            .ok_or(WireError::UnknownDatatype(field.datatype))?;
                        Ok(PointField {
                            name: field.name,
                            offset: field.offset,
                            datatype,
                            count: field.count,
                        })
                    })
                    .collect::<Result<Vec<_>, WireError>>()?
            }
            None => vec![],
        };

        let data = match msg.data {
            Some(array) => {
                check_size("data", array.size, array.buffer.len())?;
                array.buffer
            }
            None => vec![],
        };

        Ok(Self {
            header: Header {
                seq: header.seq,
                timestamp_sec: header.timestamp_sec,
                timestamp_nsec: header.timestamp_nsec,
                frame_id: header.frame_id,
            },
            height: msg.height,
            width: msg.width,
            fields,
            is_bigendian: msg.is_bigendian,
            point_step: msg.point_step,
            row_step: msg.row_step,
            data,
            is_dense: msg.is_dense,
            num_echoes: msg.num_echos,
            segment_idx: msg.segment_idx,
        })
    }
}

fn check_size(what: &'static str, declared: u64, actual: usize) -> Result<(), WireError> {
    if declared != actual as u64 {
        return Err(WireError::SizeMismatch {
            what,
            declared,
            actual: actual as u64,
        });
    }
    Ok(())
}

/// Serializes a message into one wire record.
pub fn encode(msg: &PointCloudMessage) -> Vec<u8> {
    proto::PointCloudMsg::from(msg).encode_to_vec()
}

/// Parses one wire record.
pub fn decode(bytes: &[u8]) -> Result<PointCloudMessage, WireError> {
    let msg = proto::PointCloudMsg::decode(bytes)?;
    msg.try_into()
}

/// Writes one length-prefixed record.
pub fn write_frame<W>(writer: &mut W, msg: &PointCloudMessage) -> Result<(), WireError>
where
    W: Write,
{
    let payload = encode(msg);
    if payload.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(payload.len()));
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Reads one length-prefixed record.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.
pub fn read_frame<R>(reader: &mut R) -> Result<Option<PointCloudMessage>, WireError>
where
    R: Read,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(WireError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated frame length, read {filled} of 4 bytes"),
                )))
            }
            Ok(cnt) => filled += cnt,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    decode(&payload).map(Some)
}
