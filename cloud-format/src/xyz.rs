//! Decoding of point records into Cartesian coordinate arrays.

use crate::{
    error::CodecError,
    field::{PointField, PointFieldDatatype},
    message::{PointCloudMessage, Timestamp},
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Source of the z coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZMode {
    /// Read z from the `z` field of each point.
    #[default]
    Spatial,
    /// Replace z with the signed nanosecond delta between `reference` and
    /// the message stamp, the same value for every point in the message.
    Temporal { reference: Timestamp },
}

/// Index-aligned coordinate arrays, point `k` at row `k / width`, column
/// `k % width`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedPoints {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl DecodedPoints {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = [f32; 3]> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| [x, y, z])
    }
}

/// Signed nanoseconds from the message stamp to `reference`.
///
/// The stamp is truncated to whole microseconds before subtracting.
pub fn time_delta_nanos(reference: Timestamp, stamp: Timestamp) -> i128 {
    reference.as_nanos() - stamp.truncate_to_micros().as_nanos()
}

/// Decodes the x, y and z coordinates of every point in `msg`.
pub fn decode_xyz(msg: &PointCloudMessage, mode: ZMode) -> Result<DecodedPoints, CodecError> {
    let table = msg.field_table();
    let coordinate = |name: &'static str| -> Result<&PointField, CodecError> {
        let field = table.get(name).ok_or(CodecError::MissingField { name })?;
        if field.datatype != PointFieldDatatype::Float32 || field.count == 0 {
            return Err(CodecError::UnsupportedDatatype {
                name,
                datatype: field.datatype,
                count: field.count,
            });
        }
        Ok(field)
    };

    let offset_x = coordinate("x")?.offset as usize;
    let offset_y = coordinate("y")?.offset as usize;
    let offset_z = coordinate("z")?.offset as usize;

    let expected = msg.expected_data_len()?;
    if msg.data.len() != expected {
        return Err(CodecError::BufferSizeMismatch {
            expected,
            actual: msg.data.len(),
        });
    }
    msg.validate_layout()?;

    let read: fn(&[u8]) -> f32 = if msg.is_bigendian {
        BigEndian::read_f32
    } else {
        LittleEndian::read_f32
    };
    let read_at = |offset: usize| -> Result<f32, CodecError> {
        msg.data
            .get(offset..offset + 4)
            .map(read)
            .ok_or_else(|| CodecError::InvalidLayout {
                detail: format!("read at byte {offset} is out of bounds"),
            })
    };

    let broadcast_z = match mode {
        ZMode::Spatial => None,
        ZMode::Temporal { reference } => {
            Some(time_delta_nanos(reference, msg.header.stamp()) as f32)
        }
    };

    let width = msg.width as usize;
    let row_step = msg.row_step as usize;
    let point_step = msg.point_step as usize;
    let mut points = DecodedPoints::with_capacity(msg.num_points());

    for row in 0..msg.height as usize {
        for col in 0..width {
            let point_offset = row * row_step + col * point_step;

            points.x.push(read_at(point_offset + offset_x)?);
            points.y.push(read_at(point_offset + offset_y)?);
            let z = match broadcast_z {
                Some(z) => z,
                None => read_at(point_offset + offset_z)?,
            };
            points.z.push(z);
        }
    }

    Ok(points)
}
