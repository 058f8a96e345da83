use crate::{
    error::CodecError,
    field::{FieldTable, PointField},
};
use chrono::{DateTime, Utc};

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: u32,
}

impl Timestamp {
    pub fn new(sec: i64, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn as_nanos(&self) -> i128 {
        self.sec as i128 * 1_000_000_000 + self.nsec as i128
    }

    /// Same instant with the sub-second part truncated to whole
    /// microseconds, which is the resolution sensor stamps are compared at.
    pub fn truncate_to_micros(&self) -> Self {
        Self {
            sec: self.sec,
            nsec: self.nsec / 1_000 * 1_000,
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self {
            sec: time.timestamp(),
            nsec: time.timestamp_subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub seq: u32,
    pub timestamp_sec: i64,
    pub timestamp_nsec: u32,
    pub frame_id: Vec<u8>,
}

impl Header {
    pub fn stamp(&self) -> Timestamp {
        Timestamp::new(self.timestamp_sec, self.timestamp_nsec)
    }
}

/// One sensor frame in the self-describing row format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PointCloudMessage {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub data: Vec<u8>,
    pub is_dense: bool,
    pub num_echoes: u32,
    pub segment_idx: u32,
}

impl PointCloudMessage {
    pub fn num_points(&self) -> usize {
        self.height as usize * self.width as usize
    }

    pub fn field_table(&self) -> FieldTable<'_> {
        FieldTable::new(&self.fields)
    }

    /// Number of data bytes the layout declares, `row_step * height`.
    pub fn expected_data_len(&self) -> Result<usize, CodecError> {
        (self.row_step as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| CodecError::InvalidLayout {
                detail: format!(
                    "row_step {} x height {} overflows",
                    self.row_step, self.height
                ),
            })
    }

    /// Checks that rows hold `width` point records and that every field
    /// fits within one record.
    pub fn validate_layout(&self) -> Result<(), CodecError> {
        let min_row_step = (self.point_step as usize)
            .checked_mul(self.width as usize)
            .ok_or_else(|| CodecError::InvalidLayout {
                detail: format!(
                    "point_step {} x width {} overflows",
                    self.point_step, self.width
                ),
            })?;

        if (self.row_step as usize) < min_row_step {
            return Err(CodecError::InvalidLayout {
                detail: format!(
                    "row_step {} is shorter than point_step {} x width {}",
                    self.row_step, self.point_step, self.width
                ),
            });
        }

        if let Some(field) = self
            .fields
            .iter()
            .find(|field| field.end() > self.point_step as usize)
        {
            return Err(CodecError::InvalidLayout {
                detail: format!(
                    "field '{}' ends at byte {}, past point_step {}",
                    field.name,
                    field.end(),
                    self.point_step
                ),
            });
        }

        Ok(())
    }
}
