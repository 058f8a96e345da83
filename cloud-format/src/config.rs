use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// How many frames an [`Aggregator`](crate::Aggregator) retains.
///
/// Serialized as `null` for unbounded or a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<NonZeroUsize>", into = "Option<NonZeroUsize>")]
pub enum BufferCapacity {
    /// Keep every frame until the session is finalized.
    #[default]
    Unbounded,
    /// Keep the most recent N frames, evicting the oldest first.
    Bounded(NonZeroUsize),
}

impl BufferCapacity {
    pub fn limit(&self) -> Option<usize> {
        match *self {
            Self::Unbounded => None,
            Self::Bounded(cap) => Some(cap.get()),
        }
    }
}

impl From<Option<NonZeroUsize>> for BufferCapacity {
    fn from(cap: Option<NonZeroUsize>) -> Self {
        match cap {
            Some(cap) => Self::Bounded(cap),
            None => Self::Unbounded,
        }
    }
}

impl From<BufferCapacity> for Option<NonZeroUsize> {
    fn from(cap: BufferCapacity) -> Self {
        match cap {
            BufferCapacity::Unbounded => None,
            BufferCapacity::Bounded(cap) => Some(cap),
        }
    }
}

/// The z value written for each exported point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZAxis {
    /// The decoded z: sensor elevation, or the time delta in temporal mode.
    Sensor,
    /// The frame's insertion sequence number times the scale factor.
    #[default]
    ScaledIndex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Multiplier from insertion sequence number to pseudo-coordinate.
    pub scale_factor: f32,
    pub buffer_capacity: BufferCapacity,
    /// Decode z as the time since the session reference instead of
    /// reading the z field.
    pub temporal_mode: bool,
    /// Unset means [`ZAxis::Sensor`] in temporal mode and
    /// [`ZAxis::ScaledIndex`] otherwise.
    pub z_axis: Option<ZAxis>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 0.01,
            buffer_capacity: BufferCapacity::Unbounded,
            temporal_mode: false,
            z_axis: None,
        }
    }
}

impl AggregatorConfig {
    /// The z value exported for each point.
    pub fn z_axis(&self) -> ZAxis {
        match self.z_axis {
            Some(z_axis) => z_axis,
            None if self.temporal_mode => ZAxis::Sensor,
            None => ZAxis::ScaledIndex,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale_factor.is_finite() {
            return Err(ConfigError::NonFiniteScale(self.scale_factor));
        }
        Ok(())
    }
}
