//! Accumulation of decoded frames over a session.

use crate::{
    config::{AggregatorConfig, ZAxis},
    error::{CodecError, ExportError},
    export::{export_points, ExportFormat},
    message::{PointCloudMessage, Timestamp},
    xyz::{decode_xyz, DecodedPoints, ZMode},
};
use log::{debug, warn};
use parking_lot::Mutex;
use std::{collections::VecDeque, path::Path, sync::Arc};

/// One decoded message as retained by the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Session-wide insertion sequence number, starting at 0.
    pub seq: u64,
    pub stamp: Timestamp,
    pub points: DecodedPoints,
}

#[derive(Debug, Default)]
struct State {
    frames: VecDeque<Arc<Frame>>,
    next_seq: u64,
    num_points: usize,
    skipped: u64,
}

/// Session buffer shared between a producer that appends frames and a
/// consumer that exports them.
///
/// Appends and snapshots are serialized by one lock, so a snapshot always
/// sees whole frames in arrival order.
#[derive(Debug)]
pub struct Aggregator {
    config: AggregatorConfig,
    reference: Timestamp,
    state: Mutex<State>,
}

impl Aggregator {
    /// Creates an aggregator whose temporal reference is the current time.
    pub fn new(config: AggregatorConfig) -> Self {
        Self::with_reference_time(config, Timestamp::now())
    }

    pub fn with_reference_time(config: AggregatorConfig, reference: Timestamp) -> Self {
        Self {
            config,
            reference,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn reference_time(&self) -> Timestamp {
        self.reference
    }

    pub fn z_mode(&self) -> ZMode {
        if self.config.temporal_mode {
            ZMode::Temporal {
                reference: self.reference,
            }
        } else {
            ZMode::Spatial
        }
    }

    /// Decodes `msg` and buffers it, returning its sequence number.
    ///
    /// A message that fails to decode is logged and counted as skipped. It
    /// does not consume a sequence number and leaves the buffer as is.
    pub fn append(&self, msg: &PointCloudMessage) -> Result<u64, CodecError> {
        let points = match decode_xyz(msg, self.z_mode()) {
            Ok(points) => points,
            Err(err) => {
                warn!(
                    "skipping message with header seq {}: {err}",
                    msg.header.seq
                );
                self.state.lock().skipped += 1;
                return Err(err);
            }
        };

        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.num_points += points.len();
        state.frames.push_back(Arc::new(Frame {
            seq,
            stamp: msg.header.stamp(),
            points,
        }));

        if let Some(limit) = self.config.buffer_capacity.limit() {
            while state.frames.len() > limit {
                if let Some(evicted) = state.frames.pop_front() {
                    state.num_points -= evicted.points.len();
                    debug!("evicted frame {}", evicted.seq);
                }
            }
        }

        Ok(seq)
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().frames.is_empty()
    }

    /// Total points across the retained frames.
    pub fn num_points(&self) -> usize {
        self.state.lock().num_points
    }

    /// Number of messages rejected by [`append`](Self::append).
    pub fn skipped(&self) -> u64 {
        self.state.lock().skipped
    }

    /// The most recently appended frame still retained.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.state.lock().frames.back().cloned()
    }

    /// A consistent view of the retained frames. The buffer is unchanged.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock();
        self.make_snapshot(state.frames.iter().cloned().collect(), state.num_points)
    }

    /// Takes every retained frame out of the buffer. Sequence numbering
    /// continues where it left off.
    pub fn drain(&self) -> Snapshot {
        let mut state = self.state.lock();
        let frames = state.frames.drain(..).collect();
        let num_points = std::mem::take(&mut state.num_points);
        drop(state);
        self.make_snapshot(frames, num_points)
    }

    /// Exports a snapshot of the buffer. The buffer is kept whether or not
    /// the export succeeds, so a failed export can be retried.
    pub fn export<P>(&self, path: P, format: ExportFormat) -> Result<usize, ExportError>
    where
        P: AsRef<Path>,
    {
        let snapshot = self.snapshot();
        snapshot.export(path, format)?;
        Ok(snapshot.num_points())
    }

    fn make_snapshot(&self, frames: Vec<Arc<Frame>>, num_points: usize) -> Snapshot {
        Snapshot {
            frames,
            num_points,
            z_axis: self.config.z_axis(),
            scale_factor: self.config.scale_factor,
        }
    }
}

/// Frames taken from an [`Aggregator`] at one instant.
#[derive(Debug, Clone)]
pub struct Snapshot {
    frames: Vec<Arc<Frame>>,
    num_points: usize,
    z_axis: ZAxis,
    scale_factor: f32,
}

impl Snapshot {
    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The z value exported for points of `frame`, if it is shared by the
    /// whole frame.
    pub fn pseudo_coordinate(&self, frame: &Frame) -> Option<f32> {
        match self.z_axis {
            ZAxis::Sensor => None,
            ZAxis::ScaledIndex => Some(frame.seq as f32 * self.scale_factor),
        }
    }

    /// Every point in frame arrival order, then point order.
    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.frames.iter().flat_map(move |frame| {
            let pseudo_z = self.pseudo_coordinate(frame);
            frame
                .points
                .iter()
                .map(move |[x, y, z]| [x, y, pseudo_z.unwrap_or(z)])
        })
    }

    pub fn export<P>(&self, path: P, format: ExportFormat) -> Result<(), ExportError>
    where
        P: AsRef<Path>,
    {
        export_points(self.points(), self.num_points, path, format)
    }
}
