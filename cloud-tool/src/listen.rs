use crate::{
    opts::Listen,
    utils::{default_output_path, load_aggregator_config},
};
use cloud_format::{
    drain_into, Aggregator, FramedSource, MessageSource, PointCloudMessage, SessionRecorder,
    SourceError,
};
use eyre::{ensure, eyre, Result, WrapErr};
use log::{info, warn};
use std::{
    fs,
    net::TcpListener,
    sync::{atomic::AtomicBool, Arc},
    thread,
    time::Duration,
};

pub fn listen(args: Listen) -> Result<()> {
    let Listen {
        bind,
        output_dir,
        to,
        record,
        max_frames,
        status_interval,
        aggregate,
    } = args;

    ensure!(
        status_interval.is_finite() && status_interval > 0.0,
        "--status-interval must be a positive number of seconds"
    );
    let config = load_aggregator_config(&aggregate)?;
    fs::create_dir_all(&output_dir)
        .wrap_err_with(|| format!("unable to create '{}'", output_dir.display()))?;

    let recorder = if record {
        let recorder = SessionRecorder::create(&output_dir).wrap_err_with(|| {
            format!("unable to create a record directory under '{}'", output_dir.display())
        })?;
        Some(recorder)
    } else {
        None
    };

    let listener = TcpListener::bind(&bind).wrap_err_with(|| format!("unable to bind {bind}"))?;
    info!("waiting for a client on {}", listener.local_addr()?);
    let (stream, peer) = listener.accept()?;
    info!("client {peer} connected");

    let mut source = TapSource {
        inner: FramedSource::new(stream, peer.to_string()),
        recorder,
        remaining: max_frames,
    };

    let aggregator = Arc::new(Aggregator::new(config));
    let producer = {
        let aggregator = aggregator.clone();
        thread::spawn(move || drain_into(&mut source, &aggregator, &AtomicBool::new(false)))
    };

    let interval = Duration::try_from_secs_f64(status_interval)
        .wrap_err("--status-interval is out of range")?;
    let mut last_seq = None;
    while !producer.is_finished() {
        thread::sleep(interval);
        let Some(frame) = aggregator.latest() else {
            continue;
        };
        if last_seq == Some(frame.seq) {
            continue;
        }
        last_seq = Some(frame.seq);
        info!(
            "frame {}: {} points, {} frames buffered",
            frame.seq,
            frame.points.len(),
            aggregator.len()
        );
    }

    let stats = producer
        .join()
        .map_err(|_| eyre!("receiver thread panicked"))?;
    if stats.skipped > 0 {
        warn!("{} of {} messages were skipped", stats.skipped, stats.received);
    }

    let snapshot = aggregator.drain();
    let output = default_output_path(&output_dir, to);
    snapshot
        .export(&output, to.into())
        .wrap_err_with(|| format!("unable to write '{}'", output.display()))?;
    info!(
        "exported {} frames, {} points",
        snapshot.frames().len(),
        snapshot.num_points()
    );
    println!("{}", output.display());

    Ok(())
}

/// Passes messages through from `inner`, recording each one and ending the
/// stream after `remaining` messages.
struct TapSource<S> {
    inner: S,
    recorder: Option<SessionRecorder>,
    remaining: Option<u64>,
}

impl<S> MessageSource for TapSource<S>
where
    S: MessageSource,
{
    fn recv(&mut self) -> Result<Option<PointCloudMessage>, SourceError> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        let Some(msg) = self.inner.recv()? else {
            return Ok(None);
        };
        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }

        if let Some(recorder) = &mut self.recorder {
            if let Err(err) = recorder.record(&msg) {
                warn!("unable to record message {}: {err}", msg.header.seq);
            }
        }

        Ok(Some(msg))
    }
}
