use crate::{aggregate::Aggregator, source::MessageSource};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainStats {
    /// Messages delivered by the source or rejected by it as malformed.
    pub received: u64,
    pub appended: u64,
    /// Messages that failed to parse or decode.
    pub skipped: u64,
}

/// Feeds every message from `source` into `aggregator`.
///
/// Stops when the source is exhausted, when it fails beyond recovery, or
/// when `cancel` is set. Malformed messages are skipped. Whatever was
/// buffered before stopping stays in the aggregator for export.
pub fn drain_into<S>(source: &mut S, aggregator: &Aggregator, cancel: &AtomicBool) -> DrainStats
where
    S: MessageSource + ?Sized,
{
    let mut stats = DrainStats::default();

    while !cancel.load(Ordering::Relaxed) {
        match source.recv() {
            Ok(Some(msg)) => {
                stats.received += 1;
                match aggregator.append(&msg) {
                    Ok(_) => stats.appended += 1,
                    Err(_) => stats.skipped += 1,
                }
            }
            Ok(None) => break,
            Err(err) if err.is_fatal() => {
                warn!("source failed, ending session: {err}");
                break;
            }
            Err(err) => {
                warn!("skipping unreadable message: {err}");
                stats.received += 1;
                stats.skipped += 1;
            }
        }
    }

    info!(
        "session drained: {} received, {} appended, {} skipped",
        stats.received, stats.appended, stats.skipped
    );
    stats
}
