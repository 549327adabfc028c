//! Per-connection counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of connection statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnStats {
    /// Total bytes received
    pub bytes_in: u64,
    /// Total bytes sent
    pub bytes_out: u64,
    /// Number of frames received
    pub frames_received: u64,
    /// Number of frames sent
    pub frames_sent: u64,
    /// Keepalive pings written successfully
    pub pings_sent: u64,
    /// Keepalive pings that failed to write
    pub pings_failed: u64,
}

/// Lock-free counters shared by the foreground and keepalive paths
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    pings_sent: AtomicU64,
    pings_failed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_out(&self, bytes: usize) {
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_in(&self, bytes: usize) {
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ping(&self, ok: bool) {
        if ok {
            self.pings_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.pings_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> ConnStats {
        ConnStats {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            pings_failed: self.pings_failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = StatsCounters::default();
        stats.record_out(10);
        stats.record_out(5);
        stats.record_in(7);
        stats.record_ping(true);
        stats.record_ping(false);

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_out, 15);
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.bytes_in, 7);
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.pings_sent, 1);
        assert_eq!(snap.pings_failed, 1);
    }
}
