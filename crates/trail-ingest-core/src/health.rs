use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How long without a decoded packet before a link counts as stale.
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    WaitingForData,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::WaitingForData => "waiting for data",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Last-received timestamp and packet count, written by the decode path.
#[derive(Debug)]
pub struct PacketStamp {
    epoch: Instant,
    // micros since `epoch`, offset by one; zero means nothing received yet
    last_micros: AtomicU64,
    count: AtomicU64,
}

impl PacketStamp {
    pub fn new() -> Self {
        Self::with_epoch(Instant::now())
    }

    pub fn with_epoch(epoch: Instant) -> Self {
        Self { epoch, last_micros: AtomicU64::new(0), count: AtomicU64::new(0) }
    }

    pub fn record(&self, now: Instant) {
        let micros = u64::try_from(now.saturating_duration_since(self.epoch).as_micros())
            .unwrap_or(u64::MAX - 1);
        self.last_micros.store(micros.saturating_add(1), Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last(&self) -> Option<Instant> {
        match self.last_micros.load(Ordering::Acquire) {
            0 => None,
            v => Some(self.epoch + Duration::from_micros(v - 1)),
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.last_micros.store(0, Ordering::Release);
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for PacketStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the link state from the age of the last stamped packet. Polled at 1 Hz.
pub struct ConnectionMonitor {
    stamp: Arc<PacketStamp>,
    timeout: Duration,
    state: ConnectionState,
    started_at: Option<Instant>,
}

impl ConnectionMonitor {
    pub fn new(stamp: Arc<PacketStamp>) -> Self {
        Self {
            stamp,
            timeout: DEFAULT_LINK_TIMEOUT,
            state: ConnectionState::Disconnected,
            started_at: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn packets(&self) -> u64 {
        self.stamp.count()
    }

    /// Returns the new state when it changed.
    pub fn start(&mut self, now: Instant) -> Option<ConnectionState> {
        self.stamp.reset();
        self.started_at = Some(now);
        self.transition(ConnectionState::Connecting)
    }

    pub fn stop(&mut self) -> Option<ConnectionState> {
        self.started_at = None;
        self.transition(ConnectionState::Disconnected)
    }

    pub fn poll(&mut self, now: Instant) -> Option<ConnectionState> {
        let started = self.started_at?;
        let next = match self.stamp.last() {
            Some(last) if now.saturating_duration_since(last) <= self.timeout => {
                ConnectionState::Connected
            }
            Some(_) => ConnectionState::WaitingForData,
            None if now.saturating_duration_since(started) > self.timeout => {
                ConnectionState::WaitingForData
            }
            None => self.state,
        };
        self.transition(next)
    }

    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if next == self.state {
            return None;
        }
        debug!(from = %self.state, to = %next, "connection state changed");
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(epoch: Instant) -> (Arc<PacketStamp>, ConnectionMonitor) {
        let stamp = Arc::new(PacketStamp::with_epoch(epoch));
        (stamp.clone(), ConnectionMonitor::new(stamp))
    }

    #[test]
    fn test_start_then_packet_connects() {
        let t0 = Instant::now();
        let (stamp, mut m) = monitor(t0);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.poll(t0), None);

        assert_eq!(m.start(t0), Some(ConnectionState::Connecting));
        assert_eq!(m.poll(t0 + Duration::from_secs(1)), None);

        stamp.record(t0 + Duration::from_millis(1500));
        assert_eq!(m.poll(t0 + Duration::from_secs(2)), Some(ConnectionState::Connected));
        assert_eq!(m.packets(), 1);
    }

    #[test]
    fn test_stale_link_waits_then_recovers() {
        let t0 = Instant::now();
        let (stamp, mut m) = monitor(t0);
        m.start(t0);
        stamp.record(t0);
        assert_eq!(m.poll(t0 + Duration::from_secs(5)), Some(ConnectionState::Connected));
        assert_eq!(
            m.poll(t0 + Duration::from_secs(6)),
            Some(ConnectionState::WaitingForData)
        );
        stamp.record(t0 + Duration::from_secs(7));
        assert_eq!(m.poll(t0 + Duration::from_secs(8)), Some(ConnectionState::Connected));
    }

    #[test]
    fn test_silent_start_moves_to_waiting() {
        let t0 = Instant::now();
        let (_stamp, mut m) = monitor(t0);
        m.start(t0);
        assert_eq!(m.poll(t0 + Duration::from_secs(5)), None);
        assert_eq!(
            m.poll(t0 + Duration::from_secs(6)),
            Some(ConnectionState::WaitingForData)
        );
    }

    #[test]
    fn test_stop_disconnects_and_start_resets_stamp() {
        let t0 = Instant::now();
        let (stamp, mut m) = monitor(t0);
        m.start(t0);
        stamp.record(t0);
        m.poll(t0);
        assert_eq!(m.stop(), Some(ConnectionState::Disconnected));
        assert_eq!(m.poll(t0 + Duration::from_secs(1)), None);

        m.start(t0 + Duration::from_secs(2));
        assert!(stamp.last().is_none());
        assert_eq!(stamp.count(), 0);
    }

    #[test]
    fn test_custom_timeout() {
        let t0 = Instant::now();
        let (stamp, m) = monitor(t0);
        let mut m = m.with_timeout(Duration::from_secs(1));
        m.start(t0);
        stamp.record(t0);
        assert_eq!(m.poll(t0), Some(ConnectionState::Connected));
        assert_eq!(
            m.poll(t0 + Duration::from_secs(2)),
            Some(ConnectionState::WaitingForData)
        );
    }
}
