use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use history::{HistoryConfig, LapProgress, PositionHistory, Tick, TickOutcome};
use model::{LapTimeEntry, Point2, TrailSnapshot};
use trail_ingest_core::{ConnectionMonitor, ConnectionState};
use trail_ingest_f1::TelemetrySnapshot;

pub struct AppSession {
    pub inner: Mutex<Inner>,
}

pub struct Inner {
    pub history: PositionHistory,
    pub monitor: ConnectionMonitor,
    pub ticks: u64,
}

/// Point-in-time summary for the `status` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    pub packets: u64,
    pub ticks: u64,
    pub current_lap: u8,
    pub samples: usize,
    pub trails: usize,
    pub restarting: bool,
    pub fastest_ms: Option<u32>,
}

/// Projects the player's car onto the ground plane. Nothing to do before the
/// first motion packet.
pub fn tick_from_snapshot(snap: &TelemetrySnapshot, now: Instant) -> Option<Tick> {
    let motion = snap.motion?;
    Some(Tick {
        position: Point2::new(f64::from(motion.world_position_x), f64::from(motion.world_position_z)),
        lap: snap.lap.map(|lap| LapProgress {
            lap_distance: lap.lap_distance,
            lap_number: lap.current_lap_num,
            last_lap_time_ms: lap.last_lap_time_ms,
        }),
        timestamp: now,
    })
}

impl AppSession {
    pub fn new(cfg: HistoryConfig, monitor: ConnectionMonitor) -> Self {
        Self {
            inner: Mutex::new(Inner { history: PositionHistory::new(cfg), monitor, ticks: 0 }),
        }
    }

    pub fn start(&self, now: Instant) {
        if let Some(state) = self.inner.lock().monitor.start(now) {
            info!(%state, "telemetry link");
        }
    }

    pub fn stop(&self) {
        if let Some(state) = self.inner.lock().monitor.stop() {
            info!(%state, "telemetry link");
        }
    }

    pub fn poll_health(&self, now: Instant) -> Option<ConnectionState> {
        let mut inner = self.inner.lock();
        let changed = inner.monitor.poll(now)?;
        match changed {
            ConnectionState::WaitingForData => warn!(packets = inner.monitor.packets(), "no telemetry received recently"),
            state => info!(%state, "telemetry link"),
        }
        Some(changed)
    }

    pub fn tick(&self, snap: &TelemetrySnapshot, now: Instant) -> Option<TickOutcome> {
        let tick = tick_from_snapshot(snap, now)?;
        let mut inner = self.inner.lock();
        inner.ticks += 1;
        let out = inner.history.record_tick(tick);
        if !out.dropped_laps.is_empty() {
            debug!(laps = ?out.dropped_laps, "trails dropped");
        }
        Some(out)
    }

    pub fn trails(&self) -> TrailSnapshot {
        self.inner.lock().history.trails_snapshot()
    }

    /// Completed laps in order, each flagged when it holds the fastest time.
    pub fn laps(&self) -> Vec<(LapTimeEntry, bool)> {
        let inner = self.inner.lock();
        let ledger = inner.history.ledger();
        ledger
            .all()
            .into_iter()
            .map(|entry| (entry, ledger.is_fastest(entry.lap_number)))
            .collect()
    }

    pub fn remove_lap(&self, lap_number: u8) -> bool {
        self.inner.lock().history.remove_lap(lap_number)
    }

    pub fn clear(&self) {
        self.inner.lock().history.clear();
        info!("history cleared");
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        let h = &inner.history;
        SessionStatus {
            connection: inner.monitor.state(),
            packets: inner.monitor.packets(),
            ticks: inner.ticks,
            current_lap: h.current_lap(),
            samples: h.history_len(),
            trails: h.trail_laps().count(),
            restarting: h.is_restarting(),
            fastest_ms: h.ledger().fastest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use trail_ingest_core::PacketStamp;
    use trail_ingest_f1::{CarMotionData, LapData};

    fn session(t0: Instant) -> (Arc<PacketStamp>, AppSession) {
        let stamp = Arc::new(PacketStamp::with_epoch(t0));
        let monitor = ConnectionMonitor::new(stamp.clone()).with_timeout(Duration::from_secs(5));
        (stamp, AppSession::new(HistoryConfig::default(), monitor))
    }

    fn snapshot(x: f32, z: f32, lap: Option<(u8, f32, u32)>) -> TelemetrySnapshot {
        let motion = CarMotionData { world_position_x: x, world_position_y: 99.0, world_position_z: z, ..Default::default() };
        TelemetrySnapshot {
            motion: Some(motion),
            lap: lap.map(|(n, d, last)| LapData {
                current_lap_num: n,
                lap_distance: d,
                last_lap_time_ms: last,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_motion_no_tick() {
        let t0 = Instant::now();
        let (_, s) = session(t0);
        assert!(s.tick(&TelemetrySnapshot::default(), t0).is_none());
        assert_eq!(s.status().ticks, 0);
    }

    #[test]
    fn test_uses_ground_plane() {
        let t0 = Instant::now();
        let tick = tick_from_snapshot(&snapshot(12.0, -4.0, None), t0).unwrap();
        assert_eq!(tick.position, Point2::new(12.0, -4.0));
        assert!(tick.lap.is_none());
    }

    #[test]
    fn test_laps_and_remove() {
        let t0 = Instant::now();
        let (_, s) = session(t0);
        s.tick(&snapshot(0.0, 0.0, Some((1, 10.0, 0))), t0);
        s.tick(&snapshot(5.0, 0.0, Some((1, 20.0, 0))), t0 + Duration::from_millis(50));
        let out = s.tick(&snapshot(10.0, 0.0, Some((2, 1.0, 95_000))), t0 + Duration::from_millis(100));
        assert_eq!(out.and_then(|o| o.lap_completed), Some(LapTimeEntry { lap_number: 1, duration_ms: 95_000 }));

        assert_eq!(s.laps(), vec![(LapTimeEntry { lap_number: 1, duration_ms: 95_000 }, true)]);
        assert_eq!(s.trails().trails.len(), 1);
        assert!(s.remove_lap(1));
        assert!(s.laps().is_empty());
        assert_eq!(s.status().current_lap, 2);

        s.clear();
        assert_eq!(s.status().current_lap, 1);
        assert_eq!(s.status().samples, 0);
    }

    #[test]
    fn test_health_follows_stamp() {
        let t0 = Instant::now();
        let (stamp, s) = session(t0);
        s.start(t0);
        assert_eq!(s.status().connection, ConnectionState::Connecting);
        stamp.record(t0 + Duration::from_millis(200));
        assert_eq!(s.poll_health(t0 + Duration::from_secs(1)), Some(ConnectionState::Connected));
        assert_eq!(s.poll_health(t0 + Duration::from_secs(2)), None);
        assert_eq!(s.poll_health(t0 + Duration::from_secs(7)), Some(ConnectionState::WaitingForData));
        s.stop();
        assert_eq!(s.status().connection, ConnectionState::Disconnected);
    }
}
