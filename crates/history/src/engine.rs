use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use model::{format_lap_time, LapTimeEntry, LapTrail, Point2, TrailSnapshot};
use tracing::{debug, info};

use crate::ledger::LapTimeLedger;

pub const MAX_HISTORY_POINTS: usize = 1000;
pub const HISTORY_DISTANCE_THRESHOLD: f64 = 2.0;
pub const MAX_SAMPLE_AGE: Duration = Duration::from_secs(5 * 60);
/// Forward jump in lap distance (metres) read as the car being put back behind the line.
pub const RESTART_TELEPORT_THRESHOLD: f32 = 1000.0;
/// Lap distance (metres) under which a restarted lap counts as under way again.
pub const LAP_START_THRESHOLD: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    pub max_points: usize,
    pub distance_threshold: f64,
    pub max_sample_age: Duration,
    pub restart_teleport_threshold: f32,
    pub lap_start_threshold: f32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_points: MAX_HISTORY_POINTS,
            distance_threshold: HISTORY_DISTANCE_THRESHOLD,
            max_sample_age: MAX_SAMPLE_AGE,
            restart_teleport_threshold: RESTART_TELEPORT_THRESHOLD,
            lap_start_threshold: LAP_START_THRESHOLD,
        }
    }
}

/// Lap-data view of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapProgress {
    pub lap_distance: f32,
    pub lap_number: u8,
    /// Time of the lap most recently completed, zero if none.
    pub last_lap_time_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// World X/Z projected onto the ground plane.
    pub position: Point2,
    /// Absent until lap data has been received.
    pub lap: Option<LapProgress>,
    pub timestamp: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub position: Point2,
    pub timestamp: Instant,
    pub lap_number: u8,
}

/// What a tick changed, for whoever renders trails or lap times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub sample_recorded: bool,
    pub restart_detected: bool,
    pub restart_cleared: bool,
    pub lap_completed: Option<LapTimeEntry>,
    /// Laps whose trail (or, on a restart, whose samples) went away this tick.
    pub dropped_laps: Vec<u8>,
}

/// Rolling, lap-segmented record of where the car has been.
///
/// Samples are kept oldest first and bounded both by count and by age. Each
/// lap with at least two retained samples has a trail; a lap loses its trail
/// the moment its last sample leaves the history.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionHistory {
    cfg: HistoryConfig,
    history: VecDeque<PositionSample>,
    lap_trails: BTreeMap<u8, Vec<Point2>>,
    lap_counts: BTreeMap<u8, usize>,
    last_lap_distance: f32,
    is_restarting: bool,
    current_lap: u8,
    ledger: LapTimeLedger,
}

impl Default for PositionHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

fn clamp_distance(d: f32) -> f32 {
    if d.is_finite() && d > 0.0 {
        d
    } else {
        0.0
    }
}

impl PositionHistory {
    pub fn new(cfg: HistoryConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(cfg.max_points.saturating_add(1)),
            cfg,
            lap_trails: BTreeMap::new(),
            lap_counts: BTreeMap::new(),
            last_lap_distance: 0.0,
            is_restarting: false,
            current_lap: 1,
            ledger: LapTimeLedger::new(),
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.cfg
    }

    pub fn record_tick(&mut self, tick: Tick) -> TickOutcome {
        let mut out = TickOutcome::default();
        let mut touched = BTreeSet::new();

        if let Some(lap) = tick.lap {
            self.observe_lap_number(&lap, &mut out);

            let distance = clamp_distance(lap.lap_distance);
            if !self.is_restarting
                && self.last_lap_distance > 0.0
                && distance - self.last_lap_distance > self.cfg.restart_teleport_threshold
            {
                self.is_restarting = true;
                out.restart_detected = true;
                let lap_number = self.current_lap;
                if self.purge_lap(lap_number) {
                    out.dropped_laps.push(lap_number);
                }
                info!(
                    lap = lap_number,
                    from_m = self.last_lap_distance,
                    to_m = distance,
                    "lap restart detected, pausing trail recording"
                );
            }
            if self.is_restarting && distance < self.cfg.lap_start_threshold {
                self.is_restarting = false;
                out.restart_cleared = true;
                info!(lap = self.current_lap, "lap started, resuming trail recording");
            }
            self.last_lap_distance = distance;
        }

        if !self.is_restarting && tick.position.is_finite() && self.should_record(&tick.position) {
            let sample = PositionSample {
                position: tick.position,
                timestamp: self.monotonic(tick.timestamp),
                lap_number: self.current_lap,
            };
            self.push(sample);
            out.sample_recorded = true;
            touched.insert(self.current_lap);

            while self.history.len() > self.cfg.max_points {
                if let Some(old) = self.history.pop_front() {
                    self.release(old.lap_number);
                    touched.insert(old.lap_number);
                }
            }
        }

        self.evict_older_than(tick.timestamp, &mut touched);

        for lap in touched {
            let had_trail = self.lap_trails.contains_key(&lap);
            self.rebuild_trail(lap);
            if had_trail && !self.lap_trails.contains_key(&lap) && !out.dropped_laps.contains(&lap) {
                debug!(lap, "trail evicted");
                out.dropped_laps.push(lap);
            }
        }
        out
    }

    /// Forgets a lap's trail, samples and time. The lap counter is left alone.
    pub fn remove_lap(&mut self, lap_number: u8) -> bool {
        let had_time = self.ledger.remove(lap_number).is_some();
        let had_samples = self.purge_lap(lap_number);
        if had_time || had_samples {
            info!(lap = lap_number, "removed lap and its trail");
        }
        had_time || had_samples
    }

    /// Back to session start.
    pub fn clear(&mut self) {
        self.history.clear();
        self.lap_trails.clear();
        self.lap_counts.clear();
        self.ledger.clear();
        self.current_lap = 1;
        self.last_lap_distance = 0.0;
        self.is_restarting = false;
    }

    pub fn trails_snapshot(&self) -> TrailSnapshot {
        TrailSnapshot {
            current_lap: self.current_lap,
            trails: self
                .lap_trails
                .iter()
                .map(|(&lap_number, points)| LapTrail { lap_number, points: points.clone() })
                .collect(),
            lap_times: self.ledger.all(),
            fastest_ms: self.ledger.fastest(),
        }
    }

    pub fn trail(&self, lap_number: u8) -> Option<&[Point2]> {
        self.lap_trails.get(&lap_number).map(Vec::as_slice)
    }

    pub fn trail_laps(&self) -> impl Iterator<Item = u8> + '_ {
        self.lap_trails.keys().copied()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PositionSample> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn lap_sample_count(&self, lap_number: u8) -> usize {
        self.lap_counts.get(&lap_number).copied().unwrap_or(0)
    }

    pub fn current_lap(&self) -> u8 {
        self.current_lap
    }

    pub fn is_restarting(&self) -> bool {
        self.is_restarting
    }

    pub fn last_lap_distance(&self) -> f32 {
        self.last_lap_distance
    }

    pub fn ledger(&self) -> &LapTimeLedger {
        &self.ledger
    }

    fn observe_lap_number(&mut self, lap: &LapProgress, out: &mut TickOutcome) {
        if lap.lap_number == 0 || lap.lap_number == self.current_lap {
            return;
        }
        // restart flag is still the one from the previous tick here
        if lap.last_lap_time_ms > 0 && !self.is_restarting {
            let entry = LapTimeEntry { lap_number: self.current_lap, duration_ms: lap.last_lap_time_ms };
            self.ledger.record(entry.lap_number, entry.duration_ms);
            out.lap_completed = Some(entry);
            info!(
                lap = entry.lap_number,
                time = %format_lap_time(entry.duration_ms),
                "lap completed"
            );
        }
        debug!(from = self.current_lap, to = lap.lap_number, "lap number changed");
        self.current_lap = lap.lap_number;
    }

    fn should_record(&self, position: &Point2) -> bool {
        match self.history.back() {
            None => true,
            Some(last) => last.position.distance(position) > self.cfg.distance_threshold,
        }
    }

    fn monotonic(&self, timestamp: Instant) -> Instant {
        match self.history.back() {
            Some(last) if timestamp < last.timestamp => last.timestamp,
            _ => timestamp,
        }
    }

    fn push(&mut self, sample: PositionSample) {
        *self.lap_counts.entry(sample.lap_number).or_insert(0) += 1;
        self.history.push_back(sample);
    }

    fn release(&mut self, lap_number: u8) {
        if let Some(count) = self.lap_counts.get_mut(&lap_number) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.lap_counts.remove(&lap_number);
            }
        }
    }

    /// Drops every sample and the trail of one lap. True if anything was there.
    fn purge_lap(&mut self, lap_number: u8) -> bool {
        let had_trail = self.lap_trails.remove(&lap_number).is_some();
        let had_samples = self.lap_counts.remove(&lap_number).is_some();
        if had_samples {
            self.history.retain(|s| s.lap_number != lap_number);
        }
        had_trail || had_samples
    }

    fn evict_older_than(&mut self, now: Instant, touched: &mut BTreeSet<u8>) {
        let Some(cutoff) = now.checked_sub(self.cfg.max_sample_age) else {
            return;
        };
        while let Some(front) = self.history.front() {
            if front.timestamp >= cutoff {
                break;
            }
            let lap = front.lap_number;
            self.history.pop_front();
            self.release(lap);
            touched.insert(lap);
        }
    }

    fn rebuild_trail(&mut self, lap_number: u8) {
        let points: Vec<Point2> = self
            .history
            .iter()
            .filter(|s| s.lap_number == lap_number)
            .map(|s| s.position)
            .collect();
        // a single point cannot form a polyline
        if points.len() >= 2 {
            self.lap_trails.insert(lap_number, points);
        } else {
            self.lap_trails.remove(&lap_number);
        }
    }
}
