use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A completed lap and how long it took.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct LapTimeEntry {
    pub lap_number: u8,
    pub duration_ms: u32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct LapTrail {
    pub lap_number: u8,
    #[serde(default)]
    pub points: Vec<Point2>,
}

/// Read-only view of the recorded trails, handed to whatever renders them.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct TrailSnapshot {
    pub current_lap: u8,
    #[serde(default)]
    pub trails: Vec<LapTrail>,
    #[serde(default)]
    pub lap_times: Vec<LapTimeEntry>,
    pub fastest_ms: Option<u32>,
}

impl TrailSnapshot {
    pub fn trail(&self, lap_number: u8) -> Option<&LapTrail> {
        self.trails.iter().find(|t| t.lap_number == lap_number)
    }
}

/// Formats milliseconds as `mm:ss.mmm`.
pub fn format_lap_time(ms: u32) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}
