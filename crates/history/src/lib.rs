//! Lap-segmented position history and lap times for the player's car.

pub mod engine;
pub mod ledger;

pub use engine::{
    HistoryConfig, LapProgress, PositionHistory, PositionSample, Tick, TickOutcome,
    HISTORY_DISTANCE_THRESHOLD, LAP_START_THRESHOLD, MAX_HISTORY_POINTS, MAX_SAMPLE_AGE,
    RESTART_TELEPORT_THRESHOLD,
};
pub use ledger::LapTimeLedger;
