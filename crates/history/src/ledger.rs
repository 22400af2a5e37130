use std::collections::BTreeMap;

use model::LapTimeEntry;

/// Completed lap durations keyed by lap number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapTimeLedger {
    laps: BTreeMap<u8, u32>,
}

impl LapTimeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any earlier time for the same lap; returns the replaced value.
    pub fn record(&mut self, lap_number: u8, duration_ms: u32) -> Option<u32> {
        self.laps.insert(lap_number, duration_ms)
    }

    pub fn remove(&mut self, lap_number: u8) -> Option<u32> {
        self.laps.remove(&lap_number)
    }

    pub fn get(&self, lap_number: u8) -> Option<u32> {
        self.laps.get(&lap_number).copied()
    }

    pub fn fastest(&self) -> Option<u32> {
        self.laps.values().copied().min()
    }

    /// Fastest lap; the lowest lap number wins a tie.
    pub fn fastest_entry(&self) -> Option<LapTimeEntry> {
        self.all().into_iter().min_by_key(|e| e.duration_ms)
    }

    pub fn is_fastest(&self, lap_number: u8) -> bool {
        match (self.get(lap_number), self.fastest()) {
            (Some(t), Some(best)) => t == best,
            _ => false,
        }
    }

    /// Entries in ascending lap order.
    pub fn all(&self) -> Vec<LapTimeEntry> {
        self.laps
            .iter()
            .map(|(&lap_number, &duration_ms)| LapTimeEntry { lap_number, duration_ms })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    pub fn clear(&mut self) {
        self.laps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger() {
        let ledger = LapTimeLedger::new();
        assert_eq!(ledger.fastest(), None);
        assert_eq!(ledger.fastest_entry(), None);
        assert!(ledger.all().is_empty());
        assert!(!ledger.is_fastest(1));
    }

    #[test]
    fn test_record_overwrites() {
        let mut ledger = LapTimeLedger::new();
        assert_eq!(ledger.record(3, 91_000), None);
        assert_eq!(ledger.record(3, 89_500), Some(91_000));
        assert_eq!(ledger.get(3), Some(89_500));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_all_sorted_and_fastest() {
        let mut ledger = LapTimeLedger::new();
        ledger.record(4, 92_100);
        ledger.record(2, 90_050);
        ledger.record(3, 90_050);
        ledger.record(1, 101_300);

        let laps: Vec<u8> = ledger.all().iter().map(|e| e.lap_number).collect();
        assert_eq!(laps, vec![1, 2, 3, 4]);
        assert_eq!(ledger.fastest(), Some(90_050));
        assert_eq!(
            ledger.fastest_entry(),
            Some(LapTimeEntry { lap_number: 2, duration_ms: 90_050 })
        );
        assert!(ledger.is_fastest(3));
        assert!(!ledger.is_fastest(4));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut ledger = LapTimeLedger::new();
        ledger.record(1, 95_000);
        ledger.record(2, 94_000);
        assert_eq!(ledger.remove(2), Some(94_000));
        assert_eq!(ledger.remove(2), None);
        assert_eq!(ledger.fastest(), Some(95_000));
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
