use parking_lot::RwLock;

use crate::packets::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("player index {index} out of range for {len} cars")]
    IndexOutOfRange { index: u8, len: usize },
}

/// Latest value per category for the player's car. `None` means nothing received yet.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub header: Option<PacketHeader>,
    pub motion: Option<CarMotionData>,
    pub session: Option<SessionData>,
    pub lap: Option<LapData>,
    pub telemetry: Option<CarTelemetryData>,
    pub status: Option<CarStatusData>,
    pub applied: u64,
}

/// Single-writer overwrite store shared between the receive task and readers.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<TelemetrySnapshot>,
}

fn player_entry<T: Copy>(cars: &[T; MAX_CARS], index: u8) -> Result<T, StoreError> {
    cars.get(usize::from(index))
        .copied()
        .ok_or(StoreError::IndexOutOfRange { index, len: MAX_CARS })
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the category carried by `packet`. Unhandled packets change nothing.
    pub fn apply(&self, packet: &DecodedPacket, player_index: u8) -> Result<Option<PacketKind>, StoreError> {
        let header = *packet.header();
        match packet {
            DecodedPacket::Motion(p) => {
                let car = player_entry(&p.cars, player_index)?;
                let mut snap = self.inner.write();
                snap.motion = Some(car);
                Self::stamp(&mut snap, header);
            }
            DecodedPacket::Session(p) => {
                let mut snap = self.inner.write();
                snap.session = Some(p.session);
                Self::stamp(&mut snap, header);
            }
            DecodedPacket::LapData(p) => {
                let lap = player_entry(&p.cars, player_index)?;
                let mut snap = self.inner.write();
                snap.lap = Some(lap);
                Self::stamp(&mut snap, header);
            }
            DecodedPacket::CarTelemetry(p) => {
                let car = player_entry(&p.cars, player_index)?;
                let mut snap = self.inner.write();
                snap.telemetry = Some(car);
                Self::stamp(&mut snap, header);
            }
            DecodedPacket::CarStatus(p) => {
                let car = player_entry(&p.cars, player_index)?;
                let mut snap = self.inner.write();
                snap.status = Some(car);
                Self::stamp(&mut snap, header);
            }
            DecodedPacket::Unhandled { .. } => return Ok(None),
        }
        Ok(packet.kind())
    }

    fn stamp(snap: &mut TelemetrySnapshot, header: PacketHeader) {
        snap.header = Some(header);
        snap.applied += 1;
    }

    /// Consistent copy of every category, taken under one lock.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.inner.read().clone()
    }

    pub fn motion(&self) -> Option<CarMotionData> {
        self.inner.read().motion
    }

    pub fn lap(&self) -> Option<LapData> {
        self.inner.read().lap
    }

    pub fn telemetry(&self) -> Option<CarTelemetryData> {
        self.inner.read().telemetry
    }

    pub fn status(&self) -> Option<CarStatusData> {
        self.inner.read().status
    }

    pub fn session(&self) -> Option<SessionData> {
        self.inner.read().session
    }

    pub fn reset(&self) {
        *self.inner.write() = TelemetrySnapshot::default();
    }
}
