use std::io;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};
use trail_ingest_core::*;

pub mod codec;
pub mod packets;
pub mod store;

#[cfg(test)]
mod fixtures;

pub use codec::{decode, DecodeError};
pub use packets::*;
pub use store::{SnapshotStore, StoreError, TelemetrySnapshot};

#[derive(Clone, Debug)]
pub struct F1Config {
    pub bind_addr: String,    // e.g. "0.0.0.0:20777"
    pub recv_buffer: usize,
}

impl Default for F1Config {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:20777".into(), recv_buffer: 2048 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DatagramError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// UDP listener for F1 24 telemetry. Decodes every datagram into the shared store.
pub struct F1Source {
    cfg: F1Config,
    store: Arc<SnapshotStore>,
    stamp: Arc<PacketStamp>,
}

impl F1Source {
    pub fn new(cfg: F1Config, store: Arc<SnapshotStore>, stamp: Arc<PacketStamp>) -> Self {
        Self { cfg, store, stamp }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Decodes one datagram, stamps the link and applies it for the player's car.
    pub fn handle_datagram(&self, buf: &[u8], now: Instant) -> Result<Option<PacketKind>, DatagramError> {
        let packet = decode(buf)?;
        self.stamp.record(now);
        let player = packet.header().player_car_index;
        Ok(self.store.apply(&packet, player)?)
    }

    fn on_datagram(&self, buf: &[u8], tx: &EventTx) {
        match self.handle_datagram(buf, Instant::now()) {
            Ok(_) => {}
            Err(DatagramError::Decode(DecodeError::UnsupportedFormat(format))) => {
                trace!(format, "ignoring packet from another protocol year");
            }
            Err(err @ DatagramError::Decode(_)) => {
                debug!(%err, len = buf.len(), "dropping datagram");
                let _ = tx.send(IngestEvent::Dropped { reason: err.to_string() });
            }
            Err(err @ DatagramError::Store(_)) => {
                warn!(%err, "skipping category update");
                let _ = tx.send(IngestEvent::Dropped { reason: err.to_string() });
            }
        }
    }
}

// what a socket reports when it is torn down under a pending receive
fn is_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::NotConnected
    )
}

/// Decides whether a failed receive ends the loop. Only a closed socket
/// during shutdown does; anything else is reported and skipped.
fn on_recv_error(err: &io::Error, stopping: bool, tx: &EventTx) -> ControlFlow<()> {
    if stopping && is_closed(err) {
        debug!(%err, "socket closed, stopping receive loop");
        return ControlFlow::Break(());
    }
    warn!(%err, "telemetry receive failed");
    let _ = tx.send(IngestEvent::SocketError { message: err.to_string() });
    ControlFlow::Continue(())
}

#[async_trait::async_trait]
impl TelemetrySource for F1Source {
    async fn run(&self, tx: EventTx, mut stop: StopSignal) -> Result<(), IngestError> {
        let socket = UdpSocket::bind(&self.cfg.bind_addr).await
            .map_err(|source| IngestError::Bind { addr: self.cfg.bind_addr.clone(), source })?;
        let addr = socket.local_addr().context("query bound address")?;
        info!(%addr, "listening for F1 telemetry");
        let _ = tx.send(IngestEvent::Listening { addr });

        let mut buf = vec![0u8; self.cfg.recv_buffer];
        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                recv = socket.recv_from(&mut buf) => match recv {
                    Ok((len, _peer)) => self.on_datagram(&buf[..len], &tx),
                    Err(err) => {
                        if on_recv_error(&err, stop.is_stopped(), &tx).is_break() {
                            break;
                        }
                    }
                }
            }
        }
        info!(%addr, "F1 telemetry listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use std::time::Duration;

    fn source() -> (F1Source, Arc<PacketStamp>) {
        let stamp = Arc::new(PacketStamp::new());
        let cfg = F1Config { bind_addr: "127.0.0.1:0".into(), ..F1Config::default() };
        (F1Source::new(cfg, Arc::new(SnapshotStore::new()), stamp.clone()), stamp)
    }

    #[test]
    fn test_handle_datagram_applies_and_stamps() {
        let (src, stamp) = source();
        let kind = src.handle_datagram(&motion_packet(3, 7.0, 0.0, 8.0), Instant::now()).unwrap();
        assert_eq!(kind, Some(PacketKind::Motion));
        assert_eq!(stamp.count(), 1);
        assert_eq!(src.store().motion().map(|m| m.world_position_z), Some(8.0));
    }

    #[test]
    fn test_other_year_is_not_stamped() {
        let (src, stamp) = source();
        let mut buf = motion_packet(0, 1.0, 0.0, 1.0);
        put_u16(&mut buf, 0, 2023);
        let err = src.handle_datagram(&buf, Instant::now()).unwrap_err();
        assert_eq!(err, DatagramError::Decode(DecodeError::UnsupportedFormat(2023)));
        assert_eq!(stamp.count(), 0);
        assert!(src.store().motion().is_none());
    }

    #[test]
    fn test_unhandled_packet_still_counts_as_traffic() {
        let (src, stamp) = source();
        let kind = src.handle_datagram(&header_bytes(PACKET_FORMAT_2024, 3, 0), Instant::now()).unwrap();
        assert_eq!(kind, None);
        assert_eq!(stamp.count(), 1);
    }

    #[test]
    fn test_spectator_index_reports_error() {
        let (src, stamp) = source();
        let mut buf = lap_packet(0, 1, 10.0, 0);
        put_u8(&mut buf, 27, 255);
        let err = src.handle_datagram(&buf, Instant::now()).unwrap_err();
        assert_eq!(err, DatagramError::Store(StoreError::IndexOutOfRange { index: 255, len: MAX_CARS }));
        assert_eq!(stamp.count(), 1);
        assert!(src.store().lap().is_none());
    }

    #[test]
    fn test_closed_socket_while_stopping_ends_loop() {
        let (tx, rx) = channel();
        for kind in [io::ErrorKind::ConnectionReset, io::ErrorKind::ConnectionAborted, io::ErrorKind::NotConnected] {
            let err = io::Error::new(kind, "closed");
            assert_eq!(on_recv_error(&err, true, &tx), ControlFlow::Break(()));
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reset_while_running_is_reported() {
        // e.g. an ICMP port-unreachable surfacing on the next receive
        let (tx, rx) = channel();
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "peer reset");
        assert_eq!(on_recv_error(&err, false, &tx), ControlFlow::Continue(()));
        assert_eq!(rx.try_recv(), Ok(IngestEvent::SocketError { message: "peer reset".into() }));
    }

    #[test]
    fn test_other_errors_never_end_loop() {
        let (tx, rx) = channel();
        let err = io::Error::new(io::ErrorKind::Other, "buffer trouble");
        assert_eq!(on_recv_error(&err, true, &tx), ControlFlow::Continue(()));
        assert_eq!(on_recv_error(&err, false, &tx), ControlFlow::Continue(()));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, IngestEvent::SocketError { message } if message == "buffer trouble")));
    }

    #[tokio::test]
    async fn test_bind_conflict_names_address() {
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let cfg = F1Config { bind_addr: addr.clone(), ..F1Config::default() };
        let src = F1Source::new(cfg, Arc::new(SnapshotStore::new()), Arc::new(PacketStamp::new()));
        let (tx, _rx) = channel();
        let (_stop_tx, stop) = StopSignal::pair();
        match src.run(tx, stop).await {
            Err(IngestError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            other => panic!("expected bind error, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_udp_round_trip_and_stop() {
        let (src, stamp) = source();
        let src = Arc::new(src);
        let (tx, rx) = channel();
        let handle = ReceiverHandle::spawn(src.clone(), tx);

        let addr = match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(IngestEvent::Listening { addr }) => addr,
            other => panic!("expected listening event, got {:?}", other),
        };

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[1, 2, 3], addr).await.unwrap();
        sender.send_to(&lap_packet(0, 4, 321.0, 0), addr).await.unwrap();

        let mut waited = 0;
        while src.store().lap().is_none() && waited < 200 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += 1;
        }
        assert_eq!(src.store().lap().map(|l| l.current_lap_num), Some(4));
        assert!(stamp.count() >= 1);

        handle.stop().await.unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.last(), Some(&IngestEvent::Stopped));
        assert!(events.iter().any(|e| matches!(e, IngestEvent::Dropped { .. })));

        // the port is free again once stop returns
        let rebound = std::net::UdpSocket::bind(addr);
        assert!(rebound.is_ok());
    }
}
