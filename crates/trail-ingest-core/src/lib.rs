//! Core ingest plumbing shared by telemetry sources

use std::net::SocketAddr;

pub mod health;
pub mod receiver;

pub use health::{ConnectionMonitor, ConnectionState, PacketStamp, DEFAULT_LINK_TIMEOUT};
pub use receiver::{ReceiverHandle, StopSignal};

/// Status events a running source reports to whoever consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Listening { addr: SocketAddr },
    /// A datagram was received but could not be used.
    Dropped { reason: String },
    SocketError { message: String },
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("cannot bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Msg(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EventTx = crossbeam_channel::Sender<IngestEvent>;
pub type EventRx = crossbeam_channel::Receiver<IngestEvent>;

/// Trait for any live source connector
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Runs until `stop` fires. Returning means the underlying socket is released.
    async fn run(&self, tx: EventTx, stop: StopSignal) -> Result<(), IngestError>;
}

pub fn channel() -> (EventTx, EventRx) {
    crossbeam_channel::unbounded()
}
