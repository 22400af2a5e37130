use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{EventTx, IngestError, IngestEvent, TelemetrySource};

/// Cooperative stop flag observed by a running source between datagrams.
#[derive(Clone, Debug)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn pair() -> (watch::Sender<bool>, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (tx, StopSignal { rx })
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested. A dropped sender counts as a stop.
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            debug!("stop sender dropped");
        }
    }
}

/// Owns a spawned source task.
pub struct ReceiverHandle {
    stop_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
    task: JoinHandle<Result<(), IngestError>>,
}

impl ReceiverHandle {
    pub fn spawn<S: TelemetrySource + 'static>(source: Arc<S>, tx: EventTx) -> Self {
        let (stop_tx, stop) = StopSignal::pair();
        let (done_tx, done_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let result = source.run(tx.clone(), stop).await;
            if let Err(err) = &result {
                warn!(%err, "telemetry source exited with error");
            }
            let _ = tx.send(IngestEvent::Stopped);
            done_tx.send_replace(true);
            result
        });
        Self { stop_tx, done_rx, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolves once the source has returned, whether asked to or not.
    /// The outcome is still collected by [`ReceiverHandle::stop`].
    pub async fn finished(&self) {
        let mut done = self.done_rx.clone();
        // a dropped sender means the task is gone too
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// Signals the source and waits for its task, so the socket is closed on return.
    pub async fn stop(self) -> Result<(), IngestError> {
        // the receiver is gone only if the task already finished
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(IngestError::Msg(format!("receiver task failed: {err}"))),
        }
    }
}
