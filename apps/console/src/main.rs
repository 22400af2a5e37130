mod commands;
mod config;
mod session;

use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use commands::Command;
use config::AppConfig;
use session::AppSession;
use trail_ingest_core::{channel, ConnectionMonitor, EventRx, IngestError, IngestEvent, PacketStamp, ReceiverHandle};
use trail_ingest_f1::{F1Source, SnapshotStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::from_env();
    info!(bind = %cfg.f1.bind_addr, tick_hz = cfg.tick_hz, "starting trail recorder");

    let stamp = Arc::new(PacketStamp::new());
    let store = Arc::new(SnapshotStore::new());
    let monitor = ConnectionMonitor::new(stamp.clone()).with_timeout(cfg.link_timeout);
    let session = Arc::new(AppSession::new(cfg.history.clone(), monitor));

    let source = Arc::new(F1Source::new(cfg.f1.clone(), store.clone(), stamp));
    let (tx, rx) = channel();
    session.start(Instant::now());
    let receiver = ReceiverHandle::spawn(source, tx);
    let events = tokio::task::spawn_blocking(move || log_events(rx));

    let health = tokio::spawn(health_loop(session.clone()));
    let ticker = tokio::spawn(tick_loop(session.clone(), store, cfg.tick_period()));

    let (quit_tx, mut quit_rx) = mpsc::unbounded_channel::<()>();
    let stdin_session = session.clone();
    std::thread::spawn(move || read_commands(&stdin_session, &quit_tx));

    let exit = run_until_exit(&receiver, &mut quit_rx, ctrl_c()).await;
    info!(?exit, "shutting down");

    ticker.abort();
    health.abort();
    let stopped = shutdown(receiver, &session).await;
    if let Err(err) = events.await {
        warn!(%err, "event logger failed");
    }
    stopped?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Signal,
    Quit,
    ReceiverExited,
}

/// Waits for ctrl-c, a `quit` command or the receiver ending on its own.
/// A closed command channel (stdin at EOF) is not a quit request.
async fn run_until_exit<F>(receiver: &ReceiverHandle, quit: &mut mpsc::UnboundedReceiver<()>, signal: F) -> Exit
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = signal => Exit::Signal,
        Some(()) = quit.recv() => Exit::Quit,
        _ = receiver.finished() => Exit::ReceiverExited,
    }
}

/// Stops the receiver and marks the link disconnected, returning how the receiver ended.
async fn shutdown(receiver: ReceiverHandle, session: &AppSession) -> Result<(), IngestError> {
    let stopped = receiver.stop().await;
    session.stop();
    stopped
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn health_loop(session: Arc<AppSession>) {
    let mut every = tokio::time::interval(Duration::from_secs(1));
    loop {
        every.tick().await;
        session.poll_health(Instant::now());
    }
}

async fn tick_loop(session: Arc<AppSession>, store: Arc<SnapshotStore>, period: Duration) {
    let mut every = tokio::time::interval(period);
    every.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        every.tick().await;
        let snap = store.snapshot();
        if let Some(out) = session.tick(&snap, Instant::now()) {
            if let Some(lap) = out.lap_completed {
                debug!(lap = lap.lap_number, ms = lap.duration_ms, "lap time recorded");
            }
        }
    }
}

// ends once the receiver task drops its sender
fn log_events(rx: EventRx) {
    for event in rx.iter() {
        match event {
            IngestEvent::Listening { addr } => info!(%addr, "receiver ready"),
            IngestEvent::Dropped { reason } => debug!(%reason, "datagram dropped"),
            IngestEvent::SocketError { message } => warn!(%message, "socket error"),
            IngestEvent::Stopped => info!("receiver stopped"),
        }
    }
}

fn read_commands(session: &AppSession, quit: &mpsc::UnboundedSender<()>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, "stdin read failed");
                break;
            }
        };
        match commands::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => {
                let _ = quit.send(());
                return;
            }
            Ok(Some(cmd)) => match commands::execute(session, cmd) {
                Ok(text) => println!("{text}"),
                Err(err) => error!("{err:#}"),
            },
            Err(err) => println!("{err}"),
        }
    }
    debug!("stdin closed, commands disabled");
}
