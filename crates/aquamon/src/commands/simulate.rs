//! `aquamon simulate`: serve a mock ESP32 fleet over WebSocket.
//!
//! One ticker produces a round of frames per interval and broadcasts them;
//! each client task greets its peer with `device_status: online` for every
//! device, then forwards broadcast frames until either side goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use aquamon_config::SimulatorSettings;

use crate::cli::{GlobalOpts, SimulateArgs};
use crate::config;
use crate::error::CliError;
use crate::simulator::{Fleet, online_messages};

/// Frames buffered per client before it counts as lagging.
const FRAME_BACKLOG: usize = 256;

/// How long clients get to receive their close frame on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

fn apply_overrides(mut sim: SimulatorSettings, args: &SimulateArgs) -> SimulatorSettings {
    if let Some(ref bind) = args.bind {
        sim.bind.clone_from(bind);
    }
    if let Some(ms) = args.interval_ms {
        sim.interval_ms = ms;
    }
    if !args.devices.is_empty() {
        sim.devices.clone_from(&args.devices);
    }
    if let Some(n) = args.heartbeat_every {
        sim.heartbeat_every = n;
    }
    sim
}

pub async fn handle(args: SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let sim = apply_overrides(cfg.simulator, &args);
    sim.validate().map_err(CliError::from_flag)?;
    if !(0.0..=1.0).contains(&args.excursion) {
        return Err(CliError::Validation {
            field: "excursion".into(),
            reason: format!("must be between 0.0 and 1.0, got {}", args.excursion),
        });
    }

    let addr = sim.bind_addr().map_err(CliError::from_flag)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| CliError::Bind {
            addr: sim.bind.clone(),
            source,
        })?;
    let local = listener.local_addr()?;

    if !global.quiet {
        eprintln!(
            "Simulating {} device(s) on ws://{local} every {}ms (Ctrl-C to stop)",
            sim.devices.len(),
            sim.interval_ms
        );
    }

    let devices: Arc<[String]> = sim.devices.clone().into();
    let mut fleet = Fleet::new(&sim.devices, args.seed, args.excursion, sim.heartbeat_every);
    let (frames, _) = broadcast::channel::<String>(FRAME_BACKLOG);
    let mut clients = JoinSet::new();

    let mut ticker = tokio::time::interval(sim.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    clients.spawn(serve_client(stream, peer, frames.subscribe(), Arc::clone(&devices)));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            _ = ticker.tick() => {
                for msg in fleet.tick() {
                    match msg.to_json() {
                        // No subscribers is fine; the round is simply not observed.
                        Ok(frame) => { let _ = frames.send(frame); }
                        Err(e) => warn!(error = %e, "could not encode simulated frame"),
                    }
                }
                debug!(round = fleet.round(), clients = frames.receiver_count(), "round sent");
                if args.rounds.is_some_and(|n| fleet.round() >= n) {
                    info!(rounds = fleet.round(), "round limit reached");
                    break;
                }
            }
            Some(joined) = clients.join_next(), if !clients.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "client task failed");
                }
            }
        }
    }

    // Closing the channel tells every client task to send a close frame.
    drop(frames);
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while clients.join_next().await.is_some() {}
    })
    .await;
    Ok(())
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut frames: broadcast::Receiver<String>,
    devices: Arc<[String]>,
) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    info!(%peer, "client connected");

    let (mut write, mut read) = ws.split();

    for msg in online_messages(&devices) {
        let Ok(text) = msg.to_json() else { continue };
        if write.send(Message::text(text)).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if write.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%peer, skipped, "client lagging, frames dropped");
                }
                Err(RecvError::Closed) => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    debug!(%peer, frame = %text.as_str(), "client message ignored");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(%peer, error = %e, "client read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!(%peer, "client disconnected");
}
