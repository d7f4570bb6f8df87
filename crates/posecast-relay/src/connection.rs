//! Per-socket read loop and frame dispatch.
//!
//! Every accepted socket gets two tasks: this read loop, which owns the
//! read half and a stateful [`Decoder`], and a writer task, which owns the
//! write half and drains the client's outbound channel under the configured
//! write deadline. Splitting the halves means a viewer that stops reading
//! can never back-pressure the relay's inbound path. The outbound channel
//! is bounded at [`WRITE_QUEUE_DEPTH`] frames; a viewer that drains too
//! slowly to keep up is evicted at the next broadcast rather than growing
//! a backlog.
//!
//! A connection needs no login before mutating the registry: sensor hosts
//! speak `cbody`/`ubody`/`dbody` without ever logging in, and only a
//! `login` frame registers the connection as a viewer in the client table.
//! Malformed frames are dropped one at a time; only a socket-level error
//! (or shutdown) ends the connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, watch};

use posecast_proto::{Decoder, Frame, encode};

use crate::clients::{ClientTable, SlotIndex};
use crate::registry::{BodyId, BodyRegistry, RegistryError};
use crate::skeleton::SkeletonVariant;

/// Most frames a viewer may have queued before it counts as wedged. Two
/// seconds of full-rate pose traffic for a handful of bodies.
pub const WRITE_QUEUE_DEPTH: usize = 2048;

/// Read loop for one accepted socket. Runs until EOF, a read error, or
/// server shutdown; never takes the process down.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<BodyRegistry>,
    clients: Arc<ClientTable>,
    write_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (mut read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);
    tokio::spawn(writer_loop(
        write_half,
        rx,
        write_timeout,
        shutdown_rx.clone(),
        peer,
    ));

    let mut decoder = Decoder::new();
    let mut slot: Option<SlotIndex> = None;
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            result = read_half.read(&mut buf) => {
                match result {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        for parsed in decoder.push(&buf[..n]) {
                            match parsed {
                                Ok(frame) => {
                                    dispatch_frame(frame, peer, &mut slot, &tx, &registry, &clients)
                                        .await;
                                }
                                Err(e) => {
                                    tracing::debug!("Dropping malformed frame from {peer}: {e}");
                                }
                            }
                        }
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    if let Some(slot) = slot {
        clients.remove(slot).await;
        tracing::info!("Viewer at {peer} disconnected (slot {})", slot.0);
    } else {
        tracing::debug!("Connection from {peer} closed");
    }
}

/// Route one decoded frame to the registry or client table.
async fn dispatch_frame(
    frame: Frame,
    peer: SocketAddr,
    slot: &mut Option<SlotIndex>,
    tx: &mpsc::Sender<Arc<str>>,
    registry: &BodyRegistry,
    clients: &ClientTable,
) {
    match frame {
        Frame::Login { name } => {
            if slot.is_some() {
                tracing::warn!("Duplicate login from {peer}, ignoring");
                return;
            }
            match clients.add(name.clone(), peer, tx.clone()).await {
                Ok(assigned) => {
                    tracing::info!("Viewer '{name}' at {peer} took slot {}", assigned.0);
                    *slot = Some(assigned);
                    // Catch-up dump: one appeared-frame per live body, so a
                    // late joiner converges before the next list tick.
                    for id in registry.population().await {
                        let frame = encode(&Frame::BodyAppeared { body_id: id.0 });
                        let _ = tx.send(Arc::from(frame)).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("Rejecting login '{name}' from {peer}: {e}");
                }
            }
        }
        Frame::CreateBody { body_id } => {
            let variant = SkeletonVariant::for_tracking_id(&body_id);
            match registry.create_body(BodyId(body_id), variant).await {
                Ok(()) => {}
                Err(e @ RegistryError::AlreadyExists { .. }) => {
                    // Duplicate creates are a no-op by design.
                    tracing::debug!("{e}");
                }
                Err(e) => tracing::warn!("Create from {peer} rejected: {e}"),
            }
        }
        Frame::RemoveBody { body_id } => {
            if let Err(e) = registry.remove_body(&BodyId(body_id)).await {
                tracing::debug!("Remove from {peer} ignored: {e}");
            }
        }
        Frame::UpdateJoint {
            body_id,
            joint,
            pos,
            rot,
            inferred,
        } => {
            if let Err(e) = registry
                .update_joint(
                    &BodyId(body_id),
                    &joint,
                    pos.map(|v| v.value()),
                    rot.map(|v| v.value()),
                    inferred,
                )
                .await
            {
                tracing::debug!("Update from {peer} ignored: {e}");
            }
        }
        Frame::BodyAppeared { .. }
        | Frame::BodyRemoved { .. }
        | Frame::Pose { .. }
        | Frame::Population { .. } => {
            tracing::warn!("Server-direction frame from {peer}, dropping");
        }
    }
}

/// Writer task for one connection. Owns the socket write half and applies
/// the write deadline; a slow or wedged peer is dropped here, not in the
/// broadcast tick.
async fn writer_loop(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Arc<str>>,
    write_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    peer: SocketAddr,
) {
    loop {
        tokio::select! {
            payload = rx.recv() => {
                let Some(payload) = payload else { break };
                match tokio::time::timeout(write_timeout, write_half.write_all(payload.as_bytes()))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!("Write to {peer} failed: {e}");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!("Write to {peer} exceeded {write_timeout:?}, dropping");
                        break;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
