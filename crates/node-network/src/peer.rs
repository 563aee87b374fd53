//! One peer connection is two tasks (reader, writer) and a disconnect
//! signal shared between them. Writes to a peer never interleave freely:
//! they're serialized through three bounded priority queues so a flood of
//! low-priority gossip can't starve a `Pong` reply or a consensus message.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};

use crate::errors::NetworkError;
use crate::message::{read_frame, write_frame, Command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl From<Command> for Priority {
    fn from(command: Command) -> Self {
        match command {
            Command::Extensible | Command::Pong | Command::Ping => Priority::High,
            Command::Tx | Command::Block | Command::Inv | Command::GetData | Command::NotFound => Priority::Normal,
            Command::Version
            | Command::Verack
            | Command::GetAddr
            | Command::Addr
            | Command::GetHeaders
            | Command::Headers
            | Command::GetBlocksByIndex => Priority::Low,
        }
    }
}

struct QueuedMessage {
    command: Command,
    payload: Vec<u8>,
}

pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Owned by whatever holds the peer (the server's peer table). Cloneable
/// so broadcast fan-out can hand the same handle to multiple callers
/// without taking a lock on the whole peer set for each send.
#[derive(Clone)]
pub struct PeerHandle {
    pub address: SocketAddr,
    high: mpsc::Sender<QueuedMessage>,
    normal: mpsc::Sender<QueuedMessage>,
    low: mpsc::Sender<QueuedMessage>,
    cancel: watch::Sender<bool>,
}

pub struct PeerReceivers {
    high: mpsc::Receiver<QueuedMessage>,
    normal: mpsc::Receiver<QueuedMessage>,
    low: mpsc::Receiver<QueuedMessage>,
    cancel: watch::Receiver<bool>,
}

impl PeerReceivers {
    /// A second handle onto the same cancellation signal, for the reader
    /// task — the writer owns `self` directly, the reader needs its own
    /// clone of the watch channel.
    pub fn cancel_handle(&self) -> watch::Receiver<bool> {
        self.cancel.clone()
    }
}

pub fn peer_channel(address: SocketAddr, capacity: usize) -> (PeerHandle, PeerReceivers) {
    let (high_tx, high_rx) = mpsc::channel(capacity);
    let (normal_tx, normal_rx) = mpsc::channel(capacity);
    let (low_tx, low_rx) = mpsc::channel(capacity);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    (
        PeerHandle { address, high: high_tx, normal: normal_tx, low: low_tx, cancel: cancel_tx },
        PeerReceivers { high: high_rx, normal: normal_rx, low: low_rx, cancel: cancel_rx },
    )
}

impl PeerHandle {
    /// Backpressures per-queue: a full queue drops the send rather than
    /// blocking the caller (broadcast fan-out, handler dispatch), since a
    /// peer that can't keep up with its own priority tier is better served
    /// by disconnection than by stalling the whole node.
    pub fn send(&self, command: Command, payload: Vec<u8>) -> Result<(), NetworkError> {
        let queue = match Priority::from(command) {
            Priority::High => &self.high,
            Priority::Normal => &self.normal,
            Priority::Low => &self.low,
        };
        queue.try_send(QueuedMessage { command, payload }).map_err(|_| NetworkError::QueueClosed)
    }

    pub fn disconnect(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_disconnected(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Drains the three queues in strict priority order until the peer is
/// cancelled or the connection drops. `biased` on the select makes High
/// always win a simultaneous wake over Normal, and Normal over Low.
pub async fn writer_loop<W: AsyncWrite + Unpin>(mut writer: W, magic: u32, mut rx: PeerReceivers) {
    loop {
        let next = tokio::select! {
            biased;
            _ = rx.cancel.changed() => None,
            Some(m) = rx.high.recv() => Some(m),
            Some(m) = rx.normal.recv() => Some(m),
            Some(m) = rx.low.recv() => Some(m),
            else => None,
        };
        if *rx.cancel.borrow() {
            break;
        }
        let Some(message) = next else { break };
        if write_frame(&mut writer, magic, message.command, &message.payload).await.is_err() {
            break;
        }
    }
}

/// Reads frames until the peer is cancelled, the connection drops, or a
/// frame fails to decode; every received frame is forwarded to `inbound`
/// for the server's dispatch loop to handle.
pub async fn reader_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    magic: u32,
    address: SocketAddr,
    inbound: mpsc::Sender<(SocketAddr, Command, Vec<u8>)>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            frame = read_frame(&mut reader, magic) => {
                match frame {
                    Ok((command, payload)) => {
                        if inbound.send((address, command, payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(peer = %address, error = %e, "peer reader stopped");
                        break;
                    }
                }
            }
        }
        if *cancel.borrow() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    #[test]
    fn consensus_and_pong_are_high_priority() {
        assert_eq!(Priority::from(Command::Extensible), Priority::High);
        assert_eq!(Priority::from(Command::Pong), Priority::High);
    }

    #[test]
    fn tx_and_block_are_normal_priority() {
        assert_eq!(Priority::from(Command::Tx), Priority::Normal);
        assert_eq!(Priority::from(Command::Block), Priority::Normal);
    }

    #[test]
    fn discovery_messages_are_low_priority() {
        assert_eq!(Priority::from(Command::GetAddr), Priority::Low);
        assert_eq!(Priority::from(Command::Addr), Priority::Low);
    }

    #[tokio::test]
    async fn send_routes_to_the_matching_priority_queue() {
        let (handle, mut receivers) = peer_channel(addr(), 4);
        handle.send(Command::Ping, vec![1]).unwrap();
        handle.send(Command::GetAddr, vec![2]).unwrap();
        let high = receivers.high.try_recv().unwrap();
        assert_eq!(high.payload, vec![1]);
        let low = receivers.low.try_recv().unwrap();
        assert_eq!(low.payload, vec![2]);
    }

    #[tokio::test]
    async fn disconnect_is_observable_through_the_handle() {
        let (handle, _receivers) = peer_channel(addr(), 4);
        assert!(!handle.is_disconnected());
        handle.disconnect();
        assert!(handle.is_disconnected());
    }

    #[tokio::test]
    async fn writer_loop_stops_once_cancelled() {
        let (handle, receivers) = peer_channel(addr(), 4);
        let mut sink = Vec::new();
        handle.disconnect();
        writer_loop(&mut sink, 1, receivers).await;
        assert!(sink.is_empty());
    }
}
