//! Connected-viewer table with stable, reused slot indices.
//!
//! Each connected viewer occupies one slot. Removal leaves a hole rather
//! than compacting, so slot indices stay stable for the lifetime of a
//! connection; a later add fills the first free hole (first-free-wins),
//! bounding the table to the high-water mark of concurrent viewers.
//!
//! The table never touches sockets directly. Each entry holds the sending
//! half of the client's bounded writer channel; the per-client writer task
//! (see `connection.rs`) owns the socket write half and applies the write
//! deadline. Broadcasts use `try_send`, so a viewer whose queue is full or
//! whose writer task is gone is evicted mid-broadcast without aborting
//! delivery to the rest, and no viewer can hold more than a queue's worth
//! of undelivered frames.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};

/// Stable table index assigned to a connected viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIndex(pub usize);

/// Error returned when the viewer table is at capacity.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("client table is full ({max} slots)")]
pub struct ClientTableError {
    /// The configured maximum.
    pub max: usize,
}

/// One connected viewer.
struct Client {
    name: String,
    addr: SocketAddr,
    tx: mpsc::Sender<Arc<str>>,
}

/// Thread-safe table of connected viewers.
pub struct ClientTable {
    slots: RwLock<Vec<Option<Client>>>,
    max_clients: usize,
}

impl ClientTable {
    /// Create an empty table with the given capacity limit.
    pub fn new(max_clients: usize) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            max_clients,
        }
    }

    /// Register a viewer, reusing the first free slot or appending.
    pub async fn add(
        &self,
        name: String,
        addr: SocketAddr,
        tx: mpsc::Sender<Arc<str>>,
    ) -> Result<SlotIndex, ClientTableError> {
        let mut slots = self.slots.write().await;

        if slots.iter().flatten().count() >= self.max_clients {
            return Err(ClientTableError {
                max: self.max_clients,
            });
        }

        let client = Client { name, addr, tx };
        let slot = match slots.iter().position(Option::is_none) {
            Some(free) => {
                slots[free] = Some(client);
                SlotIndex(free)
            }
            None => {
                slots.push(Some(client));
                SlotIndex(slots.len() - 1)
            }
        };
        Ok(slot)
    }

    /// Free a slot. The table is never compacted.
    pub async fn remove(&self, slot: SlotIndex) {
        let mut slots = self.slots.write().await;
        if let Some(entry) = slots.get_mut(slot.0) {
            *entry = None;
        }
    }

    /// Queue a frame for every live viewer.
    ///
    /// A slot whose writer task has exited, or whose queue is already full,
    /// is evicted here; the remaining viewers still receive the frame.
    pub async fn broadcast(&self, payload: Arc<str>) {
        let mut slots = self.slots.write().await;
        for entry in slots.iter_mut() {
            if let Some(client) = entry
                && let Err(e) = client.tx.try_send(Arc::clone(&payload))
            {
                let reason = match e {
                    TrySendError::Full(_) => "write queue full",
                    TrySendError::Closed(_) => "writer gone",
                };
                tracing::warn!(
                    "Dropping viewer '{}' at {}: {reason}",
                    client.name,
                    client.addr
                );
                *entry = None;
            }
        }
    }

    /// Number of occupied slots.
    pub async fn count(&self) -> usize {
        self.slots.read().await.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn sender() -> (mpsc::Sender<Arc<str>>, mpsc::Receiver<Arc<str>>) {
        mpsc::channel(8)
    }

    #[tokio::test]
    async fn test_slots_assigned_in_order() {
        let table = ClientTable::new(8);
        for i in 0..3u16 {
            let (tx, _rx) = sender();
            let slot = table.add(format!("v{i}"), addr(1000 + i), tx).await.unwrap();
            assert_eq!(slot, SlotIndex(usize::from(i)));
        }
        assert_eq!(table.count().await, 3);
    }

    #[tokio::test]
    async fn test_first_free_slot_reused() {
        let table = ClientTable::new(8);
        let mut rxs = Vec::new();
        for i in 0..3u16 {
            let (tx, rx) = sender();
            rxs.push(rx);
            table.add(format!("v{i}"), addr(1000 + i), tx).await.unwrap();
        }

        table.remove(SlotIndex(1)).await;
        assert_eq!(table.count().await, 2);

        let (tx, _rx) = sender();
        let slot = table.add("late".into(), addr(2000), tx).await.unwrap();
        assert_eq!(slot, SlotIndex(1));
        assert_eq!(table.count().await, 3);
    }

    #[tokio::test]
    async fn test_append_when_no_hole() {
        let table = ClientTable::new(8);
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();
        table.add("a".into(), addr(1), tx1).await.unwrap();
        let slot = table.add("b".into(), addr(2), tx2).await.unwrap();
        assert_eq!(slot, SlotIndex(1));
    }

    #[tokio::test]
    async fn test_capacity_rejects_add() {
        let table = ClientTable::new(1);
        let (tx1, _rx1) = sender();
        table.add("a".into(), addr(1), tx1).await.unwrap();

        let (tx2, _rx2) = sender();
        let err = table.add("b".into(), addr(2), tx2).await.unwrap_err();
        assert_eq!(err, ClientTableError { max: 1 });
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_live_slots() {
        let table = ClientTable::new(8);
        let (tx1, mut rx1) = sender();
        let (tx2, mut rx2) = sender();
        table.add("a".into(), addr(1), tx1).await.unwrap();
        table.add("b".into(), addr(2), tx2).await.unwrap();

        table.broadcast(Arc::from("*6,42*")).await;

        assert_eq!(&*rx1.recv().await.unwrap(), "*6,42*");
        assert_eq!(&*rx2.recv().await.unwrap(), "*6,42*");
    }

    #[tokio::test]
    async fn test_broadcast_evicts_dead_writer_without_aborting() {
        let table = ClientTable::new(8);
        let (tx1, rx1) = sender();
        let (tx2, mut rx2) = sender();
        table.add("dead".into(), addr(1), tx1).await.unwrap();
        table.add("live".into(), addr(2), tx2).await.unwrap();

        drop(rx1); // writer task gone

        table.broadcast(Arc::from("*1,42*")).await;
        assert_eq!(table.count().await, 1);
        assert_eq!(&*rx2.recv().await.unwrap(), "*1,42*");

        // The freed slot is reusable.
        let (tx3, _rx3) = sender();
        let slot = table.add("next".into(), addr(3), tx3).await.unwrap();
        assert_eq!(slot, SlotIndex(0));
    }

    #[tokio::test]
    async fn test_broadcast_evicts_backlogged_writer() {
        let table = ClientTable::new(8);
        let (tx, _rx) = mpsc::channel(1);
        table.add("slow".into(), addr(1), tx).await.unwrap();

        // First frame fills the queue; the undrained second one evicts.
        table.broadcast(Arc::from("*6,1*")).await;
        assert_eq!(table.count().await, 1);
        table.broadcast(Arc::from("*6,2*")).await;
        assert_eq!(table.count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_and_ignores_bad_index() {
        let table = ClientTable::new(8);
        table.remove(SlotIndex(5)).await;
        let (tx, _rx) = sender();
        let slot = table.add("a".into(), addr(1), tx).await.unwrap();
        table.remove(slot).await;
        table.remove(slot).await;
        assert_eq!(table.count().await, 0);
    }
}
