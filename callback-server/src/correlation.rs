//! Correlation of asynchronous responses with the requests waiting on them.
//!
//! A read issued against the device cloud is answered with an async-response
//! id; the value itself arrives later on the notification callback. The
//! [`CorrelationTable`] keeps one waiter per outstanding id and hands the
//! payload to whoever registered it.
//!
//! Each waiter is a `oneshot` channel whose sender lives in the table. The
//! table lock is the single point where resolution and timeout race: whoever
//! removes the waiter first wins, the other side observes its absence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::CorrelationError;

/// Table entry for one outstanding async response.
struct PendingWaiter {
    /// Registration sequence number, distinguishes re-registrations of an id
    seq: u64,
    created_at: Instant,
    sender: oneshot::Sender<Bytes>,
}

#[derive(Default)]
struct TableInner {
    waiters: HashMap<String, PendingWaiter>,
    next_seq: u64,
}

impl TableInner {
    /// Remove the waiter for `id` only if it still belongs to registration `seq`.
    fn withdraw(&mut self, id: &str, seq: u64) -> bool {
        match self.waiters.get(id) {
            Some(waiter) if waiter.seq == seq => {
                self.waiters.remove(id);
                true
            }
            _ => false,
        }
    }
}

/// Maps async-response ids to the requests waiting for them.
///
/// Cloning is cheap; all clones share the same table.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bytes::Bytes;
/// use callback_server::CorrelationTable;
///
/// # #[tokio::main]
/// # async fn main() {
/// let table = CorrelationTable::new();
/// let handle = table.register("r1");
///
/// assert!(table.resolve("r1", Bytes::from_static(&[0, 5])));
/// let payload = table.wait(handle, Duration::from_secs(5)).await.unwrap();
/// assert_eq!(&payload[..], &[0, 5]);
/// # }
/// ```
#[derive(Clone, Default)]
pub struct CorrelationTable {
    inner: Arc<Mutex<TableInner>>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` and return the handle used to await it.
    ///
    /// The device cloud assigns ids uniquely, so a duplicate should not
    /// happen. If it does, the newer registration replaces the older one and
    /// the older awaiter observes [`CorrelationError::Superseded`].
    pub fn register(&self, id: impl Into<String>) -> WaiterHandle {
        let id = id.into();
        let (sender, receiver) = oneshot::channel();
        let created_at = Instant::now();

        let seq = {
            let mut inner = self.inner.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;

            let previous = inner.waiters.insert(
                id.clone(),
                PendingWaiter {
                    seq,
                    created_at,
                    sender,
                },
            );
            if previous.is_some() {
                tracing::warn!(
                    async_response_id = %id,
                    "Duplicate async-response id registered, replacing previous waiter"
                );
            }
            seq
        };

        tracing::trace!(async_response_id = %id, seq, "Registered waiter");

        WaiterHandle {
            id,
            seq,
            created_at,
            receiver,
            table: Arc::clone(&self.inner),
        }
    }

    /// Fulfil the waiter registered for `id` with `payload`.
    ///
    /// # Returns
    ///
    /// `true` if a waiter was registered and has been removed, `false` if no
    /// waiter exists (late, duplicate, or already timed out).
    pub fn resolve(&self, id: &str, payload: Bytes) -> bool {
        let mut inner = self.inner.lock();
        let Some(waiter) = inner.waiters.remove(id) else {
            return false;
        };

        // Sent under the lock so a racing timeout that fails to withdraw the
        // waiter is guaranteed to find the payload in the channel.
        let delivered = waiter.sender.send(payload).is_ok();
        drop(inner);

        tracing::debug!(
            async_response_id = %id,
            elapsed_ms = waiter.created_at.elapsed().as_millis() as u64,
            delivered,
            "Resolved waiter"
        );
        true
    }

    /// Wait for the payload of `handle`, giving up after `timeout`.
    ///
    /// On timeout the waiter is removed so a late [`resolve`](Self::resolve)
    /// for the same id becomes a no-op.
    pub async fn wait(
        &self,
        handle: WaiterHandle,
        timeout: Duration,
    ) -> Result<Bytes, CorrelationError> {
        handle.wait(timeout).await
    }

    /// Number of waiters currently registered.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Whether a waiter is registered for `id`.
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.lock().waiters.contains_key(id)
    }
}

/// The awaiting side of one registration in a [`CorrelationTable`].
///
/// Dropping the handle withdraws its waiter from the table, so abandoned
/// requests do not leave entries behind.
pub struct WaiterHandle {
    id: String,
    seq: u64,
    created_at: Instant,
    receiver: oneshot::Receiver<Bytes>,
    table: Arc<Mutex<TableInner>>,
}

impl WaiterHandle {
    /// The async-response id this handle waits for.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the waiter was registered.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Wait for the payload, giving up after `timeout`.
    pub async fn wait(mut self, timeout: Duration) -> Result<Bytes, CorrelationError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(CorrelationError::Superseded {
                id: self.id.clone(),
            }),
            Err(_) => {
                if self.withdraw() {
                    tracing::debug!(async_response_id = %self.id, "Waiter timed out");
                    return Err(CorrelationError::Timeout {
                        id: self.id.clone(),
                        waited: timeout,
                    });
                }

                // A resolve removed the waiter between the deadline firing
                // and us taking the lock: the payload is already in the channel.
                self.receiver
                    .try_recv()
                    .map_err(|_| CorrelationError::Superseded {
                        id: self.id.clone(),
                    })
            }
        }
    }

    fn withdraw(&self) -> bool {
        self.table.lock().withdraw(&self.id, self.seq)
    }
}

impl Drop for WaiterHandle {
    fn drop(&mut self) {
        self.withdraw();
    }
}

impl std::fmt::Debug for WaiterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaiterHandle")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .finish()
    }
}
