//! Pending-call table correlating responses to callers by sequence number.
//!
//! Each entry is a single-shot channel. It is removed from the table the
//! moment it is fulfilled, failed or cancelled, so every call completes
//! exactly once.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::protocol::Message;

/// Completion signal for one call. `None` means the connection went away.
pub(crate) type PendingReceiver = oneshot::Receiver<Option<Message>>;

/// One outstanding call awaiting its response.
struct PendingCall {
    tx: oneshot::Sender<Option<Message>>,
}

impl PendingCall {
    fn fulfill(self, response: Option<Message>) {
        // The caller may have given up already.
        let _ = self.tx.send(response);
    }
}

/// Table of outstanding calls guarded by a single mutex.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: Mutex<HashMap<i64, PendingCall>>,
}

impl PendingCalls {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, PendingCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `seq` and return the receiver its response will arrive on.
    pub(crate) fn register(&self, seq: i64) -> PendingReceiver {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(seq, PendingCall { tx }).is_some() {
            tracing::warn!(seq, "sequence number reused while still pending");
        }
        rx
    }

    /// Deliver a response to its caller. Returns false if nobody waits for it.
    pub(crate) fn complete(&self, response: Message) -> bool {
        let call = self.lock().remove(&response.seq);
        match call {
            Some(call) => {
                call.fulfill(Some(response));
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `seq` without fulfilling it.
    pub(crate) fn cancel(&self, seq: i64) -> bool {
        self.lock().remove(&seq).is_some()
    }

    /// Fail every outstanding call. Returns how many were failed.
    pub(crate) fn fail_all(&self) -> usize {
        let drained: Vec<PendingCall> = self.lock().drain().map(|(_, call)| call).collect();
        let count = drained.len();
        for call in drained {
            call.fulfill(None);
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes a call's entry when the waiting future finishes or is dropped.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingCalls,
    seq: i64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingCalls, seq: i64) -> Self {
        Self { table, seq }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.cancel(self.seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Compression, Header, MessageType, Serialization};
    use bytes::Bytes;

    fn response(seq: i64, payload: &'static [u8]) -> Message {
        let header = Header::new(MessageType::Response, Compression::None, Serialization::Json);
        Message::response(header, seq, Bytes::from_static(payload))
    }

    #[tokio::test]
    async fn test_complete_delivers_to_matching_seq() {
        let table = PendingCalls::new();
        let rx1 = table.register(1);
        let rx2 = table.register(2);

        assert!(table.complete(response(2, b"two")));
        assert!(table.complete(response(1, b"one")));

        assert_eq!(rx1.await.unwrap().unwrap().payload, Bytes::from_static(b"one"));
        assert_eq!(rx2.await.unwrap().unwrap().payload, Bytes::from_static(b"two"));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_unknown_seq_is_not_delivered() {
        let table = PendingCalls::new();
        let _rx = table.register(1);

        assert!(!table.complete(response(99, b"")));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_fail_all_fulfills_once_with_none() {
        let table = PendingCalls::new();
        let receivers: Vec<_> = (0..5).map(|seq| table.register(seq)).collect();

        assert_eq!(table.fail_all(), 5);
        assert_eq!(table.fail_all(), 0);

        for rx in receivers {
            assert!(rx.await.unwrap().is_none());
        }
    }

    #[test]
    fn test_completed_entry_cannot_be_completed_again() {
        let table = PendingCalls::new();
        let _rx = table.register(7);

        assert!(table.complete(response(7, b"")));
        assert!(!table.complete(response(7, b"")));
    }

    #[test]
    fn test_guard_cancels_on_drop() {
        let table = PendingCalls::new();
        let _rx = table.register(3);
        {
            let _guard = PendingGuard::new(&table, 3);
            assert_eq!(table.len(), 1);
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_complete_after_receiver_dropped_is_harmless() {
        let table = PendingCalls::new();
        drop(table.register(4));
        assert!(table.complete(response(4, b"late")));
    }
}
