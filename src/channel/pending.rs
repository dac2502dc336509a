//! Pending request bookkeeping.
//!
//! Each in-flight request owns one settlement: a completion sender plus a
//! timeout timer. Whichever of response, timeout, or connection loss gets
//! to the settlement first removes it from the map and completes it; later
//! triggers find nothing and do nothing.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::Response;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to their settlements.
type SettlementMap = FxHashMap<RequestId, Settlement>;

/// One outstanding request.
struct Settlement {
    /// Request event name, for logging.
    event: String,
    /// Transport generation the request was issued on.
    generation: u64,
    /// Completes the caller's future.
    sender: oneshot::Sender<Result<Response>>,
    /// Timeout task, aborted on settlement.
    timer: Option<JoinHandle<()>>,
}

impl Settlement {
    /// Completes the settlement, cancelling its timer.
    fn complete(mut self, outcome: Result<Response>) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        // The caller may have dropped its future
        let _ = self.sender.send(outcome);
    }
}

// ============================================================================
// PendingRequests
// ============================================================================

/// Shared map of outstanding requests.
#[derive(Clone, Default)]
pub(crate) struct PendingRequests {
    inner: Arc<Mutex<SettlementMap>>,
}

impl PendingRequests {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request and starts its timeout.
    ///
    /// Must be called within a tokio runtime.
    pub fn register(
        &self,
        id: RequestId,
        event: &str,
        generation: u64,
        timeout: Duration,
    ) -> ResponseFuture {
        let (sender, receiver) = oneshot::channel();

        self.inner.lock().insert(
            id,
            Settlement {
                event: event.to_string(),
                generation,
                sender,
                timer: None,
            },
        );

        // Started after insertion so an instant expiry still finds the entry
        let timer = self.spawn_timer(id, timeout);
        match self.inner.lock().get_mut(&id) {
            Some(settlement) => settlement.timer = Some(timer),
            None => timer.abort(),
        }

        ResponseFuture { id, receiver }
    }

    fn spawn_timer(&self, id: RequestId, timeout: Duration) -> JoinHandle<()> {
        let pending = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            pending.expire(id, timeout);
        })
    }

    /// Completes the matching request with a response.
    ///
    /// Gives the response back when no request with its id is pending.
    pub fn settle(&self, response: Response) -> std::result::Result<(), Response> {
        let Some(settlement) = self.inner.lock().remove(&response.id) else {
            return Err(response);
        };

        debug!(request_id = %response.id, event = %settlement.event, success = response.is_success(), "Response received");
        settlement.complete(response.into_result());
        Ok(())
    }

    /// Fails one request with `error`. Returns `false` if it was not pending.
    pub fn reject(&self, id: RequestId, error: Error) -> bool {
        let Some(settlement) = self.inner.lock().remove(&id) else {
            return false;
        };
        settlement.complete(Err(error));
        true
    }

    /// Times out one request. Returns `false` if it was already settled.
    pub fn expire(&self, id: RequestId, timeout: Duration) -> bool {
        let Some(mut settlement) = self.inner.lock().remove(&id) else {
            return false;
        };

        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        warn!(request_id = %id, event = %settlement.event, timeout_ms, "Request timed out");

        // Running inside the timer; nothing to abort
        settlement.timer = None;
        settlement.complete(Err(Error::request_timeout(id, timeout_ms)));
        true
    }

    /// Fails every request issued on `generation` or earlier with
    /// [`Error::ConnectionClosed`]. Returns how many were failed.
    pub fn reject_through(&self, generation: u64) -> usize {
        let rejected: Vec<Settlement> = {
            let mut map = self.inner.lock();
            let ids: Vec<RequestId> = map
                .iter()
                .filter(|(_, s)| s.generation <= generation)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| map.remove(&id)).collect()
        };

        let count = rejected.len();
        for settlement in rejected {
            settlement.complete(Err(Error::ConnectionClosed));
        }
        count
    }

    /// Returns the number of pending requests.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if `id` is pending.
    #[cfg(test)]
    pub fn contains(&self, id: RequestId) -> bool {
        self.inner.lock().contains_key(&id)
    }
}

// ============================================================================
// ResponseFuture
// ============================================================================

/// Future returned by [`Channel::request`](crate::Channel::request).
///
/// The request is registered, sent, and timed from the moment it is
/// created; awaiting only observes the outcome. Dropping the future does
/// not cancel the request, whose settlement is still cleared by response,
/// timeout, or connection loss.
#[derive(Debug)]
#[must_use = "the outcome of the request is only observable by awaiting it"]
pub struct ResponseFuture {
    /// Request this future waits on.
    id: RequestId,
    /// Completion from the settlement.
    receiver: oneshot::Receiver<Result<Response>>,
}

impl ResponseFuture {
    /// Returns the id assigned to the request.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::ConnectionClosed)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready, task};
    use tokio_tungstenite::tungstenite::Error as WsError;

    const LONG: Duration = Duration::from_secs(60);

    fn response(id: u64, body: serde_json::Value) -> Response {
        let mut value = body;
        value["id"] = json!(id);
        serde_json::from_value(value).expect("response")
    }

    #[tokio::test]
    async fn test_settle_resolves_once() {
        let pending = PendingRequests::new();
        let future = pending.register(RequestId::new(1), "get_status", 1, LONG);
        assert_eq!(future.id(), RequestId::new(1));
        assert_eq!(pending.len(), 1);

        let ok = response(1, json!({"success": true, "data": {"ok": true}}));
        assert!(pending.settle(ok.clone()).is_ok());
        assert_eq!(pending.len(), 0);

        // Second trigger is a no-op
        assert!(pending.settle(ok).is_err());
        assert!(!pending.expire(RequestId::new(1), LONG));
        assert_eq!(pending.reject_through(u64::MAX), 0);

        let resolved = future.await.expect("resolved");
        assert!(resolved.get_bool("ok"));
    }

    #[tokio::test]
    async fn test_out_of_order_responses() {
        let pending = PendingRequests::new();
        let a = pending.register(RequestId::new(1), "a", 1, LONG);
        let b = pending.register(RequestId::new(2), "b", 1, LONG);

        assert!(pending.settle(response(2, json!({"data": "B"}))).is_ok());
        assert!(pending.settle(response(1, json!({"data": "A"}))).is_ok());

        assert_eq!(a.await.expect("a").data, Some(json!("A")));
        assert_eq!(b.await.expect("b").data, Some(json!("B")));
    }

    #[tokio::test]
    async fn test_refusal_rejects() {
        let pending = PendingRequests::new();
        let future = pending.register(RequestId::new(5), "fleet_reboot_kiosk", 1, LONG);

        let refused = response(5, json!({"success": false, "errors": ["no permission"]}));
        assert!(pending.settle(refused).is_ok());

        let err = future.await.expect_err("refused");
        assert!(err.is_request_failed());
        assert_eq!(err.to_string(), "no permission");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rejects_and_untracks() {
        let pending = PendingRequests::new();
        let future = pending.register(RequestId::new(1), "slow_op", 1, LONG);
        let mut future = task::spawn(future);

        tokio::time::sleep(Duration::from_millis(59_999)).await;
        assert_pending!(future.poll());
        assert!(pending.contains(RequestId::new(1)));

        tokio::time::sleep(Duration::from_millis(2)).await;
        let err = assert_ready!(future.poll()).expect_err("timed out");
        assert!(err.is_timeout());
        assert!(!pending.contains(RequestId::new(1)));

        // A late response is handed back, not applied
        assert!(pending.settle(response(1, json!({"success": true}))).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_request_never_times_out() {
        let pending = PendingRequests::new();
        let future = pending.register(RequestId::new(1), "get_status", 1, Duration::from_millis(10));
        assert!(pending.settle(response(1, json!({"success": true}))).is_ok());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(future.await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_rejection() {
        let pending = PendingRequests::new();
        let futures: Vec<_> = (1..=5)
            .map(|id| pending.register(RequestId::new(id), "get_activity", 1, LONG))
            .collect();

        assert_eq!(pending.reject_through(1), 5);
        assert_eq!(pending.len(), 0);

        for future in futures {
            let err = future.await.expect_err("rejected");
            assert!(matches!(err, Error::ConnectionClosed));
        }
    }

    #[tokio::test]
    async fn test_bulk_rejection_spares_newer_generation() {
        let pending = PendingRequests::new();
        let old = pending.register(RequestId::new(1), "a", 1, LONG);
        let _new = pending.register(RequestId::new(2), "b", 2, LONG);

        assert_eq!(pending.reject_through(1), 1);
        assert!(pending.contains(RequestId::new(2)));
        assert!(old.await.is_err());
    }

    #[tokio::test]
    async fn test_reject_single() {
        let pending = PendingRequests::new();
        let future = pending.register(RequestId::new(1), "a", 1, LONG);

        assert!(pending.reject(RequestId::new(1), Error::WebSocket(WsError::ConnectionClosed)));
        assert!(!pending.reject(RequestId::new(1), Error::ConnectionClosed));
        assert!(future.await.expect_err("rejected").is_connection_error());
    }

    #[tokio::test]
    async fn test_dropped_future_does_not_break_settlement() {
        let pending = PendingRequests::new();
        drop(pending.register(RequestId::new(1), "a", 1, LONG));
        assert!(pending.settle(response(1, json!({}))).is_ok());
        assert_eq!(pending.len(), 0);
    }
}
