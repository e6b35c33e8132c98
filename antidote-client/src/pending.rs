//! Pending-request queue.
//!
//! The Antidote protocol carries no request ids: the server answers
//! requests in the order they were sent, so a response belongs to the
//! oldest request still waiting. All positional correlation lives here.

use crate::error::ClientError;
use antidote_protocol::Inbound;
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Completion handle of an in-flight request.
pub type Completion = oneshot::Sender<Result<Inbound, ClientError>>;

/// One sent-but-unanswered request.
///
/// The request timeout is enforced by the caller waiting on the completion;
/// whoever gives up first invalidates the whole queue.
#[derive(Debug)]
pub struct PendingRequest {
    code: u8,
    completion: Completion,
}

impl PendingRequest {
    pub fn new(code: u8, completion: Completion) -> Self {
        Self { code, completion }
    }

    /// Message code of the request.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Completes the request with a decoded frame.
    ///
    /// A caller that gave up waiting has dropped its receiver; that is not
    /// an error here.
    pub fn resolve(self, inbound: Inbound) {
        let _ = self.completion.send(Ok(inbound));
    }

    /// Fails the request.
    pub fn reject(self, err: ClientError) {
        let _ = self.completion.send(Err(err));
    }
}

/// FIFO of pending requests for one socket.
#[derive(Debug, Default)]
pub struct PendingQueue {
    requests: VecDeque<PendingRequest>,
    closed: bool,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request to the tail.
    ///
    /// Once the queue has been failed the request is rejected right away
    /// with `make_error()`.
    pub fn enqueue(&mut self, request: PendingRequest, make_error: impl FnOnce() -> ClientError) {
        if self.closed {
            request.reject(make_error());
            return;
        }
        self.requests.push_back(request);
    }

    /// Removes and returns the oldest request.
    pub fn dequeue_oldest(&mut self) -> Option<PendingRequest> {
        self.requests.pop_front()
    }

    /// Rejects every pending request and closes the queue.
    ///
    /// Returns the number of requests that were rejected.
    pub fn fail_all(&mut self, make_error: impl Fn() -> ClientError) -> usize {
        self.closed = true;
        let count = self.requests.len();
        for request in self.requests.drain(..) {
            request.reject(make_error());
        }
        count
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Returns whether the queue has been failed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antidote_protocol::ErrorResponse;

    fn pending(code: u8) -> (PendingRequest, oneshot::Receiver<Result<Inbound, ClientError>>) {
        let (tx, rx) = oneshot::channel();
        (PendingRequest::new(code, tx), rx)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PendingQueue::new();
        let (a, _rx_a) = pending(122);
        let (b, _rx_b) = pending(123);
        queue.enqueue(a, || ClientError::Closed);
        queue.enqueue(b, || ClientError::Closed);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue_oldest().unwrap().code(), 122);
        assert_eq!(queue.dequeue_oldest().unwrap().code(), 123);
        assert!(queue.dequeue_oldest().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_resolve_and_reject() {
        let (a, mut rx_a) = pending(119);
        let (b, mut rx_b) = pending(121);

        a.resolve(Inbound::Empty(111));
        b.reject(ClientError::server(ErrorResponse::new(1, "no")));

        assert!(matches!(rx_a.try_recv(), Ok(Ok(Inbound::Empty(111)))));
        assert!(matches!(
            rx_b.try_recv(),
            Ok(Err(ClientError::ServerError { code: 1, .. }))
        ));
    }

    #[test]
    fn test_resolve_after_caller_gave_up() {
        let (a, rx_a) = pending(119);
        drop(rx_a);
        // Must not panic
        a.resolve(Inbound::Empty(111));
    }

    #[test]
    fn test_fail_all_rejects_everything_once() {
        let mut queue = PendingQueue::new();
        let mut receivers = Vec::new();
        for code in [116, 118, 121] {
            let (req, rx) = pending(code);
            queue.enqueue(req, || ClientError::Closed);
            receivers.push(rx);
        }

        assert_eq!(queue.fail_all(|| ClientError::Timeout), 3);
        assert!(queue.is_empty());
        assert!(queue.is_closed());

        for mut rx in receivers {
            assert!(matches!(rx.try_recv(), Ok(Err(ClientError::Timeout))));
        }

        // Nothing left to fail a second time
        assert_eq!(queue.fail_all(|| ClientError::Timeout), 0);
    }

    #[test]
    fn test_enqueue_after_fail_all_rejects_immediately() {
        let mut queue = PendingQueue::new();
        queue.fail_all(|| ClientError::ConnectionClosed);

        let (req, mut rx) = pending(122);
        queue.enqueue(req, || ClientError::ConnectionClosed);

        assert!(queue.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Ok(Err(ClientError::ConnectionClosed))
        ));
    }
}
