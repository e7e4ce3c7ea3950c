//! Completion-order conduit from job tasks to the stream consumer.
//!
//! Every finishing job writes at most one [`Envelope`]; the consumer pulls at
//! its own pace. The channel is unbounded: admission control, not channel
//! capacity, is what bounds concurrency.
//!
//! ```text
//!   job 3 ──┐
//!   job 0 ──┼──▶ ResultSender (mpsc) ──▶ ResultReceiver ──▶ poll_next
//!   job 4 ──┘        arrival order            (consumer)
//! ```
//!
//! The sender half lives inside the slot pool's state and is dropped once the
//! pool settles, which is how the consumer learns that nothing else will come.

use std::task::{Context, Poll};

use slotline_types::{Envelope, JobId, Outcome};
use tokio::sync::mpsc;

/// Producer half, held by the scheduler.
#[derive(Debug)]
pub(crate) struct ResultSender<T, E> {
    sender: mpsc::UnboundedSender<Envelope<T, E>>,
}

/// Consumer half, owned by the stream.
#[derive(Debug)]
pub(crate) struct ResultReceiver<T, E> {
    receiver: mpsc::UnboundedReceiver<Envelope<T, E>>,
}

/// Create a new result channel pair.
pub(crate) fn result_channel<T, E>() -> (ResultSender<T, E>, ResultReceiver<T, E>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ResultSender { sender }, ResultReceiver { receiver })
}

impl<T, E> ResultSender<T, E> {
    /// Deliver one job's outcome.
    ///
    /// Never blocks. If the consumer has gone away the outcome is dropped.
    pub(crate) fn send(&self, id: JobId, outcome: Outcome<T, E>) {
        // Receiver dropped means nobody is listening
        let _ = self.sender.send(Envelope::new(id, outcome));
    }
}

impl<T, E> ResultReceiver<T, E> {
    /// Poll for the next envelope; `None` once every sender is gone and the
    /// buffer is drained.
    pub(crate) fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Envelope<T, E>>> {
        self.receiver.poll_recv(cx)
    }
}
