//! Live subscriptions to store paths.
//!
//! A [`Subscription`] is the consumer half of a value stream fed by a
//! background task. Every item is the *complete* current value of the
//! subscribed path (not a delta), or an error. Closing or dropping the
//! subscription cancels the producer through a shared
//! [`CancellationToken`], so no listener outlives its consumer.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Default channel capacity between producer and consumer.
pub const DEFAULT_BUFFER: usize = 16;

/// Consumer half of a live value stream.
pub struct Subscription<T> {
    path: String,
    receiver: mpsc::Receiver<Result<T>>,
    cancel_token: CancellationToken,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("closed", &self.cancel_token.is_cancelled())
            .finish()
    }
}

/// Producer half of a live value stream.
#[derive(Debug)]
pub struct SubscriptionSender<T> {
    path: String,
    sender: mpsc::Sender<Result<T>>,
    cancel_token: CancellationToken,
}

impl<T> Clone for SubscriptionSender<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            sender: self.sender.clone(),
            cancel_token: self.cancel_token.clone(),
        }
    }
}

impl<T> Subscription<T> {
    /// Create a connected sender/subscription pair for `path`.
    pub fn channel(path: impl Into<String>, buffer: usize) -> (SubscriptionSender<T>, Self) {
        let path = path.into();
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let cancel_token = CancellationToken::new();
        (
            SubscriptionSender {
                path: path.clone(),
                sender,
                cancel_token: cancel_token.clone(),
            },
            Self {
                path,
                receiver,
                cancel_token,
            },
        )
    }

    /// The subscribed store path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stop the producer. Items already buffered can still be drained.
    pub fn close(&mut self) {
        if !self.cancel_token.is_cancelled() {
            debug!("Closing subscription to {}", self.path);
            self.cancel_token.cancel();
        }
        self.receiver.close();
    }

    /// Whether the subscription has been closed.
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Token that cancels the producer; usable to tie other tasks to it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Receive the next item, or `None` once the producer has stopped.
    pub async fn recv(&mut self) -> Option<Result<T>> {
        self.receiver.recv().await
    }

    /// Wait for the first value, failing after `timeout`.
    ///
    /// An error item from the producer is returned as-is.
    pub async fn first(&mut self, timeout: Duration) -> Result<T> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(item)) => item,
            Ok(None) => Err(Error::StreamCancelled {
                path: self.path.clone(),
                reason: "closed before the first value".to_string(),
            }),
            Err(_) => Err(Error::timeout(format!("first value of {}", self.path), timeout)),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T> SubscriptionSender<T> {
    /// The subscribed store path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Deliver a value. Returns `false` once the consumer is gone.
    pub async fn send(&self, value: T) -> bool {
        self.deliver(Ok(value)).await
    }

    /// Deliver an error. Returns `false` once the consumer is gone.
    pub async fn send_error(&self, error: Error) -> bool {
        self.deliver(Err(error)).await
    }

    async fn deliver(&self, item: Result<T>) -> bool {
        if self.cancel_token.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel_token.cancelled() => false,
            sent = self.sender.send(item) => sent.is_ok(),
        }
    }

    /// Whether the consumer has closed or dropped the subscription.
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.sender.is_closed()
    }

    /// Resolves once the consumer closes the subscription.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.cancel_token.cancelled() => {}
            _ = self.sender.closed() => {}
        }
    }
}
