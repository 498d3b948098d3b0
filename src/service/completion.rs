use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::ready;
use tokio::task::JoinHandle;

use crate::error::{ProtocolError, Result};

/// Resolves when a background session operation finishes.
///
/// Dropping a `Completion` does not cancel the operation; it keeps running
/// and still updates the session state when it ends.
#[must_use = "a completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(handle: JoinHandle<Result<T>>) -> Self {
        Self { handle }
    }

    /// True once the operation has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let joined = ready!(Pin::new(&mut self.handle).poll(cx));
        Poll::Ready(joined.unwrap_or_else(|e| Err(ProtocolError::TaskFailed(e.to_string()))))
    }
}
