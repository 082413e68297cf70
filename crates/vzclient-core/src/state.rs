// ── Request state streams ──
//
// Every repository operation runs as its own task and reports progress
// over a bounded channel: `Loading`, then exactly one terminal state.
// Dropping the stream abandons the subscription; the task still finishes
// its network call and the result is discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::CoreError;

/// Progress of one logical request.
#[derive(Debug, Clone)]
pub enum RequestState<T> {
    Loading,
    Success(T),
    Error(CoreError),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }

    /// The outcome, or `None` while still loading.
    pub fn into_result(self) -> Option<Result<T, CoreError>> {
        match self {
            Self::Loading => None,
            Self::Success(value) => Some(Ok(value)),
            Self::Error(err) => Some(Err(err)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestState<U> {
        match self {
            Self::Loading => RequestState::Loading,
            Self::Success(value) => RequestState::Success(f(value)),
            Self::Error(err) => RequestState::Error(err),
        }
    }
}

impl<T> From<Result<T, CoreError>> for RequestState<T> {
    fn from(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Error(err),
        }
    }
}

/// Push-based stream of [`RequestState`]s for a single invocation.
pub struct RequestStream<T> {
    inner: ReceiverStream<RequestState<T>>,
}

impl<T: Send + 'static> RequestStream<T> {
    /// Run `work` on the runtime, gated by `permits`.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn<F>(permits: Arc<Semaphore>, work: F) -> Self
    where
        F: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        // Loading plus one terminal state; the task never blocks on send.
        let (tx, rx) = mpsc::channel(2);

        tokio::spawn(async move {
            let _ = tx.send(RequestState::Loading).await;

            let result = match permits.acquire_owned().await {
                Ok(_permit) => work.await,
                Err(_) => Err(CoreError::Internal("request pool closed".into())),
            };

            if tx.send(result.into()).await.is_err() {
                debug!("request result discarded, subscriber gone");
            }
        });

        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Skip intermediate states and return the outcome.
    pub async fn outcome(mut self) -> Result<T, CoreError> {
        while let Some(state) = self.next().await {
            if let Some(result) = state.into_result() {
                return result;
            }
        }
        Err(CoreError::Internal("request ended without a result".into()))
    }
}

impl<T> Stream for RequestStream<T> {
    type Item = RequestState<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loading_then_one_terminal_state() {
        let permits = Arc::new(Semaphore::new(1));
        let stream = RequestStream::spawn(permits, async { Ok::<_, CoreError>(7) });

        let states: Vec<_> = stream.collect().await;
        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        assert!(matches!(states[1], RequestState::Success(7)));
    }

    #[tokio::test]
    async fn outcome_surfaces_errors() {
        let permits = Arc::new(Semaphore::new(1));
        let stream = RequestStream::<()>::spawn(permits, async {
            Err(CoreError::ChannelNotFound { uuid: "x".into() })
        });
        assert!(stream.outcome().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_cancel_work() {
        let permits = Arc::new(Semaphore::new(1));
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let stream = RequestStream::spawn(Arc::clone(&permits), async move {
            let _ = done_tx.send(());
            Ok::<_, CoreError>(())
        });
        drop(stream);

        done_rx.await.unwrap();
    }

    #[test]
    fn map_preserves_non_success_states() {
        let loading: RequestState<u8> = RequestState::Loading;
        assert!(loading.map(u16::from).is_loading());
        let ok: RequestState<u8> = Ok(3).into();
        assert!(matches!(ok.map(u16::from), RequestState::Success(3)));
    }
}
