//! A single logical RPC call, seen from one side.
//!
//! A call has two independent directions. The outbound direction is a bounded
//! queue owned by a [`CallSender`]: messages leave in the order they were
//! sent, and the direction ends either cleanly ([`CallSender::half_close`]) or
//! with an error ([`CallSender::fail`]). The inbound direction is any stream of
//! `Result<T, Status>` (a tonic `Streaming<T>` in production) and is consumed
//! by [`drive`], which feeds a [`CallObserver`].
//!
//! [`drive`] owns the inbound loop, so reactions for one call never overlap,
//! and it returns as soon as the first terminal event is seen: at most one of
//! `on_error`/`on_completed` fires, exactly once, and no `on_message` follows
//! it.

use crate::{Error, Result};
use core::pin::pin;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// Receiving half of an outbound direction. Hand it to tonic as a response
/// stream, or map it into a request stream on the client side.
pub type CallStream<T> = ReceiverStream<core::result::Result<T, Status>>;

/// Opens the outbound direction of a call with room for `buffer` in-flight
/// messages.
pub fn call_channel<T>(buffer: usize) -> (CallSender<T>, CallStream<T>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (CallSender { tx: Some(tx), sent: 0 }, ReceiverStream::new(rx))
}

/// How the inbound direction of a call ended.
#[derive(Clone, Debug)]
pub enum Terminal {
    /// The peer half-closed after its last message.
    Completed,
    /// The peer (or the transport) aborted the direction.
    Errored(Status),
}

impl Terminal {
    pub const fn is_completed(&self) -> bool {
        matches!(self, Terminal::Completed)
    }
}

/// Sending half of one call direction.
#[derive(Debug)]
pub struct CallSender<T> {
    tx: Option<mpsc::Sender<core::result::Result<T, Status>>>,
    sent: usize,
}

impl<T> CallSender<T> {
    /// Queues one message, waiting for capacity.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] once this direction half-closed or failed.
    /// - [`Error::RequestCancelled`] if the peer dropped the receiving half.
    pub async fn send(&mut self, message: T) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(Error::ChannelClosed);
        };

        tx.send(Ok(message))
            .await
            .map_err(|_| Error::RequestCancelled)?;
        self.sent += 1;
        Ok(())
    }

    /// Ends this direction cleanly. Messages already queued are still
    /// delivered; the receiving stream ends after them.
    pub fn half_close(&mut self) {
        if self.tx.take().is_some() {
            tracing::trace!(sent = self.sent, "Outbound direction half-closed");
        }
    }

    /// Ends this direction with `status` as its final item.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the direction already ended.
    /// - [`Error::RequestCancelled`] if the peer is gone; the direction is
    ///   closed either way.
    pub async fn fail(&mut self, status: Status) -> Result<()> {
        let tx = self.tx.take().ok_or(Error::ChannelClosed)?;
        tracing::trace!(sent = self.sent, code = ?status.code(), "Outbound direction failed");
        tx.send(Err(status))
            .await
            .map_err(|_| Error::RequestCancelled)
    }

    /// `true` once this side ended the direction or the peer stopped reading.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(mpsc::Sender::is_closed)
    }

    /// Resolves when the peer drops the receiving half. Resolves immediately
    /// if this side already ended the direction.
    pub async fn cancelled(&self) {
        if let Some(tx) = &self.tx {
            tx.closed().await;
        }
    }

    /// Number of messages accepted so far.
    pub const fn sent(&self) -> usize {
        self.sent
    }
}

/// Reactions to the inbound direction of one call.
///
/// Implementors are per-call state objects; [`drive`] holds the only
/// reference while the call is live.
#[tonic::async_trait]
pub trait CallObserver<T: Send + 'static>: Send {
    async fn on_message(&mut self, message: T);

    async fn on_error(&mut self, status: Status);

    async fn on_completed(&mut self);
}

/// Runs the inbound message loop of one call to its terminal event.
///
/// Messages reach `observer` one at a time and in arrival order. The first
/// `Err` item ends the loop with [`Terminal::Errored`]; anything the stream
/// would yield after it is never polled.
pub async fn drive<T, S, O>(inbound: S, observer: &mut O) -> Terminal
where
    T: Send + 'static,
    S: Stream<Item = core::result::Result<T, Status>>,
    O: CallObserver<T> + ?Sized,
{
    let mut inbound = pin!(inbound);
    let mut received = 0_usize;

    while let Some(item) = inbound.next().await {
        match item {
            Ok(message) => {
                received += 1;
                observer.on_message(message).await;
            }
            Err(status) => {
                tracing::debug!(received, code = ?status.code(), "Inbound direction errored");
                observer.on_error(status.clone()).await;
                return Terminal::Errored(status);
            }
        }
    }

    tracing::trace!(received, "Inbound direction completed");
    observer.on_completed().await;
    Terminal::Completed
}
