//! Client-side call coordinator.
//!
//! Unary and server-streaming calls are awaited to completion. Client and
//! bidirectional streaming calls are split in two: the foreground sends the
//! requests one by one with a pacing interval, while a spawned reaction task
//! drives the inbound direction into a [`CompletionSignal`]. The foreground
//! then waits on that signal for at most the configured completion timeout.
//! The signal is the only state the two sides share.
//!
//! A request that fails locally fails the outbound direction. The request
//! stream never half-closes after such a failure; it aborts the transport
//! call instead, so the backend sees a cancelled stream rather than a
//! complete one.

use crate::config::ClientConfig;
use core::time::Duration;
use futures::{Stream, StreamExt, TryStreamExt, future, stream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::{Response, Status, transport::Channel};
use usergate_core::{
    Error,
    call::{CallObserver, CallOutcome, CallSender, CallStream, CompletionSignal, call_channel, drive},
    proto::{
        BatchCreateUsersResponse, CreateUserRequest, GetUserRequest, GetUsersRequest,
        SyncUsersRequest, SyncUsersResponse, UpdateUserStatusRequest, UserResponse,
        user_service_client::UserServiceClient,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The backend answered with an error status.
    #[error("gRPC call failed: {0}")]
    Rpc(#[from] Status),

    /// The call was aborted on this side while sending.
    #[error("Call aborted: {0}")]
    Aborted(#[from] Error),
}

/// Feeds the inbound direction of a call into a completion signal.
struct SignalObserver<R, T> {
    signal: CompletionSignal<R>,
    fold: fn(&mut R, T),
}

#[tonic::async_trait]
impl<R, T> CallObserver<T> for SignalObserver<R, T>
where
    R: Send + 'static,
    T: Send + 'static,
{
    async fn on_message(&mut self, message: T) {
        let fold = self.fold;
        self.signal.record(|slot| fold(slot, message));
    }

    async fn on_error(&mut self, status: Status) {
        self.signal.fail(status);
    }

    async fn on_completed(&mut self) {
        self.signal.complete();
    }
}

/// Adapts the outbound queue to the message-only stream tonic sends.
///
/// An `Err` item cancels `aborted` and the stream then stays pending, so a
/// failed direction never reaches the backend as a half-close.
fn request_stream<T: Send + 'static>(
    outbound: CallStream<T>,
    aborted: CancellationToken,
) -> impl Stream<Item = T> + Send {
    stream::unfold(outbound, move |mut outbound| {
        let aborted = aborted.clone();
        async move {
            match outbound.next().await? {
                Ok(message) => Some((message, outbound)),
                Err(status) => {
                    tracing::debug!(code = ?status.code(), "Outbound direction failed, aborting call");
                    aborted.cancel();
                    future::pending().await
                }
            }
        }
    })
}

/// Runs `call` until it finishes or the request stream asks for an abort.
/// Dropping `call` on abort resets the HTTP/2 stream.
async fn react<R>(
    call: impl Future<Output = ()>,
    aborted: CancellationToken,
    signal: CompletionSignal<R>,
) {
    tokio::select! {
        biased;
        () = aborted.cancelled() => {
            signal.fail(Status::cancelled("Call aborted by client"));
        }
        () = call => {}
    }
}

/// gRPC client for the user service. Cloning is cheap and clones share the
/// underlying channel.
#[derive(Clone)]
pub struct UserClient {
    inner: UserServiceClient<Channel>,
    config: ClientConfig,
}

impl UserClient {
    pub fn new(channel: Channel, config: ClientConfig) -> Self {
        Self {
            inner: UserServiceClient::new(channel),
            config,
        }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserResponse, ClientError> {
        let mut client = self.inner.clone();
        Ok(client.create_user(request).await?.into_inner())
    }

    pub async fn get_user(&self, id: u64) -> Result<UserResponse, ClientError> {
        let mut client = self.inner.clone();
        Ok(client.get_user(GetUserRequest { id }).await?.into_inner())
    }

    pub async fn update_user_status(
        &self,
        id: u64,
        status: String,
    ) -> Result<UserResponse, ClientError> {
        let mut client = self.inner.clone();
        let request = UpdateUserStatusRequest { id, status };
        Ok(client.update_user_status(request).await?.into_inner())
    }

    /// Collects one full page. No bound beyond the transport's own.
    pub async fn list_users(&self, page: u32, size: u32) -> Result<Vec<UserResponse>, ClientError> {
        let mut client = self.inner.clone();
        let stream = client
            .get_users(GetUsersRequest { page, size })
            .await?
            .into_inner();
        Ok(stream.try_collect().await?)
    }

    /// Streams `users` as one `BatchCreateUsers` call.
    ///
    /// Items are produced lazily while the call is open. An `Err` item aborts
    /// the call at that point: the backend discards the batch and nothing
    /// after the fault is sent.
    ///
    /// # Errors
    ///
    /// Only local faults are errors ([`ClientError::Aborted`]). A backend
    /// failure is reported as [`CallOutcome::Failed`] and an expired wait as
    /// [`CallOutcome::TimedOut`].
    pub async fn batch_create_users<I>(
        &self,
        users: I,
    ) -> Result<CallOutcome<Option<BatchCreateUsersResponse>>, ClientError>
    where
        I: IntoIterator<Item = Result<CreateUserRequest, Error>>,
        I::IntoIter: Send,
    {
        let (sender, outbound) = call_channel(self.config.call_buffer_size);
        let signal = CompletionSignal::new();
        let aborted = CancellationToken::new();
        let requests = request_stream(outbound, aborted.clone());
        let mut observer = SignalObserver {
            signal: signal.clone(),
            fold: |slot: &mut Option<BatchCreateUsersResponse>, summary| *slot = Some(summary),
        };
        let mut client = self.inner.clone();

        let reaction = tokio::spawn(react(
            async move {
                let response = client
                    .batch_create_users(requests)
                    .await
                    .map(Response::into_inner);
                drive(stream::iter([response]), &mut observer).await;
            },
            aborted,
            signal.clone(),
        ));

        self.send_paced(users, self.config.batch_interval, sender, &signal, reaction)
            .await?;
        Ok(self.settle(&signal, "BatchCreateUsers").await)
    }

    /// Streams `requests` as one `SyncUsers` call and collects the responses.
    ///
    /// # Errors
    ///
    /// Same as [`UserClient::batch_create_users`].
    pub async fn sync_users(
        &self,
        requests: Vec<SyncUsersRequest>,
    ) -> Result<CallOutcome<Vec<SyncUsersResponse>>, ClientError> {
        let (sender, outbound) = call_channel(self.config.call_buffer_size);
        let signal = CompletionSignal::new();
        let aborted = CancellationToken::new();
        let outbound = request_stream(outbound, aborted.clone());
        let mut observer = SignalObserver {
            signal: signal.clone(),
            fold: |slot: &mut Vec<SyncUsersResponse>, response| slot.push(response),
        };
        let mut client = self.inner.clone();

        let reaction = tokio::spawn(react(
            async move {
                match client.sync_users(outbound).await {
                    Ok(response) => {
                        drive(response.into_inner(), &mut observer).await;
                    }
                    Err(status) => observer.on_error(status).await,
                }
            },
            aborted,
            signal.clone(),
        ));

        let requests = requests.into_iter().map(Ok);
        self.send_paced(requests, self.config.sync_interval, sender, &signal, reaction)
            .await?;
        Ok(self.settle(&signal, "SyncUsers").await)
    }

    async fn send_paced<I, T, R>(
        &self,
        items: I,
        interval: Duration,
        mut sender: CallSender<T>,
        signal: &CompletionSignal<R>,
        reaction: JoinHandle<()>,
    ) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = Result<T, Error>>,
    {
        for (i, item) in items.into_iter().enumerate() {
            if signal.is_fired() {
                // The backend already ended the call.
                break;
            }
            if i > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }

            let sent = match item {
                Ok(message) => sender.send(message).await,
                Err(fault) => Err(fault),
            };
            match sent {
                Ok(()) => {}
                Err(Error::RequestCancelled) => {
                    // The transport dropped the request stream; the reaction
                    // side reports how the call ended.
                    tracing::debug!(sent = sender.sent(), "Backend stopped reading requests");
                    break;
                }
                Err(fault) => {
                    self.abort(sender, reaction, &fault).await;
                    return Err(fault.into());
                }
            }
        }

        sender.half_close();
        Ok(())
    }

    /// Fails the outbound direction with `fault` and waits for the reaction
    /// task to tear the transport call down.
    async fn abort<T>(&self, mut sender: CallSender<T>, reaction: JoinHandle<()>, fault: &Error) {
        tracing::warn!(error = %fault, sent = sender.sent(), "Aborting call");
        let stop = reaction.abort_handle();
        if sender.fail(Status::from(fault.clone())).await.is_err() {
            // The request stream is gone, so it cannot carry the abort.
            stop.abort();
        }
        if tokio::time::timeout(self.config.completion_timeout, reaction)
            .await
            .is_err()
        {
            tracing::warn!("Reaction task outlived the abort, cancelling it");
            stop.abort();
        }
    }

    async fn settle<R: Default>(&self, signal: &CompletionSignal<R>, method: &str) -> CallOutcome<R> {
        let outcome = signal.wait_timeout(self.config.completion_timeout).await;
        match &outcome {
            CallOutcome::Completed(_) => tracing::debug!(method, "Call completed"),
            CallOutcome::Failed { status, .. } => {
                tracing::warn!(method, code = ?status.code(), message = status.message(), "Call failed");
            }
            CallOutcome::TimedOut { .. } => tracing::warn!(
                method,
                timeout = ?self.config.completion_timeout,
                "No terminal event before the deadline, outcome unknown"
            ),
        }
        outcome
    }
}
