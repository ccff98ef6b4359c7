//! gRPC entry point for the user service.
//!
//! [`UserRpcService`] implements the generated [`UserService`] trait. Unary
//! calls go straight to the [`UserRegistry`]; each streaming call is handed to
//! its per-call coordinator in [`crate::server::streaming`].
//!
//! ## Responsibilities
//!
//! - Validate requests and map domain errors to `Status`.
//! - Spawn one task per server-streaming and bidirectional call.
//! - Track in-flight streaming calls so shutdown can drain them before the
//!   shared [`CancellationToken`] interrupts whatever is left.

use crate::server::{
    config::ServerConfig,
    domain::UserRegistry,
    streaming::{
        batch::BatchCreateCall,
        coordinator::{PageRequest, feed_users},
        sync::SyncCall,
    },
    telemetry::{
        decrement_streams_inflight, increment_messages_sent, increment_requests,
        increment_stream_errors, increment_streams_inflight, record_stream_duration,
    },
};
use core::time::Duration;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Instant,
};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use usergate_core::{
    Error,
    call::{CallStream, Terminal, call_channel, drive},
    proto::{
        BatchCreateUsersResponse, CreateUserRequest, GetUserRequest, GetUsersRequest,
        SyncUsersRequest, SyncUsersResponse, UpdateUserStatusRequest, UserResponse,
        user_service_server::UserService,
    },
    types::UserStatus,
};

struct Lifecycle {
    shutdown_token: CancellationToken,
    accepting: AtomicBool,
    inflight: AtomicUsize,
}

/// Counts one streaming call as in flight until dropped.
struct InflightGuard {
    lifecycle: Arc<Lifecycle>,
    start: Instant,
}

impl InflightGuard {
    fn new(lifecycle: &Arc<Lifecycle>) -> Self {
        lifecycle.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Self {
            lifecycle: Arc::clone(lifecycle),
            start: Instant::now(),
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.lifecycle.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
        record_stream_duration(self.start.elapsed().as_secs_f64() * 1_000.0);
    }
}

/// gRPC user service backed by a [`UserRegistry`].
///
/// Cloning is cheap; clones share the registry and the shutdown state.
#[derive(Clone)]
pub struct UserRpcService {
    config: ServerConfig,
    registry: Arc<dyn UserRegistry>,
    lifecycle: Arc<Lifecycle>,
}

impl UserRpcService {
    pub fn new(config: ServerConfig, registry: Arc<dyn UserRegistry>) -> Self {
        Self {
            config,
            registry,
            lifecycle: Arc::new(Lifecycle {
                shutdown_token: CancellationToken::new(),
                accepting: AtomicBool::new(true),
                inflight: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of streaming calls currently running.
    pub fn streams_inflight(&self) -> usize {
        self.lifecycle.inflight.load(Ordering::Acquire)
    }

    /// Stops accepting calls, waits up to `shutdown_timeout` for in-flight
    /// streams to finish, then cancels whatever is still running.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new requests");
        self.lifecycle.accepting.store(false, Ordering::Release);

        // === Phase 1: Drain in-flight streams ===
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drained = timeout(self.config.shutdown_timeout, async {
            while self.streams_inflight() > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;

        match drained {
            Ok(()) => tracing::debug!("All in-flight streams drained"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.streams_inflight()
            ),
        }

        // === Phase 2: Cancel remaining work ===
        self.lifecycle.shutdown_token.cancel();
        tracing::info!("User service shutdown complete");
    }

    fn ensure_accepting(&self, method: &'static str) -> Result<(), Status> {
        if !self.lifecycle.accepting.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown.into());
        }
        increment_requests(method);
        Ok(())
    }
}

#[tonic::async_trait]
impl UserService for UserRpcService {
    type GetUsersStream = CallStream<UserResponse>;
    type SyncUsersStream = CallStream<SyncUsersResponse>;

    #[tracing::instrument(skip_all, fields(email = %request.get_ref().email))]
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        self.ensure_accepting("CreateUser")?;
        let user = self.registry.create(request.into_inner().into())?;
        Ok(Response::new(UserResponse::from(&user)))
    }

    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        self.ensure_accepting("GetUser")?;
        let user = self.registry.get_by_id(request.get_ref().id)?;
        Ok(Response::new(UserResponse::from(&user)))
    }

    #[tracing::instrument(skip_all, fields(id = request.get_ref().id))]
    async fn update_user_status(
        &self,
        request: Request<UpdateUserStatusRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        self.ensure_accepting("UpdateUserStatus")?;
        let UpdateUserStatusRequest { id, status } = request.into_inner();
        let status: UserStatus = status.parse()?;
        let user = self.registry.update_status(id, status)?;
        Ok(Response::new(UserResponse::from(&user)))
    }

    #[tracing::instrument(skip_all, fields(page = request.get_ref().page, size = request.get_ref().size))]
    async fn get_users(
        &self,
        request: Request<GetUsersRequest>,
    ) -> Result<Response<Self::GetUsersStream>, Status> {
        self.ensure_accepting("GetUsers")?;
        let GetUsersRequest { page, size } = request.into_inner();
        let page = PageRequest::resolve(page, size, &self.config)?;

        let (responder, stream) = call_channel(self.config.stream_buffer_size);
        let guard = InflightGuard::new(&self.lifecycle);
        let registry = Arc::clone(&self.registry);
        let pacing = self.config.page_pacing;
        let shutdown = self.lifecycle.shutdown_token.clone();

        tokio::spawn(async move {
            let _guard = guard;
            match feed_users(registry.as_ref(), page, responder, pacing, shutdown).await {
                Ok(sent) => increment_messages_sent(sent as u64),
                Err(e) => {
                    increment_stream_errors("GetUsers");
                    tracing::warn!(error = %e, "User page feed ended early");
                }
            }
        });

        Ok(Response::new(stream))
    }

    async fn batch_create_users(
        &self,
        request: Request<Streaming<CreateUserRequest>>,
    ) -> Result<Response<BatchCreateUsersResponse>, Status> {
        self.ensure_accepting("BatchCreateUsers")?;
        let _guard = InflightGuard::new(&self.lifecycle);
        let inbound = request.into_inner();
        let mut call = BatchCreateCall::new(Arc::clone(&self.registry));

        let terminal = tokio::select! {
            terminal = drive(inbound, &mut call) => terminal,
            () = self.lifecycle.shutdown_token.cancelled() => {
                increment_stream_errors("BatchCreateUsers");
                return Err(Error::ServiceShutdown.into());
            }
        };

        match terminal {
            Terminal::Completed => {
                let summary = call.into_summary().ok_or_else(|| {
                    Status::from(Error::Unclassified {
                        context: "batch completed without a summary".to_string(),
                    })
                })?;
                tracing::info!(
                    created = summary.created_count,
                    failed = summary.failed_count,
                    "Batch create finished"
                );
                Ok(Response::new(summary))
            }
            Terminal::Errored(status) => {
                increment_stream_errors("BatchCreateUsers");
                Err(status)
            }
        }
    }

    async fn sync_users(
        &self,
        request: Request<Streaming<SyncUsersRequest>>,
    ) -> Result<Response<Self::SyncUsersStream>, Status> {
        self.ensure_accepting("SyncUsers")?;
        let inbound = request.into_inner();
        let (responder, stream) = call_channel(self.config.stream_buffer_size);
        let guard = InflightGuard::new(&self.lifecycle);
        let mut call = SyncCall::new(Arc::clone(&self.registry), responder);
        let shutdown = self.lifecycle.shutdown_token.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let terminal = tokio::select! {
                terminal = drive(inbound, &mut call) => Some(terminal),
                () = shutdown.cancelled() => None,
            };

            match terminal {
                Some(Terminal::Completed) => increment_messages_sent(call.processed() as u64),
                Some(Terminal::Errored(_)) => increment_stream_errors("SyncUsers"),
                None => {
                    increment_stream_errors("SyncUsers");
                    call.abort(Error::ServiceShutdown).await;
                }
            }
        });

        Ok(Response::new(stream))
    }
}
