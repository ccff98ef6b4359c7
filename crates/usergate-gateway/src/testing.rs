//! In-process stand-in for the gRPC backend, used by the gateway tests.

use futures::{StreamExt, stream::BoxStream};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{
    Request, Response, Status, Streaming,
    transport::{Channel, Endpoint, Server},
};
use usergate_core::proto::{
    BatchCreateUsersResponse, CreateUserRequest, GetUserRequest, GetUsersRequest,
    SyncUsersRequest, SyncUsersResponse, UpdateUserStatusRequest, UserResponse,
    user_service_server::{UserService, UserServiceServer},
};

/// Clones share the user list and the batch summaries.
#[derive(Clone, Default)]
pub struct FakeBackend {
    users: Arc<Mutex<Vec<UserResponse>>>,
    summaries: Arc<Mutex<Vec<BatchCreateUsersResponse>>>,
    hang_batches: bool,
    reject_sync: bool,
}

impl FakeBackend {
    /// Batch calls never answer after the client half-closes.
    pub fn hanging_batches() -> Self {
        Self {
            hang_batches: true,
            ..Self::default()
        }
    }

    /// Sync calls are refused with `UNAVAILABLE` before any message is read.
    pub fn rejecting_sync() -> Self {
        Self {
            reject_sync: true,
            ..Self::default()
        }
    }

    /// Summaries of the batches that ran to a clean half-close.
    pub fn batch_summaries(&self) -> Vec<BatchCreateUsersResponse> {
        self.summaries.lock().clone()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    fn create(&self, request: CreateUserRequest) -> Result<UserResponse, Status> {
        let mut users = self.users.lock();
        if users.iter().any(|u| u.email == request.email) {
            return Err(Status::already_exists(format!(
                "Duplicate key: {}",
                request.email
            )));
        }
        let user = UserResponse {
            id: users.len() as u64 + 1,
            email: request.email,
            name: request.name,
            phone_number: request.phone_number,
            status: "ACTIVE".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[tonic::async_trait]
impl UserService for FakeBackend {
    type GetUsersStream = BoxStream<'static, Result<UserResponse, Status>>;
    type SyncUsersStream = BoxStream<'static, Result<SyncUsersResponse, Status>>;

    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        self.create(request.into_inner()).map(Response::new)
    }

    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let id = request.get_ref().id;
        self.users
            .lock()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(Response::new)
            .ok_or_else(|| Status::not_found(format!("User not found: id={id}")))
    }

    async fn update_user_status(
        &self,
        request: Request<UpdateUserStatusRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        let UpdateUserStatusRequest { id, status } = request.into_inner();
        let mut users = self.users.lock();
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Status::not_found(format!("User not found: id={id}")))?;
        user.status = status.to_ascii_uppercase();
        Ok(Response::new(user.clone()))
    }

    async fn get_users(
        &self,
        request: Request<GetUsersRequest>,
    ) -> Result<Response<Self::GetUsersStream>, Status> {
        let GetUsersRequest { page, size } = request.into_inner();
        let size = if size == 0 { 10 } else { size as usize };
        let page: Vec<_> = self
            .users
            .lock()
            .iter()
            .skip(page as usize * size)
            .take(size)
            .cloned()
            .map(Ok)
            .collect();
        Ok(Response::new(futures::stream::iter(page).boxed()))
    }

    async fn batch_create_users(
        &self,
        request: Request<Streaming<CreateUserRequest>>,
    ) -> Result<Response<BatchCreateUsersResponse>, Status> {
        let mut inbound = request.into_inner();
        let mut summary = BatchCreateUsersResponse::default();
        while let Some(item) = inbound.message().await? {
            match self.create(item) {
                Ok(user) => {
                    summary.created_count += 1;
                    summary.user_ids.push(user.id);
                }
                Err(_) => summary.failed_count += 1,
            }
        }
        self.summaries.lock().push(summary.clone());
        if self.hang_batches {
            futures::future::pending::<()>().await;
        }
        Ok(Response::new(summary))
    }

    async fn sync_users(
        &self,
        request: Request<Streaming<SyncUsersRequest>>,
    ) -> Result<Response<Self::SyncUsersStream>, Status> {
        if self.reject_sync {
            return Err(Status::unavailable("Service is shutting down"));
        }
        let responses = request.into_inner().map(|item| {
            item.map(|req| SyncUsersResponse {
                status: "SUCCESS".to_string(),
                message: format!("{} applied", req.action),
                timestamp: 1,
            })
        });
        Ok(Response::new(responses.boxed()))
    }
}

/// Serves `backend` on an ephemeral port and returns a connected channel.
pub async fn spawn_backend(backend: FakeBackend) -> Channel {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(
        Server::builder()
            .add_service(UserServiceServer::new(backend))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap()
}
