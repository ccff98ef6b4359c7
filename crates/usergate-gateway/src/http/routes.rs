use super::{
    dto::{
        BatchCreateBody, BatchCreateResultBody, CreateUserBody, ListQuery, StatusBody, SyncBody,
        SyncItemResultBody, SyncResultBody, UserBody, UserListBody,
    },
    error::ApiError,
};
use crate::client::UserClient;
use usergate_core::proto::CreateUserRequest;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

pub async fn create_user(
    State(client): State<UserClient>,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<UserBody>), ApiError> {
    tracing::info!(email = %body.email, "Create user");
    let user = client.create_user(body.try_into()?).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    State(client): State<UserClient>,
    Path(id): Path<u64>,
) -> Result<Json<UserBody>, ApiError> {
    let user = client.get_user(id).await?;
    Ok(Json(user.into()))
}

pub async fn list_users(
    State(client): State<UserClient>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UserListBody>, ApiError> {
    let users: Vec<UserBody> = client
        .list_users(query.page, query.size)
        .await?
        .into_iter()
        .map(UserBody::from)
        .collect();
    Ok(Json(UserListBody {
        total_count: users.len(),
        users,
    }))
}

pub async fn batch_create_users(
    State(client): State<UserClient>,
    Json(body): Json<BatchCreateBody>,
) -> Result<(StatusCode, Json<BatchCreateResultBody>), ApiError> {
    tracing::info!(count = body.users.len(), "Batch create users");
    // Converted lazily: a bad item aborts the call once it is reached.
    let requests = body.users.into_iter().map(CreateUserRequest::try_from);
    let outcome = client.batch_create_users(requests).await?;
    let summary = ApiError::settle(outcome, "Batch create")?
        .ok_or_else(|| ApiError::new("Batch create completed without a summary"))?;
    Ok((StatusCode::CREATED, Json(summary.into())))
}

pub async fn sync_users(
    State(client): State<UserClient>,
    Json(body): Json<SyncBody>,
) -> Result<Json<SyncResultBody>, ApiError> {
    tracing::info!(count = body.requests.len(), "Sync users");
    let requests = body.requests.into_iter().map(Into::into).collect();
    let outcome = client.sync_users(requests).await?;
    let responses = ApiError::settle(outcome, "Sync")?
        .into_iter()
        .map(SyncItemResultBody::from)
        .collect();
    Ok(Json(SyncResultBody { responses }))
}

pub async fn update_user_status(
    State(client): State<UserClient>,
    Path(id): Path<u64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<UserBody>, ApiError> {
    let user = client.update_user_status(id, body.status).await?;
    Ok(Json(user.into()))
}
