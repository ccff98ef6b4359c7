//! HTTP routes of the gateway.
//!
//! | Method  | Path                    | RPC                |
//! |---------|-------------------------|--------------------|
//! | `POST`  | `/api/user`             | `CreateUser`       |
//! | `GET`   | `/api/user/{id}`        | `GetUser`          |
//! | `GET`   | `/api/user?page&size`   | `GetUsers`         |
//! | `POST`  | `/api/user/batch`       | `BatchCreateUsers` |
//! | `POST`  | `/api/user/sync`        | `SyncUsers`        |
//! | `PATCH` | `/api/user/{id}/status` | `UpdateUserStatus` |
//!
//! Every failure, including a streaming call that timed out, is answered with
//! `500` and an [`error::ErrorBody`].

pub mod dto;
pub mod error;
pub mod routes;

use crate::client::UserClient;
use axum::{
    Router,
    routing::{get, patch, post},
};

pub fn router(client: UserClient) -> Router {
    Router::new()
        .route("/api/user", post(routes::create_user).get(routes::list_users))
        .route("/api/user/batch", post(routes::batch_create_users))
        .route("/api/user/sync", post(routes::sync_users))
        .route("/api/user/{id}", get(routes::get_user))
        .route("/api/user/{id}/status", patch(routes::update_user_status))
        .with_state(client)
}
