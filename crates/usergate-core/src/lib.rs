#![doc = include_str!("../README.md")]

pub mod call;
mod common;
pub use common::*;

/// gRPC service and message definitions generated from `proto/user.proto`.
///
/// ## Service
///
/// - `CreateUser`, `GetUser`, `UpdateUserStatus` - unary calls.
/// - `GetUsers` - server streaming, one [`UserResponse`] per user in a page.
/// - `BatchCreateUsers` - client streaming, one
///   [`BatchCreateUsersResponse`] summary per call.
/// - `SyncUsers` - bidirectional streaming, one [`SyncUsersResponse`] per
///   [`SyncUsersRequest`], in request order.
///
/// [`UserResponse`]: crate::proto::UserResponse
/// [`BatchCreateUsersResponse`]: crate::proto::BatchCreateUsersResponse
/// [`SyncUsersResponse`]: crate::proto::SyncUsersResponse
/// [`SyncUsersRequest`]: crate::proto::SyncUsersRequest
pub mod proto {
    tonic::include_proto!("user");

    /// Encoded file descriptor set for `tonic-reflection`.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("user_descriptor");
}
