//! Error types for the user service.
//!
//! This module defines the central `Error` enum shared by the server
//! coordinators, the domain registry and the call channel. It implements
//! `From<Error>` for `tonic::Status` so failures surface to gRPC callers with a
//! status code matching their class.
//!
//! ## Error Cases
//! - `DuplicateKey`: A create reused an already registered unique field.
//! - `NotFound`: An operation referenced an id with no visible record.
//! - `InvalidState`: The record's lifecycle state forbids the operation.
//! - `ChannelClosed`: A send was attempted after the outbound direction ended.
//! - `RequestCancelled`: The peer stopped consuming mid-call.
//! - `InvalidRequest`: The request was malformed or exceeded bounds.
//! - `ServiceShutdown`: A call was interrupted by server shutdown.
//! - `Unclassified`: Any other domain or transport fault.

use crate::types::UserId;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the user service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A unique field (the email address) is already taken.
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    /// No visible record carries this id.
    #[error("User not found: id={id}")]
    NotFound { id: UserId },

    /// The operation is not permitted in the record's current state.
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    /// The outbound direction already half-closed or failed.
    #[error("Channel closed")]
    ChannelClosed,

    /// The peer dropped its side of the call.
    #[error("Request cancelled by peer")]
    RequestCancelled,

    /// The request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    #[error("Unclassified error: {context}")]
    Unclassified { context: String },
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::DuplicateKey { .. } => Status::already_exists(message),
            Error::NotFound { .. } => Status::not_found(message),
            Error::InvalidState { .. } => Status::failed_precondition(message),
            Error::ChannelClosed => Status::internal(message),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable(message),
            Error::Unclassified { .. } => Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_domain_errors_to_status_codes() {
        let cases = [
            (
                Error::DuplicateKey {
                    key: "a@x.com".to_string(),
                },
                Code::AlreadyExists,
            ),
            (Error::NotFound { id: 7 }, Code::NotFound),
            (
                Error::InvalidState {
                    reason: "deleted".to_string(),
                },
                Code::FailedPrecondition,
            ),
            (Error::ChannelClosed, Code::Internal),
            (Error::RequestCancelled, Code::Cancelled),
            (
                Error::InvalidRequest {
                    reason: "size".to_string(),
                },
                Code::InvalidArgument,
            ),
            (Error::ServiceShutdown, Code::Unavailable),
            (
                Error::Unclassified {
                    context: "boom".to_string(),
                },
                Code::Internal,
            ),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn status_message_carries_context() {
        let status = Status::from(Error::NotFound { id: 42 });
        assert_eq!(status.message(), "User not found: id=42");

        let status = Status::from(Error::InvalidRequest {
            reason: "size too large".to_string(),
        });
        assert_eq!(status.message(), "size too large");
    }
}
