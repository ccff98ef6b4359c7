//! # Typed Protocol Fields
//!
//! The wire schema keeps lifecycle states, sync actions and sync outcomes as
//! plain strings so that any gRPC client can produce them. This module gives
//! them typed counterparts and owns the canonical spelling of each value.
//!
//! - [`UserId`] - the integer key of a user record
//! - [`UserStatus`] - the lifecycle state of a record, including soft delete
//! - [`SyncAction`] - the tagged action carried by a `SyncUsersRequest`
//! - [`SyncStatus`] - the outcome carried by a `SyncUsersResponse`

use crate::Error;
use core::{fmt, str::FromStr};
use std::time::{SystemTime, UNIX_EPOCH};

/// Integer key of a user record. Ids are assigned by the registry and never
/// reused.
pub type UserId = u64;

/// Lifecycle state of a user record.
///
/// `Deleted` is a soft delete: the record stays in storage but is hidden from
/// lookup and listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
    Deleted,
}

impl UserStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Suspended => "SUSPENDED",
            UserStatus::Deleted => "DELETED",
        }
    }

    pub const fn is_deleted(self) -> bool {
        matches!(self, UserStatus::Deleted)
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(UserStatus::Active),
            "INACTIVE" => Ok(UserStatus::Inactive),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            "DELETED" => Ok(UserStatus::Deleted),
            _ => Err(Error::InvalidRequest {
                reason: format!("Unknown user status: {s}"),
            }),
        }
    }
}

/// Action tag of one bidirectional sync message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Update,
    Delete,
    /// Anything else; answered with an `ERROR` response.
    Unrecognized(String),
}

impl SyncAction {
    /// Parses an action tag, ignoring ASCII case.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "CREATE" => SyncAction::Create,
            "UPDATE" => SyncAction::Update,
            "DELETE" => SyncAction::Delete,
            _ => SyncAction::Unrecognized(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SyncAction::Create => "CREATE",
            SyncAction::Update => "UPDATE",
            SyncAction::Delete => "DELETE",
            SyncAction::Unrecognized(raw) => raw,
        }
    }
}

/// Outcome of one bidirectional sync message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seconds since the Unix epoch, as carried by `created_at`/`updated_at`.
pub fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Milliseconds since the Unix epoch, as carried by sync timestamps.
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}
