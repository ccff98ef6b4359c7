//! Domain boundary consumed by the call coordinators.
//!
//! [`UserRegistry`] is the only seam between the RPC layer and storage. Calls
//! are synchronous and side-effecting; coordinators never retry them.
//!
//! Soft-deleted records (status [`UserStatus::Deleted`]) stay in storage and
//! keep their email reserved, but every lookup and listing path treats them as
//! absent.

pub mod memory;

use usergate_core::{
    Result,
    proto::{CreateUserRequest, UserResponse},
    types::{UserId, UserStatus},
};

/// A stored user record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub status: UserStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields supplied when creating a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
}

impl NewUser {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            phone_number: non_empty(phone_number.into()),
        }
    }
}

/// Fields replaced by an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserChanges {
    pub name: String,
    pub phone_number: Option<String>,
}

impl UserChanges {
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone_number: non_empty(phone_number.into()),
        }
    }
}

// proto3 strings have no null; an empty phone number means "none".
fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Business operations on user records.
pub trait UserRegistry: Send + Sync {
    /// Creates an `Active` user.
    ///
    /// Fails with `DuplicateKey` if the email is taken, including by a
    /// soft-deleted user.
    fn create(&self, new_user: NewUser) -> Result<User>;

    /// Fails with `NotFound` for unknown and soft-deleted ids.
    fn get_by_id(&self, id: UserId) -> Result<User>;

    /// All visible users in id (creation) order.
    fn list_all(&self) -> Vec<User>;

    /// Replaces name and phone number.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidState` for
    /// soft-deleted ones.
    fn update(&self, id: UserId, changes: UserChanges) -> Result<User>;

    /// Soft-deletes a user. Fails with `NotFound` if the id is unknown or
    /// already deleted.
    fn delete(&self, id: UserId) -> Result<()>;

    /// Moves a user to `status`. Fails like [`UserRegistry::update`].
    fn update_status(&self, id: UserId, status: UserStatus) -> Result<User>;
}

impl From<CreateUserRequest> for NewUser {
    fn from(request: CreateUserRequest) -> Self {
        NewUser::new(request.email, request.name, request.phone_number)
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            phone_number: user.phone_number.clone().unwrap_or_default(),
            status: user.status.as_str().to_string(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
