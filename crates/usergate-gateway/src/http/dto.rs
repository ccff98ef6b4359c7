//! JSON bodies of the HTTP API. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use usergate_core::{
    Error,
    proto::{
        BatchCreateUsersResponse, CreateUserRequest, SyncUsersRequest, SyncUsersResponse,
        UserResponse,
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

fn required(field: &str, value: String) -> Result<String, Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidRequest {
            reason: format!("{field} must not be blank"),
        });
    }
    Ok(value)
}

impl TryFrom<CreateUserBody> for CreateUserRequest {
    type Error = Error;

    fn try_from(body: CreateUserBody) -> Result<Self, Self::Error> {
        Ok(CreateUserRequest {
            email: required("email", body.email)?,
            name: required("name", body.name)?,
            phone_number: body.phone_number.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub phone_number: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<UserResponse> for UserBody {
    fn from(user: UserResponse) -> Self {
        UserBody {
            id: user.id,
            email: user.email,
            name: user.name,
            phone_number: user.phone_number,
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

const fn default_page_size() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListBody {
    pub users: Vec<UserBody>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchCreateBody {
    pub users: Vec<CreateUserBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResultBody {
    pub created_count: u32,
    pub user_ids: Vec<u64>,
    pub failed_count: u32,
}

impl From<BatchCreateUsersResponse> for BatchCreateResultBody {
    fn from(summary: BatchCreateUsersResponse) -> Self {
        BatchCreateResultBody {
            created_count: summary.created_count,
            user_ids: summary.user_ids,
            failed_count: summary.failed_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItemBody {
    pub action: String,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl From<SyncItemBody> for SyncUsersRequest {
    fn from(item: SyncItemBody) -> Self {
        SyncUsersRequest {
            action: item.action,
            user_id: item.user_id,
            email: item.email.unwrap_or_default(),
            name: item.name.unwrap_or_default(),
            phone_number: item.phone_number.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncBody {
    pub requests: Vec<SyncItemBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncItemResultBody {
    pub status: String,
    pub message: String,
    pub timestamp: i64,
}

impl From<SyncUsersResponse> for SyncItemResultBody {
    fn from(response: SyncUsersResponse) -> Self {
        SyncItemResultBody {
            status: response.status,
            message: response.message,
            timestamp: response.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResultBody {
    pub responses: Vec<SyncItemResultBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusBody {
    pub status: String,
}
