// Copyright 2026 Tessera Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Domain models for the tessera core.
//!
//! Pure data structures: tenant context, memberships, audit records, domain
//! events, merge results, and the serializable `{success, data, error}`
//! collaborator shape. No I/O side effects here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::CoreError;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of an isolated organizational unit.
    TenantId
);
string_id!(
    /// Identifier of an authenticated user (the audit actor).
    UserId
);
string_id!(
    /// Identifier of a record within a collection.
    RecordId
);

/// The active-tenant selection persisted (encrypted) on the device.
/// Exactly one per device; absence means "resolve via membership".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub switched_at: DateTime<Utc>,
}

impl TenantContext {
    pub fn now(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            switched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
}

/// Source of truth for switch authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantMembership {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: MembershipRole,
}

/// One append-only row per mutating operation. Never mutated after creation;
/// retention is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: String,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn mutation(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        actor_id: Option<UserId>,
        tenant_id: Option<TenantId>,
        payload: Value,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            actor_id,
            tenant_id,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Fire-and-forget notification for external consumers. At-most-once, no
/// persistence, no retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub entity: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(
        entity: impl Into<String>,
        action: impl Into<String>,
        id: Option<String>,
        metadata: Value,
    ) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
            id,
            metadata,
            timestamp: Utc::now(),
        }
    }
}

/// Field reconciliation strategy for record merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// Fill only null/missing primary fields from the duplicate.
    #[default]
    PrimaryWins,
    /// Like PrimaryWins, but a strictly newer duplicate's non-null fields
    /// overwrite the primary's.
    NewestWins,
}

/// Outcome of a merge. Identical shape whichever path (remote or local
/// fallback) executed; only the side effects persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub primary_record: Value,
    pub merged_from_id: RecordId,
    pub strategy: MergeStrategy,
}

/// Claims the session validator extracts from a bearer token. Signature
/// verification is the issuer's job; only structure and expiry are checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Machine-readable error surfaced to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&CoreError> for ApiError {
    fn from(err: &CoreError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }
}

/// The uniform `{success, data, error}` result every facade operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(err: &CoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::from(err)),
        }
    }

    /// Failure that still carries partial data, e.g. the inserted-so-far
    /// count of an aborted batch.
    pub fn partial(data: T, err: &CoreError) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: Some(ApiError::from(err)),
        }
    }
}

impl<T> From<Result<T, CoreError>> for ApiResponse<T> {
    fn from(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}
