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

//! Error taxonomy for the tessera core.
//!
//! Public facade calls never panic across the boundary: every failure is one
//! of these typed variants, and the facade converts them into the
//! `{success, data, error}` collaborator shape.

use thiserror::Error;

/// Failures of the cryptographic envelope. Always surfaced, never masked:
/// a decrypt that cannot authenticate must fail closed.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext authentication failed")]
    AuthenticationFailed,
    #[error("cipher operation failed")]
    Cipher,
    #[error("payload truncated ({0} bytes)")]
    Truncated(usize),
    #[error("unknown envelope version: {0}")]
    UnknownVersion(u8),
    #[error("payload encoding invalid: {0}")]
    Encoding(#[from] base64::DecodeError),
}

/// Failures of the device-local key-value layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value backend failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Failures of the remote data backend. These are transient from the core's
/// point of view: the caller may retry.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("rpc '{function}' failed: {message}")]
    Rpc { function: String, message: String },
}

/// Session integrity failures. The three cases are deliberately distinct so
/// callers can tell "sign in" apart from "refresh" apart from "tampered".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no active session")]
    NoSession,
    #[error("malformed session token: {0}")]
    Malformed(String),
    #[error("session token expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("user '{user_id}' is not a member of tenant '{tenant_id}'")]
    TenantAuthorization { user_id: String, tenant_id: String },

    #[error("user '{0}' has no tenant membership")]
    NoTenantMembership(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("batch insert aborted after {inserted} rows: {source}")]
    BatchAborted {
        inserted: usize,
        #[source]
        source: BackendError,
    },

    #[error("row-level isolation is disabled for collection '{collection}'")]
    ComplianceViolation { collection: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("merge rejected: {0}")]
    MergeRejected(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl CoreError {
    /// Stable machine-readable code for the collaborator contract.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::TenantAuthorization { .. } => "tenant_authorization_error",
            Self::NoTenantMembership(_) => "no_tenant_membership",
            Self::Crypto(_) => "crypto_integrity_error",
            Self::Store(_) => "storage_error",
            Self::Backend(_) => "transient_backend_error",
            Self::BatchAborted { .. } => "batch_aborted",
            Self::ComplianceViolation { .. } => "compliance_violation",
            Self::Session(SessionError::NoSession) => "no_session",
            Self::Session(SessionError::Malformed(_)) => "malformed_token",
            Self::Session(SessionError::Expired) => "expired_token",
            Self::MergeRejected(_) => "merge_rejected",
            Self::InvalidFilter(_) => "invalid_filter",
        }
    }

    /// Whether the caller may retry the same call and reasonably expect a
    /// different outcome.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::BatchAborted { .. })
    }
}
