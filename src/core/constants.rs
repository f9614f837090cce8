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

//! Core constants - single source of truth for magic values.

/// Cryptographic envelope constants.
pub mod crypto {
    /// Current envelope framing version.
    pub const ENVELOPE_VERSION: u8 = 1;
    /// AES-GCM nonce length in bytes.
    pub const NONCE_LEN: usize = 12;
    /// AES-GCM authentication tag length in bytes.
    pub const TAG_LEN: usize = 16;
    /// Derived key length in bytes (AES-256).
    pub const KEY_LEN: usize = 32;
    /// Random salt length in bytes.
    pub const SALT_LEN: usize = 16;
    /// Fallback device secret length in bytes.
    pub const FALLBACK_SECRET_LEN: usize = 32;
    /// Default PBKDF2-HMAC-SHA256 iteration count.
    pub const DEFAULT_KDF_ITERATIONS: u32 = 310_000;
}

/// Encrypted key-value store constants.
pub mod store {
    /// Namespace prefix applied to every logical key.
    pub const KEY_PREFIX: &str = "tessera.v1.";
    /// Logical key holding the encrypted active tenant context.
    pub const TENANT_CONTEXT_KEY: &str = "active_tenant";
    /// Raw (unencrypted) key holding the persisted KDF salt.
    pub const SALT_KEY: &str = "tessera.v1.envelope_salt";
    /// Raw (unencrypted) key holding the generated device fallback secret.
    pub const FALLBACK_SECRET_KEY: &str = "tessera.v1.device_secret";
}

/// Well-known backend collections.
pub mod collections {
    pub const TENANTS: &str = "tenants";
    pub const MEMBERSHIPS: &str = "tenant_members";
    pub const AUDIT_LOG: &str = "audit_log";
}

/// Well-known record columns.
pub mod columns {
    pub const ID: &str = "id";
    pub const TENANT_ID: &str = "tenant_id";
    pub const USER_ID: &str = "user_id";
    pub const ROLE: &str = "role";
    pub const STATUS: &str = "status";
    pub const MERGED_INTO: &str = "merged_into";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Batch insert tuning.
pub mod batch {
    /// Default chunk size for sequential batch inserts.
    pub const DEFAULT_CHUNK_SIZE: usize = 300;
}

/// Remote procedure names.
pub mod rpc {
    /// Authoritative server-side merge procedure.
    pub const MERGE_RECORDS: &str = "merge_records";
}

/// Event dispatcher tuning.
pub mod events {
    /// Broadcast channel capacity; slow subscribers lose events (at-most-once).
    pub const CHANNEL_CAPACITY: usize = 64;
}

/// Configuration environment variables.
pub mod config {
    pub const ENV_MASTER_SECRET: &str = "TESSERA_MASTER_SECRET";
    pub const ENV_KDF_ITERATIONS: &str = "TESSERA_KDF_ITERATIONS";
    pub const ENV_RLS_AUDIT_MODE: &str = "TESSERA_RLS_AUDIT_MODE";
    pub const ENV_FORCE_SIGN_OUT: &str = "TESSERA_FORCE_SIGN_OUT";
    pub const ENV_BATCH_CHUNK_SIZE: &str = "TESSERA_BATCH_CHUNK_SIZE";
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
}
