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

use crate::core::constants::{batch, config as env, crypto};
use crate::core::errors::CoreError;
use serde::{Deserialize, Serialize};
use std::env::var;

/// How the RLS compliance auditor reacts to a collection whose row-level
/// isolation is confirmed disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Block the mutation and raise a compliance violation.
    Strict,
    /// Log a warning and proceed.
    Warn,
    /// Skip the probe entirely.
    Off,
}

impl AuditMode {
    pub fn parse_safe(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "strict" => AuditMode::Strict,
            "off" | "disabled" => AuditMode::Off,
            _ => AuditMode::Warn,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operator-supplied master secret for key derivation. Absent, a
    /// per-device fallback secret is generated and persisted.
    pub master_secret: Option<String>,
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub kdf_iterations: u32,
    pub rls_audit_mode: AuditMode,
    /// Whether malformed/expired sessions force a sign-out by default.
    pub force_sign_out: bool,
    pub batch_chunk_size: usize,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    pub fn from_env() -> Result<Self, CoreError> {
        let kdf_iterations = match var(env::ENV_KDF_ITERATIONS) {
            Ok(raw) => raw.parse::<u32>().map_err(|_| {
                CoreError::Configuration(format!(
                    "{} must be a positive integer, got '{}'",
                    env::ENV_KDF_ITERATIONS,
                    raw
                ))
            })?,
            Err(_) => crypto::DEFAULT_KDF_ITERATIONS,
        };
        if kdf_iterations == 0 {
            return Err(CoreError::Configuration(format!(
                "{} must be non-zero",
                env::ENV_KDF_ITERATIONS
            )));
        }

        let batch_chunk_size = match var(env::ENV_BATCH_CHUNK_SIZE) {
            Ok(raw) => raw.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                CoreError::Configuration(format!(
                    "{} must be a positive integer, got '{}'",
                    env::ENV_BATCH_CHUNK_SIZE,
                    raw
                ))
            })?,
            Err(_) => batch::DEFAULT_CHUNK_SIZE,
        };

        Ok(Self {
            master_secret: var(env::ENV_MASTER_SECRET).ok().filter(|s| !s.is_empty()),
            kdf_iterations,
            rls_audit_mode: AuditMode::parse_safe(
                &var(env::ENV_RLS_AUDIT_MODE).unwrap_or_else(|_| "warn".to_string()),
            ),
            force_sign_out: var(env::ENV_FORCE_SIGN_OUT)
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
            batch_chunk_size,
            log_level: var(env::ENV_LOG_LEVEL).unwrap_or_else(|_| "info".to_string()),
            log_format: var(env::ENV_LOG_FORMAT).unwrap_or_else(|_| "text".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            master_secret: None,
            kdf_iterations: crypto::DEFAULT_KDF_ITERATIONS,
            rls_audit_mode: AuditMode::Warn,
            force_sign_out: true,
            batch_chunk_size: batch::DEFAULT_CHUNK_SIZE,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_mode_parse_defaults_to_warn() {
        assert_eq!(AuditMode::parse_safe("strict"), AuditMode::Strict);
        assert_eq!(AuditMode::parse_safe("OFF"), AuditMode::Off);
        assert_eq!(AuditMode::parse_safe("warn"), AuditMode::Warn);
        assert_eq!(AuditMode::parse_safe("anything-else"), AuditMode::Warn);
    }
}
