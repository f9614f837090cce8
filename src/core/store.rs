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

//! Encrypted Key-Value Store.
//!
//! Wraps a device-local key-value backend; values round-trip as JSON through
//! the cryptographic envelope. One entry per logical key, namespaced with a
//! fixed prefix.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::core::constants::store::KEY_PREFIX;
use crate::core::crypto::Envelope;
use crate::core::errors::StoreError;

/// Device-local persistent key-value storage. Implementations hold opaque
/// strings; encryption happens a layer above.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, String>>,
}

impl KeyValueBackend for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().expect("kv lock poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("kv lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().expect("kv lock poisoned").remove(key);
        Ok(())
    }
}

/// File-backed backend: a single JSON document of key → opaque value,
/// rewritten on every mutation. Suitable for the rare, user-driven writes
/// this layer performs (tenant switches, salt generation).
pub struct FileKv {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKv {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl KeyValueBackend for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().expect("kv lock poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        entries.remove(key);
        self.flush(&entries)
    }
}

/// JSON-serializable values, sealed through the envelope, one storage entry
/// per logical key.
pub struct EncryptedStore {
    kv: std::sync::Arc<dyn KeyValueBackend>,
    envelope: Envelope,
}

impl EncryptedStore {
    pub fn new(kv: std::sync::Arc<dyn KeyValueBackend>, envelope: Envelope) -> Self {
        Self { kv, envelope }
    }

    fn namespaced(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(sealed) = self.kv.get(&Self::namespaced(key))? else {
            return Ok(None);
        };
        let plaintext = self.envelope.open(&sealed)?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(value)?;
        let sealed = self.envelope.seal(&plaintext)?;
        self.kv.set(&Self::namespaced(key), &sealed)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.kv.remove(&Self::namespaced(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn fast_config() -> Config {
        Config {
            kdf_iterations: 1_000,
            ..Config::default()
        }
    }

    fn encrypted_store(kv: Arc<dyn KeyValueBackend>) -> EncryptedStore {
        let envelope = Envelope::initialize(kv.as_ref(), &fast_config()).unwrap();
        EncryptedStore::new(kv, envelope)
    }

    #[test]
    fn round_trips_json_values() {
        let kv: Arc<dyn KeyValueBackend> = Arc::new(MemoryKv::default());
        let store = encrypted_store(kv);

        store
            .set("profile", &serde_json::json!({"name": "acme", "seats": 4}))
            .unwrap();
        let loaded: serde_json::Value = store.get("profile").unwrap().unwrap();
        assert_eq!(loaded["seats"], 4);

        store.remove("profile").unwrap();
        assert!(store.get::<serde_json::Value>("profile").unwrap().is_none());
    }

    #[test]
    fn entries_are_namespaced_and_opaque() {
        let kv = Arc::new(MemoryKv::default());
        let store = encrypted_store(kv.clone());
        store.set("ctx", &serde_json::json!({"tenant_id": "t1"})).unwrap();

        let raw = kv.get("tessera.v1.ctx").unwrap().unwrap();
        assert!(!raw.contains("t1"), "ciphertext must not leak plaintext");
        assert!(kv.get("ctx").unwrap().is_none());
    }

    #[test]
    fn file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let kv: Arc<dyn KeyValueBackend> = Arc::new(FileKv::open(&path).unwrap());
            let store = encrypted_store(kv);
            store.set("ctx", &serde_json::json!({"tenant_id": "acme"})).unwrap();
        }

        let kv: Arc<dyn KeyValueBackend> = Arc::new(FileKv::open(&path).unwrap());
        let store = encrypted_store(kv);
        let loaded: serde_json::Value = store.get("ctx").unwrap().unwrap();
        assert_eq!(loaded["tenant_id"], "acme");
    }

    #[test]
    fn corrupted_entry_surfaces_integrity_error() {
        let kv = Arc::new(MemoryKv::default());
        let store = encrypted_store(kv.clone());
        store.set("ctx", &serde_json::json!({"tenant_id": "t1"})).unwrap();

        // Flip a byte of the stored base64 payload.
        let raw = kv.get("tessera.v1.ctx").unwrap().unwrap();
        let mut bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            raw.as_bytes(),
        )
        .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x10;
        let tampered =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bytes);
        kv.set("tessera.v1.ctx", &tampered).unwrap();

        assert!(matches!(
            store.get::<serde_json::Value>("ctx"),
            Err(StoreError::Crypto(_))
        ));
    }
}
