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

//! tessera-core: the tenant-scoped data-access and session-security layer
//! of the Tessera CRM.
//!
//! This library enforces tenant isolation on every data operation, persists
//! the active-tenant selection encrypted at rest, audits every mutation,
//! verifies row-level-isolation compliance, merges duplicate records with a
//! remote-then-local fallback, and validates session token integrity.
//! Presentation layers consume the [`core::crm_core::CrmCore`] facade and
//! its event stream.

pub mod backend;
pub mod config;
pub mod core;
pub mod utils;
