//! Core of the tessera data-access and session-security layer.
//!
//! Leaves first: crypto envelope and key-value store, then the tenant
//! context manager, the filterable data access layer, the compliance and
//! observability pieces, the merge engine, the session validator, and the
//! facade tying them together.

pub mod access;
pub mod audit;
pub mod constants;
pub mod crm_core;
pub mod crypto;
pub mod errors;
pub mod events;
pub mod filter;
pub mod merge;
pub mod models;
pub mod observer;
pub mod rls;
pub mod session;
pub mod store;
pub mod tenant;
pub mod traits;
