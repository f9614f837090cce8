//! Backend implementations of the core's data seam.

pub mod memory;
