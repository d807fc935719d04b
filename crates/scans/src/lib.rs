//! Scan records domain module.
//!
//! One record per physical egg observation, with a forward-only lifecycle.
//! Pure domain logic (no IO, no storage).

pub mod scan;

pub use scan::{ScanParts, ScanRecord, ScanStatus};
