//! Listings domain module.
//!
//! A listing is the cached, priced view over one seller's listed scans of one
//! grade. Scan status stays the source of truth; this crate only holds the
//! header rules (uniform price, `stock == 0 ⇒ inactive`) and publish input
//! validation.

pub mod listing;

pub use listing::{Listing, ListingParts, ListingStatus, PublishListing, PublishPlan};
