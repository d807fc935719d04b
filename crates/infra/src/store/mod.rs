//! Marketplace persistence boundary.
//!
//! Relational storage for scan records, listings, orders and order items,
//! accessed only through transactions so that each unit of work commits or
//! rolls back as a whole.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryMarketStore;
pub use postgres::PostgresMarketStore;
pub use r#trait::{GradeCount, MarketStore, MarketTx, StoreError};
