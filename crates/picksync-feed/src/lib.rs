//! HTTP client for the warehouse ERP feed.
//!
//! Fetches pick-request records and product/location stock candidates; the
//! reconciliation itself lives in `picksync-db`.

mod client;
mod error;

pub use client::{FeedClient, StockCandidate};
pub use error::FeedError;
