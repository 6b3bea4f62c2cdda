//! Spot Pricing Domain
//!
//! Concurrent multi-region spot price queries: resolve regions and instance
//! types, fan out one price history query per region, merge and rank.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← Resolution, fan-out/join, empty-result handling
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Source    │  ← Remote pricing service (trait + in-memory impl)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Quotes, filters, matcher, ranker
//! └─────────────┘
//! ```

pub mod error;
pub mod matcher;
pub mod models;
pub mod ranker;
pub mod service;
pub mod source;

// Re-export commonly used types
pub use error::{SpotError, SpotResult};
pub use matcher::{dedup_preserving_order, match_patterns, PatternSet};
pub use models::{
    expand_product, parse_price, parse_products, InstanceTypePage, MaxPrice, PriceQuote,
    QueryFilter, SpotPriceHistoryRequest, SpotPriceRecord, REPORT_HEADER,
};
pub use ranker::{rank, rank_by, SortField};
pub use service::{PriceQuery, ResolvedRegions, SpotPriceService};
pub use source::{InMemorySpotPriceSource, SpotPriceSource};
