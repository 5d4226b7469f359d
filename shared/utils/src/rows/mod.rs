//! Business-card row processing
//!
//! Pure functions applied to model output: per-row normalization and
//! batch-wide deduplication.

pub mod dedupe;
pub mod normalize;


pub use dedupe::{dedup_key, deduplicate_rows};
pub use normalize::{normalize_row, RawRow};
