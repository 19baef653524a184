//! Transaction record normalization.

mod normalize;

pub use normalize::{normalize_transaction, parse_block_time, NormalizedTransaction};
