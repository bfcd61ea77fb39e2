//! Text-level log processing: similarity scoring, windowed deduplication,
//! structural compaction and marker-delimited block extraction.

mod blocks;
mod compact;
mod dedup;
mod similarity;

pub use blocks::{extract_block, Extraction};
pub use compact::{compact, CompactionLevel};
