//! Output storage shared by host workers and the accelerator, and the merge
//! step that turns both sides' writes into one result.

pub mod compact;
pub mod merge;
pub mod result;

pub use compact::CompactBuffer;
pub use merge::{merge_partitioned, MergeReport};
pub use result::ResultBuffer;
