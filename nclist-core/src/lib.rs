//! Core types shared by the nclist crates.
//!
//! [`IntervalRecord`](models::IntervalRecord) is the unit of data everywhere: the builder
//! reorders them, the index stores them, and the binary format writes them out as fixed
//! 24-byte rows. [`SublistHeader`](models::SublistHeader) describes a run of nested
//! siblings inside the reordered record array.
pub mod consts;
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::{NclistError, Result};
