//! Patch sequence bookkeeping
//!
//! A sequence file lists patch files in the order they must be applied,
//! with `#` comments describing releases. This crate loads such files,
//! selects a range of patches and concatenates them into one script.

pub mod entry;

pub use entry::{Entry, EntrySequence, SequenceError, HISTORY_PATCH};
