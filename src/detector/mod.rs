//! Symbol location in a binarized frame.
//!
//! Finder patterns (the three corner squares) are found by run-length
//! scanning; grouping and ordering them into symbols happens in the
//! frame pipeline.

/// Finder pattern detection using 1:1:3:1:1 ratio scanning
pub mod finder;

pub use finder::{FinderDetector, FinderPattern, FinderTriple};
