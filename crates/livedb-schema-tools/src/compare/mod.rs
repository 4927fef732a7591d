//! Catalog comparison module
//!
//! Provides tools for comparing a server catalog snapshot with a client
//! snapshot and describing the differences.

mod comparator;
mod diff;


pub use comparator::*;
pub use diff::*;
