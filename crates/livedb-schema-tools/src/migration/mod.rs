//! Alter script generation module
//!
//! Provides tools for turning catalog changes into ordered MySQL DDL.

mod generator;
mod script;


pub use generator::*;
pub use script::*;
