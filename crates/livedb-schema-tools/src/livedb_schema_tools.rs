//! LiveDB Schema Tools - catalog comparison, alter scripts and DDL parsing
//!
//! This crate provides functionality for:
//! - Comparing a server catalog snapshot with the client (edited) snapshot
//! - Generating the ordered alter script that turns one into the other
//! - Parsing MySQL DDL back into catalog objects (`MySqlDdlParser`)

pub mod compare;
pub mod ddl;
mod engine;
pub mod migration;

pub use compare::*;
pub use ddl::*;
pub use engine::*;
pub use migration::*;
