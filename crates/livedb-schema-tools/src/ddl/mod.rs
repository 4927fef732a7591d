//! MySQL DDL parsing into catalog objects

mod column_type;
mod mysql;
mod table;
mod tokens;

#[cfg(test)]
mod tests;

pub use column_type::resolve_column_type;
pub use mysql::MySqlDdlParser;
