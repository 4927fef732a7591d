//! Data type information
//!
//! The registry of MySQL simple datatypes and the built-in user datatypes
//! (aliases such as `BOOL`), plus the typed reference a column holds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a simple datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeGroup {
    Numeric,
    String,
    Text,
    Blob,
    DateTime,
    Geometry,
    Json,
    /// ENUM and SET
    Various,
}

impl DataTypeGroup {
    /// Get display name for the group
    pub fn display_name(&self) -> &'static str {
        match self {
            DataTypeGroup::Numeric => "Numeric Types",
            DataTypeGroup::String => "Strings",
            DataTypeGroup::Text => "Text Types",
            DataTypeGroup::Blob => "Blob Types",
            DataTypeGroup::DateTime => "Date and Time Types",
            DataTypeGroup::Geometry => "Spatial Types",
            DataTypeGroup::Json => "JSON",
            DataTypeGroup::Various => "Various",
        }
    }
}

/// Which parenthesised parameters a type accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeParams {
    None,
    /// `(n)`: character length, display width or fractional seconds
    Length,
    /// `(p)` or `(p,s)`
    Precision,
    /// `('a','b',...)`
    Values,
}

/// Information about a simple (built-in) datatype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleDatatype {
    /// Type name as used in SQL
    pub name: String,
    /// Category for grouping
    pub group: DataTypeGroup,
    /// Accepted parameters
    pub params: TypeParams,
    /// Alternative spellings accepted by the server
    pub synonyms: Vec<String>,
    /// Column flags valid for this type (e.g. UNSIGNED, ZEROFILL, BINARY)
    pub flags: Vec<String>,
    /// Fixed numeric scale, `Some(0)` for integer types
    pub numeric_scale: Option<u32>,
}

impl SimpleDatatype {
    fn new(name: &str, group: DataTypeGroup, params: TypeParams) -> Self {
        Self {
            name: name.to_string(),
            group,
            params,
            synonyms: Vec::new(),
            flags: Vec::new(),
            numeric_scale: None,
        }
    }

    fn with_flags(mut self, flags: &[&str]) -> Self {
        self.flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    fn with_synonyms(mut self, synonyms: &[&str]) -> Self {
        self.synonyms = synonyms.iter().map(|s| s.to_string()).collect();
        self
    }

    fn integral(mut self) -> Self {
        self.numeric_scale = Some(0);
        self
    }

    /// Whether `name` names this type (case-insensitive, synonyms included)
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.synonyms.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Whether `flag` may be set on a column of this type
    pub fn accepts_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    /// Whether default values of this type are written as quoted literals
    pub fn is_string_like(&self) -> bool {
        matches!(
            self.group,
            DataTypeGroup::String | DataTypeGroup::Text | DataTypeGroup::Various
        )
    }
}

/// A user datatype: a named alias for a simple type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDatatype {
    pub name: String,
    /// The simple type the alias expands to (e.g. `TINYINT(1)`)
    pub definition: String,
    /// Flags carried by the alias itself
    pub flags: Vec<String>,
}

/// Get the simple datatypes understood by MySQL
pub fn mysql_simple_datatypes() -> Vec<SimpleDatatype> {
    use DataTypeGroup as G;
    use TypeParams as P;

    let numeric_flags = ["UNSIGNED", "ZEROFILL"];
    let char_flags = ["BINARY"];

    vec![
        SimpleDatatype::new("TINYINT", G::Numeric, P::Length)
            .with_flags(&numeric_flags)
            .integral(),
        SimpleDatatype::new("SMALLINT", G::Numeric, P::Length)
            .with_flags(&numeric_flags)
            .integral(),
        SimpleDatatype::new("MEDIUMINT", G::Numeric, P::Length)
            .with_flags(&numeric_flags)
            .integral(),
        SimpleDatatype::new("INT", G::Numeric, P::Length)
            .with_synonyms(&["INTEGER"])
            .with_flags(&numeric_flags)
            .integral(),
        SimpleDatatype::new("BIGINT", G::Numeric, P::Length)
            .with_flags(&numeric_flags)
            .integral(),
        SimpleDatatype::new("DECIMAL", G::Numeric, P::Precision)
            .with_synonyms(&["DEC", "NUMERIC", "FIXED"])
            .with_flags(&numeric_flags),
        SimpleDatatype::new("FLOAT", G::Numeric, P::Precision).with_flags(&numeric_flags),
        SimpleDatatype::new("DOUBLE", G::Numeric, P::Precision)
            .with_synonyms(&["REAL", "DOUBLE PRECISION"])
            .with_flags(&numeric_flags),
        SimpleDatatype::new("BIT", G::Numeric, P::Length).integral(),
        SimpleDatatype::new("CHAR", G::String, P::Length)
            .with_synonyms(&["CHARACTER"])
            .with_flags(&char_flags),
        SimpleDatatype::new("VARCHAR", G::String, P::Length)
            .with_synonyms(&["CHARACTER VARYING"])
            .with_flags(&char_flags),
        SimpleDatatype::new("BINARY", G::Blob, P::Length),
        SimpleDatatype::new("VARBINARY", G::Blob, P::Length),
        SimpleDatatype::new("TINYTEXT", G::Text, P::None).with_flags(&char_flags),
        SimpleDatatype::new("TEXT", G::Text, P::Length).with_flags(&char_flags),
        SimpleDatatype::new("MEDIUMTEXT", G::Text, P::None).with_flags(&char_flags),
        SimpleDatatype::new("LONGTEXT", G::Text, P::None).with_flags(&char_flags),
        SimpleDatatype::new("TINYBLOB", G::Blob, P::None),
        SimpleDatatype::new("BLOB", G::Blob, P::Length),
        SimpleDatatype::new("MEDIUMBLOB", G::Blob, P::None),
        SimpleDatatype::new("LONGBLOB", G::Blob, P::None),
        SimpleDatatype::new("DATE", G::DateTime, P::None),
        SimpleDatatype::new("TIME", G::DateTime, P::Length),
        SimpleDatatype::new("DATETIME", G::DateTime, P::Length),
        SimpleDatatype::new("TIMESTAMP", G::DateTime, P::Length),
        SimpleDatatype::new("YEAR", G::DateTime, P::Length),
        SimpleDatatype::new("GEOMETRY", G::Geometry, P::None),
        SimpleDatatype::new("POINT", G::Geometry, P::None),
        SimpleDatatype::new("LINESTRING", G::Geometry, P::None),
        SimpleDatatype::new("POLYGON", G::Geometry, P::None),
        SimpleDatatype::new("MULTIPOINT", G::Geometry, P::None),
        SimpleDatatype::new("MULTILINESTRING", G::Geometry, P::None),
        SimpleDatatype::new("MULTIPOLYGON", G::Geometry, P::None),
        SimpleDatatype::new("GEOMETRYCOLLECTION", G::Geometry, P::None),
        SimpleDatatype::new("JSON", G::Json, P::None),
        SimpleDatatype::new("ENUM", G::Various, P::Values).with_flags(&char_flags),
        SimpleDatatype::new("SET", G::Various, P::Values).with_flags(&char_flags),
    ]
}

/// Get the built-in user datatypes
pub fn mysql_user_datatypes() -> Vec<UserDatatype> {
    ["BOOL", "BOOLEAN"]
        .into_iter()
        .map(|name| UserDatatype {
            name: name.to_string(),
            definition: "TINYINT(1)".to_string(),
            flags: Vec::new(),
        })
        .collect()
}

/// A concrete use of a simple datatype, with its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleType {
    /// Canonical (upper-case) type name
    pub name: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    /// Explicit value list for ENUM/SET, without the surrounding parentheses
    pub values: Option<String>,
}

impl SimpleType {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_uppercase(),
            length: None,
            precision: None,
            scale: None,
            values: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn with_values(mut self, values: impl Into<String>) -> Self {
        self.values = Some(values.into());
        self
    }
}

impl fmt::Display for SimpleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(values) = &self.values {
            write!(f, "({})", values)
        } else if let Some(length) = self.length {
            write!(f, "({})", length)
        } else if let Some(precision) = self.precision {
            match self.scale {
                Some(scale) => write!(f, "({},{})", precision, scale),
                None => write!(f, "({})", precision),
            }
        } else {
            Ok(())
        }
    }
}

/// The datatype a column references: exactly one of simple or user type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Simple(SimpleType),
    User { name: String, definition: String },
}

impl ColumnType {
    /// Type name without parameters
    pub fn name(&self) -> &str {
        match self {
            ColumnType::Simple(simple) => &simple.name,
            ColumnType::User { name, .. } => name,
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleType> {
        match self {
            ColumnType::Simple(simple) => Some(simple),
            ColumnType::User { .. } => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Simple(simple) => write!(f, "{}", simple),
            ColumnType::User { name, .. } => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonym_lookup() {
        let types = mysql_simple_datatypes();
        let int = types.iter().find(|t| t.matches("integer")).expect("INT");
        assert_eq!(int.name, "INT");
        assert!(int.accepts_flag("unsigned"));
        assert!(!int.accepts_flag("BINARY"));
    }

    #[test]
    fn test_simple_type_display() {
        assert_eq!(SimpleType::named("varchar").with_length(45).to_string(), "VARCHAR(45)");
        assert_eq!(
            SimpleType::named("decimal").with_precision(10, Some(2)).to_string(),
            "DECIMAL(10,2)"
        );
        assert_eq!(
            SimpleType::named("enum").with_values("'a','b'").to_string(),
            "ENUM('a','b')"
        );
    }
}
