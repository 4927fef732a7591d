//! Grid field identifiers

use std::fmt;

/// Column grid fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnField {
    Name,
    Type,
    IsPK,
    IsNotNull,
    IsUnique,
    IsBinary,
    IsUnsigned,
    IsZerofill,
    IsAutoIncrement,
    Default,
    Comment,
}

impl ColumnField {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnField::Name => "Name",
            ColumnField::Type => "Type",
            ColumnField::IsPK => "PK",
            ColumnField::IsNotNull => "NN",
            ColumnField::IsUnique => "UQ",
            ColumnField::IsBinary => "BIN",
            ColumnField::IsUnsigned => "UN",
            ColumnField::IsZerofill => "ZF",
            ColumnField::IsAutoIncrement => "AI",
            ColumnField::Default => "Default",
            ColumnField::Comment => "Comment",
        }
    }

    /// Type flag toggled by a checkbox field
    pub(crate) fn type_flag(&self) -> Option<&'static str> {
        match self {
            ColumnField::IsBinary => Some("BINARY"),
            ColumnField::IsUnsigned => Some("UNSIGNED"),
            ColumnField::IsZerofill => Some("ZEROFILL"),
            _ => None,
        }
    }

    pub fn is_checkbox(&self) -> bool {
        !matches!(
            self,
            ColumnField::Name | ColumnField::Type | ColumnField::Default | ColumnField::Comment
        )
    }
}

/// Index grid fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    Name,
    Type,
    Comment,
    Visible,
}

impl IndexField {
    pub fn name(&self) -> &'static str {
        match self {
            IndexField::Name => "Index Name",
            IndexField::Type => "Type",
            IndexField::Comment => "Comment",
            IndexField::Visible => "Visible",
        }
    }
}

/// Foreign key grid fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignKeyField {
    Name,
    /// `schema.table`; set through `set_foreign_key_referenced_table`
    ReferencedTable,
    OnUpdate,
    OnDelete,
    /// Backing index, maintained automatically
    Index,
}

impl ForeignKeyField {
    pub fn name(&self) -> &'static str {
        match self {
            ForeignKeyField::Name => "Foreign Key Name",
            ForeignKeyField::ReferencedTable => "Referenced Table",
            ForeignKeyField::OnUpdate => "On Update",
            ForeignKeyField::OnDelete => "On Delete",
            ForeignKeyField::Index => "Index",
        }
    }
}

/// Which referential rule of a foreign key an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    OnUpdate,
    OnDelete,
}

impl RuleKind {
    pub fn sql_clause(&self) -> &'static str {
        match self {
            RuleKind::OnUpdate => "ON UPDATE",
            RuleKind::OnDelete => "ON DELETE",
        }
    }
}

/// A grid cell value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Flag(_) => None,
        }
    }

    /// Checkbox state; text values `1`/`true`/`yes` count as set
    pub fn as_flag(&self) -> bool {
        match self {
            FieldValue::Flag(flag) => *flag,
            FieldValue::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Flag(flag) => write!(f, "{}", if *flag { 1 } else { 0 }),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}
