//! Detail records cached on tree nodes and their HTML descriptions

use livedb_core::ForeignKeyAction;

const TABLE_OPEN: &str = "<table style=\"border: none; border-collapse: collapse;\">";
const TABLE_CLOSE: &str = "</table>";

/// One row of a details box
pub(crate) fn detail_row(label: &str, value: &str) -> String {
    format!(
        "<tr><td style=\"border:none; padding-left: 15px;\">{}</td>\
         <td style=\"border:none; padding-left: 15px;\"><font color='#717171'>{}</font></td></tr>",
        label, value
    )
}

/// Heading of a full description: `<b>Table:</b> <name>`
pub(crate) fn heading(type_name: &str, name: &str) -> String {
    format!(
        "<b>{}:</b> <font color='#148814'><b>{}</b></font><br><br>",
        type_name,
        escape_html(name)
    )
}

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Column of a table or view as shown in the tree
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnDetail {
    pub name: String,
    /// Formatted type, e.g. `int(10) UN AI`
    pub type_name: String,
    pub default_value: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub is_pk: bool,
    /// Part of the primary key, or NOT NULL and unique
    pub is_id: bool,
    /// Part of any index
    pub is_idx: bool,
    pub is_not_null: bool,
}

impl ColumnDetail {
    /// A single detail row: the name (bold when indexed, underlined when PK) and type
    pub fn details_fragment(&self) -> String {
        let mut html_name = escape_html(&self.name);
        if self.is_pk || self.is_idx {
            if self.is_pk {
                html_name = format!("<u>{}</u>", html_name);
            }
            html_name = format!("<b>{}</b>", html_name);
        }

        let mut html_type = escape_html(&self.type_name);
        if self.is_pk {
            html_type.push_str(" PK");
        }

        detail_row(&html_name, &html_type)
    }

    pub(crate) fn full_details(&self, type_name: &str) -> String {
        let mut html = heading(type_name, &self.name);
        if let Some(collation) = &self.collation {
            html.push_str("<b>Collation:</b>  ");
            html.push_str(&escape_html(collation));
            html.push_str("<br><br>");
        }
        html.push_str("<b>Definition:</b>");
        html.push_str(TABLE_OPEN);
        html.push_str(&self.details_fragment());
        html.push_str(TABLE_CLOSE);
        html.push_str("<br><br>");
        html
    }
}

/// Index of a table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexDetail {
    pub name: String,
    /// Index method as reported by the server (BTREE, FULLTEXT, HASH, ...)
    pub index_type: String,
    pub unique: bool,
    pub visible: bool,
    pub columns: Vec<String>,
}

impl IndexDetail {
    pub fn details_fragment(&self) -> String {
        let mut html = String::from(TABLE_OPEN);
        html.push_str(&detail_row("Type", &self.index_type));
        html.push_str(&detail_row("Unique", yes_no(self.unique)));
        html.push_str(&detail_row("Visible", yes_no(self.visible)));
        for (position, column) in self.columns.iter().enumerate() {
            let label = if position == 0 { "Columns" } else { "" };
            html.push_str(&detail_row(label, &escape_html(column)));
        }
        html.push_str(TABLE_CLOSE);
        html
    }
}

/// Trigger of a table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerDetail {
    pub name: String,
    pub event: String,
    pub timing: String,
}

impl TriggerDetail {
    pub fn details_fragment(&self) -> String {
        let mut html = String::from(TABLE_OPEN);
        html.push_str(&detail_row("Event", &self.event));
        html.push_str(&detail_row("Timing", &self.timing));
        html.push_str(TABLE_CLOSE);
        html
    }
}

/// Foreign key of a table, as parsed from its DDL
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForeignKeyDetail {
    pub name: String,
    pub referenced_table: String,
    /// Comma-separated source columns
    pub from_columns: String,
    /// Comma-separated referenced columns
    pub to_columns: String,
    pub update_rule: ForeignKeyAction,
    pub delete_rule: ForeignKeyAction,
}

impl ForeignKeyDetail {
    pub fn details_fragment(&self) -> String {
        let target = format!(
            "{} ({} \u{2192} {})",
            escape_html(&self.referenced_table),
            escape_html(&self.from_columns),
            escape_html(&self.to_columns)
        );
        let mut html = String::from(TABLE_OPEN);
        html.push_str(&detail_row("Target", &target));
        html.push_str(&detail_row("On Update", self.update_rule.as_sql()));
        html.push_str(&detail_row("On Delete", self.delete_rule.as_sql()));
        html.push_str(TABLE_CLOSE);
        html
    }
}

/// Object names of one schema, as returned by a contents fetch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaContents {
    pub tables: Vec<String>,
    pub views: Vec<String>,
    pub procedures: Vec<String>,
    pub functions: Vec<String>,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Wrap column rows of a table or view description
pub(crate) fn columns_table(rows: &[String]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut html = String::from("<b>Columns:</b>");
    html.push_str(TABLE_OPEN);
    for row in rows {
        html.push_str(row);
    }
    html.push_str(TABLE_CLOSE);
    html.push_str("<br><br>");
    html
}

/// Full description of an index, trigger or foreign key node
pub(crate) fn definition_block(type_name: &str, name: &str, fragment: &str) -> String {
    let mut html = heading(type_name, name);
    html.push_str("<b>Definition:</b><br>");
    html.push_str(fragment);
    html
}
