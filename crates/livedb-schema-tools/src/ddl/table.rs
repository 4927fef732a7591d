//! CREATE TABLE parsing into a catalog-independent form

use sqlparser::tokenizer::Token;

use livedb_core::{ForeignKeyAction, IndexType};

use super::tokens::{Cursor, SyntaxError, SyntaxResult, is_keyword, render};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParsedColumn {
    pub name: String,
    pub type_text: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub auto_increment: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedIndexColumn {
    pub name: String,
    pub length: Option<u32>,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedIndex {
    pub name: String,
    pub index_type: IndexType,
    pub columns: Vec<ParsedIndexColumn>,
    pub comment: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_schema: Option<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub update_rule: ForeignKeyAction,
    pub delete_rule: ForeignKeyAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParsedTable {
    pub schema: Option<String>,
    pub name: String,
    pub columns: Vec<ParsedColumn>,
    pub indexes: Vec<ParsedIndex>,
    pub foreign_keys: Vec<ParsedForeignKey>,
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub comment: String,
}

/// Parse the statement after `CREATE [TEMPORARY] TABLE`
pub(crate) fn parse_create_table(cursor: &mut Cursor<'_>) -> SyntaxResult<ParsedTable> {
    cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
    let (schema, name) = cursor.qualified_name()?;
    let mut table = ParsedTable {
        schema,
        name,
        ..Default::default()
    };

    if cursor.peek_keyword("LIKE") || cursor.peek_keyword("AS") || cursor.peek_keyword("SELECT") {
        return Err(SyntaxError::new(
            "CREATE TABLE ... LIKE/SELECT cannot be edited",
        ));
    }

    let body = cursor.group()?;
    for item in split_items(body) {
        parse_item(&mut Cursor::new(item), &mut table)?;
    }

    parse_table_options(cursor, &mut table)?;
    assign_index_names(&mut table);
    for (i, fk) in table.foreign_keys.iter_mut().enumerate() {
        if fk.name.is_empty() {
            fk.name = format!("{}_ibfk_{}", table.name, i + 1);
        }
    }
    Ok(table)
}

/// Split a token list at top-level commas
fn split_items(tokens: &[Token]) -> Vec<&[Token]> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                items.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&tokens[start..]);
    items.retain(|item| !item.is_empty());
    items
}

fn parse_item(cursor: &mut Cursor<'_>, table: &mut ParsedTable) -> SyntaxResult<()> {
    let mut constraint_name = None;
    if cursor.eat_keyword("CONSTRAINT")
        && !cursor.peek_any_keyword(&["PRIMARY", "UNIQUE", "FOREIGN", "CHECK"])
    {
        constraint_name = Some(cursor.identifier()?);
    }

    if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
        let mut index = parse_index_tail(cursor, IndexType::Primary, false)?;
        index.name = "PRIMARY".to_string();
        table.indexes.push(index);
    } else if cursor.eat_keyword("UNIQUE") {
        cursor.eat_one_of(&["INDEX", "KEY"]);
        let mut index = parse_index_tail(cursor, IndexType::Unique, true)?;
        if index.name.is_empty()
            && let Some(name) = constraint_name
        {
            index.name = name;
        }
        table.indexes.push(index);
    } else if cursor.eat_keywords(&["FOREIGN", "KEY"]) {
        table.foreign_keys.push(parse_foreign_key(cursor, constraint_name)?);
    } else if cursor.eat_keyword("CHECK") {
        // Check constraints are not tracked
    } else if constraint_name.is_some() {
        return Err(cursor.unexpected("constraint"));
    } else if cursor.eat_one_of(&["INDEX", "KEY"]).is_some() {
        table
            .indexes
            .push(parse_index_tail(cursor, IndexType::Index, true)?);
    } else if let Some(kind) = cursor.eat_one_of(&["FULLTEXT", "SPATIAL"]) {
        cursor.eat_one_of(&["INDEX", "KEY"]);
        let index_type = if kind == "FULLTEXT" {
            IndexType::Fulltext
        } else {
            IndexType::Spatial
        };
        table
            .indexes
            .push(parse_index_tail(cursor, index_type, true)?);
    } else {
        parse_column(cursor, table)?;
    }
    Ok(())
}

// ========== Columns ==========

const TYPE_FLAGS: &[&str] = &["UNSIGNED", "SIGNED", "ZEROFILL", "BINARY"];

fn parse_column(cursor: &mut Cursor<'_>, table: &mut ParsedTable) -> SyntaxResult<()> {
    let name = cursor.identifier()?;
    let mut column = ParsedColumn {
        name: name.clone(),
        type_text: parse_type_text(cursor)?,
        ..Default::default()
    };

    while !cursor.is_done() {
        if cursor.eat_keywords(&["NOT", "NULL"]) {
            column.not_null = true;
        } else if cursor.eat_keyword("NULL") {
            column.not_null = false;
        } else if cursor.eat_keyword("DEFAULT") {
            column.default_value = Some(parse_default(cursor)?);
        } else if cursor.eat_keyword("AUTO_INCREMENT") {
            column.auto_increment = true;
        } else if cursor.eat_keywords(&["PRIMARY", "KEY"]) || cursor.eat_keyword("KEY") {
            column.not_null = true;
            table.indexes.push(single_column_index("PRIMARY", IndexType::Primary, &name));
        } else if cursor.eat_keyword("UNIQUE") {
            cursor.eat_keyword("KEY");
            table.indexes.push(single_column_index(&name, IndexType::Unique, &name));
        } else if cursor.eat_keyword("COMMENT") {
            column.comment = cursor.string_literal()?;
        } else if cursor.eat_keywords(&["CHARACTER", "SET"]) || cursor.eat_keyword("CHARSET") {
            column.charset = Some(cursor.option_value()?);
        } else if cursor.eat_keyword("COLLATE") {
            column.collation = Some(cursor.option_value()?);
        } else if cursor.eat_keywords(&["ON", "UPDATE"]) {
            parse_default(cursor)?;
        } else if cursor.eat_keywords(&["GENERATED", "ALWAYS"]) {
            cursor.expect_keyword("AS")?;
            cursor.group()?;
        } else if cursor.eat_keyword("AS") {
            cursor.group()?;
        } else {
            cursor.skip_item()?;
        }
    }

    table.columns.push(column);
    Ok(())
}

/// Type name, optional parameter group and type flags, as one text
fn parse_type_text(cursor: &mut Cursor<'_>) -> SyntaxResult<String> {
    let mut text = match cursor.advance() {
        Some(Token::Word(word)) if word.quote_style.is_none() => word.value.clone(),
        _ => return Err(SyntaxError::new("syntax error: expected datatype")),
    };
    if let Some(second) = cursor.eat_one_of(&["PRECISION", "VARYING"]) {
        text.push(' ');
        text.push_str(&second);
    }
    if cursor.peek() == Some(&Token::LParen) {
        let params = cursor.group()?;
        text.push('(');
        text.push_str(&render(params));
        text.push(')');
    }
    while let Some(flag) = cursor.eat_one_of(TYPE_FLAGS) {
        // SIGNED is the default and not stored
        if flag != "SIGNED" {
            text.push(' ');
            text.push_str(&flag);
        }
    }
    Ok(text)
}

/// Default value as written: literal, signed number, function call or `(expr)`
fn parse_default(cursor: &mut Cursor<'_>) -> SyntaxResult<String> {
    let mut consumed: Vec<Token> = Vec::new();
    if matches!(cursor.peek(), Some(Token::Minus | Token::Plus))
        && let Some(sign) = cursor.advance()
    {
        consumed.push(sign.clone());
    }
    match cursor.peek() {
        Some(Token::LParen) => {
            let inner = cursor.group()?;
            return Ok(format!("({})", render(inner)));
        }
        Some(token) => {
            consumed.push(token.clone());
            cursor.advance();
        }
        None => return Err(cursor.unexpected("default value")),
    }
    let mut text = match consumed.as_slice() {
        [sign, Token::Number(n, _)] => format!("{}{}", sign, n),
        tokens => render(tokens),
    };
    if cursor.peek() == Some(&Token::LParen) {
        let args = cursor.group()?;
        text.push('(');
        text.push_str(&render(args));
        text.push(')');
    }
    Ok(text)
}

// ========== Indexes ==========

fn single_column_index(name: &str, index_type: IndexType, column: &str) -> ParsedIndex {
    ParsedIndex {
        name: name.to_string(),
        index_type,
        columns: vec![ParsedIndexColumn {
            name: column.to_string(),
            length: None,
            descending: false,
        }],
        comment: String::new(),
        visible: true,
    }
}

/// `[name] [USING x] (key_part, ...) [options]`
fn parse_index_tail(
    cursor: &mut Cursor<'_>,
    index_type: IndexType,
    named: bool,
) -> SyntaxResult<ParsedIndex> {
    let mut name = String::new();
    if named && matches!(cursor.peek(), Some(Token::Word(_))) && !cursor.peek_keyword("USING") {
        name = cursor.identifier()?;
    }
    if cursor.eat_keyword("USING") {
        cursor.option_value()?;
    }

    let mut columns = Vec::new();
    for part in split_items(cursor.group()?) {
        let mut part_cursor = Cursor::new(part);
        if part_cursor.peek() == Some(&Token::LParen) {
            return Err(SyntaxError::new("functional index parts are not supported"));
        }
        let column = part_cursor.identifier()?;
        let length = if part_cursor.peek() == Some(&Token::LParen) {
            let inner = part_cursor.group()?;
            Some(Cursor::new(inner).number()?)
        } else {
            None
        };
        let descending = part_cursor.eat_keyword("DESC");
        part_cursor.eat_keyword("ASC");
        columns.push(ParsedIndexColumn {
            name: column,
            length,
            descending,
        });
    }

    let mut index = ParsedIndex {
        name,
        index_type,
        columns,
        comment: String::new(),
        visible: true,
    };
    while !cursor.is_done() {
        if cursor.eat_keyword("COMMENT") {
            index.comment = cursor.string_literal()?;
        } else if cursor.eat_keyword("INVISIBLE") {
            index.visible = false;
        } else if cursor.eat_keyword("VISIBLE") {
            index.visible = true;
        } else if cursor.eat_keyword("USING") || cursor.eat_keyword("KEY_BLOCK_SIZE") {
            cursor.eat_equals();
            cursor.option_value()?;
        } else if cursor.eat_keywords(&["WITH", "PARSER"]) {
            cursor.identifier()?;
        } else {
            cursor.skip_item()?;
        }
    }
    Ok(index)
}

/// Unnamed indexes take the name of their first column, made unique
fn assign_index_names(table: &mut ParsedTable) {
    for i in 0..table.indexes.len() {
        if !table.indexes[i].name.is_empty() {
            continue;
        }
        let base = table.indexes[i]
            .columns
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "index".to_string());
        let mut candidate = base.clone();
        let mut suffix = 2;
        while table
            .indexes
            .iter()
            .any(|other| other.name.eq_ignore_ascii_case(&candidate))
        {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        table.indexes[i].name = candidate;
    }
}

// ========== Foreign Keys ==========

fn parse_foreign_key(
    cursor: &mut Cursor<'_>,
    constraint_name: Option<String>,
) -> SyntaxResult<ParsedForeignKey> {
    let index_name = if matches!(cursor.peek(), Some(Token::Word(_))) {
        Some(cursor.identifier()?)
    } else {
        None
    };
    let columns = identifier_list(cursor.group()?)?;
    cursor.expect_keyword("REFERENCES")?;
    let (referenced_schema, referenced_table) = cursor.qualified_name()?;
    let referenced_columns = identifier_list(cursor.group()?)?;
    if columns.len() != referenced_columns.len() {
        return Err(SyntaxError::new(
            "foreign key column count does not match referenced column count",
        ));
    }

    let mut foreign_key = ParsedForeignKey {
        name: constraint_name.or(index_name).unwrap_or_default(),
        columns,
        referenced_schema,
        referenced_table,
        referenced_columns,
        update_rule: ForeignKeyAction::Restrict,
        delete_rule: ForeignKeyAction::Restrict,
    };
    while !cursor.is_done() {
        if cursor.eat_keywords(&["ON", "DELETE"]) {
            foreign_key.delete_rule = parse_action(cursor)?;
        } else if cursor.eat_keywords(&["ON", "UPDATE"]) {
            foreign_key.update_rule = parse_action(cursor)?;
        } else if cursor.eat_keyword("MATCH") {
            cursor.identifier()?;
        } else {
            return Err(cursor.unexpected("ON DELETE or ON UPDATE"));
        }
    }
    Ok(foreign_key)
}

fn parse_action(cursor: &mut Cursor<'_>) -> SyntaxResult<ForeignKeyAction> {
    let mut words = vec![cursor.identifier()?];
    if words[0].eq_ignore_ascii_case("SET") || words[0].eq_ignore_ascii_case("NO") {
        words.push(cursor.identifier()?);
    }
    words
        .join(" ")
        .parse()
        .map_err(|e: livedb_core::LiveDbError| SyntaxError::new(e.to_string()))
}

fn identifier_list(tokens: &[Token]) -> SyntaxResult<Vec<String>> {
    split_items(tokens)
        .into_iter()
        .map(|item| Cursor::new(item).identifier())
        .collect()
}

// ========== Table Options ==========

fn parse_table_options(cursor: &mut Cursor<'_>, table: &mut ParsedTable) -> SyntaxResult<()> {
    while !cursor.is_done() {
        if cursor.peek_keyword("PARTITION") {
            break;
        }
        cursor.eat(&Token::Comma);
        cursor.eat_keyword("DEFAULT");
        if cursor.eat_keyword("ENGINE") {
            cursor.eat_equals();
            table.engine = Some(cursor.option_value()?);
        } else if cursor.eat_keywords(&["CHARACTER", "SET"]) || cursor.eat_keyword("CHARSET") {
            cursor.eat_equals();
            table.charset = Some(cursor.option_value()?);
        } else if cursor.eat_keyword("COLLATE") {
            cursor.eat_equals();
            table.collation = Some(cursor.option_value()?);
        } else if cursor.eat_keyword("COMMENT") {
            cursor.eat_equals();
            table.comment = cursor.string_literal()?;
        } else if let Some(Token::Word(_)) = cursor.peek() {
            // Other options are `NAME [=] value`
            cursor.advance();
            cursor.eat_equals();
            if !cursor.is_done() && !is_option_start(cursor.peek()) {
                cursor.skip_item()?;
            }
        } else {
            cursor.skip_item()?;
        }
    }
    Ok(())
}

fn is_option_start(token: Option<&Token>) -> bool {
    token.is_some_and(|t| {
        ["ENGINE", "DEFAULT", "CHARSET", "CHARACTER", "COLLATE", "COMMENT"]
            .iter()
            .any(|k| is_keyword(t, k))
    })
}
