//! Column type resolution against the catalog's datatype registry

use livedb_core::{Catalog, ColumnType, LiveDbError, Result, SimpleType, TypeParams, TypeSpec};

/// Resolve a column type text such as `varchar(40)`, `INT UNSIGNED` or `BOOL`.
///
/// Synonyms resolve to the canonical type name. Flags written after the
/// type must be valid for it; user types accept neither parameters nor flags.
pub fn resolve_column_type(catalog: &Catalog, text: &str) -> Result<TypeSpec> {
    let text = text.trim();
    if text.is_empty() {
        return Err(LiveDbError::Parse("empty datatype".to_string()));
    }

    let (head, params, tail) = match text.find('(') {
        Some(open) => {
            let close = matching_paren(text, open).ok_or_else(|| {
                LiveDbError::Parse(format!("unbalanced parentheses in '{}'", text))
            })?;
            (&text[..open], Some(text[open + 1..close].trim()), &text[close + 1..])
        }
        None => (text, None, ""),
    };

    let head_words: Vec<&str> = head.split_whitespace().collect();
    let (name, name_len) = type_name(catalog, &head_words).ok_or_else(|| {
        LiveDbError::Parse(format!("unknown datatype '{}'", head.trim()))
    })?;
    if params.is_some() && name_len != head_words.len() {
        return Err(LiveDbError::Parse(format!("invalid datatype '{}'", text)));
    }

    let mut flags: Vec<String> = Vec::new();
    for word in head_words[name_len..]
        .iter()
        .copied()
        .chain(tail.split_whitespace())
    {
        let flag = word.to_uppercase();
        if !flags.contains(&flag) {
            flags.push(flag);
        }
    }

    if let Some(user) = catalog.user_datatype(&name) {
        if params.is_some() || !flags.is_empty() {
            return Err(LiveDbError::Parse(format!(
                "datatype {} does not take arguments",
                user.name
            )));
        }
        return Ok(TypeSpec {
            datatype: ColumnType::User {
                name: user.name.clone(),
                definition: user.definition.clone(),
            },
            flags: user.flags.clone(),
        });
    }

    let Some(simple) = catalog.simple_datatype(&name) else {
        return Err(LiveDbError::Parse(format!("unknown datatype '{}'", name)));
    };

    let mut datatype = SimpleType::named(simple.name.clone());
    if let Some(params) = params {
        datatype = match simple.params {
            TypeParams::None => {
                return Err(LiveDbError::Parse(format!(
                    "datatype {} does not take parameters",
                    simple.name
                )));
            }
            TypeParams::Length => datatype.with_length(parse_number(params)?),
            TypeParams::Precision => match params.split_once(',') {
                Some((precision, scale)) => {
                    datatype.with_precision(parse_number(precision)?, Some(parse_number(scale)?))
                }
                None => datatype.with_precision(parse_number(params)?, None),
            },
            TypeParams::Values => {
                let values = split_values(params);
                if values.is_empty() {
                    return Err(LiveDbError::Parse(format!(
                        "datatype {} needs a value list",
                        simple.name
                    )));
                }
                datatype.with_values(values.join(","))
            }
        };
    } else if simple.params == TypeParams::Values {
        return Err(LiveDbError::Parse(format!(
            "datatype {} needs a value list",
            simple.name
        )));
    }

    if let Some(flag) = flags.iter().find(|f| !simple.accepts_flag(f)) {
        return Err(LiveDbError::Parse(format!(
            "flag {} is not valid for datatype {}",
            flag, simple.name
        )));
    }

    Ok(TypeSpec {
        datatype: ColumnType::Simple(datatype),
        flags,
    })
}

/// Longest leading word sequence (two words, then one) that names a type
fn type_name(catalog: &Catalog, words: &[&str]) -> Option<(String, usize)> {
    for len in (1..=words.len().min(2)).rev() {
        let candidate = words[..len].join(" ");
        if catalog.simple_datatype(&candidate).is_some()
            || catalog.user_datatype(&candidate).is_some()
        {
            return Some((candidate, len));
        }
    }
    None
}

fn parse_number(text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| LiveDbError::Parse(format!("invalid datatype parameter '{}'", text.trim())))
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices().skip_while(|(i, _)| *i < open) {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Split an ENUM/SET value list at commas outside quotes, trimming each value
fn split_values(text: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in text.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                ',' => values.push(std::mem::take(&mut current).trim().to_string()),
                _ => current.push(ch),
            },
        }
    }
    if !current.trim().is_empty() {
        values.push(current.trim().to_string());
    }
    values.retain(|v| !v.is_empty());
    values
}
