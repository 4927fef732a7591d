//! Identifier and literal quoting for MySQL statements

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote `schema`.`name`, or just `name` when no schema is given
pub fn quote_qualified(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) if !schema.is_empty() => {
            format!("{}.{}", quote_identifier(schema), quote_identifier(name))
        }
        _ => quote_identifier(name),
    }
}

/// Quote a string literal, escaping backslashes and single quotes
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Strip one level of backtick or double-quote quoting from an identifier
pub fn unquote_identifier(text: &str) -> String {
    let text = text.trim();
    for quote in ['`', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            let inner = &text[1..text.len() - 1];
            let doubled: String = [quote, quote].iter().collect();
            return inner.replace(&doubled, &quote.to_string());
        }
    }
    text.to_string()
}

/// Split a possibly qualified, possibly quoted name into (schema, name).
///
/// `default_schema` is used when the text carries no schema part. Dots inside
/// quoted identifiers are not treated as separators.
pub fn split_qualified_name(text: &str, default_schema: &str) -> (String, String) {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    let mut chars = text.trim().chars().peekable();
    while let Some(ch) = chars.next() {
        match quote {
            Some(q) if ch == q => {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some(_) => current.push(ch),
            None if ch == '`' || ch == '"' => quote = Some(ch),
            None if ch == '.' => parts.push(std::mem::take(&mut current)),
            None => current.push(ch),
        }
    }
    parts.push(current);

    match parts.len() {
        1 => (default_schema.to_string(), parts.remove(0)),
        _ => {
            let name = parts.pop().unwrap_or_default();
            let schema = parts.pop().unwrap_or_default();
            (schema, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_doubles_backticks() {
        assert_eq!(quote_identifier("odd`name"), "`odd``name`");
        assert_eq!(quote_qualified(Some("s"), "t"), "`s`.`t`");
        assert_eq!(quote_qualified(None, "t"), "`t`");
    }

    #[test]
    fn test_quote_string_escapes() {
        assert_eq!(quote_string("it's"), "'it\\'s'");
        assert_eq!(quote_string("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_unquote_identifier() {
        assert_eq!(unquote_identifier("`fk_a`"), "fk_a");
        assert_eq!(unquote_identifier("\"fk\"\"b\""), "fk\"b");
        assert_eq!(unquote_identifier("plain"), "plain");
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(
            split_qualified_name("`sakila`.`actor`", "other"),
            ("sakila".to_string(), "actor".to_string())
        );
        assert_eq!(
            split_qualified_name("actor", "sakila"),
            ("sakila".to_string(), "actor".to_string())
        );
        assert_eq!(
            split_qualified_name("`my.schema`.t", "x"),
            ("my.schema".to_string(), "t".to_string())
        );
    }
}
