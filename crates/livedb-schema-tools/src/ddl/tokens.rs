//! Token cursor over sqlparser's tokenizer output

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect};
use sqlparser::tokenizer::{Token, Tokenizer};

use livedb_core::SqlMode;

/// `/*!40100 ... */` version comments; their content is live DDL
static VERSIONED_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*!\d*(.*?)\*/").expect("valid regex"));

/// `DEFINER = user@host`; the tokenizer would read `@` as the start of a word
static DEFINER_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bDEFINER\s*=\s*(CURRENT_USER(\s*\(\s*\))?|(`[^`]*`|'[^']*'|"[^"]*"|[\w$.-]+)(\s*@\s*(`[^`]*`|'[^']*'|"[^"]*"|[\w$.%-]+))?)"#,
    )
    .expect("valid regex")
});

/// A syntax problem at a token position
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub message: String,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub(crate) type SyntaxResult<T> = Result<T, SyntaxError>;

/// Tokenize DDL the way the server would read it under `mode`.
///
/// Whitespace and comments are dropped.
pub(crate) fn tokenize(sql: &str, mode: &SqlMode) -> SyntaxResult<Vec<Token>> {
    let sql = VERSIONED_COMMENT.replace_all(sql, "$1");
    let sql = DEFINER_CLAUSE.replace(&sql, "");
    let dialect: &dyn Dialect = if mode.ansi_quotes() {
        &GenericDialect {}
    } else {
        &MySqlDialect {}
    };
    let tokens = Tokenizer::new(dialect, &sql)
        .tokenize()
        .map_err(|e| SyntaxError::new(e.to_string()))?;
    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect())
}

/// Split a token stream at top-level semicolons, dropping empty statements
pub(crate) fn split_statements(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut statements = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token == Token::SemiColon {
            if !current.is_empty() {
                statements.push(std::mem::take(&mut current));
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    pub fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| is_keyword(t, keyword))
    }

    pub fn peek_any_keyword(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.peek_keyword(k))
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence, or nothing when it does not match entirely
    pub fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matched = keywords
            .iter()
            .enumerate()
            .all(|(i, k)| self.peek_nth(i).is_some_and(|t| is_keyword(t, k)));
        if matched {
            self.pos += keywords.len();
        }
        matched
    }

    /// Consume the first of `keywords` that matches, returning it upper-cased
    pub fn eat_one_of(&mut self, keywords: &[&str]) -> Option<String> {
        let keyword = keywords.iter().find(|k| self.peek_keyword(k))?;
        self.pos += 1;
        Some(keyword.to_uppercase())
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> SyntaxResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    pub fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: &Token) -> SyntaxResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    /// Optional `=` between an option name and its value
    pub fn eat_equals(&mut self) {
        self.eat(&Token::Eq);
    }

    pub fn identifier(&mut self) -> SyntaxResult<String> {
        match self.peek() {
            Some(Token::Word(word)) => {
                self.pos += 1;
                Ok(word.value.clone())
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// `name` or `schema.name`
    pub fn qualified_name(&mut self) -> SyntaxResult<(Option<String>, String)> {
        let first = self.identifier()?;
        if self.eat(&Token::Period) {
            let second = self.identifier()?;
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }

    /// A string literal, in either quote style
    pub fn string_literal(&mut self) -> SyntaxResult<String> {
        match self.peek() {
            Some(Token::SingleQuotedString(s)) | Some(Token::DoubleQuotedString(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            Some(Token::Word(word)) if word.quote_style == Some('"') => {
                self.pos += 1;
                Ok(word.value.clone())
            }
            _ => Err(self.unexpected("string")),
        }
    }

    /// A bare word or string used as an option value (`InnoDB`, `utf8mb4`)
    pub fn option_value(&mut self) -> SyntaxResult<String> {
        match self.peek() {
            Some(Token::Word(word)) => {
                self.pos += 1;
                Ok(word.value.clone())
            }
            Some(Token::SingleQuotedString(s)) | Some(Token::DoubleQuotedString(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            Some(Token::Number(n, _)) => {
                self.pos += 1;
                Ok(n.clone())
            }
            _ => Err(self.unexpected("value")),
        }
    }

    pub fn number(&mut self) -> SyntaxResult<u32> {
        match self.peek() {
            Some(Token::Number(n, _)) => {
                let value = n
                    .parse()
                    .map_err(|_| SyntaxError::new(format!("invalid number '{}'", n)))?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.unexpected("number")),
        }
    }

    /// Consume a parenthesized group and return the tokens inside it
    pub fn group(&mut self) -> SyntaxResult<&'a [Token]> {
        self.expect(&Token::LParen)?;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(token) = self.advance() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(&self.tokens[start..self.pos - 1]);
                    }
                }
                _ => {}
            }
        }
        Err(SyntaxError::new("unbalanced parentheses"))
    }

    /// Skip one token, or a whole group when it starts one
    pub fn skip_item(&mut self) -> SyntaxResult<()> {
        if self.peek() == Some(&Token::LParen) {
            self.group().map(|_| ())
        } else {
            self.advance();
            Ok(())
        }
    }

    pub fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError::new(format!(
                "syntax error: expected {} near '{}'",
                expected, token
            )),
            None => SyntaxError::new(format!(
                "syntax error: expected {} at end of input",
                expected
            )),
        }
    }
}

/// Whether `token` is the unquoted keyword `keyword`
pub(crate) fn is_keyword(token: &Token, keyword: &str) -> bool {
    matches!(token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
}

/// Tokens rendered back as text, without spaces around punctuation
pub(crate) fn render(tokens: &[Token]) -> String {
    let mut text = String::new();
    let mut previous: Option<&Token> = None;
    for token in tokens {
        let glue = matches!(
            token,
            Token::Comma | Token::RParen | Token::LParen | Token::Period
        ) || matches!(previous, None | Some(Token::LParen | Token::Period | Token::Comma));
        if !glue {
            text.push(' ');
        }
        match token {
            Token::SingleQuotedString(s) => text.push_str(&livedb_core::sql::quote_string(s)),
            other => text.push_str(&other.to_string()),
        }
        previous = Some(token);
    }
    text
}
