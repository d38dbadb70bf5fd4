//! Parser for the list query string
//!
//! The inverse of [`assemble`](crate::core::query::assemble) and
//! [`filter::build`](crate::core::filter::build). The reference endpoint uses
//! it to honor incoming requests.
//!
//! Accepted filter grammar:
//!
//! ```text
//! expr     := group ("and" group)*
//! group    := term ("or" term)*
//! term     := "(" group ")" | contains | path "eq" literal | path "/any(" var ":" lambda ")"
//! contains := "contains(" ["tolower("] path [")"] "," ["tolower("] string [")"] ")"
//! lambda   := var "eq" literal ("or" var "eq" literal)*
//! literal  := 'text' | true | false | number | ENUM_MEMBER
//! ```

use crate::core::predicate::{FilterPredicate, Literal};
use crate::core::query::{
    COUNT_KEY, FILTER_KEY, ORDER_BY_KEY, PageRequest, QueryString, SKIP_KEY, SortDirection,
    SortSpec, TOP_KEY,
};
use thiserror::Error;

/// Errors raised while parsing a query string
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("unexpected end of filter expression")]
    UnexpectedEnd,

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid $orderby value '{0}'")]
    InvalidSort(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("unsupported filter construct: {0}")]
    Unsupported(&'static str),
}

pub type WireResult<T> = Result<T, WireError>;

/// Clauses recovered from a query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryClauses {
    pub predicates: Vec<FilterPredicate>,
    pub sort: Option<SortSpec>,
    pub count: bool,
    pub top: Option<usize>,
    pub skip: Option<usize>,
}

impl QueryClauses {
    /// Parse a raw `k=v&k=v` string (values are not percent-decoded)
    pub fn parse(raw: &str) -> WireResult<Self> {
        let pairs = raw
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (k, v),
                None => (part, ""),
            });
        Self::from_pairs(pairs)
    }

    pub fn from_query(query: &QueryString) -> WireResult<Self> {
        Self::from_pairs(query.pairs().iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Parse already-decoded pairs; keys outside the protocol are ignored
    pub fn from_pairs<'a, I>(pairs: I) -> WireResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut clauses = QueryClauses::default();
        for (key, value) in pairs {
            match key {
                FILTER_KEY => clauses.predicates = parse_filter(value)?,
                ORDER_BY_KEY => clauses.sort = Some(parse_sort(value)?),
                COUNT_KEY => clauses.count = parse_bool(key, value)?,
                TOP_KEY => clauses.top = Some(parse_usize(key, value)?),
                SKIP_KEY => clauses.skip = Some(parse_usize(key, value)?),
                _ => {}
            }
        }
        Ok(clauses)
    }

    /// Page request equivalent to `$top`/`$skip`, when they describe whole pages
    pub fn page_request(&self) -> Option<PageRequest> {
        let top = self.top?.max(1);
        let skip = self.skip.unwrap_or(0);
        (skip % top == 0).then(|| PageRequest::new((skip / top).saturating_add(1), top))
    }

    /// `(offset, limit)` window described by `$skip`/`$top`
    pub fn window(&self) -> (usize, Option<usize>) {
        (self.skip.unwrap_or(0), self.top)
    }
}

fn parse_sort(value: &str) -> WireResult<SortSpec> {
    let mut parts = value.split_whitespace();
    let field = parts
        .next()
        .ok_or_else(|| WireError::InvalidSort(value.to_string()))?;
    let direction = match parts.next() {
        None | Some("asc") => SortDirection::Ascending,
        Some("desc") => SortDirection::Descending,
        Some(_) => return Err(WireError::InvalidSort(value.to_string())),
    };
    if parts.next().is_some() {
        return Err(WireError::InvalidSort(value.to_string()));
    }
    Ok(SortSpec {
        field: field.to_string(),
        direction,
    })
}

fn parse_bool(key: &str, value: &str) -> WireResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(WireError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_usize(key: &str, value: &str) -> WireResult<usize> {
    value.trim().parse().map_err(|_| WireError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse a `$filter` expression into AND-ed predicates
pub fn parse_filter(expr: &str) -> WireResult<Vec<FilterPredicate>> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let predicates = parser.and_list()?;
    if let Some(token) = parser.peek() {
        return Err(parser.unexpected(token.clone()));
    }
    Ok(predicates)
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Colon,
    Slash,
    Str(String),
    Number(String),
    Ident(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
            Token::Colon => ":".into(),
            Token::Slash => "/".into(),
            Token::Str(s) => format!("'{}'", s),
            Token::Number(n) => n.clone(),
            Token::Ident(i) => i.clone(),
        }
    }
}

fn tokenize(input: &str) -> WireResult<Vec<(Token, usize)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => tokens.push((Token::LParen, start)),
            ')' => tokens.push((Token::RParen, start)),
            ',' => tokens.push((Token::Comma, start)),
            ':' => tokens.push((Token::Colon, start)),
            '/' => tokens.push((Token::Slash, start)),
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(WireError::UnterminatedString(start)),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => break,
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((Token::Str(text), start));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut end = i + 1;
                while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                    end += 1;
                }
                // Exponent: e7, E-7, e+20
                if matches!(chars.get(end), Some('e' | 'E')) {
                    let digits_at = match chars.get(end + 1) {
                        Some('+' | '-') => end + 2,
                        _ => end + 1,
                    };
                    if chars.get(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                        end = digits_at;
                        while end < chars.len() && chars[end].is_ascii_digit() {
                            end += 1;
                        }
                    }
                }
                let number: String = chars[i..end].iter().collect();
                if number == "-" {
                    return Err(WireError::InvalidNumber(number));
                }
                tokens.push((Token::Number(number), start));
                i = end;
                continue;
            }
            c if c.is_alphabetic() || c == '_' || c == '@' => {
                let mut end = i + 1;
                while end < chars.len()
                    && (chars[end].is_alphanumeric() || chars[end] == '_' || chars[end] == '.')
                {
                    end += 1;
                }
                tokens.push((Token::Ident(chars[i..end].iter().collect()), start));
                i = end;
                continue;
            }
            other => {
                return Err(WireError::UnexpectedToken {
                    found: other.to_string(),
                    position: start,
                });
            }
        }
        i += 1;
    }

    Ok(tokens)
}

// =============================================================================
// Recursive descent
// =============================================================================

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn next(&mut self) -> WireResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or(WireError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    /// Error for `token`, which callers leave at the current position
    fn unexpected(&self, token: Token) -> WireError {
        let position = self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(0);
        WireError::UnexpectedToken {
            found: token.describe(),
            position,
        }
    }

    fn expect(&mut self, expected: Token) -> WireResult<()> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            self.pos -= 1;
            Err(self.unexpected(token))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(i)) if i == keyword)
    }

    fn expect_keyword(&mut self, keyword: &str) -> WireResult<()> {
        match self.next()? {
            Token::Ident(i) if i == keyword => Ok(()),
            other => {
                self.pos -= 1;
                Err(self.unexpected(other))
            }
        }
    }

    fn and_list(&mut self) -> WireResult<Vec<FilterPredicate>> {
        let mut predicates = vec![self.or_group()?];
        while self.is_keyword("and") {
            self.pos += 1;
            predicates.push(self.or_group()?);
        }
        Ok(predicates)
    }

    fn or_group(&mut self) -> WireResult<FilterPredicate> {
        let first = self.term()?;
        if !self.is_keyword("or") {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.is_keyword("or") {
            self.pos += 1;
            members.push(self.term()?);
        }
        Ok(FilterPredicate::AnyOf(members))
    }

    fn term(&mut self) -> WireResult<FilterPredicate> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let group = self.or_group()?;
            if self.is_keyword("and") {
                return Err(WireError::Unsupported("'and' inside a parenthesized group"));
            }
            self.expect(Token::RParen)?;
            return Ok(group);
        }

        if self.is_keyword("contains") && self.peek_at(1) == Some(&Token::LParen) {
            return self.contains();
        }

        let field = self.path()?;
        if self.peek() == Some(&Token::Slash) {
            // path() stops before "/any"
            self.pos += 1;
            self.expect_keyword("any")?;
            return self.any_lambda(field);
        }

        self.expect_keyword("eq")?;
        let value = self.literal()?;
        Ok(FilterPredicate::Equals { field, value })
    }

    /// Field path; stops in front of a `/any(` suffix
    fn path(&mut self) -> WireResult<String> {
        let mut path = self.ident()?;
        while self.peek() == Some(&Token::Slash) {
            let is_lambda = matches!(self.peek_at(1), Some(Token::Ident(i)) if i == "any")
                && self.peek_at(2) == Some(&Token::LParen);
            if is_lambda {
                break;
            }
            self.pos += 1;
            path.push('/');
            path.push_str(&self.ident()?);
        }
        Ok(path)
    }

    fn ident(&mut self) -> WireResult<String> {
        match self.next()? {
            Token::Ident(i) => Ok(i),
            other => {
                self.pos -= 1;
                Err(self.unexpected(other))
            }
        }
    }

    fn contains(&mut self) -> WireResult<FilterPredicate> {
        self.expect_keyword("contains")?;
        self.expect(Token::LParen)?;

        let field_lowered = self.open_tolower()?;
        let field = self.path()?;
        if field_lowered {
            self.expect(Token::RParen)?;
        }
        self.expect(Token::Comma)?;

        let value_lowered = self.open_tolower()?;
        let value = match self.next()? {
            Token::Str(s) => s,
            other => {
                self.pos -= 1;
                return Err(self.unexpected(other));
            }
        };
        if value_lowered {
            self.expect(Token::RParen)?;
        }
        self.expect(Token::RParen)?;

        if field_lowered != value_lowered {
            return Err(WireError::Unsupported("tolower() on only one side of contains()"));
        }

        Ok(FilterPredicate::Contains {
            field,
            value,
            case_insensitive: field_lowered,
        })
    }

    fn open_tolower(&mut self) -> WireResult<bool> {
        if self.is_keyword("tolower") && self.peek_at(1) == Some(&Token::LParen) {
            self.pos += 2;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn any_lambda(&mut self, field: String) -> WireResult<FilterPredicate> {
        self.expect(Token::LParen)?;
        let variable = self.ident()?;
        self.expect(Token::Colon)?;

        let mut values = Vec::new();
        loop {
            let bound = self.ident()?;
            if bound != variable {
                return Err(WireError::Unsupported("lambda body must test the bound variable"));
            }
            self.expect_keyword("eq")?;
            values.push(self.literal()?);
            if self.is_keyword("or") {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;

        Ok(FilterPredicate::InSet { field, values })
    }

    fn literal(&mut self) -> WireResult<Literal> {
        match self.next()? {
            Token::Str(s) => Ok(Literal::Text(s)),
            Token::Ident(i) if i == "true" => Ok(Literal::Bool(true)),
            Token::Ident(i) if i == "false" => Ok(Literal::Bool(false)),
            Token::Ident(i) => Ok(Literal::Enum(i)),
            Token::Number(n) if n.contains(['.', 'e', 'E']) => n
                .parse()
                .map(Literal::Float)
                .map_err(|_| WireError::InvalidNumber(n)),
            Token::Number(n) => n
                .parse()
                .map(Literal::Integer)
                .map_err(|_| WireError::InvalidNumber(n)),
            other => {
                self.pos -= 1;
                Err(self.unexpected(other))
            }
        }
    }
}
