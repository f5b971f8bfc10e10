//! Parser and evaluator for the filter expressions produced by [`crate::QueryBuilder`].
//!
//! Supported: `eq ne gt ge lt le`, `and or not`, parentheses, string / integer /
//! `L`-suffixed long / `datetime'...'` / boolean literals and bare boolean columns.

use crate::core::{Result, Row, StoreError, TypedValue};
use chrono::DateTime;
use http::StatusCode;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Property(String),
    Literal(TypedValue),
}

impl Operand {
    fn resolve(&self, row: &Row) -> Option<TypedValue> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Property(name) => match name.as_str() {
                "PartitionKey" => Some(TypedValue::Str(row.partition_key.clone())),
                "RowKey" => Some(TypedValue::Str(row.row_key.clone())),
                other => row.get(other).cloned(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Truthy(Operand),
}

impl Filter {
    pub fn parse(text: &str) -> Result<Filter> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let filter = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(bad_request(format!(
                "unexpected trailing input in filter '{}'",
                text
            )));
        }
        Ok(filter)
    }

    /// Evaluates the filter; comparisons against a missing column are false.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::And(left, right) => left.matches(row) && right.matches(row),
            Self::Or(left, right) => left.matches(row) || right.matches(row),
            Self::Not(inner) => !inner.matches(row),
            Self::Compare { left, op, right } => {
                match (left.resolve(row), right.resolve(row)) {
                    (Some(l), Some(r)) => l.compare(&r).is_some_and(|ordering| op.holds(ordering)),
                    _ => false,
                }
            }
            Self::Truthy(operand) => matches!(operand.resolve(row), Some(TypedValue::Bool(true))),
        }
    }
}

fn bad_request(message: String) -> StoreError {
    StoreError::service(StatusCode::BAD_REQUEST, message)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Value(TypedValue),
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
        } else if ch == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if ch == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if ch == '\'' {
            let (literal, next) = read_quoted(&chars, i)?;
            tokens.push(Token::Value(TypedValue::Str(literal)));
            i = next;
        } else if ch.is_ascii_digit()
            || (ch == '-' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            let long = i < chars.len() && (chars[i] == 'L' || chars[i] == 'l');
            if long {
                i += 1;
            }
            let number: i64 = digits
                .parse()
                .map_err(|_| bad_request(format!("invalid number '{}'", digits)))?;
            let value = match i32::try_from(number) {
                Ok(small) if !long => TypedValue::Int32(small),
                _ => TypedValue::Int64(number),
            };
            tokens.push(Token::Value(value));
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if word.eq_ignore_ascii_case("datetime") && chars.get(i) == Some(&'\'') {
                let (literal, next) = read_quoted(&chars, i)?;
                let ts = DateTime::parse_from_rfc3339(&literal).map_err(|err| {
                    bad_request(format!("invalid datetime '{}': {}", literal, err))
                })?;
                tokens.push(Token::Value(TypedValue::Timestamp(ts)));
                i = next;
            } else if word.eq_ignore_ascii_case("true") {
                tokens.push(Token::Value(TypedValue::Bool(true)));
            } else if word.eq_ignore_ascii_case("false") {
                tokens.push(Token::Value(TypedValue::Bool(false)));
            } else {
                tokens.push(Token::Word(word));
            }
        } else {
            return Err(bad_request(format!(
                "unexpected character '{}' at offset {}",
                ch, i
            )));
        }
    }

    Ok(tokens)
}

/// Reads a `'...'` literal starting at `start`; `''` stands for one quote.
fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize)> {
    let mut literal = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                literal.push('\'');
                i += 2;
                continue;
            }
            return Ok((literal, i + 1));
        }
        literal.push(chars[i]);
        i += 1;
    }
    Err(bad_request("unterminated string literal".to_string()))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Filter> {
        if self.peek_keyword("not") {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Filter::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Filter> {
        if self.tokens.get(self.pos) == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            if self.tokens.get(self.pos) != Some(&Token::RParen) {
                return Err(bad_request("missing closing parenthesis".to_string()));
            }
            self.pos += 1;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        let op = match self.tokens.get(self.pos) {
            Some(Token::Word(word)) => CompareOp::parse(word),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(Filter::Truthy(left));
        };
        self.pos += 1;
        let right = self.parse_operand()?;
        Ok(Filter::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| bad_request("filter ended where an operand was expected".to_string()))?;
        self.pos += 1;
        match token {
            Token::Word(word) => Ok(Operand::Property(word)),
            Token::Value(value) => Ok(Operand::Literal(value)),
            other => Err(bad_request(format!("unexpected token {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use chrono::{TimeZone, Utc};

    fn row() -> Row {
        Row::new("42", "m")
            .with_property("Count", 5)
            .with_property("Size", 9_000_000_000i64)
            .with_property("Name", "colin")
            .with_property("Hidden", true)
            .with_property(
                "When",
                Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap().fixed_offset(),
            )
    }

    fn eval(filter: &str) -> bool {
        Filter::parse(filter).unwrap().matches(&row())
    }

    #[test]
    fn test_builder_output_evaluates() {
        let filter = QueryBuilder::new()
            .partition_key("42")
            .and()
            .row_key_in_range(Some("a"), Some("z"))
            .unwrap()
            .build();
        assert!(eval(&filter));

        let filter = QueryBuilder::new()
            .partition_key("42")
            .and()
            .row_key_in_range(Some("n"), None)
            .unwrap()
            .build();
        assert!(!eval(&filter));
    }

    #[test]
    fn test_typed_literals() {
        assert!(eval("Count gt 3 and Count lt 6"));
        assert!(eval("Size gt 8000000000L"));
        assert!(eval("Count eq 5L"));
        assert!(eval("When lt datetime'2021-06-01T00:00:00.0000000Z'"));
        assert!(!eval("When gt datetime'2021-06-01T00:00:00.0000000Z'"));
    }

    #[test]
    fn test_boolean_forms_and_precedence() {
        assert!(eval("Hidden"));
        assert!(!eval("not Hidden"));
        assert!(eval("Hidden eq true"));
        assert!(eval("Count eq 1 or Count eq 5 and Name eq 'colin'"));
        assert!(!eval("( Count eq 1 or Count eq 5 ) and Name eq 'bob'"));
        assert!(eval("not ( Name eq 'bob' )"));
    }

    #[test]
    fn test_missing_column_never_matches() {
        assert!(!eval("Missing eq 1"));
        assert!(!eval("Missing"));
        assert!(!eval("Name gt 3"));
    }

    #[test]
    fn test_malformed_filters_are_bad_requests() {
        for text in ["Count eq", "( Count eq 1", "Name eq 'open", "Count # 1", "Count eq 1 )"] {
            let err = Filter::parse(text).unwrap_err();
            assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST), "{text}");
        }
    }
}
