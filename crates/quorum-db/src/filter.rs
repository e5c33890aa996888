//! The list-query filter language.
//!
//! A small operator language over record fields: `~` case-insensitive
//! substring match, `=` / `!=` equality, clauses combined with `&&` and `||`
//! (`&&` binds tighter), parentheses allowed. Values are quoted strings,
//! booleans or numbers. Example:
//!
//! ```text
//! title ~ "genome" && (public = true || status = 'active')
//! ```

use quorum_common::{QuorumError, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Bool(bool),
    Num(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Cmp { field: String, op: CmpOp, value: FilterValue },
}

/// Parse a filter string into an expression tree.
pub fn parse(input: &str) -> Result<Expr> {
    let mut p = Parser { tokens: tokenize(input)?, pos: 0 };
    let expr = p.parse_or()?;
    if p.pos != p.tokens.len() {
        return Err(QuorumError::Filter(format!(
            "unexpected trailing input at token {}",
            p.pos
        )));
    }
    Ok(expr)
}

/// Evaluate an expression against a record's flattened JSON fields.
pub fn eval(expr: &Expr, fields: &serde_json::Map<String, Value>) -> bool {
    match expr {
        Expr::Or(parts) => parts.iter().any(|e| eval(e, fields)),
        Expr::And(parts) => parts.iter().all(|e| eval(e, fields)),
        Expr::Cmp { field, op, value } => {
            let actual = fields.get(field).unwrap_or(&Value::Null);
            match op {
                CmpOp::Eq => value_eq(actual, value),
                CmpOp::Ne => !value_eq(actual, value),
                CmpOp::Like => value_like(actual, value),
            }
        }
    }
}

fn value_eq(actual: &Value, expected: &FilterValue) -> bool {
    match (actual, expected) {
        (Value::String(a), FilterValue::Str(b)) => a == b,
        (Value::Bool(a), FilterValue::Bool(b)) => a == b,
        (Value::Number(a), FilterValue::Num(b)) => a.as_f64() == Some(*b),
        // absent bool fields read as false
        (Value::Null, FilterValue::Bool(b)) => !*b,
        _ => false,
    }
}

fn value_like(actual: &Value, expected: &FilterValue) -> bool {
    let needle = match expected {
        FilterValue::Str(s) => s.to_lowercase(),
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::Num(n) => n.to_string(),
    };
    match actual {
        Value::String(s) => s.to_lowercase().contains(&needle),
        Value::Array(items) => items.iter().any(|v| match v {
            Value::String(s) => s.to_lowercase().contains(&needle),
            other => other.to_string().to_lowercase().contains(&needle),
        }),
        Value::Null => false,
        other => other.to_string().to_lowercase().contains(&needle),
    }
}

// ── Tokenizer / parser ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Bool(bool),
    Num(f64),
    Eq,
    Ne,
    Like,
    AndAnd,
    OrOr,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Like);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => {
                            return Err(QuorumError::Filter("unterminated string".into()));
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| QuorumError::Filter(format!("bad number {text:?}")))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" => tokens.push(Token::Bool(true)),
                    "false" => tokens.push(Token::Bool(false)),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => {
                return Err(QuorumError::Filter(format!("unexpected character {other:?}")));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut parts = vec![self.parse_and()?];
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 { parts.pop().unwrap() } else { Expr::Or(parts) })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut parts = vec![self.parse_primary()?];
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            parts.push(self.parse_primary()?);
        }
        Ok(if parts.len() == 1 { parts.pop().unwrap() } else { Expr::And(parts) })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(QuorumError::Filter("expected ')'".into())),
                }
            }
            Some(Token::Ident(field)) => {
                let op = match self.next() {
                    Some(Token::Eq) => CmpOp::Eq,
                    Some(Token::Ne) => CmpOp::Ne,
                    Some(Token::Like) => CmpOp::Like,
                    other => {
                        return Err(QuorumError::Filter(format!(
                            "expected operator after {field:?}, got {other:?}"
                        )));
                    }
                };
                let value = match self.next() {
                    Some(Token::Str(s)) => FilterValue::Str(s),
                    Some(Token::Bool(b)) => FilterValue::Bool(b),
                    Some(Token::Num(n)) => FilterValue::Num(n),
                    other => {
                        return Err(QuorumError::Filter(format!(
                            "expected value after operator, got {other:?}"
                        )));
                    }
                };
                Ok(Expr::Cmp { field, op, value })
            }
            other => Err(QuorumError::Filter(format!("unexpected token {other:?}"))),
        }
    }
}
