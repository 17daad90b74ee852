//! Row filter expressions
//!
//! Grammar:
//!
//! ```text
//! expr    := and ( ("or" | "|") and )*
//! and     := primary ( ("and" | "&") primary )*
//! primary := "(" expr ")" | operand op operand
//! operand := column | `quoted column` | number | "string" | 'string'
//! op      := == | != | < | <= | > | >=
//! ```
//!
//! Parentheses nest at most [`MAX_DEPTH`] deep and an expression holds at most
//! [`MAX_TERMS`] comparisons.

use super::{Cell, Column, DataFrame, TabularError};
use std::cmp::Ordering;

/// Deepest parenthesis nesting a filter may use
pub const MAX_DEPTH: usize = 64;
/// Most comparisons a single filter may chain together
pub const MAX_TERMS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Op(CmpOp),
    And,
    Or,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Compare { left: Operand, op: CmpOp, right: Operand },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

fn filter_err(msg: impl Into<String>) -> TabularError {
    TabularError::Filter(msg.into())
}

fn tokenize(input: &str) -> Result<Vec<Token>, TabularError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if next == Some('|') { 2 } else { 1 };
            }
            '=' | '!' | '<' | '>' => {
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => return Err(filter_err(format!("unexpected '{}' at position {}", c, i))),
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            '\'' | '"' | '`' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .map(|p| i + 1 + p)
                    .ok_or_else(|| filter_err(format!("unterminated quote starting at position {}", i)))?;
                let text: String = chars[i + 1..end].iter().collect();
                tokens.push(if c == '`' { Token::Ident(text) } else { Token::Str(text) });
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '.' && next.is_some_and(|n| n.is_ascii_digit()))
                || ((c == '-' || c == '+') && next.is_some_and(|n| n.is_ascii_digit() || n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '+' | '-'))
                {
                    // Only allow a sign directly after an exponent marker
                    if matches!(chars[i], '+' | '-') && !matches!(chars[i - 1], 'e' | 'E') {
                        break;
                    }
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| filter_err(format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" | "AND" => Token::And,
                    "or" | "OR" => Token::Or,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(filter_err(format!("unexpected '{}' at position {}", other, i))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    terms: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<FilterExpr, TabularError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<FilterExpr, TabularError> {
        let mut left = self.primary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.primary()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<FilterExpr, TabularError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(filter_err("expression nested too deeply"));
            }
            let inner = self.expr()?;
            self.depth -= 1;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(filter_err("missing closing parenthesis")),
            };
        }

        // evaluation and drop recurse once per chained comparison
        self.terms += 1;
        if self.terms > MAX_TERMS {
            return Err(filter_err(format!("expression has more than {} comparisons", MAX_TERMS)));
        }
        let left = self.operand()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => return Err(filter_err(format!("expected comparison operator, found {:?}", other))),
        };
        let right = self.operand()?;
        Ok(FilterExpr::Compare { left, op, right })
    }

    fn operand(&mut self) -> Result<Operand, TabularError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Column(name)),
            Some(Token::Num(v)) => Ok(Operand::Number(v)),
            Some(Token::Str(s)) => Ok(Operand::Text(s)),
            other => Err(filter_err(format!("expected column or literal, found {:?}", other))),
        }
    }
}

impl FilterExpr {
    pub fn parse(input: &str) -> Result<Self, TabularError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(filter_err("empty expression"));
        }
        let mut parser = Parser { tokens, pos: 0, depth: 0, terms: 0 };
        let expr = parser.expr()?;
        if let Some(extra) = parser.peek() {
            return Err(filter_err(format!("unexpected trailing {:?}", extra)));
        }
        Ok(expr)
    }

    fn columns(&self, out: &mut Vec<String>) {
        match self {
            FilterExpr::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Column(name) = operand {
                        out.push(name.clone());
                    }
                }
            }
            FilterExpr::And(a, b) | FilterExpr::Or(a, b) => {
                a.columns(out);
                b.columns(out);
            }
        }
    }

    fn matches(&self, frame: &DataFrame, row: usize) -> Result<bool, TabularError> {
        match self {
            FilterExpr::Compare { left, op, right } => {
                let l = resolve(frame, left, row);
                let r = resolve(frame, right, row);
                compare(&l, *op, &r)
            }
            FilterExpr::And(a, b) => Ok(a.matches(frame, row)? && b.matches(frame, row)?),
            FilterExpr::Or(a, b) => Ok(a.matches(frame, row)? || b.matches(frame, row)?),
        }
    }
}

fn resolve(frame: &DataFrame, operand: &Operand, row: usize) -> Cell {
    match operand {
        Operand::Column(name) => frame
            .column(name)
            .and_then(|c| c.cells.get(row).cloned())
            .unwrap_or(Cell::Missing),
        Operand::Number(v) => Cell::Float(*v),
        Operand::Text(s) => Cell::Text(s.clone()),
    }
}

/// Missing compares unequal to everything; numbers and text never order against each other
fn compare(left: &Cell, op: CmpOp, right: &Cell) -> Result<bool, TabularError> {
    if left.is_missing() || right.is_missing() {
        return Ok(op == CmpOp::Ne);
    }
    let ord = match (left.as_f64(), right.as_f64(), left, right) {
        (Some(a), Some(b), _, _) => a.partial_cmp(&b),
        (None, None, Cell::Text(a), Cell::Text(b)) => Some(a.cmp(b)),
        _ => match op {
            CmpOp::Eq => return Ok(false),
            CmpOp::Ne => return Ok(true),
            _ => {
                return Err(filter_err(format!(
                    "cannot order '{}' against '{}'",
                    left.label(),
                    right.label()
                )))
            }
        },
    };
    Ok(ord.is_some_and(|ord| op.holds(ord)))
}

impl DataFrame {
    /// Rows for which `expression` holds
    pub fn filter(&self, expression: &str) -> Result<DataFrame, TabularError> {
        let expr = FilterExpr::parse(expression)?;

        let mut referenced = Vec::new();
        expr.columns(&mut referenced);
        for name in &referenced {
            self.require_column(name)?;
        }

        let mut keep = Vec::new();
        for row in 0..self.row_count() {
            if expr.matches(self, row)? {
                keep.push(row);
            }
        }

        let columns = self
            .columns()
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                dtype: c.dtype,
                cells: keep.iter().map(|&row| c.cells[row].clone()).collect(),
            })
            .collect();
        Ok(DataFrame::from_parts(columns, keep.len()))
    }
}
