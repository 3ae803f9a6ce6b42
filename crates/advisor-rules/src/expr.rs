//! Restricted boolean expressions over an indexable array of numbers.
//!
//! Conditions reference their aggregated values positionally through the
//! identifier `keys`, e.g. `keys[0] - keys[1] > 100`. The grammar is limited
//! to arithmetic, comparison and logical connectives:
//!
//! ```text
//! or      := and (("or" | "||") and)*
//! and     := not (("and" | "&&") not)*
//! not     := ("not" | "!") not | compare
//! compare := sum (("<" | "<=" | ">" | ">=" | "==" | "!=") sum)*
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/" | "%") unary)*
//! unary   := "-" unary | "+" unary | atom
//! atom    := number | "true" | "false" | "keys" "[" or "]"
//!          | "len" "(" "keys" ")" | "(" or ")"
//! ```
//!
//! Comparisons chain (`0 < keys[0] <= 10`), `and`/`or` short-circuit, and
//! negative indices count from the end of `keys`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("index {index} out of range for {len} keys")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("index must be an integer, got {0}")]
    NonIntegerIndex(f64),

    #[error("operator '{op}' expects {expected} operands")]
    TypeMismatch { op: &'static str, expected: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression evaluated to a number, not a boolean")]
    NonBoolean,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Bool(bool),
    Key(Box<Expr>),
    Len,
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// A parsed expression, kept together with its source text.
///
/// # Examples
///
/// ```
/// use advisor_rules::expr::Expression;
///
/// let expr = Expression::parse("keys[0] - keys[1] > 100").unwrap();
/// assert!(expr.evaluate(&[250.0, 100.0]).unwrap());
/// assert!(!expr.evaluate(&[150.0, 100.0]).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        if let Some((offset, _)) = tokens.get(MAX_TOKENS) {
            return Err(ExprError::Parse {
                offset: *offset,
                message: format!("expression longer than {MAX_TOKENS} tokens"),
            });
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let root = parser.parse_or()?;
        if let Some((offset, tok)) = parser.tokens.get(parser.pos) {
            return Err(ExprError::Parse {
                offset: *offset,
                message: format!("unexpected {tok}"),
            });
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluates the expression with `keys` bound to `values`.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range indices, operand type mismatches,
    /// division by zero, or a non-boolean result.
    pub fn evaluate(&self, values: &[f64]) -> Result<bool, ExprError> {
        match eval(&self.root, values)? {
            Value::Bool(b) => Ok(b),
            Value::Number(_) => Err(ExprError::NonBoolean),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses and evaluates `source` in one step.
pub fn evaluate(source: &str, values: &[f64]) -> Result<bool, ExprError> {
    Expression::parse(source)?.evaluate(values)
}

// ---- Tokenizer ----

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Cmp(CmpOp),
    AndAnd,
    OrOr,
    Bang,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::Percent => f.write_str("'%'"),
            Self::Cmp(_) => f.write_str("comparison"),
            Self::AndAnd => f.write_str("'&&'"),
            Self::OrOr => f.write_str("'||'"),
            Self::Bang => f.write_str("'!'"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text = &src[start..i];
            let n: f64 = text.parse().map_err(|_| ExprError::Parse {
                offset: start,
                message: format!("invalid number '{text}'"),
            })?;
            tokens.push((start, Token::Number(n)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(src[start..i].to_string())));
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (tok, width) = match (c, next) {
            (b'<', Some(b'=')) => (Token::Cmp(CmpOp::Le), 2),
            (b'>', Some(b'=')) => (Token::Cmp(CmpOp::Ge), 2),
            (b'=', Some(b'=')) => (Token::Cmp(CmpOp::Eq), 2),
            (b'!', Some(b'=')) => (Token::Cmp(CmpOp::Ne), 2),
            (b'&', Some(b'&')) => (Token::AndAnd, 2),
            (b'|', Some(b'|')) => (Token::OrOr, 2),
            (b'<', _) => (Token::Cmp(CmpOp::Lt), 1),
            (b'>', _) => (Token::Cmp(CmpOp::Gt), 1),
            (b'!', _) => (Token::Bang, 1),
            (b'[', _) => (Token::LBracket, 1),
            (b']', _) => (Token::RBracket, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(ExprError::Parse {
                    offset: start,
                    message: format!("unexpected character '{ch}'"),
                });
            }
        };
        tokens.push((start, tok));
        i += width;
    }

    Ok(tokens)
}

// ---- Parser ----

/// Deepest accepted nesting of parentheses, `keys[...]` and unary operators.
const MAX_NESTING: usize = 64;
/// Longest accepted expression. Together with [`MAX_NESTING`] this bounds the
/// depth of the tree, and so the recursion of evaluation.
const MAX_TOKENS: usize = 1024;

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::Parse {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == name)
    }

    fn expect(&mut self, want: &Token) -> Result<(), ExprError> {
        match self.peek() {
            Some(tok) if tok == want => {
                self.pos += 1;
                Ok(())
            }
            Some(tok) => Err(self.error(format!("expected {want}, found {tok}"))),
            None => Err(self.error(format!("expected {want}, found end of input"))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrOr)) || self.is_ident("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Token::AndAnd)) || self.is_ident("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Token::Bang)) || self.is_ident("not") {
            self.pos += 1;
            let inner = self.nested(Self::parse_not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();
        while let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            rest.push((op, self.parse_sum()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_product()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.nested(Self::parse_unary)?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.nested(Self::parse_unary)
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.error("unexpected end of input"));
        };
        match tok {
            Token::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.nested(Self::parse_or)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" | "True" => {
                    self.pos += 1;
                    Ok(Expr::Bool(true))
                }
                "false" | "False" => {
                    self.pos += 1;
                    Ok(Expr::Bool(false))
                }
                "keys" => {
                    self.pos += 1;
                    self.expect(&Token::LBracket)?;
                    let index = self.nested(Self::parse_or)?;
                    self.expect(&Token::RBracket)?;
                    Ok(Expr::Key(Box::new(index)))
                }
                "len" => {
                    self.pos += 1;
                    self.expect(&Token::LParen)?;
                    if !self.is_ident("keys") {
                        return Err(self.error("len() only accepts 'keys'"));
                    }
                    self.pos += 1;
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Len)
                }
                other => Err(self.error(format!("unknown identifier '{other}'"))),
            },
            other => Err(self.error(format!("unexpected {other}"))),
        }
    }
}

// ---- Evaluator ----

fn eval(expr: &Expr, keys: &[f64]) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Len => Ok(Value::Number(keys.len() as f64)),
        Expr::Key(index) => {
            let raw = number(eval(index, keys)?, "[]")?;
            lookup(keys, raw).map(Value::Number)
        }
        Expr::Neg(inner) => Ok(Value::Number(-number(eval(inner, keys)?, "-")?)),
        Expr::Not(inner) => Ok(Value::Bool(!boolean(eval(inner, keys)?, "not")?)),
        Expr::Arith { op, left, right } => {
            let l = number(eval(left, keys)?, op.symbol())?;
            let r = number(eval(right, keys)?, op.symbol())?;
            arithmetic(*op, l, r).map(Value::Number)
        }
        Expr::Compare { first, rest } => {
            let mut left = eval(first, keys)?;
            for (op, right_expr) in rest {
                let right = eval(right_expr, keys)?;
                if !compare(*op, left, right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::And(left, right) => {
            if !boolean(eval(left, keys)?, "and")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(boolean(eval(right, keys)?, "and")?))
        }
        Expr::Or(left, right) => {
            if boolean(eval(left, keys)?, "or")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(boolean(eval(right, keys)?, "or")?))
        }
    }
}

fn number(v: Value, op: &'static str) -> Result<f64, ExprError> {
    match v {
        Value::Number(n) => Ok(n),
        Value::Bool(_) => Err(ExprError::TypeMismatch {
            op,
            expected: "numeric",
        }),
    }
}

fn boolean(v: Value, op: &'static str) -> Result<bool, ExprError> {
    match v {
        Value::Bool(b) => Ok(b),
        Value::Number(_) => Err(ExprError::TypeMismatch {
            op,
            expected: "boolean",
        }),
    }
}

fn lookup(keys: &[f64], raw: f64) -> Result<f64, ExprError> {
    if raw.fract() != 0.0 || !raw.is_finite() {
        return Err(ExprError::NonIntegerIndex(raw));
    }
    let index = raw as i64;
    let len = keys.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if resolved < 0 || resolved >= len {
        return Err(ExprError::IndexOutOfRange {
            index,
            len: keys.len(),
        });
    }
    Ok(keys[resolved as usize])
}

fn arithmetic(op: ArithOp, l: f64, r: f64) -> Result<f64, ExprError> {
    match op {
        ArithOp::Add => Ok(l + r),
        ArithOp::Sub => Ok(l - r),
        ArithOp::Mul => Ok(l * r),
        ArithOp::Div | ArithOp::Mod if r == 0.0 => Err(ExprError::DivisionByZero),
        ArithOp::Div => Ok(l / r),
        ArithOp::Mod => {
            // result takes the sign of the divisor
            let m = l % r;
            if m != 0.0 && (m < 0.0) != (r < 0.0) {
                Ok(m + r)
            } else {
                Ok(m)
            }
        }
    }
}

fn compare(op: CmpOp, left: Value, right: Value) -> Result<bool, ExprError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(match op {
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
        }),
        (Value::Bool(l), Value::Bool(r)) => match op {
            CmpOp::Eq => Ok(l == r),
            CmpOp::Ne => Ok(l != r),
            _ => Err(ExprError::TypeMismatch {
                op: "ordering comparison",
                expected: "numeric",
            }),
        },
        _ => Err(ExprError::TypeMismatch {
            op: "comparison",
            expected: "same-typed",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(src: &str, keys: &[f64]) -> Result<bool, ExprError> {
        evaluate(src, keys)
    }

    #[test]
    fn arithmetic_precedence() {
        assert!(eval_str("1 + 2 * 3 == 7", &[]).unwrap());
        assert!(eval_str("(1 + 2) * 3 == 9", &[]).unwrap());
        assert!(eval_str("-2 * -3 == 6", &[]).unwrap());
        assert!(eval_str("7 % 3 == 1 and -7 % 3 == 2", &[]).unwrap());
        assert!(eval_str("1.5e2 == 150", &[]).unwrap());
    }

    #[test]
    fn keys_are_positional() {
        let keys = [10.0, 4.0, 1.0];
        assert!(eval_str("keys[0] - keys[1] > 5", &keys).unwrap());
        assert!(eval_str("keys[-1] == 1", &keys).unwrap());
        assert!(eval_str("keys[1 + 1] < keys[0]", &keys).unwrap());
        assert!(eval_str("len(keys) == 3", &keys).unwrap());
    }

    #[test]
    fn logical_connectives() {
        let keys = [5.0];
        assert!(eval_str("keys[0] > 1 and keys[0] < 10", &keys).unwrap());
        assert!(eval_str("keys[0] > 100 || keys[0] == 5", &keys).unwrap());
        assert!(eval_str("not keys[0] > 100", &keys).unwrap());
        assert!(eval_str("!(keys[0] > 100) && True", &keys).unwrap());
    }

    #[test]
    fn chained_comparison() {
        assert!(eval_str("0 < keys[0] <= 10", &[10.0]).unwrap());
        assert!(!eval_str("0 < keys[0] <= 10", &[11.0]).unwrap());
    }

    #[test]
    fn short_circuit_skips_failing_branch() {
        assert!(!eval_str("false and keys[9] > 0", &[]).unwrap());
        assert!(eval_str("true or keys[9] > 0", &[]).unwrap());
    }

    #[test]
    fn evaluation_errors() {
        assert_eq!(
            eval_str("keys[3] > 0", &[1.0]),
            Err(ExprError::IndexOutOfRange { index: 3, len: 1 })
        );
        assert_eq!(eval_str("keys[0] / 0 > 1", &[1.0]), Err(ExprError::DivisionByZero));
        assert_eq!(eval_str("keys[0] + 1", &[1.0]), Err(ExprError::NonBoolean));
        assert_eq!(eval_str("keys[0.5] > 0", &[1.0]), Err(ExprError::NonIntegerIndex(0.5)));
        assert!(matches!(
            eval_str("(1 > 0) + 1 > 0", &[]),
            Err(ExprError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(Expression::parse("keys[0] >"), Err(ExprError::Parse { .. })));
        assert!(matches!(Expression::parse("keys[0"), Err(ExprError::Parse { .. })));
        assert!(matches!(Expression::parse("__import__('os')"), Err(ExprError::Parse { .. })));
        assert!(matches!(Expression::parse("keys[0] > 1;"), Err(ExprError::Parse { .. })));
        assert!(matches!(Expression::parse(""), Err(ExprError::Parse { .. })));
    }

    fn nested_parens(depth: usize) -> String {
        format!("{}1 > 0{}", "(".repeat(depth), ")".repeat(depth))
    }

    fn nesting_error(source: &str) -> bool {
        matches!(
            Expression::parse(source),
            Err(ExprError::Parse { message, .. }) if message == "expression nested too deeply"
        )
    }

    #[test]
    fn nesting_is_bounded() {
        assert!(Expression::parse(&nested_parens(MAX_NESTING)).unwrap().evaluate(&[]).unwrap());
        assert!(nesting_error(&nested_parens(MAX_NESTING + 1)));
        assert!(nesting_error(&format!("{}1 > 0", "not ".repeat(100))));
        assert!(nesting_error(&format!("{}1 > 0", "-".repeat(100))));
        assert!(nesting_error(&format!("{}0{} > 0", "keys[".repeat(100), "]".repeat(100))));
    }

    #[test]
    fn oversized_input_is_rejected() {
        assert!(matches!(
            Expression::parse(&nested_parens(200_000)),
            Err(ExprError::Parse { .. })
        ));
        let long_sum = format!("{}1 > 0", "1 + ".repeat(100_000));
        assert!(matches!(
            Expression::parse(&long_sum),
            Err(ExprError::Parse { .. })
        ));
    }

    #[test]
    fn display_keeps_source() {
        let expr = Expression::parse("keys[0]  >  1").unwrap();
        assert_eq!(expr.to_string(), "keys[0]  >  1");
    }
}
