//! Restricted arithmetic evaluator
//!
//! Input text is handled in three phases. It is first tokenized and parsed into
//! a general expression tree, which can represent names, calls, attribute
//! access and string literals so that those constructs are recognised instead of
//! merely failing to parse. Every node of the tree is then checked against an
//! allow-list of numeric literals, `+ - * /`, power (`**` or `^`) and unary
//! sign. Only a [`ValidatedExpr`] can be evaluated, and only [`validate`]
//! produces one.

use crate::errors::AgentError;
use thiserror::Error;

const MAX_INPUT_LEN: usize = 1024;
const MAX_NESTING: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    InvalidExpression(String),
    #[error("{0}")]
    Arithmetic(String),
}

impl From<EvalError> for AgentError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::InvalidExpression(msg) => AgentError::InvalidExpression(msg),
            EvalError::Arithmetic(msg) => AgentError::Arithmetic(msg),
        }
    }
}

fn invalid(msg: impl Into<String>) -> EvalError {
    EvalError::InvalidExpression(msg.into())
}

fn arithmetic(msg: impl Into<String>) -> EvalError {
    EvalError::Arithmetic(msg.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    FloorDiv,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
            BinaryOp::Mod => "%",
            BinaryOp::FloorDiv => "//",
        }
    }
}

/// Parsed expression tree, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Str(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Str(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
    Dot,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '0'..='9' => {
                let (number, next) = read_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = next;
            }
            '.' if chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                let (number, next) = read_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|offset| start + offset)
                    .ok_or_else(|| invalid("unterminated string literal"))?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            _ => {
                let token = match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '.' => Token::Dot,
                    other => return Err(invalid(format!("unexpected character '{}'", other))),
                };
                tokens.push(token);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), EvalError> {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }

    let literal: String = chars[start..i].iter().collect();
    literal
        .parse::<f64>()
        .map(|value| (value, i))
        .map_err(|_| invalid(format!("malformed number '{}'", literal)))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(invalid("expression is nested too deeply"));
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    // Unary sign binds looser than power: -2**2 == -4.
    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Minus,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        self.descend()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) || self.eat(&Token::Caret) {
            self.descend()?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_nested()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        return Err(invalid("expected ')' to close the argument list"));
                    }
                }
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(attr)) => {
                        expr = Expr::Attribute {
                            value: Box::new(expr),
                            attr,
                        };
                    }
                    _ => return Err(invalid("expected an attribute name after '.'")),
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::Str(text)) => Ok(Expr::Str(text)),
            Some(Token::LParen) => {
                let inner = self.parse_nested()?;
                if !self.eat(&Token::RParen) {
                    return Err(invalid("missing closing parenthesis"));
                }
                Ok(inner)
            }
            Some(token) => Err(invalid(format!("unexpected token {}", describe(&token)))),
            None => Err(invalid("unexpected end of expression")),
        }
    }

    fn parse_nested(&mut self) -> Result<Expr, EvalError> {
        self.descend()?;
        let expr = self.parse_expression()?;
        self.depth -= 1;
        Ok(expr)
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Ident(name) => format!("name '{}'", name),
        Token::Str(_) => "string literal".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::DoubleStar => "'**'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::DoubleSlash => "'//'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::Caret => "'^'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Dot => "'.'".to_string(),
    }
}

/// Parses `input` into an unvalidated expression tree.
pub fn parse(input: &str) -> Result<Expr, EvalError> {
    if input.trim().is_empty() {
        return Err(invalid("expression is empty"));
    }
    if input.len() > MAX_INPUT_LEN {
        return Err(invalid("expression is too long"));
    }

    let mut parser = Parser::new(tokenize(input)?);
    let expr = parser.parse_expression()?;
    if let Some(token) = parser.peek() {
        return Err(invalid(format!("unexpected token {}", describe(token))));
    }
    Ok(expr)
}

/// An expression tree whose every node passed the allow-list.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedExpr(Expr);

/// Walks the whole tree and rejects any node outside the allow-list.
pub fn validate(expr: Expr) -> Result<ValidatedExpr, EvalError> {
    check_node(&expr)?;
    Ok(ValidatedExpr(expr))
}

fn check_node(expr: &Expr) -> Result<(), EvalError> {
    match expr {
        Expr::Number(_) => Ok(()),
        Expr::Unary { operand, .. } => check_node(operand),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => {
                check_node(left)?;
                check_node(right)
            }
            BinaryOp::Mod | BinaryOp::FloorDiv => Err(invalid(format!(
                "operator '{}' is not allowed",
                op.symbol()
            ))),
        },
        Expr::Name(name) => Err(invalid(format!("names are not allowed ('{}')", name))),
        Expr::Str(_) => Err(invalid("string literals are not allowed")),
        Expr::Call { .. } => Err(invalid("function calls are not allowed")),
        Expr::Attribute { attr, .. } => Err(invalid(format!(
            "attribute access is not allowed ('.{}')",
            attr
        ))),
    }
}

impl ValidatedExpr {
    pub fn evaluate(&self) -> Result<f64, EvalError> {
        eval_node(&self.0)
    }
}

fn eval_node(expr: &Expr) -> Result<f64, EvalError> {
    let value = match expr {
        Expr::Number(value) => *value,
        Expr::Unary { op, operand } => {
            let value = eval_node(operand)?;
            match op {
                UnaryOp::Plus => value,
                UnaryOp::Minus => -value,
            }
        }
        Expr::Binary { op, left, right } => {
            let lhs = eval_node(left)?;
            let rhs = eval_node(right)?;
            match op {
                BinaryOp::Add => lhs + rhs,
                BinaryOp::Sub => lhs - rhs,
                BinaryOp::Mul => lhs * rhs,
                BinaryOp::Div => {
                    if rhs == 0.0 {
                        return Err(arithmetic("division by zero"));
                    }
                    lhs / rhs
                }
                BinaryOp::Pow => {
                    if lhs == 0.0 && rhs < 0.0 {
                        return Err(arithmetic("zero cannot be raised to a negative power"));
                    }
                    lhs.powf(rhs)
                }
                BinaryOp::Mod | BinaryOp::FloorDiv => {
                    return Err(invalid(format!("operator '{}' is not allowed", op.symbol())))
                }
            }
        }
        _ => return Err(invalid("expression was not validated")),
    };

    if value.is_nan() {
        return Err(arithmetic("result is not a real number"));
    }
    if value.is_infinite() {
        return Err(arithmetic("numeric overflow"));
    }
    Ok(value)
}

/// Parses, validates and evaluates `input`.
pub fn evaluate(input: &str) -> Result<f64, EvalError> {
    let expr = parse(input)?;
    validate(expr)?.evaluate()
}

/// Integral values print without a fractional part; others are rounded to ten
/// decimals with trailing zeros removed.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let fixed = format!("{:.10}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
