//! Sandboxed arithmetic evaluator
//!
//! Evaluates plain arithmetic only: numbers, `+ - * / // % ** ^`, unary signs
//! and parentheses. There are no names, calls or attribute access, so nothing
//! outside the arithmetic grammar can be reached from an expression.

use thiserror::Error;

/// Maximum accepted expression length in bytes
const MAX_EXPRESSION_LEN: usize = 1_000;

/// Maximum parenthesis/unary nesting depth
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("empty expression")]
    Empty,
    #[error("expression too long ({0} bytes, max {MAX_EXPRESSION_LEN})")]
    TooLong(usize),
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<(Token, usize)>, CalcError> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // Exponent part: e, E followed by optional sign and digits
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        while j < bytes.len() && bytes[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text = &expr[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(text.to_string()))?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            '+' => tokens.push((Token::Plus, start)),
            '-' => tokens.push((Token::Minus, start)),
            '*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    i += 1;
                    tokens.push((Token::StarStar, start));
                } else {
                    tokens.push((Token::Star, start));
                }
            }
            '/' => {
                if bytes.get(i + 1) == Some(&b'/') {
                    i += 1;
                    tokens.push((Token::SlashSlash, start));
                } else {
                    tokens.push((Token::Slash, start));
                }
            }
            '%' => tokens.push((Token::Percent, start)),
            '^' => tokens.push((Token::Caret, start)),
            '(' => tokens.push((Token::LParen, start)),
            ')' => tokens.push((Token::RParen, start)),
            _ => {
                let ch = expr[start..].chars().next().unwrap_or(c);
                return Err(CalcError::UnexpectedChar(ch, start));
            }
        }
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(0)
    }

    fn enter(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.next();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.next();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some(Token::SlashSlash) => {
                    self.next();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value = (value / rhs).floor();
                }
                Some(Token::Percent) => {
                    self.next();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    // Result takes the sign of the divisor
                    value -= rhs * (value / rhs).floor();
                }
                _ => return Ok(value),
            }
        }
    }

    // unary := ('+' | '-') unary | power
    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                self.enter()?;
                let value = -self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::Plus) => {
                self.next();
                self.enter()?;
                let value = self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            _ => self.power(),
        }
    }

    // power := primary (('**' | '^') unary)?   (right associative)
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        match self.peek() {
            Some(Token::StarStar) | Some(Token::Caret) => {
                self.next();
                self.enter()?;
                let exponent = self.unary()?;
                self.depth -= 1;
                if base == 0.0 && exponent < 0.0 {
                    return Err(CalcError::DivisionByZero);
                }
                Ok(base.powf(exponent))
            }
            _ => Ok(base),
        }
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> Result<f64, CalcError> {
        let position = self.position();
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                self.enter()?;
                let value = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(CalcError::UnexpectedToken(self.tokens[self.pos - 1].1)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(_) => Err(CalcError::UnexpectedToken(position)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

/// Evaluate an arithmetic expression
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    if expr.len() > MAX_EXPRESSION_LEN {
        return Err(CalcError::TooLong(expr.len()));
    }
    if expr.trim().is_empty() {
        return Err(CalcError::Empty);
    }

    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;

    if parser.pos < parser.tokens.len() {
        return Err(CalcError::UnexpectedToken(parser.position()));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Render a result, dropping the fractional part for integral values
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
