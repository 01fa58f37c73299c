//! Calculator — evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative), parentheses,
//! unary minus and decimal numbers via a small recursive-descent parser.

use async_trait::async_trait;
use parley_core::error::ToolError;
use serde_json::{Map, Value};

use crate::native::NativeFunction;

/// Longest expression accepted, in characters.
const MAX_EXPRESSION_CHARS: usize = 4096;

/// Deepest nesting of parentheses, unary minus and `^` chains.
const MAX_NESTING: usize = 128;

pub struct Calculator;

#[async_trait]
impl NativeFunction for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    async fn call(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let expression = parameters
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("expression is required".into()))?;

        let value = evaluate(expression).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        })?;
        Ok(Value::String(format_number(value)))
    }
}

/// Render integers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    if expression.chars().count() > MAX_EXPRESSION_CHARS {
        return Err(format!("Expression longer than {MAX_EXPRESSION_CHARS} characters"));
    }
    let tokens = lex(expression)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.sum()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some(token) => Err(format!("Unexpected {token:?} at token {}", parser.pos)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn lex(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let literal = &input[start..end];
                let number = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Num(number));
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += usize::from(token.is_some());
        token
    }

    /// Run one recursive step, failing once nesting passes [`MAX_NESTING`].
    fn nested(&mut self, step: fn(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_NESTING {
            return Err("Expression nested too deeply".into());
        }
        self.depth += 1;
        let out = step(self);
        self.depth -= 1;
        out
    }

    // sum = product (('+' | '-') product)*
    fn sum(&mut self) -> Result<f64, String> {
        let mut acc = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.product()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // product = power (('*' | '/' | '%') power)*
    fn product(&mut self) -> Result<f64, String> {
        let mut acc = self.power()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.power()?;
            acc = match op {
                '*' => acc * rhs,
                _ if rhs == 0.0 => return Err("Division by zero".into()),
                '/' => acc / rhs,
                _ => acc % rhs,
            };
        }
        Ok(acc)
    }

    // power = unary ('^' power)?
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek_op() == Some('^') {
            self.pos += 1;
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // unary = '-' unary | atom
    fn unary(&mut self) -> Result<f64, String> {
        if self.peek_op() == Some('-') {
            self.pos += 1;
            return Ok(-self.nested(Self::unary)?);
        }
        self.atom()
    }

    // atom = NUMBER | '(' sum ')'
    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let inner = self.nested(Self::sum)?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(token) => Err(format!("Unexpected {token:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(expression: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("expression".into(), Value::from(expression));
        map
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), 4.0);
    }

    #[test]
    fn modulo_and_division() {
        assert_eq!(evaluate("10 % 4").unwrap(), 2.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("1 % 0").is_err());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("2 x 3").is_err());
        assert!(evaluate("1.2.3").is_err());
    }

    #[test]
    fn nesting_is_capped() {
        let ok = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&ok).unwrap(), 1.0);

        let deep = format!("{}1{}", "(".repeat(1000), ")".repeat(1000));
        assert_eq!(evaluate(&deep).unwrap_err(), "Expression nested too deeply");
        assert_eq!(
            evaluate(&format!("{}1", "-".repeat(1000))).unwrap_err(),
            "Expression nested too deeply"
        );
        assert_eq!(
            evaluate(&format!("{}2", "2 ^ ".repeat(1000))).unwrap_err(),
            "Expression nested too deeply"
        );
    }

    #[test]
    fn long_input_is_rejected_before_parsing() {
        let huge = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(evaluate(&huge).unwrap_err().starts_with("Expression longer than"));
    }

    #[tokio::test]
    async fn call_formats_integers_and_decimals() {
        assert_eq!(Calculator.call(&args("10 / 2")).await.unwrap(), "5");
        let third = Calculator.call(&args("10 / 3")).await.unwrap();
        assert!(third.as_str().unwrap().starts_with("3.333"));
    }

    #[tokio::test]
    async fn call_reports_errors() {
        let missing = Calculator.call(&Map::new()).await.unwrap_err();
        assert!(matches!(missing, ToolError::InvalidArguments(_)));

        let failed = Calculator.call(&args("1 / 0")).await.unwrap_err();
        assert_eq!(failed.to_string(), "Tool execution failed: calculator — Division by zero");
    }

    #[tokio::test]
    async fn deeply_nested_expression_fails_the_call() {
        let expression = format!("{}1{}", "(".repeat(2000), ")".repeat(2000));
        let failed = Calculator.call(&args(&expression)).await.unwrap_err();
        assert!(matches!(failed, ToolError::ExecutionFailed { .. }));
    }
}
