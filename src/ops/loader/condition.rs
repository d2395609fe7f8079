//! Conditions for `#code_cu_if_app(...)` blocks.
//!
//! A small expression language evaluated against an app:
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | primary ( cmp primary )?
//! primary := "(" expr ")" | app.<field> | "str" | 'str' | number | true | false | null
//! cmp     := "==" | "===" | "!=" | "!=="
//! ```
//!
//! Fields: `name`, `key`, `dirName`, `description`, `packageName`,
//! `index`, and `env.<KEY>` / `comEnv.<KEY>` for common env values.
//! Nothing is ever executed.

use std::fmt;

use thiserror::Error;

use crate::core::App;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("unexpected character `{0}` in condition")]
    UnexpectedChar(char),
    #[error("unterminated string in condition")]
    UnterminatedString,
    #[error("unexpected {0} in condition")]
    UnexpectedToken(String),
    #[error("unexpected end of condition")]
    UnexpectedEnd,
    #[error("unknown app field `{0}`")]
    UnknownField(String),
}

/// A runtime value in a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::Null => false,
        }
    }

    fn from_json(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Null => Value::Null,
            other => Value::Str(other.to_string()),
        }
    }

    fn strict_eq(&self, other: &Value) -> bool {
        self == other
    }

    /// `==`: numbers and numeric strings compare numerically.
    fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Str(b)) | (Value::Str(b), Value::Num(a)) => {
                b.trim().parse::<f64>().map(|b| b == *a).unwrap_or(false)
            }
            _ => self.strict_eq(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Eq { strict: bool },
    NotEq { strict: bool },
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Field(name) => write!(f, "field `{}`", name),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Num(n) => write!(f, "number {}", n),
            Token::Bool(b) => write!(f, "`{}`", b),
            Token::Null => f.write_str("`null`"),
            Token::Eq { strict } => f.write_str(if *strict { "`===`" } else { "`==`" }),
            Token::NotEq { strict } => f.write_str(if *strict { "`!==`" } else { "`!=`" }),
            Token::And => f.write_str("`&&`"),
            Token::Or => f.write_str("`||`"),
            Token::Not => f.write_str("`!`"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let rest_starts_with = |i: usize, s: &str| -> bool {
        s.chars()
            .enumerate()
            .all(|(k, c)| chars.get(i + k) == Some(&c))
    };

    while i < chars.len() {
        let c = chars[i];
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
            '&' if rest_starts_with(i, "&&") => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if rest_starts_with(i, "||") => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if rest_starts_with(i, "===") => {
                tokens.push(Token::Eq { strict: true });
                i += 3;
            }
            '=' if rest_starts_with(i, "==") => {
                tokens.push(Token::Eq { strict: false });
                i += 2;
            }
            '!' if rest_starts_with(i, "!==") => {
                tokens.push(Token::NotEq { strict: true });
                i += 3;
            }
            '!' if rest_starts_with(i, "!=") => {
                tokens.push(Token::NotEq { strict: false });
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '"' | '\'' | '`' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ConditionError::UnterminatedString),
                        Some('\\') => {
                            if let Some(&escaped) = chars.get(i + 1) {
                                value.push(escaped);
                            }
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::UnexpectedToken(format!("number `{}`", text)))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '$' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" | "undefined" => Token::Null,
                    _ => Token::Field(word),
                });
            }
            other => return Err(ConditionError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

/// Parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Field(Vec<String>),
    Literal(Value),
    Not(Box<Expr>),
    Cmp {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negate: bool,
        strict: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
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
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            lhs = Expr::And(Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }

        let lhs = self.primary()?;
        let (negate, strict) = match self.peek() {
            Some(Token::Eq { strict }) => (false, *strict),
            Some(Token::NotEq { strict }) => (true, *strict),
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.primary()?;
        Ok(Expr::Cmp {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            negate,
            strict,
        })
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ConditionError::UnexpectedToken(other.to_string())),
                    None => Err(ConditionError::UnexpectedEnd),
                }
            }
            Some(Token::Field(path)) => {
                let mut parts = path.split('.').map(str::to_string);
                match parts.next().as_deref() {
                    Some("app") => {}
                    _ => return Err(ConditionError::UnknownField(path)),
                }
                let rest: Vec<String> = parts.collect();
                if rest.is_empty() || rest.iter().any(|p| p.is_empty()) {
                    return Err(ConditionError::UnknownField(path));
                }
                Ok(Expr::Field(rest))
            }
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(Value::Num(n))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(other) => Err(ConditionError::UnexpectedToken(other.to_string())),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }
}

/// A parsed, reusable condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expr: Expr,
}

impl Condition {
    pub fn parse(input: &str) -> Result<Self, ConditionError> {
        let mut parser = Parser {
            tokens: tokenize(input)?,
            pos: 0,
        };
        let expr = parser.expr()?;
        if let Some(extra) = parser.peek() {
            return Err(ConditionError::UnexpectedToken(extra.to_string()));
        }
        Ok(Condition { expr })
    }

    pub fn eval(&self, app: &App) -> Result<bool, ConditionError> {
        Ok(eval(&self.expr, app)?.truthy())
    }
}

fn field(path: &[String], app: &App) -> Result<Value, ConditionError> {
    let text = |s: &str| Value::Str(s.to_string());
    match path {
        [one] => match one.as_str() {
            "name" => Ok(text(app.name())),
            "key" => Ok(text(&app.key)),
            "dirName" => Ok(text(&app.dir_name)),
            "description" => Ok(text(app.description())),
            "packageName" => Ok(text(&app.package_name)),
            "index" => Ok(Value::Num(app.index as f64)),
            _ => Err(ConditionError::UnknownField(format!("app.{}", one))),
        },
        [scope, key] if scope == "env" || scope == "comEnv" => Ok(app
            .config
            .common_env
            .get(key)
            .map(Value::from_json)
            .unwrap_or(Value::Null)),
        _ => Err(ConditionError::UnknownField(format!("app.{}", path.join(".")))),
    }
}

fn eval(expr: &Expr, app: &App) -> Result<Value, ConditionError> {
    Ok(match expr {
        Expr::Field(path) => field(path, app)?,
        Expr::Literal(value) => value.clone(),
        Expr::Not(inner) => Value::Bool(!eval(inner, app)?.truthy()),
        Expr::Cmp {
            lhs,
            rhs,
            negate,
            strict,
        } => {
            let (l, r) = (eval(lhs, app)?, eval(rhs, app)?);
            let equal = if *strict { l.strict_eq(&r) } else { l.loose_eq(&r) };
            Value::Bool(equal != *negate)
        }
        Expr::And(l, r) => {
            let l = eval(l, app)?;
            if l.truthy() {
                eval(r, app)?
            } else {
                l
            }
        }
        Expr::Or(l, r) => {
            let l = eval(l, app)?;
            if l.truthy() {
                l
            } else {
                eval(r, app)?
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::{resolve_apps, AppConfig};
    use std::path::Path;

    fn app() -> App {
        let config = AppConfig {
            name: "main".to_string(),
            dir_name: "shop".to_string(),
            description: "Shop".to_string(),
            common_env: serde_json::json!({ "MODE": "mall", "LEVEL": 2, "BETA": false })
                .as_object()
                .cloned()
                .unwrap(),
            ..AppConfig::default()
        };
        resolve_apps(&[config], "acme", Path::new("apps"))
            .unwrap()
            .remove(0)
    }

    fn check(src: &str) -> bool {
        Condition::parse(src).unwrap().eval(&app()).unwrap()
    }

    #[test]
    fn test_comparisons() {
        assert!(check(r#"app.name === "main""#));
        assert!(check("app.key == 'shop-main'"));
        assert!(!check(r#"app.dirName !== "shop""#));
        assert!(check(r#"app.env.MODE != "clinic""#));
        assert!(check("app.env.LEVEL == '2'"));
        assert!(!check("app.env.LEVEL === '2'"));
    }

    #[test]
    fn test_logic_and_truthiness() {
        assert!(check(r#"app.name === "main" && (app.env.BETA || app.env.MODE === "mall")"#));
        assert!(!check("app.env.BETA"));
        assert!(check("!app.env.MISSING"));
        assert!(check(r#"app.packageName === "x" || app.index == 0"#));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Condition::parse("process.exit(1)"),
            Err(ConditionError::UnknownField("process.exit".to_string()))
        );
        assert_eq!(Condition::parse("app.name ==="), Err(ConditionError::UnexpectedEnd));
        assert_eq!(
            Condition::parse("app.name; 1"),
            Err(ConditionError::UnexpectedChar(';'))
        );
        assert!(matches!(
            Condition::parse(r#"app.name == "main"#),
            Err(ConditionError::UnterminatedString)
        ));
    }

    #[test]
    fn test_unknown_field_at_eval() {
        let condition = Condition::parse("app.secret").unwrap();
        assert!(matches!(
            condition.eval(&app()),
            Err(ConditionError::UnknownField(_))
        ));
    }
}
