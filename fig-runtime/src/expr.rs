// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Length and condition expressions.
//!
//! Expressions are small formulas evaluated against two scopes: `self`,
//! the record currently being decoded or encoded, and `context`, an
//! optional record decoded earlier. Numbers are `f64` throughout;
//! lengths are truncated toward zero when the final value is coerced.

use crate::functions;
use crate::value::{Scope, Value};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use std::fmt;
use std::sync::OnceLock;

#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" | "\r" | "\n" }

identifier = @{ (ASCII_ALPHA | "_") ~ (ASCII_ALPHANUMERIC | "_")* }
hexvalue = @{ ("0x" | "0X") ~ ASCII_HEX_DIGIT+ }
floatvalue = @{ ASCII_DIGIT+ ~ "." ~ ASCII_DIGIT+ }
intvalue = @{ ASCII_DIGIT+ }
boolean = @{ ("true" | "false") ~ !(ASCII_ALPHANUMERIC | "_") }
single_quoted = @{ (!"'" ~ ANY)* }
double_quoted = @{ (!"\"" ~ ANY)* }
string = ${ ("'" ~ single_quoted ~ "'") | ("\"" ~ double_quoted ~ "\"") }
path = ${ identifier ~ ("." ~ identifier)* }
arguments = { expr ~ ("," ~ expr)* }
call = { identifier ~ "(" ~ arguments? ~ ")" }

primary = _{
    boolean |
    call |
    path |
    hexvalue |
    floatvalue |
    intvalue |
    string |
    "(" ~ expr ~ ")"
}

neg = { "-" }
not = { "!" }
prefix = _{ neg | not }

or = { "||" }
and = { "&&" }
eq = { "==" }
ne = { "!=" }
le = { "<=" }
ge = { ">=" }
shl = { "<<" }
shr = { ">>" }
lt = { "<" }
gt = { ">" }
bit_or = { "|" }
bit_xor = { "^" }
bit_and = { "&" }
add = { "+" }
sub = { "-" }
mul = { "*" }
div = { "/" }
rem = { "%" }
infix = _{
    or | and | eq | ne | le | ge | shl | shr | lt | gt |
    bit_or | bit_xor | bit_and | add | sub | mul | div | rem
}

expr = { prefix* ~ primary ~ (infix ~ prefix* ~ primary)* }
expression = { SOI ~ expr ~ EOI }
"#]
struct ExprParser;

/// Scope selected by a field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKind {
    /// `self.<field>`, or a bare field name.
    This,
    /// `context.<field>`.
    Context,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeKind::This => "self",
            ScopeKind::Context => "context",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        })
    }
}

/// Errors raised while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("unsupported field path `{0}`, expected `self.<field>` or `context.<field>`")]
    UnsupportedPath(String),
    #[error("undefined field `{scope}.{name}`")]
    UndefinedField { scope: ScopeKind, name: String },
    #[error("`context.{name}` is referenced but no context record was provided")]
    ContextUnavailable { name: String },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("{function} expects {expected} argument(s), got {got}")]
    ArgumentCount { function: &'static str, expected: usize, got: usize },
    #[error("argument `{parameter}` of {function} must be a number, got a {found}")]
    ArgumentType { function: &'static str, parameter: &'static str, found: &'static str },
    #[error("{function}: {message}")]
    Function { function: &'static str, message: String },
    #[error("operator `{op}` cannot be applied to a {lhs} and a {rhs}")]
    TypeMismatch { op: BinaryOp, lhs: &'static str, rhs: &'static str },
    #[error("operator `{op}` cannot be applied to a {operand}")]
    InvalidOperand { op: UnaryOp, operand: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("shift amount {0} is out of range")]
    InvalidShift(i64),
    #[error("length evaluated to a negative value ({0})")]
    NegativeLength(f64),
    #[error("expected a numeric length, got {0}")]
    NotANumber(String),
    #[error("expected a boolean condition, got {0}")]
    NotABoolean(String),
}

/// Compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Str(String),
    Field { scope: ScopeKind, name: String },
    Call { function: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

/// Evaluation environment.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub this: &'a dyn Scope,
    pub context: Option<&'a dyn Scope>,
}

fn pratt_parser() -> PrattParser<Rule> {
    // Operators declared last bind tighter. Bitwise operators bind
    // tighter than comparisons so that `flags & 1 != 0` reads as
    // `(flags & 1) != 0`.
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left))
        .op(Op::infix(Rule::bit_or, Assoc::Left))
        .op(Op::infix(Rule::bit_xor, Assoc::Left))
        .op(Op::infix(Rule::bit_and, Assoc::Left))
        .op(Op::infix(Rule::shl, Assoc::Left) | Op::infix(Rule::shr, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
}

fn err_unexpected_rule<T>(rule: Rule, offset: usize) -> Result<T, ExprError> {
    Err(ExprError::Syntax { offset, message: format!("unexpected rule {:?}", rule) })
}

fn binary_op(node: &Pair<'_, Rule>) -> Result<BinaryOp, ExprError> {
    Ok(match node.as_rule() {
        Rule::or => BinaryOp::Or,
        Rule::and => BinaryOp::And,
        Rule::eq => BinaryOp::Eq,
        Rule::ne => BinaryOp::Ne,
        Rule::lt => BinaryOp::Lt,
        Rule::le => BinaryOp::Le,
        Rule::gt => BinaryOp::Gt,
        Rule::ge => BinaryOp::Ge,
        Rule::bit_or => BinaryOp::BitOr,
        Rule::bit_xor => BinaryOp::BitXor,
        Rule::bit_and => BinaryOp::BitAnd,
        Rule::shl => BinaryOp::Shl,
        Rule::shr => BinaryOp::Shr,
        Rule::add => BinaryOp::Add,
        Rule::sub => BinaryOp::Sub,
        Rule::mul => BinaryOp::Mul,
        Rule::div => BinaryOp::Div,
        Rule::rem => BinaryOp::Rem,
        rule => return err_unexpected_rule(rule, node.as_span().start()),
    })
}

fn parse_path(node: Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let text = node.as_str().to_owned();
    let segments = node.into_inner().map(|n| n.as_str()).collect::<Vec<_>>();
    let (scope, name) = match segments.as_slice() {
        ["self", name] => (ScopeKind::This, name),
        ["context", name] => (ScopeKind::Context, name),
        [name] if *name != "self" && *name != "context" => (ScopeKind::This, name),
        _ => return Err(ExprError::UnsupportedPath(text)),
    };
    Ok(Expr::Field { scope, name: (*name).to_owned() })
}

fn parse_number(node: &Pair<'_, Rule>) -> Result<Expr, ExprError> {
    let text = node.as_str();
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16).map(|v| v as f64).ok(),
        None => text.parse::<f64>().ok(),
    };
    value.map(Expr::Number).ok_or_else(|| ExprError::Syntax {
        offset: node.as_span().start(),
        message: format!("cannot convert '{}' to a number", text),
    })
}

fn parse_primary(node: Pair<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<Expr, ExprError> {
    match node.as_rule() {
        Rule::expr => parse_expr(node.into_inner(), pratt),
        Rule::hexvalue | Rule::floatvalue | Rule::intvalue => parse_number(&node),
        Rule::boolean => Ok(Expr::Bool(node.as_str() == "true")),
        Rule::string => {
            Ok(Expr::Str(node.into_inner().next().map(|n| n.as_str().to_owned()).unwrap_or_default()))
        }
        Rule::path => parse_path(node),
        Rule::call => {
            let mut children = node.into_inner();
            let function = match children.next() {
                Some(n) if n.as_rule() == Rule::identifier => n.as_str().to_owned(),
                Some(n) => return err_unexpected_rule(n.as_rule(), n.as_span().start()),
                None => unreachable!("call without identifier"),
            };
            let args = match children.next() {
                Some(arguments) => arguments
                    .into_inner()
                    .map(|arg| parse_expr(arg.into_inner(), pratt))
                    .collect::<Result<Vec<_>, _>>()?,
                None => vec![],
            };
            Ok(Expr::Call { function, args })
        }
        rule => err_unexpected_rule(rule, node.as_span().start()),
    }
}

fn parse_expr(nodes: Pairs<'_, Rule>, pratt: &PrattParser<Rule>) -> Result<Expr, ExprError> {
    pratt
        .map_primary(|primary| parse_primary(primary, pratt))
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::neg => UnaryOp::Neg,
                Rule::not => UnaryOp::Not,
                rule => return err_unexpected_rule(rule, op.as_span().start()),
            };
            Ok(Expr::Unary { op, operand: Box::new(operand?) })
        })
        .map_infix(|lhs, op, rhs| {
            let op = binary_op(&op)?;
            Ok(Expr::Binary { op, lhs: Box::new(lhs?), rhs: Box::new(rhs?) })
        })
        .parse(nodes)
}

impl Expr {
    /// Compile an expression from its source text.
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        let root = ExprParser::parse(Rule::expression, source).map_err(|err| {
            let offset = match err.location {
                pest::error::InputLocation::Pos(pos) => pos,
                pest::error::InputLocation::Span((start, _)) => start,
            };
            ExprError::Syntax { offset, message: err.variant.message().into_owned() }
        })?;
        let pratt = pratt_parser();
        let expr = root
            .flat_map(|n| n.into_inner())
            .find(|n| n.as_rule() == Rule::expr)
            .ok_or_else(|| ExprError::Syntax { offset: 0, message: "empty expression".to_owned() })?;
        parse_expr(expr.into_inner(), &pratt)
    }

    /// Visit the expression tree in pre-order.
    pub fn visit<'e>(&'e self, f: &mut impl FnMut(&'e Expr)) {
        f(self);
        match self {
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.visit(f)),
            Expr::Unary { operand, .. } => operand.visit(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Number(_) | Expr::Bool(_) | Expr::Str(_) | Expr::Field { .. } => (),
        }
    }

    /// Return the field paths referenced by the expression, in
    /// order of appearance.
    pub fn fields(&self) -> Vec<(ScopeKind, &str)> {
        let mut fields = vec![];
        self.visit(&mut |e| {
            if let Expr::Field { scope, name } = e {
                fields.push((*scope, name.as_str()))
            }
        });
        fields
    }

    /// Test whether the expression reads from the context record.
    pub fn references_context(&self) -> bool {
        self.fields().iter().any(|(scope, _)| *scope == ScopeKind::Context)
    }

    /// Check that every called function is registered and invoked
    /// with the right number of arguments.
    pub fn check_functions(&self) -> Result<(), ExprError> {
        let mut result = Ok(());
        self.visit(&mut |e| {
            if result.is_err() {
                return;
            }
            if let Expr::Call { function, args } = e {
                result = match functions::lookup(function) {
                    None => Err(ExprError::UnknownFunction(function.clone())),
                    Some(f) if f.parameters.len() != args.len() => Err(ExprError::ArgumentCount {
                        function: f.name,
                        expected: f.parameters.len(),
                        got: args.len(),
                    }),
                    Some(_) => Ok(()),
                }
            }
        });
        result
    }

    /// Evaluate the expression.
    pub fn eval(&self, env: &Env<'_>) -> Result<Value, ExprError> {
        match self {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Field { scope: ScopeKind::This, name } => env
                .this
                .get(name)
                .ok_or_else(|| ExprError::UndefinedField { scope: ScopeKind::This, name: name.clone() }),
            Expr::Field { scope: ScopeKind::Context, name } => env
                .context
                .ok_or_else(|| ExprError::ContextUnavailable { name: name.clone() })?
                .get(name)
                .ok_or_else(|| ExprError::UndefinedField {
                    scope: ScopeKind::Context,
                    name: name.clone(),
                }),
            Expr::Call { function, args } => {
                let function = functions::lookup(function)
                    .ok_or_else(|| ExprError::UnknownFunction(function.clone()))?;
                let args = args.iter().map(|arg| arg.eval(env)).collect::<Result<Vec<_>, _>>()?;
                function.call(&args)
            }
            Expr::Unary { op, operand } => op.apply(operand.eval(env)?),
            Expr::Binary { op: BinaryOp::And, lhs, rhs } => {
                Ok(Value::Bool(truth(BinaryOp::And, &lhs.eval(env)?)? && truth(BinaryOp::And, &rhs.eval(env)?)?))
            }
            Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
                Ok(Value::Bool(truth(BinaryOp::Or, &lhs.eval(env)?)? || truth(BinaryOp::Or, &rhs.eval(env)?)?))
            }
            Expr::Binary { op, lhs, rhs } => op.apply(lhs.eval(env)?, rhs.eval(env)?),
        }
    }

    /// Evaluate the expression as a byte length.
    ///
    /// The result must be a non-negative number, and is truncated
    /// toward zero.
    pub fn length(&self, env: &Env<'_>) -> Result<usize, ExprError> {
        match self.eval(env)? {
            Value::Number(n) if n.is_nan() || n.is_infinite() => {
                Err(ExprError::NotANumber(n.to_string()))
            }
            Value::Number(n) if n < 0.0 => Err(ExprError::NegativeLength(n)),
            Value::Number(n) => Ok(n.trunc() as usize),
            value => Err(ExprError::NotANumber(value.to_string())),
        }
    }

    /// Evaluate the expression as a presence condition.
    pub fn condition(&self, env: &Env<'_>) -> Result<bool, ExprError> {
        let value = self.eval(env)?;
        value.truthy().ok_or_else(|| ExprError::NotABoolean(value.to_string()))
    }
}

fn truth(op: BinaryOp, value: &Value) -> Result<bool, ExprError> {
    value.truthy().ok_or(ExprError::TypeMismatch { op, lhs: value.kind(), rhs: "boolean" })
}

fn integer(value: f64) -> i64 {
    value.trunc() as i64
}

impl UnaryOp {
    fn apply(self, operand: Value) -> Result<Value, ExprError> {
        match (self, &operand) {
            (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
            (UnaryOp::Not, _) => match operand.truthy() {
                Some(b) => Ok(Value::Bool(!b)),
                None => Err(ExprError::InvalidOperand { op: self, operand: operand.kind() }),
            },
            (UnaryOp::Neg, _) => Err(ExprError::InvalidOperand { op: self, operand: operand.kind() }),
        }
    }
}

impl BinaryOp {
    fn mismatch(self, lhs: &Value, rhs: &Value) -> ExprError {
        ExprError::TypeMismatch { op: self, lhs: lhs.kind(), rhs: rhs.kind() }
    }

    fn apply(self, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
        if let BinaryOp::Eq | BinaryOp::Ne = self {
            let equal = match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => return Err(self.mismatch(&lhs, &rhs)),
            };
            return Ok(Value::Bool(equal == (self == BinaryOp::Eq)));
        }
        if let BinaryOp::And | BinaryOp::Or = self {
            let (a, b) = (truth(self, &lhs)?, truth(self, &rhs)?);
            return Ok(Value::Bool(if self == BinaryOp::And { a && b } else { a || b }));
        }

        let (Value::Number(a), Value::Number(b)) = (&lhs, &rhs) else {
            return Err(self.mismatch(&lhs, &rhs));
        };
        let (a, b) = (*a, *b);
        Ok(match self {
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            BinaryOp::Add => Value::Number(a + b),
            BinaryOp::Sub => Value::Number(a - b),
            BinaryOp::Mul => Value::Number(a * b),
            BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Div => Value::Number(a / b),
            BinaryOp::Rem => Value::Number(a % b),
            BinaryOp::BitOr => Value::Number((integer(a) | integer(b)) as f64),
            BinaryOp::BitXor => Value::Number((integer(a) ^ integer(b)) as f64),
            BinaryOp::BitAnd => Value::Number((integer(a) & integer(b)) as f64),
            BinaryOp::Shl | BinaryOp::Shr => {
                let shift = integer(b);
                if !(0..64).contains(&shift) {
                    return Err(ExprError::InvalidShift(shift));
                }
                let value = integer(a);
                Value::Number(if self == BinaryOp::Shl {
                    value.wrapping_shl(shift as u32)
                } else {
                    value >> shift
                } as f64)
            }
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::And | BinaryOp::Or => unreachable!(),
        })
    }
}

/// Expression source text compiled on first use.
///
/// The constructor is `const` so that generated code can declare
/// expressions as `static` items.
pub struct Expression {
    source: &'static str,
    compiled: OnceLock<Result<Expr, ExprError>>,
}

impl Expression {
    pub const fn new(source: &'static str) -> Self {
        Expression { source, compiled: OnceLock::new() }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Return the compiled expression, or the compilation error.
    pub fn compile(&self) -> Result<&Expr, ExprError> {
        self.compiled.get_or_init(|| Expr::parse(self.source)).as_ref().map_err(Clone::clone)
    }

    /// Evaluate the expression as a byte length.
    pub fn length(&self, this: &dyn Scope, context: Option<&dyn Scope>) -> Result<usize, ExprError> {
        self.compile()?.length(&Env { this, context })
    }

    /// Evaluate the expression as a presence condition.
    pub fn condition(&self, this: &dyn Scope, context: Option<&dyn Scope>) -> Result<bool, ExprError> {
        self.compile()?.condition(&Env { this, context })
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn scope(values: &[(&str, Value)]) -> HashMap<String, Value> {
        values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn eval(source: &str, this: &dyn Scope, context: Option<&dyn Scope>) -> Result<Value, ExprError> {
        Expr::parse(source)?.eval(&Env { this, context })
    }

    #[test]
    fn test_parse_precedence() {
        let expr = Expr::parse("1 + 2 * 3").unwrap();
        assert_eq!(expr.eval(&Env { this: &(), context: None }), Ok(Value::Number(7.0)));

        let expr = Expr::parse("(1 + 2) * 3").unwrap();
        assert_eq!(expr.eval(&Env { this: &(), context: None }), Ok(Value::Number(9.0)));

        let expr = Expr::parse("10 - 4 - 3").unwrap();
        assert_eq!(expr.eval(&Env { this: &(), context: None }), Ok(Value::Number(3.0)));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            Expr::parse("self.width").unwrap(),
            Expr::Field { scope: ScopeKind::This, name: "width".to_owned() }
        );
        assert_eq!(
            Expr::parse("context.version").unwrap(),
            Expr::Field { scope: ScopeKind::Context, name: "version".to_owned() }
        );
        assert_eq!(
            Expr::parse("Width").unwrap(),
            Expr::Field { scope: ScopeKind::This, name: "Width".to_owned() }
        );
        assert!(matches!(Expr::parse("self.header.width"), Err(ExprError::UnsupportedPath(_))));
        assert!(matches!(Expr::parse("other.width"), Err(ExprError::UnsupportedPath(_))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Expr::parse(""), Err(ExprError::Syntax { .. })));
        assert!(matches!(Expr::parse("..."), Err(ExprError::Syntax { .. })));
        assert!(matches!(Expr::parse("1 +"), Err(ExprError::Syntax { .. })));
        assert!(matches!(Expr::parse("(1"), Err(ExprError::Syntax { .. })));
        assert!(matches!(Expr::parse("NEEDS MANUAL"), Err(ExprError::Syntax { .. })));
    }

    #[test]
    fn test_literals() {
        let this = ();
        assert_eq!(eval("0x10", &this, None), Ok(Value::Number(16.0)));
        assert_eq!(eval("2.5 * 2", &this, None), Ok(Value::Number(5.0)));
        assert_eq!(eval("'BM' == \"BM\"", &this, None), Ok(Value::Bool(true)));
        assert_eq!(eval("!true || false", &this, None), Ok(Value::Bool(false)));
        assert_eq!(eval("-3 + 1", &this, None), Ok(Value::Number(-2.0)));
    }

    #[test]
    fn test_bitwise_binds_tighter_than_comparison() {
        let this = scope(&[("flags", Value::Number(0.0))]);
        assert_eq!(eval("self.flags & 1 != 0", &this, None), Ok(Value::Bool(false)));
        let this = scope(&[("flags", Value::Number(1.0))]);
        assert_eq!(eval("self.flags & 1 != 0", &this, None), Ok(Value::Bool(true)));
        assert_eq!(eval("1 << 4 | 1", &this, None), Ok(Value::Number(17.0)));
    }

    #[test]
    fn test_context_scope() {
        let this = scope(&[("kind", Value::Number(2.0))]);
        let context = scope(&[("version", Value::Number(3.0))]);
        assert_eq!(
            eval("context.version >= 3 && self.kind == 2", &this, Some(&context)),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            eval("context.version", &this, None),
            Err(ExprError::ContextUnavailable { name: "version".to_owned() })
        );
        assert_eq!(
            eval("context.missing", &this, Some(&context)),
            Err(ExprError::UndefinedField { scope: ScopeKind::Context, name: "missing".to_owned() })
        );
    }

    #[test]
    fn test_padded_size_expression() {
        let this = scope(&[
            ("width", Value::Number(2.0)),
            ("height", Value::Number(2.0)),
            ("bitsPerPixel", Value::Number(24.0)),
        ]);
        let expr = Expr::parse("CalculatePaddedSize(self.width, self.height, self.bitsPerPixel)")
            .unwrap();
        assert_eq!(expr.length(&Env { this: &this, context: None }), Ok(16));
        assert!(expr.check_functions().is_ok());
        assert!(!expr.references_context());
        assert_eq!(
            expr.fields(),
            vec![
                (ScopeKind::This, "width"),
                (ScopeKind::This, "height"),
                (ScopeKind::This, "bitsPerPixel")
            ]
        );
    }

    #[test]
    fn test_length_coercion() {
        let this = ();
        let env = Env { this: &this, context: None };
        assert_eq!(Expr::parse("7 / 2").unwrap().length(&env), Ok(3));
        assert_eq!(Expr::parse("1 - 2").unwrap().length(&env), Err(ExprError::NegativeLength(-1.0)));
        assert!(matches!(Expr::parse("1 == 1").unwrap().length(&env), Err(ExprError::NotANumber(_))));
        assert_eq!(Expr::parse("1 / 0").unwrap().length(&env), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn test_condition_coercion() {
        let this = ();
        let env = Env { this: &this, context: None };
        assert_eq!(Expr::parse("2").unwrap().condition(&env), Ok(true));
        assert_eq!(Expr::parse("0").unwrap().condition(&env), Ok(false));
        assert!(matches!(Expr::parse("'x'").unwrap().condition(&env), Err(ExprError::NotABoolean(_))));
    }

    #[test]
    fn test_check_functions() {
        assert_eq!(
            Expr::parse("Unknown(1)").unwrap().check_functions(),
            Err(ExprError::UnknownFunction("Unknown".to_owned()))
        );
        assert!(matches!(
            Expr::parse("1 + CalculatePaddedSize(1, 2)").unwrap().check_functions(),
            Err(ExprError::ArgumentCount { expected: 3, got: 2, .. })
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let this = ();
        assert!(matches!(eval("'a' + 1", &this, None), Err(ExprError::TypeMismatch { .. })));
        assert!(matches!(eval("1 == true", &this, None), Err(ExprError::TypeMismatch { .. })));
        assert!(matches!(eval("-'a'", &this, None), Err(ExprError::InvalidOperand { .. })));
    }

    #[test]
    fn test_expression_is_deterministic() {
        static LENGTH: Expression = Expression::new("self.width * 3 + context.extra");
        let this = scope(&[("width", Value::Number(5.0))]);
        let context = scope(&[("extra", Value::Number(1.0))]);
        let first = LENGTH.length(&this, Some(&context));
        assert_eq!(first, Ok(16));
        for _ in 0..3 {
            assert_eq!(LENGTH.length(&this, Some(&context)), first);
        }
    }
}
