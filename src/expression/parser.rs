use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, recognize, value},
    error::{Error, ErrorKind},
    sequence::{delimited, pair, preceded, terminated},
};
use serde_json::{Number, Value};

use super::ExpressionError;

type Res<'a, O> = IResult<&'a str, O>;

const RESERVED: &[&str] = &[
    "and", "or", "not", "eq", "neq", "lt", "lte", "gt", "gte", "null", "true", "false",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Method),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Size,
    IsEmpty,
    Trim,
    ToUpperCase,
    ToLowerCase,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "size" | "length" => Some(Self::Size),
            "isEmpty" => Some(Self::IsEmpty),
            "trim" => Some(Self::Trim),
            "toUpperCase" => Some(Self::ToUpperCase),
            "toLowerCase" => Some(Self::ToLowerCase),
            _ => None,
        }
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
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Parses a whole expression; trailing input is a syntax error.
pub fn parse(expression: &str) -> Result<Expr, ExpressionError> {
    match all_consuming(terminated(or_expr, multispace0)).parse(expression) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(ExpressionError::Syntax {
            expression: expression.to_string(),
            position: expression.len() - e.input.len(),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ExpressionError::Syntax {
            expression: expression.to_string(),
            position: expression.len(),
        }),
    }
}

fn fail<O>(input: &str, kind: ErrorKind) -> Res<'_, O> {
    Err(nom::Err::Error(Error::new(input, kind)))
}

fn sp(input: &str) -> Res<'_, &str> {
    multispace0(input)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    move |input| terminated(tag(word), not(satisfy(is_ident_char))).parse(input)
}

fn raw_identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char))).parse(input)
}

fn identifier(input: &str) -> Res<'_, &str> {
    let (rest, name) = raw_identifier(input)?;
    if RESERVED.contains(&name) {
        return fail(input, ErrorKind::Verify);
    }
    Ok((rest, name))
}

fn number(input: &str) -> Res<'_, Expr> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit1)))).parse(input)?;
    let parsed = if text.contains('.') {
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
    } else {
        text.parse::<i64>().ok().map(Value::from)
    };
    match parsed {
        Some(v) => Ok((rest, Expr::Literal(v))),
        None => fail(input, ErrorKind::Digit),
    }
}

/// Single- or double-quoted string with backslash escapes.
fn string_literal(input: &str) -> Res<'_, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => return fail(input, ErrorKind::Char),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

fn literal(input: &str) -> Res<'_, Expr> {
    alt((
        value(Expr::Literal(Value::Null), keyword("null")),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        number,
        map(string_literal, |s| Expr::Literal(Value::String(s))),
    ))
    .parse(input)
}

fn primary(input: &str) -> Res<'_, Expr> {
    alt((
        delimited(char('('), or_expr, preceded(sp, char(')'))),
        literal,
        map(identifier, |name| Expr::Variable(name.to_string())),
    ))
    .parse(input)
}

fn method_call(input: &str) -> Res<'_, ()> {
    value((), (sp, char('('), sp, char(')'))).parse(input)
}

fn postfix(input: &str) -> Res<'_, Expr> {
    let (mut input, mut expr) = preceded(sp, primary).parse(input)?;
    loop {
        if let Ok((rest, name)) = preceded((sp, char('.'), sp), raw_identifier).parse(input) {
            if let Ok((after, ())) = method_call(rest) {
                let Some(method) = Method::from_name(name) else {
                    return Err(nom::Err::Failure(Error::new(rest, ErrorKind::Tag)));
                };
                expr = Expr::Call(Box::new(expr), method);
                input = after;
            } else {
                expr = Expr::Member(Box::new(expr), name.to_string());
                input = rest;
            }
            continue;
        }
        if let Ok((rest, index)) =
            delimited((sp, char('[')), or_expr, (sp, char(']'))).parse(input)
        {
            expr = Expr::Index(Box::new(expr), Box::new(index));
            input = rest;
            continue;
        }
        return Ok((input, expr));
    }
}

fn unary(input: &str) -> Res<'_, Expr> {
    let (input, _) = sp(input)?;
    alt((
        map(preceded(alt((tag("!"), keyword("not"))), unary), |e| {
            Expr::Not(Box::new(e))
        }),
        map(preceded(char('-'), unary), |e| Expr::Negate(Box::new(e))),
        postfix,
    ))
    .parse(input)
}

/// Left-associative chain of `operand (operator operand)*`.
fn binary_level<'a>(
    input: &'a str,
    operand: fn(&'a str) -> Res<'a, Expr>,
    operator: fn(&'a str) -> Res<'a, BinaryOp>,
) -> Res<'a, Expr> {
    let (mut input, mut left) = operand(input)?;
    loop {
        let Ok((rest, op)) = preceded(sp, operator).parse(input) else {
            return Ok((input, left));
        };
        let (rest, right) = operand(rest)?;
        left = Expr::Binary(Box::new(left), op, Box::new(right));
        input = rest;
    }
}

fn or_op(input: &str) -> Res<'_, BinaryOp> {
    value(BinaryOp::Or, alt((tag("||"), keyword("or")))).parse(input)
}

fn and_op(input: &str) -> Res<'_, BinaryOp> {
    value(BinaryOp::And, alt((tag("&&"), keyword("and")))).parse(input)
}

fn equality_op(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Eq, keyword("eq")),
        value(BinaryOp::Ne, keyword("neq")),
    ))
    .parse(input)
}

fn relational_op(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Le, keyword("lte")),
        value(BinaryOp::Ge, keyword("gte")),
        value(BinaryOp::Lt, keyword("lt")),
        value(BinaryOp::Gt, keyword("gt")),
    ))
    .parse(input)
}

fn additive_op(input: &str) -> Res<'_, BinaryOp> {
    alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-')))).parse(input)
}

fn multiplicative_op(input: &str) -> Res<'_, BinaryOp> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Rem, char('%')),
    ))
    .parse(input)
}

fn or_expr(input: &str) -> Res<'_, Expr> {
    binary_level(input, and_expr, or_op)
}

fn and_expr(input: &str) -> Res<'_, Expr> {
    binary_level(input, equality, and_op)
}

fn equality(input: &str) -> Res<'_, Expr> {
    binary_level(input, relational, equality_op)
}

fn relational(input: &str) -> Res<'_, Expr> {
    binary_level(input, additive, relational_op)
}

fn additive(input: &str) -> Res<'_, Expr> {
    binary_level(input, multiplicative, additive_op)
}

fn multiplicative(input: &str) -> Res<'_, Expr> {
    binary_level(input, unary, multiplicative_op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.to_string()))
    }

    fn lit(v: Value) -> Box<Expr> {
        Box::new(Expr::Literal(v))
    }

    #[test]
    fn null_check() {
        assert_eq!(
            parse("name != null"),
            Ok(Expr::Binary(var("name"), BinaryOp::Ne, lit(json!(null))))
        );
    }

    #[test]
    fn precedence_and_keywords() {
        assert_eq!(
            parse("a or b and not c"),
            Ok(Expr::Binary(
                var("a"),
                BinaryOp::Or,
                Box::new(Expr::Binary(
                    var("b"),
                    BinaryOp::And,
                    Box::new(Expr::Not(var("c")))
                ))
            ))
        );
        assert_eq!(
            parse("1 + 2 * 3"),
            Ok(Expr::Binary(
                lit(json!(1)),
                BinaryOp::Add,
                Box::new(Expr::Binary(lit(json!(2)), BinaryOp::Mul, lit(json!(3))))
            ))
        );
    }

    #[test]
    fn keyword_prefixed_identifiers_are_variables() {
        assert_eq!(
            parse("order gte nullable"),
            Ok(Expr::Binary(var("order"), BinaryOp::Ge, var("nullable")))
        );
    }

    #[test]
    fn paths_and_methods() {
        assert_eq!(
            parse("user.tags[0].size()"),
            Ok(Expr::Call(
                Box::new(Expr::Index(
                    Box::new(Expr::Member(var("user"), "tags".to_string())),
                    lit(json!(0))
                )),
                Method::Size
            ))
        );
        assert_eq!(
            parse("m['k']"),
            Ok(Expr::Index(var("m"), lit(json!("k"))))
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            parse(r#"'it\'s' + "a\"b""#),
            Ok(Expr::Binary(
                lit(json!("it's")),
                BinaryOp::Add,
                lit(json!("a\"b"))
            ))
        );
    }

    #[test]
    fn syntax_errors_report_position() {
        assert!(matches!(parse("a =="), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("(a"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("a.bogus()"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("'open"), Err(ExpressionError::Syntax { .. })));
        assert_eq!(
            parse("a b"),
            Err(ExpressionError::Syntax {
                expression: "a b".to_string(),
                position: 2
            })
        );
    }
}
