//! Parameter mappings collected from `#{...}` placeholders.
//!
//! A placeholder body is either a property path or a parenthesized
//! expression, optionally followed by a legacy `:JDBCTYPE` tag and a list of
//! `name=value` attributes:
//!
//! ```text
//! #{user.name}
//! #{age,jdbcType=INTEGER}
//! #{price:NUMERIC, numericScale=2}
//! #{(a + b), jdbcType=BIGINT}
//! ```

use std::{fmt, str::FromStr};

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_till,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    error::{Error as NomError, ErrorKind},
    multi::many0,
    sequence::{preceded, separated_pair},
};
use serde_json::Value;

use crate::Error;

/// External type tag used to pick a codec when a value is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdbcType {
    Array,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Clob,
    NClob,
    Date,
    Time,
    Timestamp,
    TimeWithTimezone,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Boolean,
    Null,
    Other,
    Cursor,
    Struct,
    SqlXml,
    Undefined,
}

/// Coarse grouping of [`JdbcType`] used when encoding values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Boolean,
    Character,
    Other,
}

impl JdbcType {
    pub fn family(self) -> TypeFamily {
        match self {
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt => TypeFamily::Integer,
            Self::Float | Self::Real | Self::Double | Self::Numeric | Self::Decimal => {
                TypeFamily::Float
            }
            Self::Bit | Self::Boolean => TypeFamily::Boolean,
            Self::Char
            | Self::VarChar
            | Self::LongVarChar
            | Self::NChar
            | Self::NVarChar
            | Self::LongNVarChar
            | Self::Clob
            | Self::NClob => TypeFamily::Character,
            _ => TypeFamily::Other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Array => "ARRAY",
            Self::Bit => "BIT",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Real => "REAL",
            Self::Double => "DOUBLE",
            Self::Numeric => "NUMERIC",
            Self::Decimal => "DECIMAL",
            Self::Char => "CHAR",
            Self::VarChar => "VARCHAR",
            Self::LongVarChar => "LONGVARCHAR",
            Self::NChar => "NCHAR",
            Self::NVarChar => "NVARCHAR",
            Self::LongNVarChar => "LONGNVARCHAR",
            Self::Clob => "CLOB",
            Self::NClob => "NCLOB",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            Self::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
            Self::Binary => "BINARY",
            Self::VarBinary => "VARBINARY",
            Self::LongVarBinary => "LONGVARBINARY",
            Self::Blob => "BLOB",
            Self::Boolean => "BOOLEAN",
            Self::Null => "NULL",
            Self::Other => "OTHER",
            Self::Cursor => "CURSOR",
            Self::Struct => "STRUCT",
            Self::SqlXml => "SQLXML",
            Self::Undefined => "UNDEFINED",
        }
    }
}

const ALL_JDBC_TYPES: &[JdbcType] = &[
    JdbcType::Array,
    JdbcType::Bit,
    JdbcType::TinyInt,
    JdbcType::SmallInt,
    JdbcType::Integer,
    JdbcType::BigInt,
    JdbcType::Float,
    JdbcType::Real,
    JdbcType::Double,
    JdbcType::Numeric,
    JdbcType::Decimal,
    JdbcType::Char,
    JdbcType::VarChar,
    JdbcType::LongVarChar,
    JdbcType::NChar,
    JdbcType::NVarChar,
    JdbcType::LongNVarChar,
    JdbcType::Clob,
    JdbcType::NClob,
    JdbcType::Date,
    JdbcType::Time,
    JdbcType::Timestamp,
    JdbcType::TimeWithTimezone,
    JdbcType::TimestampWithTimezone,
    JdbcType::Binary,
    JdbcType::VarBinary,
    JdbcType::LongVarBinary,
    JdbcType::Blob,
    JdbcType::Boolean,
    JdbcType::Null,
    JdbcType::Other,
    JdbcType::Cursor,
    JdbcType::Struct,
    JdbcType::SqlXml,
    JdbcType::Undefined,
];

impl FromStr for JdbcType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ALL_JDBC_TYPES
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl fmt::Display for JdbcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl FromStr for ParameterMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            "INOUT" => Ok(Self::InOut),
            _ => Err(()),
        }
    }
}

/// One bound parameter, in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMapping {
    property: String,
    value_type: Option<String>,
    jdbc_type: Option<JdbcType>,
    jdbc_type_name: Option<String>,
    mode: ParameterMode,
    numeric_scale: Option<u32>,
    result_map: Option<String>,
    expression: Option<String>,
    value: Option<Value>,
}

impl ParameterMapping {
    /// Builds a mapping for a bare property path.
    pub fn new(property: impl Into<String>) -> Self {
        ParameterMapping {
            property: property.into(),
            ..Default::default()
        }
    }

    /// A mapping that was not parsed from template text and carries its
    /// value directly.
    pub fn synthesized(property: impl Into<String>, value: Value) -> Self {
        ParameterMapping {
            property: property.into(),
            value: Some(value),
            ..Default::default()
        }
    }

    /// Parses the body of a `#{...}` placeholder.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let (rest, parsed) = placeholder(content).map_err(|e| {
            let (remaining, reason) = match e {
                nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.code),
                nom::Err::Incomplete(_) => ("", ErrorKind::Eof),
            };
            Error::InvalidPlaceholder {
                content: content.to_string(),
                position: content.len() - remaining.len(),
                reason: describe(reason).to_string(),
            }
        })?;
        if !rest.trim().is_empty() {
            return Err(Error::InvalidPlaceholder {
                content: content.to_string(),
                position: content.len() - rest.len(),
                reason: "expected ',' or ':'".to_string(),
            });
        }

        let invalid = |name: &str, value: &str| Error::InvalidAttributeValue {
            name: name.to_string(),
            value: value.trim().to_string(),
            content: content.to_string(),
        };

        let mut mapping = match parsed.head {
            Head::Property(property) => ParameterMapping::new(property),
            Head::Expression(expression) => ParameterMapping {
                property: expression.to_string(),
                expression: Some(expression.to_string()),
                ..Default::default()
            },
        };
        if let Some(tag) = parsed.jdbc_type {
            mapping.jdbc_type = Some(tag.parse().map_err(|_| invalid("jdbcType", tag))?);
        }
        for (name, value) in parsed.attributes {
            let text = value.trim().to_string();
            let name = name.trim();
            match name {
                "javaType" => mapping.value_type = Some(text),
                "jdbcType" => {
                    mapping.jdbc_type = Some(value.parse().map_err(|_| invalid(name, value))?)
                }
                "mode" => mapping.mode = value.parse().map_err(|_| invalid(name, value))?,
                "numericScale" => {
                    mapping.numeric_scale = Some(text.parse().map_err(|_| invalid(name, value))?)
                }
                "resultMap" => mapping.result_map = Some(text),
                "jdbcTypeName" => mapping.jdbc_type_name = Some(text),
                "expression" => mapping.expression = Some(text),
                other => {
                    return Err(Error::UnknownPlaceholderAttribute {
                        name: other.to_string(),
                        content: content.to_string(),
                    });
                }
            }
        }
        if mapping.property.is_empty() && mapping.expression.is_none() {
            return Err(Error::InvalidPlaceholder {
                content: content.to_string(),
                position: 0,
                reason: "property name is empty".to_string(),
            });
        }
        Ok(mapping)
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// Declared value type (`javaType=`), kept as written.
    pub fn value_type(&self) -> Option<&str> {
        self.value_type.as_deref()
    }

    pub fn jdbc_type(&self) -> Option<JdbcType> {
        self.jdbc_type
    }

    pub fn jdbc_type_name(&self) -> Option<&str> {
        self.jdbc_type_name.as_deref()
    }

    pub fn mode(&self) -> ParameterMode {
        self.mode
    }

    pub fn numeric_scale(&self) -> Option<u32> {
        self.numeric_scale
    }

    pub fn result_map(&self) -> Option<&str> {
        self.result_map.as_deref()
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Value fixed when the mapping was created, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub(crate) fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn set_jdbc_type(mut self, jdbc_type: JdbcType) -> Self {
        self.jdbc_type = Some(jdbc_type);
        self
    }
}

enum Head<'a> {
    Property(&'a str),
    Expression(&'a str),
}

struct Parsed<'a> {
    head: Head<'a>,
    jdbc_type: Option<&'a str>,
    attributes: Vec<(&'a str, &'a str)>,
}

fn describe(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Char => "unbalanced parentheses in expression",
        ErrorKind::Eof => "unexpected end of placeholder",
        _ => "malformed placeholder",
    }
}

fn placeholder(input: &str) -> IResult<&str, Parsed<'_>> {
    let (input, _) = multispace0(input)?;
    let (input, head) = alt((
        map(preceded(char('('), balanced), |e: &str| {
            Head::Expression(e.trim())
        }),
        map(take_till(|c| c == ',' || c == ':'), |p: &str| {
            Head::Property(p.trim())
        }),
    ))
    .parse(input)?;
    let (input, jdbc_type) = opt(preceded(
        (multispace0, char(':')),
        map(take_till(|c| c == ','), str::trim),
    ))
    .parse(input)?;
    let (input, attributes) = many0(attribute).parse(input)?;
    Ok((
        input,
        Parsed {
            head,
            jdbc_type,
            attributes,
        },
    ))
}

/// Consumes up to the parenthesis closing an already opened `(`.
fn balanced(input: &str) -> IResult<&str, &str> {
    let mut depth = 1usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[i + 1..], &input[..i]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

fn attribute(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(
        (multispace0, char(',')),
        separated_pair(
            take_till(|c| c == '=' || c == ','),
            char('='),
            take_till(|c| c == ','),
        ),
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_property() {
        let m = ParameterMapping::parse(" user.name ").unwrap();
        assert_eq!(m.property(), "user.name");
        assert_eq!(m.mode(), ParameterMode::In);
        assert_eq!(m.jdbc_type(), None);
        assert_eq!(m.value(), None);
    }

    #[test]
    fn attributes() {
        let m = ParameterMapping::parse(
            "price, javaType=decimal, jdbcType=NUMERIC, numericScale=2, mode=INOUT, \
             resultMap=priceMap, jdbcTypeName=money",
        )
        .unwrap();
        assert_eq!(m.property(), "price");
        assert_eq!(m.value_type(), Some("decimal"));
        assert_eq!(m.jdbc_type(), Some(JdbcType::Numeric));
        assert_eq!(m.numeric_scale(), Some(2));
        assert_eq!(m.mode(), ParameterMode::InOut);
        assert_eq!(m.result_map(), Some("priceMap"));
        assert_eq!(m.jdbc_type_name(), Some("money"));
    }

    #[test]
    fn legacy_type_tag() {
        let m = ParameterMapping::parse("age:INTEGER").unwrap();
        assert_eq!(m.property(), "age");
        assert_eq!(m.jdbc_type(), Some(JdbcType::Integer));

        let m = ParameterMapping::parse("age : varchar , mode=OUT").unwrap();
        assert_eq!(m.jdbc_type(), Some(JdbcType::VarChar));
        assert_eq!(m.mode(), ParameterMode::Out);
    }

    #[test]
    fn expression_head() {
        let m = ParameterMapping::parse("(a + (b * 2)), jdbcType=BIGINT").unwrap();
        assert_eq!(m.expression(), Some("a + (b * 2)"));
        assert_eq!(m.jdbc_type(), Some(JdbcType::BigInt));

        let m = ParameterMapping::parse("(id):INTEGER").unwrap();
        assert_eq!(m.expression(), Some("id"));
        assert_eq!(m.jdbc_type(), Some(JdbcType::Integer));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let err = ParameterMapping::parse("id, jdbcTyp=INTEGER").unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownPlaceholderAttribute { ref name, .. } if name == "jdbcTyp"
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            ParameterMapping::parse("id, jdbcType=WIDGET"),
            Err(Error::InvalidAttributeValue { .. })
        ));
        assert!(matches!(
            ParameterMapping::parse("id, numericScale=two"),
            Err(Error::InvalidAttributeValue { .. })
        ));
        assert!(matches!(
            ParameterMapping::parse("id, mode=SIDEWAYS"),
            Err(Error::InvalidAttributeValue { .. })
        ));
    }

    #[test]
    fn malformed_syntax_reports_position() {
        match ParameterMapping::parse("(a + b") {
            Err(Error::InvalidPlaceholder { position, .. }) => assert_eq!(position, 1),
            other => panic!("unexpected {other:?}"),
        }
        match ParameterMapping::parse("(a) b") {
            Err(Error::InvalidPlaceholder { position, .. }) => assert_eq!(position, 3),
            other => panic!("unexpected {other:?}"),
        }
        match ParameterMapping::parse("id, novalue") {
            Err(Error::InvalidPlaceholder { position, .. }) => assert_eq!(position, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ParameterMapping::parse("  "),
            Err(Error::InvalidPlaceholder { .. })
        ));
    }

    #[test]
    fn type_families() {
        assert_eq!(JdbcType::BigInt.family(), TypeFamily::Integer);
        assert_eq!(JdbcType::Decimal.family(), TypeFamily::Float);
        assert_eq!(JdbcType::Bit.family(), TypeFamily::Boolean);
        assert_eq!(JdbcType::NVarChar.family(), TypeFamily::Character);
        assert_eq!(JdbcType::Timestamp.family(), TypeFamily::Other);
        assert_eq!(
            "timestamp_with_timezone".parse(),
            Ok(JdbcType::TimestampWithTimezone)
        );
    }
}
