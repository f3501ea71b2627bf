use thiserror::Error;

use crate::expression::ExpressionError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("data base error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("expression error: {0}")]
    Expression(#[from] ExpressionError),
    #[error(
        "an invalid property '{name}' was found in mapping #{{{content}}}, valid properties are \
         javaType,jdbcType,mode,numericScale,resultMap,jdbcTypeName,expression"
    )]
    UnknownPlaceholderAttribute { name: String, content: String },
    #[error("parsing error in #{{{content}}} in position {position}: {reason}")]
    InvalidPlaceholder {
        content: String,
        position: usize,
        reason: String,
    },
    #[error("invalid value '{value}' for '{name}' in mapping #{{{content}}}")]
    InvalidAttributeValue {
        name: String,
        value: String,
        content: String,
    },
    #[error("too many default (otherwise) elements in choose statement")]
    MultipleDefaults,
    #[error("choose accepts only condition and default children, found {0}")]
    InvalidChoose(&'static str),
    #[error("invalid trim declaration: {0}")]
    InvalidTrim(String),
    #[error("the expression '{expression}' evaluated to a null value")]
    CollectionRequired { expression: String },
    #[error("error evaluating expression '{expression}', return value ({found}) was not iterable")]
    NotIterable { expression: String, found: String },
    #[error("invalid input '{value}', please conform to regex {pattern}")]
    InjectionRejected { value: String, pattern: String },
    #[error("invalid injection filter: {0}")]
    InvalidInjectionFilter(#[from] regex::Error),
    #[error("parameter serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("dynamic template error: {0}")]
    Message(String),
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Message(e)
    }
}

impl From<&String> for Error {
    fn from(e: &String) -> Self {
        Error::Message(e.clone())
    }
}
impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Message(e.to_string())
    }
}

impl Error {
    /// Maps the evaluator's collection failures onto the loop error kinds.
    pub(crate) fn from_collection(e: ExpressionError) -> Self {
        match e {
            ExpressionError::NullValue { expression } => Error::CollectionRequired { expression },
            ExpressionError::NotIterable { expression, found } => {
                Error::NotIterable { expression, found }
            }
            other => Error::Expression(other),
        }
    }
}
