#![doc = include_str!("../README.md")]

mod bound_sql;
mod config;
mod context;
pub mod db_adapter;
mod error;
pub mod expression;
pub mod parameter;
pub mod property;
pub mod scanner;
pub mod sql_node;
mod sql_source;
mod sql_template_execute;
mod template_arg;

pub use bound_sql::*;
pub use config::*;
pub use context::{DATABASE_ID_KEY, DynamicContext, PARAMETER_OBJECT_KEY};
pub use error::*;
pub use parameter::{JdbcType, ParameterMapping, ParameterMode};
pub use sql_node::SqlNode;
pub use sql_source::*;
pub use sql_template_execute::*;
pub use template_arg::*;
