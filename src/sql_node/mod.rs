//! The statement tree and its composition.
//!
//! A tree is built once and shared; every composition walks it with a fresh
//! [`DynamicContext`] chain, so nodes carry no per-call state.

mod choose;
mod connector;
mod foreach;
mod text;
mod trim;

pub use choose::{ChooseNode, ConditionNode};
pub use connector::{Connector, ConnectorGroupNode, ConnectorItemNode};
pub use foreach::{ForEachNode, InClauseNode};
pub use trim::TrimNode;

use crate::{
    Error,
    context::{Composer, DynamicContext},
    expression::ExpressionEvaluator,
    parameter::ParameterMapping,
    scanner::{INTERPOLATION, PLACEHOLDER},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlNode {
    /// Emitted as is, apart from `#{...}` placeholders.
    StaticText(String),
    /// Contains `${...}` spans, evaluated on every composition.
    InterpolatedText(String),
    Condition(ConditionNode),
    ConditionGroup(ChooseNode),
    /// The fallback branch of a [`ChooseNode`].
    Default(Box<SqlNode>),
    ConnectorGroup(ConnectorGroupNode),
    ConnectorItem(ConnectorItemNode),
    TrimWrapper(TrimNode),
    ForEach(ForEachNode),
    InClause(InClauseNode),
    VarBind(VarBindNode),
    Sequence(Vec<SqlNode>),
    Empty,
}

/// Binds the value of `value` under `name` in the enclosing scope.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBindNode {
    pub name: String,
    pub value: String,
}

impl SqlNode {
    /// Static or interpolated text, depending on whether `text` holds a
    /// closed `${...}` span.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        if INTERPOLATION.contains_token(&text) {
            SqlNode::InterpolatedText(text)
        } else {
            SqlNode::StaticText(text)
        }
    }

    pub fn condition(test: impl Into<String>, child: SqlNode) -> Self {
        SqlNode::Condition(ConditionNode::new(test, child))
    }

    /// `choose`: `Condition` children plus at most one `Default`.
    pub fn choose(children: Vec<SqlNode>) -> Result<Self, Error> {
        ChooseNode::new(children).map(SqlNode::ConditionGroup)
    }

    pub fn otherwise(child: SqlNode) -> Self {
        SqlNode::Default(Box::new(child))
    }

    pub fn sequence(children: Vec<SqlNode>) -> Self {
        SqlNode::Sequence(children)
    }

    pub fn bind(name: impl Into<String>, value: impl Into<String>) -> Self {
        SqlNode::VarBind(VarBindNode {
            name: name.into(),
            value: value.into(),
        })
    }

    /// `<where>`: prefixes `WHERE` and drops a leading `AND`/`OR`.
    pub fn where_clause(child: SqlNode) -> Self {
        SqlNode::TrimWrapper(TrimNode::where_clause(child))
    }

    /// `<set>`: prefixes `SET` and drops a leading or trailing comma.
    pub fn set_clause(child: SqlNode) -> Self {
        SqlNode::TrimWrapper(TrimNode::set_clause(child))
    }

    pub fn and(child: SqlNode) -> Self {
        SqlNode::ConnectorItem(ConnectorItemNode::new(Connector::And, child))
    }

    pub fn or(child: SqlNode) -> Self {
        SqlNode::ConnectorItem(ConnectorItemNode::new(Connector::Or, child))
    }

    pub fn and_group(children: Vec<SqlNode>) -> Self {
        SqlNode::ConnectorGroup(ConnectorGroupNode::new(Connector::And, children))
    }

    pub fn or_group(children: Vec<SqlNode>) -> Self {
        SqlNode::ConnectorGroup(ConnectorGroupNode::new(Connector::Or, children))
    }

    /// Whether the output can change with the parameter. Only text without
    /// `${...}`, and sequences of it, is static.
    pub fn is_dynamic(&self) -> bool {
        match self {
            SqlNode::StaticText(_) | SqlNode::Empty => false,
            SqlNode::Sequence(children) => children.iter().any(SqlNode::is_dynamic),
            _ => true,
        }
    }

    /// Checks every expression and placeholder in the tree.
    pub fn validate(&self, evaluator: &dyn ExpressionEvaluator) -> Result<(), Error> {
        match self {
            SqlNode::StaticText(text) => validate_placeholders(text),
            SqlNode::InterpolatedText(text) => {
                INTERPOLATION
                    .for_each_span(text, |expression| Ok::<_, Error>(evaluator.validate(expression)?))?;
                validate_placeholders(text)
            }
            SqlNode::Condition(node) => node.validate(evaluator),
            SqlNode::ConditionGroup(node) => node.validate(evaluator),
            SqlNode::Default(child) => child.validate(evaluator),
            SqlNode::ConnectorGroup(node) => node
                .children()
                .iter()
                .try_for_each(|child| child.validate(evaluator)),
            SqlNode::ConnectorItem(node) => node.child().validate(evaluator),
            SqlNode::TrimWrapper(node) => node.child().validate(evaluator),
            SqlNode::ForEach(node) => node.validate(evaluator),
            SqlNode::InClause(node) => node.validate(evaluator),
            SqlNode::VarBind(node) => Ok(evaluator.validate(&node.value)?),
            SqlNode::Sequence(children) => children
                .iter()
                .try_for_each(|child| child.validate(evaluator)),
            SqlNode::Empty => Ok(()),
        }
    }

    /// Composes this node into `ctx`. The result tells condition and
    /// connector parents whether the node applied.
    pub(crate) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        match self {
            SqlNode::StaticText(text) => text::apply_static(text, ctx, composer),
            SqlNode::InterpolatedText(text) => text::apply_interpolated(text, ctx, composer),
            SqlNode::Condition(node) => node.apply(ctx, composer),
            SqlNode::ConditionGroup(node) => node.apply(ctx, composer),
            SqlNode::Default(child) => {
                child.apply(ctx, composer)?;
                Ok(true)
            }
            SqlNode::ConnectorGroup(node) => node.apply(ctx, composer),
            SqlNode::ConnectorItem(node) => node.apply(ctx, composer),
            SqlNode::TrimWrapper(node) => node.apply(ctx, composer),
            SqlNode::ForEach(node) => node.apply(ctx, composer),
            SqlNode::InClause(node) => node.apply(ctx, composer),
            SqlNode::VarBind(node) => {
                let value = composer
                    .config()
                    .evaluator()
                    .evaluate_value(&node.value, &*ctx)?;
                ctx.bind(node.name.clone(), value);
                Ok(true)
            }
            SqlNode::Sequence(children) => {
                for child in children {
                    child.apply(ctx, composer)?;
                }
                Ok(true)
            }
            SqlNode::Empty => Ok(true),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            SqlNode::StaticText(_) => "static text",
            SqlNode::InterpolatedText(_) => "interpolated text",
            SqlNode::Condition(_) => "condition",
            SqlNode::ConditionGroup(_) => "choose",
            SqlNode::Default(_) => "default",
            SqlNode::ConnectorGroup(_) => "connector group",
            SqlNode::ConnectorItem(_) => "connector item",
            SqlNode::TrimWrapper(_) => "trim",
            SqlNode::ForEach(_) => "foreach",
            SqlNode::InClause(_) => "in clause",
            SqlNode::VarBind(_) => "bind",
            SqlNode::Sequence(_) => "sequence",
            SqlNode::Empty => "empty",
        }
    }
}

/// Parses every literal `#{...}` in `text`. Placeholders built from a
/// `${...}` value only exist after interpolation and are checked then.
fn validate_placeholders(text: &str) -> Result<(), Error> {
    PLACEHOLDER.for_each_span(text, |content| {
        if content.contains("${") {
            return Ok(());
        }
        ParameterMapping::parse(content).map(|_| ())
    })
}

impl From<&str> for SqlNode {
    fn from(text: &str) -> Self {
        SqlNode::text(text)
    }
}

impl From<String> for SqlNode {
    fn from(text: String) -> Self {
        SqlNode::text(text)
    }
}

impl From<Vec<SqlNode>> for SqlNode {
    fn from(children: Vec<SqlNode>) -> Self {
        SqlNode::Sequence(children)
    }
}
