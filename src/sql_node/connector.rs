use std::fmt;

use super::SqlNode;
use crate::{
    Error,
    context::{Composer, DynamicContext},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits ` AND <child>` when the child produces anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorItemNode {
    connector: Connector,
    child: Box<SqlNode>,
}

impl ConnectorItemNode {
    pub fn new(connector: Connector, child: SqlNode) -> Self {
        ConnectorItemNode {
            connector,
            child: Box::new(child),
        }
    }

    pub fn child(&self) -> &SqlNode {
        &self.child
    }

    pub(super) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        let mut scope = ctx.nested();
        self.child.apply(&mut scope, composer)?;
        let body = scope.into_sql();
        let body = body.trim();
        if body.is_empty() {
            return Ok(false);
        }
        ctx.append_sql(&format!(" {} {body}", self.connector));
        Ok(true)
    }
}

/// Emits ` AND (<children>)`, with the first child's connector dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorGroupNode {
    connector: Connector,
    children: Vec<SqlNode>,
}

impl ConnectorGroupNode {
    pub fn new(connector: Connector, children: Vec<SqlNode>) -> Self {
        ConnectorGroupNode {
            connector,
            children,
        }
    }

    pub fn children(&self) -> &[SqlNode] {
        &self.children
    }

    pub(super) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        let mut scope = ctx.nested();
        for child in &self.children {
            child.apply(&mut scope, composer)?;
        }
        let body = scope.into_sql();
        let body = strip_leading_connector(body.trim());
        if body.is_empty() {
            return Ok(false);
        }
        ctx.append_sql(&format!(" {} ({body})", self.connector));
        Ok(true)
    }
}

fn strip_leading_connector(body: &str) -> &str {
    for connector in [Connector::And, Connector::Or] {
        let word = connector.as_str();
        let Some(head) = body.get(..word.len()) else {
            continue;
        };
        let rest = &body[word.len()..];
        if head.eq_ignore_ascii_case(word) && rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_only_whole_words() {
        assert_eq!(strip_leading_connector("AND a = 1"), "a = 1");
        assert_eq!(strip_leading_connector("or\ta = 1"), "a = 1");
        assert_eq!(strip_leading_connector("ORDER = 1"), "ORDER = 1");
        assert_eq!(strip_leading_connector("AND"), "AND");
        assert_eq!(strip_leading_connector("é"), "é");
    }
}
