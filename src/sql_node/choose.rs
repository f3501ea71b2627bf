use super::SqlNode;
use crate::{
    Error,
    context::{Composer, DynamicContext},
    expression::ExpressionEvaluator,
};

/// `<if test="...">`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    test: String,
    child: Box<SqlNode>,
}

impl ConditionNode {
    pub fn new(test: impl Into<String>, child: SqlNode) -> Self {
        ConditionNode {
            test: test.into(),
            child: Box::new(child),
        }
    }

    pub fn test(&self) -> &str {
        &self.test
    }

    pub(super) fn validate(&self, evaluator: &dyn ExpressionEvaluator) -> Result<(), Error> {
        evaluator.validate(&self.test)?;
        self.child.validate(evaluator)
    }

    pub(super) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        if composer
            .config()
            .evaluator()
            .evaluate_boolean(&self.test, &*ctx)?
        {
            self.child.apply(ctx, composer)?;
            return Ok(true);
        }
        Ok(false)
    }
}

/// `<choose>`: the first passing condition wins, else the default.
#[derive(Debug, Clone, PartialEq)]
pub struct ChooseNode {
    conditions: Vec<ConditionNode>,
    default: Option<Box<SqlNode>>,
}

impl ChooseNode {
    pub fn new(children: Vec<SqlNode>) -> Result<Self, Error> {
        let mut conditions = Vec::new();
        let mut default = None;
        for child in children {
            match child {
                SqlNode::Condition(condition) => conditions.push(condition),
                SqlNode::Default(child) => {
                    if default.is_some() {
                        return Err(Error::MultipleDefaults);
                    }
                    default = Some(child);
                }
                other => return Err(Error::InvalidChoose(other.kind())),
            }
        }
        Ok(ChooseNode {
            conditions,
            default,
        })
    }

    pub(super) fn validate(&self, evaluator: &dyn ExpressionEvaluator) -> Result<(), Error> {
        for condition in &self.conditions {
            condition.validate(evaluator)?;
        }
        match &self.default {
            Some(child) => child.validate(evaluator),
            None => Ok(()),
        }
    }

    pub(super) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        for condition in &self.conditions {
            if condition.apply(ctx, composer)? {
                return Ok(true);
            }
        }
        if let Some(child) = &self.default {
            child.apply(ctx, composer)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_second_default() {
        let res = SqlNode::choose(vec![
            SqlNode::condition("a", "x".into()),
            SqlNode::otherwise("y".into()),
            SqlNode::otherwise("z".into()),
        ]);
        assert!(matches!(res, Err(Error::MultipleDefaults)));
    }

    #[test]
    fn rejects_foreign_children() {
        let res = SqlNode::choose(vec![SqlNode::text("x")]);
        assert!(matches!(res, Err(Error::InvalidChoose("static text"))));
    }

    #[test]
    fn accepts_conditions_without_default() {
        assert!(SqlNode::choose(vec![]).is_ok());
        assert!(SqlNode::choose(vec![SqlNode::condition("a", "x".into())]).is_ok());
    }
}
