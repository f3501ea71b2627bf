use super::SqlNode;
use crate::{
    Error,
    context::{Composer, DynamicContext},
    expression::ExpressionEvaluator,
};

/// `<foreach>` over an array (index = position) or an object (index = key).
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachNode {
    collection: String,
    nullable: Option<bool>,
    item: Option<String>,
    index: Option<String>,
    open: String,
    close: String,
    separator: String,
    child: Box<SqlNode>,
}

impl ForEachNode {
    pub fn new(collection: impl Into<String>, child: SqlNode) -> Self {
        ForEachNode {
            collection: collection.into(),
            nullable: None,
            item: None,
            index: None,
            open: String::new(),
            close: String::new(),
            separator: String::new(),
            child: Box::new(child),
        }
    }

    pub fn item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn open(mut self, open: impl Into<String>) -> Self {
        self.open = open.into();
        self
    }

    pub fn close(mut self, close: impl Into<String>) -> Self {
        self.close = close.into();
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Whether a `null` or missing collection is skipped instead of failing.
    /// Unset falls back to the configuration default.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub(super) fn validate(&self, evaluator: &dyn ExpressionEvaluator) -> Result<(), Error> {
        evaluator.validate(&self.collection)?;
        self.child.validate(evaluator)
    }

    pub(super) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        if let Some(sql) = self.render(ctx, composer)? {
            ctx.append_sql(&sql);
        }
        Ok(true)
    }

    /// Composes the loop; `None` when there was nothing to iterate.
    fn render(
        &self,
        ctx: &DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<Option<String>, Error> {
        let config = composer.config();
        let nullable = self.nullable.unwrap_or(config.nullable_on_for_each());
        let entries = config
            .evaluator()
            .evaluate_iterable(&self.collection, ctx, nullable)
            .map_err(Error::from_collection)?;
        let Some(entries) = entries.filter(|entries| !entries.is_empty()) else {
            return Ok(None);
        };

        let mut sql = self.open.clone();
        let mut first = true;
        for (index, item) in entries {
            let mut scope = ctx.nested();
            if let Some(name) = &self.index {
                scope.bind(name.clone(), index);
            }
            if let Some(name) = &self.item {
                scope.bind(name.clone(), item);
            }
            self.child.apply(&mut scope, composer)?;
            let part = scope.into_sql();
            if part.trim().is_empty() {
                continue;
            }
            if !first {
                sql.push_str(&self.separator);
            }
            first = false;
            sql.push_str(&part);
        }
        sql.push_str(&self.close);
        Ok(Some(sql))
    }
}

/// `column in (#{item}, ...)`, emitted only for a non-empty collection.
#[derive(Debug, Clone, PartialEq)]
pub struct InClauseNode {
    test: Option<String>,
    each: ForEachNode,
}

impl InClauseNode {
    pub fn new(collection: impl Into<String>, item: impl Into<String>) -> Self {
        let item = item.into();
        let each = ForEachNode::new(collection, SqlNode::StaticText(format!("#{{{item}}}")))
            .item(item)
            .index("index")
            .open("(")
            .close(")")
            .separator(",");
        InClauseNode { test: None, each }
    }

    pub fn test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.each = self.each.nullable(nullable);
        self
    }

    pub(super) fn validate(&self, evaluator: &dyn ExpressionEvaluator) -> Result<(), Error> {
        if let Some(test) = &self.test {
            evaluator.validate(test)?;
        }
        self.each.validate(evaluator)
    }

    pub(super) fn apply(
        &self,
        ctx: &mut DynamicContext<'_>,
        composer: &mut Composer<'_>,
    ) -> Result<bool, Error> {
        if let Some(test) = &self.test
            && !composer.config().evaluator().evaluate_boolean(test, &*ctx)?
        {
            return Ok(false);
        }
        match self.each.render(ctx, composer)? {
            Some(list) => {
                ctx.append_sql(" in ");
                ctx.append_sql(&list);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl From<ForEachNode> for SqlNode {
    fn from(node: ForEachNode) -> Self {
        SqlNode::ForEach(node)
    }
}

impl From<InClauseNode> for SqlNode {
    fn from(node: InClauseNode) -> Self {
        SqlNode::InClause(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Configuration;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn compose(node: &SqlNode, config: &Configuration, param: Value) -> Result<String, Error> {
        let mut composer = Composer::new(config);
        let db = Value::Null;
        let mut ctx = DynamicContext::new(&param, &db);
        node.apply(&mut ctx, &mut composer)?;
        Ok(ctx.into_sql())
    }

    #[test]
    fn separator_goes_between_non_blank_iterations() {
        let config = Configuration::new();
        let node: SqlNode = ForEachNode::new(
            "ids",
            SqlNode::condition("id % 2 == 1", "#{id}".into()),
        )
        .item("id")
        .separator(",")
        .into();
        let sql = compose(&node, &config, json!({"ids": [2, 1, 4, 3, 6]})).unwrap();
        assert_eq!(sql, "?,?");
    }

    #[test]
    fn open_and_close_only_for_non_empty_collections() {
        let config = Configuration::new();
        let node: SqlNode = ForEachNode::new("ids", "#{id}".into())
            .item("id")
            .open("(")
            .close(")")
            .separator(",")
            .into();
        assert_eq!(compose(&node, &config, json!({"ids": []})).unwrap(), "");
        assert_eq!(compose(&node, &config, json!({"ids": [5]})).unwrap(), "(?)");

        let all_blank: SqlNode =
            ForEachNode::new("ids", SqlNode::condition("id > 10", "#{id}".into()))
                .item("id")
                .open("(")
                .close(")")
                .separator(",")
                .into();
        assert_eq!(compose(&all_blank, &config, json!({"ids": [1, 2]})).unwrap(), "()");
    }

    #[test]
    fn object_collections_bind_keys() {
        let config = Configuration::new();
        let node: SqlNode = ForEachNode::new("cols", "${key} = #{val}".into())
            .item("val")
            .index("key")
            .separator(", ")
            .into();
        let sql = compose(&node, &config, json!({"cols": {"name": "x", "age": 3}})).unwrap();
        assert_eq!(sql, "name = ?, age = ?");
    }

    #[test]
    fn nullable_falls_back_to_configuration() {
        let node: SqlNode = ForEachNode::new("ids", "#{id}".into()).item("id").into();
        let strict = Configuration::new();
        assert!(matches!(
            compose(&node, &strict, json!({})),
            Err(Error::CollectionRequired { .. })
        ));
        let lenient = Configuration::new().set_nullable_on_for_each(true);
        assert_eq!(compose(&node, &lenient, json!({})).unwrap(), "");

        let explicit: SqlNode = ForEachNode::new("ids", "#{id}".into())
            .item("id")
            .nullable(false)
            .into();
        assert!(compose(&explicit, &lenient, json!({})).is_err());
    }

    #[test]
    fn scalars_are_not_iterable() {
        let node: SqlNode = ForEachNode::new("ids", "#{id}".into()).item("id").into();
        assert!(matches!(
            compose(&node, &Configuration::new(), json!({"ids": 3})),
            Err(Error::NotIterable { .. })
        ));
    }

    #[test]
    fn in_clause() {
        let config = Configuration::new();
        let node = SqlNode::sequence(vec![
            "where id".into(),
            InClauseNode::new("ids", "id").nullable(true).into(),
        ]);
        assert_eq!(
            compose(&node, &config, json!({"ids": [1, 2]})).unwrap(),
            "where id in (?,?)"
        );
        assert_eq!(compose(&node, &config, json!({"ids": []})).unwrap(), "where id");
        assert_eq!(compose(&node, &config, json!({})).unwrap(), "where id");

        let guarded: SqlNode = InClauseNode::new("ids", "id").test("enabled").into();
        assert_eq!(
            compose(&guarded, &config, json!({"ids": [1], "enabled": false})).unwrap(),
            ""
        );
    }
}
