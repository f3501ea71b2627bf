//! Scoped bindings and output buffers used while composing one statement.

use serde_json::{Map, Value};

use crate::{
    Error,
    config::Configuration,
    expression::Bindings,
    parameter::ParameterMapping,
    property::{get_value, split_root},
    scanner::PLACEHOLDER,
};

pub const PARAMETER_OBJECT_KEY: &str = "_parameter";
pub const DATABASE_ID_KEY: &str = "_databaseId";

/// One scope of a composition.
///
/// The root wraps the caller's parameter; nested scopes point at their parent
/// and own their own bindings and SQL buffer. Reads fall through to the
/// parent, writes stay in the scope.
#[derive(Debug)]
pub struct DynamicContext<'a> {
    parent: Option<&'a DynamicContext<'a>>,
    parameter: &'a Value,
    database_id: &'a Value,
    bindings: Map<String, Value>,
    sql: String,
}

impl<'a> DynamicContext<'a> {
    pub fn new(parameter: &'a Value, database_id: &'a Value) -> Self {
        DynamicContext {
            parent: None,
            parameter,
            database_id,
            bindings: Map::new(),
            sql: String::new(),
        }
    }

    /// Opens a child scope with an empty buffer.
    pub fn nested(&self) -> DynamicContext<'_> {
        DynamicContext {
            parent: Some(self),
            parameter: self.parameter,
            database_id: self.database_id,
            bindings: Map::new(),
            sql: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parameter(&self) -> &Value {
        self.parameter
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn append_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Appends a self-contained clause, separated by one space from what is
    /// already in the buffer.
    pub fn append_clause(&mut self, clause: &str) {
        if self.sql.chars().last().is_some_and(|c| !c.is_whitespace()) {
            self.sql.push(' ');
        }
        self.sql.push_str(clause);
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn into_sql(self) -> String {
        self.sql
    }

    pub fn into_bindings(self) -> Map<String, Value> {
        self.bindings
    }

    /// Looks `name` up in the nested scopes only, stopping before the root.
    pub fn scoped_binding(&self, name: &str) -> Option<&Value> {
        let mut scope = Some(self);
        while let Some(ctx) = scope {
            if ctx.is_root() {
                return None;
            }
            if let Some(value) = ctx.bindings.get(name) {
                return Some(value);
            }
            scope = ctx.parent;
        }
        None
    }

    fn parameter_lookup(&self, name: &str) -> Option<&'a Value> {
        match name {
            PARAMETER_OBJECT_KEY => Some(self.parameter),
            DATABASE_ID_KEY => Some(self.database_id),
            _ => match self.parameter {
                Value::Object(map) => map.get(name),
                Value::Array(_) if matches!(name, "list" | "collection" | "array") => {
                    Some(self.parameter)
                }
                Value::Null | Value::Array(_) => None,
                scalar => Some(scalar),
            },
        }
    }
}

impl Bindings for DynamicContext<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.bindings.get(name) {
            return Some(value);
        }
        match self.parent {
            Some(parent) => parent.lookup(name),
            None => self.parameter_lookup(name),
        }
    }
}

/// Per-call state shared by every scope: the configuration and the ordered
/// list of parameter mappings.
pub(crate) struct Composer<'c> {
    config: &'c Configuration,
    mappings: Vec<ParameterMapping>,
}

impl<'c> Composer<'c> {
    pub(crate) fn new(config: &'c Configuration) -> Self {
        Composer {
            config,
            mappings: Vec::new(),
        }
    }

    pub(crate) fn config(&self) -> &'c Configuration {
        self.config
    }

    pub(crate) fn into_mappings(self) -> Vec<ParameterMapping> {
        self.mappings
    }

    /// Replaces each `#{...}` in `text` with a positional marker and records
    /// its mapping.
    pub(crate) fn collect_placeholders(
        &mut self,
        text: &str,
        ctx: &DynamicContext<'_>,
    ) -> Result<String, Error> {
        PLACEHOLDER.parse(text, |content| {
            let mapping = self.capture(ParameterMapping::parse(content)?, ctx)?;
            self.mappings.push(mapping);
            let mut marker = String::new();
            self.config.write_placeholder(self.mappings.len(), &mut marker);
            Ok(marker)
        })
    }

    /// Nested scopes disappear once composition ends, so values that depend
    /// on them are fixed into the mapping now.
    fn capture(
        &self,
        mapping: ParameterMapping,
        ctx: &DynamicContext<'_>,
    ) -> Result<ParameterMapping, Error> {
        if ctx.is_root() {
            return Ok(mapping);
        }
        if let Some(expression) = mapping.expression() {
            let value = self.config.evaluator().evaluate_value(expression, ctx)?;
            return Ok(mapping.with_value(value));
        }
        let (root, rest) = split_root(mapping.property());
        match ctx.scoped_binding(root) {
            Some(bound) => {
                let value = get_value(bound, rest).cloned().unwrap_or(Value::Null);
                Ok(mapping.with_value(value))
            }
            None => Ok(mapping),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_fall_through_to_parent_scopes() {
        let param = json!({"name": "Ann"});
        let db = Value::Null;
        let mut root = DynamicContext::new(&param, &db);
        root.bind("pattern", json!("%Ann%"));
        let mut child = root.nested();
        child.bind("item", json!(7));
        let grandchild = child.nested();

        assert_eq!(grandchild.lookup("item"), Some(&json!(7)));
        assert_eq!(grandchild.lookup("pattern"), Some(&json!("%Ann%")));
        assert_eq!(grandchild.lookup("name"), Some(&json!("Ann")));
        assert_eq!(grandchild.lookup("_parameter"), Some(&param));
        assert_eq!(grandchild.lookup("missing"), None);
        assert_eq!(grandchild.scoped_binding("item"), Some(&json!(7)));
        assert_eq!(grandchild.scoped_binding("pattern"), None);
    }

    #[test]
    fn inner_bindings_shadow_outer_ones() {
        let param = json!({"id": 1});
        let db = Value::Null;
        let root = DynamicContext::new(&param, &db);
        let mut child = root.nested();
        child.bind("id", json!(2));
        assert_eq!(child.lookup("id"), Some(&json!(2)));
        assert_eq!(root.lookup("id"), Some(&json!(1)));
    }

    #[test]
    fn parameter_shapes() {
        let db = json!("SQLite");
        let list = json!([1, 2]);
        let ctx = DynamicContext::new(&list, &db);
        assert_eq!(ctx.lookup("list"), Some(&list));
        assert_eq!(ctx.lookup("array"), Some(&list));
        assert_eq!(ctx.lookup("ids"), None);
        assert_eq!(ctx.lookup("_databaseId"), Some(&db));

        let scalar = json!(42);
        let ctx = DynamicContext::new(&scalar, &db);
        assert_eq!(ctx.lookup("value"), Some(&scalar));
        assert_eq!(ctx.lookup("anything"), Some(&scalar));

        let null = Value::Null;
        let ctx = DynamicContext::new(&null, &db);
        assert_eq!(ctx.lookup("value"), None);
    }

    #[test]
    fn clauses_are_space_separated() {
        let param = Value::Null;
        let mut ctx = DynamicContext::new(&param, &param);
        ctx.append_clause("WHERE a = 1");
        assert_eq!(ctx.sql(), "WHERE a = 1");
        ctx.append_sql("select *");
        ctx.append_clause("ORDER BY id");
        assert_eq!(ctx.sql(), "WHERE a = 1select * ORDER BY id");
    }

    #[test]
    fn nested_placeholders_capture_scoped_values() {
        let config = Configuration::new();
        let mut composer = Composer::new(&config);
        let param = json!({"name": "Ann"});
        let db = Value::Null;
        let root = DynamicContext::new(&param, &db);
        let mut item = root.nested();
        item.bind("user", json!({"id": 9}));

        let sql = composer
            .collect_placeholders("#{user.id} #{name}", &item)
            .unwrap();
        assert_eq!(sql, "? ?");
        let mappings = composer.into_mappings();
        assert_eq!(mappings[0].property(), "user.id");
        assert_eq!(mappings[0].value(), Some(&json!(9)));
        assert_eq!(mappings[1].value(), None);
    }
}
