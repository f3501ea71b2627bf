use super::SqlNode;
use crate::{
    Error,
    context::{Composer, DynamicContext},
};

const WHERE_OVERRIDES: [&str; 8] = [
    "AND ", "OR ", "AND\n", "OR\n", "AND\r", "OR\r", "AND\t", "OR\t",
];

/// Wraps a child's output with a prefix and suffix after removing one
/// leading and one trailing override.
///
/// Overrides are matched case-insensitively, longest first. Overrides of
/// equal length are tried in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimNode {
    prefix: Option<String>,
    suffix: Option<String>,
    prefix_overrides: Vec<String>,
    suffix_overrides: Vec<String>,
    child: Box<SqlNode>,
}

impl TrimNode {
    pub fn new(
        child: SqlNode,
        prefix: Option<&str>,
        prefix_overrides: &[&str],
        suffix: Option<&str>,
        suffix_overrides: &[&str],
    ) -> Result<Self, Error> {
        Ok(TrimNode {
            prefix: non_empty(prefix),
            suffix: non_empty(suffix),
            prefix_overrides: normalize(prefix_overrides)?,
            suffix_overrides: normalize(suffix_overrides)?,
            child: Box::new(child),
        })
    }

    /// Splits a `|` separated override list such as `"AND |OR "`.
    pub fn parse_overrides(overrides: &str) -> Vec<&str> {
        overrides.split('|').filter(|o| !o.is_empty()).collect()
    }

    pub(super) fn where_clause(child: SqlNode) -> Self {
        TrimNode {
            prefix: Some("WHERE".to_string()),
            suffix: None,
            prefix_overrides: sorted(WHERE_OVERRIDES.iter().map(|o| o.to_string()).collect()),
            suffix_overrides: Vec::new(),
            child: Box::new(child),
        }
    }

    pub(super) fn set_clause(child: SqlNode) -> Self {
        TrimNode {
            prefix: Some("SET".to_string()),
            suffix: None,
            prefix_overrides: vec![",".to_string()],
            suffix_overrides: vec![",".to_string()],
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
        match self.wrap(&body) {
            Some(clause) => {
                ctx.append_clause(&clause);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn wrap(&self, body: &str) -> Option<String> {
        let mut body = body.trim();
        if body.is_empty() {
            return None;
        }
        let upper = body.to_ascii_uppercase();
        if let Some(o) = self
            .prefix_overrides
            .iter()
            .find(|o| upper.starts_with(o.as_str()))
        {
            body = body[o.len()..].trim_start();
        }

        let upper = body.to_ascii_uppercase();
        if let Some(o) = self
            .suffix_overrides
            .iter()
            .map(|o| o.trim_end())
            .find(|o| upper.ends_with(o) && starts_word(&upper[..upper.len() - o.len()], o))
        {
            body = body[..body.len() - o.len()].trim_end();
        }
        if body.is_empty() {
            return None;
        }

        let mut out = String::with_capacity(body.len() + 16);
        if let Some(prefix) = &self.prefix {
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(body);
        if let Some(suffix) = &self.suffix {
            out.push(' ');
            out.push_str(suffix);
        }
        Some(out)
    }
}

/// An override starting with a word character only matches where a word
/// starts in `before + override`.
fn starts_word(before: &str, o: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    !o.starts_with(is_word) || !before.ends_with(is_word)
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

fn normalize(overrides: &[&str]) -> Result<Vec<String>, Error> {
    let mut out = Vec::with_capacity(overrides.len());
    for o in overrides {
        if o.trim().is_empty() {
            return Err(Error::InvalidTrim(format!(
                "override {o:?} is empty after trimming whitespace"
            )));
        }
        out.push(o.to_ascii_uppercase());
    }
    Ok(sorted(out))
}

/// Longest first; `sort_by` is stable so ties keep their order.
fn sorted(mut overrides: Vec<String>) -> Vec<String> {
    overrides.sort_by(|a, b| b.len().cmp(&a.len()));
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn trim(prefix_overrides: &[&str], suffix_overrides: &[&str]) -> TrimNode {
        TrimNode::new(
            SqlNode::Empty,
            Some("("),
            prefix_overrides,
            Some(")"),
            suffix_overrides,
        )
        .unwrap()
    }

    #[test]
    fn strips_one_override_each_side() {
        let node = trim(&["AND ", "OR "], &[" AND", " OR"]);
        assert_eq!(
            node.wrap(" and a = 1 or b = 2 AND ").as_deref(),
            Some("( a = 1 or b = 2 )")
        );
        assert_eq!(node.wrap("AND AND x").as_deref(), Some("( AND x )"));
        assert_eq!(node.wrap("ANDROID = 1").as_deref(), Some("( ANDROID = 1 )"));
    }

    #[test]
    fn suffix_overrides_do_not_cut_words() {
        let node = trim(&[], &[" AND"]);
        assert_eq!(
            node.wrap("a = 1 and brand").as_deref(),
            Some("( a = 1 and brand )")
        );
        assert_eq!(node.wrap("a = 1 and").as_deref(), Some("( a = 1 )"));

        let node = trim(&[], &["AND"]);
        assert_eq!(node.wrap("brand").as_deref(), Some("( brand )"));
        assert_eq!(node.wrap("x = 1 and").as_deref(), Some("( x = 1 )"));
        assert_eq!(node.wrap("x = (1)AND").as_deref(), Some("( x = (1) )"));
    }

    #[test]
    fn longest_override_wins() {
        let node = trim(&["A", "AB"], &[]);
        assert_eq!(node.wrap("abc").as_deref(), Some("( c )"));
        assert_eq!(node.prefix_overrides, vec!["AB".to_string(), "A".to_string()]);
    }

    #[test]
    fn equal_lengths_keep_declaration_order() {
        let node = trim(&["XY", "AB", "CD"], &[]);
        assert_eq!(node.prefix_overrides, vec!["XY", "AB", "CD"]);
    }

    #[test]
    fn empty_content_produces_nothing() {
        let node = trim(&["AND"], &[]);
        assert_eq!(node.wrap("  \n\t "), None);
        assert_eq!(node.wrap(" and "), None);
    }

    #[test]
    fn where_overrides_need_a_separator() {
        let node = TrimNode::where_clause(SqlNode::Empty);
        assert_eq!(node.wrap("and\nname = ?").as_deref(), Some("WHERE name = ?"));
        assert_eq!(node.wrap("OR\tx = ?").as_deref(), Some("WHERE x = ?"));
        assert_eq!(node.wrap("order_no = ?").as_deref(), Some("WHERE order_no = ?"));
    }

    #[test]
    fn set_drops_commas() {
        let node = TrimNode::set_clause(SqlNode::Empty);
        assert_eq!(
            node.wrap(" name = ?, age = ?, ").as_deref(),
            Some("SET name = ?, age = ?")
        );
    }

    #[test]
    fn overrides_are_validated() {
        assert!(matches!(
            TrimNode::new(SqlNode::Empty, None, &["AND", " "], None, &[]),
            Err(Error::InvalidTrim(_))
        ));
        assert_eq!(TrimNode::parse_overrides("AND |OR "), vec!["AND ", "OR "]);
        assert_eq!(TrimNode::parse_overrides(""), Vec::<&str>::new());
    }
}
