//! Property-path access into structured parameter values.
//!
//! Paths look like `user.address.city`, `ids[0]`, `attrs[color]` or
//! `attrs['color']`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'p> {
    Field(&'p str),
    Index(&'p str),
}

/// Splits `a.b[0]` into its root name `a` and the remainder `.b[0]`.
pub fn split_root(path: &str) -> (&str, &str) {
    let path = path.trim();
    match path.find(['.', '[']) {
        Some(i) => (&path[..i], &path[i..]),
        None => (path, ""),
    }
}

/// Tokenizes a path into segments. Unbalanced brackets end the path.
pub fn segments(path: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = path.trim();
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('[') {
            let Some(close) = tail.find(']') else {
                break;
            };
            out.push(Segment::Index(unquote(tail[..close].trim())));
            rest = &tail[close + 1..];
        } else {
            let body = rest.strip_prefix('.').unwrap_or(rest);
            let end = body.find(['.', '[']).unwrap_or(body.len());
            let name = body[..end].trim();
            if !name.is_empty() {
                out.push(Segment::Field(name));
            }
            rest = &body[end..];
        }
    }
    out
}

fn unquote(key: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = key
            .strip_prefix(quote)
            .and_then(|k| k.strip_suffix(quote))
        {
            return inner;
        }
    }
    key
}

/// Resolves `path` against `root`; `None` when any segment is missing.
pub fn get_value<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |current, segment| step(current, &segment))
}

fn step<'v>(current: &'v Value, segment: &Segment<'_>) -> Option<&'v Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Field(name) | Segment::Index(name)) => map.get(*name),
        (Value::Array(items), Segment::Index(index)) => {
            index.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        _ => None,
    }
}

/// Renders a value as literal SQL text: strings unquoted, `null` as nothing.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
