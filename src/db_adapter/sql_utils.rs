#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Keyword {
    word: &'static str,
    is_truncate: bool,
}

const KEYWORDS: &[Keyword] = &[
    Keyword {
        word: "ORDER",
        is_truncate: true,
    }, // ORDER BY
    Keyword {
        word: "HAVING",
        is_truncate: false,
    },
    Keyword {
        word: "GROUP",
        is_truncate: false,
    },
    Keyword {
        word: "AND",
        is_truncate: false,
    },
    Keyword {
        word: "OR",
        is_truncate: false,
    },
    Keyword {
        word: "WHERE",
        is_truncate: false,
    },
    Keyword {
        word: "FROM",
        is_truncate: false,
    },
];

/// Returns `sql` without its trailing top-level `ORDER BY` clause.
///
/// Only keywords outside parentheses, quotes and comments count, and only
/// when `ORDER BY` is the last of [`KEYWORDS`] in the statement.
pub fn truncate_sql_at_outer_order_by(sql: &str) -> &str {
    let bytes = sql.as_bytes();
    let mut depth = 0i32;
    let mut last: Option<(usize, Keyword)> = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |end| i + end);
                continue;
            }
            b'(' => depth += 1,
            b')' => depth -= 1,
            c if is_word(c) => {
                let start = i;
                i = word_end(bytes, i);
                if depth == 0 {
                    let word = &sql[start..i];
                    if let Some(keyword) =
                        KEYWORDS.iter().find(|k| word.eq_ignore_ascii_case(k.word))
                    {
                        last = Some((start, *keyword));
                    }
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    match last {
        Some((start, keyword))
            if keyword.is_truncate && followed_by_by(&sql[start + keyword.word.len()..]) =>
        {
            &sql[..start]
        }
        _ => sql,
    }
}

fn is_word(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn word_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|c| !is_word(*c))
        .map_or(bytes.len(), |n| start + n)
}

/// Index just past the closing quote; doubled quotes stay inside the literal.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn followed_by_by(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.get(..2).is_some_and(|w| w.eq_ignore_ascii_case("BY"))
        && rest.as_bytes().get(2).is_none_or(|c| !is_word(*c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_truncate_order_by() {
        let sql = "SELECT * FROM table\tORDER\nBY col /* ORDER BY */";
        assert_eq!(truncate_sql_at_outer_order_by(sql), "SELECT * FROM table\t");

        let sql = "SELECT * FROM (SELECT * FROM t ORDER BY a) ORDER BY b";
        assert_eq!(
            truncate_sql_at_outer_order_by(sql),
            "SELECT * FROM (SELECT * FROM t ORDER BY a) "
        );

        let sql = "SELECT * FROM t WHERE 'ORDER BY' = 'test' /* ORDER BY */ ORDER BY col";
        assert_eq!(
            truncate_sql_at_outer_order_by(sql),
            "SELECT * FROM t WHERE 'ORDER BY' = 'test' /* ORDER BY */ "
        );

        let sql = "SELECT * FROM t GROUP BY col";
        assert_eq!(truncate_sql_at_outer_order_by(sql), sql);

        let sql = "SELECT * FROM t HAVING count(1) > 0 ORDER  BY col";
        assert_eq!(
            truncate_sql_at_outer_order_by(sql),
            "SELECT * FROM t HAVING count(1) > 0 "
        );

        let sql = "SELECT * FROM t where id > 10 OrDeR bY name,id desc";
        assert_eq!(
            truncate_sql_at_outer_order_by(sql),
            "SELECT * FROM t where id > 10 "
        );
    }

    #[test]
    fn ignores_lookalikes() {
        let sql = "SELECT order_no FROM t WHERE \"ORDER BY\" = 1 -- ORDER BY x";
        assert_eq!(truncate_sql_at_outer_order_by(sql), sql);

        let sql = "SELECT * FROM t ORDER BY a WHERE x = 'it''s'";
        assert_eq!(truncate_sql_at_outer_order_by(sql), sql);

        let sql = "SELECT * FROM orders ORDERS";
        assert_eq!(truncate_sql_at_outer_order_by(sql), sql);
    }
}
