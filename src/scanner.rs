//! Escape-aware scanning of `open ... close` token spans.

/// Token pair used for `${...}` value interpolation.
pub const INTERPOLATION: GenericTokenParser = GenericTokenParser::new("${", "}");
/// Token pair used for `#{...}` parameter placeholders.
pub const PLACEHOLDER: GenericTokenParser = GenericTokenParser::new("#{", "}");

/// Scans text left to right for `open_token ... close_token` spans.
///
/// A token preceded by a backslash is literal: the backslash is dropped and the
/// token is kept. A span without a closing token is copied verbatim from the
/// opening token to the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericTokenParser {
    open_token: &'static str,
    close_token: &'static str,
}

impl GenericTokenParser {
    pub const fn new(open_token: &'static str, close_token: &'static str) -> Self {
        Self {
            open_token,
            close_token,
        }
    }

    /// Replaces every closed span with the handler's return value.
    ///
    /// The handler receives the span body with escaped close tokens already
    /// resolved. The first handler error aborts the scan.
    pub fn parse<F, E>(&self, text: &str, mut handler: F) -> Result<String, E>
    where
        F: FnMut(&str) -> Result<String, E>,
    {
        let mut out = String::with_capacity(text.len());
        self.scan(text, |step| match step {
            Step::Literal(s) => {
                out.push_str(s);
                Ok(true)
            }
            Step::Span(body) => {
                out.push_str(&handler(body)?);
                Ok(true)
            }
        })?;
        Ok(out)
    }

    /// Returns true as soon as one closed span is found.
    pub fn contains_token(&self, text: &str) -> bool {
        let mut found = false;
        let _ = self.scan::<_, ()>(text, |step| {
            if let Step::Span(_) = step {
                found = true;
                return Ok(false);
            }
            Ok(true)
        });
        found
    }

    /// Visits every span body, in order, without building output.
    pub fn for_each_span<F, E>(&self, text: &str, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        self.scan(text, |step| {
            if let Step::Span(body) = step {
                visit(body)?;
            }
            Ok(true)
        })
    }

    /// Drives `sink` with literal chunks and span bodies. The sink returns
    /// `Ok(false)` to stop early.
    fn scan<F, E>(&self, text: &str, mut sink: F) -> Result<(), E>
    where
        F: FnMut(Step<'_>) -> Result<bool, E>,
    {
        let bytes = text.as_bytes();
        let open_len = self.open_token.len();
        let close_len = self.close_token.len();
        let mut offset = 0;
        let mut expression = String::new();

        while let Some(found) = text[offset..].find(self.open_token) {
            let start = offset + found;
            if start > 0 && bytes[start - 1] == b'\\' {
                // escaped open token
                let mut literal = String::with_capacity(start - offset + open_len);
                literal.push_str(&text[offset..start - 1]);
                literal.push_str(self.open_token);
                if !sink(Step::Literal(&literal))? {
                    return Ok(());
                }
                offset = start + open_len;
                continue;
            }

            if !sink(Step::Literal(&text[offset..start]))? {
                return Ok(());
            }
            expression.clear();
            let mut cursor = start + open_len;
            let mut end = text[cursor..].find(self.close_token).map(|i| i + cursor);
            while let Some(close) = end {
                if close <= cursor || bytes[close - 1] != b'\\' {
                    expression.push_str(&text[cursor..close]);
                    break;
                }
                // escaped close token
                expression.push_str(&text[cursor..close - 1]);
                expression.push_str(self.close_token);
                cursor = close + close_len;
                end = text[cursor..].find(self.close_token).map(|i| i + cursor);
            }

            match end {
                None => {
                    sink(Step::Literal(&text[start..]))?;
                    return Ok(());
                }
                Some(close) => {
                    if !sink(Step::Span(&expression))? {
                        return Ok(());
                    }
                    offset = close + close_len;
                }
            }
        }
        if offset < text.len() {
            sink(Step::Literal(&text[offset..]))?;
        }
        Ok(())
    }
}

enum Step<'a> {
    Literal(&'a str),
    Span(&'a str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::convert::Infallible;

    fn upper(text: &str) -> String {
        PLACEHOLDER
            .parse(text, |body| Ok::<_, Infallible>(format!("<{}>", body.to_uppercase())))
            .unwrap_or_default()
    }

    #[test]
    fn replaces_closed_spans_in_order() {
        assert_eq!(upper("a = #{a} and b = #{b}"), "a = <A> and b = <B>");
        assert_eq!(upper("#{x}#{y}"), "<X><Y>");
        assert_eq!(upper("no tokens"), "no tokens");
        assert_eq!(upper(""), "");
    }

    #[test]
    fn escaped_open_token_is_literal() {
        assert_eq!(upper(r"\#{x}"), "#{x}");
        assert_eq!(upper(r"a \#{x} #{y}"), "a #{x} <Y>");
    }

    #[test]
    fn escaped_close_token_stays_in_body() {
        assert_eq!(upper(r"#{a\}b}"), "<A}B>");
    }

    #[test]
    fn unterminated_span_is_copied_verbatim() {
        assert_eq!(upper("x #{a} y #{b"), "x <A> y #{b");
        assert_eq!(upper(r"#{a\}"), r"#{a\}");
    }

    #[test]
    fn empty_span_is_handed_to_handler() {
        assert_eq!(upper("#{}"), "<>");
    }

    #[test]
    fn multibyte_text_survives() {
        assert_eq!(upper("名前 = #{name} é"), "名前 = <NAME> é");
    }

    #[test]
    fn handler_error_aborts() {
        let res = PLACEHOLDER.parse("#{a} #{b}", |body| {
            if body == "b" { Err(body.to_string()) } else { Ok(String::new()) }
        });
        assert_eq!(res, Err("b".to_string()));
    }

    #[test]
    fn contains_token_needs_a_closed_span() {
        assert!(INTERPOLATION.contains_token("order by ${column}"));
        assert!(!INTERPOLATION.contains_token("order by ${column"));
        assert!(!INTERPOLATION.contains_token(r"order by \${column}"));
        assert!(!INTERPOLATION.contains_token("#{column}"));
    }

    #[test]
    fn token_pairs_do_not_interact() {
        let text = "${a} #{b}";
        let interpolated = INTERPOLATION
            .parse(text, |_| Ok::<_, Infallible>("#{c}".to_string()))
            .unwrap_or_default();
        assert_eq!(interpolated, "#{c} #{b}");
        let mut spans = Vec::new();
        PLACEHOLDER
            .for_each_span(&interpolated, |body| {
                spans.push(body.to_string());
                Ok::<_, Infallible>(())
            })
            .unwrap_or_default();
        assert_eq!(spans, vec!["c", "b"]);
    }
}
