//! # Notation Parser
//!
//! Parses the parenthesised link notation into an expression tree.
//!
//! ```text
//! (($i: $s $t)) (($i: $t $s))
//! ```
//!
//! - `(` … `)` groups child expressions; whitespace separates them.
//! - A token ending in `:` names the enclosing group (`(1: 1 1)` has id `1`).
//! - `'…'` and `"…"` quote tokens containing spaces; `\` escapes the next char.
//! - Several top-level expressions are wrapped into one anonymous group.

use crate::LinkError;
use crate::primitives::{MAX_NESTING_DEPTH, MAX_QUERY_LENGTH};

/// A parsed expression: an optional id plus ordered children.
///
/// A bare token is an `Expr` with an id and no children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expr {
    pub id: Option<String>,
    pub values: Vec<Expr>,
}

impl Expr {
    /// A childless expression carrying `id`.
    #[must_use]
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            values: Vec::new(),
        }
    }
}

/// Parse notation text into a single expression.
///
/// Empty (or whitespace-only) text yields an empty anonymous group.
pub fn parse(text: &str) -> Result<Expr, LinkError> {
    if text.len() > MAX_QUERY_LENGTH {
        return Err(LinkError::Parse {
            position: MAX_QUERY_LENGTH,
            message: format!(
                "input of {} bytes exceeds maximum of {} bytes",
                text.len(),
                MAX_QUERY_LENGTH
            ),
        });
    }

    let mut parser = Parser { text, pos: 0 };
    let top = parser.elements(0)?;
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected '{}'", c)));
    }

    let mut top = top;
    if top.id.is_none() && top.values.len() == 1 {
        if let Some(single) = top.values.pop() {
            return Ok(single);
        }
    }
    Ok(top)
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LinkError {
        LinkError::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Read elements until `)` or end of input (the caller checks which).
    fn elements(&mut self, depth: usize) -> Result<Expr, LinkError> {
        let mut group = Expr::default();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None | Some(')') => return Ok(group),
                Some('(') => {
                    if depth >= MAX_NESTING_DEPTH {
                        return Err(self.error(format!(
                            "nesting deeper than {} levels",
                            MAX_NESTING_DEPTH
                        )));
                    }
                    let open = self.pos;
                    self.bump();
                    let child = self.elements(depth + 1)?;
                    if self.bump() != Some(')') {
                        return Err(LinkError::Parse {
                            position: open,
                            message: "unclosed '('".to_string(),
                        });
                    }
                    group.values.push(child);
                }
                Some(_) => {
                    let start = self.pos;
                    let (token, is_id) = self.token()?;
                    if !is_id {
                        group.values.push(Expr::leaf(token));
                    } else if group.id.is_none() && group.values.is_empty() {
                        group.id = Some(token);
                    } else {
                        return Err(LinkError::Parse {
                            position: start,
                            message: format!("id '{}:' must open its group", token),
                        });
                    }
                }
            }
        }
    }

    /// Read one token. The flag is true when it ended with `:`.
    fn token(&mut self) -> Result<(String, bool), LinkError> {
        let mut token = String::new();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                let start = self.pos;
                self.bump();
                loop {
                    match self.bump() {
                        None => {
                            return Err(LinkError::Parse {
                                position: start,
                                message: "unterminated quote".to_string(),
                            });
                        }
                        Some('\\') => match self.bump() {
                            Some(escaped) => token.push(escaped),
                            None => {
                                return Err(LinkError::Parse {
                                    position: start,
                                    message: "unterminated quote".to_string(),
                                });
                            }
                        },
                        Some(c) if c == quote => break,
                        Some(c) => token.push(c),
                    }
                }
            }
            _ => {
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | ':' | '\'' | '"') {
                        break;
                    }
                    token.push(c);
                    self.bump();
                }
            }
        }

        if self.peek() == Some(':') {
            self.bump();
            return Ok((token, true));
        }
        Ok((token, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: Option<&str>, values: Vec<Expr>) -> Expr {
        Expr {
            id: id.map(str::to_string),
            values,
        }
    }

    #[test]
    fn parses_create_query() {
        let expr = parse("() ((1 1))").expect("parse");
        assert_eq!(
            expr,
            group(None, vec![
                Expr::default(),
                group(None, vec![group(None, vec![Expr::leaf("1"), Expr::leaf("1")])]),
            ])
        );
    }

    #[test]
    fn wrapped_and_bare_forms_agree() {
        assert_eq!(
            parse("() ((1 1))").expect("parse"),
            parse("(() ((1 1)))").expect("parse")
        );
    }

    #[test]
    fn group_ids() {
        let expr = parse("(($i: $s $t))").expect("parse");
        assert_eq!(
            expr,
            group(None, vec![group(
                Some("$i"),
                vec![Expr::leaf("$s"), Expr::leaf("$t")]
            )])
        );
    }

    #[test]
    fn id_only_group() {
        let expr = parse("(*:)").expect("parse");
        assert_eq!(expr, group(Some("*"), vec![]));
    }

    #[test]
    fn id_without_space() {
        let expr = parse("(1:1 2)").expect("parse");
        assert_eq!(
            expr,
            group(Some("1"), vec![Expr::leaf("1"), Expr::leaf("2")])
        );
    }

    #[test]
    fn quoted_tokens() {
        let expr = parse(r#"('a b' "c\"d")"#).expect("parse");
        assert_eq!(
            expr,
            group(None, vec![Expr::leaf("a b"), Expr::leaf("c\"d")])
        );
    }

    #[test]
    fn empty_text_is_empty_group() {
        assert_eq!(parse("   ").expect("parse"), Expr::default());
    }

    #[test]
    fn errors() {
        assert!(matches!(parse("(1 2"), Err(LinkError::Parse { position: 0, .. })));
        assert!(matches!(parse("1 2)"), Err(LinkError::Parse { .. })));
        assert!(matches!(parse("('abc)"), Err(LinkError::Parse { .. })));
        assert!(matches!(parse("(1 a: 2)"), Err(LinkError::Parse { .. })));
    }

    #[test]
    fn nesting_limit() {
        let deep = format!(
            "{}{}",
            "(".repeat(MAX_NESTING_DEPTH + 1),
            ")".repeat(MAX_NESTING_DEPTH + 1)
        );
        assert!(matches!(parse(&deep), Err(LinkError::Parse { .. })));

        let fine = format!("{}{}", "(".repeat(8), ")".repeat(8));
        assert!(parse(&fine).is_ok());
    }

    #[test]
    fn length_limit() {
        let long = "1 ".repeat(MAX_QUERY_LENGTH);
        assert!(matches!(parse(&long), Err(LinkError::Parse { .. })));
    }
}
