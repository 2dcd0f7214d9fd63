//! Inline reStructuredText markup.

use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::document::{Inline, RefTarget};

lazy_static::lazy_static! {
    static ref INLINE_RE: Regex = Regex::new(concat!(
        r":(?P<role>[A-Za-z][\w:+.-]*):`(?P<role_body>[^`]+)`",
        r"|``(?P<literal>.+?)``",
        r"|`(?P<reference>[^`]+)`__?",
        r"|`(?P<interpreted>[^`]+)`",
        r"|\*\*(?P<strong>[^*]+?)\*\*",
        r"|\*(?P<emphasis>[^*\s](?:[^*]*[^*\s])?)\*",
        r"|\|(?P<substitution>[\w.-]+)\|",
    ))
    .expect("inline markup pattern is valid");
}

/// Parses inline markup into [`Inline`] nodes, expanding substitutions.
#[derive(Debug, Clone, Default)]
pub struct InlineParser {
    substitutions: HashMap<String, String>,
}

impl InlineParser {
    /// Create a parser without substitutions
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_substitutions(substitutions: HashMap<String, String>) -> Self {
        Self { substitutions }
    }

    pub fn add_substitution(&mut self, name: &str, value: &str) {
        self.substitutions.insert(name.to_string(), value.to_string());
    }

    /// Parse inline markup into nodes
    pub fn parse(&self, text: &str) -> Vec<Inline> {
        let mut out = Vec::new();
        let mut last = 0;

        for caps in INLINE_RE.captures_iter(text) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            push_text(&mut out, &text[last..whole.start()]);
            last = whole.end();

            match self.convert(&caps) {
                Some(Inline::Text(t)) => push_text(&mut out, &t),
                Some(node) => out.push(node),
                None => push_text(&mut out, whole.as_str()),
            }
        }
        push_text(&mut out, &text[last..]);
        out
    }

    fn convert(&self, caps: &Captures<'_>) -> Option<Inline> {
        if let (Some(role), Some(body)) = (caps.name("role"), caps.name("role_body")) {
            return Some(role_node(role.as_str(), body.as_str()));
        }
        if let Some(m) = caps.name("literal") {
            return Some(Inline::Literal(m.as_str().to_string()));
        }
        if let Some(m) = caps.name("reference") {
            return Some(reference_node(m.as_str()));
        }
        if let Some(m) = caps.name("interpreted") {
            return Some(Inline::Literal(m.as_str().to_string()));
        }
        if let Some(m) = caps.name("strong") {
            return Some(Inline::Strong(m.as_str().to_string()));
        }
        if let Some(m) = caps.name("emphasis") {
            return Some(Inline::Emphasis(m.as_str().to_string()));
        }
        if let Some(m) = caps.name("substitution") {
            return self
                .substitutions
                .get(m.as_str())
                .map(|value| Inline::Text(value.clone()));
        }
        None
    }
}

fn push_text(out: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Inline::Text(text.to_string()));
    }
}

/// Split `title <target>` into its parts.
pub fn split_explicit_title(body: &str) -> (Option<&str>, &str) {
    let body = body.trim();
    if body.ends_with('>') {
        if let Some(open) = body.rfind('<') {
            let title = body[..open].trim();
            if !title.is_empty() {
                return (Some(title), body[open + 1..body.len() - 1].trim());
            }
        }
    }
    (None, body)
}

fn role_node(role: &str, body: &str) -> Inline {
    let (title, target) = split_explicit_title(body);
    match role {
        // An empty text is filled in with the target's title when resolved.
        "ref" => Inline::Reference {
            text: title.unwrap_or("").to_string(),
            target: RefTarget::Label(target.to_lowercase()),
        },
        "doc" => Inline::Reference {
            text: title.unwrap_or("").to_string(),
            target: RefTarget::Doc(target.to_string()),
        },
        "math" => Inline::Math(body.to_string()),
        "emphasis" => Inline::Emphasis(body.to_string()),
        "strong" => Inline::Strong(body.to_string()),
        _ => Inline::Literal(title.unwrap_or(target).trim_start_matches('~').to_string()),
    }
}

fn reference_node(body: &str) -> Inline {
    match split_explicit_title(body) {
        (Some(title), target) if target.contains("://") || target.starts_with("mailto:") => {
            Inline::Reference {
                text: title.to_string(),
                target: RefTarget::Uri(target.to_string()),
            }
        }
        (Some(title), target) => Inline::Reference {
            text: title.to_string(),
            target: RefTarget::Anchor(crate::utils::make_id(target)),
        },
        (None, name) => Inline::Reference {
            text: name.to_string(),
            target: RefTarget::Anchor(crate::utils::make_id(name)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> InlineParser {
        let mut parser = InlineParser::new();
        parser.add_substitution("version", "v0.3");
        parser
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(parser().parse("just text"), vec![Inline::Text("just text".to_string())]);
    }

    #[test]
    fn test_strong_emphasis_literal() {
        let inlines = parser().parse("**bold**, *it* and ``code``");
        assert_eq!(
            inlines,
            vec![
                Inline::Strong("bold".to_string()),
                Inline::Text(", ".to_string()),
                Inline::Emphasis("it".to_string()),
                Inline::Text(" and ".to_string()),
                Inline::Literal("code".to_string()),
            ]
        );
    }

    #[test]
    fn test_external_reference() {
        let inlines = parser().parse("See `EPFL <https://www.epfl.ch>`_.");
        assert_eq!(
            inlines[1],
            Inline::Reference {
                text: "EPFL".to_string(),
                target: RefTarget::Uri("https://www.epfl.ch".to_string()),
            }
        );
    }

    #[test]
    fn test_roles() {
        let inlines = parser().parse(":ref:`Networks <networks>` :doc:`algorithms/index` :math:`x^2` :cpp:func:`~mockturtle::cut_rewriting`");
        assert_eq!(
            inlines[0],
            Inline::Reference {
                text: "Networks".to_string(),
                target: RefTarget::Label("networks".to_string()),
            }
        );
        assert_eq!(
            inlines[2],
            Inline::Reference {
                text: String::new(),
                target: RefTarget::Doc("algorithms/index".to_string()),
            }
        );
        assert_eq!(inlines[4], Inline::Math("x^2".to_string()));
        assert_eq!(inlines[6], Inline::Literal("mockturtle::cut_rewriting".to_string()));
    }

    #[test]
    fn test_substitutions() {
        let inlines = parser().parse("Version |version| of |unknown|");
        assert_eq!(
            inlines,
            vec![Inline::Text("Version v0.3 of |unknown|".to_string())]
        );
    }

    #[test]
    fn test_lone_asterisk_is_text() {
        let inlines = parser().parse("a * b");
        assert_eq!(inlines, vec![Inline::Text("a * b".to_string())]);
    }
}
