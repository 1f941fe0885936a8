//! Placeholder parsing
//!
//! Strings may embed placeholders:
//! - `{{path.to.value}}` - reference into the merged tree
//! - `{{servers[0].host}}` - sequence index in a path
//! - `{{projects.{{project.name}}.tags}}` - nested placeholder inside a path
//! - `{{ssm.path(/app/db).aws_profile(prod)}}` - provider call
//! - `{{env(HOME)}}` - provider call whose first link carries a value
//! - ``{{`kept {{verbatim}}`}}`` - escaped region, emitted as-is
//!
//! An opening `{{` without a matching `}}`, and the empty `{{}}`, are plain
//! text.

use std::fmt;

use crate::error::{Error, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const ESCAPE_OPEN: &str = "{{`";
const ESCAPE_CLOSE: &str = "`}}";

/// A string split into literal text, placeholders and escaped regions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    parts: Vec<Part>,
}

/// One piece of a [`Template`]
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Literal(String),
    /// An escaped region, markers included; stripped by [`clean_escapes`]
    Escaped(String),
    Placeholder(Placeholder),
}

/// A parsed `{{...}}` expression
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    raw: String,
    expr: Expr,
}

/// What a placeholder asks for
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A dotted path into the tree; may contain nested placeholders
    Path(Template),
    /// A provider call
    Call(Call),
}

/// A provider call: `kind.name(value).name2(value2)` or `kind(value).name(value)`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: String,
    /// Arguments in source order; a leading `kind(value)` is stored under `kind`
    pub args: Vec<(String, Template)>,
}

impl Template {
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// True when the template holds no placeholders
    pub fn is_literal(&self) -> bool {
        !self.parts.iter().any(|p| matches!(p, Part::Placeholder(_)))
    }

    /// The placeholder, when the whole string is exactly one placeholder
    pub fn as_single_placeholder(&self) -> Option<&Placeholder> {
        match self.parts.as_slice() {
            [Part::Placeholder(p)] => Some(p),
            _ => None,
        }
    }

    /// Top-level placeholders, in order
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.parts.iter().filter_map(|p| match p {
            Part::Placeholder(p) => Some(p),
            _ => None,
        })
    }
}

impl Placeholder {
    /// The placeholder as written, including the braces
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn is_call(&self) -> bool {
        matches!(self.expr, Expr::Call(_))
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Parse a string into a [`Template`]
pub fn parse(input: &str) -> Result<Template> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(open) = rest.find(OPEN) {
        literal.push_str(&rest[..open]);
        let candidate = &rest[open..];

        if candidate.starts_with(ESCAPE_OPEN) {
            if let Some(end) = candidate[ESCAPE_OPEN.len()..].find(ESCAPE_CLOSE) {
                let len = ESCAPE_OPEN.len() + end + ESCAPE_CLOSE.len();
                flush_literal(&mut literal, &mut parts);
                parts.push(Part::Escaped(candidate[..len].to_string()));
                rest = &candidate[len..];
                continue;
            }
        }

        match find_close(candidate) {
            Some(close) => {
                let raw = &candidate[..close + CLOSE.len()];
                let inner = &candidate[OPEN.len()..close];
                if inner.trim().is_empty() {
                    literal.push_str(raw);
                } else {
                    flush_literal(&mut literal, &mut parts);
                    parts.push(Part::Placeholder(parse_placeholder(raw, inner)?));
                }
                rest = &candidate[raw.len()..];
            }
            None => {
                literal.push_str(OPEN);
                rest = &candidate[OPEN.len()..];
            }
        }
    }

    literal.push_str(rest);
    flush_literal(&mut literal, &mut parts);
    Ok(Template { parts })
}

/// Whether a string could contain placeholders or escapes
pub fn needs_processing(input: &str) -> bool {
    input.contains(OPEN)
}

/// Strip the ``{{` `` / `` `}} `` markers from every escaped region
pub fn clean_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find(ESCAPE_OPEN) {
        let body = &rest[open + ESCAPE_OPEN.len()..];
        match body.find(ESCAPE_CLOSE) {
            Some(end) => {
                out.push_str(&rest[..open]);
                out.push_str(&body[..end]);
                rest = &body[end + ESCAPE_CLOSE.len()..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

fn flush_literal(literal: &mut String, parts: &mut Vec<Part>) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}

/// Byte offset of the `}}` matching the `{{` at the start of `s`
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                depth += 1;
                i += 2;
            }
            (b'}', b'}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

fn parse_placeholder(raw: &str, inner: &str) -> Result<Placeholder> {
    let inner = inner.trim();
    let invalid = |reason: &str| {
        Error::parse(format!("Invalid placeholder '{}': {}", raw, reason))
    };

    let links = split_top_level(inner).map_err(|reason| invalid(&reason))?;
    let expr = if links.iter().any(|l| l.has_call) {
        Expr::Call(parse_call(&links).map_err(|reason| invalid(&reason))?)
    } else {
        let template = parse(inner)?;
        Expr::Path(parse_path_template(template).map_err(|reason| invalid(&reason))?)
    };

    Ok(Placeholder {
        raw: raw.to_string(),
        expr,
    })
}

/// One dot-separated link of an expression, split outside parens and braces
struct Link<'a> {
    text: &'a str,
    has_call: bool,
}

fn split_top_level(s: &str) -> std::result::Result<Vec<Link<'_>>, String> {
    let bytes = s.as_bytes();
    let mut links = Vec::new();
    let mut braces = 0usize;
    let mut parens = 0usize;
    let mut start = 0;
    let mut has_call = false;
    let mut i = 0;

    while i < bytes.len() {
        let pair = bytes.get(i + 1).map(|next| (bytes[i], *next));
        match (bytes[i], pair) {
            (_, Some((b'{', b'{'))) => {
                braces += 1;
                i += 2;
                continue;
            }
            (_, Some((b'}', b'}'))) if braces > 0 => {
                braces -= 1;
                i += 2;
                continue;
            }
            _ if braces > 0 => {}
            (b'(', _) => {
                if parens == 0 {
                    has_call = true;
                }
                parens += 1;
            }
            (b')', _) => {
                if parens == 0 {
                    return Err("unbalanced ')'".into());
                }
                parens -= 1;
            }
            (b'.', _) if parens == 0 => {
                links.push(Link {
                    text: &s[start..i],
                    has_call,
                });
                start = i + 1;
                has_call = false;
            }
            _ => {}
        }
        i += 1;
    }

    if parens > 0 {
        return Err("unbalanced '('".into());
    }
    links.push(Link {
        text: &s[start..],
        has_call,
    });
    Ok(links)
}

fn parse_call(links: &[Link<'_>]) -> std::result::Result<Call, String> {
    let mut kind = None;
    let mut args = Vec::new();

    for (idx, link) in links.iter().enumerate() {
        let text = link.text.trim();
        if text.is_empty() {
            return Err("empty segment".into());
        }

        if !link.has_call {
            if idx > 0 {
                return Err(format!("expected 'name(value)', got '{}'", text));
            }
            validate_identifier(text)?;
            kind = Some(text.to_string());
            continue;
        }

        let open = text.find('(').ok_or_else(|| format!("malformed call '{}'", text))?;
        if !text.ends_with(')') {
            return Err(format!("unexpected text after ')' in '{}'", text));
        }
        let name = text[..open].trim();
        validate_identifier(name)?;
        let value = &text[open + 1..text.len() - 1];
        if !is_balanced(value) {
            return Err(format!("unbalanced parentheses in '{}'", text));
        }

        let value = parse(value).map_err(|e| e.cause.unwrap_or_else(|| e.kind.to_string()))?;
        if kind.is_none() {
            kind = Some(name.to_string());
        }
        args.push((name.to_string(), value));
    }

    let kind = kind.ok_or_else(|| "missing provider name".to_string())?;
    Ok(Call { kind, args })
}

fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("invalid name '{}'", name))
    }
}

fn is_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Drop whitespace from the literal parts of a path and check its shape
fn parse_path_template(template: Template) -> std::result::Result<Template, String> {
    let mut parts = Vec::with_capacity(template.parts.len());
    let mut shape = String::new();

    for part in template.parts {
        match part {
            Part::Literal(text) => {
                let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                shape.push_str(&text);
                if !text.is_empty() {
                    parts.push(Part::Literal(text));
                }
            }
            Part::Placeholder(p) => {
                // any resolved value must still form a valid key or index
                shape.push('0');
                parts.push(Part::Placeholder(p));
            }
            Part::Escaped(_) => return Err("escaped text inside a path".into()),
        }
    }

    validate_path_shape(&shape)?;
    Ok(Template { parts })
}

fn validate_path_shape(shape: &str) -> std::result::Result<(), String> {
    for segment in shape.split('.') {
        if segment.is_empty() {
            return Err("empty path segment".into());
        }
        let (key, mut indexes) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if key.is_empty() || key.contains([']', '(', ')', '{', '}']) {
            return Err(format!("invalid path segment '{}'", segment));
        }
        while let Some(body) = indexes.strip_prefix('[') {
            let close = body
                .find(']')
                .ok_or_else(|| format!("unclosed '[' in '{}'", segment))?;
            let index = &body[..close];
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("invalid index in '{}'", segment));
            }
            indexes = &body[close + 1..];
        }
        if !indexes.is_empty() {
            return Err(format!("unexpected text after index in '{}'", segment));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn literal(s: &str) -> Part {
        Part::Literal(s.into())
    }

    fn path_of(template: &Template) -> &Template {
        match template.as_single_placeholder().map(Placeholder::expr) {
            Some(Expr::Path(path)) => path,
            other => panic!("Expected path placeholder, got {:?}", other),
        }
    }

    fn call_of(template: &Template) -> &Call {
        match template.as_single_placeholder().map(Placeholder::expr) {
            Some(Expr::Call(call)) => call,
            other => panic!("Expected call placeholder, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_literal() {
        let result = parse("hello world").unwrap();
        assert_eq!(result.parts(), &[literal("hello world")]);
        assert!(result.is_literal());
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").unwrap().parts().is_empty());
    }

    #[test]
    fn test_parse_simple_path() {
        let result = parse("{{database.host}}").unwrap();
        assert_eq!(path_of(&result).parts(), &[literal("database.host")]);
        assert_eq!(result.as_single_placeholder().unwrap().raw(), "{{database.host}}");
    }

    #[test]
    fn test_whitespace_in_path_is_ignored() {
        let result = parse("{{ account . id }}").unwrap();
        assert_eq!(path_of(&result).parts(), &[literal("account.id")]);
    }

    #[test]
    fn test_parse_concatenation() {
        let result = parse("arn:aws:iam::{{account.id}}:role/{{role}}").unwrap();
        let parts = result.parts();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], literal("arn:aws:iam::"));
        assert!(matches!(parts[1], Part::Placeholder(_)));
        assert_eq!(parts[2], literal(":role/"));
        assert!(result.as_single_placeholder().is_none());
        assert_eq!(result.placeholders().count(), 2);
    }

    #[test]
    fn test_parse_nested_path() {
        let result = parse("{{projects.{{project.name}}.tagging}}").unwrap();
        let path = path_of(&result);

        assert_eq!(path.parts().len(), 3);
        assert_eq!(path.parts()[0], literal("projects."));
        assert_eq!(path.parts()[2], literal(".tagging"));
        let inner = match &path.parts()[1] {
            Part::Placeholder(p) => p,
            other => panic!("Expected nested placeholder, got {:?}", other),
        };
        assert_eq!(inner.raw(), "{{project.name}}");
    }

    #[test]
    fn test_parse_array_index() {
        let result = parse("{{servers[0].host}}").unwrap();
        assert_eq!(path_of(&result).parts(), &[literal("servers[0].host")]);

        let nested = parse("{{servers[{{idx}}]}}").unwrap();
        assert_eq!(path_of(&nested).parts().len(), 3);
    }

    #[test]
    fn test_parse_call_with_kind_chain() {
        let result = parse("{{ssm.path(/app/db.password).aws_profile(prod)}}").unwrap();
        let call = call_of(&result);

        assert_eq!(call.kind, "ssm");
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0].0, "path");
        assert_eq!(call.args[0].1.parts(), &[literal("/app/db.password")]);
        assert_eq!(call.args[1].0, "aws_profile");
    }

    #[test]
    fn test_parse_call_with_leading_value() {
        let result = parse("{{env(HOME)}}").unwrap();
        let call = call_of(&result);

        assert_eq!(call.kind, "env");
        assert_eq!(call.args[0].0, "env");
        assert_eq!(call.args[0].1.parts(), &[literal("HOME")]);
    }

    #[test]
    fn test_parse_call_value_with_parens_and_placeholder() {
        let result = parse("{{s3.bucket(b-{{env}}).path(a(1).txt)}}").unwrap();
        let call = call_of(&result);

        assert_eq!(call.kind, "s3");
        assert_eq!(call.args[0].1.parts().len(), 2);
        assert_eq!(call.args[1].1.parts(), &[literal("a(1).txt")]);
    }

    #[test]
    fn test_unterminated_is_literal() {
        let result = parse("value {{ not closed").unwrap();
        assert_eq!(result.parts(), &[literal("value {{ not closed")]);

        let partial = parse("{{ open {{b}}").unwrap();
        assert_eq!(partial.parts().len(), 2);
        assert_eq!(partial.parts()[0], literal("{{ open "));
    }

    #[test]
    fn test_empty_placeholder_is_literal() {
        let result = parse("a{{}}b{{  }}").unwrap();
        assert_eq!(result.parts(), &[literal("a{{}}b{{  }}")]);
    }

    #[test]
    fn test_escaped_region() {
        let result = parse("before {{`{{not.resolved}}`}} after").unwrap();
        assert_eq!(
            result.parts(),
            &[
                literal("before "),
                Part::Escaped("{{`{{not.resolved}}`}}".into()),
                literal(" after"),
            ]
        );
        assert!(result.is_literal());
    }

    #[test]
    fn test_malformed_placeholders_are_errors() {
        for input in [
            "{{a..b}}",
            "{{ssm.path(x}}",
            "{{ssm.path(x))}}",
            "{{ssm.path(x).bare}}",
            "{{1bad(x)}}",
            "{{a[x]}}",
            "{{.a}}",
        ] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Parse, "input: {}", input);
        }
    }

    #[test]
    fn test_clean_escapes() {
        assert_eq!(clean_escapes("{{`{{keep}}`}}"), "{{keep}}");
        assert_eq!(clean_escapes("a {{`x`}} b {{`y`}}"), "a x b y");
        assert_eq!(clean_escapes("no escapes {{here}}"), "no escapes {{here}}");
        assert_eq!(clean_escapes("open {{` only"), "open {{` only");
    }

    #[test]
    fn test_needs_processing() {
        assert!(needs_processing("{{a}}"));
        assert!(needs_processing("{{`a`}}"));
        assert!(!needs_processing("plain { text }"));
    }
}
