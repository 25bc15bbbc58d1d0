//! Template rendering for relayed messages.
//!
//! Templates use mustache syntax over a JSON variable map:
//! - `{{name}}` - HTML-escaped value, dotted paths allowed (`{{session.user_id}}`)
//! - `{{{name}}}` / `{{& name}}` - raw value
//! - `{{#name}}...{{/name}}` - section, repeated for arrays
//! - `{{^name}}...{{/name}}` - inverted section
//! - `{{! comment}}`
//!
//! Missing variables render as empty; rendering never fails.

use chrono::Local;
use serde_json::{Map, Value};

/// Variables exposed to a template.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    vars: Map<String, Value>,
}

impl FormatContext {
    /// Create a context pre-populated with `time` (HH:MM:SS).
    pub fn new() -> Self {
        let mut vars = Map::new();
        vars.insert("time".into(), Value::String(get_time()));
        Self { vars }
    }

    /// Set a variable.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    fn as_value(&self) -> Value {
        Value::Object(self.vars.clone())
    }
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var { path: String, escape: bool },
    Section {
        path: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

impl MessageFormatter {
    /// Parse a template. Malformed tags are kept as literal text.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            nodes: parse(&format.into()),
        }
    }

    /// Build a formatter from an optional config template.
    ///
    /// `None` or an empty string means the relay is disabled.
    pub fn from_template(template: Option<&str>) -> Option<Self> {
        template.filter(|t| !t.is_empty()).map(Self::new)
    }

    /// Render against the given variables.
    pub fn format(&self, ctx: &FormatContext) -> String {
        let root = ctx.as_value();
        let mut stack = vec![&root];
        let mut out = String::new();
        render_nodes(&self.nodes, &mut stack, &mut out);
        out
    }
}

fn parse(src: &str) -> Vec<Node> {
    // Open sections: (path, inverted, nodes collected before the section).
    let mut open: Vec<(String, bool, Vec<Node>)> = Vec::new();
    let mut current: Vec<Node> = Vec::new();
    let mut rest = src;

    while let Some(start) = rest.find("{{") {
        let (tag, len) = if rest[start..].starts_with("{{{") {
            match rest[start + 3..].find("}}}") {
                Some(end) => (format!("&{}", &rest[start + 3..start + 3 + end]), end + 6),
                None => break,
            }
        } else {
            match rest[start + 2..].find("}}") {
                Some(end) => (rest[start + 2..start + 2 + end].to_string(), end + 4),
                None => break,
            }
        };

        push_text(&mut current, &rest[..start]);
        rest = &rest[start + len..];

        let tag = tag.trim();
        let mut chars = tag.chars();
        match chars.next() {
            Some('!') | Some('>') | Some('=') => {}
            Some('#') | Some('^') => {
                let inverted = tag.starts_with('^');
                open.push((chars.as_str().trim().to_string(), inverted, current));
                current = Vec::new();
            }
            Some('/') => {
                if let Some((path, inverted, parent)) = open.pop() {
                    let children = std::mem::replace(&mut current, parent);
                    current.push(Node::Section {
                        path,
                        inverted,
                        children,
                    });
                }
            }
            Some('&') => current.push(Node::Var {
                path: chars.as_str().trim().to_string(),
                escape: false,
            }),
            Some(_) => current.push(Node::Var {
                path: tag.to_string(),
                escape: true,
            }),
            None => {}
        }
    }
    push_text(&mut current, rest);

    // Close anything left open at end of input.
    while let Some((path, inverted, parent)) = open.pop() {
        let children = std::mem::replace(&mut current, parent);
        current.push(Node::Section {
            path,
            inverted,
            children,
        });
    }

    current
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn render_nodes<'v>(nodes: &[Node], stack: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { path, escape } => {
                let value = lookup(stack, path).map(stringify).unwrap_or_default();
                if *escape {
                    out.push_str(&escape_html(&value));
                } else {
                    out.push_str(&value);
                }
            }
            Node::Section {
                path,
                inverted,
                children,
            } => {
                let value = lookup(stack, path);
                let truthy = value.is_some_and(is_truthy);

                if *inverted {
                    if !truthy {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }
                if !truthy {
                    continue;
                }

                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(other) => {
                        stack.push(other);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    None => {}
                }
            }
        }
    }
}

/// Resolve a dotted path, searching context frames from innermost outward.
fn lookup<'v>(stack: &[&'v Value], path: &str) -> Option<&'v Value> {
    if path == "." {
        return stack.last().copied();
    }

    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut value = stack.iter().rev().find_map(|frame| (*frame).get(first))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Mustache's default HTML escaping.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            _ => out.push(c),
        }
    }
    out
}

/// Get the current time as HH:MM:SS string.
fn get_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_death_template() {
        let formatter = MessageFormatter::new("{{player}} died to {{source}}");
        let ctx = FormatContext::new()
            .with("player", "Alice")
            .with("source", "Creeper");

        assert_eq!(formatter.format(&ctx), "Alice died to Creeper");
    }

    #[test]
    fn test_missing_variable_is_empty() {
        let formatter = MessageFormatter::new("[{{player}}]{{nope}}");
        let ctx = FormatContext::new().with("player", "Bob");
        assert_eq!(formatter.format(&ctx), "[Bob]");
    }

    #[test]
    fn test_escaping() {
        let ctx = FormatContext::new().with("message", "a<b & c/d");
        assert_eq!(
            MessageFormatter::new("{{message}}").format(&ctx),
            "a&lt;b &amp; c&#x2F;d"
        );
        assert_eq!(MessageFormatter::new("{{{message}}}").format(&ctx), "a<b & c/d");
        assert_eq!(MessageFormatter::new("{{& message}}").format(&ctx), "a<b & c/d");
    }

    #[test]
    fn test_dotted_path() {
        let ctx = FormatContext::new().with(
            "session",
            json!({ "user_id": 10001, "author": { "nickname": "Ann" } }),
        );
        let formatter = MessageFormatter::new("{{session.user_id}}:{{session.author.nickname}}");
        assert_eq!(formatter.format(&ctx), "10001:Ann");
    }

    #[test]
    fn test_sections() {
        let formatter =
            MessageFormatter::new("{{player}} died{{#source}} to {{source}}{{/source}}{{^source}}.{{/source}}");

        let with_source = FormatContext::new()
            .with("player", "Alice")
            .with("source", "Zombie");
        assert_eq!(formatter.format(&with_source), "Alice died to Zombie");

        let without = FormatContext::new().with("player", "Alice").with("source", "");
        assert_eq!(formatter.format(&without), "Alice died.");
    }

    #[test]
    fn test_array_section() {
        let ctx = FormatContext::new().with("players", json!(["a", "b", "c"]));
        let formatter = MessageFormatter::new("{{#players}}<{{.}}>{{/players}}");
        assert_eq!(formatter.format(&ctx), "<a><b><c>");
    }

    #[test]
    fn test_comment_and_unclosed_tag() {
        let ctx = FormatContext::new().with("player", "Bob");
        assert_eq!(
            MessageFormatter::new("{{! ignored }}hi {{player}} {{oops").format(&ctx),
            "hi Bob {{oops"
        );
    }

    #[test]
    fn test_time_variable_present() {
        let result = MessageFormatter::new("[{{time}}]").format(&FormatContext::new());
        // HH:MM:SS
        assert_eq!(result.len(), 10);
        assert!(result.starts_with('['));
    }

    #[test]
    fn test_from_template_disabled_when_empty() {
        assert!(MessageFormatter::from_template(None).is_none());
        assert!(MessageFormatter::from_template(Some("")).is_none());
        let formatter = MessageFormatter::from_template(Some("{{player}}")).unwrap();
        let ctx = FormatContext::new().with("player", "Steve");
        assert_eq!(formatter.format(&ctx), "Steve");
    }
}
