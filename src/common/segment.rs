//! Structured message segments.
//!
//! OneBot delivers a message either as an array of `{type, data}` objects or
//! as a CQ-code string (`hello[CQ:at,qq=123]`). Both decode into the same
//! ordered `Vec<Segment>`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute map carried by a segment.
pub type Attrs = Map<String, Value>;

/// One typed unit of a structured chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Attrs,
}

impl Segment {
    pub fn new(kind: impl Into<String>, data: Attrs) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Build a segment from `(key, value)` string pairs.
    pub fn with_attrs(kind: impl Into<String>, attrs: &[(&str, &str)]) -> Self {
        let data = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Self::new(kind, data)
    }

    /// Plain text segment.
    pub fn text(content: impl Into<String>) -> Self {
        let mut data = Attrs::new();
        data.insert("text".into(), Value::String(content.into()));
        Self::new("text", data)
    }

    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }

    /// Read an attribute as a string.
    ///
    /// Numbers and booleans are stringified, since implementations disagree
    /// on whether ids travel as `"123"` or `123`.
    pub fn attr(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Read an attribute as a flag. `"0"`, `"false"`, `""`, `0` and missing are false.
    pub fn flag(&self, key: &str) -> bool {
        match self.data.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !matches!(s.as_str(), "" | "0" | "false"),
            _ => false,
        }
    }

    /// Text content of a `text` segment.
    pub fn text_content(&self) -> Option<String> {
        if self.is_text() {
            self.attr("text")
        } else {
            None
        }
    }

    /// Literal textual representation: raw text for `text`, CQ code otherwise.
    pub fn to_literal(&self) -> String {
        if let Some(text) = self.text_content() {
            return text;
        }

        let mut out = format!("[CQ:{}", self.kind);
        for key in self.data.keys() {
            if let Some(value) = self.attr(key) {
                out.push(',');
                out.push_str(key);
                out.push('=');
                out.push_str(&escape_cq_param(&value));
            }
        }
        out.push(']');
        out
    }
}

/// Message body as delivered by OneBot: array or CQ-code string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Array(Vec<Segment>),
    CqString(String),
}

impl MessageContent {
    pub fn into_segments(self) -> Vec<Segment> {
        match self {
            MessageContent::Array(segments) => segments,
            MessageContent::CqString(raw) => parse_cq(&raw),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Array(Vec::new())
    }
}

/// Join the contents of all `text` segments with a single space.
pub fn plain_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .filter_map(Segment::text_content)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a CQ-code string into segments.
///
/// An unterminated `[CQ:` is kept as literal text.
pub fn parse_cq(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = raw;

    while !rest.is_empty() {
        let Some(start) = rest.find("[CQ:") else {
            segments.push(Segment::text(unescape_cq(rest)));
            break;
        };

        if start > 0 {
            segments.push(Segment::text(unescape_cq(&rest[..start])));
        }

        let after = &rest[start + 4..];
        let Some(end) = after.find(']') else {
            segments.push(Segment::text(unescape_cq(&rest[start..])));
            break;
        };

        let mut parts = after[..end].split(',');
        let kind = parts.next().unwrap_or_default().trim().to_string();
        let mut data = Attrs::new();
        for part in parts {
            if let Some((key, value)) = part.split_once('=') {
                data.insert(key.to_string(), Value::String(unescape_cq(value)));
            }
        }
        segments.push(Segment::new(kind, data));

        rest = &after[end + 1..];
    }

    segments
}

fn escape_cq_param(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
        .replace(',', "&#44;")
}

fn unescape_cq(s: &str) -> String {
    s.replace("&#44;", ",")
        .replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&amp;", "&")
}
