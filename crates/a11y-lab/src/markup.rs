//! The markup a serving proxy splices into host pages: the widget tag with
//! its configuration attributes, plus the script that defines it.

use serde_json::{Map, Value};

use crate::config::DEFAULT_HOST_TAG;

/// What to inject into a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub tag: String,
    pub script_src: String,
    /// Widget configuration keyed by camelCase field name.
    pub attributes: Map<String, Value>,
}

impl Injection {
    pub fn new(script_src: impl Into<String>) -> Self {
        Self {
            tag: DEFAULT_HOST_TAG.to_string(),
            script_src: script_src.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// `keyboardOnly` → `keyboard-only`.
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Attribute text for a configuration value: strings verbatim, anything
/// else JSON-encoded, then entity-escaped.
pub fn attribute_value(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    crate::html::escape_attr(&raw)
}

/// The widget element with its attributes in insertion order.
pub fn widget_tag(injection: &Injection) -> String {
    let mut out = format!("<{}", injection.tag);
    for (key, value) in &injection.attributes {
        out.push_str(&format!(" {}=\"{}\"", to_kebab_case(key), attribute_value(value)));
    }
    out.push_str(&format!("></{}>", injection.tag));
    out
}

pub fn script_tag(src: &str) -> String {
    format!(
        "<script type=\"module\" src=\"{}\"></script>",
        crate::html::escape_attr(src)
    )
}

/// Insert the script before the first `</head>` and the widget before the
/// last `</body>`. A missing marker leaves that part of the document
/// untouched.
pub fn inject(html: &str, injection: &Injection) -> String {
    let mut out = html.to_string();

    // Body first: inserting into the head shifts later offsets.
    match rfind_ignore_case(&out, "</body>") {
        Some(pos) => out.insert_str(pos, &widget_tag(injection)),
        None => tracing::warn!("No </body> marker; widget tag not injected"),
    }
    match find_ignore_case(&out, "</head>") {
        Some(pos) => out.insert_str(pos, &script_tag(&injection.script_src)),
        None => tracing::warn!("No </head> marker; script not injected"),
    }
    out
}

// ASCII lowercasing keeps byte offsets aligned with the original.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

fn rfind_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().rfind(needle)
}
