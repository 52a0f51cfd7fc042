//! HTML parsing into the arena document, and serialization back to text.

use scraper::Html;

use crate::dom::{Document, NodeId, NodeKind};

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text children are written without escaping. Matches the
/// set the parser tokenizes as raw text with scripting enabled.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript", "plaintext",
];

/// Parse a full HTML document.
pub fn parse_document(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let mut stack: Vec<_> = parsed
        .tree
        .root()
        .children()
        .map(|child| (child, doc.root()))
        .collect();
    stack.reverse();

    while let Some((src, parent)) = stack.pop() {
        let id = match src.value() {
            scraper::Node::Doctype(doctype) => doc.create_doctype(doctype.name()),
            scraper::Node::Comment(comment) => doc.create_comment(comment),
            scraper::Node::Text(text) => doc.create_text(text),
            scraper::Node::Element(element) => {
                let attrs = element
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                doc.create_element(element.name(), attrs)
            }
            _ => continue,
        };
        if let Err(e) = doc.append_child(parent, id) {
            tracing::warn!("Skipping unparented node: {e}");
            continue;
        }
        let children: Vec<_> = src.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, id)));
    }
    doc
}

/// Serialize the whole document.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, false, &mut out);
    }
    out
}

/// Serialize a single node and its subtree.
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, false, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    match doc.kind(id) {
        Some(NodeKind::Document) => {
            for child in doc.children(id) {
                write_node(doc, *child, false, out);
            }
        }
        Some(NodeKind::Doctype(name)) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        Some(NodeKind::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Some(NodeKind::Text(text)) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        Some(NodeKind::Element(element)) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&element.tag.as_str());
            for child in doc.children(id) {
                write_node(doc, *child, raw, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
        None => {}
    }
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_html_head_body() {
        let doc = parse_document("<p>Hello</p>");
        let body = doc.find_by_tag("body").unwrap();
        let p = doc.find_by_tag("p").unwrap();
        assert_eq!(doc.parent(p), Some(body));
        assert_eq!(doc.text_content(p), "Hello");
        assert!(doc.find_by_tag("head").is_some());
    }

    #[test]
    fn test_attributes_are_decoded() {
        let doc = parse_document(
            r#"<body><a11y-lab experiments="[{&quot;name&quot;:&quot;A&quot;}]" active></a11y-lab></body>"#,
        );
        let host = doc.find_by_tag("a11y-lab").unwrap();
        assert_eq!(doc.attr(host, "experiments"), Some(r#"[{"name":"A"}]"#));
        assert_eq!(doc.attr(host, "active"), Some(""));
    }

    #[test]
    fn test_serialize_round_trip_is_stable() {
        let src = "<!DOCTYPE html><html><head><title>T &amp; U</title></head>\
                   <body><!-- note --><p class=\"x\">a &lt; b</p><br><script>if (a < b) {}</script></body></html>";
        let once = serialize(&parse_document(src));
        let twice = serialize(&parse_document(&once));
        assert_eq!(once, twice);
        assert!(once.starts_with("<!DOCTYPE html>"));
        assert!(once.contains("<br>"));
        assert!(!once.contains("</br>"));
        assert!(once.contains("if (a < b) {}"));
        assert!(once.contains("a &lt; b"));
        assert!(once.contains("<!-- note -->"));
    }

    #[test]
    fn test_noscript_content_survives_round_trips() {
        let src = r#"<html><head></head><body><noscript><img src="x.png"></noscript><p>a</p></body></html>"#;
        let once = serialize(&parse_document(src));
        let twice = serialize(&parse_document(&once));
        assert!(once.contains(r#"<noscript><img src="x.png"></noscript>"#), "{once}");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_escape_attr_quotes() {
        assert_eq!(escape_attr(r#"say "hi" & go"#), "say &quot;hi&quot; &amp; go");
    }
}
