//! Arena-backed host document tree.
//!
//! Nodes live in a single `Vec` and are addressed by [`NodeId`]. Detached
//! nodes stay in the arena; only their parent link is cleared.

use crate::types::{LabError, LabResult};

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// A mutable HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Comment(text.to_string()))
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::Doctype(name.to_string()))
    }

    fn node(&self, id: NodeId) -> LabResult<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| LabError::Dom(format!("unknown node {}", id.0)))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> LabResult<&mut Element> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            _ => Err(LabError::Dom(format!("node {} is not an element", id.0))),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `id` is `ancestor` or lies beneath it.
    pub fn is_inclusive_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == ancestor {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    fn can_have_children(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            Some(NodeKind::Document) | Some(NodeKind::Element(_))
        )
    }

    fn check_insert(&self, parent: NodeId, child: NodeId, op: &str) -> LabResult<()> {
        self.node(parent)?;
        self.node(child)?;
        if !self.can_have_children(parent) {
            return Err(LabError::Dom(format!("{op} target cannot have children")));
        }
        if child == self.root {
            return Err(LabError::Dom(format!("{op} cannot move the document root")));
        }
        if self.is_inclusive_descendant(parent, child) {
            return Err(LabError::Dom(format!("{op} would create a cycle")));
        }
        Ok(())
    }

    /// Remove `id` from its parent. A detached node is left as-is.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
            self.nodes[id.0].parent = None;
        }
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> LabResult<()> {
        self.check_insert(parent, child, "append_child")?;
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Move `child` into `parent` immediately before `reference`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> LabResult<()> {
        self.check_insert(parent, child, "insert_before")?;
        if self.parent(reference) != Some(parent) {
            return Err(LabError::Dom(
                "insert_before reference is not a direct child".to_string(),
            ));
        }
        if child == reference {
            return Ok(());
        }
        self.detach(child);
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .ok_or_else(|| LabError::Dom("insert_before reference is missing".to_string()))?;
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, child);
        Ok(())
    }

    /// Move `child` into `parent` at `index`, clamped to the child count.
    pub fn insert_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> LabResult<()> {
        self.check_insert(parent, child, "insert_at")?;
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| {
            e.attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> LabResult<()> {
        let element = self.element_mut(id)?;
        match element
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => element
                .attrs
                .push((name.to_ascii_lowercase(), value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> LabResult<()> {
        let element = self.element_mut(id)?;
        element.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        Ok(())
    }

    /// Read one inline style property.
    pub fn style_get(&self, id: NodeId, property: &str) -> Option<String> {
        parse_style_declarations(self.attr(id, "style"))
            .into_iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(property))
            .map(|(_, v)| v)
    }

    /// Set one inline style property; an empty value removes it.
    pub fn style_set(&mut self, id: NodeId, property: &str, value: &str) -> LabResult<()> {
        let property = property.trim().to_ascii_lowercase();
        let mut decls = parse_style_declarations(self.attr(id, "style"));
        if let Some(pos) = decls.iter().position(|(p, _)| *p == property) {
            if value.is_empty() {
                decls.remove(pos);
            } else {
                decls[pos].1 = value.to_string();
            }
        } else if !value.is_empty() {
            decls.push((property, value.to_string()));
        }

        if decls.is_empty() {
            self.remove_attr(id, "style")
        } else {
            self.set_attr(id, "style", &serialize_style_declarations(&decls))
        }
    }

    /// First node in document order (depth-first, pre-order) matching `pred`.
    pub fn find_first<F>(&self, pred: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if pred(self, id) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        None
    }

    /// First element with the given tag name.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find_first(|doc, id| {
            doc.tag_name(id)
                .is_some_and(|t| t.eq_ignore_ascii_case(tag))
        })
    }

    /// Concatenated text beneath `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => out.push_str(text),
            Some(NodeKind::Element(_)) | Some(NodeKind::Document) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            _ => {}
        }
    }
}

fn parse_style_declarations(style: Option<&str>) -> Vec<(String, String)> {
    let Some(style) = style else {
        return Vec::new();
    };
    let mut decls = Vec::new();
    for part in split_declarations(style) {
        let Some((prop, value)) = part.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim();
        if prop.is_empty() || value.is_empty() {
            continue;
        }
        decls.push((prop, value.to_string()));
    }
    decls
}

/// Split on `;` outside of parentheses and quotes, so `url(data:...;base64,...)`
/// stays intact.
fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

fn serialize_style_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(p, v)| format!("{p}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}
