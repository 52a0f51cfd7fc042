//! Content isolation: moving the host page's content into a wrapper subtree
//! and putting it back exactly where it was.
//!
//! The widget's own markup (the host element and anything carrying
//! [`MARKER_ATTR`]) is never moved. Everything else beside the host is
//! "foreign" content and goes into the wrapper's content node.

use crate::dom::{Document, NodeId};
use crate::types::{LabError, LabResult};

/// Attribute that marks nodes generated by the widget itself.
pub const MARKER_ATTR: &str = "data-a11y-lab";

/// A live wrapper: `container` sits where the host content was, `content`
/// holds the relocated nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapper {
    container: NodeId,
    content: NodeId,
    parent: NodeId,
    host: NodeId,
    /// Original child index under `parent` of every relocated node,
    /// ascending.
    slots: Vec<(usize, NodeId)>,
}

impl Wrapper {
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn content(&self) -> NodeId {
        self.content
    }

    /// Number of host nodes moved into the wrapper.
    pub fn relocated(&self) -> usize {
        self.slots.len()
    }
}

/// Whether `id` belongs to the host page rather than the widget.
pub fn is_foreign(doc: &Document, id: NodeId, host: NodeId) -> bool {
    id != host && !doc.has_attr(id, MARKER_ATTR)
}

/// Owner of the single wrapper instance.
#[derive(Debug, Default)]
pub struct ContentWrapper {
    current: Option<Wrapper>,
}

impl ContentWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Wrapper> {
        self.current.as_ref()
    }

    pub fn is_wrapped(&self) -> bool {
        self.current.is_some()
    }

    /// Relocate the host's foreign siblings into a fresh wrapper placed
    /// immediately before `host`. Any existing wrapper is torn down first.
    pub fn wrap(&mut self, doc: &mut Document, host: NodeId) -> LabResult<&Wrapper> {
        self.unwrap(doc)?;

        let parent = doc
            .parent(host)
            .ok_or_else(|| LabError::Dom("widget host is not attached to the document".into()))?;

        let slots: Vec<(usize, NodeId)> = doc
            .children(parent)
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, id)| is_foreign(doc, *id, host))
            .collect();

        let container = doc.create_element(
            "div",
            vec![(MARKER_ATTR.to_string(), "wrapper".to_string())],
        );
        let content = doc.create_element(
            "div",
            vec![(MARKER_ATTR.to_string(), "content".to_string())],
        );
        doc.insert_before(parent, container, host)?;
        doc.append_child(container, content)?;
        for (_, id) in &slots {
            doc.append_child(content, *id)?;
        }

        tracing::debug!("Wrapped {} host nodes", slots.len());

        Ok(self.current.insert(Wrapper {
            container,
            content,
            parent,
            host,
            slots,
        }))
    }

    /// Move relocated nodes back to their original positions and remove the
    /// container. Without a wrapper this does nothing.
    pub fn unwrap(&mut self, doc: &mut Document) -> LabResult<()> {
        let Some(wrapper) = self.current.take() else {
            return Ok(());
        };

        // Nodes that appeared inside the content node during the run have no
        // slot; they land where the container was.
        let strays: Vec<NodeId> = doc
            .children(wrapper.content)
            .iter()
            .copied()
            .filter(|id| !wrapper.slots.iter().any(|(_, s)| s == id))
            .collect();
        for id in strays {
            doc.insert_before(wrapper.parent, id, wrapper.container)?;
        }

        doc.detach(wrapper.container);

        // Every node with a smaller original index is already back in place
        // when a slot is filled, so inserting in ascending order is exact.
        for (index, id) in &wrapper.slots {
            if doc.parent(*id) == Some(wrapper.content) {
                doc.insert_at(wrapper.parent, *id, *index)?;
            }
        }

        tracing::debug!(
            "Unwrapped {} host nodes around host {:?}",
            wrapper.slots.len(),
            wrapper.host
        );
        Ok(())
    }
}
