//! A host page with the widget located inside it.

use std::path::Path;

use crate::config::{ExperimentsInput, PropValue};
use crate::dom::{Document, NodeId};
use crate::effects;
use crate::html::{parse_document, serialize};
use crate::types::{Experiment, LabError, LabResult};
use crate::wrapper::ContentWrapper;

/// Properties declared on the widget element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetProps {
    pub experiments: Option<ExperimentsInput>,
    pub active: Option<PropValue>,
}

/// A parsed host document and its widget element.
#[derive(Debug, Clone)]
pub struct Page {
    document: Document,
    host: NodeId,
    props: WidgetProps,
}

impl Page {
    /// Parse `html` and locate the first `<host_tag>` element.
    pub fn load(html: &str, host_tag: &str) -> LabResult<Self> {
        let document = parse_document(html);
        let host = document
            .find_by_tag(host_tag)
            .ok_or_else(|| LabError::HostNotFound(host_tag.to_string()))?;
        let props = WidgetProps {
            experiments: document
                .attr(host, "experiments")
                .map(|text| ExperimentsInput::Text(text.to_string())),
            active: document
                .attr(host, "active")
                .map(|text| PropValue::Text(text.to_string())),
        };
        Ok(Self {
            document,
            host,
            props,
        })
    }

    pub fn from_file(path: &Path, host_tag: &str) -> LabResult<Self> {
        let html = std::fs::read_to_string(path)?;
        Self::load(&html, host_tag)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn props(&self) -> &WidgetProps {
        &self.props
    }

    /// The page's current HTML.
    pub fn to_html(&self) -> String {
        serialize(&self.document)
    }

    /// Wrap the page content and apply `experiment` to it outside of any
    /// run. The wrapper stays in place.
    pub fn preview(&mut self, experiment: &Experiment) -> LabResult<()> {
        let mut wrapper = ContentWrapper::new();
        let content = wrapper.wrap(&mut self.document, self.host)?.content();
        effects::apply_all(&mut self.document, content, experiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_reads_props() {
        let page = Page::load(
            r#"<body><p>x</p><a11y-lab active="false" experiments="[]"></a11y-lab></body>"#,
            "a11y-lab",
        )
        .unwrap();
        assert_eq!(page.document().tag_name(page.host()), Some("a11y-lab"));
        assert_eq!(
            page.props().experiments,
            Some(ExperimentsInput::Text("[]".to_string()))
        );
        assert!(!page.props().active.as_ref().unwrap().truthy());
    }

    #[test]
    fn test_missing_host() {
        let err = Page::load("<p>plain</p>", "a11y-lab").unwrap_err();
        assert!(matches!(err, LabError::HostNotFound(tag) if tag == "a11y-lab"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "<html><body><a11y-lab></a11y-lab></body></html>").unwrap();

        let page = Page::from_file(&path, "a11y-lab").unwrap();
        assert!(page.props().experiments.is_none());
        assert!(page.to_html().contains("<a11y-lab></a11y-lab>"));
    }

    #[test]
    fn test_preview_applies_experiment() {
        let mut page = Page::load(
            "<body><main>hi</main><a11y-lab></a11y-lab></body>",
            "a11y-lab",
        )
        .unwrap();
        page.preview(&Experiment::new("Big", "").with_font_size(30.0).with_keyboard_only(true))
            .unwrap();

        let html = page.to_html();
        assert!(html.contains("font-size: 30px"));
        assert!(html.contains("pointer-events: none"));
        assert!(html.contains("<main>hi</main>"));
    }
}
