//! Experiment configuration resolution.
//!
//! The host supplies experiments either as JSON text (an HTML attribute)
//! or as an already structured list. Resolution is synchronous and pure:
//! refusing a change during an active run is reported back to the caller,
//! which raises the operator notification.

use serde::{Deserialize, Serialize};

use crate::types::{Experiment, LabError, LabResult, Status};

/// Tag name of the widget's host element.
pub const DEFAULT_HOST_TAG: &str = "a11y-lab";

/// Message shown when configuration changes arrive mid-run.
pub const CONFIG_LOCKED_MESSAGE: &str = "Configuration cannot change during active testing";

/// Raw experiment configuration as supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExperimentsInput {
    /// JSON-encoded array of experiments.
    Text(String),
    Structured(Vec<Experiment>),
}

impl From<Vec<Experiment>> for ExperimentsInput {
    fn from(list: Vec<Experiment>) -> Self {
        ExperimentsInput::Structured(list)
    }
}

impl From<&str> for ExperimentsInput {
    fn from(text: &str) -> Self {
        ExperimentsInput::Text(text.to_string())
    }
}

/// A settable widget property that may arrive as text or a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Text(String),
}

impl PropValue {
    /// Attribute truthiness: `"false"` and `"0"` are false, a bare
    /// attribute (`""`) is true.
    pub fn truthy(&self) -> bool {
        match self {
            PropValue::Bool(b) => *b,
            PropValue::Text(s) => !matches!(s.trim(), "false" | "0"),
        }
    }
}

/// The configuration governing a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub experiments: Vec<Experiment>,
    pub host_tag: String,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            experiments: default_experiments(),
            host_tag: DEFAULT_HOST_TAG.to_string(),
        }
    }
}

/// The built-in experiment list.
pub fn default_experiments() -> Vec<Experiment> {
    vec![Experiment::new(
        "Large font size",
        "Text is enlarged to **24px**. Check that nothing overlaps, truncates, \
         or becomes unreadable, and that the layout still works.",
    )
    .with_font_size(24.0)]
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(EffectiveConfig),
    /// A run is active; the current configuration stays in force.
    Refused,
}

/// Resolve `raw` against the configuration currently in force.
///
/// Text is parsed as a JSON array of experiments and a parse failure is a
/// hard error. A structured list replaces only the experiment list. With no
/// input the built-in defaults apply.
pub fn resolve(
    raw: Option<&ExperimentsInput>,
    current: &EffectiveConfig,
    status: Status,
) -> LabResult<Resolution> {
    if status == Status::Active {
        return Ok(Resolution::Refused);
    }

    let experiments = match raw {
        Some(ExperimentsInput::Text(text)) => parse_experiments(text)?,
        Some(ExperimentsInput::Structured(list)) => {
            validate_all(list)?;
            list.clone()
        }
        None => default_experiments(),
    };

    Ok(Resolution::Resolved(EffectiveConfig {
        experiments,
        host_tag: current.host_tag.clone(),
    }))
}

/// Parse and validate a JSON experiment list.
pub fn parse_experiments(text: &str) -> LabResult<Vec<Experiment>> {
    let list: Vec<Experiment> =
        serde_json::from_str(text).map_err(|e| LabError::MalformedConfig(e.to_string()))?;
    validate_all(&list)?;
    Ok(list)
}

fn validate_all(list: &[Experiment]) -> LabResult<()> {
    list.iter().try_for_each(Experiment::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorBlind, ColorBlindProfile};

    fn resolved(r: Resolution) -> EffectiveConfig {
        match r {
            Resolution::Resolved(cfg) => cfg,
            Resolution::Refused => panic!("expected a resolved configuration"),
        }
    }

    #[test]
    fn test_default_is_single_large_font_experiment() {
        let cfg = resolved(resolve(None, &EffectiveConfig::default(), Status::Inactive).unwrap());
        assert_eq!(cfg.experiments.len(), 1);
        assert_eq!(cfg.experiments[0].font_size, Some(24.0));
    }

    #[test]
    fn test_text_input_is_parsed() {
        let raw = ExperimentsInput::from(
            r#"[{"name":"A","description":"","fontSize":16},
                {"name":"B","description":"","colorBlind":"deuteranomaly","keyboardOnly":true}]"#,
        );
        let cfg = resolved(resolve(Some(&raw), &EffectiveConfig::default(), Status::Prompted).unwrap());
        assert_eq!(cfg.experiments.len(), 2);
        assert_eq!(
            cfg.experiments[1].color_blind,
            Some(ColorBlind::Profile(ColorBlindProfile::Deuteranomaly))
        );
    }

    #[test]
    fn test_malformed_text_fails_fast() {
        let raw = ExperimentsInput::from("[{\"name\": ");
        let err = resolve(Some(&raw), &EffectiveConfig::default(), Status::Prompted).unwrap_err();
        assert!(matches!(err, LabError::MalformedConfig(_)));
    }

    #[test]
    fn test_invalid_field_rejected() {
        let raw = ExperimentsInput::from(r#"[{"name":"A","description":"","fontSize":-3}]"#);
        let err = resolve(Some(&raw), &EffectiveConfig::default(), Status::Inactive).unwrap_err();
        assert!(matches!(err, LabError::InvalidExperiment { .. }));
    }

    #[test]
    fn test_structured_replaces_list_only() {
        let current = EffectiveConfig {
            experiments: default_experiments(),
            host_tag: "my-widget".to_string(),
        };
        let raw = ExperimentsInput::from(vec![Experiment::new("X", "")]);
        let cfg = resolved(resolve(Some(&raw), &current, Status::Finished).unwrap());
        assert_eq!(cfg.experiments, vec![Experiment::new("X", "")]);
        assert_eq!(cfg.host_tag, "my-widget");
    }

    #[test]
    fn test_refused_while_active() {
        let raw = ExperimentsInput::from("not even json");
        let r = resolve(Some(&raw), &EffectiveConfig::default(), Status::Active).unwrap();
        assert_eq!(r, Resolution::Refused);
    }

    #[test]
    fn test_prop_truthiness() {
        assert!(PropValue::Bool(true).truthy());
        assert!(PropValue::Text(String::new()).truthy());
        assert!(PropValue::Text("true".into()).truthy());
        assert!(!PropValue::Text("false".into()).truthy());
        assert!(!PropValue::Text("0".into()).truthy());
        assert!(!PropValue::Bool(false).truthy());
    }
}
