//! Core data types for experiments, run records, and errors.

use serde::{Deserialize, Serialize};

/// A 3×3 linear color transform, row-major.
pub type Matrix3 = [[f64; 3]; 3];

/// One accessibility perturbation to run against the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub name: String,
    /// Commonmark text shown to the operator.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_blind: Option<ColorBlind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard_only: Option<bool>,
}

impl Experiment {
    /// Build an experiment with no effects.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            font_size: None,
            color_blind: None,
            keyboard_only: None,
        }
    }

    pub fn with_font_size(mut self, px: f64) -> Self {
        self.font_size = Some(px);
        self
    }

    pub fn with_color_blind(mut self, color_blind: ColorBlind) -> Self {
        self.color_blind = Some(color_blind);
        self
    }

    pub fn with_keyboard_only(mut self, keyboard_only: bool) -> Self {
        self.keyboard_only = Some(keyboard_only);
        self
    }

    /// Check the field ranges a configuration must satisfy.
    pub fn validate(&self) -> LabResult<()> {
        if self.name.trim().is_empty() {
            return Err(LabError::InvalidExperiment {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }
        if let Some(px) = self.font_size {
            if !px.is_finite() || px <= 0.0 {
                return Err(LabError::InvalidExperiment {
                    name: self.name.clone(),
                    reason: format!("fontSize must be a positive number, got {px}"),
                });
            }
        }
        if let Some(ColorBlind::Matrix(m)) = &self.color_blind {
            if m.iter().flatten().any(|v| !(0.0..=1.0).contains(v)) {
                return Err(LabError::InvalidExperiment {
                    name: self.name.clone(),
                    reason: "colorBlind matrix values must lie in [0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A color-blindness simulation: a named profile or a literal matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorBlind {
    Profile(ColorBlindProfile),
    Matrix(Matrix3),
}

/// The named color-vision deficiencies with built-in matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBlindProfile {
    Protanopia,
    Protanomaly,
    Deuteranopia,
    Deuteranomaly,
    Tritanopia,
    Tritanomaly,
    Achromatopsia,
    Achromatomaly,
}

impl ColorBlindProfile {
    pub const ALL: [ColorBlindProfile; 8] = [
        ColorBlindProfile::Protanopia,
        ColorBlindProfile::Protanomaly,
        ColorBlindProfile::Deuteranopia,
        ColorBlindProfile::Deuteranomaly,
        ColorBlindProfile::Tritanopia,
        ColorBlindProfile::Tritanomaly,
        ColorBlindProfile::Achromatopsia,
        ColorBlindProfile::Achromatomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorBlindProfile::Protanopia => "protanopia",
            ColorBlindProfile::Protanomaly => "protanomaly",
            ColorBlindProfile::Deuteranopia => "deuteranopia",
            ColorBlindProfile::Deuteranomaly => "deuteranomaly",
            ColorBlindProfile::Tritanopia => "tritanopia",
            ColorBlindProfile::Tritanomaly => "tritanomaly",
            ColorBlindProfile::Achromatopsia => "achromatopsia",
            ColorBlindProfile::Achromatomaly => "achromatomaly",
        }
    }
}

/// Operator verdict for one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl std::str::FromStr for Verdict {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" | "p" => Ok(Verdict::Pass),
            "fail" | "f" => Ok(Verdict::Fail),
            other => Err(LabError::InvalidInput(format!(
                "unknown verdict '{other}', expected 'pass' or 'fail'"
            ))),
        }
    }
}

/// An experiment as it runs, with its position and verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub index: usize,
    #[serde(flatten)]
    pub experiment: Experiment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RunRecord {
    pub fn new(index: usize, experiment: Experiment) -> Self {
        Self {
            index,
            experiment,
            results: None,
            notes: None,
        }
    }
}

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Inactive,
    Prompted,
    Active,
    Finished,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Inactive => "inactive",
            Status::Prompted => "prompted",
            Status::Active => "active",
            Status::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in the experiment engine.
#[derive(thiserror::Error, Debug)]
pub enum LabError {
    #[error("Malformed experiment configuration: {0}")]
    MalformedConfig(String),

    #[error("Invalid experiment '{name}': {reason}")]
    InvalidExperiment { name: String, reason: String },

    #[error("Cannot start experiments: the experiment list is empty")]
    EmptyExperimentList,

    #[error("Cannot {operation} while {status}")]
    InvalidTransition {
        operation: &'static str,
        status: Status,
    },

    #[error("No results to export")]
    NothingToExport,

    #[error("Widget host <{0}> not found in document")]
    HostNotFound(String),

    #[error("DOM error: {0}")]
    Dom(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type LabResult<T> = Result<T, LabError>;
