//! Effect appliers: presentation changes made to the wrapper's content node.
//!
//! Each applier is idempotent and touches a single CSS property, so an
//! experiment may combine several effects. Clearing properties between
//! experiments is left to the wrapper teardown.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::dom::{Document, NodeId};
use crate::types::{ColorBlind, ColorBlindProfile, Experiment, LabResult, Matrix3};

/// `id` of the generated SVG filter.
pub const COLOR_BLIND_FILTER_ID: &str = "a11y-lab-color-blind";

/// Row appended to every color matrix so alpha passes through unchanged.
pub const ALPHA_ROW: [f64; 5] = [0.0, 0.0, 0.0, 1.0, 0.0];

/// Built-in matrix for a named profile.
pub fn profile_matrix(profile: ColorBlindProfile) -> Matrix3 {
    match profile {
        ColorBlindProfile::Protanopia => [
            [0.567, 0.433, 0.0],
            [0.558, 0.442, 0.0],
            [0.0, 0.242, 0.758],
        ],
        ColorBlindProfile::Protanomaly => [
            [0.817, 0.183, 0.0],
            [0.333, 0.667, 0.0],
            [0.0, 0.125, 0.875],
        ],
        ColorBlindProfile::Deuteranopia => [
            [0.625, 0.375, 0.0],
            [0.7, 0.3, 0.0],
            [0.0, 0.3, 0.7],
        ],
        ColorBlindProfile::Deuteranomaly => [
            [0.8, 0.2, 0.0],
            [0.258, 0.742, 0.0],
            [0.0, 0.142, 0.858],
        ],
        ColorBlindProfile::Tritanopia => [
            [0.95, 0.05, 0.0],
            [0.0, 0.433, 0.567],
            [0.0, 0.475, 0.525],
        ],
        ColorBlindProfile::Tritanomaly => [
            [0.967, 0.033, 0.0],
            [0.0, 0.733, 0.267],
            [0.0, 0.183, 0.817],
        ],
        ColorBlindProfile::Achromatopsia => [
            [0.299, 0.587, 0.114],
            [0.299, 0.587, 0.114],
            [0.299, 0.587, 0.114],
        ],
        ColorBlindProfile::Achromatomaly => [
            [0.618, 0.32, 0.062],
            [0.163, 0.775, 0.062],
            [0.163, 0.32, 0.516],
        ],
    }
}

/// Resolve a profile name or pass a literal matrix through unchanged.
pub fn resolve_matrix(color_blind: &ColorBlind) -> Matrix3 {
    match color_blind {
        ColorBlind::Profile(profile) => profile_matrix(*profile),
        ColorBlind::Matrix(matrix) => *matrix,
    }
}

/// The `values` of an `feColorMatrix`: each RGB row padded with zero alpha
/// and offset columns, then [`ALPHA_ROW`].
pub fn color_matrix_values(matrix: &Matrix3) -> String {
    matrix
        .iter()
        .map(|row| [row[0], row[1], row[2], 0.0, 0.0])
        .chain(std::iter::once(ALPHA_ROW))
        .map(|row| {
            row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Inline SVG document holding the color-matrix filter.
pub fn filter_svg(matrix: &Matrix3) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\"><filter id=\"{COLOR_BLIND_FILTER_ID}\">\
         <feColorMatrix type=\"matrix\" values=\"{}\"/></filter></svg>",
        color_matrix_values(matrix)
    )
}

/// CSS `backdrop-filter` value referencing the inline filter.
pub fn backdrop_filter_value(matrix: &Matrix3) -> String {
    format!(
        "url(\"data:image/svg+xml;base64,{}#{COLOR_BLIND_FILTER_ID}\")",
        STANDARD.encode(filter_svg(matrix))
    )
}

pub fn apply_font_size(doc: &mut Document, content: NodeId, px: f64) -> LabResult<()> {
    doc.style_set(content, "font-size", &format!("{px}px"))
}

pub fn apply_keyboard_only(doc: &mut Document, content: NodeId) -> LabResult<()> {
    doc.style_set(content, "pointer-events", "none")
}

pub fn apply_color_blind(
    doc: &mut Document,
    content: NodeId,
    color_blind: &ColorBlind,
) -> LabResult<()> {
    let matrix = resolve_matrix(color_blind);
    doc.style_set(content, "backdrop-filter", &backdrop_filter_value(&matrix))
}

/// Apply every effect present on `experiment`.
pub fn apply_all(doc: &mut Document, content: NodeId, experiment: &Experiment) -> LabResult<()> {
    if let Some(px) = experiment.font_size {
        apply_font_size(doc, content, px)?;
    }
    if experiment.keyboard_only == Some(true) {
        apply_keyboard_only(doc, content)?;
    }
    if let Some(color_blind) = &experiment.color_blind {
        apply_color_blind(doc, content, color_blind)?;
    }
    tracing::debug!("Applied effects for '{}'", experiment.name);
    Ok(())
}
