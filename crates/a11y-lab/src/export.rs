//! Result log serialization.

use crate::types::{ColorBlind, Experiment, LabResult, RunRecord, Verdict};

/// Output format for [`export`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
}

impl std::str::FromStr for ExportFormat {
    type Err = crate::types::LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            other => Err(crate::types::LabError::InvalidInput(format!(
                "unknown export format '{other}', expected 'json' or 'markdown'"
            ))),
        }
    }
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

/// Serialize the ordered result log. Pure: the same log always yields the
/// same text.
pub fn export(log: &[RunRecord], format: ExportFormat) -> LabResult<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(log)?),
        ExportFormat::Markdown => Ok(to_markdown(log)),
    }
}

fn to_markdown(log: &[RunRecord]) -> String {
    let mut out = String::from(
        "| # | Experiment | Description | Options | Result | Notes |\n|---|---|---|---|---|---|\n",
    );
    for record in log {
        let result = match record.results {
            Some(Verdict::Pass) => "pass",
            Some(Verdict::Fail) => "fail",
            None => "",
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            record.index + 1,
            escape_cell(&record.experiment.name),
            escape_cell(&record.experiment.description),
            escape_cell(&describe_options(&record.experiment)),
            result,
            escape_cell(record.notes.as_deref().unwrap_or("")),
        ));
    }
    out
}

/// `font 16px, deuteranomaly, keyboard only`.
fn describe_options(experiment: &Experiment) -> String {
    let mut options = Vec::new();
    if let Some(px) = experiment.font_size {
        options.push(format!("font {px}px"));
    }
    match &experiment.color_blind {
        Some(ColorBlind::Profile(profile)) => options.push(profile.as_str().to_string()),
        Some(ColorBlind::Matrix(_)) => options.push("custom color matrix".to_string()),
        None => {}
    }
    if experiment.keyboard_only == Some(true) {
        options.push("keyboard only".to_string());
    }
    options.join(", ")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}
