//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use a11y_lab::config::parse_experiments;
use a11y_lab::{Experiment, ExperimentsInput};

use crate::types::SessionResult;

/// Environment variable naming an experiments file.
pub const EXPERIMENTS_ENV: &str = "A11Y_LAB_EXPERIMENTS";

/// Project-local experiments file.
const LOCAL_EXPERIMENTS: &str = ".a11y-lab/experiments.json";

/// Resolve the experiments file path: flag, then env var, then the
/// project-local file. `None` means the built-in defaults apply.
pub fn resolve_experiments_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(EXPERIMENTS_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(LOCAL_EXPERIMENTS);
    if local.exists() {
        return Some(local);
    }

    None
}

/// Read an experiments file as the widget's textual `experiments` property.
pub fn load_experiments_input(path: &Path) -> SessionResult<ExperimentsInput> {
    let text = std::fs::read_to_string(path)?;
    tracing::debug!("Loaded experiments from {}", path.display());
    Ok(ExperimentsInput::Text(text))
}

/// Read and validate an experiments file.
pub fn load_experiments(path: &Path) -> SessionResult<Vec<Experiment>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_experiments(&text)?)
}

/// Resolve and read the experiments file, if any.
pub fn resolve_experiments_input(explicit: Option<&str>) -> SessionResult<Option<ExperimentsInput>> {
    resolve_experiments_path(explicit)
        .map(|path| load_experiments_input(&path))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            resolve_experiments_path(Some("custom.json")),
            Some(PathBuf::from("custom.json"))
        );
    }

    #[test]
    fn test_load_experiments_validates() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(&good, r#"[{"name":"A","description":"","fontSize":20}]"#).unwrap();
        assert_eq!(load_experiments(&good).unwrap()[0].font_size, Some(20.0));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"[{"name":"A"}"#).unwrap();
        assert!(load_experiments(&bad).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_experiments_input(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, crate::types::SessionError::Io(_)));
    }
}
