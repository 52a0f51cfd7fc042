//! Experiment session lifecycle: page I/O, timers, and exports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::sync::mpsc::UnboundedReceiver;

use a11y_lab::{
    inject, resolve, Command, EffectiveConfig, EngineSnapshot, Experiment, ExperimentEngine,
    ExperimentsInput, ExportFormat, Injection, LabError, NotificationTiming, Page, Resolution,
    Status, TimerEvent, Verdict,
};

use crate::scheduler::TokioScheduler;
use crate::types::{SessionError, SessionResult};

/// Drives one engine over one page on disk.
pub struct LabSessionManager {
    engine: ExperimentEngine<TokioScheduler>,
    timers: UnboundedReceiver<TimerEvent>,
    page_path: PathBuf,
    opened_at: DateTime<Local>,
}

impl LabSessionManager {
    /// Load `page_path` and locate the widget. `experiments`, when given,
    /// replaces whatever the page declares.
    pub fn open(
        page_path: &Path,
        host_tag: &str,
        experiments: Option<ExperimentsInput>,
        timing: NotificationTiming,
    ) -> SessionResult<Self> {
        if !page_path.exists() {
            return Err(SessionError::PageNotFound(page_path.display().to_string()));
        }

        let page = Page::from_file(page_path, host_tag)?;
        let (scheduler, timers) = TokioScheduler::new()?;
        let mut engine = ExperimentEngine::load(page, scheduler)?.with_timing(timing);
        if let Some(input) = experiments {
            engine.set_experiments(input)?;
        }

        tracing::info!(
            "Opened {} ({} experiments, {})",
            page_path.display(),
            engine.config().experiments.len(),
            engine.status()
        );

        Ok(Self {
            engine,
            timers,
            page_path: page_path.to_path_buf(),
            opened_at: Local::now(),
        })
    }

    pub fn engine(&self) -> &ExperimentEngine<TokioScheduler> {
        &self.engine
    }

    pub fn page_path(&self) -> &Path {
        &self.page_path
    }

    pub fn opened_at(&self) -> DateTime<Local> {
        self.opened_at
    }

    /// Apply every notification timer that has fired. Returns how many.
    pub fn pump_timers(&mut self) -> usize {
        let mut fired = 0;
        while let Ok(event) = self.timers.try_recv() {
            self.engine.handle_timer(event);
            fired += 1;
        }
        fired
    }

    /// Run one engine command after catching up on timers.
    pub fn dispatch(&mut self, command: Command) -> SessionResult<EngineSnapshot> {
        self.pump_timers();
        Ok(self.engine.dispatch(command)?)
    }

    /// Prompt if needed, then start a run.
    pub fn begin(&mut self, experiments: Option<ExperimentsInput>) -> SessionResult<EngineSnapshot> {
        if !matches!(self.engine.status(), Status::Prompted | Status::Active) {
            self.dispatch(Command::PromptBegin)?;
        }
        self.dispatch(Command::Start(experiments))
    }

    /// Record verdicts in order until the run finishes. Refused while a run
    /// is already in progress; a count mismatch tears the new run down.
    pub fn run_scripted(&mut self, verdicts: &[Verdict]) -> SessionResult<EngineSnapshot> {
        if self.engine.status() == Status::Active {
            return Err(SessionError::InvalidArgs(
                "a run is already in progress".to_string(),
            ));
        }
        let mut snapshot = self.begin(None)?;
        let total = self.engine.config().experiments.len();
        if verdicts.len() != total {
            self.dispatch(Command::PromptBegin)?;
            return Err(SessionError::InvalidArgs(format!(
                "{} verdicts given for {total} experiments",
                verdicts.len()
            )));
        }
        for verdict in verdicts {
            snapshot = self.dispatch(Command::Next(*verdict))?;
        }
        Ok(snapshot)
    }

    /// Current page HTML, including any live wrapper and effects.
    pub fn page_html(&self) -> String {
        self.engine.page().to_html()
    }

    /// Write the current page HTML to `out`.
    pub fn save_page(&self, out: &Path) -> SessionResult<()> {
        write_creating_dirs(out, &self.page_html())?;
        tracing::info!("Saved page to {}", out.display());
        Ok(())
    }

    /// Export results to `out`, or to a timestamped file next to the page.
    pub fn export_to(&self, format: ExportFormat, out: Option<&Path>) -> SessionResult<PathBuf> {
        let text = self.engine.export_results(format)?;
        let path = match out {
            Some(p) => p.to_path_buf(),
            None => self.default_export_path(format),
        };
        write_creating_dirs(&path, &text)?;
        tracing::info!("Exported {} results to {}", self.engine.results().len(), path.display());
        Ok(path)
    }

    fn default_export_path(&self, format: ExportFormat) -> PathBuf {
        let stem = self
            .page_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("page");
        let name = format!(
            "{stem}-a11y-results-{}.{}",
            self.opened_at.format("%Y%m%d-%H%M%S"),
            format.extension()
        );
        self.page_path
            .parent()
            .map(|dir| dir.join(&name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

/// Render `page_path` with experiment `index` wrapped and applied, without
/// starting a run.
pub fn render_preview(
    page_path: &Path,
    host_tag: &str,
    experiments: Option<ExperimentsInput>,
    index: usize,
) -> SessionResult<String> {
    let mut page = Page::from_file(page_path, host_tag)?;
    let input = experiments.or_else(|| page.props().experiments.clone());
    let experiments = match resolve(input.as_ref(), &EffectiveConfig::default(), Status::Inactive)? {
        Resolution::Resolved(config) => config.experiments,
        Resolution::Refused => return Err(SessionError::Runtime("configuration is locked".into())),
    };
    if experiments.is_empty() {
        return Err(LabError::EmptyExperimentList.into());
    }
    let experiment = experiments.get(index).ok_or_else(|| {
        SessionError::InvalidArgs(format!(
            "experiment index {index} out of range ({} configured)",
            experiments.len()
        ))
    })?;

    page.preview(experiment)?;
    Ok(page.to_html())
}

/// Splice the widget and its script into the page at `input` and write the
/// result to `output`.
pub fn inject_page(
    input: &Path,
    output: &Path,
    script_src: &str,
    host_tag: &str,
    experiments: &[Experiment],
    active: bool,
) -> SessionResult<()> {
    let html = std::fs::read_to_string(input)?;
    let mut injection = Injection::new(script_src)
        .with_attribute("experiments", serde_json::to_value(experiments).map_err(LabError::from)?);
    injection.tag = host_tag.to_string();
    if active {
        injection = injection.with_attribute("active", serde_json::Value::Bool(true));
    }
    write_creating_dirs(output, &inject(&html, &injection))?;
    tracing::info!(
        "Injected <{host_tag}> with {} experiments into {}",
        experiments.len(),
        output.display()
    );
    Ok(())
}

fn write_creating_dirs(path: &Path, contents: &str) -> SessionResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}
