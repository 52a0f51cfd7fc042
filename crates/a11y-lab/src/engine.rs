//! The experiment lifecycle state machine.
//!
//! ```text
//! inactive ──prompt──▶ prompted ──start──▶ active ──next (last)──▶ finished
//!                         ▲                  │ ▲                       │
//!                         │                  └─┘ next                  │
//!                         └──────────────────── prompt ◀───────────────┘
//! ```
//!
//! Every transition is synchronous. The engine exclusively owns the wrapper
//! subtree between wrap and unwrap, and always unwraps before wrapping
//! within the same call.

use std::time::Duration;

use serde::Serialize;

use crate::config::{
    resolve, EffectiveConfig, ExperimentsInput, PropValue, Resolution, CONFIG_LOCKED_MESSAGE,
};
use crate::effects;
use crate::export::{export, ExportFormat};
use crate::notify::{
    ManualScheduler, Notification, NotificationCenter, NotificationId, NotificationTiming,
    Scheduler, TimerEvent,
};
use crate::page::Page;
use crate::types::{Experiment, LabError, LabResult, RunRecord, Status, Verdict};
use crate::wrapper::ContentWrapper;

/// Host-driven inputs, one per public operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetExperiments(ExperimentsInput),
    SetActive(PropValue),
    PromptBegin,
    Start(Option<ExperimentsInput>),
    Next(Verdict),
    UpdateNotes(String),
    Timer(TimerEvent),
}

/// Read-only view of the engine for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub status: Status,
    pub active: Option<RunRecord>,
    pub results: Vec<RunRecord>,
    pub notifications: Vec<Notification>,
    pub wrapped: bool,
}

pub struct ExperimentEngine<S: Scheduler> {
    status: Status,
    config: EffectiveConfig,
    declared: Option<ExperimentsInput>,
    active_prop: Option<PropValue>,
    active: Option<RunRecord>,
    cursor: usize,
    results: Vec<RunRecord>,
    page: Page,
    wrapper: ContentWrapper,
    notifications: NotificationCenter,
    scheduler: S,
}

impl<S: Scheduler> ExperimentEngine<S> {
    /// Create an inactive engine over `page`.
    pub fn new(page: Page, scheduler: S) -> Self {
        Self {
            status: Status::Inactive,
            config: EffectiveConfig::default(),
            declared: None,
            active_prop: None,
            active: None,
            cursor: 0,
            results: Vec::new(),
            page,
            wrapper: ContentWrapper::new(),
            notifications: NotificationCenter::default(),
            scheduler,
        }
    }

    /// Create an engine and apply the widget's declared properties the way
    /// an initial page load does. A malformed `experiments` attribute fails.
    pub fn load(page: Page, scheduler: S) -> LabResult<Self> {
        let props = page.props().clone();
        let mut engine = Self::new(page, scheduler);
        if let Some(experiments) = props.experiments {
            engine.set_experiments(experiments)?;
        }
        if let Some(active) = props.active {
            engine.set_active(active)?;
        }
        Ok(engine)
    }

    pub fn with_timing(mut self, timing: NotificationTiming) -> Self {
        self.notifications = NotificationCenter::new(timing);
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn active_record(&self) -> Option<&RunRecord> {
        self.active.as_ref()
    }

    pub fn results(&self) -> &[RunRecord] {
        &self.results
    }

    pub fn notifications(&self) -> &[Notification] {
        self.notifications.all()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapper.is_wrapped()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            status: self.status,
            active: self.active.clone(),
            results: self.results.clone(),
            notifications: self.notifications.all().to_vec(),
            wrapped: self.wrapper.is_wrapped(),
        }
    }

    /// Run one command and return the settled state.
    pub fn dispatch(&mut self, command: Command) -> LabResult<EngineSnapshot> {
        match command {
            Command::SetExperiments(input) => self.set_experiments(input)?,
            Command::SetActive(value) => self.set_active(value)?,
            Command::PromptBegin => self.prompt_begin()?,
            Command::Start(config) => self.start(config)?,
            Command::Next(verdict) => self.next(verdict)?,
            Command::UpdateNotes(text) => self.update_notes(text)?,
            Command::Timer(event) => self.handle_timer(event),
        }
        Ok(self.snapshot())
    }

    /// Raise an operator notification.
    pub fn notify(&mut self, message: impl Into<String>) -> NotificationId {
        self.notifications.raise(message, &mut self.scheduler)
    }

    pub fn handle_timer(&mut self, event: TimerEvent) {
        self.notifications.handle(event);
    }

    /// The `experiments` property changed. Refused with a notification
    /// while a run is active.
    pub fn set_experiments(&mut self, input: ExperimentsInput) -> LabResult<()> {
        match resolve(Some(&input), &self.config, self.status)? {
            Resolution::Refused => {
                self.notify(CONFIG_LOCKED_MESSAGE);
            }
            Resolution::Resolved(config) => {
                tracing::info!("Experiments updated ({} configured)", config.experiments.len());
                self.config = config;
                self.declared = Some(input);
            }
        }
        Ok(())
    }

    /// The `active` property changed. A truthy value on an inactive widget
    /// prompts the operator.
    pub fn set_active(&mut self, value: PropValue) -> LabResult<()> {
        let truthy = value.truthy();
        self.active_prop = Some(value);
        if truthy && self.status == Status::Inactive {
            self.prompt_begin()?;
        }
        Ok(())
    }

    pub fn active_prop(&self) -> Option<&PropValue> {
        self.active_prop.as_ref()
    }

    /// Tear down any wrapper and ask the operator to begin. Legal anywhere.
    pub fn prompt_begin(&mut self) -> LabResult<()> {
        self.wrapper.unwrap(self.page.document_mut())?;
        self.active = None;
        self.status = Status::Prompted;
        tracing::info!("Prompting to begin experiments");
        Ok(())
    }

    /// Resolve configuration and begin a run at the first experiment.
    pub fn start(&mut self, config: Option<ExperimentsInput>) -> LabResult<()> {
        match self.status {
            Status::Prompted => {}
            Status::Active => {
                self.notify(CONFIG_LOCKED_MESSAGE);
                return Ok(());
            }
            status => {
                return Err(LabError::InvalidTransition {
                    operation: "start experiments",
                    status,
                })
            }
        }

        let explicit = config.is_some();
        let input = config.or_else(|| self.declared.clone());
        let resolved = match resolve(input.as_ref(), &self.config, self.status)? {
            Resolution::Resolved(resolved) => resolved,
            Resolution::Refused => return Ok(()),
        };
        let Some(first) = resolved.experiments.first().cloned() else {
            return Err(LabError::EmptyExperimentList);
        };

        self.isolate(&first)?;
        if explicit {
            self.declared = input;
        }
        self.config = resolved;
        self.results.clear();
        self.cursor = 0;
        self.active = Some(RunRecord::new(0, first));
        self.status = Status::Active;
        tracing::info!("Started {} experiments", self.config.experiments.len());
        Ok(())
    }

    /// Record `verdict` for the active experiment and move on.
    pub fn next(&mut self, verdict: Verdict) -> LabResult<()> {
        let illegal = LabError::InvalidTransition {
            operation: "record a verdict",
            status: self.status,
        };
        if self.status != Status::Active {
            return Err(illegal);
        }
        let Some(mut record) = self.active.take() else {
            return Err(illegal);
        };
        record.results = Some(verdict);
        tracing::info!("Experiment {} '{}': {verdict:?}", record.index, record.experiment.name);
        self.results.push(record);

        self.cursor += 1;
        match self.config.experiments.get(self.cursor).cloned() {
            Some(experiment) => {
                self.active = Some(RunRecord::new(self.cursor, experiment.clone()));
                self.isolate(&experiment)?;
            }
            None => {
                self.status = Status::Finished;
                self.wrapper.unwrap(self.page.document_mut())?;
                tracing::info!("Experiments finished ({} results)", self.results.len());
            }
        }
        Ok(())
    }

    /// Replace the notes on the active experiment.
    pub fn update_notes(&mut self, text: impl Into<String>) -> LabResult<()> {
        let status = self.status;
        let record = self
            .active
            .as_mut()
            .filter(|_| status == Status::Active)
            .ok_or(LabError::InvalidTransition {
                operation: "update notes",
                status,
            })?;
        let text = text.into();
        record.notes = if text.is_empty() { None } else { Some(text) };
        Ok(())
    }

    /// Serialize the result log.
    pub fn export_results(&self, format: ExportFormat) -> LabResult<String> {
        if self.results.is_empty() {
            return Err(LabError::NothingToExport);
        }
        export(&self.results, format)
    }

    /// Wrap host content and apply `experiment`'s effects.
    fn isolate(&mut self, experiment: &Experiment) -> LabResult<()> {
        let host = self.page.host();
        let content = self.wrapper.wrap(self.page.document_mut(), host)?.content();
        if let Err(e) = effects::apply_all(self.page.document_mut(), content, experiment) {
            self.wrapper.unwrap(self.page.document_mut())?;
            return Err(e);
        }
        Ok(())
    }
}

impl ExperimentEngine<ManualScheduler> {
    /// Advance the virtual clock and apply the timers that fire.
    pub fn advance(&mut self, by: Duration) {
        for event in self.scheduler.advance(by) {
            self.notifications.handle(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorBlind, ColorBlindProfile};

    const PAGE: &str = "<html><head></head><body>\
        <header>Site</header><main><p>Body text</p></main>\
        <a11y-lab></a11y-lab><footer>Foot</footer></body></html>";

    fn engine() -> ExperimentEngine<ManualScheduler> {
        let page = Page::load(PAGE, "a11y-lab").unwrap();
        ExperimentEngine::new(page, ManualScheduler::new())
    }

    fn two() -> Vec<Experiment> {
        vec![
            Experiment::new("A", "").with_font_size(16.0),
            Experiment::new("B", "").with_font_size(18.0),
        ]
    }

    fn started(list: Vec<Experiment>) -> ExperimentEngine<ManualScheduler> {
        let mut e = engine();
        e.prompt_begin().unwrap();
        e.start(Some(list.into())).unwrap();
        e
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut e = engine();
        e.set_experiments(ExperimentsInput::from(
            r#"[{"name":"A","description":"","fontSize":16},{"name":"B","description":"","fontSize":18}]"#,
        ))
        .unwrap();
        e.prompt_begin().unwrap();
        e.start(None).unwrap();
        assert_eq!(e.status(), Status::Active);
        assert_eq!(e.active_record().unwrap().index, 0);
        assert!(e.page().to_html().contains("font-size: 16px;"));

        e.next(Verdict::Fail).unwrap();
        assert_eq!(e.active_record().unwrap().index, 1);
        assert_eq!(e.results().len(), 1);
        assert_eq!(e.results()[0].experiment.name, "A");
        assert_eq!(e.results()[0].results, Some(Verdict::Fail));
        assert!(e.page().to_html().contains("font-size: 18px;"));
        assert!(!e.page().to_html().contains("font-size: 16px;"));

        e.next(Verdict::Pass).unwrap();
        assert_eq!(e.status(), Status::Finished);
        let names: Vec<_> = e.results().iter().map(|r| r.experiment.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(e.results()[1].results, Some(Verdict::Pass));
        assert!(!e.is_wrapped());
        assert_eq!(e.page().to_html(), Page::load(PAGE, "a11y-lab").unwrap().to_html());
    }

    #[test]
    fn test_n_verdicts_finish_in_order() {
        for n in 1..=5 {
            let list: Vec<Experiment> = (0..n)
                .map(|i| Experiment::new(format!("E{i}"), "").with_font_size(10.0 + i as f64))
                .collect();
            let mut e = started(list);
            for i in 0..n {
                assert_eq!(e.status(), Status::Active);
                e.next(if i % 2 == 0 { Verdict::Pass } else { Verdict::Fail }).unwrap();
            }
            assert_eq!(e.status(), Status::Finished);
            assert_eq!(e.results().len(), n);
            for (i, r) in e.results().iter().enumerate() {
                assert_eq!(r.index, i);
                assert_eq!(r.experiment.name, format!("E{i}"));
            }
        }
    }

    #[test]
    fn test_config_change_while_active_is_refused() {
        let mut e = started(two());
        let before = e.config().clone();

        e.set_experiments(ExperimentsInput::from(vec![Experiment::new("X", "")]))
            .unwrap();
        assert_eq!(e.config(), &before);
        assert_eq!(e.notifications().len(), 1);
        assert_eq!(e.notifications()[0].message, CONFIG_LOCKED_MESSAGE);

        // Malformed text is not even parsed while locked.
        e.set_experiments(ExperimentsInput::from("{{{")).unwrap();
        assert_eq!(e.notifications().len(), 2);

        e.start(Some(vec![Experiment::new("Y", "")].into())).unwrap();
        assert_eq!(e.notifications().len(), 3);
        assert_eq!(e.config(), &before);
        assert_eq!(e.status(), Status::Active);
    }

    #[test]
    fn test_notes_attach_to_their_experiment() {
        let mut e = started(vec![
            Experiment::new("A", ""),
            Experiment::new("B", ""),
            Experiment::new("C", ""),
        ]);
        e.update_notes("draft").unwrap();
        e.update_notes("menu overlaps").unwrap();
        assert!(e.results().is_empty());
        e.next(Verdict::Fail).unwrap();
        e.next(Verdict::Pass).unwrap();
        e.update_notes("fine").unwrap();
        e.next(Verdict::Pass).unwrap();

        assert_eq!(e.results()[0].notes.as_deref(), Some("menu overlaps"));
        assert_eq!(e.results()[1].notes, None);
        assert_eq!(e.results()[2].notes.as_deref(), Some("fine"));
    }

    #[test]
    fn test_notes_outside_active_rejected() {
        let mut e = engine();
        assert!(matches!(
            e.update_notes("x"),
            Err(LabError::InvalidTransition { status: Status::Inactive, .. })
        ));
    }

    #[test]
    fn test_empty_list_is_a_configuration_error() {
        let mut e = engine();
        e.prompt_begin().unwrap();
        let err = e.start(Some(ExperimentsInput::from("[]"))).unwrap_err();
        assert!(matches!(err, LabError::EmptyExperimentList));
        assert_eq!(e.status(), Status::Prompted);
        assert!(!e.is_wrapped());
    }

    #[test]
    fn test_malformed_config_never_activates() {
        let mut e = engine();
        e.prompt_begin().unwrap();
        let err = e.start(Some(ExperimentsInput::from("[{"))).unwrap_err();
        assert!(matches!(err, LabError::MalformedConfig(_)));
        assert_eq!(e.status(), Status::Prompted);
        assert!(e.active_record().is_none());
    }

    #[test]
    fn test_start_requires_prompt() {
        let mut e = engine();
        assert!(matches!(
            e.start(None),
            Err(LabError::InvalidTransition { status: Status::Inactive, .. })
        ));
        let mut done = started(vec![Experiment::new("A", "")]);
        done.next(Verdict::Pass).unwrap();
        assert!(done.start(None).is_err());
        done.prompt_begin().unwrap();
        done.start(None).unwrap();
        assert_eq!(done.status(), Status::Active);
    }

    #[test]
    fn test_next_outside_active_rejected() {
        let mut e = engine();
        e.prompt_begin().unwrap();
        assert!(e.next(Verdict::Pass).is_err());
        assert!(e.results().is_empty());
    }

    #[test]
    fn test_restart_clears_results_and_prompt_keeps_them() {
        let mut e = started(vec![Experiment::new("A", "")]);
        e.next(Verdict::Fail).unwrap();
        e.prompt_begin().unwrap();
        assert_eq!(e.results().len(), 1);
        e.start(None).unwrap();
        assert!(e.results().is_empty());
    }

    #[test]
    fn test_prompt_mid_run_tears_down_wrapper() {
        let mut e = started(two());
        assert!(e.is_wrapped());
        e.prompt_begin().unwrap();
        assert!(!e.is_wrapped());
        assert_eq!(e.status(), Status::Prompted);
        assert!(!e.page().to_html().contains("font-size"));
    }

    #[test]
    fn test_export_rules() {
        let mut e = started(two());
        assert!(matches!(
            e.export_results(ExportFormat::Json),
            Err(LabError::NothingToExport)
        ));
        e.next(Verdict::Fail).unwrap();
        e.next(Verdict::Pass).unwrap();
        let a = e.export_results(ExportFormat::Json).unwrap();
        let b = e.export_results(ExportFormat::Json).unwrap();
        assert_eq!(a, b);
        assert_eq!(e.status(), Status::Finished);
        assert!(a.contains("\"results\": \"fail\""));
    }

    #[test]
    fn test_notification_timing_through_engine() {
        let mut e = started(two());
        e.set_experiments(ExperimentsInput::from(Vec::<Experiment>::new()))
            .unwrap();
        let id = e.notifications()[0].id;

        e.advance(Duration::from_millis(5000));
        assert!(!e.notifications().iter().find(|n| n.id == id).unwrap().visible);
        e.advance(Duration::from_millis(500));
        assert!(e.notifications().is_empty());
    }

    #[test]
    fn test_load_with_active_attribute_prompts() {
        let page = Page::load(
            r#"<body><p>x</p><a11y-lab active experiments='[{"name":"K","description":"","keyboardOnly":true}]'></a11y-lab></body>"#,
            "a11y-lab",
        )
        .unwrap();
        let mut e = ExperimentEngine::load(page, ManualScheduler::new()).unwrap();
        assert_eq!(e.status(), Status::Prompted);
        e.start(None).unwrap();
        assert_eq!(e.active_record().unwrap().experiment.name, "K");
        assert!(e.page().to_html().contains("pointer-events: none;"));
    }

    #[test]
    fn test_load_with_malformed_attribute_fails() {
        let page = Page::load(
            r#"<body><a11y-lab active experiments="[oops"></a11y-lab></body>"#,
            "a11y-lab",
        )
        .unwrap();
        assert!(ExperimentEngine::load(page, ManualScheduler::new()).is_err());
    }

    #[test]
    fn test_inactive_attribute_stays_inactive() {
        let page = Page::load(r#"<body><a11y-lab active="false"></a11y-lab></body>"#, "a11y-lab")
            .unwrap();
        let e = ExperimentEngine::load(page, ManualScheduler::new()).unwrap();
        assert_eq!(e.status(), Status::Inactive);
    }

    #[test]
    fn test_dispatch_snapshot() {
        let mut e = engine();
        e.dispatch(Command::PromptBegin).unwrap();
        let snap = e
            .dispatch(Command::Start(Some(
                vec![Experiment::new("C", "").with_color_blind(ColorBlind::Profile(
                    ColorBlindProfile::Deuteranomaly,
                ))]
                .into(),
            )))
            .unwrap();
        assert_eq!(snap.status, Status::Active);
        assert!(snap.wrapped);
        assert!(e.page().to_html().contains("backdrop-filter"));

        e.dispatch(Command::UpdateNotes("red/green unclear".into())).unwrap();
        let snap = e.dispatch(Command::Next(Verdict::Fail)).unwrap();
        assert_eq!(snap.status, Status::Finished);
        assert_eq!(snap.results[0].notes.as_deref(), Some("red/green unclear"));
        assert!(!snap.wrapped);

        let id = e.notify("hello");
        let snap = e.dispatch(Command::Timer(TimerEvent::Remove(id))).unwrap();
        assert!(snap.notifications.is_empty());
    }
}
