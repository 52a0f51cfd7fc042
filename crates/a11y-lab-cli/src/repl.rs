//! Interactive operator REPL.
//!
//! Launch with `a11y-lab repl page.html` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.

use std::path::{Path, PathBuf};

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use a11y_lab::{
    Command, EngineSnapshot, ExportFormat, NotificationId, NotificationTiming, RunRecord, Status,
    Verdict,
};

use crate::config::{load_experiments_input, resolve_experiments_input};
use crate::session::LabSessionManager;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/load", "Load a host page (.html)"),
    ("/experiments", "List experiments, or load them from a .json file"),
    ("/prompt", "Ask the operator to begin"),
    ("/start", "Start the experiments"),
    ("/pass", "Record a pass and move on"),
    ("/fail", "Record a failure and move on"),
    ("/notes", "Set notes on the current experiment"),
    ("/status", "Show the current experiment and progress"),
    ("/notifications", "Show visible notifications"),
    ("/export", "Export results (json|md) [file]"),
    ("/save", "Write the current page HTML to a file"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
#[derive(Default)]
struct LabHelper;

fn files_with_extension(ext: &str) -> Vec<String> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(".") {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == ext) {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    files.push(name.to_string());
                }
            }
        }
    }
    files.sort();
    files
}

impl Completer for LabHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let args = if parts.len() > 1 { parts[1] } else { "" };

        let candidates = match cmd {
            "/load" | "/save" => files_with_extension("html"),
            "/experiments" => files_with_extension("json"),
            "/export" if !args.contains(' ') => vec!["json".to_string(), "md".to_string()],
            _ => return Ok((pos, Vec::new())),
        };

        let prefix_start = input.len() - args.len();
        let matches: Vec<Pair> = candidates
            .iter()
            .filter(|f| f.starts_with(args.trim()))
            .map(|f| Pair {
                display: f.clone(),
                replacement: format!("{f} "),
            })
            .collect();
        Ok((prefix_start, matches))
    }
}

impl Hinter for LabHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for LabHelper {}
impl Validator for LabHelper {}
impl Helper for LabHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Session state.
struct ReplState {
    session: Option<LabSessionManager>,
    experiments: Option<String>,
    host_tag: String,
    /// Highest notification id already printed.
    seen: NotificationId,
}

/// Run the interactive REPL. Must be called from within a tokio runtime so
/// notification timers can fire.
pub fn run(page: Option<String>, experiments: Option<String>, host_tag: &str) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1ma11y-lab v{}\x1b[0m \x1b[90maccessibility experiments\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<LabHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(LabHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = PathBuf::from(&home).join(".a11y_lab_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState {
        session: None,
        experiments,
        host_tag: host_tag.to_string(),
        seen: 0,
    };
    if let Some(page) = page {
        cmd_load(&page, &mut state);
    }

    loop {
        let prompt = match state.session.as_ref().map(|s| s.engine().status()) {
            Some(status) => format!(" \x1b[36ma11y[{status}]>\x1b[0m "),
            None => " \x1b[36ma11y>\x1b[0m ".to_string(),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                if let Some(session) = state.session.as_mut() {
                    session.pump_timers();
                }

                let mut parts = input.splitn(2, ' ');
                let cmd = parts.next().unwrap_or("");
                let args = parts.next().unwrap_or("").trim();

                match cmd {
                    "exit" | "quit" => {
                        eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                        break;
                    }
                    "help" | "h" | "?" => cmd_help(),
                    "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
                    "load" => cmd_load(args, &mut state),
                    "experiments" => cmd_experiments(args, &mut state),
                    "prompt" => cmd_dispatch(&mut state, Command::PromptBegin),
                    "start" => cmd_start(args, &mut state),
                    "pass" => cmd_dispatch(&mut state, Command::Next(Verdict::Pass)),
                    "fail" => cmd_dispatch(&mut state, Command::Next(Verdict::Fail)),
                    "notes" => cmd_dispatch(&mut state, Command::UpdateNotes(args.to_string())),
                    "status" => cmd_status(&state),
                    "notifications" => cmd_notifications(&state),
                    "export" => cmd_export(args, &state),
                    "save" => cmd_save(args, &state),
                    _ => {
                        eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                    }
                }

                print_new_notifications(&mut state);
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(Path::new(".")));
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completion works for commands, .html and .json files.");
    eprintln!();
}

fn session_or_warn(state: &ReplState) -> Option<&LabSessionManager> {
    if state.session.is_none() {
        eprintln!("  No page loaded. Use /load <page.html> first.");
    }
    state.session.as_ref()
}

fn cmd_load(args: &str, state: &mut ReplState) {
    if args.is_empty() {
        eprintln!("  Usage: /load <page.html>");
        return;
    }
    let path = PathBuf::from(args.split_whitespace().next().unwrap_or(args));
    let experiments = match resolve_experiments_input(state.experiments.as_deref()) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("  Cannot read experiments: {e}");
            return;
        }
    };

    match LabSessionManager::open(&path, &state.host_tag, experiments, NotificationTiming::default())
    {
        Ok(session) => {
            eprintln!(
                "  Loaded: {} ({} experiments, {})",
                path.display(),
                session.engine().config().experiments.len(),
                session.engine().status()
            );
            state.session = Some(session);
            state.seen = 0;
        }
        Err(e) => {
            eprintln!("  Failed to load: {e}");
        }
    }
}

fn cmd_experiments(args: &str, state: &mut ReplState) {
    if !args.is_empty() {
        let path = PathBuf::from(args);
        let input = match load_experiments_input(&path) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("  Cannot read experiments: {e}");
                return;
            }
        };
        state.experiments = Some(args.to_string());
        if state.session.is_some() {
            cmd_dispatch(state, Command::SetExperiments(input));
        }
    }

    let Some(session) = session_or_warn(state) else {
        return;
    };
    let config = session.engine().config();
    eprintln!();
    eprintln!("  {} experiments:", config.experiments.len());
    for (i, exp) in config.experiments.iter().enumerate() {
        eprintln!("    {:>2}. {:<28} {}", i + 1, exp.name, exp.description);
    }
    eprintln!();
}

fn cmd_start(args: &str, state: &mut ReplState) {
    let input = if args.is_empty() {
        None
    } else {
        match load_experiments_input(Path::new(args)) {
            Ok(input) => Some(input),
            Err(e) => {
                eprintln!("  Cannot read experiments: {e}");
                return;
            }
        }
    };
    let Some(session) = state.session.as_mut() else {
        eprintln!("  No page loaded. Use /load <page.html> first.");
        return;
    };
    match session.begin(input) {
        Ok(snapshot) => print_snapshot(&snapshot),
        Err(e) => eprintln!("  Cannot start: {e}"),
    }
}

fn cmd_dispatch(state: &mut ReplState, command: Command) {
    let Some(session) = state.session.as_mut() else {
        eprintln!("  No page loaded. Use /load <page.html> first.");
        return;
    };
    match session.dispatch(command) {
        Ok(snapshot) => print_snapshot(&snapshot),
        Err(e) => eprintln!("  {e}"),
    }
}

fn cmd_status(state: &ReplState) {
    let Some(session) = session_or_warn(state) else {
        return;
    };
    eprintln!();
    eprintln!("  Page:    {}", session.page_path().display());
    print_snapshot(&session.engine().snapshot());
    for record in session.engine().results() {
        eprintln!("    {}", describe_record(record));
    }
    eprintln!();
}

fn cmd_notifications(state: &ReplState) {
    let Some(session) = session_or_warn(state) else {
        return;
    };
    let visible: Vec<_> = session
        .engine()
        .notifications()
        .iter()
        .filter(|n| n.visible)
        .collect();
    if visible.is_empty() {
        eprintln!("  No visible notifications.");
    }
    for n in visible {
        eprintln!("  \x1b[33m!\x1b[0m {}", n.message);
    }
}

fn cmd_export(args: &str, state: &ReplState) {
    let Some(session) = session_or_warn(state) else {
        return;
    };
    let mut parts = args.split_whitespace();
    let format = match parts.next().map(str::parse::<ExportFormat>).transpose() {
        Ok(format) => format.unwrap_or_default(),
        Err(e) => {
            eprintln!("  {e}");
            return;
        }
    };
    let out = parts.next().map(PathBuf::from);
    match session.export_to(format, out.as_deref()) {
        Ok(path) => eprintln!("  Exported results to {}", path.display()),
        Err(e) => eprintln!("  Export failed: {e}"),
    }
}

fn cmd_save(args: &str, state: &ReplState) {
    if args.is_empty() {
        eprintln!("  Usage: /save <out.html>");
        return;
    }
    let Some(session) = session_or_warn(state) else {
        return;
    };
    match session.save_page(Path::new(args)) {
        Ok(()) => eprintln!("  Saved page to {args}"),
        Err(e) => eprintln!("  Save failed: {e}"),
    }
}

fn print_snapshot(snapshot: &EngineSnapshot) {
    match (&snapshot.status, &snapshot.active) {
        (Status::Active, Some(record)) => {
            eprintln!("  Status:  active");
            eprintln!(
                "  Now:     #{} {} \x1b[90m{}\x1b[0m",
                record.index + 1,
                record.experiment.name,
                record.experiment.description
            );
            if let Some(notes) = &record.notes {
                eprintln!("  Notes:   {notes}");
            }
        }
        (Status::Prompted, _) => {
            eprintln!("  Status:  prompted. Use /start to begin.");
        }
        (Status::Finished, _) => {
            eprintln!(
                "  Status:  finished ({} results). Use /export to save them.",
                snapshot.results.len()
            );
        }
        (status, _) => eprintln!("  Status:  {status}"),
    }
}

fn describe_record(record: &RunRecord) -> String {
    let verdict = match record.results {
        Some(Verdict::Pass) => "\x1b[32mpass\x1b[0m",
        Some(Verdict::Fail) => "\x1b[31mfail\x1b[0m",
        None => "-",
    };
    format!(
        "#{} {:<28} {verdict} {}",
        record.index + 1,
        record.experiment.name,
        record.notes.as_deref().unwrap_or("")
    )
}

fn print_new_notifications(state: &mut ReplState) {
    let Some(session) = state.session.as_ref() else {
        return;
    };
    for n in session.engine().notifications() {
        if n.id > state.seen {
            eprintln!("  \x1b[33m!\x1b[0m {}", n.message);
            state.seen = n.id;
        }
    }
}
