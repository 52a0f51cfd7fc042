//! a11y-lab operator CLI entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use a11y_lab::config::default_experiments;
use a11y_lab::{ExportFormat, NotificationTiming, Verdict};

use a11y_lab_cli::config::{load_experiments, resolve_experiments_input, resolve_experiments_path};
use a11y_lab_cli::session::{inject_page, render_preview, LabSessionManager};
use a11y_lab_cli::types::{SessionError, SessionResult};

#[derive(Parser)]
#[command(
    name = "a11y-lab",
    about = "Run accessibility experiments against HTML pages and collect pass/fail verdicts",
    version
)]
struct Cli {
    /// Path to an experiments JSON file.
    /// Also reads from A11Y_LAB_EXPERIMENTS, then ./.a11y-lab/experiments.json.
    #[arg(short, long, global = true)]
    experiments: Option<String>,

    /// Tag name of the widget element in host pages.
    #[arg(long, default_value = "a11y-lab", global = true)]
    tag: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive operator REPL (default).
    Repl {
        /// Host page to load on startup.
        page: Option<PathBuf>,
    },

    /// Run every experiment with scripted verdicts and print the export.
    Run {
        /// Host page containing the widget.
        page: PathBuf,

        /// One verdict per experiment, in order.
        #[arg(long, value_delimiter = ',', required = true)]
        verdicts: Vec<Verdict>,

        /// Export format (json, md).
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// Write the export here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the page with one experiment applied.
    Preview {
        /// Host page containing the widget.
        page: PathBuf,

        /// Zero-based experiment index.
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Output HTML file.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Inject the widget and its script into an HTML page.
    Inject {
        /// Page to inject into.
        input: PathBuf,

        /// Output HTML file.
        #[arg(short, long)]
        output: PathBuf,

        /// URL of the widget script.
        #[arg(long)]
        script: String,

        /// Mark the widget active so the operator is prompted on load.
        #[arg(long)]
        active: bool,
    },

    /// Resolve the experiment list and print it.
    Validate,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   a11y-lab completions bash > ~/.local/share/bash-completion/completions/a11y-lab
    ///   a11y-lab completions zsh > ~/.zfunc/_a11y-lab
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Repl { page: None }) {
        Commands::Repl { page } => {
            a11y_lab_cli::repl::run(
                page.map(|p| p.display().to_string()),
                cli.experiments,
                &cli.tag,
            )?;
        }

        Commands::Run {
            page,
            verdicts,
            format,
            output,
        } => exit_on_error(run_scripted(
            &page,
            &cli.tag,
            cli.experiments.as_deref(),
            &verdicts,
            format,
            output,
        )),

        Commands::Preview {
            page,
            index,
            output,
        } => exit_on_error(preview(
            &page,
            &cli.tag,
            cli.experiments.as_deref(),
            index,
            &output,
        )),

        Commands::Inject {
            input,
            output,
            script,
            active,
        } => exit_on_error(
            experiment_list(cli.experiments.as_deref()).and_then(|experiments| {
                inject_page(&input, &output, &script, &cli.tag, &experiments, active)
            }),
        ),

        Commands::Validate => exit_on_error(validate(cli.experiments.as_deref())),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "a11y-lab", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn exit_on_error(result: SessionResult<()>) {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run_scripted(
    page: &std::path::Path,
    host_tag: &str,
    experiments: Option<&str>,
    verdicts: &[Verdict],
    format: ExportFormat,
    output: Option<PathBuf>,
) -> SessionResult<()> {
    let input = resolve_experiments_input(experiments)?;
    let mut session = LabSessionManager::open(page, host_tag, input, NotificationTiming::default())?;
    session.run_scripted(verdicts)?;
    match output {
        Some(out) => {
            let path = session.export_to(format, Some(&out))?;
            eprintln!("Exported results to {}", path.display());
        }
        None => println!("{}", session.engine().export_results(format)?),
    }
    Ok(())
}

fn preview(
    page: &std::path::Path,
    host_tag: &str,
    experiments: Option<&str>,
    index: usize,
    output: &std::path::Path,
) -> SessionResult<()> {
    if !page.exists() {
        return Err(SessionError::PageNotFound(page.display().to_string()));
    }
    let input = resolve_experiments_input(experiments)?;
    let html = render_preview(page, host_tag, input, index)?;
    std::fs::write(output, html)?;
    eprintln!("Wrote preview of experiment {index} to {}", output.display());
    Ok(())
}

fn experiment_list(experiments: Option<&str>) -> SessionResult<Vec<a11y_lab::Experiment>> {
    match resolve_experiments_path(experiments) {
        Some(path) => load_experiments(&path),
        None => Ok(default_experiments()),
    }
}

fn validate(experiments: Option<&str>) -> SessionResult<()> {
    let source = resolve_experiments_path(experiments)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());
    let list = experiment_list(experiments)?;
    if list.is_empty() {
        return Err(a11y_lab::LabError::EmptyExperimentList.into());
    }
    println!("Valid experiments: {source}");
    println!("  Count: {}", list.len());
    for (i, exp) in list.iter().enumerate() {
        let mut effects = Vec::new();
        if let Some(px) = exp.font_size {
            effects.push(format!("font {px}px"));
        }
        if exp.color_blind.is_some() {
            effects.push("color filter".to_string());
        }
        if exp.keyboard_only == Some(true) {
            effects.push("keyboard only".to_string());
        }
        println!("  {:>2}. {} [{}]", i + 1, exp.name, effects.join(", "));
    }
    Ok(())
}
