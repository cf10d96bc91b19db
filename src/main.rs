//! featpress CLI binary entry point.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use featpress::error::PressError;
use featpress::ingest::read_log_file;
use featpress::narrative::parse_narrative;
use featpress::project::project;
use featpress::render::{render_package, RenderOptions};
use featpress::resolve::resolve;
use featpress::store::Store;

/// Typeset living documentation from test-run event logs.
#[derive(Parser)]
#[command(name = "featpress")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level for diagnostics on stderr
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Typeset an event log and a narrative into a LaTeX article.
    Typeset {
        /// Path to the NDJSON event log
        #[arg(long)]
        log: PathBuf,

        /// Path to the markdown narrative document
        #[arg(long)]
        narrative: PathBuf,

        /// Output path (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Document title
        #[arg(long, default_value = "Documentation Package")]
        title: String,

        /// Document author for the PDF metadata
        #[arg(long)]
        author: Option<String>,

        /// Document subject for the PDF metadata
        #[arg(long)]
        subject: Option<String>,

        /// Comma-separated keywords for the PDF metadata
        #[arg(long)]
        keywords: Option<String>,
    },

    /// Project an event log and print a denormalized root as JSON.
    Inspect {
        /// Path to the NDJSON event log
        #[arg(long)]
        log: PathBuf,

        /// Which root list to denormalize
        #[arg(long, value_enum, default_value = "documents")]
        root: Root,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Root {
    Documents,
    Sources,
    Pickles,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("featpress: {err}");
            let mut cause = std::error::Error::source(&err);
            while let Some(source) = cause {
                eprintln!("  caused by: {source}");
                cause = source.source();
            }
            ExitCode::from(err.exit_code().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(command: Command) -> Result<(), PressError> {
    match command {
        Command::Typeset {
            log,
            narrative,
            output,
            title,
            author,
            subject,
            keywords,
        } => {
            let options = RenderOptions {
                title,
                author,
                subject,
                keywords,
            };
            execute_typeset(&log, &narrative, output.as_deref(), &options)
        }
        Command::Inspect { log, root, pretty } => execute_inspect(&log, root, pretty),
    }
}

fn execute_typeset(
    log: &Path,
    narrative_path: &Path,
    output: Option<&Path>,
    options: &RenderOptions,
) -> Result<(), PressError> {
    let narrative_source =
        fs::read_to_string(narrative_path).map_err(|source| PressError::NarrativeIo {
            path: narrative_path.display().to_string(),
            source,
        })?;
    let narrative = parse_narrative(&narrative_source);
    debug!(blocks = narrative.len(), "narrative parsed");

    let store = project(read_log_file(log)?)?;
    let documents = resolve(&store.documents_root(), &store)?;

    match output {
        Some(path) => {
            let file = File::create(path).map_err(|source| PressError::OutputIo {
                path: path.display().to_string(),
                source,
            })?;
            let mut out = BufWriter::new(file);
            render_package(&narrative, &documents, options, &mut out)?;
            out.flush().map_err(|source| PressError::OutputIo {
                path: path.display().to_string(),
                source,
            })?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            render_package(&narrative, &documents, options, &mut out)?;
            let _ = out.flush();
        }
    }
    Ok(())
}

fn execute_inspect(log: &Path, root: Root, pretty: bool) -> Result<(), PressError> {
    let store = project(read_log_file(log)?)?;
    let entry = root_node(&store, root);
    let resolved = resolve(&entry, &store)?;
    let value = resolved
        .to_value()
        .expect("resolved trees contain no references");
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .expect("JSON values serialize");
    println!("{rendered}");
    Ok(())
}

fn root_node(store: &Store, root: Root) -> featpress::Node {
    match root {
        Root::Documents => store.documents_root(),
        Root::Sources => store.sources_root(),
        Root::Pickles => store.pickles_root(),
    }
}
