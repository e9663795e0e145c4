use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use clap::Parser;
use hhsav_core::crash::{CRASH_LOG_FILE_NAME, install_panic_hook, mark_crash_seen, pending_crash_prompt};
use hhsav_core::ui_queue::UiQueue;
use hhsav_core::{
    DocPath, EditOutcome, EditorConfig, EditorSession, EditorSurface, MemorySurface, SaveDocument,
    TreePath,
};
use hhsav_render::{
    render_outcome_json, render_outcome_text, render_search_json, render_search_text,
    render_selection_view, render_tree_json, render_tree_text, tree_rows,
};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Separates a sequence path from a group name in `--select`.
const GROUP_SEPARATOR: char = '@';

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(value_name = "SAVE.hhsav")]
    path: Option<PathBuf>,
    /// Node to edit, as `Bank/accounts/0`; `Network/hosts@router` selects a group.
    #[arg(long, value_name = "PATH")]
    select: Option<String>,
    /// Replacement text for the selected node, read from FILE or `-` for stdin.
    #[arg(long, value_name = "FILE|-", requires = "select")]
    apply: Option<String>,
    /// Validate the replacement without committing it.
    #[arg(long, requires = "apply")]
    live: bool,
    #[arg(long = "auto-fix", requires = "apply", conflicts_with = "continue_anyway")]
    auto_fix: bool,
    #[arg(long = "continue", requires = "apply")]
    continue_anyway: bool,
    /// Write the document as pretty JSON.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write the document as a gzipped `.hhsav`.
    #[arg(long)]
    export: Option<PathBuf>,
    #[arg(long)]
    tree: bool,
    #[arg(long, value_name = "QUERY")]
    find: Option<String>,
    #[arg(long)]
    json: bool,
    /// Disable every field-lock policy.
    #[arg(long)]
    unlocked: bool,
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn needs_save(&self) -> bool {
        self.select.is_some()
            || self.output.is_some()
            || self.export.is_some()
            || self.tree
            || self.find.is_some()
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let config = EditorConfig::from_env()
        .with_log_dir(cli.log_dir.clone())
        .with_unlocked(cli.unlocked);
    install_panic_hook(config.log_dir.clone());
    report_previous_crash(&config);

    let Some(save_path) = cli.path.as_ref() else {
        if cli.needs_save() {
            eprintln!("a save path is required for --select, --output, --export, --tree and --find");
            process::exit(2);
        }
        println!("No save loaded.");
        return;
    };

    let document = SaveDocument::open(save_path).unwrap_or_else(|e| {
        eprintln!("Error opening save file: {}", save_path.display());
        eprintln!("  {e}");
        process::exit(1);
    });
    let mut session = EditorSession::new(document, config.lock_engine(), config.diagnostic_log());
    let mut report = JsonMap::new();
    let mut rejected = false;

    if let Some(raw) = cli.select.as_deref() {
        let path = parse_tree_path(raw, session.document().root());
        let mut surface = MemorySurface::default();
        session.select(path.clone(), &mut surface).unwrap_or_else(|e| {
            eprintln!("Error selecting {raw}: {e}");
            process::exit(1);
        });

        if let Some(source) = cli.apply.as_deref() {
            let text = read_replacement(source).unwrap_or_else(|e| {
                eprintln!("Error reading replacement from {source}: {e}");
                process::exit(1);
            });
            surface.set_text_buffer(&text);
            let outcomes = run_edit(&cli, &mut session, &mut surface);
            rejected = outcomes.last().is_some_and(is_rejection);
            if cli.json {
                report.insert(
                    "outcomes".to_string(),
                    JsonValue::Array(outcomes.iter().map(render_outcome_json).collect()),
                );
                report.insert(
                    "status".to_string(),
                    surface
                        .status()
                        .map_or(JsonValue::Null, |s| JsonValue::String(s.to_string())),
                );
                report.insert("buffer".to_string(), JsonValue::String(surface.text_buffer()));
            } else {
                for outcome in &outcomes {
                    print!("{}", render_outcome_text(outcome));
                }
                if let Some(status) = surface.status() {
                    println!("status: {status}");
                }
            }
        } else if cli.json {
            let buffer = session.document().render_selection(&path).unwrap_or_else(|e| {
                eprintln!("Error rendering {raw}: {e}");
                process::exit(1);
            });
            report.insert("selection".to_string(), JsonValue::String(path.label()));
            report.insert("editable".to_string(), JsonValue::Bool(path.is_editable()));
            report.insert("buffer".to_string(), JsonValue::String(buffer));
        } else {
            let view = render_selection_view(session.document(), &path, session.engine())
                .unwrap_or_else(|e| {
                    eprintln!("Error rendering {raw}: {e}");
                    process::exit(1);
                });
            print!("{view}");
        }
    }

    if cli.tree || (cli.select.is_none() && cli.find.is_none() && !has_writes(&cli)) {
        let rows = tree_rows(session.document().root(), session.engine());
        if cli.json {
            report.insert("tree".to_string(), render_tree_json(&rows));
        } else {
            print!("{}", render_tree_text(&rows));
        }
    }

    if let Some(query) = cli.find.as_deref() {
        let hits = session.find(query);
        if cli.json {
            report.insert("find".to_string(), render_search_json(&hits));
        } else {
            print!("{}", render_search_text(&hits));
        }
    }

    if !rejected {
        let written = write_outputs(&cli, &session);
        if cli.json {
            if !written.is_empty() {
                report.insert(
                    "written".to_string(),
                    JsonValue::Array(
                        written
                            .iter()
                            .map(|p| JsonValue::String(p.display().to_string()))
                            .collect(),
                    ),
                );
            }
        } else {
            for out_path in &written {
                println!("Wrote {}", out_path.display());
            }
        }
    } else if has_writes(&cli) {
        eprintln!("Edit was not committed; nothing written.");
    }

    if cli.json {
        let rendered = serde_json::to_string_pretty(&JsonValue::Object(report)).unwrap_or_else(|e| {
            eprintln!("Error rendering JSON output: {e}");
            process::exit(1);
        });
        println!("{rendered}");
    }

    if rejected {
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Tells the user once about a crash logged by an earlier run.
fn report_previous_crash(config: &EditorConfig) {
    let Some(signature) = pending_crash_prompt(&config.log_dir, config.crash_prompt_disabled) else {
        return;
    };
    eprintln!(
        "The previous session crashed. Details are in {}",
        config.log_dir.join(CRASH_LOG_FILE_NAME).display()
    );
    if let Err(e) = mark_crash_seen(&config.log_dir, &signature) {
        warn!(error = %e, "failed to record crash prompt state");
    }
}

fn has_writes(cli: &Cli) -> bool {
    cli.output.is_some() || cli.export.is_some()
}

/// Writes `--output` and `--export` on a helper thread.
///
/// The helper works on a snapshot of the document and reports each file back
/// through the UI queue; the main thread drains it once the helper is done.
fn write_outputs(cli: &Cli, session: &EditorSession) -> Vec<PathBuf> {
    let jobs: Vec<(PathBuf, bool)> = cli
        .output
        .iter()
        .map(|p| (p.clone(), false))
        .chain(cli.export.iter().map(|p| (p.clone(), true)))
        .collect();
    if jobs.is_empty() {
        return Vec::new();
    }

    let queue: UiQueue<Vec<Result<PathBuf, String>>> = UiQueue::new();
    let handle = queue.handle();
    let document = SaveDocument::new(session.document().snapshot());
    let writer = thread::spawn(move || {
        for (path, gzip) in jobs {
            let result = if gzip {
                document.export_save(&path)
            } else {
                document.save_json(&path)
            };
            let report = result
                .map(|()| path.clone())
                .map_err(|e| format!("Error writing {}: {e}", path.display()));
            if let Err(e) = handle.schedule(move |results| results.push(report), false) {
                warn!(error = %e, "dropping write report");
                break;
            }
        }
    });
    if writer.join().is_err() {
        eprintln!("Error writing output: writer thread panicked");
        process::exit(1);
    }

    let mut results = Vec::new();
    let ran = queue.run_pending(&mut results);
    debug!(ran, "write reports drained");
    results
        .into_iter()
        .map(|result| {
            result.unwrap_or_else(|message| {
                eprintln!("{message}");
                process::exit(1);
            })
        })
        .collect()
}

fn parse_tree_path(raw: &str, root: &JsonValue) -> TreePath {
    match raw.rsplit_once(GROUP_SEPARATOR) {
        Some((parent, name)) if !name.is_empty() => TreePath::Group {
            parent: DocPath::parse_slash(parent, root),
            name: name.to_string(),
        },
        _ => TreePath::Node(DocPath::parse_slash(raw, root)),
    }
}

fn read_replacement(source: &str) -> io::Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    fs::read_to_string(Path::new(source))
}

/// Runs the intake once, then the popover button the flags ask for.
///
/// `--continue` dismisses the warning and re-applies so the accepted buffer or
/// the armed lock override goes through.
fn run_edit(cli: &Cli, session: &mut EditorSession, surface: &mut MemorySurface) -> Vec<EditOutcome> {
    let first = if cli.live {
        session.live_validate(surface)
    } else {
        session.apply_edit(surface)
    };
    let mut outcomes = vec![first];
    if !session.has_pending_fix() {
        return outcomes;
    }
    if cli.auto_fix {
        outcomes.push(session.auto_fix(surface));
    } else if cli.continue_anyway {
        outcomes.push(session.continue_anyway(surface));
        if !cli.live {
            outcomes.push(session.apply_edit(surface));
        }
    }
    debug!(count = outcomes.len(), "edit outcomes");
    outcomes
}

fn is_rejection(outcome: &EditOutcome) -> bool {
    matches!(
        outcome,
        EditOutcome::ParseError { .. }
            | EditOutcome::SemanticViolation { .. }
            | EditOutcome::LockWarning { .. }
            | EditOutcome::LockRestored { .. }
            | EditOutcome::NotEditable { .. }
    )
}
