mod cli;

use std::fs;
use std::path::Path;

use anyhow::Context as _;
use directories::ProjectDirs;
use overtype_application::{LoadOutcome, Session};
use overtype_core::viewport::{map_doc_to_viewport, run_rect};
use overtype_core::{RunId, Settings, Zoom};
use overtype_engine::{PdfParser, PdfWriter};
use overtype_storage::SettingsStore;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, USAGE, default_output_path, parse_args};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("OVERTYPE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run() -> anyhow::Result<()> {
    let command = parse_args(std::env::args_os().skip(1))?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let project_dirs =
        ProjectDirs::from("dev", "overtype", "overtype").context("resolve project dirs")?;
    let store = SettingsStore::in_dir(project_dirs.config_dir())?;
    let settings = store.load()?;

    match command {
        Command::List { pdf, zoom, page } => list(&pdf, zoom, page, settings),
        Command::Edit { pdf, edits, out } => {
            let out = out.unwrap_or_else(|| default_output_path(&pdf));
            edit(&pdf, &edits, &out, settings)
        }
        Command::Help => Ok(()),
    }
}

fn open_session(pdf: &Path, settings: Settings) -> anyhow::Result<Session<PdfParser>> {
    let bytes = fs::read(pdf).with_context(|| format!("read {}", pdf.display()))?;
    let session = Session::new(PdfParser::new(), settings);
    let outcome = session
        .load_document(bytes)
        .with_context(|| format!("load {}", pdf.display()))?;
    if let LoadOutcome::Loaded(report) = &outcome {
        for failure in &report.failed_pages {
            warn!(error = %failure, "page skipped");
        }
        info!(
            pages = report.page_count,
            runs = report.total_runs(),
            "extracted runs"
        );
    }
    Ok(session)
}

fn list(
    pdf: &Path,
    zoom: Option<f64>,
    page: Option<u32>,
    settings: Settings,
) -> anyhow::Result<()> {
    let zoom = zoom.map(Zoom::new).unwrap_or_else(|| settings.zoom());
    let session = open_session(pdf, settings)?;

    let runs = match page {
        Some(page) => {
            let mut cursor = session.page_cursor();
            cursor.seek(page);
            if cursor.current != page {
                warn!(requested = page, shown = cursor.current, "page out of range");
            }
            session.runs_for_page(cursor.current)
        }
        None => session.runs(),
    };
    for run in runs {
        let viewport = session
            .page_size(run.page_index)
            .map(|size| map_doc_to_viewport(&run, zoom, size.height));
        let line = json!({
            "id": run.id,
            "page": run.page_index,
            "text": run.text,
            "font_size": run.font_size,
            "doc": run_rect(&run),
            "viewport": viewport,
            "zoom": zoom.value(),
        });
        println!("{line}");
    }
    Ok(())
}

fn edit(
    pdf: &Path,
    edits: &[(RunId, String)],
    out: &Path,
    settings: Settings,
) -> anyhow::Result<()> {
    let session = open_session(pdf, settings)?;

    let mut unknown = Vec::new();
    for (id, text) in edits {
        if !session.set_run_text(id, text.as_str()) {
            warn!(run = %id, "no such run");
            unknown.push(id.clone());
        }
    }

    let reconstruction = session.reconstruct(&PdfWriter::new())?;
    fs::write(out, &reconstruction.bytes)
        .with_context(|| format!("write {}", out.display()))?;

    let report = &reconstruction.report;
    let summary = json!({
        "output": out.display().to_string(),
        "bytes": reconstruction.bytes.len(),
        "runs_drawn": report.runs_drawn,
        "runs_skipped": report.runs_skipped,
        "placeholders": report.placeholders,
        "failed": report.failed,
        "substituted_chars": report.substituted_chars,
        "unknown_edits": unknown,
    });
    println!("{summary}");
    Ok(())
}
