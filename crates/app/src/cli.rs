use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use overtype_core::RunId;

pub const USAGE: &str = "\
usage:
  overtype list <file.pdf> [--zoom Z] [--page N]
  overtype edit <file.pdf> --set <id>=<text> ... [--out <path>]";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List {
        pdf: PathBuf,
        zoom: Option<f64>,
        page: Option<u32>,
    },
    Edit {
        pdf: PathBuf,
        edits: Vec<(RunId, String)>,
        out: Option<PathBuf>,
    },
    Help,
}

pub fn parse_args(args: impl IntoIterator<Item = OsString>) -> anyhow::Result<Command> {
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    let mut pdf: Option<PathBuf> = None;
    let mut zoom: Option<f64> = None;
    let mut page: Option<u32> = None;
    let mut edits = Vec::new();
    let mut out: Option<PathBuf> = None;

    let command = command.to_string_lossy().to_string();
    if matches!(command.as_str(), "-h" | "--help" | "help") {
        return Ok(Command::Help);
    }

    while let Some(arg) = args.next() {
        let arg_str = arg.to_string_lossy();
        match arg_str.as_ref() {
            "--zoom" if command == "list" => {
                let value = args.next().context("missing value for --zoom")?;
                let value_str = value.to_string_lossy();
                zoom = Some(
                    value_str
                        .parse::<f64>()
                        .with_context(|| format!("invalid --zoom value: {value_str}"))?,
                );
            }
            "--page" if command == "list" => {
                let value = args.next().context("missing value for --page")?;
                let value_str = value.to_string_lossy();
                page = Some(
                    value_str
                        .parse::<u32>()
                        .with_context(|| format!("invalid --page value: {value_str}"))?,
                );
            }
            "--set" if command == "edit" => {
                let value = args.next().context("missing value for --set")?;
                let value_str = value.to_string_lossy();
                let (id, text) = value_str
                    .split_once('=')
                    .with_context(|| format!("--set expects <id>=<text>, got: {value_str}"))?;
                edits.push((RunId::from(id.trim()), text.to_string()));
            }
            "--out" if command == "edit" => {
                let value = args.next().context("missing value for --out")?;
                out = Some(PathBuf::from(value));
            }
            other if other.starts_with("--") => anyhow::bail!("unknown arg: {other}"),
            _ if pdf.is_none() => pdf = Some(PathBuf::from(&arg)),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    let pdf = pdf.context("missing <file.pdf>")?;
    match command.as_str() {
        "list" => Ok(Command::List { pdf, zoom, page }),
        "edit" => Ok(Command::Edit { pdf, edits, out }),
        other => anyhow::bail!("unknown command: {other}"),
    }
}

/// `edited-<stem>.pdf` beside the input.
pub fn default_output_path(pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    pdf.with_file_name(format!("edited-{stem}.pdf"))
}
