//! `bolnotes`: create, inspect, edit and export `.bol` outline documents.

mod settings;

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use bolnotes_core::{
    export_plain_text, AddPosition, BolnotesError, DestroyScope, Document, DocumentSnapshot,
    ErrorChain, ExportOptions, FieldId, FieldValue, Forest, Icon, Timestamp,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use flexi_logger::Logger;
use log::{debug, info};

use settings::{
    load_settings, save_settings, settings_file_path, validate_date_format, AppSettings,
};

#[derive(Debug, Parser)]
#[command(
    name = "bolnotes",
    about = "Command-line tooling for Bolnotes outline documents",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    /// Settings file to use instead of the per-user default.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new, empty document.
    New(NewArgs),

    /// Print the outline with topic paths.
    Show(ShowArgs),

    /// Add a topic.
    Add(AddArgs),

    /// Make a topic the last child of its previous sibling.
    Indent(TopicArgs),

    /// Move a topic out to follow its parent.
    Deindent(TopicArgs),

    /// Move a topic one position up in document order.
    Up(TopicArgs),

    /// Move a topic one position down in document order.
    Down(TopicArgs),

    /// Remove a topic and, unless told otherwise, its children.
    Remove(RemoveArgs),

    /// Write the outline as indented plain text.
    Export(ExportArgs),

    /// Show or change the saved settings.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct NewArgs {
    file: PathBuf,
    #[arg(long)]
    title: Option<String>,
    #[arg(long, default_value = "")]
    subtitle: String,
    /// Document date (RFC 3339); defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    date: Option<Timestamp>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    file: PathBuf,
    /// Emit the JSON snapshot instead of a listing.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct AddArgs {
    file: PathBuf,
    /// Add as the last child of this topic.
    #[arg(long, value_name = "PATH", conflicts_with = "after")]
    under: Option<TopicPath>,
    /// Add directly after this topic.
    #[arg(long, value_name = "PATH")]
    after: Option<TopicPath>,
    #[arg(long)]
    text: Option<String>,
    /// Date topic (RFC 3339).
    #[arg(long, value_parser = parse_timestamp, conflicts_with = "icon")]
    date: Option<Timestamp>,
    /// Icon topic, by name or index.
    #[arg(long, requires = "text")]
    icon: Option<Icon>,
    /// Blank separator.
    #[arg(long, conflicts_with_all = ["text", "date", "icon"])]
    blank: bool,
}

#[derive(Debug, Args)]
struct TopicArgs {
    file: PathBuf,
    path: TopicPath,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    file: PathBuf,
    path: TopicPath,
    /// Promote the children instead of removing them.
    #[arg(long)]
    keep_children: bool,
}

#[derive(Debug, Args)]
struct ExportArgs {
    file: PathBuf,
    /// Write to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long)]
    indent_width: Option<usize>,
    #[arg(long)]
    date_format: Option<String>,
    #[arg(long)]
    default_title: Option<String>,
}

/// Dot-separated, 1-based topic indices: `2.1` is the first child of the
/// second top-level topic.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TopicPath(Vec<usize>);

impl FromStr for TopicPath {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts = s
            .split('.')
            .map(|part| match part.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(format!("invalid topic path '{s}': expected e.g. 2.1")),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self(parts))
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        f.write_str(&parts.join("."))
    }
}

impl TopicPath {
    fn resolve(&self, forest: &Forest) -> Result<FieldId> {
        let mut current: Option<FieldId> = None;
        for &n in &self.0 {
            let next = match current {
                None => forest.roots().nth(n - 1),
                Some(parent) => forest.children(parent).nth(n - 1),
            };
            current = Some(next.with_context(|| format!("no topic at path {self}"))?);
        }
        current.with_context(|| format!("no topic at path {self}"))
    }
}

fn parse_timestamp(s: &str) -> std::result::Result<Timestamp, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Timestamp::from(dt.with_timezone(&Utc)))
        .map_err(|e| format!("invalid date '{s}': {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    let _logger = match Logger::try_with_str(level).and_then(|l| l.log_to_stderr().start()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };

    let stdout = io::stdout();
    match run(cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", error_chain(&err).report());
            if let Some(core) = err.downcast_ref::<BolnotesError>() {
                eprintln!("{}", core.root_cause().user_message());
            }
            ExitCode::FAILURE
        }
    }
}

/// Flattens an `anyhow` error and its causes into an [`ErrorChain`], the
/// outermost context on top.
fn error_chain(err: &anyhow::Error) -> ErrorChain {
    ErrorChain::from_source_chain(err.as_ref())
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let settings_path = cli.config.unwrap_or_else(settings_file_path);
    let settings = load_settings(&settings_path);
    debug!("settings loaded from {}", settings_path.display());

    match cli.command {
        Commands::New(args) => handle_new(args, &settings),
        Commands::Show(args) => handle_show(args, &settings, out),
        Commands::Add(args) => handle_add(args),
        Commands::Indent(args) => edit_topic(&args, Document::indent),
        Commands::Deindent(args) => edit_topic(&args, Document::deindent),
        Commands::Up(args) => edit_topic(&args, Document::move_up),
        Commands::Down(args) => edit_topic(&args, Document::move_down),
        Commands::Remove(args) => handle_remove(args),
        Commands::Export(args) => handle_export(args, &settings, out),
        Commands::Config(args) => handle_config(args, settings, &settings_path, out),
    }
}

fn open(file: &Path) -> Result<Document> {
    Ok(Document::read(file)?)
}

fn save(doc: &Document, file: &Path) -> Result<()> {
    Ok(doc.write(file)?)
}

fn handle_new(args: NewArgs, settings: &AppSettings) -> Result<()> {
    let NewArgs {
        file,
        title,
        subtitle,
        date,
    } = args;
    if file.exists() {
        bail!("{} already exists", file.display());
    }
    let title = title.unwrap_or_else(|| settings.default_title.clone());
    let doc = Document::new(title, subtitle, date.unwrap_or_else(Timestamp::now));
    save(&doc, &file)?;
    info!("created {}", file.display());
    Ok(())
}

fn handle_show(args: ShowArgs, settings: &AppSettings, out: &mut impl Write) -> Result<()> {
    let doc = open(&args.file)?;
    if args.json {
        let snapshot = DocumentSnapshot::capture(&doc)?;
        writeln!(out, "{}", snapshot.to_json()?)?;
        return Ok(());
    }

    writeln!(out, "{}", doc.title())?;
    if !doc.subtitle().is_empty() {
        writeln!(out, "{}", doc.subtitle())?;
    }
    writeln!(out, "{}", doc.date().format(&settings.date_format))?;
    let forest = doc.topics();
    list_topics(forest, forest.roots().collect(), "", 0, settings, out)
}

fn list_topics(
    forest: &Forest,
    ids: Vec<FieldId>,
    prefix: &str,
    depth: usize,
    settings: &AppSettings,
    out: &mut impl Write,
) -> Result<()> {
    for (i, id) in ids.into_iter().enumerate() {
        let path = format!("{prefix}{}", i + 1);
        let value = forest.value(id)?;
        let indent = " ".repeat(depth * settings.indent_width);
        let line = match value {
            FieldValue::Blank => "<blank>".to_string(),
            other => other.display_text(&settings.date_format),
        };
        writeln!(out, "{indent}{path}  {line}")?;
        let children: Vec<_> = forest.children(id).collect();
        list_topics(forest, children, &format!("{path}."), depth + 1, settings, out)?;
    }
    Ok(())
}

fn build_value(args: &AddArgs) -> Result<FieldValue> {
    let text = args.text.clone();
    let value = if args.blank {
        FieldValue::Blank
    } else if let Some(timestamp) = args.date {
        FieldValue::Date {
            text: text.unwrap_or_default(),
            timestamp,
        }
    } else if let Some(icon) = args.icon {
        FieldValue::icon(icon, text.unwrap_or_default())
    } else if let Some(text) = text {
        FieldValue::Text(text)
    } else {
        bail!("one of --text, --date, --icon or --blank is required");
    };
    Ok(value)
}

fn handle_add(args: AddArgs) -> Result<()> {
    let value = build_value(&args)?;
    let mut doc = open(&args.file)?;
    let id = doc.create_field(value);
    match (&args.under, &args.after) {
        (Some(path), _) => {
            let parent = path.resolve(doc.topics())?;
            doc.add_topic(parent, id, AddPosition::AsChild)?;
        }
        (None, Some(path)) => {
            let anchor = path.resolve(doc.topics())?;
            doc.add_topic(anchor, id, AddPosition::AsSibling)?;
        }
        (None, None) => doc.append_topic(id)?,
    }
    save(&doc, &args.file)?;
    info!("added topic {id} to {}", args.file.display());
    Ok(())
}

fn edit_topic(
    args: &TopicArgs,
    op: fn(&mut Document, FieldId) -> bolnotes_core::Result<()>,
) -> Result<()> {
    let mut doc = open(&args.file)?;
    let id = args.path.resolve(doc.topics())?;
    op(&mut doc, id).with_context(|| format!("cannot move topic {}", args.path))?;
    save(&doc, &args.file)
}

fn handle_remove(args: RemoveArgs) -> Result<()> {
    let mut doc = open(&args.file)?;
    let id = args.path.resolve(doc.topics())?;
    let scope = if args.keep_children {
        DestroyScope::promote_children()
    } else {
        DestroyScope::subtree()
    };
    let result = doc.destroy_topic(id, scope)?;
    save(&doc, &args.file)?;
    info!(
        "removed {} topic(s) from {}",
        result.destroyed_count,
        args.file.display()
    );
    Ok(())
}

fn handle_export(args: ExportArgs, settings: &AppSettings, out: &mut impl Write) -> Result<()> {
    let doc = open(&args.file)?;
    let options = ExportOptions {
        indent_width: settings.indent_width,
        date_format: settings.date_format.clone(),
    };
    let text = export_plain_text(&doc, &options)?;
    match args.output {
        Some(path) => fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => out.write_all(text.as_bytes())?,
    }
    Ok(())
}

fn handle_config(
    args: ConfigArgs,
    mut settings: AppSettings,
    path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let ConfigArgs {
        indent_width,
        date_format,
        default_title,
    } = args;
    let changed = indent_width.is_some() || date_format.is_some() || default_title.is_some();
    if let Some(width) = indent_width {
        settings.indent_width = width;
    }
    if let Some(format) = date_format {
        validate_date_format(&format)?;
        settings.date_format = format;
    }
    if let Some(title) = default_title {
        settings.default_title = title;
    }
    if changed {
        save_settings(&settings, path)?;
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&settings)?)?;
    Ok(())
}
