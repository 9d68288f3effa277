//! reconcile - compute and submit index settings patches from files.
//!
//! The baseline file stands in for the cluster's reported settings and the
//! output file for the update-settings request body.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use settings_reconciler::diff::{protected_fields_in, scrub};
use settings_reconciler::policy::{FieldPolicy, PolicyConfig};
use settings_reconciler::reconcile::{
    compute_patch, stripped_notice, ConfigSink, ConfigSource, SettingsUpdate, SourceError,
    Workflow,
};
use settings_reconciler::value::{self, Value};

#[derive(Debug, Parser)]
#[command(name = "reconcile", version)]
#[command(about = "Compute minimal index settings patches")]
struct Cli {
    /// Policy file (YAML or JSON) listing protected keys
    #[arg(short, long, global = true)]
    policy: Option<PathBuf>,

    /// Output location. Use '-' for stdout
    #[arg(short, long, global = true, default_value = "-")]
    output: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the patch between a baseline and a candidate document
    Diff {
        #[arg(long)]
        baseline: PathBuf,
        #[arg(long)]
        candidate: PathBuf,
        /// Index name used to unwrap `{index: {settings: {index: ...}}}`
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Strip protected keys from a document
    Scrub { file: PathBuf },
    /// Run a full fetch, edit, apply cycle and write the request body
    Apply {
        #[arg(short, long)]
        target: String,
        #[arg(long)]
        baseline: PathBuf,
        #[arg(long)]
        candidate: PathBuf,
    },
    /// List protected keys, or the protected keys present in a document
    Protected { file: Option<PathBuf> },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RECONCILE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> Result<()> {
    let policy = match &cli.policy {
        Some(path) => PolicyConfig::load(path)?.into_policy(),
        None => FieldPolicy::default(),
    };

    match cli.command {
        Command::Diff {
            baseline,
            candidate,
            target,
        } => {
            let mut output = open_output(&cli.output)?;
            diff(&policy, &baseline, &candidate, target.as_deref(), &mut output)
        }
        Command::Scrub { file } => {
            let mut output = open_output(&cli.output)?;
            scrub_file(&policy, &file, &mut output)
        }
        Command::Apply {
            target,
            baseline,
            candidate,
        } => apply(policy, &target, baseline, &candidate, cli.output),
        Command::Protected { file } => {
            let mut output = open_output(&cli.output)?;
            protected(&policy, file.as_deref(), &mut output)
        }
    }
}

fn open_output(location: &str) -> Result<Box<dyn Write>> {
    if location == "-" {
        return Ok(Box::new(io::stdout()));
    }
    let file = fs::File::create(location)
        .with_context(|| format!("failed to create output file {:?}", location))?;
    Ok(Box::new(file))
}

fn read_document(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read file {:?}", path))?;
    parse_document(path, &content)
}

fn parse_document(path: &Path, content: &str) -> Result<Value> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        value::from_yaml(content).with_context(|| format!("failed to parse {:?}", path))
    } else {
        value::from_json(content).with_context(|| format!("failed to parse {:?}", path))
    }
}

fn write_json(output: &mut dyn Write, document: &Value) -> Result<()> {
    writeln!(output, "{}", value::to_json_pretty(document)?)?;
    Ok(())
}

fn diff(
    policy: &FieldPolicy,
    baseline: &Path,
    candidate: &Path,
    target: Option<&str>,
    output: &mut dyn Write,
) -> Result<()> {
    let baseline = read_document(baseline)?;
    let candidate = read_document(candidate)?;

    let result = compute_patch(&candidate, Some(&baseline), target.unwrap_or_default(), policy)?;
    if let Some(notice) = stripped_notice(&result.removed) {
        eprintln!("{}", notice);
    }
    write_json(output, &result.filtered)
}

fn scrub_file(policy: &FieldPolicy, file: &Path, output: &mut dyn Write) -> Result<()> {
    let document = read_document(file)?;
    let result = scrub(&document, policy);
    if !result.removed.is_empty() {
        eprintln!("Removed: {}", result.removed.join(", "));
    }
    write_json(output, &result.filtered)
}

fn protected(policy: &FieldPolicy, file: Option<&Path>, output: &mut dyn Write) -> Result<()> {
    match file {
        None => {
            for key in policy.protected_keys() {
                writeln!(output, "{}", key)?;
            }
        }
        Some(file) => {
            let document = read_document(file)?;
            for key in protected_fields_in(&document, policy) {
                writeln!(output, "{}", key)?;
            }
        }
    }
    Ok(())
}

/// Serves the baseline file as the cluster's settings for any index.
struct FileSource {
    path: PathBuf,
}

impl ConfigSource for FileSource {
    fn fetch_settings(&self, _target: &str) -> Result<Value, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                SourceError::not_found(format!("{}: {}", self.path.display(), e))
            }
            io::ErrorKind::PermissionDenied => {
                SourceError::unauthorized(format!("{}: {}", self.path.display(), e))
            }
            _ => SourceError::other(format!("{}: {}", self.path.display(), e)),
        })?;
        parse_document(&self.path, &content).map_err(|e| SourceError::other(format!("{:#}", e)))
    }
}

/// Writes the update-settings request body instead of sending it.
struct FileSink {
    location: String,
}

impl ConfigSink for FileSink {
    fn apply_settings(&self, target: &str, patch: &Value) -> Result<(), SourceError> {
        let body = SettingsUpdate::new(patch.clone()).body();
        let write = || -> Result<()> {
            let mut output = open_output(&self.location)?;
            writeln!(output, "PUT /{}/_settings", target)?;
            write_json(&mut output, &body)
        };
        write().map_err(|e| SourceError::other(format!("{:#}", e)))
    }
}

fn apply(
    policy: FieldPolicy,
    target: &str,
    baseline: PathBuf,
    candidate: &Path,
    output: String,
) -> Result<()> {
    let text = fs::read_to_string(candidate)
        .with_context(|| format!("failed to read file {:?}", candidate))?;

    let source = FileSource { path: baseline };
    let sink = FileSink { location: output };
    let mut workflow = Workflow::new(policy, source, sink);

    workflow.fetch(target)?;
    workflow.edit(text)?;
    let outcome = workflow.apply()?;

    eprintln!("{}", outcome.message());
    for path in outcome.changed_paths() {
        eprintln!("  ~ {}", path);
    }
    Ok(())
}
