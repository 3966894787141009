//! Command-line interface.

use crate::error::{ErrorKind, Result};
use crate::hook::{self, HookRequest};
use crate::logging::LogFormat;
use clap::{ArgAction, Args, Parser, Subcommand};
use exn::ResultExt;
use intake_config::Config;
use intake_pipeline::{Admission, Finalizer, UploadRecord};
use intake_probe::Toolchain;
use intake_storage::{DiskUsage, SpaceGuard, format_bytes};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::AsyncReadExt;

/// Exit status of `admit` when the upload would be refused.
const EXIT_REJECTED: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "intake", version, about = "Finalize completed uploads into the archive")]
pub struct Cli {
    /// Configuration file. Defaults to `config.toml` in the platform config directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// More logging; repeat for trace output. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer an upload server hook; the event is read from stdin.
    #[command(subcommand)]
    Hook(HookCommand),
    /// Finalize a staged upload by hand.
    Finalize(FinalizeArgs),
    /// Check whether an upload of a given size would be admitted.
    Admit(AdmitArgs),
    /// Show the last recorded progress of an upload.
    Status {
        id: String,
    },
    /// Show disk usage of the archive and staging volumes.
    Disk,
    /// Check that ffprobe and ffmpeg are installed.
    Doctor,
    /// Print the effective configuration.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum HookCommand {
    /// Before an upload is created: admit or reject it.
    PreCreate,
    /// After an upload has finished: finalize it.
    PostFinish,
}
impl HookCommand {
    fn event_type(self) -> &'static str {
        match self {
            Self::PreCreate => "pre-create",
            Self::PostFinish => "post-finish",
        }
    }
}

#[derive(Debug, Args)]
pub struct FinalizeArgs {
    /// Upload identifier.
    #[arg(long)]
    pub id: String,
    /// Submitted metadata, e.g. `--meta displayname="Final Cut"`.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub metadata: Vec<(String, String)>,
    /// Staged file. Defaults to `<staging_dir>/<id>`.
    #[arg(long)]
    pub staging: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AdmitArgs {
    /// Declared upload size in bytes.
    #[arg(long)]
    pub size: u64,
}

fn parse_meta(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, found {raw:?}")),
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = intake_config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::Hook(command) => run_hook(config, command).await,
        Command::Finalize(args) => finalize(config, args).await,
        Command::Admit(args) => admit(config, args).await,
        Command::Status { id } => status(config, &id).await,
        Command::Disk => disk(&config).await,
        Command::Doctor => doctor(&config).await,
        Command::Config => print_json(&config),
    }
}

async fn run_hook(config: Config, command: HookCommand) -> Result<ExitCode> {
    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await.or_raise(|| ErrorKind::HookInput)?;
    let request: HookRequest = serde_json::from_slice(&input).or_raise(|| ErrorKind::HookInput)?;
    if !request.kind.is_empty() && request.kind != command.event_type() {
        tracing::warn!(expected = command.event_type(), received = %request.kind, "Hook event type mismatch");
    }
    let staging_dir = config.staging_dir();
    let finalizer = Finalizer::new(config).or_raise(|| ErrorKind::Setup)?;
    let response = match command {
        HookCommand::PreCreate => hook::pre_create(&finalizer, request).await,
        HookCommand::PostFinish => hook::post_finish(&finalizer, request, &staging_dir).await,
    };
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response).or_raise(|| ErrorKind::Output)?;
    writeln!(stdout).or_raise(|| ErrorKind::Output)?;
    Ok(ExitCode::SUCCESS)
}

async fn finalize(config: Config, args: FinalizeArgs) -> Result<ExitCode> {
    let staging_path = args.staging.unwrap_or_else(|| config.staging_dir().join(&args.id));
    let upload = UploadRecord {
        id: args.id,
        size: None,
        staging_path,
        metadata: args.metadata.into_iter().collect::<HashMap<_, _>>(),
    };
    let finalizer = Finalizer::new(config).or_raise(|| ErrorKind::Setup)?;
    let outcome = finalizer.finalize(upload).await.or_raise(|| ErrorKind::Finalize)?;
    print_json(&outcome)
}

#[derive(Debug, Serialize)]
struct AdmitReport {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

async fn admit(config: Config, args: AdmitArgs) -> Result<ExitCode> {
    let finalizer = Finalizer::new(config).or_raise(|| ErrorKind::Setup)?;
    let report = match finalizer.admit(Some(args.size)).await {
        Admission::Accepted => AdmitReport { accepted: true, status: None, reason: None },
        Admission::Rejected(rejection) => AdmitReport {
            accepted: false,
            status: Some(rejection.status_code()),
            reason: Some(rejection.to_string()),
        },
    };
    print_json(&report)?;
    Ok(if report.accepted { ExitCode::SUCCESS } else { ExitCode::from(EXIT_REJECTED) })
}

async fn status(config: Config, id: &str) -> Result<ExitCode> {
    let finalizer = Finalizer::new(config).or_raise(|| ErrorKind::Setup)?;
    match finalizer.status(id).await.or_raise(|| ErrorKind::Status)? {
        Some(record) => print_json(&record),
        None => exn::bail!(ErrorKind::NoProgress(id.to_string())),
    }
}

#[derive(Debug, Serialize)]
struct VolumeReport {
    path: PathBuf,
    #[serde(flatten)]
    usage: DiskUsage,
    available_human: String,
    above_warning_threshold: bool,
}

async fn disk(config: &Config) -> Result<ExitCode> {
    let guard = SpaceGuard::statvfs();
    let mut report = BTreeMap::new();
    for (label, path) in [("archive", config.archive_dir.clone()), ("staging", config.staging_dir())] {
        let usage = guard.check_space(&path).await;
        let above_warning_threshold =
            usage.is_known() && usage.used_percent >= f64::from(config.usage_warning_percent);
        if above_warning_threshold {
            tracing::warn!(volume = label, used_percent = usage.used_percent, "Disk usage above warning threshold");
        }
        let available_human = if usage.is_known() { format_bytes(usage.available) } else { "unknown".to_string() };
        report.insert(label, VolumeReport { path, usage, available_human, above_warning_threshold });
    }
    print_json(&report)
}

async fn doctor(config: &Config) -> Result<ExitCode> {
    let toolchain = Toolchain::detect(config.ffprobe_path.as_deref(), config.ffmpeg_path.as_deref()).await;
    if toolchain.ffprobe.is_available() {
        tracing::info!("{}", toolchain.summary());
    } else {
        tracing::warn!("{}", toolchain.summary());
    }
    print_json(&toolchain)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).or_raise(|| ErrorKind::Output)?;
    writeln!(stdout).or_raise(|| ErrorKind::Output)?;
    Ok(ExitCode::SUCCESS)
}
