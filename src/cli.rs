use crate::{
    batch::{BatchEvent, BatchJob, BatchRunner},
    config::Config,
    converter::Converter,
    engine::EngineRegistry,
    policy,
    prefs::{OutputMode, PreferenceStore, SharedPreferences},
    util::{display_name, ensure_dir},
};
use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, mpsc};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mdconvert")]
#[command(about = "Convert documents to Markdown with Pandoc or MarkItDown, chosen per format")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./mdconvert.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered engines with version and availability.
    Engines {},
    /// List supported formats and their engine policy.
    Formats {},
    /// Convert one or more files.
    Convert {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Use this engine when it can handle the format.
        #[arg(long)]
        engine: Option<String>,
        /// Explicit output file (single input only).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write every output into this directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Show or change stored preferences.
    Prefs {
        #[command(subcommand)]
        cmd: PrefsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    Show {},
    SetOutputMode {
        /// same | folder | ask
        mode: String,
    },
    SetOutputFolder {
        /// Omit to clear.
        folder: Option<PathBuf>,
    },
    SetOverride {
        ext: String,
        engine: String,
    },
    ResetOverride {
        ext: String,
    },
    ResetOverrides {},
}

/// Runs the command and returns the process exit code.
pub fn dispatch(args: Args) -> Result<i32> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg)?;

    let prefs = open_preferences(&cfg);
    let registry = EngineRegistry::with_default_engines(&cfg);
    let converter = Arc::new(Converter::new(registry, prefs.clone()));

    match args.cmd {
        Command::Engines {} => {
            println!(
                "{}",
                serde_json::to_string_pretty(&converter.available_engines())?
            );
            Ok(0)
        }
        Command::Formats {} => formats(&converter),
        Command::Convert {
            inputs,
            engine,
            output,
            out_dir,
        } => convert(&cfg, converter, inputs, engine, output, out_dir),
        Command::Prefs { cmd } => prefs_cmd(&prefs, &converter, cmd),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("mdconvert.toml");
    default.exists().then_some(default)
}

fn open_preferences(cfg: &Config) -> SharedPreferences {
    let store = match cfg.preferences_path() {
        Some(path) => PreferenceStore::open(path),
        None => {
            warn!("no config directory on this platform; preferences will not persist");
            PreferenceStore::default()
        }
    };
    store.into_shared()
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file {
        let path = if cfg.logging.file_path.is_empty() {
            PathBuf::from("mdconvert.log")
        } else {
            PathBuf::from(&cfg.logging.file_path)
        };
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn formats(converter: &Converter) -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(&format_rows(converter))?);
    Ok(0)
}

/// One row per policy entry, with the engines usable for it right now.
fn format_rows(converter: &Converter) -> Vec<serde_json::Value> {
    policy::supported_extensions()
        .into_iter()
        .map(|ext| {
            let engines: Vec<String> = converter
                .engines_for_extension(ext)
                .into_iter()
                .map(|choice| choice.id)
                .collect();
            let default = policy::default_engine_for(ext);
            let fallback = policy::fallback_engine_for(ext);
            serde_json::json!({
                "extension": ext,
                "name": policy::format_display_name(ext),
                "default_engine": default,
                "default_engine_name": default.and_then(policy::engine_display_name),
                "fallback_engine": fallback,
                "fallback_engine_name": fallback.and_then(policy::engine_display_name),
                "available_engines": engines,
            })
        })
        .collect()
}

fn convert(
    cfg: &Config,
    converter: Arc<Converter>,
    inputs: Vec<PathBuf>,
    engine: Option<String>,
    output: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> Result<i32> {
    if output.is_some() && inputs.len() > 1 {
        bail!("--output can only be used with a single input");
    }

    let mode = converter
        .preferences()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .preferences()
        .output_mode;

    let mut explicit: HashMap<PathBuf, PathBuf> = HashMap::new();
    if let Some(out) = output {
        explicit.insert(inputs[0].clone(), out);
    } else if let Some(dir) = &out_dir {
        for input in &inputs {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            explicit.insert(input.clone(), dir.join(format!("{stem}.md")));
        }
    } else if mode == OutputMode::AskEachTime {
        match ask_output_paths(&converter, &inputs)? {
            Some(paths) => explicit = paths,
            None => {
                warn!("output prompt cancelled; nothing converted");
                return Ok(1);
            }
        }
    }

    let mut job = BatchJob::new(inputs).with_output(move |p| explicit.get(p).cloned());
    if let Some(id) = engine {
        job = job.with_engine(id);
    }

    let runner = BatchRunner::new(
        Arc::clone(&converter),
        Duration::from_millis(cfg.batch.min_duration_ms),
    );
    let (tx, rx) = mpsc::channel();
    let handle = runner.start(job, tx)?;

    for event in rx {
        match event {
            BatchEvent::Progress {
                index,
                total,
                filename,
            } => eprintln!("[{index}/{total}] {filename}"),
            BatchEvent::FileDone {
                path,
                success,
                message,
            } => {
                let mark = if success { "ok" } else { "FAILED" };
                eprintln!("  {mark}: {} -> {message}", path.display());
            }
            BatchEvent::BatchDone {
                success_count,
                fail_count,
            } => info!("{}", summary_line(success_count, fail_count)),
        }
    }

    let report = handle
        .join()
        .map_err(|_| anyhow!("batch worker panicked"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.fail_count > 0 { 1 } else { 0 })
}

/// Prompts on stdin for every output path before the batch starts.
/// `None` means the user hit EOF and the whole batch is abandoned.
fn ask_output_paths(
    converter: &Converter,
    inputs: &[PathBuf],
) -> Result<Option<HashMap<PathBuf, PathBuf>>> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut out = HashMap::new();

    for input in inputs {
        let suggested = converter.default_output_path(input);
        eprint!(
            "Save '{}' as [{}]: ",
            display_name(input),
            suggested.display()
        );
        std::io::stderr().flush().ok();

        let Some(line) = lines.next() else {
            return Ok(None);
        };
        let answer = line.with_context(|| "reading output path")?;
        let answer = answer.trim();
        let path = if answer.is_empty() {
            suggested
        } else {
            PathBuf::from(answer)
        };
        out.insert(input.clone(), path);
    }
    Ok(Some(out))
}

fn summary_line(success_count: usize, fail_count: usize) -> String {
    match (success_count, fail_count) {
        (1, 0) => "File converted successfully".to_string(),
        (n, 0) => format!("{n} files converted"),
        (0, 1) => "Conversion failed".to_string(),
        (0, n) => format!("All {n} files failed"),
        (ok, failed) => format!("{ok} converted, {failed} failed"),
    }
}

fn prefs_cmd(prefs: &SharedPreferences, converter: &Converter, cmd: PrefsCommand) -> Result<i32> {
    let store = || prefs.write().unwrap_or_else(PoisonError::into_inner);
    match cmd {
        PrefsCommand::Show {} => {
            let store = store();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "path": store.path(),
                    "preferences": store.preferences(),
                }))?
            );
        }
        PrefsCommand::SetOutputMode { mode } => store().set_output_mode(mode.parse()?)?,
        PrefsCommand::SetOutputFolder { folder } => store().set_output_folder(folder)?,
        PrefsCommand::SetOverride { ext, engine } => converter.pin_engine(&ext, &engine)?,
        PrefsCommand::ResetOverride { ext } => store().reset_engine_override(&ext)?,
        PrefsCommand::ResetOverrides {} => store().reset_all_engine_overrides()?,
    }
    Ok(0)
}
