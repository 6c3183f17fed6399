//! CLI: run the demo workflow durably.
//!
//! The workflow reads two sample files in parallel and prints their concatenation, then
//! waits in parallel on bookmarks "1" and "2" and prints their payloads:
//! `Sequence[Parallel[ReadFile, ReadFile], WriteLine, Parallel[Wait "1", Wait "2"], WriteLine]`.
//!
//! Bookmarks are resolved from stdin, one per line: `name=payload`, or a bare line which
//! resolves the next of "1", "2". Kill the process at any point and run it again: it
//! resumes from the checkpoint.
//!
//! Set RUST_LOG=streamweave_durable=trace for TRACE-level span enter/exit and events.

use clap::Parser;
use std::env;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use streamweave_durable::activities::{ReadFile, WaitForBookmark, WriteLine};
use streamweave_durable::{
  Activity, BookmarkResolver, EngineError, FileCheckpointStore, Host, Workflow,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

const RUN_DIR: &str = ".streamweave";
const NOTIFY_RETRIES: u32 = 50;
const NOTIFY_BACKOFF: Duration = Duration::from_millis(100);

/// Run the demo workflow with a durable checkpoint.
#[derive(Parser, Debug)]
#[command(name = "run_workflow")]
#[command(
  after_help = r#"Environment variables (override the flags when set):
  STREAMWEAVE_CHECKPOINT   Checkpoint file (default: .streamweave/execution.json).
  STREAMWEAVE_INPUT_DIR    Directory holding the sample files (default: .streamweave).

Examples:
  run_workflow
  printf '1=Hello \n2=again\n' | run_workflow --input-dir /tmp/wf"#
)]
struct Args {
  /// Checkpoint file. Overridden by STREAMWEAVE_CHECKPOINT if set.
  #[arg(long, value_name = "FILE")]
  checkpoint: Option<PathBuf>,

  /// Directory for the sample files. Overridden by STREAMWEAVE_INPUT_DIR if set.
  #[arg(long, value_name = "DIR", default_value = RUN_DIR)]
  input_dir: PathBuf,
}

fn demo_workflow(dir: &Path) -> Workflow {
  Workflow::new(Activity::sequence([
    Activity::parallel([
      Activity::leaf(ReadFile::new(dir.join("file1.txt"), "file1Content")),
      Activity::leaf(ReadFile::new(dir.join("file2.txt"), "file2Content")),
    ]),
    Activity::leaf(WriteLine::new(["file1Content", "file2Content"])),
    Activity::parallel([
      Activity::leaf(WaitForBookmark::new("1", "input1")),
      Activity::leaf(WaitForBookmark::new("2", "input2")),
    ]),
    Activity::leaf(WriteLine::new(["input1", "input2"])),
  ]))
}

fn setup_sample_files(dir: &Path) -> std::io::Result<()> {
  fs::create_dir_all(dir)?;
  for (name, content) in [
    ("file1.txt", "Hello world to "),
    ("file2.txt", "home made workflow foundation!"),
  ] {
    let path = dir.join(name);
    if !path.exists() {
      fs::write(path, content)?;
    }
  }
  Ok(())
}

fn cleanup_sample_files(dir: &Path) {
  for name in ["file1.txt", "file2.txt"] {
    let _ = fs::remove_file(dir.join(name));
  }
}

/// Reads `name=payload` lines from stdin and resolves them.
fn spawn_stdin_notifier(resolver: BookmarkResolver) {
  std::thread::spawn(move || {
    let mut defaults = ["1", "2"].into_iter();
    for line in std::io::stdin().lock().lines() {
      let Ok(line) = line else { break };
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      let (name, payload) = match line.split_once('=') {
        Some((n, p)) => (n.to_string(), p.to_string()),
        None => match defaults.next() {
          Some(n) => (n.to_string(), line.to_string()),
          None => {
            eprintln!("no bookmark name for '{line}'");
            continue;
          }
        },
      };
      // Input may arrive before the workflow reaches the bookmark.
      let mut attempts = 0;
      loop {
        match resolver.resolve_blocking(&name, payload.as_str()) {
          Ok(()) => info!(bookmark = %name, "resolved"),
          Err(EngineError::HostStopped) => return,
          Err(EngineError::UnknownBookmark { .. }) if attempts < NOTIFY_RETRIES => {
            attempts += 1;
            std::thread::sleep(NOTIFY_BACKOFF);
            continue;
          }
          Err(e) => eprintln!("{e}"),
        }
        break;
      }
    }
  });
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .with_writer(std::io::stderr)
    .init();

  info!("run_workflow starting");
  let args = Args::parse();

  // Env vars override flags.
  let input_dir = env::var("STREAMWEAVE_INPUT_DIR")
    .ok()
    .map(PathBuf::from)
    .unwrap_or_else(|| args.input_dir.clone());
  let checkpoint = env::var("STREAMWEAVE_CHECKPOINT")
    .ok()
    .map(PathBuf::from)
    .or_else(|| args.checkpoint.clone())
    .unwrap_or_else(|| Path::new(RUN_DIR).join(streamweave_durable::checkpoint_io::CHECKPOINT_FILENAME));

  info!(checkpoint = %checkpoint.display(), input_dir = %input_dir.display(), "options (env or flags)");

  let store = FileCheckpointStore::new(&checkpoint);
  if !store.exists() {
    if let Err(e) = setup_sample_files(&input_dir) {
      eprintln!("Error creating sample files in {}: {}", input_dir.display(), e);
      process::exit(1);
    }
  }

  let mut host = match Host::open(demo_workflow(&input_dir), store) {
    Ok(h) => h,
    Err(e) => {
      eprintln!("Error opening workflow: {e}");
      process::exit(1);
    }
  };
  if host.resumed() {
    println!("Resuming instance {}.", host.state().instance_id);
  } else {
    println!("Starting instance {}.", host.state().instance_id);
  }
  let pending: Vec<String> = host.state().bookmarks.keys().cloned().collect();
  if !pending.is_empty() {
    println!("Pending bookmarks: {}", pending.join(", "));
  }

  spawn_stdin_notifier(host.resolver());

  match host.run().await {
    Ok(summary) => {
      info!(steps = summary.steps, "workflow completed");
      println!("Workflow completed.");
      println!("  Instance: {}", summary.instance_id);
      println!("  Steps: {}", summary.steps);
      cleanup_sample_files(&input_dir);
    }
    Err(e) => {
      warn!(error = %e, "workflow halted");
      eprintln!("Workflow error: {e}");
      process::exit(1);
    }
  }
}
