//! Subprocess lifecycle for one generation request.
//!
//! The engine launches the inference executable in single-shot batch mode
//! over a fully rendered prompt, streams decoded stdout fragments to the
//! caller in emission order, and triages stderr concurrently (an unread
//! stderr pipe would eventually block stdout once its OS buffer fills).
//! At most one generation runs at a time; a second `start` fails fast.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::errors::CoreError;

use super::config::GenerationConfig;
use super::decode::Utf8StreamDecoder;
use super::stderr::StderrTriage;

const EXECUTABLE_NAME: &str = "llama-cli";

/// Model files below this size are rejected as truncated downloads.
const MIN_MODEL_SIZE: u64 = 1024 * 1024;

/// Fragments shorter than this never count toward loop detection.
const STALL_MIN_FRAGMENT_CHARS: usize = 20;
/// The same fragment arriving this many times in a row is a runaway
/// generation and the subprocess is terminated proactively.
const STALL_REPEAT_LIMIT: u32 = 3;

const TERMINATE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Launching,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

/// Streaming generation engine bound to one model file and one executable.
///
/// The cancellation `Notify` is replaced for every run: a `Notify` stores a
/// permit when nobody is waiting, so a long-lived one would let a cancel
/// issued between runs abort the next generation on its first poll.
#[derive(Debug)]
pub struct GenerationEngine {
    executable: PathBuf,
    model_path: PathBuf,
    busy: Arc<AtomicBool>,
    cancel: Mutex<Arc<Notify>>,
    cancel_requested: Arc<AtomicBool>,
    state: Arc<Mutex<EngineState>>,
}

impl GenerationEngine {
    /// Validate the model artifact and resolve the executable up front, so
    /// configuration problems fail before any subprocess is launched.
    pub fn new(executable: Option<&Path>, model_path: &Path) -> Result<Self, CoreError> {
        let executable = resolve_executable(executable)?;
        validate_model(model_path)?;

        Ok(Self {
            executable,
            model_path: model_path.to_path_buf(),
            busy: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(Arc::new(Notify::new())),
            cancel_requested: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(EngineState::Idle)),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().map(|s| *s).unwrap_or(EngineState::Idle)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Launch a generation over `prompt`. Fragments arrive on the returned
    /// channel in the order the subprocess emitted them; the channel closing
    /// without an `Err` item means the run completed or was cancelled.
    pub async fn start(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<Result<String, CoreError>>, CoreError> {
        config.validate()?;

        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Busy);
        }
        self.cancel_requested.store(false, Ordering::SeqCst);
        let cancel = Arc::new(Notify::new());
        if let Ok(mut guard) = self.cancel.lock() {
            *guard = Arc::clone(&cancel);
        }
        self.set_state(EngineState::Launching);

        let mut command = self.build_command(prompt, config);
        tracing::info!(
            executable = %self.executable.display(),
            model = %self.model_path.display(),
            "launching generation"
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.abort_launch();
                return Err(CoreError::Config(format!(
                    "failed to launch {}: {}",
                    self.executable.display(),
                    err
                )));
            }
        };

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.start_kill();
                self.abort_launch();
                return Err(CoreError::Generation("stdout pipe unavailable".into()));
            }
        };
        let stderr = match child.stderr.take() {
            Some(stderr) => stderr,
            None => {
                let _ = child.start_kill();
                self.abort_launch();
                return Err(CoreError::Generation("stderr pipe unavailable".into()));
            }
        };

        // Drain stderr concurrently; triage resolves once the stream closes.
        let stderr_task: JoinHandle<StderrTriage> = tokio::spawn(async move {
            let mut triage = StderrTriage::default();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                triage.observe(&line);
            }
            triage
        });

        let (tx, rx) = mpsc::channel(64);
        self.set_state(EngineState::Streaming);

        let busy = Arc::clone(&self.busy);
        let state = Arc::clone(&self.state);
        let cancel_requested = Arc::clone(&self.cancel_requested);

        tokio::spawn(async move {
            let outcome = drive(child, stdout, stderr_task, tx, cancel, cancel_requested).await;
            if let Ok(mut guard) = state.lock() {
                *guard = outcome;
            }
            busy.store(false, Ordering::SeqCst);
        });

        Ok(rx)
    }

    /// Request cooperative termination of the active generation. The stream
    /// simply ends; cancellation is never reported as an error. A no-op when
    /// no generation is running.
    pub fn cancel(&self) {
        if !self.busy.load(Ordering::SeqCst) {
            return;
        }
        self.cancel_requested.store(true, Ordering::SeqCst);
        if let Ok(guard) = self.cancel.lock() {
            guard.notify_one();
        }
    }

    fn build_command(&self, prompt: &str, config: &GenerationConfig) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--model")
            .arg(&self.model_path)
            .arg("--prompt")
            .arg(prompt)
            .arg("--n-predict")
            .arg(config.max_tokens.to_string())
            .arg("--ctx-size")
            .arg(config.ctx_size.to_string())
            .arg("--temp")
            .arg(config.temperature.to_string())
            .arg("--repeat-penalty")
            .arg(config.repeat_penalty.to_string())
            .arg("--repeat-last-n")
            .arg(config.repeat_window.to_string())
            .arg("--top-p")
            .arg(config.top_p.to_string())
            .arg("--top-k")
            .arg(config.top_k.to_string())
            .arg("--no-display-prompt")
            // Batch completion over the literal prompt text, never the
            // executable's own interactive chat mode.
            .arg("-no-cnv");
        for stop in &config.stop {
            command.arg("--reverse-prompt").arg(stop);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn set_state(&self, next: EngineState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = next;
        }
    }

    fn abort_launch(&self) {
        self.set_state(EngineState::Idle);
        self.busy.store(false, Ordering::SeqCst);
    }
}

async fn drive(
    mut child: Child,
    mut stdout: ChildStdout,
    stderr_task: JoinHandle<StderrTriage>,
    tx: mpsc::Sender<Result<String, CoreError>>,
    cancel: Arc<Notify>,
    cancel_requested: Arc<AtomicBool>,
) -> EngineState {
    let mut decoder = Utf8StreamDecoder::new();
    let mut stall = StallDetector::new();
    let mut produced_output = false;
    let mut cancelled = false;
    let mut looped = false;
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    let fragment = decoder.push(&buf[..n]);
                    if fragment.is_empty() {
                        continue;
                    }
                    if stall.observe(&fragment) {
                        tracing::warn!("degenerate repetition detected, terminating generation");
                        looped = true;
                        terminate(&mut child).await;
                        break;
                    }
                    produced_output = true;
                    if tx.send(Ok(fragment)).await.is_err() {
                        // Receiver dropped; treat like a cancellation.
                        cancelled = true;
                        terminate(&mut child).await;
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("stdout read failed: {}", err);
                    break;
                }
            },
            _ = cancel.notified() => {
                cancelled = true;
                terminate(&mut child).await;
                break;
            }
        }
    }

    if !cancelled && !looped {
        let tail = decoder.flush();
        if !tail.is_empty() {
            produced_output = true;
            let _ = tx.send(Ok(tail)).await;
        }
    }

    let status = child.wait().await;
    // Success or failure is only decided after the diagnostic stream closes.
    let triage = stderr_task.await.unwrap_or_default();

    if cancelled || cancel_requested.load(Ordering::SeqCst) {
        // User-cancelled runs discard diagnostics entirely.
        tracing::info!("generation cancelled");
        return EngineState::Cancelled;
    }
    if looped {
        // Proactive internal stop, not an error to the caller.
        return EngineState::Completed;
    }

    let exited_cleanly = matches!(&status, Ok(s) if s.success());
    if !produced_output {
        if let Some(err) = triage.into_failure() {
            let _ = tx.send(Err(err)).await;
            return EngineState::Failed;
        }
        if !exited_cleanly {
            let _ = tx
                .send(Err(CoreError::Generation(describe_exit(&status))))
                .await;
            return EngineState::Failed;
        }
    } else if !triage.is_clean() {
        tracing::warn!("generation produced output alongside unrecognized diagnostics");
    }

    EngineState::Completed
}

/// Cooperative stop: ask the process to exit, escalate if it lingers.
async fn terminate(child: &mut Child) {
    let _ = child.start_kill();
    if tokio::time::timeout(TERMINATE_GRACE, child.wait())
        .await
        .is_err()
    {
        let _ = child.kill().await;
    }
}

fn describe_exit(status: &std::io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => format!("inference process exited abnormally ({})", status),
        Err(err) => format!("failed to await inference process: {}", err),
    }
}

fn resolve_executable(configured: Option<&Path>) -> Result<PathBuf, CoreError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Ok(found) = which::which(path) {
            return Ok(found);
        }
        return Err(CoreError::Config(format!(
            "inference executable not found at {}",
            path.display()
        )));
    }

    which::which(EXECUTABLE_NAME).map_err(|_| {
        CoreError::Config(format!(
            "could not find {} on PATH; set `executable` in lantern.toml",
            EXECUTABLE_NAME
        ))
    })
}

fn validate_model(path: &Path) -> Result<(), CoreError> {
    if !path.exists() {
        return Err(CoreError::Config(format!(
            "model file not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|v| v.to_str())
        .map(|v| v.to_lowercase());
    if extension.as_deref() != Some("gguf") {
        return Err(CoreError::Config(
            "only .gguf model files are supported".into(),
        ));
    }

    let size = std::fs::metadata(path)?.len();
    if size < MIN_MODEL_SIZE {
        return Err(CoreError::Config(format!(
            "model file is implausibly small ({} bytes); likely a truncated download",
            size
        )));
    }

    Ok(())
}

/// Tracks consecutive identical fragments to catch runaway generations that
/// would otherwise burn the whole token budget.
struct StallDetector {
    last: String,
    repeats: u32,
}

impl StallDetector {
    fn new() -> Self {
        Self {
            last: String::new(),
            repeats: 0,
        }
    }

    fn observe(&mut self, fragment: &str) -> bool {
        if fragment == self.last && fragment.chars().count() >= STALL_MIN_FRAGMENT_CHARS {
            self.repeats += 1;
        } else {
            self.last = fragment.to_string();
            self.repeats = 1;
        }
        self.repeats >= STALL_REPEAT_LIMIT
    }
}
