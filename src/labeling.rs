//! Operator-driven labeling of unknown objects.
//!
//! The command reader runs on its own thread and only ever raises a
//! [`LabelRequest`]. The acquisition loop consumes the request through a
//! [`LabelCoordinator`], which blocks while the operator types a label.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use colored::*;
use tracing::{debug, error, info, warn};

use crate::acquisition::Shutdown;
use crate::error::StoreError;
use crate::store::FingerprintStore;
use crate::types::{ClassificationResult, SpectralFrame};

/// The command that asks for the current frame to be labeled.
pub const LABEL_COMMAND: &str = "l";

/// Cross-thread "label the current frame" flag.
#[derive(Debug, Clone, Default)]
pub struct LabelRequest(Arc<AtomicBool>);

impl LabelRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Reads and clears the flag in one step.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Spawns the line-oriented command reader.
///
/// `l` (any case) raises `request`. Other lines go to `text` when given, for
/// the console prompt, and are otherwise ignored. The thread ends on EOF, on a
/// read error, or once `stop` is set and another line arrives; callers should
/// not join it during shutdown.
pub fn spawn_command_reader<R>(
    input: R,
    request: LabelRequest,
    text: Option<Sender<String>>,
    stop: Shutdown,
) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || {
            for line in input.lines() {
                if stop.is_set() {
                    break;
                }
                match line {
                    Ok(line) => {
                        let command = line.trim();
                        if command.eq_ignore_ascii_case(LABEL_COMMAND) {
                            debug!("Label requested by operator");
                            request.raise();
                        } else if let Some(tx) = &text {
                            if tx.send(command.to_string()).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Input error: {}", e);
                        break;
                    }
                }
            }
            debug!("Command reader finished");
        })
}

/// Source of a label string for a frame. `None` means the operator declined.
pub trait LabelPrompt {
    fn ask(&mut self, frame: &SpectralFrame) -> Option<String>;
}

/// Terminal prompt fed by the command reader's free-text lines.
///
/// The command reader does not know a prompt is open, so a lone `l` (any
/// case) typed as an answer raises a new request instead of reaching the
/// prompt. An object therefore cannot be named "l" or "L" from the console.
pub struct ConsolePrompt {
    lines: Receiver<String>,
    stop: Shutdown,
    poll: Duration,
}

impl ConsolePrompt {
    pub fn new(lines: Receiver<String>, stop: Shutdown) -> Self {
        Self {
            lines,
            stop,
            poll: Duration::from_millis(200),
        }
    }
}

impl LabelPrompt for ConsolePrompt {
    fn ask(&mut self, _frame: &SpectralFrame) -> Option<String> {
        // Anything typed before the prompt was shown is not an answer.
        while self.lines.try_recv().is_ok() {}

        print!("{} ", "New object detected! Enter object name (empty to skip):".cyan());
        let _ = io::stdout().flush();

        loop {
            match self.lines.recv_timeout(self.poll) {
                Ok(line) if line.trim().is_empty() => return None,
                Ok(line) => return Some(line.trim().to_string()),
                Err(RecvTimeoutError::Timeout) if self.stop.is_set() => return None,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

#[derive(Debug)]
pub enum LabelOutcome {
    /// No pending request, or the frame was recognised.
    Idle,
    Declined,
    Saved(String),
    /// The entry is in memory but the file write failed.
    SaveFailed { label: String, error: StoreError },
}

/// Applies a pending [`LabelRequest`] to the current frame.
pub struct LabelCoordinator<P> {
    request: LabelRequest,
    prompt: P,
}

impl<P: LabelPrompt> LabelCoordinator<P> {
    pub fn new(request: LabelRequest, prompt: P) -> Self {
        Self { request, prompt }
    }

    pub fn request(&self) -> &LabelRequest {
        &self.request
    }

    /// Only unknown frames consume the request; for known ones it stays raised.
    /// Blocks for as long as the prompt does.
    pub fn process(
        &mut self,
        result: &ClassificationResult,
        frame: &SpectralFrame,
        store: &mut FingerprintStore,
    ) -> LabelOutcome {
        if !result.is_unknown() || !self.request.take() {
            return LabelOutcome::Idle;
        }

        let label = match self.prompt.ask(frame) {
            Some(label) if !label.trim().is_empty() => label.trim().to_string(),
            _ => {
                info!("Labeling skipped");
                return LabelOutcome::Declined;
            }
        };

        match store.save(&label, *frame) {
            Ok(()) => {
                println!("{}", format!("Saved new fingerprint: {}", label).green());
                LabelOutcome::Saved(label)
            }
            Err(error) => {
                error!("Could not save fingerprint {:?}: {}", label, error);
                println!("{}", format!("Failed to save fingerprint {}: {}", label, error).red());
                LabelOutcome::SaveFailed { label, error }
            }
        }
    }
}
