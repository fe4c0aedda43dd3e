//! Speech Output Controller.
//!
//! Wraps an external text-to-speech capability behind a single-flight
//! worker: starting a new utterance always resolves the previous one
//! with [`SpeechOutcome::Cancelled`] before the new synthesis begins.
//! `speak` never blocks and its handle resolves exactly once, so the
//! state machine can sequence "speak the question, then start
//! listening" without racing stale narration.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::{mpsc, oneshot};

/// What an utterance was narrating, so its completion can be routed
/// to the right transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechPurpose {
    /// A question prompt; completion triggers voice capture.
    Question,
    /// Hint or feedback narration; completion triggers nothing.
    Hint,
}

/// How an utterance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// The utterance played to its natural end.
    Completed,
    /// Superseded by a newer `speak` or an explicit `cancel`.
    Cancelled,
    /// The capability is unavailable or synthesis failed; callers
    /// proceed as if the utterance finished instantly.
    Skipped,
}

/// The actual synthesis capability. Implementations play the utterance
/// to completion; cancellation is handled by the controller dropping
/// the in-flight future.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait TtsBackend: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<()>;

    /// Whether the capability can produce audio at all. When false,
    /// every `speak` resolves immediately with `Skipped`.
    fn available(&self) -> bool;
}

/// Resolves exactly once with the utterance's outcome. Dropping the
/// controller mid-utterance counts as cancellation, never an error.
pub struct SpeechHandle(oneshot::Receiver<SpeechOutcome>);

impl SpeechHandle {
    pub async fn finished(self) -> SpeechOutcome {
        self.0.await.unwrap_or(SpeechOutcome::Cancelled)
    }

    pub(crate) fn resolved(outcome: SpeechOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self(rx)
    }
}

/// The seam the state machine speaks through. Implemented by
/// [`SpeechController`]; tests substitute recording doubles.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> SpeechHandle;
    fn cancel(&self);
}

enum SpeechCommand {
    Speak {
        text: String,
        done: oneshot::Sender<SpeechOutcome>,
    },
    Cancel,
}

/// Single-instance controller owning the synthesis worker task.
pub struct SpeechController {
    cmd_tx: mpsc::UnboundedSender<SpeechCommand>,
    available: bool,
}

impl SpeechController {
    pub fn new<B: TtsBackend + 'static>(backend: B) -> Self {
        let available = backend.available();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(Arc::new(backend), cmd_rx));
        Self { cmd_tx, available }
    }
}

impl SpeechOutput for SpeechController {
    fn speak(&self, text: &str) -> SpeechHandle {
        if !self.available {
            return SpeechHandle::resolved(SpeechOutcome::Skipped);
        }
        let (done, rx) = oneshot::channel();
        let command = SpeechCommand::Speak {
            text: text.to_string(),
            done,
        };
        if self.cmd_tx.send(command).is_err() {
            // Worker is gone; behave like an unavailable capability.
            return SpeechHandle::resolved(SpeechOutcome::Skipped);
        }
        SpeechHandle(rx)
    }

    fn cancel(&self) {
        let _ = self.cmd_tx.send(SpeechCommand::Cancel);
    }
}

type SynthFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

fn start_synthesis(backend: &Arc<dyn TtsBackend>, text: String) -> SynthFuture {
    let backend = backend.clone();
    Box::pin(async move { backend.synthesize(&text).await })
}

async fn run_worker(
    backend: Arc<dyn TtsBackend>,
    mut cmd_rx: mpsc::UnboundedReceiver<SpeechCommand>,
) {
    let mut current: Option<(SynthFuture, oneshot::Sender<SpeechOutcome>)> = None;

    loop {
        match current.take() {
            None => match cmd_rx.recv().await {
                None => break,
                Some(SpeechCommand::Cancel) => {}
                Some(SpeechCommand::Speak { text, done }) => {
                    current = Some((start_synthesis(&backend, text), done));
                }
            },
            Some((mut synth, done)) => {
                tokio::select! {
                    result = &mut synth => {
                        let outcome = match result {
                            Ok(()) => SpeechOutcome::Completed,
                            Err(e) => {
                                tracing::warn!("speech synthesis failed: {e:#}");
                                SpeechOutcome::Skipped
                            }
                        };
                        let _ = done.send(outcome);
                    }
                    command = cmd_rx.recv() => {
                        // Resolve the superseded utterance before the
                        // next one is even constructed.
                        let _ = done.send(SpeechOutcome::Cancelled);
                        match command {
                            None => break,
                            Some(SpeechCommand::Cancel) => {}
                            Some(SpeechCommand::Speak { text, done }) => {
                                current = Some((start_synthesis(&backend, text), done));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Shells out to an external speech program (e.g. `espeak`, `say`)
/// with the utterance as its single argument.
pub struct ProcessTts {
    program: String,
}

impl ProcessTts {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TtsBackend for ProcessTts {
    async fn synthesize(&self, text: &str) -> Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .arg(text)
            .status()
            .await?;
        anyhow::ensure!(status.success(), "{} exited with {status}", self.program);
        Ok(())
    }

    fn available(&self) -> bool {
        true
    }
}

/// Backend used when no speech program is configured.
pub struct NullTts;

#[async_trait]
impl TtsBackend for NullTts {
    async fn synthesize(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaking_backend() -> MockTtsBackend {
        let mut backend = MockTtsBackend::new();
        backend.expect_available().return_const(true);
        backend
    }

    #[tokio::test]
    async fn utterance_completes_naturally() {
        let mut backend = speaking_backend();
        backend
            .expect_synthesize()
            .returning(|_text| Box::pin(async { Ok(()) }))
            .once();

        let controller = SpeechController::new(backend);
        let outcome = controller.speak("Can you introduce yourself?").finished().await;
        assert_eq!(outcome, SpeechOutcome::Completed);
    }

    #[tokio::test]
    async fn superseding_speak_cancels_the_first_before_the_second_finishes() {
        let mut backend = speaking_backend();
        // The first utterance would never finish on its own; only
        // supersession can resolve it.
        backend
            .expect_synthesize()
            .withf(|text| text == "first")
            .returning(|_| Box::pin(std::future::pending()))
            .once();
        backend
            .expect_synthesize()
            .withf(|text| text == "second")
            .returning(|_| Box::pin(async { Ok(()) }))
            .once();

        let controller = SpeechController::new(backend);
        let first = controller.speak("first");
        let second = controller.speak("second");

        assert_eq!(first.finished().await, SpeechOutcome::Cancelled);
        assert_eq!(second.finished().await, SpeechOutcome::Completed);
    }

    #[tokio::test]
    async fn explicit_cancel_resolves_with_cancelled() {
        let mut backend = speaking_backend();
        backend
            .expect_synthesize()
            .returning(|_| Box::pin(std::future::pending()))
            .once();

        let controller = SpeechController::new(backend);
        let handle = controller.speak("a very long question");
        controller.cancel();
        assert_eq!(handle.finished().await, SpeechOutcome::Cancelled);
    }

    #[tokio::test]
    async fn unavailable_backend_skips_immediately() {
        let controller = SpeechController::new(NullTts);
        let outcome = controller.speak("anything").finished().await;
        assert_eq!(outcome, SpeechOutcome::Skipped);
    }

    #[tokio::test]
    async fn synthesis_failure_resolves_as_skipped() {
        let mut backend = speaking_backend();
        backend
            .expect_synthesize()
            .returning(|_| Box::pin(async { anyhow::bail!("device busy") }))
            .once();

        let controller = SpeechController::new(backend);
        assert_eq!(
            controller.speak("hello").finished().await,
            SpeechOutcome::Skipped
        );
    }
}
