//! Interview session state machine.
//!
//! Everything that can change session state funnels through one event
//! queue: channel traffic, user actions, hint-timer fires, and speech
//! completions. The machine handles events one at a time, so every
//! transition observes a consistent snapshot and the "at most one
//! current question" and "exactly one result" invariants never race.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use codesage_types::{
    Artifact, ClientMessage, CompletionMethod, InitPayload, InterviewMode, Question,
    QuestionKind, Role, ServerMessage, Session, SessionResult, SessionStatus,
};

use crate::channel::{ChannelAdapter, ChannelEvent};
use crate::classify::classify_prompt;
use crate::config::Config;
use crate::error::SessionError;
use crate::export::ResultExporter;
use crate::hint::HintTimer;
use crate::speech::{SpeechOutcome, SpeechOutput, SpeechPurpose};

/// Where the session is in its lifecycle. Transitions only move
/// forward within a question and never leave `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Connected,
    /// Init sent; waiting for the service to pose a question.
    AwaitingQuestion,
    /// A free-form question is being narrated.
    PresentingQuestion,
    /// Voice capture was requested; waiting for a transcript.
    ListeningForAnswer,
    /// An answer is staged and can be submitted.
    AnswerReady,
    /// A coding question is current; waiting for code to be staged.
    AwaitingCodeSubmission,
    /// A submission is in flight; no other submission may start.
    Evaluating,
    /// Finalization in progress.
    Ending,
    Completed,
    Failed,
}

impl Phase {
    /// Phases in which a question is current and hints make sense.
    pub fn question_active(self) -> bool {
        matches!(
            self,
            Phase::PresentingQuestion
                | Phase::ListeningForAnswer
                | Phase::AnswerReady
                | Phase::AwaitingCodeSubmission
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

/// Everything the state machine reacts to, in arrival order.
#[derive(Debug)]
pub enum SessionEvent {
    Channel(ChannelEvent),
    User(UserAction),
    HintTimerFired,
    SpeechFinished {
        purpose: SpeechPurpose,
        outcome: SpeechOutcome,
    },
}

/// Actions originating from the candidate.
#[derive(Debug)]
pub enum UserAction {
    Init(InterviewMode),
    /// Stage (or replace) a typed answer for the current question.
    SetAnswer(String),
    /// Stage code for the current question; optionally switch the
    /// reported language.
    SetCode {
        code: String,
        language: Option<String>,
    },
    Submit,
    RequestHint,
    End,
}

/// One interview run: owns the channel, the speech controller handle,
/// the hint timer, and the session data. Driven by [`run`].
///
/// [`run`]: InterviewSession::run
pub struct InterviewSession {
    phase: Phase,
    session: Option<Session>,
    channel: Option<ChannelAdapter>,
    outbound: Option<mpsc::Sender<ClientMessage>>,
    speech: Arc<dyn SpeechOutput>,
    exporter: Arc<dyn ResultExporter>,
    hint_timer: HintTimer,
    events_tx: mpsc::Sender<SessionEvent>,
    language: String,
    coding_keywords: Vec<String>,
    /// Staged free-form answer, cleared on submission.
    answer_buffer: Option<String>,
    /// Staged code; also attached to hint requests for context.
    code_buffer: String,
    listening: bool,
    question_started: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    started_instant: Option<Instant>,
    result: Option<SessionResult>,
}

impl InterviewSession {
    pub fn new(
        config: &Config,
        speech: Arc<dyn SpeechOutput>,
        exporter: Arc<dyn ResultExporter>,
        events_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            session: None,
            channel: None,
            outbound: None,
            speech,
            exporter,
            hint_timer: HintTimer::new(config.hint_interval(), events_tx.clone()),
            events_tx,
            language: config.language().to_string(),
            coding_keywords: config.coding_keywords().to_vec(),
            answer_buffer: None,
            code_buffer: String::new(),
            listening: false,
            question_started: None,
            started_at: None,
            started_instant: None,
            result: None,
        }
    }

    /// Opens the channel. One attempt; failure is terminal.
    pub async fn connect(&mut self, config: &Config) -> Result<(), SessionError> {
        self.phase = Phase::Connecting;
        match ChannelAdapter::connect(config, self.events_tx.clone()).await {
            Ok(channel) => {
                self.outbound = Some(channel.sender()?);
                self.channel = Some(channel);
                self.phase = Phase::Connected;
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    /// Drives the machine until a terminal phase. Returns the final
    /// result if the session completed (never for failures).
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> Option<SessionResult> {
        while let Some(event) = events.recv().await {
            match self.handle_event(event).await {
                Ok(()) => {}
                Err(SessionError::SubmissionRejected) => {
                    debug!("Ignoring submit while a submission is in flight");
                }
                Err(e) => error!("Session event failed: {e}"),
            }
            if self.phase.is_terminal() {
                break;
            }
        }
        self.result
    }

    pub async fn handle_event(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::Channel(ChannelEvent::Message(message)) => {
                self.handle_server(message).await
            }
            SessionEvent::Channel(ChannelEvent::Closed) => {
                if !self.phase.is_terminal() {
                    self.fail("connection closed by the service");
                }
                Ok(())
            }
            SessionEvent::Channel(ChannelEvent::TransportError(reason)) => {
                self.fail(&format!("transport error: {reason}"));
                Ok(())
            }
            SessionEvent::Channel(ChannelEvent::ProtocolError(reason)) => {
                self.fail(&format!("protocol error: {reason}"));
                Ok(())
            }
            SessionEvent::User(action) => self.handle_user(action).await,
            SessionEvent::HintTimerFired => self.request_hint(true).await,
            SessionEvent::SpeechFinished { purpose, outcome } => {
                self.handle_speech_finished(purpose, outcome).await
            }
        }
    }

    async fn handle_server(&mut self, message: ServerMessage) -> Result<(), SessionError> {
        if self.phase.is_terminal() {
            debug!("Dropping late message in terminal phase: {message:?}");
            return Ok(());
        }
        match message {
            ServerMessage::Ready {
                message,
                next_question,
            } => {
                if let (Some(session), Some(text)) = (self.session.as_mut(), message) {
                    session.log(Role::System, text);
                }
                self.present_question(next_question).await
            }
            ServerMessage::Assessment {
                evaluation,
                hint,
                next_question,
                final_feedback,
            } => {
                if let (Some(session), Some(text)) = (self.session.as_mut(), evaluation) {
                    session.log(Role::Interviewer, text);
                }
                if let Some(hint) = hint {
                    // The answer was not accepted; same question again,
                    // with guidance.
                    self.deliver_hint(hint).await
                } else if let Some(next) = next_question {
                    self.complete_current(None);
                    self.present_question(next).await
                } else if let Some(feedback) = final_feedback {
                    if let Some(session) = self.session.as_mut() {
                        session.log(Role::Interviewer, feedback);
                    }
                    self.complete_current(None);
                    self.finalize(CompletionMethod::Automatic).await
                } else {
                    if self.phase == Phase::Evaluating {
                        self.complete_current(None);
                        self.phase = Phase::AwaitingQuestion;
                    }
                    Ok(())
                }
            }
            ServerMessage::Hint { hint } => {
                // Guidance only; the phase stays wherever it was.
                if self.phase.question_active() || self.phase == Phase::Evaluating {
                    if let Some(session) = self.session.as_mut() {
                        session.log(Role::Interviewer, &hint);
                    }
                    self.speak(&hint, SpeechPurpose::Hint);
                    self.hint_timer.arm();
                }
                Ok(())
            }
            ServerMessage::CodeFeedback { code_feedback } => {
                if let Some(session) = self.session.as_mut() {
                    session.log(Role::Interviewer, code_feedback);
                }
                Ok(())
            }
            ServerMessage::Listening { .. } => {
                if self.phase == Phase::ListeningForAnswer {
                    self.listening = true;
                }
                Ok(())
            }
            ServerMessage::Transcribed { transcript } => self.handle_transcript(transcript),
            ServerMessage::NoSpeech { .. } => {
                info!("No speech detected; waiting for another attempt or a typed answer");
                self.listening = false;
                Ok(())
            }
            ServerMessage::InvalidTranscript { transcript, .. } => {
                warn!("Transcript rejected by the service: {transcript:?}");
                self.listening = false;
                Ok(())
            }
            ServerMessage::QuestionComplete {
                score,
                next_question,
                question_number,
                remaining_questions,
            } => {
                debug!(
                    "Question complete (number {question_number:?}, {remaining_questions:?} remaining)"
                );
                self.complete_current(score);
                match next_question {
                    Some(next) => self.present_question(next).await,
                    None => self.finalize(CompletionMethod::Automatic).await,
                }
            }
            ServerMessage::InterviewComplete {
                final_feedback,
                interview_id,
                ..
            } => {
                if let Some(session) = self.session.as_mut() {
                    if let Some(feedback) = final_feedback {
                        session.log(Role::Interviewer, feedback);
                    }
                    // The service's id supersedes the locally generated
                    // fallback so exported files match its records.
                    if let Some(id) = interview_id {
                        session.session_id = id;
                    }
                }
                // A question still current here was never evaluated;
                // it stays unscored and uncompleted in the result.
                self.finalize(CompletionMethod::Automatic).await
            }
            ServerMessage::Error { error } => {
                self.fail(&format!("service reported: {error}"));
                Ok(())
            }
            ServerMessage::StopSpeech { .. } => {
                self.speech.cancel();
                Ok(())
            }
        }
    }

    async fn handle_user(&mut self, action: UserAction) -> Result<(), SessionError> {
        match action {
            UserAction::Init(mode) => self.init(mode).await,
            UserAction::SetAnswer(text) => {
                if !matches!(
                    self.phase,
                    Phase::PresentingQuestion | Phase::ListeningForAnswer | Phase::AnswerReady
                ) {
                    warn!("Ignoring typed answer outside the answer flow");
                    return Ok(());
                }
                self.answer_buffer = Some(text);
                self.phase = Phase::AnswerReady;
                Ok(())
            }
            UserAction::SetCode { code, language } => {
                if let Some(language) = language {
                    self.language = language;
                }
                self.code_buffer = code;
                Ok(())
            }
            UserAction::Submit => self.submit().await,
            UserAction::RequestHint => self.request_hint(false).await,
            UserAction::End => {
                if self.phase.is_terminal() {
                    return Ok(());
                }
                info!("Ending the interview at the candidate's request");
                self.speech.cancel();
                if let Some(tx) = self.outbound.as_ref() {
                    let _ = tx.send(ClientMessage::End).await;
                }
                self.finalize(CompletionMethod::ManuallyEnded).await
            }
        }
    }

    async fn init(&mut self, mode: InterviewMode) -> Result<(), SessionError> {
        if self.phase != Phase::Connected {
            return Err(SessionError::Protocol(
                "init is only valid on a fresh connection".to_string(),
            ));
        }
        let session_id = format!("session_{}", Utc::now().timestamp_millis());
        info!("Initializing {} interview as {session_id}", mode.as_str());
        self.send(ClientMessage::Init(InitPayload::from(&mode))).await?;
        self.session = Some(Session::new(session_id, mode));
        self.started_at = Some(Utc::now());
        self.started_instant = Some(Instant::now());
        self.phase = Phase::AwaitingQuestion;
        Ok(())
    }

    async fn present_question(&mut self, text: String) -> Result<(), SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::Protocol(
                "received a question before init".to_string(),
            ));
        };
        if let Some(stale) = session.current.take() {
            warn!("Question {} was never completed; archiving it", stale.id);
            session.questions.push(stale);
        }

        let kind = classify_prompt(&text, &self.coding_keywords);
        let question = Question::new(session.next_ordinal(), text.clone(), kind);
        info!("Question {} ({kind:?}): {text}", question.id);
        session.log(Role::Interviewer, &text);
        session.current = Some(question);

        self.answer_buffer = None;
        self.code_buffer.clear();
        self.listening = false;
        self.question_started = Some(Instant::now());
        self.hint_timer.arm();

        match kind {
            QuestionKind::FreeForm => {
                self.phase = Phase::PresentingQuestion;
                self.speak(&text, SpeechPurpose::Question);
            }
            QuestionKind::Coding => {
                // No voice capture for code; the narration is courtesy.
                self.phase = Phase::AwaitingCodeSubmission;
                self.speak(&text, SpeechPurpose::Question);
            }
        }
        Ok(())
    }

    fn handle_transcript(&mut self, transcript: String) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::ListeningForAnswer | Phase::AnswerReady) {
            debug!("Dropping transcript outside the listening flow");
            return Ok(());
        }
        if transcript.trim().is_empty() {
            info!("Empty transcript; still listening");
            return Ok(());
        }
        self.listening = false;
        self.answer_buffer = Some(transcript);
        self.phase = Phase::AnswerReady;
        Ok(())
    }

    async fn submit(&mut self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Evaluating => Err(SessionError::SubmissionRejected),
            Phase::AnswerReady => {
                let Some(text) = self.answer_buffer.take() else {
                    return Err(SessionError::Protocol("no answer staged".to_string()));
                };
                self.speech.cancel();
                self.hint_timer.disarm();
                self.record_artifact(Artifact::Answer(text.clone()));
                if let Some(session) = self.session.as_mut() {
                    session.log(Role::Candidate, &text);
                }
                self.send(ClientMessage::Answer { text }).await?;
                self.phase = Phase::Evaluating;
                Ok(())
            }
            Phase::AwaitingCodeSubmission => {
                if self.code_buffer.trim().is_empty() {
                    warn!("Refusing to submit empty code");
                    return Ok(());
                }
                let code = self.code_buffer.clone();
                self.speech.cancel();
                self.hint_timer.disarm();
                self.record_artifact(Artifact::Code(code.clone()));
                if let Some(session) = self.session.as_mut() {
                    session.log(Role::Candidate, &code);
                }
                self.send(ClientMessage::CodeSubmission { code }).await?;
                self.phase = Phase::Evaluating;
                Ok(())
            }
            _ => Err(SessionError::SubmissionRejected),
        }
    }

    async fn request_hint(&mut self, automatic: bool) -> Result<(), SessionError> {
        if !self.phase.question_active() {
            return Ok(());
        }
        let Some(question) = self
            .session
            .as_mut()
            .and_then(|session| session.current.as_mut())
        else {
            return Ok(());
        };
        question.hints_used += 1;
        let question_text = question.text.clone();
        if automatic {
            debug!("Idle on question {} too long, requesting a hint", question.id);
        }
        // One pending fire at a time; the reply re-arms.
        self.hint_timer.disarm();
        self.send(ClientMessage::RequestHint {
            question: question_text,
            code: self.code_buffer.clone(),
            language: self.language.clone(),
        })
        .await
    }

    /// Assessment-embedded hint: the submission was not accepted, so
    /// the question re-enters its answer flow with guidance.
    async fn deliver_hint(&mut self, hint: String) -> Result<(), SessionError> {
        if let Some(session) = self.session.as_mut() {
            session.log(Role::Interviewer, &hint);
        }
        self.hint_timer.arm();
        let kind = self
            .session
            .as_ref()
            .and_then(|s| s.current.as_ref())
            .map(|q| q.kind);
        match kind {
            Some(QuestionKind::FreeForm) => {
                // Re-enter the narration flow so capture restarts once
                // the hint finishes playing.
                self.phase = Phase::PresentingQuestion;
                self.speak(&hint, SpeechPurpose::Question);
            }
            Some(QuestionKind::Coding) => {
                self.phase = Phase::AwaitingCodeSubmission;
                self.speak(&hint, SpeechPurpose::Hint);
            }
            None => {}
        }
        Ok(())
    }

    async fn handle_speech_finished(
        &mut self,
        purpose: SpeechPurpose,
        outcome: SpeechOutcome,
    ) -> Result<(), SessionError> {
        if purpose != SpeechPurpose::Question || self.phase != Phase::PresentingQuestion {
            return Ok(());
        }
        if outcome == SpeechOutcome::Cancelled {
            // Superseded by newer narration or a teardown; whatever
            // replaced it owns the next transition.
            return Ok(());
        }
        self.send(ClientMessage::RecordAudio).await?;
        self.phase = Phase::ListeningForAnswer;
        Ok(())
    }

    fn record_artifact(&mut self, artifact: Artifact) {
        // The start instant stays put until the question completes; a
        // resubmission after a rejected answer keeps the full duration.
        let elapsed = self
            .question_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        if let Some(question) = self
            .session
            .as_mut()
            .and_then(|session| session.current.as_mut())
        {
            question.artifact = Some(artifact);
            question.time_spent_ms = elapsed;
        }
    }

    /// Moves the current question into the archive with its verdict.
    fn complete_current(&mut self, score: Option<f64>) {
        self.hint_timer.disarm();
        let elapsed = self
            .question_started
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        if let Some(session) = self.session.as_mut() {
            if let Some(mut question) = session.current.take() {
                question.score = score;
                question.completed = true;
                if question.time_spent_ms == 0 {
                    question.time_spent_ms = elapsed;
                }
                info!(
                    "Question {} complete (score {:?}, {} hints)",
                    question.id, question.score, question.hints_used
                );
                session.questions.push(question);
            }
        }
    }

    /// Produces and exports the session result. Guarded so a manual
    /// end racing a remote completion yields exactly one result.
    async fn finalize(&mut self, method: CompletionMethod) -> Result<(), SessionError> {
        if self.result.is_some() || self.phase.is_terminal() {
            return Ok(());
        }
        self.phase = Phase::Ending;
        self.speech.cancel();
        self.hint_timer.disarm();
        self.listening = false;

        if let Some(session) = self.session.as_mut() {
            session.status = SessionStatus::Completed;
            let mut scores: Vec<Option<f64>> =
                session.questions.iter().map(|q| q.score).collect();
            if session.current.is_some() {
                // An in-flight question still counts, unscored.
                scores.push(None);
            }
            let completed = session.questions.iter().filter(|q| q.completed).count() as u32;
            let graded: Vec<f64> = scores.iter().flatten().copied().collect();
            let average = if graded.is_empty() {
                0.0
            } else {
                graded.iter().sum::<f64>() / graded.len() as f64
            };
            let end_time = Utc::now();
            let result = SessionResult {
                session_id: session.session_id.clone(),
                total_questions: scores.len() as u32,
                completed_questions: completed,
                average_score: average,
                individual_scores: scores,
                duration_ms: self
                    .started_instant
                    .map(|t| t.elapsed().as_millis() as u64)
                    .unwrap_or(0),
                start_time: self.started_at.unwrap_or(end_time),
                end_time,
                completion_method: method,
            };
            info!(
                "Interview over: {}/{} questions, average {:.1}",
                result.completed_questions, result.total_questions, result.average_score
            );
            if let Err(e) = self.exporter.export(&result).await {
                error!("Failed to export session results: {e:#}");
            }
            self.result = Some(result);
        }

        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
        self.outbound = None;
        self.phase = Phase::Completed;
        Ok(())
    }

    /// Terminal failure: release everything, export nothing.
    fn fail(&mut self, reason: &str) {
        if self.phase.is_terminal() {
            return;
        }
        error!("Session failed: {reason}");
        self.speech.cancel();
        self.hint_timer.disarm();
        self.listening = false;
        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
        self.outbound = None;
        self.phase = Phase::Failed;
    }

    fn speak(&self, text: &str, purpose: SpeechPurpose) {
        let handle = self.speech.speak(text);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let outcome = handle.finished().await;
            let _ = events
                .send(SessionEvent::SpeechFinished { purpose, outcome })
                .await;
        });
    }

    async fn send(&self, message: ClientMessage) -> Result<(), SessionError> {
        let tx = self.outbound.as_ref().ok_or(SessionError::NotConnected)?;
        tx.send(message)
            .await
            .map_err(|_| SessionError::NotConnected)
    }
}

/// Cheap cloneable front for feeding user actions into a running
/// session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        Self { events }
    }

    async fn act(&self, action: UserAction) -> Result<(), SessionError> {
        self.events
            .send(SessionEvent::User(action))
            .await
            .map_err(|_| SessionError::NotConnected)
    }

    pub async fn init(&self, mode: InterviewMode) -> Result<(), SessionError> {
        self.act(UserAction::Init(mode)).await
    }

    pub async fn set_answer(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.act(UserAction::SetAnswer(text.into())).await
    }

    pub async fn set_code(
        &self,
        code: impl Into<String>,
        language: Option<String>,
    ) -> Result<(), SessionError> {
        self.act(UserAction::SetCode {
            code: code.into(),
            language,
        })
        .await
    }

    pub async fn submit(&self) -> Result<(), SessionError> {
        self.act(UserAction::Submit).await
    }

    pub async fn request_hint(&self) -> Result<(), SessionError> {
        self.act(UserAction::RequestHint).await
    }

    pub async fn end(&self) -> Result<(), SessionError> {
        self.act(UserAction::End).await
    }
}
