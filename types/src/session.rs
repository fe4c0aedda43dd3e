//! Data model for one interview run.
//!
//! The state machine in the `codesage` crate owns and mutates these
//! types; everything else sees them read-only.

/// How the interview sources its questions. Fixed at init time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InterviewMode {
    /// Question pool drawn from a non-empty, ordered list of topics.
    Topics(Vec<String>),
    /// Questions driven by a previously uploaded resume. The id is an
    /// opaque reference produced by an out-of-scope upload step.
    Resume { resume_id: String },
}

impl InterviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewMode::Topics(_) => "topics",
            InterviewMode::Resume { .. } => "resume",
        }
    }
}

/// Whether a prompt expects a code solution or a spoken/typed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Coding,
    FreeForm,
}

/// The candidate's submitted work for one question. A question carries
/// at most one artifact, and its variant follows the question kind.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Code(String),
    Answer(String),
}

/// One question/answer round.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    /// 1-based ordinal, assigned when the question becomes current.
    pub id: u32,
    pub text: String,
    pub kind: QuestionKind,
    pub artifact: Option<Artifact>,
    /// Assigned only once the remote service has evaluated the
    /// submission; `None` while pending or never scored.
    pub score: Option<f64>,
    pub hints_used: u32,
    pub time_spent_ms: u64,
    /// True only after the remote service confirmed evaluation, not
    /// merely after the submission was sent.
    pub completed: bool,
}

impl Question {
    pub fn new(id: u32, text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id,
            text: text.into(),
            kind,
            artifact: None,
            score: None,
            hints_used: 0,
            time_spent_ms: 0,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Interviewer,
    System,
}

/// One line of the session's diagnostic transcript. The log never
/// drives control flow.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// One interview run from init to a terminal state.
///
/// Completed questions live in `questions` (append-only); the single
/// unanswered question, if any, lives in `current`. Keeping them apart
/// makes "at most one current question" hold by construction.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Session {
    pub session_id: String,
    pub mode: InterviewMode,
    pub questions: Vec<Question>,
    pub current: Option<Question>,
    pub transcript: Vec<TranscriptEntry>,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(session_id: impl Into<String>, mode: InterviewMode) -> Self {
        Self {
            session_id: session_id.into(),
            mode,
            questions: Vec::new(),
            current: None,
            transcript: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    /// Ordinal for the next question to become current.
    pub fn next_ordinal(&self) -> u32 {
        self.questions.len() as u32 + 1
    }

    pub fn log(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            role,
            text: text.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_ordinal_counts_past_questions() {
        let mut session = Session::new("s1", InterviewMode::Topics(vec!["DSA".to_string()]));
        assert_eq!(session.next_ordinal(), 1);

        let mut done = Question::new(1, "Reverse a list.", QuestionKind::Coding);
        done.completed = true;
        session.questions.push(done);
        assert_eq!(session.next_ordinal(), 2);
    }

    #[test]
    fn mode_tags_match_the_wire_values() {
        assert_eq!(InterviewMode::Topics(vec![]).as_str(), "topics");
        assert_eq!(
            InterviewMode::Resume {
                resume_id: "r".to_string()
            }
            .as_str(),
            "resume"
        );
    }
}
