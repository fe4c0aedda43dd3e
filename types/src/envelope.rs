//! Wire envelopes exchanged with the interview service.
//!
//! Every message in either direction is a JSON object with a required
//! `type` discriminator. Both unions are closed: an inbound `type` that
//! is not listed here fails to decode, so new server messages must be
//! added to [`ServerMessage`] before the client can see them.

use crate::session::InterviewMode;

/// Messages sent by the client to the interview service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Start a session in the given mode.
    #[serde(rename = "init")]
    Init(InitPayload),
    /// A free-form spoken or typed answer to the current question.
    #[serde(rename = "answer")]
    Answer { text: String },
    /// A code solution to the current question.
    #[serde(rename = "code_submission")]
    CodeSubmission { code: String },
    /// Ask for a hint on the current question.
    #[serde(rename = "request_hint")]
    RequestHint {
        question: String,
        code: String,
        language: String,
    },
    /// Ask the remote side to start voice capture. Capture happens
    /// server-side; no audio crosses this channel.
    #[serde(rename = "record_audio")]
    RecordAudio,
    /// Terminate the session.
    #[serde(rename = "end")]
    End,
}

/// Body of the `init` message. `topics` and `resume_id` are mutually
/// exclusive and follow the session mode.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InitPayload {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_id: Option<String>,
}

impl From<&InterviewMode> for InitPayload {
    fn from(mode: &InterviewMode) -> Self {
        match mode {
            InterviewMode::Topics(topics) => Self {
                mode: "topics".to_string(),
                topics: Some(topics.clone()),
                resume_id: None,
            },
            InterviewMode::Resume { resume_id } => Self {
                mode: "resume".to_string(),
                topics: None,
                resume_id: Some(resume_id.clone()),
            },
        }
    }
}

/// Messages received from the interview service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Session initialized, first (or next) question attached. Some
    /// server builds tag this `question` instead of `ready`.
    #[serde(rename = "ready", alias = "question")]
    Ready {
        message: Option<String>,
        next_question: String,
    },
    /// The interviewer's reply to a submission. Any of the optional
    /// fields may be present.
    #[serde(rename = "assessment")]
    Assessment {
        evaluation: Option<String>,
        hint: Option<String>,
        next_question: Option<String>,
        final_feedback: Option<String>,
    },
    #[serde(rename = "hint")]
    Hint { hint: String },
    #[serde(rename = "code_feedback")]
    CodeFeedback { code_feedback: String },
    /// The remote side started voice capture.
    #[serde(rename = "listening")]
    Listening { message: Option<String> },
    #[serde(rename = "transcribed")]
    Transcribed { transcript: String },
    #[serde(rename = "no_speech")]
    NoSpeech { message: Option<String> },
    #[serde(rename = "invalid_transcript")]
    InvalidTranscript {
        message: Option<String>,
        transcript: Option<String>,
    },
    /// The current question was evaluated. `next_question` absent means
    /// the interview has no more questions.
    #[serde(rename = "question_complete")]
    QuestionComplete {
        score: Option<f64>,
        next_question: Option<String>,
        question_number: Option<u32>,
        remaining_questions: Option<u32>,
    },
    /// The interview is over. `ended` is the acknowledgement of a
    /// client `end`; `interview_complete` is remote-initiated.
    #[serde(rename = "interview_complete", alias = "ended")]
    InterviewComplete {
        final_feedback: Option<String>,
        results: Option<serde_json::Value>,
        interview_id: Option<String>,
        download_url: Option<String>,
    },
    #[serde(rename = "error")]
    Error { error: String },
    /// Cut off any narration currently playing.
    #[serde(rename = "stop_speech")]
    StopSpeech { message: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ready_and_its_question_alias() {
        let ready: ServerMessage = serde_json::from_str(
            r#"{"type": "ready", "message": "Topic-based interview initialized", "next_question": "Can you introduce yourself?"}"#,
        )
        .unwrap();
        let question: ServerMessage = serde_json::from_str(
            r#"{"type": "question", "next_question": "Can you introduce yourself?"}"#,
        )
        .unwrap();

        match (&ready, &question) {
            (
                ServerMessage::Ready { next_question: a, .. },
                ServerMessage::Ready { next_question: b, .. },
            ) => assert_eq!(a, b),
            other => panic!("expected two Ready messages, got {other:?}"),
        }
    }

    #[test]
    fn decodes_question_complete_with_optional_fields() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type": "question_complete", "score": 85, "next_question": "Next one.", "question_number": 2, "remaining_questions": 2}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::QuestionComplete {
                score: Some(85.0),
                next_question: Some("Next one.".to_string()),
                question_number: Some(2),
                remaining_questions: Some(2),
            }
        );

        let bare: ServerMessage =
            serde_json::from_str(r#"{"type": "question_complete", "score": 40}"#).unwrap();
        assert_eq!(
            bare,
            ServerMessage::QuestionComplete {
                score: Some(40.0),
                next_question: None,
                question_number: None,
                remaining_questions: None,
            }
        );
    }

    #[test]
    fn decodes_ended_as_interview_complete() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type": "ended", "interview_id": "abc-123", "download_url": "/download_results/abc-123"}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::InterviewComplete { interview_id, .. } => {
                assert_eq!(interview_id.as_deref(), Some("abc-123"));
            }
            other => panic!("expected InterviewComplete, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_fails_to_decode() {
        let result = serde_json::from_str::<ServerMessage>(r#"{"type": "approach_feedback"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn encodes_init_for_topics_mode() {
        let mode = InterviewMode::Topics(vec!["Arrays".to_string(), "Graphs".to_string()]);
        let text = serde_json::to_string(&ClientMessage::Init(InitPayload::from(&mode))).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["type"], "init");
        assert_eq!(json["mode"], "topics");
        assert_eq!(json["topics"][1], "Graphs");
        assert!(json.get("resume_id").is_none());
    }

    #[test]
    fn encodes_init_for_resume_mode() {
        let mode = InterviewMode::Resume {
            resume_id: "resume-42".to_string(),
        };
        let text = serde_json::to_string(&ClientMessage::Init(InitPayload::from(&mode))).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(json["mode"], "resume");
        assert_eq!(json["resume_id"], "resume-42");
        assert!(json.get("topics").is_none());
    }

    #[test]
    fn encodes_record_audio_as_bare_tag() {
        let text = serde_json::to_string(&ClientMessage::RecordAudio).unwrap();
        assert_eq!(text, r#"{"type":"record_audio"}"#);
    }
}
