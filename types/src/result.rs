//! Finalized session summary, produced exactly once per session.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMethod {
    /// The remote service ended the interview after the last question.
    Automatic,
    /// The candidate ended the interview early.
    ManuallyEnded,
}

/// Immutable snapshot handed to the result exporter when a session
/// reaches its terminal state. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub total_questions: u32,
    pub completed_questions: u32,
    /// Mean over scored questions; 0.0 when nothing was scored.
    pub average_score: f64,
    /// Ordered to match the session's questions; `None` for questions
    /// that never received a score.
    pub individual_scores: Vec<Option<f64>>,
    pub duration_ms: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub completion_method: CompletionMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_completion_method() {
        let result = SessionResult {
            session_id: "session_1".to_string(),
            total_questions: 3,
            completed_questions: 2,
            average_score: 72.5,
            individual_scores: vec![Some(80.0), Some(65.0), None],
            duration_ms: 540_000,
            start_time: Utc::now(),
            end_time: Utc::now(),
            completion_method: CompletionMethod::ManuallyEnded,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
        assert_eq!(json["completion_method"], "manually_ended");
        assert_eq!(json["individual_scores"][2], serde_json::Value::Null);
    }
}
