pub mod envelope;
pub mod result;
pub mod session;

pub use envelope::{ClientMessage, InitPayload, ServerMessage};
pub use result::{CompletionMethod, SessionResult};
pub use session::{
    Artifact, InterviewMode, Question, QuestionKind, Role, Session, SessionStatus,
    TranscriptEntry,
};
