//! Error taxonomy for the session core.

/// Errors surfaced by the session state machine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The channel never opened or dropped mid-session. Terminal; the
    /// session does not reconnect.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An outbound message was attempted outside the connected phases.
    #[error("not connected to the interview service")]
    NotConnected,

    /// A malformed or state-inappropriate envelope. Terminal when it
    /// comes from the channel decoder.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A submission was attempted while one is already in flight for
    /// the current question. A benign no-op, not a user-facing fault.
    #[error("a submission is already in flight")]
    SubmissionRejected,
}
