//! Client-side core for turn-based, voice-and-code technical
//! interviews over a single websocket channel.

pub mod channel;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod hint;
pub mod session;
pub mod speech;

pub use codesage_types as types;

pub use channel::{ChannelAdapter, ChannelEvent};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use error::SessionError;
pub use export::{JsonFileExporter, ResultExporter};
pub use session::{InterviewSession, Phase, SessionEvent, SessionHandle, UserAction};
pub use speech::{
    NullTts, ProcessTts, SpeechController, SpeechHandle, SpeechOutcome, SpeechOutput, SpeechPurpose,
    TtsBackend,
};
