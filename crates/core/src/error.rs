use crate::sequencer::EntityId;

/// Result alias that carries the custom [`SequencerError`] type.
pub type Result<T> = std::result::Result<T, SequencerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// Free-form error raised by the host or by subsystems without a more
    /// specific variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The stage file could not be parsed.
    #[error("invalid stage file: {0}")]
    Json(#[from] serde_json::Error),
    /// A step was authored with values the sequencer cannot play.
    #[error("step {step}: {reason}")]
    InvalidStep { step: usize, reason: String },
    /// A step references a clip the loaded model does not have.
    #[error("step {step} references clip {clip} but the model only has {clip_count} clips")]
    ClipOutOfRange {
        step: usize,
        clip: usize,
        clip_count: usize,
    },
    #[error("unknown hook `{0}`")]
    UnknownHook(String),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("unknown sound cue `{0}`")]
    UnknownCue(String),
    /// A model or audio asset failed to load.
    #[error("failed to load asset `{uri}`: {reason}")]
    AssetLoad { uri: String, reason: String },
    #[error("invalid viewport size {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },
}

impl SequencerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_step(step: usize, reason: impl Into<String>) -> Self {
        Self::InvalidStep {
            step,
            reason: reason.into(),
        }
    }
}

impl From<&str> for SequencerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SequencerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
