/// Result alias that carries the custom [`PhosphorError`] type.
pub type Result<T> = std::result::Result<T, PhosphorError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PhosphorError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON encoding and decoding errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// The media engine could not be constructed. Nothing was left behind and
    /// a later `load` may try again.
    #[error("media engine unavailable: {0}")]
    EngineUnavailable(String),
    /// A command issued to a live engine failed. The handle stays usable.
    #[error("engine command `{command}` failed: {reason}")]
    EngineCommand { command: String, reason: String },
    /// The engine lifecycle has been torn down and will not be revived.
    #[error("player has already been terminated")]
    Terminated,
    /// Name given for an effect channel did not match any channel.
    #[error("unknown effect channel `{0}`")]
    UnknownChannel(String),
    /// Name given for a preset did not match any preset.
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
}

impl PhosphorError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a [`PhosphorError::EngineCommand`] for a failed engine call.
    pub fn command<C: Into<String>, R: ToString>(command: C, reason: R) -> Self {
        Self::EngineCommand {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::msg(format!("{what} has been poisoned"))
    }
}

impl From<&str> for PhosphorError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PhosphorError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
