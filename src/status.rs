use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{error::ClientError, models::RenderMode, orchestrator::GenerationOutput};

pub const READY_TEXT: &str = "Ready to generate storyboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// One line of user-facing feedback for the status bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self { Self { text: text.into(), kind: StatusKind::Info } }
    pub fn success(text: impl Into<String>) -> Self { Self { text: text.into(), kind: StatusKind::Success } }
    pub fn error(text: impl Into<String>) -> Self { Self { text: text.into(), kind: StatusKind::Error } }

    pub fn ready() -> Self { Self::info(READY_TEXT) }

    pub fn generating(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Ai => Self::info("Generating storyboard with AI... this can take a few minutes"),
            RenderMode::Demo => Self::info("Generating storyboard..."),
        }
    }

    /// Success messages fall back to the ready line after five seconds.
    pub fn expires_after(&self) -> Option<Duration> {
        match self.kind {
            StatusKind::Success => Some(Duration::from_secs(5)),
            StatusKind::Info | StatusKind::Error => None,
        }
    }

    pub fn from_error(err: &ClientError) -> Self {
        match err {
            ClientError::Validation(msg) => Self::error(msg.clone()),
            ClientError::ImageLoad(_) => Self::error("Could not read that image. Please choose another file."),
            ClientError::Upload(msg) => Self::error(format!("Upload failed: {msg}")),
            ClientError::Generation(msg) => Self::error(msg.clone()),
            ClientError::Network(_) => Self::error("Network error. Please try again."),
            ClientError::Save(msg) => Self::error(format!("Could not save the file ({msg})")),
            ClientError::Timeout => Self::error("The request timed out. Please try again."),
            ClientError::Cancelled => Self::info("AI generation cancelled."),
            ClientError::Busy => Self::info("A generation is already running"),
        }
    }

    pub fn from_outcome(outcome: &Result<GenerationOutput, ClientError>) -> Self {
        match outcome {
            Ok(_) => Self::success("Generation successful!"),
            Err(e) => Self::from_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_informational() {
        let msg = StatusMessage::from_outcome(&Err(ClientError::Cancelled));
        assert_eq!(msg, StatusMessage::info("AI generation cancelled."));
        assert_eq!(msg.expires_after(), None);
    }

    #[test]
    fn success_expires() {
        let msg = StatusMessage::from_outcome(&Ok(GenerationOutput { image: Default::default(), filename: None, captions: vec![] }));
        assert_eq!(msg.kind, StatusKind::Success);
        assert_eq!(msg.expires_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn validation_text_passes_through() {
        let msg = StatusMessage::from_error(&ClientError::validation("Please enter a scene description"));
        assert_eq!(msg, StatusMessage::error("Please enter a scene description"));
        assert_eq!(StatusMessage::from_error(&ClientError::Network("refused".into())).text, "Network error. Please try again.");
        let save = StatusMessage::from_error(&ClientError::Save("out/a.png: Read-only file system".into()));
        assert_eq!(save, StatusMessage::error("Could not save the file (out/a.png: Read-only file system)"));
    }
}
