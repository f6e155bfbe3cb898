use thiserror::Error;

/// The request an error belongs to; picks the generic message shown when the
/// server gave no usable detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Search,
    FetchTopics,
    CreateTopic,
    UpdateTopic,
    DeleteTopic,
    Health,
}

impl Operation {
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Search => "Search failed",
            Self::FetchTopics => "Failed to load topics",
            Self::CreateTopic => "Failed to create topic",
            Self::UpdateTopic => "Failed to update topic",
            Self::DeleteTopic => "Failed to delete topic",
            Self::Health => "API is not reachable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Rejected locally, no request was sent.
    #[error("{0}")]
    Validation(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    /// Detail reported by the server in the error body.
    #[error("{0}")]
    Server(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text to show the user: validation and server detail verbatim, the
    /// operation's generic message for everything else.
    pub fn user_message(&self, op: Operation) -> String {
        match self {
            Self::Validation(msg) | Self::Server(msg) => msg.clone(),
            Self::Transport(_) | Self::Status(_) | Self::Decode(_) => {
                op.failure_message().to_string()
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
