use thiserror::Error;

/// Session-level failures surfaced to the narrator-facing client.
///
/// Only the capture errors block a session outright; everything else
/// is recoverable or degrades to a simpler completion path.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Microphone permission was refused. Recording cannot start.
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// No usable capture device. Recording cannot start.
    #[error("Audio device unavailable")]
    DeviceUnavailable,

    /// The live interviewer transport dropped. The session stays in its
    /// current phase and the turn can be retried.
    #[error("Interviewer connection lost: {0}")]
    ConnectionLost(String),

    /// Transcript analysis failed. The session degrades to a
    /// single-story completion.
    #[error("Transcript analysis failed: {0}")]
    AnalysisFailed(String),

    /// Audio splitting failed. The session degrades to a single-story
    /// completion.
    #[error("Audio split failed: {0}")]
    SplitFailed(String),

    /// A draft write failed. Service is degraded but the session
    /// continues; the next interval retries.
    #[error("Draft persistence failed: {0}")]
    PersistenceFailed(String),
}

impl SessionError {
    /// Whether the error prevents the session from continuing at all.
    /// Capture failures do; collaborator and persistence failures have
    /// a degraded path instead.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            SessionError::PermissionDenied | SessionError::DeviceUnavailable
        )
    }
}
