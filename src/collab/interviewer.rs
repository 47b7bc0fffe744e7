use anyhow::Result;
use tokio::sync::mpsc;

/// Asynchronous events from the live conversational interviewer.
///
/// Events must arrive in the order produced; out-of-order delivery is
/// a transport bug, not handled here.
#[derive(Debug, Clone)]
pub enum InterviewerEvent {
    /// The interviewer started composing a reply.
    Composing,
    /// A complete interviewer utterance (the next question).
    Utterance(String),
    /// Final transcription of a narrator utterance. Delivered in the
    /// order the narrator spoke; the session owner pairs each one with
    /// the oldest spoken answer still awaiting backfill.
    FinalTranscript(String),
    /// Transport or service failure. Recoverable; the session phase
    /// does not change.
    Error(String),
}

/// Write half of an open interviewer connection.
#[async_trait::async_trait]
pub trait InterviewerLink: Send {
    /// Forward a narrator turn so the interviewer can respond.
    async fn send_narrator_turn(&mut self, text: &str) -> Result<()>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for live interviewer connections.
///
/// `instructions` is the natural-language system prompt assembled from
/// the session's theme and prior context.
#[async_trait::async_trait]
pub trait LiveInterviewer: Send + Sync {
    async fn connect(
        &self,
        instructions: &str,
    ) -> Result<(Box<dyn InterviewerLink>, mpsc::Receiver<InterviewerEvent>)>;
}
