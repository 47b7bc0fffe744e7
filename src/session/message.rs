use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to a segment of the captured narrator track
/// (sample offset at the time the message was recorded).
///
/// Not durably snapshotted: drafts strip audio refs and keep only the
/// transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRef(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Narrator,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Question,
    SpokenAnswer,
    TypedAnswer,
    OptionSet,
    Status,
}

/// One turn in the conversation. Owned by the session; immutable once
/// appended except for deferred transcript backfill on spoken answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub speaker: Speaker,
    pub kind: MessageKind,
    /// Possibly empty while a spoken answer's audio is still being
    /// transcribed.
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_ref: Option<AudioRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<usize>,
}

impl Message {
    pub fn question(content: impl Into<String>) -> Self {
        Self::new(Speaker::Interviewer, MessageKind::Question, content.into())
    }

    pub fn spoken_answer(audio_ref: AudioRef) -> Self {
        let mut msg = Self::new(Speaker::Narrator, MessageKind::SpokenAnswer, String::new());
        msg.audio_ref = Some(audio_ref);
        msg
    }

    pub fn typed_answer(content: impl Into<String>) -> Self {
        Self::new(Speaker::Narrator, MessageKind::TypedAnswer, content.into())
    }

    pub fn status(content: impl Into<String>) -> Self {
        Self::new(Speaker::System, MessageKind::Status, content.into())
    }

    pub fn option_set(content: impl Into<String>, selected: Option<usize>) -> Self {
        let mut msg = Self::new(Speaker::Narrator, MessageKind::OptionSet, content.into());
        msg.selected_option = selected;
        msg
    }

    fn new(speaker: Speaker, kind: MessageKind, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            kind,
            content,
            created_at: Utc::now(),
            audio_ref: None,
            selected_option: None,
        }
    }

    /// A narrator turn, spoken or typed.
    pub fn is_narrator_response(&self) -> bool {
        self.speaker == Speaker::Narrator
            && matches!(self.kind, MessageKind::SpokenAnswer | MessageKind::TypedAnswer)
    }

    /// Strip the audio handle for draft serialization.
    pub fn without_audio(&self) -> Message {
        let mut msg = self.clone();
        msg.audio_ref = None;
        msg
    }
}

/// Render the speaker-labeled transcript sent to the transcript
/// analyzer: every non-system message, one line per turn.
pub fn full_transcript(messages: &[Message]) -> String {
    let mut lines = Vec::new();
    for msg in messages {
        let label = match msg.speaker {
            Speaker::Interviewer => "Interviewer",
            Speaker::Narrator => "Narrator",
            Speaker::System => continue,
        };
        if msg.content.is_empty() {
            continue;
        }
        lines.push(format!("{}: {}", label, msg.content));
    }
    lines.join("\n")
}
