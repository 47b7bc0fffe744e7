use std::time::Duration;
use uuid::Uuid;

use crate::collab::{DetectedStory, SplitFile};
use crate::error::SessionError;
use crate::session::{AudioRef, Theme};

/// Everything that can happen to a session. Background activities
/// (timer, capture, interviewer transport, draft interval) and the
/// narrator all publish these into one queue; the machine processes
/// them strictly one at a time.
#[derive(Debug)]
pub enum SessionEvent {
    /// Narrator picked a topic, or deferred (`None`) to let the
    /// interviewer choose.
    ThemeChosen(Option<Theme>),
    /// Narrator finished a spoken turn; transcript arrives later.
    /// `audio_ref` is stamped by the session owner from the live
    /// capture position when the caller leaves it empty.
    NarratorSpoke { audio_ref: Option<AudioRef> },
    /// Narrator typed a turn.
    NarratorTyped(String),
    /// Deferred transcript backfill for a spoken answer.
    TranscriptArrived { message_id: Uuid, text: String },
    /// The interviewer transport signalled it is composing a reply.
    ComposingStarted,
    /// A complete interviewer utterance.
    InterviewerSaid(String),
    /// The interviewer transport failed. Phase does not change.
    InterviewerErrored(String),
    /// Narrator asked to retry after a connection error.
    RetryInterviewer,
    /// One-time warning threshold reached.
    TimerWarning,
    /// Hard limit reached; runs the same completion path as an
    /// explicit finish.
    TimerExpired,
    /// Narrator explicitly finished the interview.
    FinishRequested,
    /// Narrator's choice in `SplitDecision`.
    SplitChoice { split: bool },
    /// Transcript analysis result. Carries the session identity so
    /// late results for a torn-down session can be dropped.
    AnalysisDone {
        session_id: Uuid,
        stories: Vec<DetectedStory>,
    },
    AnalysisFailed { session_id: Uuid, error: String },
    /// Audio split result.
    SplitDone {
        session_id: Uuid,
        files: Vec<SplitFile>,
    },
    SplitFailed { session_id: Uuid, error: String },
    /// Periodic draft snapshot tick.
    DraftTick,
    /// Narrator cancelled. Legal in any phase.
    CancelRequested,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::ThemeChosen(_) => "theme-chosen",
            SessionEvent::NarratorSpoke { .. } => "narrator-spoke",
            SessionEvent::NarratorTyped(_) => "narrator-typed",
            SessionEvent::TranscriptArrived { .. } => "transcript-arrived",
            SessionEvent::ComposingStarted => "composing-started",
            SessionEvent::InterviewerSaid(_) => "interviewer-said",
            SessionEvent::InterviewerErrored(_) => "interviewer-errored",
            SessionEvent::RetryInterviewer => "retry-interviewer",
            SessionEvent::TimerWarning => "timer-warning",
            SessionEvent::TimerExpired => "timer-expired",
            SessionEvent::FinishRequested => "finish-requested",
            SessionEvent::SplitChoice { .. } => "split-choice",
            SessionEvent::AnalysisDone { .. } => "analysis-done",
            SessionEvent::AnalysisFailed { .. } => "analysis-failed",
            SessionEvent::SplitDone { .. } => "split-done",
            SessionEvent::SplitFailed { .. } => "split-failed",
            SessionEvent::DraftTick => "draft-tick",
            SessionEvent::CancelRequested => "cancel-requested",
        }
    }
}

/// Side effects the machine asks its owner to run. The machine never
/// performs I/O itself; the runner executes these in order.
#[derive(Debug)]
pub enum Effect {
    StartTimer { offset: Duration },
    StopTimer,
    /// Forward a narrator turn to the interviewer (live or scripted).
    AskInterviewer { narrator_text: String },
    SaveDraft,
    DeleteDraft,
    FinalizeCapture,
    DiscardCapture,
    RunAnalysis { transcript: String },
    RunSplit {
        stories: Vec<DetectedStory>,
        transcript_len: usize,
    },
    /// Terminal assembly: one story with the full session audio.
    CompleteSingle { title: String, text: String },
    /// Terminal assembly: one story per detected segment.
    CompleteSplit {
        stories: Vec<DetectedStory>,
        files: Vec<SplitFile>,
    },
    /// Surface a recoverable error to the caller.
    SurfaceError(SessionError),
}
