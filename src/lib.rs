pub mod audio;
pub mod collab;
pub mod completion;
pub mod config;
pub mod draft;
pub mod error;
pub mod http;
pub mod session;
pub mod timer;

pub use audio::{
    AudioBackend, AudioBackendFactory, AudioFrame, AudioInput, CaptureConfig, CaptureDuplexer,
    FinalizedTracks, TrackSource, WavFileBackend,
};
pub use collab::{
    AnalysisRequest, AudioSplitter, DetectedStory, InterviewerEvent, InterviewerLink,
    LiveInterviewer, SingleStoryAnalyzer, SplitFile, StorySegment, TranscriptAnalyzer,
    WavClipSplitter,
};
pub use completion::{CompletedInterview, FinishedStory};
pub use crate::config::{Config, InterviewConfig};
pub use draft::{Draft, DraftStore, JsonDraftStore, MemoryDraftStore};
pub use error::SessionError;
pub use http::{create_router, AppState};
pub use session::{
    builtin_themes, InterviewMachine, Message, Phase, SessionDeps, SessionHandle, SessionRunner,
    SessionSnapshot, Theme,
};
pub use timer::{SessionTimer, TimerEvent};
