//! Collaborator contracts
//!
//! The orchestrator depends on three external services, injected as
//! traits at session construction:
//! - `TranscriptAnalyzer`: full transcript in, detected stories out
//! - `AudioSplitter`: narrator audio + time ranges in, per-range files out
//! - `LiveInterviewer`: bidirectional conversation transport
//!
//! None of these are implemented over a specific wire format here;
//! tests use in-process mocks.

pub mod analyzer;
pub mod interviewer;
pub mod splitter;

pub use analyzer::{AnalysisRequest, DetectedStory, SingleStoryAnalyzer, TranscriptAnalyzer};
pub use interviewer::{InterviewerEvent, InterviewerLink, LiveInterviewer};
pub use splitter::{AudioSplitter, SplitFile, StorySegment, WavClipSplitter};
