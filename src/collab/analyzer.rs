use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Input to the transcript analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Full speaker-labeled transcript of the session.
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrator_name: Option<String>,
}

/// A candidate sub-narrative detected in the full transcript.
///
/// Ephemeral: exists only between analysis and completion. Character
/// offsets index into the request transcript; the time fields are
/// filled by the completion pipeline's offset-to-time mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedStory {
    pub title: String,
    pub summary: String,
    /// Cleaned narrative text for this story.
    pub bridged_text: String,
    /// Character offsets into the full transcript.
    pub start_index: usize,
    pub end_index: usize,
    /// Seconds into the narrator-only track. Set by time mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

/// External service that detects story boundaries in a transcript.
///
/// May return zero, one, or many stories. An empty-narrator transcript
/// is a valid input and must not error; implementations should answer
/// with zero stories.
#[async_trait::async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest) -> Result<Vec<DetectedStory>>;
}

/// Analyzer that never detects sub-stories, so every session completes
/// as a single recording. The default when no hosted analysis service
/// is configured.
pub struct SingleStoryAnalyzer;

#[async_trait::async_trait]
impl TranscriptAnalyzer for SingleStoryAnalyzer {
    async fn analyze(&self, _request: AnalysisRequest) -> Result<Vec<DetectedStory>> {
        Ok(Vec::new())
    }
}
