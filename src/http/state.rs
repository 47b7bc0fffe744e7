use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::audio::{AudioInput, CaptureConfig};
use crate::collab::{AudioSplitter, LiveInterviewer, TranscriptAnalyzer};
use crate::config::InterviewConfig;
use crate::draft::DraftStore;
use crate::session::SessionHandle;

/// Shared state for the HTTP control surface: the live session table
/// plus everything needed to construct new sessions.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionHandle>>>>,
    pub analyzer: Arc<dyn TranscriptAnalyzer>,
    pub splitter: Arc<dyn AudioSplitter>,
    pub live_interviewer: Option<Arc<dyn LiveInterviewer>>,
    pub draft_store: Arc<dyn DraftStore>,
    pub interview: InterviewConfig,
    pub capture: CaptureConfig,
    /// Where capture frames come from for new sessions.
    pub audio_input: AudioInput,
}

impl AppState {
    pub fn new(
        analyzer: Arc<dyn TranscriptAnalyzer>,
        splitter: Arc<dyn AudioSplitter>,
        live_interviewer: Option<Arc<dyn LiveInterviewer>>,
        draft_store: Arc<dyn DraftStore>,
        interview: InterviewConfig,
        capture: CaptureConfig,
        audio_input: AudioInput,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            analyzer,
            splitter,
            live_interviewer,
            draft_store,
            interview,
            capture,
            audio_input,
        }
    }

    /// An account may run at most one live session: the capture rig is
    /// exclusively owned, and a prior session's rig must be torn down
    /// before a new recording starts.
    pub async fn active_session_for(&self, account_id: &str) -> Option<Arc<SessionHandle>> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .find(|s| s.account_id() == account_id && !s.snapshot().phase.is_terminal())
            .cloned()
    }

    /// Drop a terminal session's handle, releasing the completed audio
    /// payload it pins. Leaves live sessions in place.
    pub async fn evict_if_terminal(&self, session_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&session_id) {
            Some(s) if s.snapshot().phase.is_terminal() => {
                sessions.remove(&session_id);
                true
            }
            _ => false,
        }
    }

    /// Remove a session once its runner has finished teardown. The
    /// entry stays in the table until the terminal snapshot is
    /// published, so a new session for the same account cannot start
    /// while the prior capture rig is still being released.
    pub async fn remove_after_teardown(&self, session_id: Uuid) -> Option<Arc<SessionHandle>> {
        let handle = self.sessions.read().await.get(&session_id).cloned()?;
        handle.wait_terminal().await;
        self.sessions.write().await.remove(&session_id)
    }
}
