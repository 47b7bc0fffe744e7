// Draft persistence: recoverable snapshots of an in-progress session.
//
// Single slot per narrator account, last-write-wins. Drafts are
// advisory recovery data, not an audit log; a failed write degrades
// service but never surfaces to the narrator.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::{Message, Theme};

/// A durable, resumable snapshot. Audio is not snapshotted; spoken
/// answers carry only whatever transcript had arrived by the time of
/// the write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub session_id: Uuid,
    /// Messages with audio references stripped.
    pub messages: Vec<Message>,
    pub theme: Option<Theme>,
    pub elapsed_seconds: u64,
    pub updated_at: DateTime<Utc>,
}

impl Draft {
    pub fn snapshot(
        session_id: Uuid,
        messages: &[Message],
        theme: Option<&Theme>,
        elapsed_seconds: u64,
    ) -> Self {
        Self {
            session_id,
            messages: messages.iter().map(Message::without_audio).collect(),
            theme: theme.cloned(),
            elapsed_seconds,
            updated_at: Utc::now(),
        }
    }
}

/// Durable store keyed by narrator account. At most one draft per
/// account; `put` overwrites.
#[async_trait::async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, account_id: &str) -> Result<Option<Draft>>;
    async fn put(&self, account_id: &str, draft: &Draft) -> Result<()>;
    async fn delete(&self, account_id: &str) -> Result<()>;
}

/// File-backed store: one JSON document per account under a directory.
/// Writes go to a temp file first and are renamed into place so a
/// crashed write never leaves a torn draft.
pub struct JsonDraftStore {
    dir: PathBuf,
}

impl JsonDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context("Failed to create draft directory")?;
        info!("Draft store at {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, account_id: &str) -> PathBuf {
        // Account IDs are UUIDs/slugs upstream; sanitize anyway so an
        // odd ID cannot escape the draft directory.
        let safe: String = account_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait::async_trait]
impl DraftStore for JsonDraftStore {
    async fn get(&self, account_id: &str) -> Result<Option<Draft>> {
        let path = self.path_for(account_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read draft file"),
        };

        match serde_json::from_slice(&bytes) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                // A corrupt draft fails open to "no draft" so the
                // narrator is never blocked from starting fresh.
                warn!("Discarding unreadable draft {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn put(&self, account_id: &str, draft: &Draft) -> Result<()> {
        let path = self.path_for(account_id);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_vec_pretty(draft).context("Failed to serialize draft")?;
        tokio::fs::write(&tmp, &json)
            .await
            .context("Failed to write draft temp file")?;
        tokio::fs::rename(&tmp, &path)
            .await
            .context("Failed to replace draft file")?;

        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<()> {
        let path = self.path_for(account_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete draft file"),
        }
    }
}

/// Pre-session draft check. Must resolve before any interview UI is
/// shown; a store failure fails open to "no draft" so the narrator is
/// never blocked from starting.
pub async fn check_existing_draft(store: &dyn DraftStore, account_id: &str) -> Option<Draft> {
    match store.get(account_id).await {
        Ok(draft) => draft,
        Err(e) => {
            warn!("Draft lookup failed for {}: {}; treating as no draft", account_id, e);
            None
        }
    }
}

/// In-memory store for tests and single-process demos.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<String, Draft>>,
}

#[async_trait::async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, account_id: &str) -> Result<Option<Draft>> {
        Ok(self.drafts.lock().await.get(account_id).cloned())
    }

    async fn put(&self, account_id: &str, draft: &Draft) -> Result<()> {
        self.drafts
            .lock()
            .await
            .insert(account_id.to_string(), draft.clone());
        Ok(())
    }

    async fn delete(&self, account_id: &str) -> Result<()> {
        self.drafts.lock().await.remove(account_id);
        Ok(())
    }
}
