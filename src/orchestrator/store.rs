//! Durable storage of session aggregates.
//!
//! A session is always read and written whole. [`JsonSessionStore`] keeps one
//! pretty-printed JSON file per session and replaces it atomically (write to
//! `<id>.json.tmp`, then rename).

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use scribe_common::Session;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` when no session has this id.
    async fn load(&self, id: &str) -> Result<Option<Session>>;

    async fn save(&self, session: &Session) -> Result<()>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn list(&self) -> Result<Vec<Session>>;
}

/// Session ids become file names, so keep them to a safe alphabet.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() {
        bail!("Session id must not be empty");
    }
    if id.starts_with('.') {
        bail!("Session id '{}' must not start with '.'", id);
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        bail!("Session id '{}' contains invalid character '{}'", id, bad);
    }
    Ok(())
}

pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_session(path: &Path) -> Result<Session> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file {}", path.display()))
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        validate_session_id(id)?;
        let path = self.path_for(id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::read_session(&path).await.map(Some)
    }

    async fn save(&self, session: &Session) -> Result<()> {
        validate_session_id(&session.id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create session directory {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        let path = self.path_for(&session.id);
        let tmp = self.dir.join(format!("{}.json.tmp", session.id));
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        validate_session_id(id)?;
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.dir.display()));
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_session(&path).await {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file"),
            }
        }
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }
}
