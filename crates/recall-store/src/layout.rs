//! Per-user disk layout.
//!
//! ```text
//! <data_dir>/users/<user_id>/sessions/<session_id>.json
//! <data_dir>/users/<user_id>/short_memory/memories.json
//! <data_dir>/users/<user_id>/code_context/
//! <data_dir>/users/<user_id>/histories/
//! <data_dir>/users/<user_id>/cache/
//! <data_dir>/users/<user_id>/profile.json
//! ```
//!
//! Writes go through a temp file followed by a rename so readers never see
//! a torn JSON document.

use std::path::{Path, PathBuf};

use recall_core::errors::{RecallError, Result};
use serde::Serialize;
use serde_json::Value;

/// Path arithmetic over the data directory.
#[derive(Clone, Debug)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at `data_dir`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root of the layout.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `users/<user>` root.
    #[must_use]
    pub fn user_root(&self, user_id: &str) -> PathBuf {
        self.root.join("users").join(user_id)
    }

    /// `users/<user>/sessions/<session>.json`.
    #[must_use]
    pub fn session_file(&self, user_id: &str, session_id: &str) -> PathBuf {
        self.user_root(user_id)
            .join("sessions")
            .join(format!("{session_id}.json"))
    }

    /// `users/<user>/short_memory/memories.json`.
    #[must_use]
    pub fn memories_file(&self, user_id: &str) -> PathBuf {
        self.user_root(user_id).join("short_memory").join("memories.json")
    }

    /// `users/<user>/profile.json`.
    #[must_use]
    pub fn profile_file(&self, user_id: &str) -> PathBuf {
        self.user_root(user_id).join("profile.json")
    }

    /// `users/<user>/code_context`.
    #[must_use]
    pub fn code_context_dir(&self, user_id: &str) -> PathBuf {
        self.user_root(user_id).join("code_context")
    }

    /// `users/<user>/histories`.
    #[must_use]
    pub fn histories_dir(&self, user_id: &str) -> PathBuf {
        self.user_root(user_id).join("histories")
    }

    /// `users/<user>/cache`.
    #[must_use]
    pub fn cache_dir(&self, user_id: &str) -> PathBuf {
        self.user_root(user_id).join("cache")
    }

    /// Atomically write a JSON document, creating parent directories.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| RecallError::StoreUnavailable(format!("no parent for {}", path.display())))?;
        std::fs::create_dir_all(parent)?;
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(value)?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a JSON document; `Ok(None)` when the file does not exist.
    pub fn read_json(&self, path: &Path) -> Result<Option<Value>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                RecallError::StoreUnavailable(format!("corrupt store file {}: {e}", path.display()))
            })?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List session files for a user, newest-name-first not guaranteed.
    pub fn list_session_files(&self, user_id: &str) -> Result<Vec<PathBuf>> {
        let dir = self.user_root(user_id).join("sessions");
        let mut files = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_follow_layout() {
        let layout = DataLayout::new("/data");
        assert_eq!(
            layout.session_file("u1", "sess_a"),
            PathBuf::from("/data/users/u1/sessions/sess_a.json")
        );
        assert_eq!(
            layout.memories_file("u1"),
            PathBuf::from("/data/users/u1/short_memory/memories.json")
        );
        assert!(layout.cache_dir("u1").ends_with("users/u1/cache"));
    }

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let path = layout.session_file("u1", "sess_a");
        layout.write_json(&path, &json!({"id": "sess_a"})).unwrap();
        let back = layout.read_json(&path).unwrap().unwrap();
        assert_eq!(back["id"], "sess_a");
        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn read_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        assert!(layout.read_json(&layout.profile_file("u1")).unwrap().is_none());
    }

    #[test]
    fn list_sessions_skips_non_json() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        layout
            .write_json(&layout.session_file("u1", "sess_a"), &json!({}))
            .unwrap();
        std::fs::write(layout.user_root("u1").join("sessions").join("junk.txt"), b"x").unwrap();
        let files = layout.list_session_files("u1").unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn list_sessions_for_unknown_user_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        assert!(layout.list_session_files("ghost").unwrap().is_empty());
    }
}
