//! Workspace identity.
//!
//! Every datum in the service is addressable by `(user, workspace, session)`.
//! The workspace fingerprint is a 16-hex-char truncation of the SHA-256 of
//! the cleaned workspace path, so the same project directory always maps to
//! the same identity regardless of separator style or trailing slashes.
//!
//! Two distinct empty-input policies exist and must not be mixed:
//! - Tool calls reject an empty path ([`workspace_hash`] returns an error).
//! - The socket layer falls back to a per-process random identifier
//!   ([`process_fallback_workspace`]) so anonymous connections still get a
//!   stable hash for their lifetime.

use std::sync::OnceLock;

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::errors::RecallError;

/// Hex length of the truncated workspace fingerprint.
pub const WORKSPACE_HASH_LEN: usize = 16;

/// Normalize a workspace path for hashing.
///
/// Backslashes become forward slashes, repeated separators collapse, and
/// trailing separators are stripped (the filesystem root stays `/`).
#[must_use]
pub fn clean_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut out = String::with_capacity(unified.len());
    let mut prev_slash = false;
    for ch in unified.chars() {
        if ch == '/' {
            if !prev_slash {
                out.push(ch);
            }
            prev_slash = true;
        } else {
            out.push(ch);
            prev_slash = false;
        }
    }
    while out.len() > 1 && out.ends_with('/') {
        out.truncate(out.len() - 1);
    }
    out
}

/// Derive the 16-hex-char workspace fingerprint of a path.
///
/// Errors with [`RecallError::MissingWorkspace`] on empty input — this is
/// the tool-call policy; socket connections use
/// [`process_fallback_workspace`] instead.
pub fn workspace_hash(path: &str) -> Result<String, RecallError> {
    let cleaned = clean_path(path);
    if cleaned.is_empty() {
        return Err(RecallError::MissingWorkspace);
    }
    Ok(hash_cleaned(&cleaned))
}

fn hash_cleaned(cleaned: &str) -> String {
    let digest = Sha256::digest(cleaned.as_bytes());
    let mut hex = String::with_capacity(WORKSPACE_HASH_LEN);
    for byte in digest.iter().take(WORKSPACE_HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

static FALLBACK_WORKSPACE: OnceLock<String> = OnceLock::new();

/// Per-process random workspace identifier for socket connections that
/// supply no workspace. Stable for the lifetime of the process.
pub fn process_fallback_workspace() -> &'static str {
    FALLBACK_WORKSPACE.get_or_init(|| {
        let nonce: u64 = rand::rng().random();
        hash_cleaned(&format!("anonymous-{nonce:016x}"))
    })
}
