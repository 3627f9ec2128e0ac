//! User profile store.
//!
//! Gates memory retrieval: a user that never completed the init dialog has
//! no profile, and `retrieve_memory` answers with the init envelope
//! instead of data.

use dashmap::DashMap;
use recall_core::errors::{RecallError, Result};
use recall_core::user::User;
use tracing::warn;

use crate::layout::DataLayout;

/// Keyed user profiles, unique on `user_id`.
pub struct UserStore {
    users: DashMap<String, User>,
    layout: Option<DataLayout>,
}

impl UserStore {
    /// Purely in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            users: DashMap::new(),
            layout: None,
        }
    }

    /// Store persisting through the given layout.
    #[must_use]
    pub fn with_layout(layout: DataLayout) -> Self {
        Self {
            users: DashMap::new(),
            layout: Some(layout),
        }
    }

    fn hydrate(&self, user_id: &str) {
        if self.users.contains_key(user_id) {
            return;
        }
        let Some(ref layout) = self.layout else { return };
        match layout.read_json(&layout.profile_file(user_id)) {
            Ok(Some(value)) => match serde_json::from_value::<User>(value) {
                Ok(user) => {
                    let _ = self.users.insert(user_id.to_owned(), user);
                }
                Err(e) => warn!(user_id, error = %e, "skipping corrupt profile"),
            },
            Ok(None) => {}
            Err(e) => warn!(user_id, error = %e, "failed to read profile"),
        }
    }

    fn persist(&self, user: &User) -> Result<()> {
        if let Some(ref layout) = self.layout {
            layout.write_json(&layout.profile_file(&user.user_id), user)?;
        }
        Ok(())
    }

    /// Create a user; fails with `UserAlreadyExists` on collision.
    pub fn create(&self, user: User) -> Result<()> {
        self.hydrate(&user.user_id);
        if self.users.contains_key(&user.user_id) {
            return Err(RecallError::UserAlreadyExists(user.user_id));
        }
        self.persist(&user)?;
        let _ = self.users.insert(user.user_id.clone(), user);
        Ok(())
    }

    /// Fetch a profile.
    pub fn get(&self, user_id: &str) -> Result<User> {
        self.hydrate(user_id);
        self.users
            .get(user_id)
            .map(|e| e.value().clone())
            .ok_or(RecallError::UserNotInitialized)
    }

    /// Whether the user completed initialization.
    #[must_use]
    pub fn is_initialized(&self, user_id: &str) -> bool {
        self.hydrate(user_id);
        self.users.contains_key(user_id)
    }

    /// Refresh activity timestamps; a missing user is a no-op.
    pub fn touch(&self, user_id: &str) {
        self.hydrate(user_id);
        let updated = self.users.get_mut(user_id).map(|mut e| {
            e.value_mut().touch();
            e.value().clone()
        });
        if let Some(user) = updated {
            if let Err(e) = self.persist(&user) {
                warn!(user_id, error = %e, "failed to persist user activity");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn create_then_get() {
        let store = UserStore::in_memory();
        store.create(User::new("u1")).unwrap();
        assert!(store.is_initialized("u1"));
        assert_eq!(store.get("u1").unwrap().user_id, "u1");
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = UserStore::in_memory();
        store.create(User::new("u1")).unwrap();
        let err = store.create(User::new("u1")).unwrap_err();
        assert_matches!(err, RecallError::UserAlreadyExists(_));
    }

    #[test]
    fn unknown_user_is_uninitialized() {
        let store = UserStore::in_memory();
        assert!(!store.is_initialized("ghost"));
        assert_matches!(store.get("ghost"), Err(RecallError::UserNotInitialized));
    }

    #[test]
    fn touch_advances_and_is_noop_for_unknown() {
        let store = UserStore::in_memory();
        store.create(User::new("u1")).unwrap();
        let before = store.get("u1").unwrap().last_active;
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.touch("u1");
        assert!(store.get("u1").unwrap().last_active > before);
        store.touch("ghost");
    }

    #[test]
    fn persists_and_hydrates() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        {
            let store = UserStore::with_layout(layout.clone());
            store.create(User::new("u1")).unwrap();
        }
        let store = UserStore::with_layout(layout);
        assert!(store.is_initialized("u1"));
        // And duplicate creation is still rejected after hydration.
        assert_matches!(
            store.create(User::new("u1")),
            Err(RecallError::UserAlreadyExists(_))
        );
    }
}
