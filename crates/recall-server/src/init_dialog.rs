//! User-initialization dialog.
//!
//! A micro state machine keyed by session:
//! `Asking → Existing → Completed` and `Asking → NewUser → Completed`.
//! The terminal transition caches the user id process-wide; re-entering a
//! completed dialog returns the cached id. Responses are matched with
//! case-insensitive keyword sets, and a "reset" response restarts the
//! machine. One registry exists per process, created at startup.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use recall_core::user::User;
use recall_store::UserStore;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

/// Keywords that mean "I already have an account".
const EXISTING_KEYWORDS: &[&str] = &["existing", "yes", "old", "have", "已有", "老用户", "是"];

/// Keywords that mean "I'm new".
const NEW_KEYWORDS: &[&str] = &["new", "no", "first", "新用户", "没有", "否"];

/// Keyword that restarts the dialog from any stage.
const RESET_KEYWORD: &str = "reset";

/// Dialog stage per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Asking,
    Existing,
    NewUser,
    Completed,
}

/// Process-wide init-dialog registry.
pub struct InitDialogRegistry {
    stages: DashMap<String, Stage>,
    /// The user id cached by the terminal transition.
    cached_user: RwLock<Option<String>>,
    users: Arc<UserStore>,
}

impl InitDialogRegistry {
    /// One registry per process, over the user store.
    #[must_use]
    pub fn new(users: Arc<UserStore>) -> Self {
        Self {
            stages: DashMap::new(),
            cached_user: RwLock::new(None),
            users,
        }
    }

    /// The cached user id, when any dialog completed.
    #[must_use]
    pub fn cached_user(&self) -> Option<String> {
        self.cached_user.read().clone()
    }

    fn stage(&self, session_id: &str) -> Stage {
        self.stages
            .get(session_id)
            .map_or(Stage::Asking, |e| *e.value())
    }

    fn set_stage(&self, session_id: &str, stage: Stage) {
        let _ = self.stages.insert(session_id.to_owned(), stage);
    }

    fn matches_any(response: &str, keywords: &[&str]) -> bool {
        let lowered = response.to_lowercase();
        keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
    }

    fn asking_prompt() -> Value {
        json!({
            "stage": "asking",
            "prompt": "Are you an existing user or a new user? Reply \"existing\" (已有) or \"new\" (新用户). Reply \"reset\" at any point to start over.",
        })
    }

    fn complete(&self, session_id: &str, user_id: &str) -> Value {
        self.set_stage(session_id, Stage::Completed);
        *self.cached_user.write() = Some(user_id.to_owned());
        info!(session_id, user_id, "init dialog completed");
        json!({
            "stage": "completed",
            "userId": user_id,
        })
    }

    /// Advance the dialog for one session.
    pub fn advance(&self, session_id: &str, user_response: Option<&str>) -> Value {
        let response = user_response.map(str::trim).filter(|r| !r.is_empty());

        if let Some(resp) = response {
            if resp.eq_ignore_ascii_case(RESET_KEYWORD) {
                self.set_stage(session_id, Stage::Asking);
                debug!(session_id, "init dialog reset");
                return Self::asking_prompt();
            }
        }

        match self.stage(session_id) {
            Stage::Completed => {
                // Re-entry returns the cached user.
                match self.cached_user() {
                    Some(user_id) => json!({"stage": "completed", "userId": user_id}),
                    None => {
                        self.set_stage(session_id, Stage::Asking);
                        Self::asking_prompt()
                    }
                }
            }
            Stage::Asking => match response {
                None => {
                    self.set_stage(session_id, Stage::Asking);
                    Self::asking_prompt()
                }
                Some(resp) if Self::matches_any(resp, EXISTING_KEYWORDS) => {
                    self.set_stage(session_id, Stage::Existing);
                    json!({
                        "stage": "existing",
                        "prompt": "Please provide your user id.",
                    })
                }
                Some(resp) if Self::matches_any(resp, NEW_KEYWORDS) => {
                    self.set_stage(session_id, Stage::NewUser);
                    let user_id = format!("user_{}", Uuid::now_v7().simple());
                    match self.users.create(User::new(&user_id)) {
                        Ok(()) => self.complete(session_id, &user_id),
                        Err(e) => json!({
                            "stage": "asking",
                            "error": e.to_string(),
                            "prompt": "Could not create a user, please retry.",
                        }),
                    }
                }
                Some(_) => json!({
                    "stage": "asking",
                    "prompt": "Please answer \"existing\" or \"new\" (or \"reset\").",
                }),
            },
            Stage::Existing => match response {
                None => json!({
                    "stage": "existing",
                    "prompt": "Please provide your user id.",
                }),
                Some(user_id) => {
                    if self.users.is_initialized(user_id) {
                        self.users.touch(user_id);
                        self.complete(session_id, user_id)
                    } else {
                        json!({
                            "stage": "existing",
                            "error": format!("unknown user id: {user_id}"),
                            "prompt": "That user id is not known. Provide another, or reply \"reset\".",
                        })
                    }
                }
            },
            Stage::NewUser => {
                // Creation happens atomically in Asking → NewUser; reaching
                // here means the machine was interrupted mid-transition.
                self.set_stage(session_id, Stage::Asking);
                Self::asking_prompt()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InitDialogRegistry {
        InitDialogRegistry::new(Arc::new(UserStore::in_memory()))
    }

    #[test]
    fn opening_call_asks() {
        let reg = registry();
        let out = reg.advance("sess_a", None);
        assert_eq!(out["stage"], "asking");
        assert!(out["prompt"].as_str().unwrap().contains("existing"));
    }

    #[test]
    fn new_user_path_completes_and_caches() {
        let reg = registry();
        let _ = reg.advance("sess_a", None);
        let out = reg.advance("sess_a", Some("I'm a NEW user"));
        assert_eq!(out["stage"], "completed");
        let user_id = out["userId"].as_str().unwrap().to_owned();
        assert!(user_id.starts_with("user_"));
        assert_eq!(reg.cached_user().unwrap(), user_id);
    }

    #[test]
    fn existing_user_path_requires_known_id() {
        let reg = registry();
        reg.users.create(User::new("u_known")).unwrap();

        let _ = reg.advance("sess_a", None);
        let out = reg.advance("sess_a", Some("existing"));
        assert_eq!(out["stage"], "existing");

        let rejected = reg.advance("sess_a", Some("u_ghost"));
        assert_eq!(rejected["stage"], "existing");
        assert!(rejected["error"].as_str().unwrap().contains("u_ghost"));

        let accepted = reg.advance("sess_a", Some("u_known"));
        assert_eq!(accepted["stage"], "completed");
        assert_eq!(accepted["userId"], "u_known");
        assert_eq!(reg.cached_user().unwrap(), "u_known");
    }

    #[test]
    fn keywords_are_case_insensitive_and_bilingual() {
        let reg = registry();
        reg.users.create(User::new("u1")).unwrap();
        let _ = reg.advance("sess_a", None);
        let out = reg.advance("sess_a", Some("我是老用户"));
        assert_eq!(out["stage"], "existing");
    }

    #[test]
    fn completed_dialog_returns_cached_user_on_reentry() {
        let reg = registry();
        let _ = reg.advance("sess_a", None);
        let done = reg.advance("sess_a", Some("new"));
        let user_id = done["userId"].as_str().unwrap().to_owned();

        let again = reg.advance("sess_a", Some("anything at all"));
        assert_eq!(again["stage"], "completed");
        assert_eq!(again["userId"], user_id.as_str());
    }

    #[test]
    fn completed_state_is_cached_process_wide_across_sessions() {
        let reg = registry();
        let _ = reg.advance("sess_a", None);
        let done = reg.advance("sess_a", Some("new"));
        let user_id = done["userId"].as_str().unwrap().to_owned();
        // A different session that completes sees its own flow, but the
        // cache carries the last completed id.
        assert_eq!(reg.cached_user().unwrap(), user_id);
    }

    #[test]
    fn reset_restarts_from_any_stage() {
        let reg = registry();
        let _ = reg.advance("sess_a", None);
        let _ = reg.advance("sess_a", Some("existing"));
        let out = reg.advance("sess_a", Some("RESET"));
        assert_eq!(out["stage"], "asking");
    }

    #[test]
    fn unrecognized_answer_reprompts() {
        let reg = registry();
        let _ = reg.advance("sess_a", None);
        let out = reg.advance("sess_a", Some("purple"));
        assert_eq!(out["stage"], "asking");
        assert!(out["prompt"].as_str().unwrap().contains("existing"));
    }
}
