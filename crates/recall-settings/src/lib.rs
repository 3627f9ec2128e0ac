//! # recall-settings
//!
//! Configuration for the recall service, loaded from two layers:
//!
//! 1. **Compiled defaults** — [`Settings::default()`]
//! 2. **Environment variables** — enumerated overrides (highest priority)
//!
//! The service is environment-configured; there is no settings file. The
//! global singleton is swappable so tests can install a fixed configuration.
//!
//! # Usage
//!
//! ```no_run
//! use recall_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("HTTP port: {}", settings.server.http_port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, parse_duration};
pub use types::*;

use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<…>>>` instead of `OnceLock` so tests and startup can
/// install a value; reads are a shared lock plus an `Arc::clone`.
static SETTINGS: RwLock<Option<Arc<Settings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// First call loads from the environment; later calls return the cached
/// value. Callers hold a consistent snapshot even if another thread swaps
/// the settings concurrently.
pub fn get_settings() -> Arc<Settings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }
    let settings = Arc::new(load_settings());
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Install a specific settings value, replacing any cached one.
pub fn init_settings(settings: Settings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test owns the global cache; splitting these would race.
    #[test]
    fn init_settings_overrides_cache_and_snapshots_are_consistent() {
        let mut custom = Settings::default();
        custom.server.http_port = 9999;
        init_settings(custom);
        let a = get_settings();
        let b = get_settings();
        assert_eq!(a.server.http_port, 9999);
        assert_eq!(a.server.http_port, b.server.http_port);
        init_settings(Settings::default());
    }
}
