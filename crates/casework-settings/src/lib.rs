//! # casework-settings
//!
//! Layered configuration for casework.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CaseworkSettings::default()`]
//! 2. **User file**: `~/.casework/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CASEWORK_*` overrides (highest priority)
//!
//! There is no global instance. The application root loads settings once and
//! hands each section to the component that needs it.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, load_with_env,
    settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_is_under_home_dot_dir() {
        let path = settings_path();
        assert!(path.ends_with(".casework/settings.json"));
    }
}
