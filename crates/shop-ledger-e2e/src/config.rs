//! Site profile resolution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use shop_ledger::SiteProfile;

/// Environment variable naming a profile file.
pub const PROFILE_ENV: &str = "SHOP_LEDGER_PROFILE";

/// Profile file picked up from the working directory.
pub const LOCAL_PROFILE: &str = "shop-ledger.json";

/// Resolve the profile file: explicit path, then `SHOP_LEDGER_PROFILE`, then
/// `./shop-ledger.json`. `None` means the embedded muffin shop profile.
pub fn resolve_profile_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(PROFILE_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(LOCAL_PROFILE);
    local.exists().then_some(local)
}

/// Load the effective site profile.
pub fn load_profile(explicit: Option<&str>) -> Result<SiteProfile> {
    match resolve_profile_path(explicit) {
        Some(path) => SiteProfile::load(&path)
            .with_context(|| format!("failed to load profile {}", path.display())),
        None => SiteProfile::muffin_shop().context("embedded muffin shop profile is invalid"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            resolve_profile_path(Some("/tmp/other.json")),
            Some(PathBuf::from("/tmp/other.json"))
        );
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = load_profile(missing.to_str()).unwrap_err();
        assert!(format!("{err:#}").contains("nope.json"));
    }

    #[test]
    fn test_load_explicit_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.json");
        let mut value = serde_json::to_value(SiteProfile::muffin_shop().unwrap()).unwrap();
        value["base_url"] = "http://127.0.0.1:8080/".into();
        std::fs::write(&path, value.to_string()).unwrap();

        let profile = load_profile(path.to_str()).unwrap();
        assert_eq!(profile.base_url, "http://127.0.0.1:8080/");
    }
}
