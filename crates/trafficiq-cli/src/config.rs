//! Startup configuration: policy, watchlist and plate penalty files.

use std::path::Path;

use anyhow::Context;
use tracing::info;
use trafficiq_ai::{PlatePenalties, WatchlistTable};
use trafficiq_core::{Policy, PolicyConfig};

/// Load and validate the policy. No file means the documented defaults.
pub fn load_policy(path: Option<&Path>) -> anyhow::Result<Policy> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading policy {}", path.display()))?;
            let config = PolicyConfig::from_json(&json)
                .with_context(|| format!("parsing policy {}", path.display()))?;
            info!(path = %path.display(), "policy loaded");
            config
        }
        None => PolicyConfig::default(),
    };
    Policy::new(config).context("invalid policy configuration")
}

/// Load the watchlist table. No file means the built-in demo table.
pub fn load_watchlist(path: Option<&Path>) -> anyhow::Result<WatchlistTable> {
    match path {
        Some(path) => WatchlistTable::from_json_file(path),
        None => {
            let table = WatchlistTable::demo();
            info!(entries = table.len(), "using built-in demo watchlist");
            Ok(table)
        }
    }
}

/// Load the extractor's plate penalties. No file means the built-in defaults.
pub fn load_plate_penalties(path: Option<&Path>) -> anyhow::Result<PlatePenalties> {
    match path {
        Some(path) => PlatePenalties::from_json_file(path),
        None => Ok(PlatePenalties::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_files() {
        let policy = load_policy(None).unwrap();
        assert_eq!(policy.config(), &PolicyConfig::default());
        assert_eq!(load_watchlist(None).unwrap(), WatchlistTable::demo());
        assert_eq!(load_plate_penalties(None).unwrap(), PlatePenalties::default());
    }

    #[test]
    fn plate_penalties_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.json");
        std::fs::write(&path, r#"{ "night": 0.3, "rain": 0.0 }"#).unwrap();
        let p = load_plate_penalties(Some(&path)).unwrap();
        assert_eq!((p.night, p.blur, p.rain), (0.3, 0.15, 0.0));

        std::fs::write(&path, r#"{ "night": -0.1 }"#).unwrap();
        let err = load_plate_penalties(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("outside [0, 1]"), "{err:#}");
    }

    #[test]
    fn invalid_policy_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{ "p0_min_confidence": 2.0 }"#).unwrap();

        let err = load_policy(Some(&path)).unwrap_err();
        assert_eq!(err.to_string(), "invalid policy configuration");
        assert!(format!("{err:#}").contains("p0_min_confidence"));
    }

    #[test]
    fn missing_policy_file_is_an_error() {
        assert!(load_policy(Some(Path::new("/nonexistent/policy.json"))).is_err());
    }
}
