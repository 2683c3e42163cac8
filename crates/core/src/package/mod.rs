//! Package configuration.
//!
//! A package name from an order line item is normalized (case, whitespace,
//! legacy aliases) and resolved first against the admin-maintained package
//! table, then against the built-in defaults.

mod sqlite_store;

pub use sqlite_store::SqlitePackageStore;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("No package configuration for '{0}'")]
    Unresolved(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Targets attached to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub package_name: String,
    pub direct_streams_target: i64,
    pub playlist_streams_target: i64,
    pub playlist_assignments_needed: u32,
    /// Planning horizon in days.
    pub time_on_playlists: u32,
}

/// Admin-maintained package table.
pub trait PackageStore: Send + Sync {
    /// Look up by normalized name.
    fn get(&self, package_name: &str) -> Result<Option<PackageConfig>, PackageError>;

    fn list(&self) -> Result<Vec<PackageConfig>, PackageError>;

    /// Insert or replace; the name is stored normalized.
    fn upsert(&self, config: &PackageConfig) -> Result<(), PackageError>;
}

/// Legacy names still present on old orders.
const PACKAGE_ALIASES: &[(&str, &str)] = &[
    ("STARTER", "BREAKTHROUGH"),
    ("GROWTH", "MOMENTUM"),
    ("PRO", "DOMINATE"),
    ("PREMIUM", "UNSTOPPABLE"),
    ("ULTIMATE", "LEGENDARY"),
];

/// (name, direct streams, playlist streams, slots, days on playlists)
const DEFAULT_PACKAGES: &[(&str, i64, i64, u32, u32)] = &[
    ("BREAKTHROUGH", 1_000, 3_000, 1, 14),
    ("MOMENTUM", 2_500, 7_500, 2, 14),
    ("DOMINATE", 5_000, 15_000, 3, 21),
    ("UNSTOPPABLE", 10_000, 30_000, 3, 28),
    ("LEGENDARY", 20_000, 60_000, 4, 30),
];

/// Canonical package name: uppercased, single-spaced, without a trailing
/// "PACKAGE"/"CAMPAIGN" word, legacy aliases mapped to current names.
pub fn normalize_package_name(name: &str) -> String {
    let upper = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    let trimmed = upper
        .strip_suffix(" PACKAGE")
        .or_else(|| upper.strip_suffix(" CAMPAIGN"))
        .unwrap_or(&upper)
        .trim()
        .to_string();

    PACKAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, current)| current.to_string())
        .unwrap_or(trimmed)
}

/// Built-in package defaults used when the package table has no entry.
pub fn default_package(name: &str) -> Option<PackageConfig> {
    let normalized = normalize_package_name(name);
    DEFAULT_PACKAGES
        .iter()
        .find(|(n, ..)| *n == normalized)
        .map(|&(n, direct, playlist, slots, days)| PackageConfig {
            package_name: n.to_string(),
            direct_streams_target: direct,
            playlist_streams_target: playlist,
            playlist_assignments_needed: slots,
            time_on_playlists: days,
        })
}

/// Resolves package names to configuration.
#[derive(Clone, Default)]
pub struct PackageCatalog {
    store: Option<Arc<dyn PackageStore>>,
}

impl PackageCatalog {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Catalog backed only by the built-in defaults.
    pub fn defaults_only() -> Self {
        Self { store: None }
    }

    pub fn resolve(&self, package_name: &str) -> Result<PackageConfig, PackageError> {
        let normalized = normalize_package_name(package_name);

        if let Some(store) = &self.store {
            if let Some(config) = store.get(&normalized)? {
                return Ok(config);
            }
        }

        default_package(&normalized).ok_or(PackageError::Unresolved(package_name.to_string()))
    }

    /// Number of playlist slots a package requires.
    pub fn slots_needed(&self, package_name: &str) -> Result<u32, PackageError> {
        self.resolve(package_name)
            .map(|c| c.playlist_assignments_needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_package_name("legendary"), "LEGENDARY");
        assert_eq!(normalize_package_name("  Legendary   Package "), "LEGENDARY");
        assert_eq!(normalize_package_name("momentum campaign"), "MOMENTUM");
    }

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_package_name("Ultimate"), "LEGENDARY");
        assert_eq!(normalize_package_name("starter package"), "BREAKTHROUGH");
    }

    #[test]
    fn test_normalize_unknown_passthrough() {
        assert_eq!(normalize_package_name("Custom Deal"), "CUSTOM DEAL");
    }

    #[test]
    fn test_default_legendary_has_four_slots() {
        let config = default_package("LEGENDARY").unwrap();
        assert_eq!(config.playlist_assignments_needed, 4);
    }

    #[test]
    fn test_resolve_falls_back_to_defaults() {
        let catalog = PackageCatalog::defaults_only();
        assert_eq!(catalog.slots_needed("Ultimate").unwrap(), 4);
        assert_eq!(catalog.slots_needed("breakthrough").unwrap(), 1);
    }

    #[test]
    fn test_resolve_unknown_is_error() {
        let catalog = PackageCatalog::defaults_only();
        assert!(matches!(
            catalog.resolve("Mystery Box"),
            Err(PackageError::Unresolved(_))
        ));
    }

    #[test]
    fn test_resolve_prefers_store() {
        let store = Arc::new(SqlitePackageStore::in_memory().unwrap());
        store
            .upsert(&PackageConfig {
                package_name: "legendary".to_string(),
                direct_streams_target: 25_000,
                playlist_streams_target: 80_000,
                playlist_assignments_needed: 6,
                time_on_playlists: 45,
            })
            .unwrap();

        let catalog = PackageCatalog::new(store);
        let config = catalog.resolve("Ultimate Package").unwrap();
        assert_eq!(config.package_name, "LEGENDARY");
        assert_eq!(config.playlist_assignments_needed, 6);

        // Packages missing from the store still resolve from defaults.
        assert_eq!(catalog.slots_needed("momentum").unwrap(), 2);
    }
}
