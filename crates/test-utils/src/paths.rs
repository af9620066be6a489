//! Path utilities for locating fixture files.

use std::path::PathBuf;
use tempfile::TempDir;

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// `fixtures/` at the workspace root, or `TEST_FIXTURES_DIR` when set.
pub fn fixtures_dir() -> PathBuf {
    match std::env::var("TEST_FIXTURES_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => workspace_root().join("fixtures"),
    }
}

/// Path of a fixture if it exists.
pub fn find_fixture(name: &str) -> Option<PathBuf> {
    let path = fixtures_dir().join(name);
    path.exists().then_some(path)
}

/// A temporary directory for cache databases; removed on drop.
pub fn temp_cache_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("range-cache-test-")
        .tempdir()
        .expect("Failed to create temp directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }

    #[test]
    fn test_missing_fixture() {
        assert!(find_fixture("definitely_not_a_real_fixture_12345.bin").is_none());
    }

    #[test]
    fn test_temp_cache_dir_cleanup() {
        let path = {
            let dir = temp_cache_dir();
            let path = dir.path().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }
}
